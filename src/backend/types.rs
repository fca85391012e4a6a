use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Body of a successful `POST /api/user-login/`.
///
/// `user` stays raw JSON; [`crate::auth::User::from_backend`] normalizes it and
/// replaces the backend's role with the one resolved from the id.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub user: Value,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(alias = "nomor_telepon", alias = "telp")]
    pub no_telp: String,
    pub area: String,
    pub region: String,
    pub branch: String,
    pub cluster: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .field("confirm_password", &"***")
            .field("no_telp", &self.no_telp)
            .field("area", &self.area)
            .field("region", &self.region)
            .field("branch", &self.branch)
            .field("cluster", &self.cluster)
            .finish()
    }
}
