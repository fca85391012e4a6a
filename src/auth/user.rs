//! User identity and organizational references.
//!
//! The backend is loose about field names (`telp` vs `phone`, `id_cluster` vs
//! `cluster`) and about id types (numbers vs numeric strings). Everything is
//! normalized to one shape here so the rest of the crate compares `i64`s.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

use super::role::Role;

/// Organizational levels, broadest first.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrgLevel {
    Area,
    Region,
    Branch,
    Cluster,
}

impl OrgLevel {
    /// Breadth rank: lower is broader.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Area => 0,
            Self::Region => 1,
            Self::Branch => 2,
            Self::Cluster => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Region => "region",
            Self::Branch => "branch",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for OrgLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "area" => Ok(Self::Area),
            "region" => Ok(Self::Region),
            "branch" => Ok(Self::Branch),
            "cluster" => Ok(Self::Cluster),
            other => Err(format!("unknown organizational level: {other}")),
        }
    }
}

/// An organizational unit named by a request, e.g. the `{id}` of
/// `/dashboard/admin/region/{id}`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OrgRef {
    pub level: OrgLevel,
    pub id: i64,
}

impl OrgRef {
    #[must_use]
    pub const fn new(level: OrgLevel, id: i64) -> Self {
        Self { level, id }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    #[serde(alias = "id_user", deserialize_with = "de_id")]
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "telp", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default, alias = "id_cluster", deserialize_with = "de_opt_id")]
    pub cluster: Option<i64>,
    #[serde(default, alias = "id_branch", deserialize_with = "de_opt_id")]
    pub branch: Option<i64>,
    #[serde(default, alias = "id_region", deserialize_with = "de_opt_id")]
    pub region: Option<i64>,
    #[serde(default, alias = "id_area", deserialize_with = "de_opt_id")]
    pub area: Option<i64>,
}

impl User {
    /// The user's own unit id at `level`, if the backend assigned one.
    #[must_use]
    pub const fn org_id(&self, level: OrgLevel) -> Option<i64> {
        match level {
            OrgLevel::Area => self.area,
            OrgLevel::Region => self.region,
            OrgLevel::Branch => self.branch,
            OrgLevel::Cluster => self.cluster,
        }
    }

    /// Normalize a backend user document. The role is always resolved from the
    /// id; whatever role the backend reported is discarded.
    ///
    /// # Errors
    /// Returns an error if the document has no usable id or required fields.
    pub fn from_backend(mut value: Value) -> Result<Self, serde_json::Error> {
        let raw_id = value
            .get("id")
            .or_else(|| value.get("id_user"))
            .cloned()
            .unwrap_or(Value::Null);
        let id = de_id(raw_id)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("id_user");
            object.insert("id".to_string(), Value::from(id));
            object.insert(
                "role".to_string(),
                Value::String(Role::from_user_id(id).as_str().to_string()),
            );
        }
        serde_json::from_value(value)
    }

    /// The unit this user administers, if any.
    #[must_use]
    pub fn scope_ref(&self) -> Option<OrgRef> {
        let level = self.role.scope()?;
        self.org_id(level).map(|id| OrgRef::new(level, id))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawId {
    fn into_id<E: serde::de::Error>(self) -> Result<Option<i64>, E> {
        match self {
            Self::Int(id) => Ok(Some(id)),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(id) if id.fract() == 0.0 => Ok(Some(id as i64)),
            Self::Float(id) => Err(E::custom(format!("non-integer id: {id}"))),
            Self::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| E::custom(format!("invalid id: {trimmed}")))
            }
        }
    }
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawId>::deserialize(deserializer)? {
        Some(raw) => raw.into_id(),
        None => Ok(None),
    }
}

fn de_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer)?
        .into_id()?
        .ok_or_else(|| serde::de::Error::custom("missing user id"))
}

/// Parse a path segment as an organizational id.
#[must_use]
pub fn parse_org_id(segment: &str) -> Option<i64> {
    segment.trim().parse::<i64>().ok()
}
