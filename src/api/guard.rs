//! Route guard: decides, per page navigation, whether to serve the page or
//! redirect the caller elsewhere.
//!
//! Everything except the branch admin's cluster check is decided locally from
//! the route and the session. That one case costs a single upstream
//! `check-access` round-trip; any failure there sends the caller to the error
//! page, never to the page itself.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    routes::{Route, ERROR_PATH, LOGIN_PATH},
    AppState,
};
use crate::{
    auth::{can_navigate, can_view, OrgLevel, OrgRef, Role, Session},
    backend::{Backend, Credentials},
};

#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Allow(Option<Session>),
    RedirectLogin,
    RedirectHome(Role),
    RedirectError,
}

impl Decision {
    /// Redirect target, `None` for [`Decision::Allow`].
    #[must_use]
    pub const fn location(&self) -> Option<&'static str> {
        match self {
            Self::Allow(_) => None,
            Self::RedirectLogin => Some(LOGIN_PATH),
            Self::RedirectHome(role) => Some(role.home_path()),
            Self::RedirectError => Some(ERROR_PATH),
        }
    }
}

/// Outcome of the local rules: either final, or pending the upstream check.
#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    Done(Decision),
    CheckClusterAccess {
        session: Session,
        branch_id: i64,
        cluster_id: i64,
    },
}

/// Apply the guard rules that need no network access.
pub(crate) fn evaluate(route: Route, session: Option<Session>) -> Step {
    use Decision::{Allow, RedirectError, RedirectHome, RedirectLogin};

    let session = match route {
        Route::Excluded | Route::Public => return Step::Done(Allow(session)),
        Route::Auth => {
            return Step::Done(match session {
                Some(session) => RedirectHome(session.user.role),
                None => Allow(None),
            })
        }
        _ => match session {
            Some(session) => session,
            None => return Step::Done(RedirectLogin),
        },
    };

    let role = session.user.role;
    let decision = match route {
        Route::Error | Route::Dashboard => Allow(Some(session)),
        Route::ClusterDetail(cluster_id) => match role {
            Role::AdminArea => Allow(Some(session)),
            Role::AdminBranch => {
                let Some(branch_id) = session.user.branch else {
                    warn!(user_id = session.user.id, "branch admin without branch id");
                    return Step::Done(RedirectError);
                };
                return Step::CheckClusterAccess {
                    session,
                    branch_id,
                    cluster_id,
                };
            }
            Role::AdminClusterMcot | Role::AdminClusterGm => {
                if can_view(&session.user, OrgRef::new(OrgLevel::Cluster, cluster_id)) {
                    Allow(Some(session))
                } else {
                    RedirectError
                }
            }
            _ => RedirectHome(role),
        },
        Route::UnknownUnit(OrgLevel::Cluster) => match role {
            Role::AdminArea => Allow(Some(session)),
            Role::AdminBranch | Role::AdminClusterMcot | Role::AdminClusterGm => RedirectError,
            _ => RedirectHome(role),
        },
        // No id to match, so only the broader-scope rule can allow it.
        Route::UnknownUnit(level) => {
            if role.scope().is_some_and(|scope| scope.rank() < level.rank()) {
                Allow(Some(session))
            } else {
                RedirectError
            }
        }
        Route::RegionDetail(id) => navigate(session, OrgRef::new(OrgLevel::Region, id)),
        Route::BranchDetail(id) => navigate(session, OrgRef::new(OrgLevel::Branch, id)),
        Route::AdminRoot(level) => {
            if role.covers(level) {
                Allow(Some(session))
            } else {
                RedirectHome(role)
            }
        }
        Route::AdminOther => {
            if role.is_admin() {
                Allow(Some(session))
            } else {
                RedirectHome(role)
            }
        }
        Route::Excluded | Route::Public | Route::Auth => Allow(Some(session)),
    };
    Step::Done(decision)
}

fn navigate(session: Session, target: OrgRef) -> Decision {
    if can_navigate(&session.user, target) {
        Decision::Allow(Some(session))
    } else {
        Decision::RedirectError
    }
}

/// Full decision for one navigation, including the upstream check when needed.
pub async fn decide(
    backend: &Backend,
    route: Route,
    session: Option<Session>,
    headers: &HeaderMap,
) -> Decision {
    match evaluate(route, session) {
        Step::Done(decision) => decision,
        Step::CheckClusterAccess {
            session,
            branch_id,
            cluster_id,
        } => {
            let credentials = Credentials::for_request(Some(&session), headers);
            match backend
                .check_cluster_access(branch_id, cluster_id, &credentials)
                .await
            {
                Ok(true) => Decision::Allow(Some(session)),
                Ok(false) => {
                    info!(branch_id, cluster_id, "cluster outside branch");
                    Decision::RedirectError
                }
                Err(err) => {
                    warn!(branch_id, cluster_id, "check-access failed: {err}");
                    Decision::RedirectError
                }
            }
        }
    }
}

/// Middleware entry point.
pub async fn guard(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let route = Route::classify(&path);
    if route == Route::Excluded {
        return next.run(request).await;
    }

    let session = state.codec.from_headers(request.headers(), Utc::now());
    let decision = decide(&state.backend, route, session, request.headers()).await;

    match decision {
        Decision::Allow(session) => {
            debug!(%path, ?route, "allow");
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        redirect => {
            let location = redirect.location().unwrap_or(ERROR_PATH);
            info!(%path, ?route, %location, "redirect");
            Redirect::to(location).into_response()
        }
    }
}
