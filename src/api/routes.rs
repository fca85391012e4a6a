//! Page route classification for the guard.

use regex::Regex;

use crate::auth::{user::parse_org_id, OrgLevel};

pub const LOGIN_PATH: &str = "/auth/login";
pub const ERROR_PATH: &str = "/dashboard/error";

const EXCLUDED_PREFIXES: [&str; 3] = ["api", "_next", "static"];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Route {
    Excluded,
    Auth,
    ClusterDetail(i64),
    RegionDetail(i64),
    BranchDetail(i64),
    AdminRoot(OrgLevel),
    /// `/dashboard/admin/{cluster|region|branch}/{id}` where `id` is not a number.
    UnknownUnit(OrgLevel),
    AdminOther,
    Error,
    Dashboard,
    Public,
}

/// Paths the guard never intercepts: API calls, static assets and anything
/// whose last segment carries a file extension. The extension rule does not
/// apply below `/auth` and `/dashboard`; those trees are always guarded.
#[must_use]
pub fn is_excluded(path: &str) -> bool {
    let first = path.trim_start_matches('/').split('/').next().unwrap_or_default();
    if EXCLUDED_PREFIXES.contains(&first) {
        return true;
    }
    if path == "/health" || path.ends_with("favicon.ico") {
        return true;
    }
    if is_under(path, "/auth") || is_under(path, "/dashboard") {
        return false;
    }
    let last = path.rsplit('/').next().unwrap_or_default();
    Regex::new(r"\.[^/]+$").is_ok_and(|re| re.is_match(last))
}

/// `true` for `prefix` itself and anything below it, but not `prefix` followed
/// by other characters (`/authors` is not under `/auth`).
fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

impl Route {
    #[must_use]
    pub fn classify(path: &str) -> Self {
        if is_excluded(path) {
            return Self::Excluded;
        }
        let trimmed = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };

        if is_under(trimmed, "/auth") {
            return Self::Auth;
        }
        if !is_under(trimmed, "/dashboard") {
            return Self::Public;
        }
        if is_under(trimmed, ERROR_PATH) {
            return Self::Error;
        }
        let Some(admin) = trimmed.strip_prefix("/dashboard/admin") else {
            return Self::Dashboard;
        };
        if !(admin.is_empty() || admin.starts_with('/')) {
            return Self::Dashboard;
        }

        let segments: Vec<&str> = admin.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [level] => level
                .parse::<OrgLevel>()
                .map_or(Self::AdminOther, Self::AdminRoot),
            [level, id] => match (*level, parse_org_id(id)) {
                ("cluster", Some(id)) => Self::ClusterDetail(id),
                ("region", Some(id)) => Self::RegionDetail(id),
                ("branch", Some(id)) => Self::BranchDetail(id),
                ("cluster", None) => Self::UnknownUnit(OrgLevel::Cluster),
                ("region", None) => Self::UnknownUnit(OrgLevel::Region),
                ("branch", None) => Self::UnknownUnit(OrgLevel::Branch),
                _ => Self::AdminOther,
            },
            _ => Self::AdminOther,
        }
    }

    /// Whether the route is a page that requires a session.
    #[must_use]
    pub const fn requires_session(self) -> bool {
        !matches!(self, Self::Excluded | Self::Public | Self::Auth)
    }
}
