//! # Anggaran (budget and expense reporting gateway)
//!
//! `anggaran` sits in front of the budget backend. Cluster staff submit expense
//! evidence against spending categories (poin); administrators review usage
//! against recommended budgets along the organizational hierarchy.
//!
//! ## Organizational hierarchy
//!
//! Area -> Region -> Branch -> Cluster -> User. Every admin role owns exactly one
//! unit at one level; `admin_area` sees everything.
//!
//! ## Sessions
//!
//! The gateway is the only issuer of the `session` cookie. The value is a
//! base64url JSON document followed by an HMAC-SHA256 tag, so a client can read
//! its own session but cannot forge or extend it. The same value is accepted as a
//! bearer token; there is no second credential store.
//!
//! ## Route guard
//!
//! Every page navigation (`/auth/*`, `/dashboard/*`) passes through the guard,
//! which decides between allow, redirect to login, redirect to the role's
//! dashboard root, or redirect to the error page. Branch admins opening a cluster
//! page trigger one upstream `check-access` call.

pub mod api;
pub mod auth;
pub mod backend;
pub mod budget;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
