//! HTTP handlers and the small validation helpers they share.
//!
//! JSON handlers proxy to the backend with the caller's own credentials; the
//! page handlers only describe the page context, rendering happens elsewhere.

pub mod auth;
pub mod dashboards;
pub mod health;
pub mod locations;
pub mod marketing_fee;
pub mod pages;
pub mod recommendations;
pub mod reports;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Deserialize;
use utoipa::IntoParams;

use super::ApiError;
use crate::{
    auth::{Role, Session},
    budget::{month_name, month_number},
};

/// Lightweight email sanity check used before forwarding a registration.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// `month` / `year` query parameters accepted by the reporting endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    /// Month name (Indonesian or English) or number 1-12.
    pub month: Option<String>,
    pub year: Option<i32>,
}

/// A resolved reporting period.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Period {
    pub month: u32,
    pub year: i32,
}

impl Period {
    /// Resolve a month and year, defaulting either one to the current period.
    ///
    /// # Errors
    /// Returns `400` when a month is given but names no month.
    pub fn resolve(month: Option<&str>, year: Option<i32>) -> Result<Self, ApiError> {
        let now = Utc::now();
        let month = match month.map(str::trim).filter(|month| !month.is_empty()) {
            Some(raw) => month_number(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid month: {raw}")))?,
            None => now.month(),
        };
        Ok(Self {
            month,
            year: year.unwrap_or_else(|| now.year()),
        })
    }

    /// Month the way the backend's dashboard views expect it (Indonesian name).
    #[must_use]
    pub fn month_label(self) -> &'static str {
        month_name(self.month).unwrap_or("Januari")
    }

    /// Query pairs for backend views that take the month name.
    #[must_use]
    pub fn named_query(self) -> Vec<(&'static str, String)> {
        vec![
            ("month", self.month_label().to_string()),
            ("year", self.year.to_string()),
        ]
    }

    /// Query pairs for backend views that take the month number.
    #[must_use]
    pub fn numeric_query(self) -> Vec<(&'static str, String)> {
        vec![
            ("month", self.month.to_string()),
            ("year", self.year.to_string()),
        ]
    }
}

/// Trimmed, non-empty value of a required text field.
///
/// # Errors
/// Returns `400` naming the field when it is blank.
pub fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed)
}

/// Non-admins may only read their own evidence and totals.
pub fn may_read_user(session: &Session, user_id: i64) -> bool {
    session.user.id == user_id || session.user.role.is_admin()
}

/// Gate for the writes only `admin_area` may perform.
///
/// # Errors
/// Returns `403` naming `action` for every other role.
pub fn require_area_admin(session: &Session, action: &str) -> Result<(), ApiError> {
    if session.user.role == Role::AdminArea {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Only admin_area may {action}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;

    fn session(id: i64) -> Session {
        let user = User {
            id,
            username: "u".to_string(),
            email: None,
            phone: None,
            role: Role::from_user_id(id),
            cluster: None,
            branch: None,
            region: None,
            area: None,
        };
        Session::new(user, chrono::Duration::hours(1), Utc::now())
    }

    #[test]
    fn user_scope_for_reads() {
        assert!(may_read_user(&session(6001), 6001));
        assert!(!may_read_user(&session(6001), 6002));
        assert!(may_read_user(&session(3001), 6002));
    }

    #[test]
    fn only_area_admins_pass_the_area_gate() {
        for (id, allowed) in [(1001, true), (2001, false), (3001, false), (4001, false), (6001, false)] {
            assert_eq!(
                require_area_admin(&session(id), "set recommendations").is_ok(),
                allowed,
                "user {id}"
            );
        }
        assert!(matches!(
            require_area_admin(&session(2001), "set recommendations"),
            Err(ApiError::Forbidden(ref m)) if m == "Only admin_area may set recommendations"
        ));
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("staff@anggaran.dev"));
        assert!(!valid_email("staff@anggaran"));
        assert!(!valid_email("staff anggaran.dev"));
        assert!(!valid_email(""));
    }

    #[test]
    fn period_resolution() {
        let period = Period::resolve(Some("Maret"), Some(2024));
        assert!(matches!(period, Ok(Period { month: 3, year: 2024 })));

        let period = Period::resolve(Some(" 11 "), Some(2023));
        assert!(matches!(period, Ok(Period { month: 11, year: 2023 })));

        assert!(matches!(
            Period::resolve(Some("Smarch"), Some(2024)),
            Err(ApiError::BadRequest(_))
        ));

        let now = Utc::now();
        let period = Period::resolve(None, None);
        assert!(matches!(period, Ok(p) if (1..=12).contains(&p.month) && p.year >= now.year() - 1));
        assert!(matches!(Period::resolve(Some(""), None), Ok(_)));
    }

    #[test]
    fn period_queries() {
        let period = Period { month: 8, year: 2024 };
        assert_eq!(
            period.named_query(),
            vec![("month", "Agustus".to_string()), ("year", "2024".to_string())]
        );
        assert_eq!(period.numeric_query()[0], ("month", "8".to_string()));
    }

    #[test]
    fn required_fields() {
        assert!(matches!(required("username", "  alice "), Ok("alice")));
        assert!(matches!(required("username", "   "), Err(ApiError::BadRequest(ref m)) if m == "username is required"));
    }
}
