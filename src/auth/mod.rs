//! Identity, roles, sessions and organizational access.
//!
//! Flow Overview: login resolves the role from the user id, the gateway signs a
//! session carrying the user and its organizational ids, and every later
//! request reopens that session before the guard or a handler asks
//! [`access::can_view`] whether the caller may see a given unit.

pub mod access;
pub mod role;
pub mod session;
pub mod user;

pub use access::{can_navigate, can_view};
pub use role::{Permissions, Role};
pub use session::{Session, SessionCodec, SessionError};
pub use user::{OrgLevel, OrgRef, User};
