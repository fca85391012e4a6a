//! Organizational visibility checks.

use super::{
    role::Role,
    user::{OrgRef, User},
};

/// Whether `user` may view the unit `target`.
///
/// `admin_area` sees every unit. Other admins see only the unit they own, at
/// the level they own it. Non-admins see nothing through this predicate; their
/// own data is reached through user-scoped routes instead.
#[must_use]
pub fn can_view(user: &User, target: OrgRef) -> bool {
    match user.role {
        Role::AdminArea => true,
        role => match role.scope() {
            Some(level) if level == target.level => user.org_id(level) == Some(target.id),
            _ => false,
        },
    }
}

/// [`can_view`], widened to every admin whose scope is strictly broader than
/// the target level. Descendant membership (is this branch inside my region?)
/// is enforced by the backend on the data calls that follow.
#[must_use]
pub fn can_navigate(user: &User, target: OrgRef) -> bool {
    if can_view(user, target) {
        return true;
    }
    user.role
        .scope()
        .is_some_and(|scope| scope.rank() < target.level.rank())
}
