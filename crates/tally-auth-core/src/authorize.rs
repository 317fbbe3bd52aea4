//! Role authorization on the linear role hierarchy

use tally_types::MemberRole;

use crate::AuthError;

/// Succeeds iff `actual` is at or above `required`
pub fn authorize(actual: MemberRole, required: MemberRole) -> Result<(), AuthError> {
    if actual.satisfies(required) {
        Ok(())
    } else {
        Err(AuthError::InsufficientRole { required, actual })
    }
}

/// String form for values that have not crossed a typed boundary yet.
///
/// Unknown role strings on either side deny.
pub fn authorize_str(actual: &str, required: &str) -> bool {
    match (actual.parse::<MemberRole>(), required.parse::<MemberRole>()) {
        (Ok(actual), Ok(required)) => actual.satisfies(required),
        _ => false,
    }
}
