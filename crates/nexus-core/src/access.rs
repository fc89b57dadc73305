//! Role checks for the actions that used to sit behind shared unlock codes.

use crate::error::{CoreError, CoreResult};
use crate::types::Actor;

/// Fails with `Unauthorized` unless `actor` is an admin.
///
/// ## Example
/// ```rust
/// use nexus_core::access::require_admin;
/// use nexus_core::Actor;
///
/// assert!(require_admin(&Actor::admin("Maria"), "delete invoices").is_ok());
/// assert!(require_admin(&Actor::staff("Jun"), "delete invoices").is_err());
/// ```
pub fn require_admin(actor: &Actor, action: &str) -> CoreResult<()> {
    if actor.is_admin() {
        return Ok(());
    }

    Err(CoreError::Unauthorized {
        action: action.to_string(),
        actor: actor.name.clone(),
    })
}
