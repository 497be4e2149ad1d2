/// Router Module Index
///
/// Organizes the routing by access level. Access control is applied at the
/// module level (via Axum layers) so a protected endpoint cannot be exposed by
/// forgetting an extractor.

/// Routes accessible to every visitor, logged in or not.
pub mod public;

/// Routes protected by the `require_login` route layer.
/// Ownership of the target restaurant is checked inside the handlers.
pub mod authenticated;
