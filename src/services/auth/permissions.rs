use super::error::AuthError;
use super::verifier::VerifiedClaims;

/// Membership test of `required` in the token's permission set.
///
/// A missing `permissions` claim means the identity provider is not
/// configured to emit it (RBAC off), so that is `invalid_claims`, not a denial.
pub fn check(claims: &VerifiedClaims, required: &str) -> Result<(), AuthError> {
    let permissions = claims
        .permissions
        .as_ref()
        .ok_or(AuthError::InvalidClaims("permissions not included in token"))?;

    if permissions.contains(required) {
        Ok(())
    } else {
        Err(AuthError::Unauthorized)
    }
}
