/*
 * Responsibility
 * - handler が受け取る独自 extractor の公開
 */
pub mod auth_claims;

pub use auth_claims::AuthClaims;
