/*!
 * Authenticated claims extractor
 *
 * Responsibility:
 * - 認可ゲートを通過したリクエストの VerifiedClaims を handler に渡す
 * - 型そのものは services::auth::VerifiedClaims (middleware と handler の契約)
 */

mod core;

pub use core::AuthClaims;
