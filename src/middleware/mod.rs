/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: 認可ゲート (ルート単位で permission を宣言)
 * - cors / http / security_headers: Router 全体に掛ける横断的な layer
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
