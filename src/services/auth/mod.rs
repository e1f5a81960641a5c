pub mod error;
pub mod factory;
pub mod jwks;
pub mod permissions;
pub mod service;
pub mod verifier;

pub use error::AuthError;
pub use factory::build_auth_service;
pub use jwks::{KeyProvider, KeyProviderError, RemoteKeyProvider};
pub use service::AuthService;
pub use verifier::{TokenVerifier, VerifiedClaims};
