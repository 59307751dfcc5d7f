//! Database repository modules

pub mod refresh_token_repository;
pub mod revoked_token_repository;
pub mod role_repository;
pub mod user_repository;

pub use refresh_token_repository::{RefreshTokenError, RefreshTokenRecord, RefreshTokenRepository};
pub use revoked_token_repository::{
    RevokedTokenError, RevokedTokenRecord, RevokedTokenRepository, TokenType,
};
pub use role_repository::*;
pub use user_repository::*;

pub mod api_key_repository;
pub mod client_repository;
pub mod key_repository;
pub mod rebac_repository;
pub mod revocation_repository;

pub use api_key_repository::*;
pub use client_repository::*;
pub use key_repository::*;
pub use rebac_repository::*;
pub use revocation_repository::*;
