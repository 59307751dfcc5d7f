pub mod claims;
pub mod hashing;
pub mod jose;
pub mod jwt;
pub mod keys;
pub mod keystore;
pub mod kms;
pub mod token_codec;

pub use claims::{Audience, Confirmation, TokenClaims, TokenTypeHint};
pub use jose::{JoseError, JoseWrapper, UserInfoWrapping};
pub use jwt::{JwtClaims, JwtConfig, JwtError, JwtService};
pub use keys::{KeyError, KeyManager};
pub use keystore::{
    InMemoryKeyRepository, KeyRepository, KeyStatus, KeyStore, SigningKeyRecord,
    DEFAULT_OVERLAP_RETENTION,
};
pub use kms::{HsmKeyProvider, KeyProvider, SoftKeyProvider};
pub use token_codec::{TokenCodec, TokenCodecError, TokenHeader, VerifyOptions};
