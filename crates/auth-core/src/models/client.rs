//! OAuth/OIDC client registration model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    SecretBasic,
    SecretPost,
    PrivateKeyJwt,
    None,
}

/// A registered relying party. Looked up read-only by the introspection and
/// UserInfo engines; creation/rotation is out of scope here (management API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,
    pub tenant_id: Uuid,
    pub secret_hash: Option<String>,
    pub allowed_auth_methods: Vec<ClientAuthMethod>,
    /// JWK set used to validate `private_key_jwt` assertions and, separately,
    /// to encrypt UserInfo responses when `encrypted_response_alg` is set.
    pub public_keys: Option<serde_json::Value>,
    pub signed_response_alg: Option<String>,
    pub encrypted_response_alg: Option<String>,
    pub encrypted_response_enc: Option<String>,
    pub allow_claims_without_scope: bool,
    pub policy_flags: serde_json::Value,
}

impl Client {
    /// §3 invariant: `encrypted_response_enc` must accompany `encrypted_response_alg`,
    /// and a public key must be present to encrypt against.
    pub fn has_consistent_jose_config(&self) -> bool {
        match &self.encrypted_response_alg {
            None => true,
            Some(_) => self.encrypted_response_enc.is_some() && self.public_keys.is_some(),
        }
    }

    pub fn supports_auth_method(&self, method: ClientAuthMethod) -> bool {
        self.allowed_auth_methods.contains(&method)
    }
}
