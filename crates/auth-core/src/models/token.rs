//! Token model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub token_family: Uuid,
    pub token_hash: String,
    pub device_fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    pub tenant_id: String,
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
    pub scope: Option<String>,
}

// `Audience`, `Confirmation`, `TokenClaims`, and `TokenTypeHint` live in
// `auth_crypto::claims` — `TokenCodec` needs a concrete claims type to
// deserialize into, and `auth-core` already depends on `auth-crypto`, so
// defining them there (rather than here, which would be circular) and
// re-exporting keeps one source of truth.
pub use auth_crypto::claims::{Audience, Confirmation, TokenClaims, TokenTypeHint};

/// RFC 7662 introspection response. `Inactive` serializes to exactly
/// `{"active": false}` (property 4, information minimality); `Active` flattens
/// the populated claim fields alongside `"active": true`. A hand-written
/// `Serialize` impl enforces this shape rather than relying on
/// `skip_serializing_if` discipline on a single flat struct, since an
/// omitted-field bug there would silently violate the invariant.
#[derive(Debug, Clone)]
pub enum IntrospectionResponse {
    Inactive,
    Active(Box<ActiveIntrospection>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveIntrospection {
    pub scope: Option<String>,
    pub client_id: String,
    pub username: Option<String>,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    pub sub: String,
    pub aud: Audience,
    pub iss: String,
    pub jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<Confirmation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_details: Option<serde_json::Value>,
}

impl Serialize for IntrospectionResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            IntrospectionResponse::Inactive => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("active", &false)?;
                map.end()
            }
            IntrospectionResponse::Active(claims) => {
                let value = serde_json::to_value(claims.as_ref())
                    .map_err(serde::ser::Error::custom)?;
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("active", &true)?;
                if let serde_json::Value::Object(obj) = value {
                    for (k, v) in obj {
                        map.serialize_entry(&k, &v)?;
                    }
                }
                map.end()
            }
        }
    }
}
