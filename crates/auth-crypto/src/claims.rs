//! Token claim shape shared between `TokenCodec` (structural parse/verify)
//! and anything downstream that projects claims into a response (moved here,
//! rather than into `auth-core`, because `TokenCodec::decode` needs a
//! concrete `DeserializeOwned` type and `auth-core` already depends on this
//! crate — putting it the other way round would be circular).

use serde::{Deserialize, Serialize};

/// `aud` may be a bare string or an array of strings; equality is
/// membership-based when it's an array (§4.4 design note).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Audience::Single(s) => s == value,
            Audience::Multiple(values) => values.iter().any(|v| v == value),
        }
    }

    /// The "primary" audience used as the expected audience when none is
    /// supplied explicitly to `verify` (§4.5 step 10).
    pub fn primary(&self) -> Option<&str> {
        match self {
            Audience::Single(s) => Some(s.as_str()),
            Audience::Multiple(values) => values.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Confirmation {
    pub jkt: String,
}

/// Common token claims shared by access and refresh tokens (spec §3). Models
/// the "open record with a strongly typed core" design note: named fields for
/// everything the engines read, with `serde_json::Value` extension points
/// (`authorization_details`, `claims`) for anything downstream projection
/// doesn't need to interpret structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    pub jti: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub client_id: String,
    /// Refresh token version; defaults to 1 when absent.
    #[serde(default = "default_rtv")]
    pub rtv: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<Confirmation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// The `claims` request parameter, when this token carries one (used by
    /// `UserInfoEngine`'s individually-requested-claims path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<serde_json::Value>,
}

fn default_rtv() -> u32 {
    1
}

impl TokenClaims {
    pub fn is_within_time_window(&self, now: i64) -> bool {
        self.nbf.is_none_or(|nbf| nbf <= now) && now <= self.exp
    }

    pub fn token_type(&self) -> &'static str {
        if self.cnf.is_some() {
            "DPoP"
        } else {
            "Bearer"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}
