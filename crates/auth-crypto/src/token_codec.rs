//! Structural JWT parsing and signature/issuer/audience verification,
//! generalized from `jwt::JwtService` to accept an externally resolved
//! verification key (one per `kid`, supplied by `KeyStore`) instead of a
//! single hardcoded test keypair (spec §4.4).

use crate::claims::TokenClaims;
use crate::keystore::SigningKeyRecord;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenCodecError {
    #[error("malformed token")]
    MalformedToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
}

#[derive(Debug, Clone, Default)]
pub struct TokenHeader {
    pub kid: Option<String>,
    pub alg: Option<String>,
    pub typ: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions<'a> {
    pub audience: Option<&'a str>,
    pub skip_audience: bool,
}

pub struct TokenCodec;

impl TokenCodec {
    /// Extract claims without checking the signature. Used for the
    /// RFC 7662 "unverified parse" step and for anything that needs the
    /// claim shape before a key is resolved.
    pub fn parse_unverified(token: &str) -> Result<TokenClaims, TokenCodecError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let dummy_key = DecodingKey::from_secret(b"unverified");
        let data = decode::<TokenClaims>(token, &dummy_key, &validation)
            .map_err(|_| TokenCodecError::MalformedToken)?;
        Ok(data.claims)
    }

    pub fn peek_header(token: &str) -> Result<TokenHeader, TokenCodecError> {
        let header = decode_header(token).map_err(|_| TokenCodecError::MalformedToken)?;
        Ok(TokenHeader {
            kid: header.kid,
            alg: Some(format!("{:?}", header.alg)),
            typ: header.typ,
        })
    }

    /// Verify signature, `iss`, `exp`, and optionally `aud`, against a
    /// specific decoding key. Never leaks the discriminating reason in the
    /// `Ok`/`Err` shape beyond the coarse error variants the caller maps to
    /// `{active:false}` — the pipeline, not this function, enforces that
    /// discriminators stay out of HTTP responses.
    pub fn verify(
        token: &str,
        decoding_key: &DecodingKey,
        expected_issuer: &str,
        options: VerifyOptions<'_>,
    ) -> Result<TokenClaims, TokenCodecError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[expected_issuer]);
        validation.validate_exp = true;
        validation.validate_nbf = false; // nbf is checked explicitly by the pipeline (step 12)
        validation.validate_aud = false; // audience membership is array-aware; checked below

        let data = decode::<TokenClaims>(token, decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenCodecError::ExpiredToken,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => TokenCodecError::IssuerMismatch,
                jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_) => TokenCodecError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::Json(_) | jsonwebtoken::errors::ErrorKind::Utf8(_) => {
                    TokenCodecError::MalformedToken
                }
                _ => TokenCodecError::InvalidSignature,
            }
        })?;

        if !options.skip_audience {
            if let Some(expected_aud) = options.audience {
                if !data.claims.aud.contains(expected_aud) {
                    return Err(TokenCodecError::AudienceMismatch);
                }
            }
        }

        Ok(data.claims)
    }

    pub fn verify_with_key_record(
        token: &str,
        key: &SigningKeyRecord,
        expected_issuer: &str,
        options: VerifyOptions<'_>,
    ) -> Result<TokenClaims, TokenCodecError> {
        let decoding_key = key
            .decoding_key()
            .map_err(|_| TokenCodecError::InvalidSignature)?;
        Self::verify(token, &decoding_key, expected_issuer, options)
    }

    /// Sign an arbitrary serializable claim set with the supplied key,
    /// setting `kid` in the header. Used by `UserInfoEngine`'s
    /// `signed_response_alg` path and by test fixtures that need a real
    /// access token.
    pub fn encode<T: Serialize>(
        claims: &T,
        encoding_key: &EncodingKey,
        kid: &str,
    ) -> Result<String, TokenCodecError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, encoding_key).map_err(|_| TokenCodecError::MalformedToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Audience;
    use chrono::Utc;

    fn test_claims(iss: &str, aud: Audience, exp_offset_secs: i64) -> TokenClaims {
        let now = Utc::now().timestamp();
        TokenClaims {
            iss: iss.to_string(),
            sub: "u1".to_string(),
            aud,
            exp: now + exp_offset_secs,
            iat: now,
            nbf: None,
            jti: "j1".to_string(),
            scope: Some("openid profile".to_string()),
            client_id: "c1".to_string(),
            rtv: 1,
            cnf: None,
            act: None,
            resource: None,
            authorization_details: None,
            preferred_username: None,
            claims: None,
        }
    }

    fn test_keys() -> (EncodingKey, DecodingKey) {
        let private = include_str!("../test_keys/private_key.pem");
        let public = include_str!("../test_keys/public_key.pem");
        (
            EncodingKey::from_rsa_pem(private.as_bytes()).unwrap(),
            DecodingKey::from_rsa_pem(public.as_bytes()).unwrap(),
        )
    }

    #[test]
    fn round_trips_valid_token() {
        let (enc, dec) = test_keys();
        let claims = test_claims("https://op/", Audience::Single("https://op/".into()), 3600);
        let token = TokenCodec::encode(&claims, &enc, "k1").unwrap();

        let verified = TokenCodec::verify(
            &token,
            &dec,
            "https://op/",
            VerifyOptions { audience: Some("https://op/"), skip_audience: false },
        )
        .unwrap();
        assert_eq!(verified.sub, "u1");
    }

    #[test]
    fn rejects_wrong_issuer() {
        let (enc, dec) = test_keys();
        let claims = test_claims("https://evil/", Audience::Single("https://op/".into()), 3600);
        let token = TokenCodec::encode(&claims, &enc, "k1").unwrap();

        let err = TokenCodec::verify(
            &token,
            &dec,
            "https://op/",
            VerifyOptions { audience: None, skip_audience: true },
        )
        .unwrap_err();
        assert!(matches!(err, TokenCodecError::IssuerMismatch));
    }

    #[test]
    fn rejects_expired_token() {
        let (enc, dec) = test_keys();
        let claims = test_claims("https://op/", Audience::Single("https://op/".into()), -10);
        let token = TokenCodec::encode(&claims, &enc, "k1").unwrap();

        let err = TokenCodec::verify(
            &token,
            &dec,
            "https://op/",
            VerifyOptions { audience: None, skip_audience: true },
        )
        .unwrap_err();
        assert!(matches!(err, TokenCodecError::ExpiredToken));
    }

    #[test]
    fn audience_membership_is_array_aware() {
        let (enc, dec) = test_keys();
        let claims = test_claims(
            "https://op/",
            Audience::Multiple(vec!["https://other/".into(), "https://op/".into()]),
            3600,
        );
        let token = TokenCodec::encode(&claims, &enc, "k1").unwrap();

        let verified = TokenCodec::verify(
            &token,
            &dec,
            "https://op/",
            VerifyOptions { audience: Some("https://op/"), skip_audience: false },
        )
        .unwrap();
        assert!(verified.aud.contains("https://op/"));
    }

    #[test]
    fn peek_header_reports_kid() {
        let (enc, _dec) = test_keys();
        let claims = test_claims("https://op/", Audience::Single("https://op/".into()), 3600);
        let token = TokenCodec::encode(&claims, &enc, "kid-123").unwrap();
        let header = TokenCodec::peek_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("kid-123"));
    }
}
