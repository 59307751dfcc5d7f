//! UserInfoEngine (spec §4.6): scope/claims-driven claim projection plus
//! optional JOSE wrapping of the response.

use crate::error::AuthError;
use crate::models::client::Client;
use crate::models::user::User;
use auth_crypto::keystore::SigningKeyRecord;
use auth_crypto::{JoseWrapper, TokenClaims};
use serde_json::{Map, Value};

const PROFILE_CLAIMS: &[&str] = &[
    "name",
    "family_name",
    "given_name",
    "middle_name",
    "nickname",
    "preferred_username",
    "profile",
    "picture",
    "website",
    "gender",
    "birthdate",
    "zoneinfo",
    "locale",
    "updated_at",
];

pub enum UserInfoBody {
    Json(Value),
    Jwt(String),
}

pub struct UserInfoEngine {
    issuer: String,
}

impl UserInfoEngine {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into() }
    }

    /// Projects `user`'s claims according to `token`'s granted scope (and, if
    /// the client allows it, the token's `claims` request parameter), then
    /// wraps the result per the client's configured response alg/enc.
    pub fn build_response(
        &self,
        token: &TokenClaims,
        user: &User,
        client: &Client,
        signing_key: Option<&SigningKeyRecord>,
    ) -> Result<UserInfoBody, AuthError> {
        let claims = self.project_claims(token, user, client);

        if client.encrypted_response_alg.is_some() {
            let enc = client
                .encrypted_response_enc
                .as_deref()
                .ok_or_else(|| AuthError::InvalidClientMetadata {
                    message: "encrypted_response_alg set without encrypted_response_enc".into(),
                })?;
            let public_keys = client
                .public_keys
                .as_ref()
                .and_then(|v| v.as_array())
                .filter(|a| !a.is_empty())
                .ok_or_else(|| AuthError::InvalidClientMetadata {
                    message: "no client public key available for encryption".into(),
                })?;
            let client_key_pem = public_keys[0]
                .get("pem")
                .and_then(Value::as_str)
                .ok_or_else(|| AuthError::InvalidClientMetadata {
                    message: "client public key missing PEM material".into(),
                })?;
            let key = signing_key.ok_or_else(|| AuthError::ServerError {
                message: "signing key unavailable".into(),
            })?;
            let enc_alg = client.encrypted_response_alg.as_deref().unwrap_or("RSA-OAEP-256");

            let mut envelope = claims.clone();
            self.stamp_issuer_audience(&mut envelope, client);
            let jwe = JoseWrapper::sign_then_encrypt(&envelope, key, client_key_pem, enc_alg, enc)
                .map_err(|e| AuthError::ServerError { message: e.to_string() })?;
            return Ok(UserInfoBody::Jwt(jwe));
        }

        if let Some(alg) = client.signed_response_alg.as_deref() {
            let key = signing_key.ok_or_else(|| AuthError::ServerError {
                message: "signing key unavailable".into(),
            })?;
            let mut envelope = claims.clone();
            self.stamp_issuer_audience(&mut envelope, client);
            let jws = JoseWrapper::sign(&envelope, key, alg)
                .map_err(|e| AuthError::ServerError { message: e.to_string() })?;
            return Ok(UserInfoBody::Jwt(jws));
        }

        Ok(UserInfoBody::Json(claims))
    }

    fn stamp_issuer_audience(&self, claims: &mut Value, client: &Client) {
        if let Value::Object(map) = claims {
            map.insert("iss".into(), Value::String(self.issuer.clone()));
            map.insert("aud".into(), Value::String(client.client_id.clone()));
        }
    }

    fn project_claims(&self, token: &TokenClaims, user: &User, client: &Client) -> Value {
        let mut out = Map::new();
        out.insert("sub".into(), Value::String(user.id.to_string()));

        let granted_scopes: Vec<&str> = token.scope.as_deref().unwrap_or("").split_whitespace().collect();
        let profile = user.profile_data.as_object();

        if granted_scopes.contains(&"profile") {
            if let Some(profile) = profile {
                for claim in PROFILE_CLAIMS {
                    if let Some(value) = profile.get(*claim) {
                        out.insert((*claim).to_string(), value.clone());
                    }
                }
            }
        }

        if granted_scopes.contains(&"email") {
            out.insert("email".into(), Value::String(user.email.clone()));
            out.insert("email_verified".into(), Value::Bool(user.email_verified));
        }

        if granted_scopes.contains(&"phone") {
            if let Some(phone) = &user.phone {
                out.insert("phone_number".into(), Value::String(phone.clone()));
                out.insert("phone_number_verified".into(), Value::Bool(user.phone_verified));
            }
        }

        if granted_scopes.contains(&"address") {
            if let Some(profile) = profile {
                if let Some(address) = profile.get("address") {
                    out.insert("address".into(), address.clone());
                }
            }
        }

        if client.allow_claims_without_scope {
            if let Some(requested) = token
                .claims
                .as_ref()
                .and_then(|c| c.get("userinfo"))
                .and_then(Value::as_object)
            {
                if let Some(profile) = profile {
                    for claim_name in requested.keys() {
                        if out.contains_key(claim_name) {
                            continue;
                        }
                        if let Some(value) = profile.get(claim_name) {
                            out.insert(claim_name.clone(), value.clone());
                        }
                    }
                }
            }
        }

        if let Some(updated_at) = out.get("updated_at").cloned() {
            out.insert("updated_at".into(), normalize_updated_at(updated_at));
        }

        Value::Object(out)
    }
}

fn normalize_updated_at(value: Value) -> Value {
    match value {
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| Value::from(dt.timestamp()))
            .unwrap_or(Value::String(s)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::ClientAuthMethod;
    use chrono::Utc;
    use uuid::Uuid;

    fn token(scope: &str) -> TokenClaims {
        TokenClaims {
            iss: "https://op/".into(),
            sub: "u1".into(),
            aud: auth_crypto::Audience::Single("https://op/".into()),
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
            nbf: None,
            jti: "j1".into(),
            scope: Some(scope.to_string()),
            client_id: "c1".into(),
            rtv: 1,
            cnf: None,
            act: None,
            resource: None,
            authorization_details: None,
            preferred_username: None,
            claims: None,
        }
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".into(),
            email_verified: true,
            phone: Some("+15555550123".into()),
            phone_verified: false,
            password_hash: None,
            password_changed_at: None,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            last_login_ip: None,
            mfa_enabled: false,
            mfa_secret: None,
            backup_codes: None,
            risk_score: 0.0,
            profile_data: serde_json::json!({"name": "Alice", "given_name": "Alice"}),
            preferences: serde_json::json!({}),
            status: crate::models::user::UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn plain_client() -> Client {
        Client {
            client_id: "c1".into(),
            tenant_id: Uuid::nil(),
            secret_hash: None,
            allowed_auth_methods: vec![ClientAuthMethod::None],
            public_keys: None,
            signed_response_alg: None,
            encrypted_response_alg: None,
            encrypted_response_enc: None,
            allow_claims_without_scope: false,
            policy_flags: serde_json::json!({}),
        }
    }

    #[test]
    fn email_scope_projects_email_fields() {
        let engine = UserInfoEngine::new("https://op/");
        let body = engine.build_response(&token("openid email"), &user(), &plain_client(), None).unwrap();
        let UserInfoBody::Json(value) = body else { panic!("expected json") };
        assert_eq!(value["email"], "alice@example.com");
        assert_eq!(value["email_verified"], true);
        assert!(value.get("phone_number").is_none());
    }

    #[test]
    fn no_scope_yields_only_sub() {
        let engine = UserInfoEngine::new("https://op/");
        let body = engine.build_response(&token("openid"), &user(), &plain_client(), None).unwrap();
        let UserInfoBody::Json(value) = body else { panic!("expected json") };
        assert_eq!(value.as_object().unwrap().len(), 1);
    }

    #[test]
    fn encryption_without_public_key_is_invalid_client_metadata() {
        let mut client = plain_client();
        client.encrypted_response_alg = Some("RSA-OAEP-256".into());
        client.encrypted_response_enc = Some("A256GCM".into());
        let engine = UserInfoEngine::new("https://op/");
        let err = engine.build_response(&token("openid"), &user(), &client, None).unwrap_err();
        assert!(matches!(err, AuthError::InvalidClientMetadata { .. }));
    }
}
