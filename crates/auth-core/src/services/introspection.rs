//! IntrospectionEngine (spec §4.5): the RFC 7662 pipeline. HTTP-layer
//! concerns (content-type gate, form/Basic-header parsing) live in the
//! `auth-api` handler; this engine starts from an already-extracted
//! `IntrospectionRequest` and owns everything from client authentication
//! onward, mirroring how `token_service.rs`'s `TokenEngine` keeps transport
//! parsing out of the service layer.

use crate::audit::{AuditCategory, AuditEvent, AuditLogger, AuditOutcome, AuditSeverity};
use crate::error::AuthError;
use crate::models::token::{ActiveIntrospection, IntrospectionResponse};
use crate::services::client_registry::{ClientCredentials, ClientRegistry};
use crate::services::identity::UserStore;
use crate::services::revocation::RevocationStore;
use auth_cache::RequestCache;
use auth_crypto::{KeyStore, TokenCodec, TokenTypeHint, VerifyOptions};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct IntrospectionRequest {
    pub tenant_id: Uuid,
    pub token: Option<String>,
    pub token_type_hint: Option<TokenTypeHint>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_assertion: Option<String>,
}

pub struct IntrospectionConfig {
    pub issuer: String,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub strict_validation: bool,
    pub expected_audience: Option<String>,
}

pub struct IntrospectionEngine {
    clients: Arc<ClientRegistry>,
    keys: Arc<KeyStore>,
    revocation: Arc<dyn RevocationStore>,
    cache: Arc<RequestCache>,
    users: Arc<dyn UserStore>,
    audit: Arc<dyn AuditLogger>,
    config: IntrospectionConfig,
}

impl IntrospectionEngine {
    pub fn new(
        clients: Arc<ClientRegistry>,
        keys: Arc<KeyStore>,
        revocation: Arc<dyn RevocationStore>,
        cache: Arc<RequestCache>,
        users: Arc<dyn UserStore>,
        audit: Arc<dyn AuditLogger>,
        config: IntrospectionConfig,
    ) -> Self {
        Self {
            clients,
            keys,
            revocation,
            cache,
            users,
            audit,
            config,
        }
    }

    pub async fn introspect(&self, request: IntrospectionRequest) -> Result<IntrospectionResponse, AuthError> {
        // Step 4: required-parameter check.
        let token = request
            .token
            .as_deref()
            .ok_or_else(|| AuthError::InvalidRequest { field: "token".into() })?;

        // Step 5/6: client identification and authentication.
        let client_id = request
            .client_id
            .clone()
            .ok_or(AuthError::InvalidClient)?;
        let creds = ClientCredentials {
            client_id,
            client_secret: request.client_secret.clone(),
            client_assertion: request.client_assertion.clone(),
        };
        let client = self.clients.authenticate(request.tenant_id, &creds).await?;

        // Step 7: unverified parse — failure is a normal inactive result.
        let Ok(unverified) = TokenCodec::parse_unverified(token) else {
            return Ok(IntrospectionResponse::Inactive);
        };

        // Step 8: cache fast-path.
        if self.config.cache_enabled {
            let cache_key = RequestCache::introspection_key(&unverified.jti);
            if let Some(cached) = self.cache.get::<ActiveIntrospection>(&cache_key).await {
                metrics::counter!("introspection_cache_hit").increment(1);
                if cached.exp < Utc::now().timestamp() {
                    self.cache.delete(&cache_key).await;
                    return Ok(IntrospectionResponse::Inactive);
                }
                let fresh = self.revocation_is_fresh(&request, &cached).await?;
                if !fresh {
                    self.cache.delete(&cache_key).await;
                    return Ok(IntrospectionResponse::Inactive);
                }
                return Ok(IntrospectionResponse::Active(Box::new(cached)));
            }
            metrics::counter!("introspection_cache_miss").increment(1);
        }

        // Step 9: key resolution.
        let header = TokenCodec::peek_header(token).map_err(|_| AuthError::ServerError {
            message: "malformed token header".into(),
        })?;
        let key = self
            .keys
            .get_key_by_kid(request.tenant_id, header.kid.as_deref())
            .await
            .map_err(|e| AuthError::ServerError { message: e.to_string() })?
            .ok_or_else(|| AuthError::ServerError { message: "signing key not found".into() })?;

        // Step 10: signature/issuer/audience verify.
        let primary_aud = unverified.aud.primary().map(str::to_string);
        let verified = match TokenCodec::verify_with_key_record(
            token,
            &key,
            &self.config.issuer,
            VerifyOptions {
                audience: primary_aud.as_deref(),
                skip_audience: primary_aud.is_none(),
            },
        ) {
            Ok(claims) => claims,
            Err(_) => return Ok(IntrospectionResponse::Inactive),
        };

        // Step 11: optional strict validation.
        if self.config.strict_validation {
            if let Some(expected) = &self.config.expected_audience {
                if !verified.aud.contains(expected) {
                    return Ok(IntrospectionResponse::Inactive);
                }
            }
            if verified.client_id != client.client_id
                && self
                    .clients
                    .resolve(request.tenant_id, &verified.client_id)
                    .await?
                    .is_none()
            {
                return Ok(IntrospectionResponse::Inactive);
            }
        }

        // Step 12: time-window checks.
        let now = Utc::now().timestamp();
        if let Some(nbf) = verified.nbf {
            if nbf > now {
                return Ok(IntrospectionResponse::Inactive);
            }
        }
        if verified.exp < now {
            return Ok(IntrospectionResponse::Inactive);
        }

        // Step 13: revocation/existence.
        let hint = request.token_type_hint.unwrap_or(TokenTypeHint::AccessToken);
        match hint {
            TokenTypeHint::RefreshToken => {
                let record = self
                    .revocation
                    .get_refresh(&verified.sub, verified.rtv, &verified.client_id, &verified.jti)
                    .await?;
                if record.is_none() {
                    return Ok(IntrospectionResponse::Inactive);
                }
            }
            TokenTypeHint::AccessToken => {
                if self.revocation.is_access_revoked(&verified.jti).await? {
                    return Ok(IntrospectionResponse::Inactive);
                }
            }
        }

        // Step 14: user status — datastore errors here are non-fatal.
        if let Ok(user_id) = Uuid::parse_str(&verified.sub) {
            if let Ok(Some(user)) = self.users.find_by_id(user_id).await {
                use crate::models::user::UserStatus;
                let now_utc = Utc::now();
                let locked = user.locked_until.is_some_and(|until| until > now_utc);
                if matches!(user.status, UserStatus::Suspended | UserStatus::Deleted) || locked {
                    return Ok(IntrospectionResponse::Inactive);
                }
            }
        }

        // Step 15: response assembly.
        let active = ActiveIntrospection {
            scope: verified.scope.clone(),
            client_id: verified.client_id.clone(),
            username: verified.preferred_username.clone(),
            token_type: verified.token_type().to_string(),
            exp: verified.exp,
            iat: verified.iat,
            nbf: verified.nbf,
            sub: verified.sub.clone(),
            aud: verified.aud.clone(),
            iss: verified.iss.clone(),
            jti: verified.jti.clone(),
            cnf: verified.cnf.clone(),
            act: verified.act.clone(),
            resource: verified.resource.clone(),
            authorization_details: verified.authorization_details.clone(),
        };

        // Step 16: cache write-through (active responses only).
        if self.config.cache_enabled {
            let cache_key = RequestCache::introspection_key(&verified.jti);
            let _ = self.cache.set(&cache_key, &active, self.config.cache_ttl).await;
        }

        // Step 17: fire-and-forget event publication.
        self.audit
            .log(AuditEvent {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                category: AuditCategory::Authentication,
                action: "token.access.introspected".to_string(),
                severity: AuditSeverity::Info,
                actor_id: Uuid::parse_str(&verified.sub).ok(),
                resource_id: Some(verified.jti.clone()),
                ip_address: None,
                user_agent: None,
                tenant_id: Some(request.tenant_id),
                metadata: serde_json::json!({ "client_id": verified.client_id }),
                outcome: AuditOutcome::Success,
            })
            .await;

        Ok(IntrospectionResponse::Active(Box::new(active)))
    }

    async fn revocation_is_fresh(
        &self,
        request: &IntrospectionRequest,
        cached: &ActiveIntrospection,
    ) -> Result<bool, AuthError> {
        let hint = request.token_type_hint.unwrap_or(TokenTypeHint::AccessToken);
        match hint {
            TokenTypeHint::RefreshToken => Ok(self
                .revocation
                .get_refresh(&cached.sub, 1, &cached.client_id, &cached.jti)
                .await?
                .is_some()),
            TokenTypeHint::AccessToken => Ok(!self.revocation.is_access_revoked(&cached.jti).await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::{Client, ClientAuthMethod};
    use crate::models::user::{User, UserStatus};
    use crate::services::client_registry::InMemoryClientStore;
    use crate::services::revocation::InMemoryRevocationStore;
    use async_trait::async_trait;
    use auth_cache::MultiLevelCache;
    use auth_crypto::claims::{Audience, TokenClaims};
    use auth_crypto::keystore::{InMemoryKeyRepository, KeyRepository, KeyStatus, SigningKeyRecord};
    use chrono::Utc;

    const PRIVATE_PEM: &str = include_str!("../../../auth-crypto/test_keys/private_key.pem");
    const PUBLIC_PEM: &str = include_str!("../../../auth-crypto/test_keys/public_key.pem");
    const ISSUER: &str = "https://op.example/";

    struct TestUserStore {
        users: dashmap::DashMap<Uuid, User>,
    }

    impl TestUserStore {
        fn new() -> Self {
            Self { users: dashmap::DashMap::new() }
        }

        fn insert(&self, user: User) {
            self.users.insert(user.id, user);
        }
    }

    #[async_trait]
    impl UserStore for TestUserStore {
        async fn find_by_email(&self, _email: &str, _tenant_id: Uuid) -> Result<Option<User>, AuthError> {
            unimplemented!()
        }
        async fn find_by_phone(&self, _phone: &str, _tenant_id: Uuid) -> Result<Option<User>, AuthError> {
            unimplemented!()
        }
        async fn find_by_identifier(&self, _identifier: &str, _tenant_id: Uuid) -> Result<Option<User>, AuthError> {
            unimplemented!()
        }
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
            Ok(self.users.get(&id).map(|u| u.clone()))
        }
        async fn create(
            &self,
            _user: crate::models::CreateUserRequest,
            _password_hash: String,
            _tenant_id: Uuid,
        ) -> Result<User, AuthError> {
            unimplemented!()
        }
        async fn update_status(&self, _id: Uuid, _status: UserStatus) -> Result<(), AuthError> {
            unimplemented!()
        }
        async fn increment_failed_attempts(&self, _id: Uuid) -> Result<u32, AuthError> {
            unimplemented!()
        }
        async fn reset_failed_attempts(&self, _id: Uuid) -> Result<(), AuthError> {
            unimplemented!()
        }
        async fn record_login(&self, _id: Uuid, _ip: Option<String>) -> Result<(), AuthError> {
            unimplemented!()
        }
        async fn update(&self, _user: crate::models::UpdateUserRequest) -> Result<User, AuthError> {
            unimplemented!()
        }
        async fn update_password_hash(&self, _id: Uuid, _password_hash: String) -> Result<(), AuthError> {
            unimplemented!()
        }
        async fn set_email_verified(&self, _id: Uuid, _verified: bool) -> Result<(), AuthError> {
            unimplemented!()
        }
        async fn set_phone_verified(&self, _id: Uuid, _verified: bool) -> Result<(), AuthError> {
            unimplemented!()
        }
    }

    fn active_user(id: Uuid) -> User {
        User {
            id,
            email: "alice@example.com".into(),
            email_verified: true,
            phone: None,
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
            profile_data: serde_json::json!({}),
            preferences: serde_json::json!({}),
            status: UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn plain_client() -> Client {
        Client {
            client_id: "c1".into(),
            tenant_id: Uuid::nil(),
            secret_hash: Some(
                auth_crypto::hashing::PasswordHasher::new()
                    .hash_password("s3cret")
                    .unwrap(),
            ),
            allowed_auth_methods: vec![ClientAuthMethod::SecretBasic],
            public_keys: None,
            signed_response_alg: None,
            encrypted_response_alg: None,
            encrypted_response_enc: None,
            allow_claims_without_scope: false,
            policy_flags: serde_json::json!({}),
        }
    }

    fn signing_key() -> SigningKeyRecord {
        SigningKeyRecord {
            kid: "k1".into(),
            status: KeyStatus::Active,
            public_pem: PUBLIC_PEM.to_string(),
            private_pem: Some(PRIVATE_PEM.to_string()),
            public_jwk: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    fn claims(exp_offset_secs: i64, sub: &str) -> TokenClaims {
        let now = Utc::now().timestamp();
        TokenClaims {
            iss: ISSUER.to_string(),
            sub: sub.to_string(),
            aud: Audience::Single(ISSUER.to_string()),
            exp: now + exp_offset_secs,
            iat: now,
            nbf: None,
            jti: uuid::Uuid::new_v4().to_string(),
            scope: Some("openid profile".to_string()),
            client_id: "c1".to_string(),
            rtv: 1,
            cnf: None,
            act: None,
            resource: None,
            authorization_details: None,
            preferred_username: Some("alice".into()),
            claims: None,
        }
    }

    struct Harness {
        engine: IntrospectionEngine,
        user_id: Uuid,
        revocation: Arc<InMemoryRevocationStore>,
    }

    /// Builds an engine with a freshly seeded client/key store and the given
    /// user record. Every test gets its own `Harness` so revocation/cache
    /// state never leaks across cases.
    async fn build(user: User, cache_enabled: bool, strict: bool, expected_audience: Option<&str>) -> Harness {
        let client_store = InMemoryClientStore::new();
        client_store.upsert(plain_client()).await.unwrap();
        let clients = Arc::new(ClientRegistry::new(Arc::new(client_store)));

        let key_repo = InMemoryKeyRepository::new();
        key_repo.insert(Uuid::nil(), signing_key()).await.unwrap();
        let keys = Arc::new(KeyStore::new(Arc::new(key_repo)));

        let revocation = Arc::new(InMemoryRevocationStore::new());
        let cache = Arc::new(RequestCache::new(MultiLevelCache::new(None).unwrap()));

        let user_id = user.id;
        let store = TestUserStore::new();
        store.insert(user);
        let users: Arc<dyn UserStore> = Arc::new(store);

        let engine = IntrospectionEngine::new(
            clients,
            keys,
            revocation.clone(),
            cache,
            users,
            Arc::new(crate::audit::TracingAuditLogger),
            IntrospectionConfig {
                issuer: ISSUER.to_string(),
                cache_enabled,
                cache_ttl: Duration::from_secs(60),
                strict_validation: strict,
                expected_audience: expected_audience.map(str::to_string),
            },
        );
        Harness { engine, user_id, revocation }
    }

    async fn harness(cache_enabled: bool, strict: bool, expected_audience: Option<&str>) -> Harness {
        build(active_user(Uuid::new_v4()), cache_enabled, strict, expected_audience).await
    }

    fn request(token: String) -> IntrospectionRequest {
        IntrospectionRequest {
            tenant_id: Uuid::nil(),
            token: Some(token),
            token_type_hint: None,
            client_id: Some("c1".into()),
            client_secret: Some("s3cret".into()),
            client_assertion: None,
        }
    }

    fn sign(sub: &str, exp_offset_secs: i64) -> String {
        let key = signing_key();
        TokenCodec::encode(&claims(exp_offset_secs, sub), &key.encoding_key().unwrap(), "k1").unwrap()
    }

    #[tokio::test]
    async fn valid_token_is_active() {
        let h = harness(true, false, None).await;
        let token = sign(&h.user_id.to_string(), 3600);

        let response = h.engine.introspect(request(token)).await.unwrap();
        match response {
            IntrospectionResponse::Active(active) => {
                assert_eq!(active.client_id, "c1");
                assert_eq!(active.token_type, "Bearer");
            }
            IntrospectionResponse::Inactive => panic!("expected active"),
        }
    }

    #[tokio::test]
    async fn expired_token_is_inactive() {
        let h = harness(true, false, None).await;
        let token = sign(&h.user_id.to_string(), -10);

        let response = h.engine.introspect(request(token)).await.unwrap();
        assert!(matches!(response, IntrospectionResponse::Inactive));
    }

    #[tokio::test]
    async fn malformed_token_is_inactive() {
        let h = harness(true, false, None).await;
        let response = h.engine.introspect(request("not-a-jwt".into())).await.unwrap();
        assert!(matches!(response, IntrospectionResponse::Inactive));
    }

    #[tokio::test]
    async fn unknown_client_credentials_are_rejected() {
        let h = harness(true, false, None).await;
        let token = sign(&h.user_id.to_string(), 3600);
        let mut req = request(token);
        req.client_secret = Some("wrong".into());

        let err = h.engine.introspect(req).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient));
    }

    #[tokio::test]
    async fn revoked_access_token_is_inactive() {
        let h = harness(true, false, None).await;
        let token = sign(&h.user_id.to_string(), 3600);
        let unverified = TokenCodec::parse_unverified(&token).unwrap();
        h.revocation.revoke_access(&unverified.jti, chrono::Duration::hours(1)).await.unwrap();

        let response = h.engine.introspect(request(token)).await.unwrap();
        assert!(matches!(response, IntrospectionResponse::Inactive));
    }

    #[tokio::test]
    async fn suspended_user_is_inactive() {
        let mut user = active_user(Uuid::new_v4());
        user.status = UserStatus::Suspended;
        let h = build(user, true, false, None).await;
        let token = sign(&h.user_id.to_string(), 3600);

        let response = h.engine.introspect(request(token)).await.unwrap();
        assert!(matches!(response, IntrospectionResponse::Inactive));
    }

    #[tokio::test]
    async fn strict_validation_rejects_unexpected_audience() {
        let h = harness(false, true, Some("https://other-aud/")).await;
        let token = sign(&h.user_id.to_string(), 3600);

        let response = h.engine.introspect(request(token)).await.unwrap();
        assert!(matches!(response, IntrospectionResponse::Inactive));
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_reverify() {
        let h = harness(true, false, None).await;
        let token = sign(&h.user_id.to_string(), 3600);

        let first = h.engine.introspect(request(token.clone())).await.unwrap();
        assert!(matches!(first, IntrospectionResponse::Active(_)));

        let second = h.engine.introspect(request(token)).await.unwrap();
        assert!(matches!(second, IntrospectionResponse::Active(_)));
    }

    #[tokio::test]
    async fn cache_hit_still_catches_revocation() {
        let h = harness(true, false, None).await;
        let token = sign(&h.user_id.to_string(), 3600);

        let first = h.engine.introspect(request(token.clone())).await.unwrap();
        assert!(matches!(first, IntrospectionResponse::Active(_)));

        let unverified = TokenCodec::parse_unverified(&token).unwrap();
        h.revocation.revoke_access(&unverified.jti, chrono::Duration::hours(1)).await.unwrap();

        let second = h.engine.introspect(request(token)).await.unwrap();
        assert!(matches!(second, IntrospectionResponse::Inactive));
    }
}
