//! ReBACEvaluator (spec §4.7): bounded-depth recursive evaluation of
//! relation expressions over a relationship-tuple store. Recursion is
//! expressed with `Box::pin` so each branch's future has a stable address,
//! following the recursive-evaluation shape used for authorization graphs in
//! the broader retrieved corpus (not this workspace's teacher, which has no
//! recursive evaluator of its own).

use crate::error::AuthError;
use crate::models::rebac::{EvaluationContext, RelationExpression, RelationshipTuple};
use async_trait::async_trait;
use auth_telemetry::AnomalyDetector;
use chrono::Utc;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Tuples from `(tenant, user_type:user_id)` to `(object_type:object_id)`
    /// carrying exactly `relation`, not expired as of now.
    async fn has_direct(
        &self,
        tenant_id: Uuid,
        user_type: &str,
        user_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> Result<bool, AuthError>;

    /// All tuples `(object_type:object_id, tupleset_relation, *)` — the
    /// usersets `TupleToUserset` dereferences through.
    async fn usersets_for(
        &self,
        tenant_id: Uuid,
        object_type: &str,
        object_id: &str,
        tupleset_relation: &str,
    ) -> Result<Vec<RelationshipTuple>, AuthError>;

    async fn write(&self, tuple: RelationshipTuple) -> Result<(), AuthError>;
    async fn delete(
        &self,
        tenant_id: Uuid,
        from_type: &str,
        from_id: &str,
        to_type: &str,
        to_id: &str,
        relation: &str,
    ) -> Result<(), AuthError>;

    /// Direct-tuple object ids a subject holds `relation` on. Lists only
    /// direct tuples, not the union/tuple-to-userset closure `evaluate`
    /// computes — `/api/rebac/list-objects` is a convenience index, not a
    /// substitute for `check`.
    async fn objects_for_subject(
        &self,
        tenant_id: Uuid,
        user_type: &str,
        user_id: &str,
        object_type: &str,
        relation: &str,
    ) -> Result<Vec<String>, AuthError>;

    /// Direct-tuple subjects holding `relation` on an object.
    async fn subjects_for_object(
        &self,
        tenant_id: Uuid,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> Result<Vec<(String, String)>, AuthError>;
}

pub struct InMemoryRelationshipStore {
    tuples: Arc<DashMap<Uuid, Vec<RelationshipTuple>>>,
}

impl InMemoryRelationshipStore {
    pub fn new() -> Self {
        Self {
            tuples: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryRelationshipStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelationshipStore for InMemoryRelationshipStore {
    async fn has_direct(
        &self,
        tenant_id: Uuid,
        user_type: &str,
        user_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> Result<bool, AuthError> {
        let now = Utc::now();
        Ok(self
            .tuples
            .get(&tenant_id)
            .map(|tuples| {
                tuples.iter().any(|t| {
                    t.from_type == user_type
                        && t.from_id == user_id
                        && t.to_type == object_type
                        && t.to_id == object_id
                        && t.relation == relation
                        && !t.is_expired(now)
                })
            })
            .unwrap_or(false))
    }

    async fn usersets_for(
        &self,
        tenant_id: Uuid,
        object_type: &str,
        object_id: &str,
        tupleset_relation: &str,
    ) -> Result<Vec<RelationshipTuple>, AuthError> {
        let now = Utc::now();
        Ok(self
            .tuples
            .get(&tenant_id)
            .map(|tuples| {
                tuples
                    .iter()
                    .filter(|t| {
                        t.to_type == object_type
                            && t.to_id == object_id
                            && t.relation == tupleset_relation
                            && !t.is_expired(now)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn write(&self, tuple: RelationshipTuple) -> Result<(), AuthError> {
        self.tuples.entry(tuple.tenant_id).or_default().push(tuple);
        Ok(())
    }

    async fn delete(
        &self,
        tenant_id: Uuid,
        from_type: &str,
        from_id: &str,
        to_type: &str,
        to_id: &str,
        relation: &str,
    ) -> Result<(), AuthError> {
        if let Some(mut tuples) = self.tuples.get_mut(&tenant_id) {
            tuples.retain(|t| {
                !(t.from_type == from_type
                    && t.from_id == from_id
                    && t.to_type == to_type
                    && t.to_id == to_id
                    && t.relation == relation)
            });
        }
        Ok(())
    }

    async fn objects_for_subject(
        &self,
        tenant_id: Uuid,
        user_type: &str,
        user_id: &str,
        object_type: &str,
        relation: &str,
    ) -> Result<Vec<String>, AuthError> {
        let now = Utc::now();
        Ok(self
            .tuples
            .get(&tenant_id)
            .map(|tuples| {
                tuples
                    .iter()
                    .filter(|t| {
                        t.from_type == user_type
                            && t.from_id == user_id
                            && t.to_type == object_type
                            && t.relation == relation
                            && !t.is_expired(now)
                    })
                    .map(|t| t.to_id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn subjects_for_object(
        &self,
        tenant_id: Uuid,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> Result<Vec<(String, String)>, AuthError> {
        let now = Utc::now();
        Ok(self
            .tuples
            .get(&tenant_id)
            .map(|tuples| {
                tuples
                    .iter()
                    .filter(|t| {
                        t.to_type == object_type
                            && t.to_id == object_id
                            && t.relation == relation
                            && !t.is_expired(now)
                    })
                    .map(|t| (t.from_type.clone(), t.from_id.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

struct CacheEntry {
    value: bool,
    inserted: Instant,
}

pub struct ReBACEvaluator {
    store: Arc<dyn RelationshipStore>,
    cache: DashMap<String, CacheEntry>,
    cache_ttl: Duration,
    anomaly_detector: Option<Arc<AnomalyDetector>>,
}

impl ReBACEvaluator {
    pub fn new(store: Arc<dyn RelationshipStore>, cache_ttl_seconds: u64) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            anomaly_detector: None,
        }
    }

    /// Wires an anomaly detection hook: depth-guard rejections are recorded
    /// as samples, surfacing a warning when the rolling rate of rejections
    /// deviates from baseline (`auth-telemetry::AnomalyDetector`).
    pub fn with_anomaly_detector(mut self, detector: Arc<AnomalyDetector>) -> Self {
        self.anomaly_detector = Some(detector);
        self
    }

    fn cache_key(ctx: &EvaluationContext, relation: &str) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            ctx.tenant_id, ctx.user_type, ctx.user_id, ctx.object_type, ctx.object_id, relation
        )
    }

    /// Top-level entry point: evaluates a named relation, consulting the
    /// per-evaluator cache first.
    pub async fn check(
        &self,
        expression: &RelationExpression,
        relation_name: &str,
        mut ctx: EvaluationContext,
    ) -> Result<bool, AuthError> {
        let key = Self::cache_key(&ctx, relation_name);
        if let Some(entry) = self.cache.get(&key) {
            if entry.inserted.elapsed() < self.cache_ttl {
                metrics::counter!("rebac_subtree_cache_hit").increment(1);
                return Ok(entry.value);
            }
        }
        metrics::counter!("rebac_subtree_cache_miss").increment(1);
        let result = self.evaluate(expression, &mut ctx).await?;
        metrics::histogram!("rebac_evaluation_depth").record(ctx.depth as f64);
        self.cache.insert(
            key,
            CacheEntry {
                value: result,
                inserted: Instant::now(),
            },
        );
        Ok(result)
    }

    /// Invalidates every cached decision for `tenant_id` touching
    /// `object_id` — called after a tuple write/delete targeting that
    /// object. Scoped to the tenant so a write in tenant A can't evict
    /// tenant B's unrelated cache entries for an object with the same id.
    pub fn invalidate_object(&self, tenant_id: Uuid, object_id: &str) {
        let needle = format!(":{object_id}:");
        self.cache.retain(|key, _| {
            !(key.starts_with(&format!("{tenant_id}:")) && key.contains(&needle))
        });
    }

    pub fn evaluate<'a>(
        &'a self,
        expression: &'a RelationExpression,
        ctx: &'a mut EvaluationContext,
    ) -> Pin<Box<dyn Future<Output = Result<bool, AuthError>> + Send + 'a>> {
        Box::pin(async move {
            if ctx.depth > ctx.max_depth {
                warn!(depth = ctx.depth, max_depth = ctx.max_depth, "rebac depth exceeded");
                if let Some(detector) = &self.anomaly_detector {
                    detector.record("rebac_depth_exceeded", ctx.depth as f64);
                }
                return Ok(false);
            }

            let visit_key = ctx.visit_key(expression);
            if ctx.visited.contains(&visit_key) {
                return Ok(false);
            }
            ctx.visited.insert(visit_key);

            match expression {
                RelationExpression::Direct { relation } => Ok(self
                    .store
                    .has_direct(
                        ctx.tenant_id,
                        &ctx.user_type,
                        &ctx.user_id,
                        &ctx.object_type,
                        &ctx.object_id,
                        relation,
                    )
                    .await?),

                RelationExpression::Union { children } => {
                    for child in children {
                        if self.evaluate(child, ctx).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }

                RelationExpression::Intersection { children } => {
                    for child in children {
                        if !self.evaluate(child, ctx).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }

                RelationExpression::Exclusion { base, minus } => {
                    let base_ok = self.evaluate(base, ctx).await?;
                    if !base_ok {
                        return Ok(false);
                    }
                    let minus_ok = self.evaluate(minus, ctx).await?;
                    Ok(!minus_ok)
                }

                RelationExpression::ComputedUserset { relation } => {
                    let direct = RelationExpression::Direct {
                        relation: relation.clone(),
                    };
                    self.evaluate(&direct, ctx).await
                }

                RelationExpression::TupleToUserset {
                    tupleset_relation,
                    computed_relation,
                } => {
                    let usersets = self
                        .store
                        .usersets_for(ctx.tenant_id, &ctx.object_type, &ctx.object_id, tupleset_relation)
                        .await?;
                    for userset in usersets {
                        let mut child_ctx = ctx.descend(userset.from_type.clone(), userset.from_id.clone());
                        let computed = RelationExpression::ComputedUserset {
                            relation: computed_relation.clone(),
                        };
                        if self.evaluate(&computed, &mut child_ctx).await? {
                            ctx.visited = child_ctx.visited;
                            return Ok(true);
                        }
                        ctx.visited = child_ctx.visited;
                    }
                    Ok(false)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rebac::RelationExpression as RE;

    fn ctx(tenant: Uuid) -> EvaluationContext {
        EvaluationContext::new(tenant, "user", "alice", "doc", "42", 5)
    }

    fn direct_tuple(tenant: Uuid, relation: &str) -> RelationshipTuple {
        RelationshipTuple {
            tenant_id: tenant,
            from_type: "user".into(),
            from_id: "alice".into(),
            to_type: "doc".into(),
            to_id: "42".into(),
            relation: relation.into(),
            expires_at: None,
            bidirectional: false,
        }
    }

    #[tokio::test]
    async fn union_short_circuits_on_first_true() {
        let tenant = Uuid::new_v4();
        let store = InMemoryRelationshipStore::new();
        store.write(direct_tuple(tenant, "owner")).await.unwrap();
        let evaluator = ReBACEvaluator::new(Arc::new(store), 60);
        let expr = RE::Union {
            children: vec![
                RE::Direct { relation: "owner".into() },
                RE::Direct { relation: "editor".into() },
                RE::Direct { relation: "viewer".into() },
            ],
        };
        assert!(evaluator.check(&expr, "owner", ctx(tenant)).await.unwrap());
    }

    #[tokio::test]
    async fn depth_at_max_is_allowed_but_exceeding_is_not() {
        let tenant = Uuid::new_v4();
        let store = InMemoryRelationshipStore::new();
        store.write(direct_tuple(tenant, "owner")).await.unwrap();
        let evaluator = ReBACEvaluator::new(Arc::new(store), 60);
        let mut at_max = ctx(tenant);
        at_max.depth = 5;
        assert!(evaluator
            .evaluate(&RE::Direct { relation: "owner".into() }, &mut at_max)
            .await
            .unwrap());

        let mut over_max = ctx(tenant);
        over_max.depth = 6;
        assert!(!evaluator
            .evaluate(&RE::Direct { relation: "owner".into() }, &mut over_max)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn exclusion_denies_when_minus_holds() {
        let tenant = Uuid::new_v4();
        let store = InMemoryRelationshipStore::new();
        store.write(direct_tuple(tenant, "owner")).await.unwrap();
        store.write(direct_tuple(tenant, "banned")).await.unwrap();
        let evaluator = ReBACEvaluator::new(Arc::new(store), 60);
        let expr = RE::Exclusion {
            base: Box::new(RE::Direct { relation: "owner".into() }),
            minus: Box::new(RE::Direct { relation: "banned".into() }),
        };
        assert!(!evaluator.check(&expr, "owner_minus_banned", ctx(tenant)).await.unwrap());
    }

    #[tokio::test]
    async fn cached_decision_is_reused() {
        let tenant = Uuid::new_v4();
        let store = InMemoryRelationshipStore::new();
        store.write(direct_tuple(tenant, "owner")).await.unwrap();
        let evaluator = ReBACEvaluator::new(Arc::new(store), 60);
        let expr = RE::Direct { relation: "owner".into() };
        assert!(evaluator.check(&expr, "owner", ctx(tenant)).await.unwrap());
        evaluator.invalidate_object(tenant, "does-not-exist");
        assert!(evaluator.check(&expr, "owner", ctx(tenant)).await.unwrap());
    }

    #[tokio::test]
    async fn cached_decision_is_not_shared_across_tenants() {
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let store = InMemoryRelationshipStore::new();
        store.write(direct_tuple(tenant_a, "owner")).await.unwrap();
        let evaluator = ReBACEvaluator::new(Arc::new(store), 60);
        let expr = RE::Direct { relation: "owner".into() };

        assert!(evaluator.check(&expr, "owner", ctx(tenant_a)).await.unwrap());
        // tenant_b has no such tuple and must not see tenant_a's cached `true`.
        assert!(!evaluator.check(&expr, "owner", ctx(tenant_b)).await.unwrap());
    }

    #[tokio::test]
    async fn lists_direct_objects_and_subjects() {
        let tenant = Uuid::new_v4();
        let store = InMemoryRelationshipStore::new();
        store.write(direct_tuple(tenant, "owner")).await.unwrap();

        let objects = store
            .objects_for_subject(tenant, "user", "alice", "doc", "owner")
            .await
            .unwrap();
        assert_eq!(objects, vec!["42".to_string()]);

        let subjects = store
            .subjects_for_object(tenant, "doc", "42", "owner")
            .await
            .unwrap();
        assert_eq!(subjects, vec![("user".to_string(), "alice".to_string())]);
    }
}
