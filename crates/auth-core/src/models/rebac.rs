//! Zanzibar-style relationship model: tuples, relation expressions and the
//! evaluation context threaded through `ReBACEvaluator`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct RelationshipTuple {
    pub tenant_id: Uuid,
    pub from_type: String,
    pub from_id: String,
    pub to_type: String,
    pub to_id: String,
    pub relation: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub bidirectional: bool,
}

impl RelationshipTuple {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e <= now)
    }
}

/// Recursive relation expression sum type. Evaluation is a method dispatched
/// on the variant (`ReBACEvaluator::evaluate`); no hidden dispatch tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationExpression {
    Direct { relation: String },
    Union { children: Vec<RelationExpression> },
    Intersection { children: Vec<RelationExpression> },
    Exclusion {
        base: Box<RelationExpression>,
        minus: Box<RelationExpression>,
    },
    TupleToUserset {
        tupleset_relation: String,
        computed_relation: String,
    },
    ComputedUserset { relation: String },
}

impl RelationExpression {
    /// Short tag used in visit keys. Matches the `#[serde(tag)]` values so a
    /// dumped visited-set is legible against the request body.
    pub fn kind(&self) -> &'static str {
        match self {
            RelationExpression::Direct { .. } => "direct",
            RelationExpression::Union { .. } => "union",
            RelationExpression::Intersection { .. } => "intersection",
            RelationExpression::Exclusion { .. } => "exclusion",
            RelationExpression::TupleToUserset { .. } => "tuple_to_userset",
            RelationExpression::ComputedUserset { .. } => "computed_userset",
        }
    }
}

/// Evaluation state threaded by reference through recursive `evaluate` calls.
/// Depth and the visited set are explicit, never thread-local, per the design
/// note in the spec.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub tenant_id: Uuid,
    pub user_type: String,
    pub user_id: String,
    pub object_type: String,
    pub object_id: String,
    pub depth: u32,
    pub max_depth: u32,
    pub visited: HashSet<String>,
}

impl EvaluationContext {
    pub fn new(
        tenant_id: Uuid,
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        max_depth: u32,
    ) -> Self {
        Self {
            tenant_id,
            user_type: user_type.into(),
            user_id: user_id.into(),
            object_type: object_type.into(),
            object_id: object_id.into(),
            depth: 0,
            max_depth,
            visited: HashSet::new(),
        }
    }

    /// Visit key deliberately omits the relation/expression-kind-specific
    /// relation name beyond the expression *kind* tag — see spec §9 Design
    /// Notes: visits to the same `(subject, expr_kind, object)` collide
    /// across different relations within one evaluation. This is preserved
    /// as-is, not "fixed", because property 6/7 and the S5 union behavior
    /// depend on this exact key shape.
    pub fn visit_key(&self, expr: &RelationExpression) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.user_type,
            self.user_id,
            expr.kind(),
            self.object_type,
            self.object_id
        )
    }

    /// A child context at `depth + 1` against a possibly different object,
    /// sharing the same visited set (cycles are detected across the whole
    /// evaluation tree, not per-branch).
    pub fn descend(&self, object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            tenant_id: self.tenant_id,
            user_type: self.user_type.clone(),
            user_id: self.user_id.clone(),
            object_type: object_type.into(),
            object_id: object_id.into(),
            depth: self.depth + 1,
            max_depth: self.max_depth,
            visited: self.visited.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitTier {
    Strict,
    Moderate,
    Lenient,
}

impl RateLimitTier {
    pub const fn requests_per_minute(self) -> u32 {
        match self {
            RateLimitTier::Strict => 100,
            RateLimitTier::Moderate => 500,
            RateLimitTier::Lenient => 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyOperation {
    Check,
    Batch,
    Subscribe,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub client_id: String,
    pub name: String,
    pub key_prefix: String,
    pub key_hash: String,
    #[sqlx(json)]
    pub allowed_operations: sqlx::types::Json<Vec<ApiKeyOperation>>,
    pub rate_limit_tier: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn tier(&self) -> RateLimitTier {
        match self.rate_limit_tier.as_str() {
            "strict" => RateLimitTier::Strict,
            "lenient" => RateLimitTier::Lenient,
            _ => RateLimitTier::Moderate,
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>, op: ApiKeyOperation) -> bool {
        self.is_active
            && self.expires_at.is_none_or(|e| e > now)
            && self.allowed_operations.0.contains(&op)
    }
}

/// Permission-change event published on ReBAC tuple writes (`publish()`
/// contract, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebacWriteEvent {
    pub op: RebacWriteOp,
    pub tenant: Uuid,
    pub subject: String,
    pub resource: String,
    pub relation: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebacWriteOp {
    Grant,
    Revoke,
}
