pub mod policy;
pub mod provider;
pub mod service;

pub use policy::{AuthContext, PolicyDecision, PolicyEngine};
pub use provider::{
    AuthorizationEngine, AuthorizationProvider, AuthzContext, AuthzDecision, Context, Decision,
    Policy, RoleAssignment, RoleAttributeAuthorization,
};
pub use service::{AuthorizationService, RoleStore};
