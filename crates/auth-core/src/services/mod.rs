pub mod authorization;
pub mod background;
pub mod identity;
pub mod token_service;

pub use authorization::*;
pub use identity::*;
pub use token_service::*;

pub mod rate_limiter;
pub use rate_limiter::*;

pub mod check_service;
pub mod client_registry;
pub mod introspection;
pub mod rebac;
pub mod revocation;
pub mod userinfo;

pub use check_service::*;
pub use client_registry::*;
pub use introspection::*;
pub use rebac::*;
pub use revocation::*;
pub use userinfo::*;
