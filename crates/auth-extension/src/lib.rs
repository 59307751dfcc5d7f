pub mod webhook;

pub use webhook::{WebhookAuditLogger, WebhookDispatcher};
