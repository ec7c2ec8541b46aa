//! Downstream workflow notifications (signed outbound webhooks)

mod notifier;

pub use notifier::{sign_payload, WorkflowEvent, WorkflowNotifier, SIGNATURE_HEADER};
