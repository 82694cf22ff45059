//! # Idempotent Delivery Layer
//!
//! Everything between a persisted bot message and the client's channel:
//! the short-TTL already-sent marker, the retrying webhook adapter, the
//! humanizing scenario delays and the operator broadcast registry.

pub mod idempotency;
pub mod notifier;
pub mod service;
pub mod webhook;

pub use idempotency::SentMarkerCache;
pub use notifier::{OperatorNotification, OperatorRegistry};
pub use service::{scenario_delay_bounds, DeliveryReceipt, DeliveryService};
pub use webhook::{is_retryable_status, OutboundPayload, SendFailure, WebhookSender};
