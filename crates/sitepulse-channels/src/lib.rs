//! # SitePulse Channels
//! Delivery of progress and report messages to webhook-addressed channels.
//!
//! ## Architecture
//! ```text
//! Notifier (envelope + DeliveryPlan)
//!   └── ChannelDeliveryQueue
//!         ├── channel "a" → FIFO → worker task ─┐
//!         ├── channel "b" → FIFO → worker task ─┼→ Transport (WebhookTransport)
//!         └── channel "c" → FIFO → worker task ─┘        └── fallback Transport
//! ```
//! Sends for one channel run strictly one after another; channels run in
//! parallel.

pub mod notifier;
pub mod plan;
pub mod queue;
pub mod webhook;

pub use notifier::Notifier;
pub use plan::{DeliveryPlan, DeliveryReceipt};
pub use queue::{ChannelDeliveryQueue, DeliveryHandle};
pub use webhook::WebhookTransport;
