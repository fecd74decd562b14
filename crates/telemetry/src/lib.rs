//! Cost tracking for AgentCost: model pricing, the event queue, and delivery
//! to the collector.
//!
//! A [`Tracker`] owns a frozen [`PricingTable`] and an event queue. Provider
//! adapters report through [`Tracker::sink`]; the tracker batches the
//! resulting events and ships them over a [`Transport`], retrying with
//! backoff and re-queueing whatever could not be delivered.

pub mod pricing;
pub mod retry;
pub mod tracker;
pub mod transport;

pub use pricing::{CostBreakdown, ModelPricing, PricingError, PricingTable};
pub use retry::{RetryError, RetryPolicy, retry_with_backoff};
pub use tracker::{FlushOutcome, Tracker};
pub use transport::{DeliveryError, HttpTransport, Transport};

use agentcost_config::ConfigError;

/// Errors from building a tracker.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid tracker configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("a tracker must be created inside a Tokio runtime")]
    NoRuntime,

    #[error("transport setup failed: {0}")]
    Transport(#[from] DeliveryError),
}
