//! # AgentCost Core
//!
//! Domain types and error definitions shared by every AgentCost crate.
//! This crate carries no I/O: it defines the cost event model, the provider
//! identity, and the callback through which provider adapters hand finished
//! measurements to a tracker.
//!
//! ## Design Philosophy
//!
//! Adapters produce [`UsageRecord`]s, the tracker stamps them into
//! [`CostEvent`]s. Keeping the two apart means an adapter never needs to know
//! which project it reports for or when the batch will be sent.

pub mod error;
pub mod event;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{InvalidProvider, ProviderError};
pub use event::{CostEvent, EventSink, UsageRecord};
pub use provider::ProviderKind;
