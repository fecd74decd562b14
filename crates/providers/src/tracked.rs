//! The cost-tracking decorator shared by every provider family.
//!
//! [`Tracked<C>`] wraps a client and implements the same capability trait
//! as `C`. Each call is timed, its usage priced, and exactly one
//! [`UsageRecord`] is emitted, whether the call succeeds or fails. The
//! caller always gets back exactly what the inner client returned.

use agentcost_core::{EventSink, ProviderError, ProviderKind, UsageRecord};
use agentcost_telemetry::PricingTable;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Token usage as reported in a provider's response.
pub trait UsageReport {
    fn input_tokens(&self) -> u64;

    fn output_tokens(&self) -> u64;

    /// The model named by the response, when it should win over the request.
    fn reported_model(&self) -> Option<&str> {
        None
    }

    /// Provider-specific fields recorded with the event.
    fn metadata(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// A client whose calls are measured and reported to an [`EventSink`].
pub struct Tracked<C> {
    inner: C,
    sink: EventSink,
    pricing: Arc<PricingTable>,
    debug: bool,
}

impl<C> Tracked<C> {
    pub fn new(inner: C, sink: EventSink, pricing: Arc<PricingTable>) -> Self {
        Self {
            inner,
            sink,
            pricing,
            debug: false,
        }
    }

    /// Log every tracked call at debug level.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwrap, discarding the tracking.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Run one inner call and report it.
    pub(crate) async fn observe<R, F>(
        &self,
        provider: ProviderKind,
        requested_model: &str,
        call: F,
    ) -> Result<R, ProviderError>
    where
        R: UsageReport,
        F: Future<Output = Result<R, ProviderError>>,
    {
        if self.debug {
            debug!(provider = %provider, model = requested_model, "Tracking API call");
        }

        let started = Instant::now();
        let outcome = call.await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let record = match &outcome {
            Ok(response) => self.measure(provider, requested_model, response, duration_ms),
            Err(e) => {
                if self.debug {
                    debug!(provider = %provider, model = requested_model, error = %e, "Tracked call failed");
                }
                UsageRecord::failure(provider, requested_model, duration_ms, e)
            }
        };
        self.sink.emit(record);

        outcome
    }

    fn measure<R: UsageReport>(
        &self,
        provider: ProviderKind,
        requested_model: &str,
        response: &R,
        duration_ms: u64,
    ) -> UsageRecord {
        let model = response.reported_model().unwrap_or(requested_model);
        let input_tokens = response.input_tokens();
        let output_tokens = response.output_tokens();

        let cost = match self
            .pricing
            .resolve_cost(provider, model, input_tokens, output_tokens)
        {
            Ok(cost) => cost,
            Err(e) => {
                warn!(provider = %provider, model, error = %e, "Could not price call");
                return UsageRecord::failure(provider, model, duration_ms, e);
            }
        };

        if self.debug {
            debug!(
                provider = %provider,
                model,
                input_tokens,
                output_tokens,
                cost = %format!("${cost:.6}"),
                duration_ms,
                "Cost calculated"
            );
        }

        UsageRecord {
            provider,
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost,
            duration_ms,
            metadata: response.metadata(),
        }
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for Tracked<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracked")
            .field("inner", &self.inner)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}
