//! Built-in pricing table and cost resolution.
//!
//! Prices are in USD per 1 million tokens, grouped by provider and kept in
//! declaration order. The snapshot is static: custom rates from the
//! configuration are merged in once, when a tracker is built, and the table
//! is read-only afterwards.

use agentcost_config::PricingOverrideConfig;
use agentcost_core::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

/// Separator between a model's family and the rest of its identifier.
const FAMILY_SEPARATOR: char = '-';

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    /// Create a new pricing entry.
    pub const fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Input and output cost, each computed on its own.
    pub fn split_cost(&self, input_tokens: u64, output_tokens: u64) -> (f64, f64) {
        let input = (input_tokens as f64 / TOKENS_PER_UNIT) * self.input_per_m;
        let output = (output_tokens as f64 / TOKENS_PER_UNIT) * self.output_per_m;
        (input, output)
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let (input, output) = self.split_cost(input_tokens, output_tokens);
        input + output
    }
}

/// How a cost figure was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total: f64,
    /// The table entry whose rates were used.
    pub matched_model: String,
    /// Whether the entry was found by family prefix rather than exactly.
    pub family_fallback: bool,
}

/// Pricing resolution failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(ProviderKind),

    #[error("Unknown model: {model} (provider: {provider}). Please update pricing data")]
    UnknownModel { provider: ProviderKind, model: String },
}

/// Pricing for every known model, grouped by provider in declaration order.
#[derive(Debug, Clone)]
pub struct PricingTable {
    providers: BTreeMap<ProviderKind, Vec<(String, ModelPricing)>>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices (February 2025).
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();

        // ── Anthropic ──────────────────────────────────────────────
        // Sonnet leads so that an unlisted `claude-*` snapshot is priced
        // at the mid-tier rate.
        table.insert(ProviderKind::Anthropic, "claude-sonnet-4", ModelPricing::new(3.0, 15.0));
        table.insert(
            ProviderKind::Anthropic,
            "claude-sonnet-4-20250514",
            ModelPricing::new(3.0, 15.0),
        );
        table.insert(ProviderKind::Anthropic, "claude-opus-4", ModelPricing::new(15.0, 75.0));
        table.insert(
            ProviderKind::Anthropic,
            "claude-opus-4-20250514",
            ModelPricing::new(15.0, 75.0),
        );
        table.insert(ProviderKind::Anthropic, "claude-haiku-4", ModelPricing::new(0.8, 4.0));
        table.insert(
            ProviderKind::Anthropic,
            "claude-haiku-4-20250514",
            ModelPricing::new(0.8, 4.0),
        );
        // Legacy models
        table.insert(
            ProviderKind::Anthropic,
            "claude-3-opus-20240229",
            ModelPricing::new(15.0, 75.0),
        );
        table.insert(
            ProviderKind::Anthropic,
            "claude-3-sonnet-20240229",
            ModelPricing::new(3.0, 15.0),
        );
        table.insert(
            ProviderKind::Anthropic,
            "claude-3-haiku-20240307",
            ModelPricing::new(0.25, 1.25),
        );

        // ── OpenAI ─────────────────────────────────────────────────
        table.insert(ProviderKind::OpenAi, "gpt-4", ModelPricing::new(30.0, 60.0));
        table.insert(ProviderKind::OpenAi, "gpt-4-turbo", ModelPricing::new(10.0, 30.0));
        table.insert(ProviderKind::OpenAi, "gpt-4o", ModelPricing::new(2.5, 10.0));
        table.insert(ProviderKind::OpenAi, "gpt-3.5-turbo", ModelPricing::new(0.5, 1.5));

        // ── Google ─────────────────────────────────────────────────
        table.insert(ProviderKind::Google, "gemini-pro", ModelPricing::new(0.125, 0.375));
        table.insert(ProviderKind::Google, "gemini-1.5-pro", ModelPricing::new(1.25, 5.0));
        table.insert(ProviderKind::Google, "gemini-ultra", ModelPricing::new(12.5, 37.5));

        table
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Add or replace a model's rates. A replaced entry keeps its position.
    pub fn with_model(
        mut self,
        provider: ProviderKind,
        model: impl Into<String>,
        pricing: ModelPricing,
    ) -> Self {
        self.insert(provider, model, pricing);
        self
    }

    /// Merge configured rate overrides into the table.
    ///
    /// Provider names that do not parse are skipped; configuration
    /// validation rejects them before a tracker gets here.
    pub fn with_overrides(
        mut self,
        overrides: &BTreeMap<String, BTreeMap<String, PricingOverrideConfig>>,
    ) -> Self {
        for (provider, models) in overrides {
            let Ok(kind) = provider.parse::<ProviderKind>() else {
                warn!(provider = %provider, "Ignoring custom pricing for unknown provider");
                continue;
            };
            for (model, rates) in models {
                self.insert(
                    kind,
                    model.clone(),
                    ModelPricing::new(rates.input_per_m, rates.output_per_m),
                );
            }
        }
        self
    }

    fn insert(&mut self, provider: ProviderKind, model: impl Into<String>, pricing: ModelPricing) {
        let model = model.into();
        let models = self.providers.entry(provider).or_default();
        match models.iter_mut().find(|(name, _)| *name == model) {
            Some(entry) => entry.1 = pricing,
            None => models.push((model, pricing)),
        }
    }

    /// Exact lookup. Returns None if not found.
    pub fn get(&self, provider: ProviderKind, model: &str) -> Option<ModelPricing> {
        self.providers
            .get(&provider)?
            .iter()
            .find(|(name, _)| name == model)
            .map(|(_, pricing)| *pricing)
    }

    /// Resolve the rates for a model and compute the cost of a call.
    ///
    /// Tries an exact match first. Failing that, takes the model's family
    /// (everything before the first `-`) and uses the first entry, in
    /// declaration order, that starts with it. A family match logs a
    /// warning but is not an error.
    pub fn resolve(
        &self,
        provider: ProviderKind,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<CostBreakdown, PricingError> {
        let models = self
            .providers
            .get(&provider)
            .ok_or(PricingError::UnknownProvider(provider))?;

        let (matched, pricing, family_fallback) =
            match models.iter().find(|(name, _)| name == model) {
                Some((name, pricing)) => (name, pricing, false),
                None => {
                    let family = model.split(FAMILY_SEPARATOR).next().unwrap_or_default();
                    let found = (!family.is_empty())
                        .then(|| models.iter().find(|(name, _)| name.starts_with(family)))
                        .flatten();
                    let (name, pricing) = found.ok_or_else(|| PricingError::UnknownModel {
                        provider,
                        model: model.to_string(),
                    })?;
                    warn!(
                        provider = %provider,
                        model = %model,
                        matched = %name,
                        "Exact model not found in pricing, using family rates"
                    );
                    (name, pricing, true)
                }
            };

        let (input_cost, output_cost) = pricing.split_cost(input_tokens, output_tokens);
        Ok(CostBreakdown {
            input_cost,
            output_cost,
            total: input_cost + output_cost,
            matched_model: matched.clone(),
            family_fallback,
        })
    }

    /// Resolve and return only the total cost.
    pub fn resolve_cost(
        &self,
        provider: ProviderKind,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<f64, PricingError> {
        self.resolve(provider, model, input_tokens, output_tokens)
            .map(|breakdown| breakdown.total)
    }

    /// Model names for one provider, in declaration order.
    pub fn models(&self, provider: ProviderKind) -> Vec<&str> {
        self.providers
            .get(&provider)
            .map(|models| models.iter().map(|(name, _)| name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Every entry as (provider, model, pricing).
    pub fn entries(&self) -> impl Iterator<Item = (ProviderKind, &str, ModelPricing)> + '_ {
        self.providers.iter().flat_map(|(provider, models)| {
            models
                .iter()
                .map(move |(name, pricing)| (*provider, name.as_str(), *pricing))
        })
    }

    /// Number of models in the pricing table.
    pub fn len(&self) -> usize {
        self.providers.values().map(Vec::len).sum()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn default_table_has_models() {
        let table = PricingTable::with_defaults();
        assert_eq!(table.len(), 16);
        assert!(!table.is_empty());
        for kind in ProviderKind::ALL {
            assert!(!table.models(kind).is_empty());
        }
    }

    #[test]
    fn gpt_4_turbo_cost() {
        let table = PricingTable::with_defaults();
        // (200 / 1M) * 10.00 + (400 / 1M) * 30.00 = 0.002 + 0.012
        let cost = table
            .resolve_cost(ProviderKind::OpenAi, "gpt-4-turbo", 200, 400)
            .unwrap();
        assert!(approx(cost, 0.014));
    }

    #[test]
    fn zero_tokens_cost_nothing() {
        let table = PricingTable::with_defaults();
        for (provider, model, _) in table.entries() {
            assert_eq!(table.resolve_cost(provider, model, 0, 0).unwrap(), 0.0);
        }
    }

    #[test]
    fn cost_is_linear_in_each_count() {
        let table = PricingTable::with_defaults();
        let cost = |i, o| {
            table
                .resolve_cost(ProviderKind::Anthropic, "claude-opus-4", i, o)
                .unwrap()
        };

        assert!(approx(cost(2_000, 0), 2.0 * cost(1_000, 0)));
        assert!(approx(cost(0, 3_000), 3.0 * cost(0, 1_000)));
        assert!(approx(cost(1_000, 1_000), cost(1_000, 0) + cost(0, 1_000)));
    }

    #[test]
    fn breakdown_reports_each_side() {
        let table = PricingTable::with_defaults();
        let b = table
            .resolve(ProviderKind::Google, "gemini-1.5-pro", 1_000_000, 2_000_000)
            .unwrap();
        assert!(approx(b.input_cost, 1.25));
        assert!(approx(b.output_cost, 10.0));
        assert!(approx(b.total, 11.25));
        assert_eq!(b.matched_model, "gemini-1.5-pro");
        assert!(!b.family_fallback);
    }

    #[test]
    fn family_fallback_uses_first_declared_family_member() {
        let table = PricingTable::with_defaults();
        let b = table
            .resolve(
                ProviderKind::Anthropic,
                "claude-sonnet-4-unknown-snapshot",
                1_000_000,
                1_000_000,
            )
            .unwrap();
        assert!(b.family_fallback);
        assert_eq!(b.matched_model, "claude-sonnet-4");
        assert!(approx(b.total, 18.0));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn resolve_logged(model: &str) -> (CostBreakdown, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let table = PricingTable::with_defaults();
        let breakdown = tracing::subscriber::with_default(subscriber, || {
            table.resolve(ProviderKind::OpenAi, model, 1, 1).unwrap()
        });
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        (breakdown, output)
    }

    #[test]
    fn family_fallback_logs_a_warning() {
        let (b, logs) = resolve_logged("gpt-4-0613");
        assert!(b.family_fallback);
        assert!(logs.contains("WARN"));
        assert!(logs.contains("using family rates"));
        assert!(logs.contains("gpt-4-0613"));
    }

    #[test]
    fn exact_match_logs_nothing() {
        let (b, logs) = resolve_logged("gpt-4-turbo");
        assert!(!b.family_fallback);
        assert!(logs.is_empty());
    }

    #[test]
    fn family_fallback_for_unlisted_gemini() {
        let table = PricingTable::with_defaults();
        let b = table
            .resolve(ProviderKind::Google, "gemini-2.0-flash", 1_000_000, 0)
            .unwrap();
        assert_eq!(b.matched_model, "gemini-pro");
        assert!(approx(b.total, 0.125));
    }

    #[test]
    fn unrelated_model_is_unknown() {
        let table = PricingTable::with_defaults();
        let err = table
            .resolve_cost(ProviderKind::OpenAi, "o1-preview", 10, 10)
            .unwrap_err();
        assert_eq!(
            err,
            PricingError::UnknownModel {
                provider: ProviderKind::OpenAi,
                model: "o1-preview".into(),
            }
        );
    }

    #[test]
    fn empty_family_never_matches() {
        let table = PricingTable::with_defaults();
        assert!(table.resolve_cost(ProviderKind::OpenAi, "", 1, 1).is_err());
        assert!(table.resolve_cost(ProviderKind::OpenAi, "-4o", 1, 1).is_err());
    }

    #[test]
    fn missing_provider_is_unknown() {
        let table = PricingTable::empty().with_model(
            ProviderKind::OpenAi,
            "gpt-4o",
            ModelPricing::new(2.5, 10.0),
        );
        let err = table
            .resolve_cost(ProviderKind::Google, "gemini-pro", 1, 1)
            .unwrap_err();
        assert_eq!(err, PricingError::UnknownProvider(ProviderKind::Google));
    }

    #[test]
    fn with_model_overrides_in_place() {
        let table = PricingTable::with_defaults().with_model(
            ProviderKind::OpenAi,
            "gpt-4",
            ModelPricing::new(1.0, 1.0),
        );
        assert_eq!(table.models(ProviderKind::OpenAi)[0], "gpt-4");
        assert_eq!(
            table.get(ProviderKind::OpenAi, "gpt-4"),
            Some(ModelPricing::new(1.0, 1.0))
        );
        assert_eq!(table.len(), 16);
    }

    #[test]
    fn overrides_from_config_append_new_models() {
        let mut models = BTreeMap::new();
        models.insert(
            "gpt-4o-mini".to_string(),
            PricingOverrideConfig {
                input_per_m: 0.15,
                output_per_m: 0.6,
            },
        );
        let mut overrides = BTreeMap::new();
        overrides.insert("openai".to_string(), models);
        overrides.insert("cohere".to_string(), BTreeMap::new());

        let table = PricingTable::with_defaults().with_overrides(&overrides);
        assert_eq!(table.len(), 17);
        assert_eq!(table.models(ProviderKind::OpenAi).last(), Some(&"gpt-4o-mini"));
        let cost = table
            .resolve_cost(ProviderKind::OpenAi, "gpt-4o-mini", 1_000_000, 1_000_000)
            .unwrap();
        assert!(approx(cost, 0.75));
    }
}
