//! Fixed-table rate resolver for development and load testing.

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;

use super::{RateResolver, RateUnavailable};

/// Directed pairs in the default table, as (from, to, rate mantissa, scale)
const DEFAULT_RATES: &[(&str, &str, i64, u32)] = &[
    ("PEN", "USD", 27, 2),
    ("USD", "PEN", 370, 2),
    ("EUR", "USD", 108, 2),
    ("USD", "EUR", 92, 2),
    ("PEN", "EUR", 25, 2),
    ("EUR", "PEN", 400, 2),
    ("GBP", "USD", 125, 2),
];

/// Rate resolver backed by a table of directed pairs.
///
/// A pair is priced from its own entry when present, otherwise as the
/// reciprocal of the reverse entry. Pairs with neither entry are
/// unavailable; nothing is synthesized.
#[derive(Debug, Clone)]
pub struct MockRateResolver {
    rates: HashMap<(String, String), Decimal>,
    latency: Option<(Duration, Duration)>,
}

impl Default for MockRateResolver {
    fn default() -> Self {
        let rates = DEFAULT_RATES
            .iter()
            .map(|&(from, to, mantissa, scale)| {
                ((from.to_string(), to.to_string()), Decimal::new(mantissa, scale))
            })
            .collect();

        Self {
            rates,
            latency: None,
        }
    }
}

impl MockRateResolver {
    /// Resolver with the default table
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with no pairs at all
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
            latency: None,
        }
    }

    /// Add or replace a directed pair. Non-positive rates are ignored.
    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Self {
        if rate > Decimal::ZERO {
            self.rates.insert((from.to_string(), to.to_string()), rate);
        }
        self
    }

    /// Sleep for `latency` before answering
    pub fn with_latency(self, latency: Duration) -> Self {
        self.with_latency_range(latency, latency)
    }

    /// Sleep for a uniformly random duration in `min..=max` before answering
    pub fn with_latency_range(mut self, min: Duration, max: Duration) -> Self {
        self.latency = if max.is_zero() {
            None
        } else {
            Some((min.min(max), max))
        };
        self
    }

    /// Table lookup without simulated latency
    pub fn lookup(&self, from: &str, to: &str) -> Result<Decimal, RateUnavailable> {
        let key = (from.to_string(), to.to_string());
        if let Some(rate) = self.rates.get(&key) {
            return Ok(*rate);
        }

        let inverse_key = (to.to_string(), from.to_string());
        self.rates
            .get(&inverse_key)
            .and_then(|rate| Decimal::ONE.checked_div(*rate))
            .ok_or_else(|| RateUnavailable::new(from, to))
    }

    fn simulated_delay(&self) -> Option<Duration> {
        let (min, max) = self.latency?;
        if min == max {
            return Some(min);
        }
        Some(rand::thread_rng().gen_range(min..=max))
    }
}

#[async_trait]
impl RateResolver for MockRateResolver {
    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal, RateUnavailable> {
        if let Some(delay) = self.simulated_delay() {
            tokio::time::sleep(delay).await;
        }

        let result = self.lookup(from, to);
        tracing::debug!(from, to, rate = ?result.as_ref().ok(), "Mock exchange rate lookup");
        result
    }
}
