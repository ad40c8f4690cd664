//! Failover resolver over a primary and a fallback provider.
//!
//! One resolver is shared by the whole process, and it runs live rate
//! lookups one at a time. A lookup that waits on a slow provider delays
//! every other live-rate transfer behind it. The worst case for a single
//! lookup is two provider timeouts (primary, then fallback), so a queued
//! caller can wait that long for each lookup ahead of it. Mocked-rate
//! transfers do not go through this resolver and are unaffected.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{CurrencyNames, ExchangeRateProvider, ProviderError, RateResolver, RateUnavailable};

/// Default bound on a single provider call
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Which of the two providers is current
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSlot {
    Primary,
    Fallback,
}

impl ProviderSlot {
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Fallback,
            Self::Fallback => Self::Primary,
        }
    }
}

impl fmt::Display for ProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Rate resolver that remembers which provider last worked.
///
/// The current provider starts as primary and only changes when a call on
/// it fails and the other provider succeeds (or on [`switch_provider`]).
/// When both fail the current provider is left as it was before the call.
///
/// The provider-selection lock is held for the whole of [`get_rate`],
/// including both provider calls, so concurrent lookups run strictly one
/// after another. Each provider call is bounded by the configured timeout
/// and a timeout counts as a failure; one lookup therefore takes at most
/// twice that timeout.
///
/// [`get_rate`]: RateResolver::get_rate
///
/// [`switch_provider`]: ExchangeRateResolver::switch_provider
pub struct ExchangeRateResolver {
    primary: Arc<dyn ExchangeRateProvider>,
    fallback: Arc<dyn ExchangeRateProvider>,
    current: Mutex<ProviderSlot>,
    timeout: Duration,
}

impl ExchangeRateResolver {
    pub fn new(primary: Arc<dyn ExchangeRateProvider>, fallback: Arc<dyn ExchangeRateProvider>) -> Self {
        Self {
            primary,
            fallback,
            current: Mutex::new(ProviderSlot::Primary),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn provider(&self, slot: ProviderSlot) -> &dyn ExchangeRateProvider {
        match slot {
            ProviderSlot::Primary => self.primary.as_ref(),
            ProviderSlot::Fallback => self.fallback.as_ref(),
        }
    }

    async fn fetch(&self, slot: ProviderSlot, from: &str, to: &str) -> Result<Decimal, ProviderError> {
        let provider = self.provider(slot);
        match tokio::time::timeout(self.timeout, provider.get_rate(from, to)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        }
    }

    pub async fn current_provider(&self) -> ProviderSlot {
        *self.current.lock().await
    }

    pub async fn current_provider_name(&self) -> String {
        let slot = *self.current.lock().await;
        self.provider(slot).name().to_string()
    }

    /// Toggle between primary and fallback, returning the new current slot
    pub async fn switch_provider(&self) -> ProviderSlot {
        let mut current = self.current.lock().await;
        *current = current.other();
        tracing::info!(
            provider = %self.provider(*current).name(),
            slot = %*current,
            "Exchange rate provider switched manually"
        );
        *current
    }

    /// Currencies known to the current provider
    pub async fn supported_currencies(&self) -> Result<CurrencyNames, ProviderError> {
        let current = self.current.lock().await;
        let provider = self.provider(*current);
        match tokio::time::timeout(self.timeout, provider.supported_currencies()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl RateResolver for ExchangeRateResolver {
    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal, RateUnavailable> {
        let mut current = self.current.lock().await;
        let previous = *current;

        match self.fetch(previous, from, to).await {
            Ok(rate) => return Ok(rate),
            Err(e) => {
                tracing::warn!(
                    provider = %self.provider(previous).name(),
                    from,
                    to,
                    error = %e,
                    "Exchange rate provider failed, trying the other provider"
                );
            }
        }

        *current = previous.other();
        match self.fetch(*current, from, to).await {
            Ok(rate) => {
                tracing::info!(
                    provider = %self.provider(*current).name(),
                    slot = %*current,
                    "Exchange rate provider failover complete"
                );
                Ok(rate)
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.provider(*current).name(),
                    from,
                    to,
                    error = %e,
                    "Both exchange rate providers failed"
                );
                *current = previous;
                Err(RateUnavailable::new(from, to))
            }
        }
    }
}
