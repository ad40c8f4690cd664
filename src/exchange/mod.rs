//! Exchange rates
//!
//! A [`RateResolver`] turns a currency pair into a conversion rate. The live
//! [`ExchangeRateResolver`] fails over between two [`ExchangeRateProvider`]s;
//! [`MockRateResolver`] answers from a fixed table without network access.

mod mock;
mod providers;
mod resolver;

pub use mock::MockRateResolver;
pub use providers::{CurrencyConverterProvider, ExchangeRateApiProvider};
pub use resolver::{ExchangeRateResolver, ProviderSlot};

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::DomainError;

/// Currency code to display name
pub type CurrencyNames = BTreeMap<String, String>;

/// Failure of a single rate source
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider responded with status {0}")]
    Status(u16),

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Pair {from}/{to} is not supported by the provider")]
    UnsupportedPair { from: String, to: String },

    #[error("Provider returned an invalid rate: {0}")]
    InvalidRate(String),

    #[error("Provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// No source could price the pair
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Could not get exchange rate from {from} to {to} from any provider")]
pub struct RateUnavailable {
    pub from: String,
    pub to: String,
}

impl RateUnavailable {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<RateUnavailable> for DomainError {
    fn from(err: RateUnavailable) -> Self {
        DomainError::RateUnavailable {
            from: err.from,
            to: err.to,
        }
    }
}

/// One external source of spot rates
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Units of `to` bought by one unit of `from`
    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal, ProviderError>;

    async fn supported_currencies(&self) -> Result<CurrencyNames, ProviderError>;
}

/// Source of conversion rates used by the transfer engine
#[async_trait]
pub trait RateResolver: Send + Sync {
    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal, RateUnavailable>;
}

/// Validate a rate reported as a float by a provider
pub(crate) fn rate_from_f64(value: f64) -> Result<Decimal, ProviderError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ProviderError::InvalidRate(value.to_string()));
    }

    Decimal::try_from(value).map_err(|e| ProviderError::InvalidRate(format!("{value}: {e}")))
}
