//! Live HTTP rate providers.
//!
//! Two independent public rate APIs, so either can stand in for the other
//! behind [`super::ExchangeRateResolver`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{rate_from_f64, CurrencyNames, ExchangeRateProvider, ProviderError};

fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status(status.as_u16()));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
}

// =========================================================================
// ExchangeRate-API (pair endpoint)
// =========================================================================

#[derive(Debug, Deserialize)]
struct PairResponse {
    result: String,
    #[serde(default)]
    conversion_rate: Option<f64>,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodesResponse {
    result: String,
    #[serde(default)]
    supported_codes: Vec<(String, String)>,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
}

/// Client for `GET {base}/{key}/pair/{from}/{to}` style APIs
#[derive(Debug, Clone)]
pub struct ExchangeRateApiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ExchangeRateApiProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://v6.exchangerate-api.com/v6";

    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn pair_url(&self, from: &str, to: &str) -> String {
        format!("{}/{}/pair/{}/{}", self.base_url, self.api_key, from, to)
    }

    fn codes_url(&self) -> String {
        format!("{}/{}/codes", self.base_url, self.api_key)
    }
}

#[async_trait]
impl ExchangeRateProvider for ExchangeRateApiProvider {
    fn name(&self) -> &str {
        "ExchangeRateAPI"
    }

    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal, ProviderError> {
        let response = self.http.get(self.pair_url(from, to)).send().await?;
        let body: PairResponse = read_json(response).await?;

        if body.result != "success" {
            return match body.error_type.as_deref() {
                Some("unsupported-code") => Err(ProviderError::UnsupportedPair {
                    from: from.to_string(),
                    to: to.to_string(),
                }),
                other => Err(ProviderError::Unavailable(other.unwrap_or("unknown error").to_string())),
            };
        }

        let rate = body
            .conversion_rate
            .ok_or_else(|| ProviderError::Malformed("missing conversion_rate".to_string()))?;
        rate_from_f64(rate)
    }

    async fn supported_currencies(&self) -> Result<CurrencyNames, ProviderError> {
        let response = self.http.get(self.codes_url()).send().await?;
        let body: CodesResponse = read_json(response).await?;

        if body.result != "success" {
            let reason = body.error_type.unwrap_or_else(|| "unknown error".to_string());
            return Err(ProviderError::Unavailable(reason));
        }

        Ok(body.supported_codes.into_iter().collect())
    }
}

// =========================================================================
// Currency Converter API (compact convert endpoint)
// =========================================================================

#[derive(Debug, Deserialize)]
struct CurrencyEntry {
    #[serde(rename = "currencyName")]
    currency_name: String,
}

#[derive(Debug, Deserialize)]
struct CurrenciesResponse {
    results: BTreeMap<String, CurrencyEntry>,
}

/// Client for `GET {base}/api/v7/convert?q=FROM_TO&compact=ultra` style APIs
#[derive(Debug, Clone)]
pub struct CurrencyConverterProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CurrencyConverterProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://free.currconv.com";

    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn pair_key(from: &str, to: &str) -> String {
        format!("{from}_{to}")
    }
}

#[async_trait]
impl ExchangeRateProvider for CurrencyConverterProvider {
    fn name(&self) -> &str {
        "CurrencyConverterAPI"
    }

    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal, ProviderError> {
        let key = Self::pair_key(from, to);
        let response = self
            .http
            .get(format!("{}/api/v7/convert", self.base_url))
            .query(&[("q", key.as_str()), ("compact", "ultra"), ("apiKey", self.api_key.as_str())])
            .send()
            .await?;
        let body: BTreeMap<String, f64> = read_json(response).await?;

        // An unknown pair yields an empty object rather than an error status
        match body.get(&key) {
            Some(rate) => rate_from_f64(*rate),
            None => Err(ProviderError::UnsupportedPair {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    async fn supported_currencies(&self) -> Result<CurrencyNames, ProviderError> {
        let response = self
            .http
            .get(format!("{}/api/v7/currencies", self.base_url))
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;
        let body: CurrenciesResponse = read_json(response).await?;

        Ok(body
            .results
            .into_iter()
            .map(|(code, entry)| (code, entry.currency_name))
            .collect())
    }
}
