//! PancakeSwap token price adapter.

use futures::StreamExt;
use futures::stream;
use serde::Deserialize;

use crate::application::ports::{PriceProvider, PriceResultStream, SourceError};
use crate::domain::Price;
use crate::infrastructure::http::failure_parts;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    /// USD price, sent as a decimal string.
    price: String,
}

/// Price provider polling PancakeSwap's token endpoint once per run.
#[derive(Debug, Clone)]
pub struct PancakeSwapProvider {
    client: reqwest::Client,
    url: String,
}

impl PancakeSwapProvider {
    /// Create a provider for the token at `address`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, address: &str) -> Self {
        Self {
            client,
            url: format!("{}/{address}", base_url.trim_end_matches('/')),
        }
    }

    /// Fetch the current USD price.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the price is not a number.
    pub async fn fetch(&self) -> Result<Price, SourceError> {
        fetch_price(&self.client, &self.url).await
    }
}

async fn fetch_price(client: &reqwest::Client, url: &str) -> Result<Price, SourceError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SourceError::RequestFailed {
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        let (status, body) = failure_parts(response).await;
        return Err(SourceError::RequestFailed {
            message: format!("status {status}: {body}"),
        });
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| SourceError::InvalidResponse {
            message: e.to_string(),
        })?;

    body.data
        .price
        .trim()
        .parse::<f64>()
        .map(Price::usd)
        .map_err(|e| SourceError::InvalidResponse {
            message: format!("price {:?}: {e}", body.data.price),
        })
}

impl PriceProvider for PancakeSwapProvider {
    fn prices(&self) -> PriceResultStream {
        let client = self.client.clone();
        let url = self.url.clone();
        stream::once(async move { fetch_price(&client, &url).await }).boxed()
    }
}
