//! Hypixel API access for recipes and bazaar prices

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{FetchConfig, USER_AGENT};
use crate::error::FetchError;
use crate::prices::PriceSnapshot;
use crate::raw::RawDocument;
use crate::repository::RecipeRepository;

/// Anything that can turn a URL into parsed JSON
pub trait JsonSource {
    fn fetch_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// Blocking HTTP source, sending the API key when one is configured
pub struct HttpSource {
    client: Client,
    api_key: Option<String>,
}

impl HttpSource {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
        })
    }
}

impl JsonSource for HttpSource {
    fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("API-Key", key);
        }

        let response = request.send().map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Recipe download with ordered endpoint fallback
pub struct RecipeClient<'a, S: JsonSource> {
    source: &'a S,
    endpoints: Vec<String>,
}

impl<'a, S: JsonSource> RecipeClient<'a, S> {
    pub fn new(source: &'a S, endpoints: Vec<String>) -> Self {
        Self { source, endpoints }
    }

    /// Raw payload from the first endpoint that answers successfully
    pub fn fetch_raw(&self) -> Result<Value, FetchError> {
        let mut last = None;
        for url in &self.endpoints {
            match self.source.fetch_json(url) {
                Ok(payload) => {
                    info!("Fetched recipes from {}", url);
                    return Ok(payload);
                }
                Err(e) => {
                    warn!("Recipe endpoint failed: {}", e);
                    last = Some(e);
                }
            }
        }

        match last {
            Some(last) => Err(FetchError::Exhausted {
                attempted: self.endpoints.len(),
                last: Box::new(last),
            }),
            None => Err(FetchError::NoEndpoints),
        }
    }

    pub fn fetch_repository(&self) -> Result<RecipeRepository, FetchError> {
        let payload = self.fetch_raw()?;
        let (doc, root) = RawDocument::from_json(&payload);
        let (repository, _) = RecipeRepository::from_upstream_payload(&doc, root);
        Ok(repository)
    }
}

/// Current bazaar prices
pub fn fetch_bazaar<S: JsonSource>(source: &S, url: &str) -> Result<PriceSnapshot, FetchError> {
    let payload = source.fetch_json(url)?;
    let snapshot = PriceSnapshot::from_bazaar_payload(&payload);
    info!("Fetched {} bazaar products from {}", snapshot.len(), url);
    Ok(snapshot)
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves canned payloads; unknown URLs answer 503
    #[derive(Default)]
    pub struct FakeSource {
        payloads: HashMap<String, Value>,
        pub requested: RefCell<Vec<String>>,
    }

    impl FakeSource {
        pub fn with(mut self, url: &str, payload: Value) -> Self {
            self.payloads.insert(url.to_string(), payload);
            self
        }
    }

    impl JsonSource for FakeSource {
        fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
            self.requested.borrow_mut().push(url.to_string());
            self.payloads.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }
}
