//! Errors raised while talking to the Hypixel API

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Unable to contact {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("All {attempted} endpoints failed, last error: {last}")]
    Exhausted {
        attempted: usize,
        #[source]
        last: Box<FetchError>,
    },

    #[error("No endpoints configured")]
    NoEndpoints,
}
