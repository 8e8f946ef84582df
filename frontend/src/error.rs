use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] gloo_net::Error),
    #[error("HTTP error! Status: {0}")]
    Status(u16),
    #[error("unexpected response body: {0}")]
    Decode(#[source] gloo_net::Error),
    #[error("could not encode request body: {0}")]
    Encode(#[source] gloo_net::Error),
}
