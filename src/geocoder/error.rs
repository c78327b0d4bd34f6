use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocoderError {
    #[error("no provider could geocode this address")]
    NotGeocodable,

    #[error("no provider could resolve this coordinate")]
    NotResolvable,

    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GeocoderError>;
