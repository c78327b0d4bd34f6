use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("geocoder error: {0}")]
    Geocoder(#[from] crate::geocoder::GeocoderError),
}

pub type Result<T> = std::result::Result<T, ValidatorError>;
