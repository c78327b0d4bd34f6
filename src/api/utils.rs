//! API utility functions
//!
//! Pure, stateless helper functions for HTTP request processing.

use crate::api::error::ApiError;

/// Validates that body size does not exceed the maximum allowed size
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_body_size_ok() {
        let data = vec![0u8; 1000];
        assert!(validate_body_size(&data, 1000).is_ok());
        assert!(validate_body_size(&data, 2000).is_ok());
        assert!(validate_body_size(&[], 100).is_ok());
    }

    #[test]
    fn test_validate_body_size_too_large() {
        let data = vec![0u8; 1000];
        let result = validate_body_size(&data, 999);
        assert!(result.is_err());
        match result {
            Err(ApiError::PayloadTooLarge(size)) => assert_eq!(size, 1000),
            _ => panic!("Expected PayloadTooLarge error"),
        }
    }
}
