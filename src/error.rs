use ds::DeliveryServiceError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings must be a JSON object")]
    NotAnObject,
    #[error("Malformed configuration response: {0}")]
    MalformedResponse(String),
    #[error("Settings store is unavailable")]
    StoreUnavailable,

    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("User denied the request for geolocation")]
    PermissionDenied,
    #[error("Location information is unavailable: {0}")]
    PositionUnavailable(String),
    #[error("The request to get user location timed out")]
    Timeout,
}

impl LocationError {
    /// Numeric code as reported by browser geolocation APIs.
    pub fn code(&self) -> u8 {
        match self {
            LocationError::PermissionDenied => 1,
            LocationError::PositionUnavailable(_) => 2,
            LocationError::Timeout => 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
    #[error(transparent)]
    LocationError(#[from] LocationError),
    #[error(transparent)]
    DeliveryServiceError(#[from] DeliveryServiceError),
}
