//! Position fixes for the watch.
//!
//! The watch asks for the current position with `request = 0`; the answer is
//! a single `{longitude, latitude}` message in fixed-point angle units.
use std::time::Duration;

use async_trait::async_trait;
use ds::AppMessage;

use crate::error::LocationError;

/// Angle units per full turn on the watch.
pub const TRIG_MAX_ANGLE: f64 = 65536.0;

/// Request code for "current position".
pub const REQUEST_CURRENT_POSITION: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    pub high_accuracy: bool,
    /// Oldest cached fix that is still acceptable.
    pub maximum_age: Duration,
    pub timeout: Duration,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            high_accuracy: false,
            maximum_age: Duration::from_secs(6 * 60 * 60),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn to_message(&self) -> AppMessage {
        AppMessage::new()
            .with("longitude", to_fixed_point(self.longitude))
            .with("latitude", to_fixed_point(self.latitude))
    }
}

/// Degrees to watch angle units.
pub fn to_fixed_point(degrees: f64) -> i32 {
    (degrees * TRIG_MAX_ANGLE / 360.0).round() as i32
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self, options: &LocationOptions)
        -> Result<Position, LocationError>;
}

/// Provider returning a configured position, or "unavailable" without one.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    position: Option<Position>,
}

impl FixedLocation {
    pub fn new(position: Option<Position>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(
        &self,
        _options: &LocationOptions,
    ) -> Result<Position, LocationError> {
        self.position.ok_or_else(|| {
            LocationError::PositionUnavailable("no position configured".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_scaling() {
        assert_eq!(to_fixed_point(0.0), 0);
        assert_eq!(to_fixed_point(90.0), 16384);
        assert_eq!(to_fixed_point(-180.0), -32768);
        assert_eq!(to_fixed_point(360.0), 65536);
        // 52.52 * 65536 / 360 = 9561.0...
        assert_eq!(to_fixed_point(52.52), 9561);
        // 13.405 * 65536 / 360 = 2440.3...
        assert_eq!(to_fixed_point(13.405), 2440);
    }

    #[test]
    fn test_position_message() {
        let msg = Position::new(45.0, -90.0).to_message();
        assert_eq!(msg.get_int("latitude"), Some(8192));
        assert_eq!(msg.get_int("longitude"), Some(-16384));
        assert_eq!(msg.len(), 2);
    }

    #[test]
    fn test_default_options() {
        let options = LocationOptions::default();
        assert!(!options.high_accuracy);
        assert_eq!(options.maximum_age, Duration::from_millis(21_600_000));
        assert_eq!(options.timeout, Duration::from_millis(60_000));
    }
}
