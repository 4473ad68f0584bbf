//! Phone-side companion for the Placidial watchface.
//!
//! Settings edited on the configuration page are persisted and delivered to
//! the watch through the ordered, retrying queue from the `ds` crate; the
//! watch can also ask for the current position.
pub mod cli;
pub mod companion;
pub mod config_page;
pub mod config_store;
pub mod console;
pub mod error;
pub mod geolocation;
pub mod settings;

pub use error::{CompanionError, ConfigError, LocationError};
