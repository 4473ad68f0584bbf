//! Phone-side companion: reacts to watch events and configuration changes.
//!
//! Settings changes go through the retrying [`DeliveryService`]. The `ready`
//! handshake and position fixes use the single-shot [`send_once`] path; a
//! stale position is not worth resending.
use std::sync::Arc;

use ds::{send_once, AppMessage, DeliveryService, Transport};
use log::{error, info, warn};
use url::Url;

use crate::{
    config_page::{config_page_url, parse_response, ConfigResponse},
    config_store::ConfigStore,
    error::{CompanionError, LocationError},
    geolocation::{LocationOptions, LocationProvider, REQUEST_CURRENT_POSITION},
    settings::Settings,
};

#[derive(Clone)]
pub struct Companion {
    queue: DeliveryService,
    transport: Arc<dyn Transport>,
    store: Arc<dyn ConfigStore>,
    locator: Arc<dyn LocationProvider>,
    config_page: Url,
    location_options: LocationOptions,
}

impl Companion {
    pub fn new(
        queue: DeliveryService,
        transport: Arc<dyn Transport>,
        store: Arc<dyn ConfigStore>,
        locator: Arc<dyn LocationProvider>,
        config_page: Url,
    ) -> Self {
        Self {
            queue,
            transport,
            store,
            locator,
            config_page,
            location_options: LocationOptions::default(),
        }
    }

    pub fn with_location_options(mut self, options: LocationOptions) -> Self {
        self.location_options = options;
        self
    }

    /// Tell the watch the companion is up.
    pub async fn on_ready(&self) -> Result<(), CompanionError> {
        let msg = AppMessage::new().with("ready", 1);
        send_once(self.transport.as_ref(), &msg).await?;
        Ok(())
    }

    /// Handle a message sent by the watch.
    pub async fn on_app_message(&self, payload: &AppMessage) -> Result<(), CompanionError> {
        info!("appmsg: {payload}");
        match payload.get_int("request") {
            Some(REQUEST_CURRENT_POSITION) => self.send_position().await,
            Some(other) => {
                warn!("Ignoring unknown request code {other}");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Acquire a fix and send it once. Failures are logged, never retried.
    pub async fn send_position(&self) -> Result<(), CompanionError> {
        let fix = tokio::time::timeout(
            self.location_options.timeout,
            self.locator.current_position(&self.location_options),
        )
        .await
        .unwrap_or(Err(LocationError::Timeout));

        let position = match fix {
            Ok(position) => position,
            Err(e) => {
                error!("location error ({}): {e}", e.code());
                return Err(e.into());
            }
        };
        info!("lat= {} lon= {}", position.latitude, position.longitude);
        send_once(self.transport.as_ref(), &position.to_message()).await?;
        Ok(())
    }

    /// Configuration page URL with the persisted settings attached.
    pub fn config_url(&self) -> Url {
        let settings = self.store.read().unwrap_or_default();
        config_page_url(&self.config_page, &settings)
    }

    /// Handle the page's response: persist new settings and queue them for
    /// the watch.
    pub fn on_config_closed(&self, raw: &str) -> Result<ConfigResponse, CompanionError> {
        let response = parse_response(raw)?;
        match &response {
            ConfigResponse::Cancelled => info!("Configuration cancelled"),
            ConfigResponse::Updated(settings) => self.apply_settings(settings)?,
        }
        Ok(response)
    }

    fn apply_settings(&self, settings: &Settings) -> Result<(), CompanionError> {
        self.store.write(settings)?;
        let msg = settings.to_app_message();
        if msg.is_empty() {
            info!("No settings the watch understands, nothing to send");
            return Ok(());
        }
        info!("Queueing settings for the watch: {msg}");
        self.queue.submit(msg)?;
        Ok(())
    }

    pub fn queue(&self) -> &DeliveryService {
        &self.queue
    }
}
