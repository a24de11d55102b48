//! Service configuration read from the process environment.

use std::fmt;
use std::time::Duration;

use binwatch_core::dispatch::DispatchPolicy;
use binwatch_core::model::{InvalidTrashLevel, TrashLevel};
use binwatch_core::phone::DEFAULT_COUNTRY_CODE;
use binwatch_provider_firestore::DEFAULT_BASE_URL as FIRESTORE_BASE_URL;
use binwatch_provider_twilio::{DEFAULT_BASE_URL as TWILIO_BASE_URL, TwilioConfig};
use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub(crate) struct ServiceConfig {
    /// Base64 encoded Google service account key file
    pub firebase_service_account_key: String,

    // Twilio configuration
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    /// Sender number for outgoing alerts
    pub twilio_phone_number: String,

    /// Port of the liveness listener
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between polls of the notifications collection
    #[serde(default = "default_feed_poll_interval_secs")]
    pub feed_poll_interval_secs: u64,

    /// Fill level (percent) at which contacts are alerted
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u8,

    /// Calling code replacing a leading 0 in stored numbers
    #[serde(default = "default_phone_country_code")]
    pub phone_country_code: String,

    #[serde(default = "default_firestore_base_url")]
    pub firestore_base_url: String,

    #[serde(default = "default_twilio_base_url")]
    pub twilio_base_url: String,

    /// Seconds to wait for in-flight alerts on shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_feed_poll_interval_secs() -> u64 {
    5
}

fn default_alert_threshold() -> u8 {
    TrashLevel::ALERT.percent()
}

fn default_phone_country_code() -> String {
    DEFAULT_COUNTRY_CODE.to_owned()
}

fn default_firestore_base_url() -> String {
    FIRESTORE_BASE_URL.to_owned()
}

fn default_twilio_base_url() -> String {
    TWILIO_BASE_URL.to_owned()
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceConfig")
            .field("firebase_service_account_key", &"<redacted>")
            .field("twilio_account_sid", &self.twilio_account_sid)
            .field("twilio_auth_token", &"<redacted>")
            .field("twilio_phone_number", &self.twilio_phone_number)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("feed_poll_interval_secs", &self.feed_poll_interval_secs)
            .field("alert_threshold", &self.alert_threshold)
            .field("phone_country_code", &self.phone_country_code)
            .field("firestore_base_url", &self.firestore_base_url)
            .field("twilio_base_url", &self.twilio_base_url)
            .field("shutdown_timeout_secs", &self.shutdown_timeout_secs)
            .finish()
    }
}

impl ServiceConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(Environment::default())
    }

    fn from_source(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.feed_poll_interval_secs)
    }

    pub(crate) fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub(crate) fn dispatch_policy(&self) -> Result<DispatchPolicy, InvalidTrashLevel> {
        Ok(DispatchPolicy {
            threshold: TrashLevel::try_from(i64::from(self.alert_threshold))?,
            country_code: self.phone_country_code.clone(),
        })
    }

    pub(crate) fn twilio(&self) -> TwilioConfig {
        TwilioConfig {
            account_sid: self.twilio_account_sid.clone(),
            auth_token: self.twilio_auth_token.clone(),
            from: self.twilio_phone_number.clone(),
            base_url: self.twilio_base_url.clone(),
        }
    }
}
