//! SMS sender using the Twilio Programmable Messaging API.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use binwatch_core::{
    model::{MessageId, OutgoingSms},
    ports::{PortError, SmsSender},
};

/// Public Twilio REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

/// Account credentials and sender number.
#[derive(Clone)]
pub struct TwilioConfig {
    /// Account SID, also the basic auth user.
    pub account_sid: String,
    /// Auth token, the basic auth password.
    pub auth_token: String,
    /// Number the messages are sent from.
    pub from: String,
    /// API root, normally [`DEFAULT_BASE_URL`].
    pub base_url: String,
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from", &self.from)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Message resource returned by `POST .../Messages.json`
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    // status, price, error_code, ... are not needed
}

/// Error payload Twilio sends with 4xx/5xx answers.
#[derive(Debug, Deserialize)]
struct ErrorResource {
    #[serde(default)]
    code: Option<u32>,
    message: String,
}

/// Sends each alert as one Twilio message.
pub struct TwilioSmsSender {
    client: Client,
    config: TwilioConfig,
}

impl TwilioSmsSender {
    /// Create a sender bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, config: TwilioConfig) -> Self {
        Self { client, config }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send(&self, sms: &OutgoingSms) -> Result<MessageId, PortError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", sms.to.as_str()),
                ("From", self.config.from.as_str()),
                ("Body", sms.body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let message: MessageResource = response.json().await?;
        Ok(MessageId(message.sid))
    }
}

fn status_error(status: StatusCode, body: &str) -> PortError {
    let message = match serde_json::from_str::<ErrorResource>(body) {
        Ok(ErrorResource {
            code: Some(code),
            message,
        }) => format!("Twilio error {code}: {message}"),
        Ok(ErrorResource { code: None, message }) => message,
        Err(_) => body.trim().to_owned(),
    };
    PortError::Status {
        status: status.as_u16(),
        message,
    }
}
