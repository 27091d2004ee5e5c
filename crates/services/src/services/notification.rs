//! Telegram bot notifications.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use backon::Retryable;

use super::{
    config::TelegramConfig,
    integration_client::{IntegrationError, check_status, http_client, map_reqwest_error, retry_policy},
};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

#[derive(Debug)]
struct TelegramTarget {
    bot_token: SecretString,
    chat_id: String,
}

/// Sends notifications to the configured Telegram chat. Without
/// configuration every notification is dropped.
#[derive(Debug)]
pub struct NotificationService {
    http: Client,
    target: Option<TelegramTarget>,
}

impl NotificationService {
    pub fn new(config: Option<&TelegramConfig>) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: http_client()?,
            target: config.map(|c| TelegramTarget {
                bot_token: SecretString::from(c.bot_token.expose_secret().to_owned()),
                chat_id: c.chat_id.clone(),
            }),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }

    /// Best-effort notification; failures are logged, never returned.
    pub async fn notify(&self, title: &str, message: &str) {
        if self.target.is_none() {
            debug!(title, "Telegram not configured, skipping notification");
            return;
        }
        if let Err(e) = self.send_message(&format_message(title, message)).await {
            warn!(title, error = %e, "Failed to send Telegram notification");
        }
    }

    /// Send an HTML-formatted message, retrying transient failures.
    pub async fn send_message(&self, text: &str) -> Result<(), IntegrationError> {
        let target = self
            .target
            .as_ref()
            .ok_or(IntegrationError::NotConfigured("telegram"))?;

        (|| async { self.post_message(target, text).await })
            .retry(retry_policy())
            .when(|e: &IntegrationError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "Telegram call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn post_message(&self, target: &TelegramTarget, text: &str) -> Result<(), IntegrationError> {
        let url = format!(
            "{TELEGRAM_API_URL}/bot{}/sendMessage",
            target.bot_token.expose_secret()
        );
        let request = SendMessageRequest {
            chat_id: &target.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let res = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = check_status(res)
            .await?
            .json::<TelegramResponse>()
            .await
            .map_err(|e| IntegrationError::Serde(e.to_string()))?;

        parse_response(body)
    }
}

fn parse_response(body: TelegramResponse) -> Result<(), IntegrationError> {
    if body.ok {
        Ok(())
    } else {
        Err(IntegrationError::Rejected {
            service: "telegram",
            message: body.description.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn format_message(title: &str, message: &str) -> String {
    format!("<b>{}</b>\n{}", escape_html(title), escape_html(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message_escapes_markup() {
        assert_eq!(
            format_message("Deploy <main>", "a & b"),
            "<b>Deploy &lt;main&gt;</b>\na &amp; b"
        );
    }

    #[test]
    fn test_parse_response_surfaces_description() {
        let body: TelegramResponse =
            serde_json::from_str(r#"{"ok": false, "error_code": 400, "description": "chat not found"}"#)
                .unwrap();
        match parse_response(body) {
            Err(IntegrationError::Rejected { service, message }) => {
                assert_eq!(service, "telegram");
                assert_eq!(message, "chat not found");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_service_reports_not_configured() {
        let service = NotificationService::new(None).unwrap();
        assert!(!service.is_configured());
        assert!(matches!(
            service.send_message("hi").await,
            Err(IntegrationError::NotConfigured("telegram"))
        ));
        // notify never fails
        service.notify("title", "body").await;
    }
}
