//! Best-effort status notifications through chat webhooks.
//!
//! A failed notification never fails the caller; it is logged at `error`
//! level and dropped.

use crate::settings::Settings;
use log::{debug, error};
use reqwest::Client;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Error,
}

impl NotifyLevel {
    pub fn default_title(&self) -> &'static str {
        match self {
            NotifyLevel::Info => "INFO",
            NotifyLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_title())
    }
}

/// The webhook body: a markdown message with a bold title.
pub fn payload(title: &str, message: &str) -> Value {
    json!({ "text": format!("**{title}**\n\n {message}") })
}

#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    info_url: Option<String>,
    error_url: Option<String>,
}

impl Notifier {
    pub fn new(info_url: Option<String>, error_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            info_url,
            error_url,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.info_webhook_url.clone(),
            settings.error_webhook_url.clone(),
        )
    }

    /// A notifier without any webhook; every notification is skipped.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    fn url(&self, level: NotifyLevel) -> Option<&str> {
        match level {
            NotifyLevel::Info => self.info_url.as_deref(),
            NotifyLevel::Error => self.error_url.as_deref(),
        }
    }

    /// Posts `message` to the webhook of `level`. Returns whether it was delivered.
    ///
    /// `title` defaults to `INFO` or `ERROR` when `None` or empty.
    pub async fn notify(&self, level: NotifyLevel, message: &str, title: Option<&str>) -> bool {
        let title = title
            .filter(|t| !t.is_empty())
            .unwrap_or(level.default_title());
        let data = payload(title, message);

        let Some(url) = self.url(level) else {
            debug!("No {} webhook configured, skipping notification:\n{}", level, data);
            return false;
        };

        let result = self
            .client
            .post(url)
            .timeout(NOTIFY_TIMEOUT)
            .json(&data)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        match result {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to send {} notification: {}\n{}", level, e, data);
                false
            }
        }
    }

    pub async fn info(&self, message: &str, title: Option<&str>) -> bool {
        self.notify(NotifyLevel::Info, message, title).await
    }

    pub async fn error(&self, message: &str, title: Option<&str>) -> bool {
        self.notify(NotifyLevel::Error, message, title).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accepts one HTTP request, answers with `status` and returns the request body.
    async fn serve_once(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return String::new();
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some((head, body)) = text.split_once("\r\n\r\n") {
                    let length = head
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if body.len() >= length {
                        let response =
                            format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                        socket.write_all(response.as_bytes()).await.unwrap();
                        return body.to_string();
                    }
                }
            }
        });
        (url, handle)
    }

    #[test]
    fn test_payload() {
        assert_eq!(
            payload("INFO", "3 stations updated"),
            json!({"text": "**INFO**\n\n 3 stations updated"})
        );
    }

    #[tokio::test]
    async fn test_notify_posts_payload() {
        let (url, server) = serve_once("200 OK").await;
        let notifier = Notifier::new(Some(url), None);

        assert!(notifier.info("3 stations updated", None).await);
        let body: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body, payload("INFO", "3 stations updated"));
    }

    #[tokio::test]
    async fn test_notify_uses_custom_title() {
        let (url, server) = serve_once("200 OK").await;
        let notifier = Notifier::new(None, Some(url));

        assert!(notifier.error("boom", Some("Scrape failed")).await);
        let body: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body, payload("Scrape failed", "boom"));
    }

    #[tokio::test]
    async fn test_failed_notifications_are_swallowed() {
        let (url, server) = serve_once("500 Internal Server Error").await;
        let notifier = Notifier::new(Some(url), None);
        assert!(!notifier.info("hello", None).await);
        server.await.unwrap();

        // No error webhook configured.
        assert!(!notifier.error("hello", None).await);
        assert!(!Notifier::disabled().info("hello", None).await);
    }
}
