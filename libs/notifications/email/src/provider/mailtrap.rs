//! Mailtrap email sender
//!
//! Sends emails via the Mailtrap send API.

use crate::error::DeliveryError;
use crate::provider::MailSender;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

/// Mailtrap API endpoint
pub const MAILTRAP_API_URL: &str = "https://send.api.mailtrap.io/api/send";

/// Mailtrap sender settings
#[derive(Debug, Clone)]
pub struct MailtrapConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
}

impl Default for MailtrapConfig {
    fn default() -> Self {
        Self {
            api_url: MAILTRAP_API_URL.to_string(),
            api_key: String::new(),
            from_email: "mailtrap@example.com".to_string(),
            from_name: "Mailtrap".to_string(),
        }
    }
}

/// Mailtrap sender
pub struct MailtrapSender {
    config: MailtrapConfig,
    client: Client,
}

impl MailtrapSender {
    /// Create a new MailtrapSender
    pub fn new(config: MailtrapConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Create with a preconfigured HTTP client
    pub fn with_client(config: MailtrapConfig, client: Client) -> Self {
        Self { config, client }
    }
}

/// Mailtrap API request payload
#[derive(Debug, Serialize)]
struct MailtrapRequest<'a> {
    from: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[async_trait]
impl MailSender for MailtrapSender {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        correlation_id: &str,
    ) -> Result<(), DeliveryError> {
        if self.config.api_key.is_empty() {
            return Err(DeliveryError::Config("Mailtrap API key not configured".into()));
        }

        let request = MailtrapRequest {
            from: Address {
                email: &self.config.from_email,
                name: Some(&self.config.from_name),
            },
            to: vec![Address {
                email: to,
                name: None,
            }],
            subject,
            text: body,
        };

        debug!(
            to = %to,
            subject = %subject,
            message_id = %correlation_id,
            "Sending email via Mailtrap"
        );

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .header("Message-Id", correlation_id)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            debug!(message_id = %correlation_id, "Email accepted by Mailtrap");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(
                status = %status,
                error = %body,
                message_id = %correlation_id,
                "Mailtrap API error"
            );
            Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn name(&self) -> &'static str {
        "mailtrap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, http::HeaderMap, http::StatusCode, routing::post};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Captured {
        requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
    }

    /// Local stand-in for the Mailtrap API answering with `status`
    async fn fake_mailtrap(status: StatusCode) -> (String, Captured) {
        let captured = Captured::default();

        let app = Router::new()
            .route(
                "/api/send",
                post(
                    move |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                        captured.requests.lock().unwrap().push((headers, body));
                        (status, "{\"errors\":[\"nope\"]}")
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/api/send"), captured)
    }

    fn sender(api_url: String) -> MailtrapSender {
        MailtrapSender::new(MailtrapConfig {
            api_url,
            api_key: "test-key".to_string(),
            ..MailtrapConfig::default()
        })
    }

    #[test]
    fn test_request_serialization() {
        let request = MailtrapRequest {
            from: Address {
                email: "mailtrap@example.com",
                name: Some("Mailtrap"),
            },
            to: vec![Address {
                email: "a@b.com",
                name: None,
            }],
            subject: "Hi",
            text: "Hello",
        };

        let json: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["from"]["email"], "mailtrap@example.com");
        assert_eq!(json["from"]["name"], "Mailtrap");
        assert_eq!(json["to"][0]["email"], "a@b.com");
        assert!(json["to"][0].get("name").is_none());
        assert_eq!(json["subject"], "Hi");
        assert_eq!(json["text"], "Hello");
    }

    #[tokio::test]
    async fn test_send_posts_payload_and_headers() {
        let (url, captured) = fake_mailtrap(StatusCode::OK).await;

        sender(url)
            .send("a@b.com", "Hi", "Hello", "1700000000000-0")
            .await
            .unwrap();

        let requests = captured.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (headers, body) = &requests[0];
        assert_eq!(headers["authorization"], "Bearer test-key");
        assert_eq!(headers["message-id"], "1700000000000-0");
        assert!(
            headers["content-type"]
                .to_str()
                .unwrap()
                .starts_with("application/json")
        );
        assert_eq!(body["to"][0]["email"], "a@b.com");
        assert_eq!(body["subject"], "Hi");
        assert_eq!(body["text"], "Hello");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let (url, _captured) = fake_mailtrap(StatusCode::UNAUTHORIZED).await;

        let err = sender(url)
            .send("a@b.com", "Hi", "Hello", "1-0")
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_request_error() {
        // Port 1 on loopback refuses connections.
        let err = sender("http://127.0.0.1:1/api/send".to_string())
            .send("a@b.com", "Hi", "Hello", "1-0")
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Request(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let sender = MailtrapSender::new(MailtrapConfig::default());
        let err = sender.send("a@b.com", "Hi", "Hello", "1-0").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Config(_)));
    }
}
