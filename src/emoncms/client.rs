use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("request to EmonCMS failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("EmonCMS returned status {status}")]
    Api { status: StatusCode, body: String },
    #[error("EmonCMS rejected the post: {}", message.as_deref().unwrap_or("no explanation given"))]
    Rejected { message: Option<String> },
}

#[derive(Debug, Deserialize)]
struct InputReply {
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

/// Client for the EmonCMS input API. Holds one `reqwest::Client` for the
/// process lifetime so posts reuse connections instead of re-handshaking
/// per message.
pub struct EmonClient {
    http: reqwest::Client,
    input_url: String,
    api_key: String,
}

impl EmonClient {
    pub fn new(input_url: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            input_url: input_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Posts one flattened reading set. The API key travels in the form
    /// body, as the input API expects.
    pub async fn post_input(&self, node: &str, fulljson: &str) -> Result<(), PostError> {
        let response = self
            .http
            .post(&self.input_url)
            .form(&[
                ("node", node),
                ("fulljson", fulljson),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(PostError::Api { status, body });
        }

        let reply: InputReply = response.json().await?;
        if !reply.success {
            return Err(PostError::Rejected {
                message: reply.message,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> EmonClient {
        EmonClient::new(&format!("{}/input/post", server.url()), "secret").unwrap()
    }

    #[tokio::test]
    async fn posts_form_body_and_accepts_success_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/input/post")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("node".into(), "dev1".into()),
                Matcher::UrlEncoded("fulljson".into(), r#"{"power":42}"#.into()),
                Matcher::UrlEncoded("apikey".into(), "secret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        client.post_input("dev1", r#"{"power":42}"#).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_200_status_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/input/post")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client_for(&server)
            .post_input("dev1", "{}")
            .await
            .unwrap_err();
        match err {
            PostError::Api { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_false_reply_is_a_rejection_with_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/input/post")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": false, "message": "bad key"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .post_input("dev1", "{}")
            .await
            .unwrap_err();
        match &err {
            PostError::Rejected { message } => assert_eq!(message.as_deref(), Some("bad key")),
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn missing_success_flag_is_a_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/input/post")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let err = client_for(&server)
            .post_input("dev1", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, PostError::Rejected { message: None }));
    }
}
