//! HTTP client for a GitHub-gist-compatible paste API.

use serde::Deserialize;
use verbose_types::{Document, PublishError, Publisher};

const DEFAULT_URL: &str = "https://api.github.com/gists";

#[derive(Debug, Deserialize)]
struct GistResponse {
    html_url: Option<String>,
}

/// Publisher that creates a gist (POST /gists) with one file per document and returns its
/// `html_url`.
pub struct GistPublisher {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    public: bool,
}

impl GistPublisher {
    pub fn new(url: String, token: Option<String>, public: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            token,
            public,
        }
    }

    pub fn from_env() -> Self {
        let url = std::env::var("PASTE_API_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let token = std::env::var("PASTE_API_TOKEN").ok();
        let public = std::env::var("PASTE_PUBLIC")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self::new(url, token, public)
    }

    fn request_body(&self, title: &str, documents: &[Document]) -> serde_json::Value {
        let files: serde_json::Map<String, serde_json::Value> = documents
            .iter()
            .map(|d| (d.name.clone(), serde_json::json!({ "content": d.content })))
            .collect();
        serde_json::json!({
            "description": title,
            "public": self.public,
            "files": files,
        })
    }
}

fn parse_reference(body: &str) -> Result<String, PublishError> {
    let parsed: GistResponse =
        serde_json::from_str(body).map_err(|e| PublishError::Other(e.to_string()))?;
    parsed
        .html_url
        .filter(|u| !u.is_empty())
        .ok_or(PublishError::MissingReference)
}

#[async_trait::async_trait]
impl Publisher for GistPublisher {
    async fn publish(&self, title: &str, documents: &[Document]) -> Result<String, PublishError> {
        let body = self.request_body(title, documents);
        let mut req = self
            .client
            .post(&self.url)
            .header(reqwest::header::USER_AGENT, "verbose-kernel")
            .json(&body);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        let res = req
            .send()
            .await
            .map_err(|e| PublishError::Other(e.to_string()))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| PublishError::Other(e.to_string()))?;
        if !status.is_success() {
            return Err(PublishError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let url = parse_reference(&text)?;
        tracing::debug!(url = %url, files = documents.len(), "published paste");
        Ok(url)
    }
}
