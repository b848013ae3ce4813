//! Documentation source backed by the GitHub REST API and raw wiki pages

use crate::enrich::{DocSource, FetchError};
use crate::types::EnrichConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

const USER_AGENT: &str = concat!("repo-ingest/", env!("CARGO_PKG_VERSION"));

pub struct GithubDocs {
    client: reqwest::Client,
    api_base: String,
    raw_base: String,
    token: Option<String>,
}

impl GithubDocs {
    pub fn new(config: &EnrichConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn get_text(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<String>, FetchError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %body, "documentation request rejected");
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl DocSource for GithubDocs {
    async fn fetch_readme(&self, owner: &str, name: &str) -> Result<Option<String>, FetchError> {
        let url = format!("{}/repos/{}/{}/readme", self.api_base, owner, name);
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3.raw");
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("token {}", token));
        }
        self.get_text(request).await
    }

    async fn fetch_wiki(&self, owner: &str, name: &str) -> Result<Option<String>, FetchError> {
        let url = format!("{}/wiki/{}/{}/Home.md", self.raw_base, owner, name);
        self.get_text(self.client.get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(server: &mockito::Server, token: Option<&str>) -> EnrichConfig {
        EnrichConfig {
            api_base: server.url(),
            raw_base: server.url(),
            token: token.map(str::to_string),
            ..EnrichConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_readme_sends_raw_accept_and_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/tokio-rs/tokio/readme")
            .match_header("accept", "application/vnd.github.v3.raw")
            .match_header("authorization", "token abc123")
            .with_status(200)
            .with_body("# Tokio")
            .create_async()
            .await;

        let docs = GithubDocs::new(&config_for(&server, Some("abc123"))).unwrap();
        let readme = docs.fetch_readme("tokio-rs", "tokio").await.unwrap();
        assert_eq!(readme.as_deref(), Some("# Tokio"));
    }

    #[tokio::test]
    async fn test_missing_wiki_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/wiki/a/b/Home.md")
            .with_status(404)
            .create_async()
            .await;

        let docs = GithubDocs::new(&config_for(&server, None)).unwrap();
        assert_eq!(docs.fetch_wiki("a", "b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/a/b/readme")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let docs = GithubDocs::new(&config_for(&server, None)).unwrap();
        let err = docs.fetch_readme("a", "b").await.unwrap_err();
        assert!(matches!(err, FetchError::Status(502)));
    }
}
