use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde::Deserialize;
use url::Url;

use crate::model::{Comment, NewComment, SortBy, User};

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub project_id: String,
    pub access_token: Option<String>,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

impl From<&crate::config::ApiConfig> for ClientConfig {
    fn from(cfg: &crate::config::ApiConfig) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            project_id: cfg.project_id.clone(),
            access_token: cfg.access_token.clone(),
            user_agent: cfg.user_agent.clone(),
            timeout: Some(cfg.timeout),
            http_client: None,
        }
    }
}

/// Blocking client for the remote comment/entity API.
pub struct Client {
    http: HttpClient,
    user_agent: String,
    access_token: Option<String>,
    base_url: Url,
    project_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommentsEnvelope {
    Bare(Vec<Comment>),
    Wrapped { data: Vec<Comment> },
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("api client user agent required");
        }
        if config.project_id.trim().is_empty() {
            bail!("api client project id required");
        }
        let base_url = Url::parse(config.base_url.trim())
            .with_context(|| format!("api: invalid base url {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("api: base url {} cannot carry paths", base_url);
        }
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            access_token: config.access_token.filter(|token| !token.trim().is_empty()),
            base_url,
            project_id: config.project_id.trim().to_string(),
        })
    }

    pub fn comments(
        &self,
        entity_id: &str,
        page: usize,
        limit: usize,
        sort: SortBy,
    ) -> Result<Vec<Comment>> {
        if entity_id.trim().is_empty() {
            bail!("api: entity id is required");
        }
        let mut url = self.endpoint(&["comments"])?;
        url.query_pairs_mut()
            .append_pair("entityId", entity_id)
            .append_pair("page", &page.max(1).to_string())
            .append_pair("limit", &limit.to_string())
            .append_pair("sortBy", sort.as_str());
        let resp = self.send(self.request(Method::GET, url))?;
        let envelope: CommentsEnvelope = resp.json().context("api: decode comments")?;
        Ok(match envelope {
            CommentsEnvelope::Bare(comments) => comments,
            CommentsEnvelope::Wrapped { data } => data,
        })
    }

    pub fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        if comment.entity_id.trim().is_empty() {
            bail!("api: entity id is required");
        }
        let url = self.endpoint(&["comments"])?;
        let resp = self.send(self.request(Method::POST, url).json(comment))?;
        resp.json().context("api: decode created comment")
    }

    pub fn delete_comment(&self, comment_id: &str) -> Result<()> {
        if comment_id.trim().is_empty() {
            bail!("api: comment id is required");
        }
        let url = self.endpoint(&["comments", comment_id])?;
        self.send(self.request(Method::DELETE, url))?;
        Ok(())
    }

    pub fn mention_suggestions(&self, query: &str, limit: usize) -> Result<Vec<User>> {
        let mut url = self.endpoint(&["users", "suggestions"])?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("limit", &limit.to_string());
        let resp = self.send(self.request(Method::GET, url))?;
        resp.json().context("api: decode user suggestions")
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("api: base url cannot carry paths"))?
            .pop_if_empty()
            .push(&self.project_id)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.clone());
        if let Some(token) = &self.access_token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        req
    }

    fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().context("api: request failed")?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        match status.as_u16() {
            401 => Err(anyhow!("api: unauthorized")),
            403 => Err(anyhow!("api: forbidden")),
            404 => Err(anyhow!("api: not found: {}", body)),
            429 => Err(anyhow!("api: rate limited: {}", body)),
            _ => Err(anyhow!("api: error {}: {}", status, body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> Client {
        Client::new(ClientConfig {
            base_url: base_url.into(),
            project_id: "proj".into(),
            user_agent: "tests/1.0".into(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoint_appends_project_and_segments() {
        let client = client("https://example.test/api/v5/");
        let url = client.endpoint(&["comments", "c 1"]).unwrap();
        assert_eq!(url.as_str(), "https://example.test/api/v5/proj/comments/c%201");
    }

    #[test]
    fn endpoint_without_trailing_slash() {
        let client = client("https://example.test/api");
        let url = client.endpoint(&["users", "suggestions"]).unwrap();
        assert_eq!(url.as_str(), "https://example.test/api/proj/users/suggestions");
    }

    #[test]
    fn new_requires_project_and_user_agent() {
        let missing_project = Client::new(ClientConfig {
            base_url: "https://example.test".into(),
            user_agent: "ua".into(),
            ..ClientConfig::default()
        });
        assert!(missing_project.is_err());
        let missing_agent = Client::new(ClientConfig {
            base_url: "https://example.test".into(),
            project_id: "p".into(),
            ..ClientConfig::default()
        });
        assert!(missing_agent.is_err());
    }

    #[test]
    fn comments_envelope_accepts_both_shapes() {
        let bare = r#"[{"id":"c1","createdAt":"2024-05-01T10:00:00Z"}]"#;
        let wrapped = r#"{"data":[{"id":"c2","createdAt":"2024-05-01T10:00:00Z"}]}"#;
        match serde_json::from_str::<CommentsEnvelope>(bare).unwrap() {
            CommentsEnvelope::Bare(list) => assert_eq!(list[0].id, "c1"),
            CommentsEnvelope::Wrapped { .. } => panic!("expected bare list"),
        }
        match serde_json::from_str::<CommentsEnvelope>(wrapped).unwrap() {
            CommentsEnvelope::Wrapped { data } => assert_eq!(data[0].id, "c2"),
            CommentsEnvelope::Bare(_) => panic!("expected wrapped list"),
        }
    }
}
