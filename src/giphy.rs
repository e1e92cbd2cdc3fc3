use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use url::Url;

use crate::model::{Gif, GifPage, Pagination};

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub rating: String,
    pub user_agent: String,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    api_key: String,
    base_url: Url,
    rating: String,
    user_agent: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Vec<GiphyGif>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct GiphyGif {
    id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    alt_text: Option<String>,
    #[serde(default)]
    images: GiphyImages,
}

#[derive(Debug, Default, Deserialize)]
struct GiphyImages {
    #[serde(default)]
    original: Option<GiphyRendition>,
    #[serde(default)]
    fixed_width: Option<GiphyRendition>,
    #[serde(default)]
    fixed_width_small: Option<GiphyRendition>,
}

#[derive(Debug, Default, Deserialize)]
struct GiphyRendition {
    #[serde(default)]
    url: String,
    #[serde(default)]
    width: String,
    #[serde(default)]
    height: String,
}

impl GiphyRendition {
    fn aspect_ratio(&self) -> Option<f64> {
        let width = self.width.parse::<f64>().ok()?;
        let height = self.height.parse::<f64>().ok()?;
        if height <= 0.0 {
            return None;
        }
        Some(width / height)
    }
}

impl From<GiphyGif> for Gif {
    fn from(raw: GiphyGif) -> Self {
        let full = raw.images.fixed_width.as_ref().or(raw.images.original.as_ref());
        let preview = raw
            .images
            .fixed_width_small
            .as_ref()
            .or(full);
        let alt_text = raw
            .alt_text
            .filter(|alt| !alt.trim().is_empty())
            .or_else(|| Some(raw.title.clone()).filter(|title| !title.trim().is_empty()));
        Gif {
            id: raw.id,
            url: raw.url,
            gif_url: full.map(|r| r.url.clone()).unwrap_or_default(),
            gif_preview_url: preview.map(|r| r.url.clone()).unwrap_or_default(),
            alt_text,
            aspect_ratio: full.and_then(GiphyRendition::aspect_ratio).unwrap_or(1.0),
        }
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            bail!("giphy: api key required");
        }
        let base_url = Url::parse(config.base_url.trim())
            .with_context(|| format!("giphy: invalid base url {}", config.base_url))?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Client {
            http,
            api_key: config.api_key,
            base_url,
            rating: config.rating,
            user_agent: config.user_agent,
        })
    }

    pub fn trending(&self, offset: usize, limit: usize) -> Result<GifPage> {
        let url = self.endpoint("trending", None, offset, limit)?;
        self.fetch(url)
    }

    pub fn search(&self, query: &str, offset: usize, limit: usize) -> Result<GifPage> {
        if query.trim().is_empty() {
            return self.trending(offset, limit);
        }
        let url = self.endpoint("search", Some(query.trim()), offset, limit)?;
        self.fetch(url)
    }

    fn endpoint(&self, kind: &str, query: Option<&str>, offset: usize, limit: usize) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("giphy: base url cannot carry paths"))?
            .pop_if_empty()
            .extend(["gifs", kind]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api_key", &self.api_key);
            if let Some(query) = query {
                pairs.append_pair("q", query);
            }
            pairs.append_pair("offset", &offset.to_string());
            pairs.append_pair("limit", &limit.to_string());
            if !self.rating.is_empty() {
                pairs.append_pair("rating", &self.rating);
            }
        }
        Ok(url)
    }

    fn fetch(&self, url: Url) -> Result<GifPage> {
        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .context("giphy: request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            bail!("giphy: api error {}: {}", status, body);
        }
        let envelope: Envelope = resp.json().context("giphy: decode response")?;
        Ok(GifPage {
            items: envelope.data.into_iter().map(Gif::from).collect(),
            pagination: envelope.pagination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new(ClientConfig {
            api_key: "key".into(),
            base_url: "https://api.giphy.test/v1".into(),
            rating: "pg-13".into(),
            user_agent: "tests".into(),
            http_client: None,
        })
        .unwrap()
    }

    #[test]
    fn search_endpoint_carries_paging() {
        let url = client().endpoint("search", Some("cat"), 20, 10).unwrap();
        assert_eq!(url.path(), "/v1/gifs/search");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("q".into(), "cat".into())));
        assert!(pairs.contains(&("offset".into(), "20".into())));
        assert!(pairs.contains(&("limit".into(), "10".into())));
        assert!(pairs.contains(&("rating".into(), "pg-13".into())));
    }

    #[test]
    fn requires_api_key() {
        assert!(Client::new(ClientConfig {
            base_url: "https://api.giphy.test/v1".into(),
            ..ClientConfig::default()
        })
        .is_err());
    }

    #[test]
    fn decodes_envelope_into_page() {
        let raw = r#"{
            "data": [{
                "id": "g1",
                "url": "https://giphy.test/g1",
                "title": "Dancing cat",
                "images": {
                    "fixed_width": {"url": "https://media.test/g1.gif", "width": "200", "height": "100"},
                    "fixed_width_small": {"url": "https://media.test/g1s.gif", "width": "100", "height": "50"}
                }
            }],
            "pagination": {"total_count": 120, "count": 1, "offset": 0}
        }"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.pagination.total_count, 120);
        let gif = Gif::from(envelope.data.into_iter().next().unwrap());
        assert_eq!(gif.gif_url, "https://media.test/g1.gif");
        assert_eq!(gif.gif_preview_url, "https://media.test/g1s.gif");
        assert_eq!(gif.alt_text.as_deref(), Some("Dancing cat"));
        assert!((gif.aspect_ratio - 2.0).abs() < f64::EPSILON);
    }
}
