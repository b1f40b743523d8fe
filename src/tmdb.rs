//! TMDB 客户端
//! 标题匹配 (search)、发现 (discover) 以及代理路由用的原始 JSON 请求

use crate::config::TmdbConfig;
use crate::http_client::{HttpClientError, HTTP_CLIENT};
use crate::types::{Candidate, MediaKind};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("TMDB 地址无效: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] HttpClientError),
    #[error("TMDB 返回 {status}: {message}")]
    Status { status: u16, message: String },
    #[error("TMDB 响应解析失败: {0}")]
    Decode(String),
}

/// 按标题查找规范条目
///
/// 只返回排名第一的候选，`None` 表示没有结果。
#[async_trait]
pub trait CanonicalLookup: Send + Sync {
    async fn lookup(&self, title: &str, kind: MediaKind) -> Result<Option<Candidate>, TmdbError>;
}

#[derive(Debug, Deserialize)]
struct Paged<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// discover/tv 的一条结果
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveredTv {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<u64>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
pub enum DiscoverFilter<'a> {
    OriginalLanguage(&'a str),
    Network(u32),
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    base_url: String,
    token: String,
    language: String,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            language: config.language.clone(),
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, TmdbError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// 请求 TMDB 并解析 JSON，非 2xx 时带上 status_message
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, TmdbError> {
        let url = self.endpoint(path, params)?;
        debug!("TMDB 请求: {}", url);

        let response = HTTP_CLIENT
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(HttpClientError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["status_message"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(TmdbError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TmdbError::Decode(e.to_string()))
    }

    /// 按标题搜索，结果顺序即 TMDB 排序
    pub async fn search(&self, title: &str, kind: MediaKind) -> Result<Vec<Candidate>, TmdbError> {
        let path = match kind {
            MediaKind::Movie => "/3/search/movie",
            MediaKind::Tv => "/3/search/tv",
        };
        let page: Paged<Candidate> = self
            .get_json(
                path,
                &[
                    ("query", title.to_string()),
                    ("language", self.language.clone()),
                ],
            )
            .await?;
        Ok(page.results)
    }

    pub async fn discover_tv(
        &self,
        filter: DiscoverFilter<'_>,
    ) -> Result<Vec<DiscoveredTv>, TmdbError> {
        let mut params = vec![
            ("language", self.language.clone()),
            ("page", "1".to_string()),
        ];
        match filter {
            DiscoverFilter::OriginalLanguage(code) => {
                params.push(("with_original_language", code.to_string()))
            }
            DiscoverFilter::Network(id) => params.push(("with_networks", id.to_string())),
        }
        let page: Paged<DiscoveredTv> = self.get_json("/3/discover/tv", &params).await?;
        Ok(page.results)
    }
}

#[async_trait]
impl CanonicalLookup for TmdbClient {
    async fn lookup(&self, title: &str, kind: MediaKind) -> Result<Option<Candidate>, TmdbError> {
        Ok(self.search(title, kind).await?.into_iter().next())
    }
}
