//! 热榜采集器
//! 每个来源返回一组按热度排序的标题

mod bangumi;
mod bilibili;
mod douban;

pub use bangumi::BangumiCollector;
pub use bilibili::BilibiliCollector;
pub use douban::DoubanCollector;

use crate::http_client::{get_text, HttpClientError};
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Http(#[from] HttpClientError),
    #[error("页面解析失败: {0}")]
    Parse(String),
}

/// 页面请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl PageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: None,
            user_agent: None,
        }
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// 获取页面文本的能力
///
/// 默认实现是普通 HTTP GET；需要渲染的页面可以换成无头浏览器实现。
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<String, HttpClientError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpPageFetcher;

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<String, HttpClientError> {
        get_text(
            &request.url,
            request.referer.as_deref(),
            request.user_agent.as_deref(),
        )
        .await
    }
}

#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn collect(&self) -> Result<Vec<String>, CollectorError>;
}

/// 只保留第一个空格前的部分 (中文标题)
pub fn first_token(raw: &str) -> Option<&str> {
    raw.trim().split(' ').next().filter(|t| !t.is_empty())
}

/// 按首段标题去重的收集器
#[derive(Debug, Default)]
pub struct TitleList {
    seen: HashSet<String>,
    titles: Vec<String>,
    limit: Option<usize>,
}

impl TitleList {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|l| self.titles.len() >= l)
    }

    /// 返回是否被采纳
    pub fn push(&mut self, raw: &str) -> bool {
        if self.is_full() {
            return false;
        }
        match first_token(raw) {
            Some(title) if self.seen.insert(title.to_string()) => {
                self.titles.push(title.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.titles
    }
}
