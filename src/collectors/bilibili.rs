//! Bilibili 排行榜页面

use super::{Collector, CollectorError, PageFetcher, PageRequest, TitleList};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::debug;

const RANK_BASE: &str = "https://www.bilibili.com/v/popular/rank";

/// 排行榜只看前 12 个链接
const MAX_LINKS: usize = 12;

const TITLE_SELECTOR: &str = ".content .info a";

pub struct BilibiliCollector {
    /// `anime` 或 `guochuang`
    category: &'static str,
    fetcher: Arc<dyn PageFetcher>,
}

impl BilibiliCollector {
    pub fn new(category: &'static str, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { category, fetcher }
    }

    fn url(&self) -> String {
        format!("{}/{}", RANK_BASE, self.category)
    }
}

#[async_trait]
impl Collector for BilibiliCollector {
    fn name(&self) -> &'static str {
        "bilibili"
    }

    async fn collect(&self) -> Result<Vec<String>, CollectorError> {
        let html = self.fetcher.fetch(&PageRequest::new(self.url())).await?;
        let titles = parse_rank_page(&html)?;
        debug!("Bilibili {} 获取 {} 个标题", self.category, titles.len());
        Ok(titles)
    }
}

fn parse_rank_page(html: &str) -> Result<Vec<String>, CollectorError> {
    let selector =
        Selector::parse(TITLE_SELECTOR).map_err(|e| CollectorError::Parse(e.to_string()))?;
    let document = Html::parse_document(html);

    let mut titles = TitleList::default();
    for link in document.select(&selector).take(MAX_LINKS) {
        titles.push(&link.text().collect::<String>());
    }
    Ok(titles.into_vec())
}
