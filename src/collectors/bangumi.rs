//! Bangumi 番组计划 "趋势" 排序页

use super::{Collector, CollectorError, PageFetcher, PageRequest, TitleList};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

const TRENDS_URL: &str = "https://bangumi.tv/anime/browser/?sort=trends";

const MAX_TITLES: usize = 20;

/// `<h3> ... <a href="/subject/123" class="l">标题</a>`
static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<h3>\s*(?:<[^>]*>\s*)*<a\s+href="/subject/\d+"\s+class="l">([^<]+)</a>"#)
        .expect("invalid bangumi title regex")
});

pub struct BangumiCollector {
    fetcher: Arc<dyn PageFetcher>,
}

impl BangumiCollector {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Collector for BangumiCollector {
    fn name(&self) -> &'static str {
        "bangumi"
    }

    async fn collect(&self) -> Result<Vec<String>, CollectorError> {
        let html = self.fetcher.fetch(&PageRequest::new(TRENDS_URL)).await?;
        let titles = parse_trends_page(&html);
        debug!("Bangumi 获取 {} 个标题", titles.len());
        Ok(titles)
    }
}

fn parse_trends_page(html: &str) -> Vec<String> {
    let mut titles = TitleList::with_limit(MAX_TITLES);
    for caps in TITLE_RE.captures_iter(html) {
        if titles.is_full() {
            break;
        }
        titles.push(&caps[1]);
    }
    titles.into_vec()
}
