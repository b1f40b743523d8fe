//! 豆瓣移动端榜单 (subject_collection)

use super::{Collector, CollectorError, PageFetcher, PageRequest, TitleList};
use crate::http_client::MOBILE_USER_AGENT;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const API_BASE: &str = "https://m.douban.com/rexxar/api/v2/subject_collection";
const PAGE_BASE: &str = "https://m.douban.com/subject_collection";
const PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct CollectionItems {
    #[serde(default)]
    subject_collection_items: Vec<CollectionItem>,
}

#[derive(Debug, Deserialize)]
struct CollectionItem {
    #[serde(default)]
    title: String,
}

pub struct DoubanCollector {
    collection: &'static str,
    fetcher: Arc<dyn PageFetcher>,
}

impl DoubanCollector {
    /// `collection` 如 `movie_real_time_hotest`
    pub fn new(collection: &'static str, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            collection,
            fetcher,
        }
    }

    fn request(&self) -> PageRequest {
        PageRequest::new(format!(
            "{}/{}/items?start=0&count={}",
            API_BASE, self.collection, PAGE_SIZE
        ))
        .referer(format!("{}/{}", PAGE_BASE, self.collection))
        .user_agent(MOBILE_USER_AGENT)
    }
}

#[async_trait]
impl Collector for DoubanCollector {
    fn name(&self) -> &'static str {
        "douban"
    }

    async fn collect(&self) -> Result<Vec<String>, CollectorError> {
        let body = self.fetcher.fetch(&self.request()).await?;
        let titles = parse_collection(&body)?;
        debug!("豆瓣 {} 获取 {} 个标题", self.collection, titles.len());
        Ok(titles)
    }
}

fn parse_collection(body: &str) -> Result<Vec<String>, CollectorError> {
    let items: CollectionItems =
        serde_json::from_str(body).map_err(|e| CollectorError::Parse(e.to_string()))?;

    let mut titles = TitleList::default();
    for item in &items.subject_collection_items {
        titles.push(&item.title);
    }
    Ok(titles.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::FixturePages;

    const ITEMS: &str = r#"{
        "subject_collection_items": [
            {"title": "哪吒之魔童闹海", "type": "movie"},
            {"title": "唐探1900 限定版", "type": "movie"},
            {"title": "", "type": "movie"},
            {"title": "唐探1900", "type": "movie"},
            {"title": "封神第二部：战火西岐", "type": "movie"}
        ],
        "total": 5
    }"#;

    #[test]
    fn test_parse_collection() {
        let titles = parse_collection(ITEMS).unwrap();
        assert_eq!(titles, vec!["哪吒之魔童闹海", "唐探1900", "封神第二部：战火西岐"]);
    }

    #[test]
    fn test_parse_rejects_html() {
        assert!(matches!(
            parse_collection("<html>blocked</html>"),
            Err(CollectorError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_collect_sends_referer_and_mobile_ua() {
        let url = format!("{}/movie_real_time_hotest/items?start=0&count=50", API_BASE);
        let pages = Arc::new(FixturePages::default().with(&url, ITEMS));
        let collector = DoubanCollector::new("movie_real_time_hotest", pages.clone());

        let titles = collector.collect().await.unwrap();
        assert_eq!(titles.len(), 3);

        let requests = pages.requests.lock().unwrap();
        assert_eq!(
            requests[0].referer.as_deref(),
            Some("https://m.douban.com/subject_collection/movie_real_time_hotest")
        );
        assert_eq!(requests[0].user_agent.as_deref(), Some(MOBILE_USER_AGENT));
    }
}
