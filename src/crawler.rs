//! 抓取任务
//! 采集标题 -> TMDB 匹配 -> 去重 -> 写入存储

use crate::collectors::{
    BangumiCollector, BilibiliCollector, Collector, CollectorError, DoubanCollector, PageFetcher,
};
use crate::reconcile::reconcile;
use crate::storage::{BlobStore, StorageError};
use crate::tmdb::CanonicalLookup;
use crate::types::{CrawlReport, MediaKind, StreamEvent, StreamProgress, StreamResult};
use futures::future::join_all;
use futures::stream::Stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("采集失败: {0}")]
    Collect(#[from] CollectorError),
    #[error("保存失败: {0}")]
    Store(#[from] StorageError),
}

/// 热榜来源 (平台 + 分类)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    DoubanMovies,
    DoubanTv,
    DoubanAnimation,
    BilibiliAnime,
    BilibiliGuochuang,
    BangumiAnime,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::DoubanMovies,
        Source::DoubanTv,
        Source::DoubanAnimation,
        Source::BilibiliAnime,
        Source::BilibiliGuochuang,
        Source::BangumiAnime,
    ];

    /// 路由中的 `{platform}/{category}`
    pub fn from_route(platform: &str, category: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.platform() == platform && s.category() == category)
    }

    pub fn platform(self) -> &'static str {
        match self {
            Source::DoubanMovies | Source::DoubanTv | Source::DoubanAnimation => "douban",
            Source::BilibiliAnime | Source::BilibiliGuochuang => "bilibili",
            Source::BangumiAnime => "bangumi",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            Source::DoubanMovies => "movies",
            Source::DoubanTv => "tv",
            Source::DoubanAnimation => "animation",
            Source::BilibiliAnime | Source::BangumiAnime => "anime",
            Source::BilibiliGuochuang => "guochuang",
        }
    }

    pub fn slug(self) -> String {
        format!("{}/{}", self.platform(), self.category())
    }

    /// 文档中的 `type`
    pub fn document_type(self) -> &'static str {
        match self {
            Source::DoubanMovies => "movie",
            Source::DoubanTv => "tv_series",
            Source::DoubanAnimation => "animation",
            Source::BilibiliAnime | Source::BangumiAnime => "anime",
            Source::BilibiliGuochuang => "guochuang",
        }
    }

    pub fn blob_name(self) -> &'static str {
        match self {
            Source::DoubanMovies => "douban-movies.json",
            Source::DoubanTv => "douban-tv.json",
            Source::DoubanAnimation => "douban-animation.json",
            Source::BilibiliAnime => "bilibili-anime.json",
            Source::BilibiliGuochuang => "bilibili-guochuang.json",
            Source::BangumiAnime => "bangumi-anime.json",
        }
    }

    /// 在 TMDB 中按哪种类型搜索
    pub fn media_kind(self) -> MediaKind {
        match self {
            Source::DoubanMovies => MediaKind::Movie,
            _ => MediaKind::Tv,
        }
    }

    pub fn collector(self, fetcher: Arc<dyn PageFetcher>) -> Box<dyn Collector> {
        match self {
            Source::DoubanMovies => {
                Box::new(DoubanCollector::new("movie_real_time_hotest", fetcher))
            }
            Source::DoubanTv => Box::new(DoubanCollector::new("tv_real_time_hotest", fetcher)),
            Source::DoubanAnimation => Box::new(DoubanCollector::new("tv_animation", fetcher)),
            Source::BilibiliAnime => Box::new(BilibiliCollector::new("anime", fetcher)),
            Source::BilibiliGuochuang => Box::new(BilibiliCollector::new("guochuang", fetcher)),
            Source::BangumiAnime => Box::new(BangumiCollector::new(fetcher)),
        }
    }
}

/// 抓取所需的依赖
#[derive(Clone)]
pub struct Crawler {
    pub fetcher: Arc<dyn PageFetcher>,
    pub lookup: Arc<dyn CanonicalLookup>,
    pub store: BlobStore,
    pub delay: Duration,
}

impl Crawler {
    /// 抓取单个来源
    ///
    /// 没有任何命中时不写入，保留上一次的文档。
    pub async fn run(&self, source: Source) -> Result<CrawlReport, CrawlError> {
        info!("🎬 开始抓取 {}", source.slug());

        let collector = source.collector(self.fetcher.clone());
        let titles = collector.collect().await?;
        info!("📥 {} 获取 {} 个标题", collector.name(), titles.len());

        let result = reconcile(
            self.lookup.as_ref(),
            &titles,
            source.media_kind(),
            self.delay,
        )
        .await;

        let mut report = CrawlReport {
            scraped: result.scraped,
            count: result.matched.len(),
            saved: result.items.len(),
            duplicates: result.duplicates(),
            written: false,
        };

        if result.items.is_empty() {
            let previous = self.store.load_items(source.blob_name()).await.len();
            warn!(
                "{} 没有匹配到任何条目，保留上一次的 {} 条",
                source.slug(),
                previous
            );
            return Ok(report);
        }

        self.store
            .save_collection(
                source.blob_name(),
                source.platform(),
                source.document_type(),
                &result.items,
            )
            .await?;
        report.written = true;

        info!(
            "💾 {} 保存 {} 条 (去除 {} 条重复)",
            source.slug(),
            report.saved,
            report.duplicates
        );
        Ok(report)
    }

    /// 并行抓取多个来源，按传入顺序返回
    pub async fn run_all(
        &self,
        sources: &[Source],
    ) -> Vec<(Source, Result<CrawlReport, CrawlError>)> {
        let runs = sources
            .iter()
            .map(|&source| async move { (source, self.run(source).await) });
        join_all(runs).await
    }

    /// 并行抓取并以事件流返回进度 (每行一个 JSON)
    pub fn run_stream(&self, sources: Vec<Source>) -> impl Stream<Item = String> {
        let (tx, rx) = mpsc::channel::<String>(32);
        let crawler = self.clone();

        tokio::spawn(async move {
            crawler.execute_stream(sources, tx).await;
        });

        ReceiverStream::new(rx)
    }

    async fn execute_stream(self, sources: Vec<Source>, tx: mpsc::Sender<String>) {
        let total = sources.len();
        let completed = Arc::new(AtomicUsize::new(0));

        if tx.send(format_event(&StreamEvent::Init { total })).await.is_err() {
            return;
        }

        let mut handles = Vec::new();
        for source in sources {
            let crawler = self.clone();
            let tx = tx.clone();
            let completed = completed.clone();

            handles.push(tokio::spawn(async move {
                let outcome = crawler.run(source).await;
                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;

                let result = match outcome {
                    Ok(report) => StreamResult {
                        source: source.slug(),
                        success: true,
                        report: Some(report),
                        error: None,
                    },
                    Err(e) => {
                        warn!("{} 抓取失败: {}", source.slug(), e);
                        StreamResult {
                            source: source.slug(),
                            success: false,
                            report: None,
                            error: Some(e.to_string()),
                        }
                    }
                };

                let event = StreamEvent::Result {
                    progress: StreamProgress {
                        completed: current,
                        total,
                    },
                    result,
                };
                let _ = tx.send(format_event(&event)).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        let _ = tx.send(format_event(&StreamEvent::Done { done: true })).await;
        info!("✅ 流式抓取完成: {} 个来源", total);
    }
}

fn format_event(event: &StreamEvent) -> String {
    format!("{}\n", serde_json::to_string(event).unwrap_or_default())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::collectors::testing::FixturePages;
    use crate::reconcile::testing::TableLookup;
    use crate::types::ContentItem;
    use futures::StreamExt;

    pub const DOUBAN_MOVIES_URL: &str = "https://m.douban.com/rexxar/api/v2/subject_collection/movie_real_time_hotest/items?start=0&count=50";

    pub fn douban_movies_body() -> &'static str {
        r#"{"subject_collection_items": [
            {"title": "哪吒之魔童闹海"},
            {"title": "唐探1900"},
            {"title": "没有这部"},
            {"title": "哪吒之魔童闹海 IMAX"}
        ]}"#
    }

    pub fn test_crawler(pages: FixturePages, lookup: TableLookup) -> Crawler {
        Crawler {
            fetcher: Arc::new(pages),
            lookup: Arc::new(lookup),
            store: BlobStore::in_memory(),
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_source_routes_round_trip() {
        for source in Source::ALL {
            assert_eq!(Source::from_route(source.platform(), source.category()), Some(source));
        }
        assert_eq!(Source::from_route("douban", "books"), None);
        assert_eq!(Source::DoubanMovies.media_kind(), MediaKind::Movie);
        assert_eq!(Source::BangumiAnime.media_kind(), MediaKind::Tv);
    }

    #[tokio::test]
    async fn test_run_douban_movies_end_to_end() {
        let pages = FixturePages::default().with(DOUBAN_MOVIES_URL, douban_movies_body());
        let lookup = TableLookup::default()
            .with("哪吒之魔童闹海", 1_155_449)
            .with("唐探1900", 1_200_000);
        let crawler = test_crawler(pages, lookup);

        let report = crawler.run(Source::DoubanMovies).await.unwrap();
        // 第四个标题首段与第一个相同，采集时已丢弃
        assert_eq!(
            report,
            CrawlReport {
                scraped: 3,
                count: 2,
                saved: 2,
                duplicates: 0,
                written: true
            }
        );

        let doc = crawler
            .store
            .load_document::<ContentItem>("douban-movies.json")
            .await
            .unwrap();
        assert_eq!(doc.platform, "douban");
        assert_eq!(doc.kind, "movie");
        assert_eq!(doc.count, 2);
        assert_eq!(doc.data[0].title, "哪吒之魔童闹海");
        assert_eq!(doc.data[0].media_type, MediaKind::Movie);
        assert_eq!(doc.data[0].release_date.as_deref(), Some("2024-01-01"));
    }

    #[tokio::test]
    async fn test_no_match_keeps_previous_document() {
        let pages = FixturePages::default().with(DOUBAN_MOVIES_URL, douban_movies_body());
        let crawler = test_crawler(pages, TableLookup::default());
        crawler
            .store
            .save_collection("douban-movies.json", "douban", "movie", &["old"])
            .await
            .unwrap();

        let report = crawler.run(Source::DoubanMovies).await.unwrap();
        assert!(!report.written);
        assert_eq!(report.count, 0);

        let raw = crawler.store.get_raw("douban-movies.json").await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["data"][0], "old");
    }

    #[tokio::test]
    async fn test_collector_failure_is_reported() {
        let crawler = test_crawler(FixturePages::default(), TableLookup::default());
        let err = crawler.run(Source::BangumiAnime).await.unwrap_err();
        assert!(matches!(err, CrawlError::Collect(_)));
    }

    #[tokio::test]
    async fn test_run_all_preserves_order() {
        let pages = FixturePages::default().with(DOUBAN_MOVIES_URL, douban_movies_body());
        let lookup = TableLookup::default().with("唐探1900", 5);
        let crawler = test_crawler(pages, lookup);

        let results = crawler
            .run_all(&[Source::BilibiliAnime, Source::DoubanMovies])
            .await;
        assert_eq!(results[0].0, Source::BilibiliAnime);
        assert!(results[0].1.is_err());
        assert_eq!(results[1].0, Source::DoubanMovies);
        assert_eq!(results[1].1.as_ref().unwrap().saved, 1);
    }

    #[tokio::test]
    async fn test_run_stream_events() {
        let pages = FixturePages::default().with(DOUBAN_MOVIES_URL, douban_movies_body());
        let lookup = TableLookup::default().with("唐探1900", 5);
        let crawler = test_crawler(pages, lookup);

        let lines: Vec<String> = crawler
            .run_stream(vec![Source::DoubanMovies, Source::BangumiAnime])
            .collect()
            .await;
        let events: Vec<serde_json::Value> = lines
            .iter()
            .map(|l| serde_json::from_str(l.trim_end()).unwrap())
            .collect();

        assert_eq!(events.len(), 4);
        assert_eq!(events[0]["total"], 2);
        assert_eq!(events[3]["done"], true);

        let results: Vec<&serde_json::Value> = events[1..3].iter().map(|e| &e["result"]).collect();
        let douban = results
            .iter()
            .find(|r| r["source"] == "douban/movies")
            .unwrap();
        assert_eq!(douban["success"], true);
        assert_eq!(douban["report"]["saved"], 1);
        let bangumi = results
            .iter()
            .find(|r| r["source"] == "bangumi/anime")
            .unwrap();
        assert_eq!(bangumi["success"], false);
        assert!(bangumi["error"].is_string());
    }
}
