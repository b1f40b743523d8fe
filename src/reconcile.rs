//! 标题匹配与去重
//!
//! 抓取到的标题逐个交给 [`CanonicalLookup`] 查找，命中的第一条候选与标题合并成
//! [`ContentItem`]，最后按 `tmdbId` 去重，同一条目保留 `crawledAt` 最新的一份。
//! 查找失败只记日志，按未命中处理，不重试。

use crate::tmdb::CanonicalLookup;
use crate::types::{Candidate, ContentItem, MediaKind};
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// 一次匹配的结果
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub scraped: usize,
    /// 去重前命中的条目
    pub matched: Vec<ContentItem>,
    pub items: Vec<ContentItem>,
}

impl Reconciled {
    pub fn duplicates(&self) -> usize {
        self.matched.len() - self.items.len()
    }
}

/// 当前时间, 形如 `2025-01-01T08:00:00.000Z`
pub fn crawl_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// 合并抓取标题与 TMDB 候选
pub fn merge(
    title: &str,
    candidate: Candidate,
    kind: MediaKind,
    crawled_at: String,
) -> ContentItem {
    let (release_date, first_air_date) = match kind {
        MediaKind::Movie => (non_empty(candidate.release_date), None),
        MediaKind::Tv => (None, non_empty(candidate.first_air_date)),
    };

    ContentItem {
        title: title.to_string(),
        tmdb_id: candidate.id,
        vote_average: candidate.vote_average,
        poster_path: candidate.poster_path,
        backdrop_path: candidate.backdrop_path,
        genre_ids: candidate.genre_ids,
        media_type: kind,
        release_date,
        first_air_date,
        overview: candidate.overview,
        crawled_at,
    }
}

/// 按 `tmdbId` 去重
///
/// 同一 id 保留 `crawledAt` 字典序最大的一条，相同时保留先出现的；
/// 输出顺序为每个 id 第一次出现的位置。
pub fn dedupe_by_tmdb_id(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut slots: HashMap<u64, usize> = HashMap::new();
    let mut out: Vec<ContentItem> = Vec::with_capacity(items.len());

    for item in items {
        match slots.get(&item.tmdb_id) {
            Some(&idx) => {
                if item.crawled_at > out[idx].crawled_at {
                    out[idx] = item;
                }
            }
            None => {
                slots.insert(item.tmdb_id, out.len());
                out.push(item);
            }
        }
    }

    out
}

/// 逐个查找标题，每次查找后固定等待 `delay`
pub async fn resolve_titles(
    lookup: &dyn CanonicalLookup,
    titles: &[String],
    kind: MediaKind,
    delay: Duration,
) -> Vec<ContentItem> {
    let mut matched = Vec::new();

    for title in titles {
        info!("🔍 搜索: {}", title);

        match lookup.lookup(title, kind).await {
            Ok(Some(candidate)) => {
                let matched_name = candidate
                    .title
                    .as_deref()
                    .or(candidate.name.as_deref())
                    .unwrap_or_default();
                info!("✅ {} ({})", matched_name, candidate.id);
                matched.push(merge(title, candidate, kind, crawl_timestamp()));
            }
            Ok(None) => info!("❌ 未找到: {}", title),
            Err(e) => warn!("TMDB 搜索 \"{}\" 失败: {}", title, e),
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    matched
}

/// 查找 + 去重
pub async fn reconcile(
    lookup: &dyn CanonicalLookup,
    titles: &[String],
    kind: MediaKind,
    delay: Duration,
) -> Reconciled {
    let matched = resolve_titles(lookup, titles, kind, delay).await;
    let items = dedupe_by_tmdb_id(matched.clone());

    Reconciled {
        scraped: titles.len(),
        matched,
        items,
    }
}
