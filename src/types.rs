//! 公共数据类型

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

/// TMDB 媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(MediaKind::Movie),
            "tv" => Some(MediaKind::Tv),
            _ => None,
        }
    }
}

/// TMDB 搜索结果中的一条候选
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
}

/// 合并后的热榜条目
///
/// 电影只写 `release_date`，剧集只写 `first_air_date`，缺失时为 `null`。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentItem {
    /// 抓取到的原始标题
    pub title: String,
    #[serde(rename = "tmdbId")]
    pub tmdb_id: u64,
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    pub media_type: MediaKind,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    /// ISO-8601 UTC, 毫秒精度
    #[serde(rename = "crawledAt")]
    pub crawled_at: String,
}

impl Serialize for ContentItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ContentItem", 10)?;
        state.serialize_field("title", &self.title)?;
        state.serialize_field("tmdbId", &self.tmdb_id)?;
        state.serialize_field("vote_average", &self.vote_average)?;
        state.serialize_field("poster_path", &self.poster_path)?;
        state.serialize_field("backdrop_path", &self.backdrop_path)?;
        state.serialize_field("genre_ids", &self.genre_ids)?;
        state.serialize_field("media_type", &self.media_type)?;
        match self.media_type {
            MediaKind::Movie => state.serialize_field("release_date", &self.release_date)?,
            MediaKind::Tv => state.serialize_field("first_air_date", &self.first_air_date)?,
        }
        state.serialize_field("overview", &self.overview)?;
        state.serialize_field("crawledAt", &self.crawled_at)?;
        state.end()
    }
}

/// 写入对象存储的热榜文档
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDocument<T> {
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub count: usize,
    pub last_updated: String,
    pub data: Vec<T>,
}

/// 单个来源的抓取统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// 抓取到的标题数
    pub scraped: usize,
    /// 命中 TMDB 的条目数 (去重前)
    pub count: usize,
    /// 去重后写入的条目数
    pub saved: usize,
    pub duplicates: usize,
    /// 是否写入了存储
    pub written: bool,
}

/// 流式抓取中单个来源的结果
#[derive(Debug, Clone, Serialize)]
pub struct StreamResult {
    pub source: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CrawlReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StreamProgress {
    pub completed: usize,
    pub total: usize,
}

/// 流式事件 (每行一个 JSON)
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Init {
        total: usize,
    },
    Result {
        progress: StreamProgress,
        result: StreamResult,
    },
    Done {
        done: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_item_wire_names() {
        let item = ContentItem {
            title: "流浪地球".to_string(),
            tmdb_id: 535167,
            vote_average: Some(7.1),
            poster_path: None,
            backdrop_path: None,
            genre_ids: vec![878],
            media_type: MediaKind::Movie,
            release_date: Some("2019-02-05".to_string()),
            first_air_date: None,
            overview: None,
            crawled_at: "2025-01-01T00:00:00.000Z".to_string(),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["tmdbId"], 535167);
        assert_eq!(value["crawledAt"], "2025-01-01T00:00:00.000Z");
        assert_eq!(value["media_type"], "movie");
        assert!(value.get("first_air_date").is_none());
        assert_eq!(value["poster_path"], serde_json::Value::Null);
    }

    #[test]
    fn test_missing_date_is_null_for_its_kind() {
        let movie = ContentItem {
            title: "x".to_string(),
            tmdb_id: 1,
            vote_average: None,
            poster_path: None,
            backdrop_path: None,
            genre_ids: vec![],
            media_type: MediaKind::Movie,
            release_date: None,
            first_air_date: None,
            overview: None,
            crawled_at: "2025-01-01T00:00:00.000Z".to_string(),
        };
        let value = serde_json::to_value(&movie).unwrap();
        assert!(value.get("release_date").is_some_and(|v| v.is_null()));
        assert!(value.get("first_air_date").is_none());

        let tv = ContentItem {
            media_type: MediaKind::Tv,
            ..movie
        };
        let value = serde_json::to_value(&tv).unwrap();
        assert!(value.get("first_air_date").is_some_and(|v| v.is_null()));
        assert!(value.get("release_date").is_none());

        let back: ContentItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, tv);
    }

    #[test]
    fn test_stream_event_shapes() {
        let init = serde_json::to_value(StreamEvent::Init { total: 3 }).unwrap();
        assert_eq!(init, json!({"total": 3}));

        let done = serde_json::to_value(StreamEvent::Done { done: true }).unwrap();
        assert_eq!(done, json!({"done": true}));
    }

    #[test]
    fn test_candidate_tolerates_sparse_payload() {
        let c: Candidate = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(c.id, 42);
        assert!(c.genre_ids.is_empty());
        assert!(c.overview.is_none());
    }
}
