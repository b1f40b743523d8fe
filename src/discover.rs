//! TMDB 发现任务
//! 按原始语言 / 流媒体平台各取排名第一的剧集

use crate::reconcile::crawl_timestamp;
use crate::storage::{BlobStore, StorageError};
use crate::tmdb::{DiscoverFilter, DiscoveredTv, TmdbClient};
use serde::Serialize;
use tracing::{info, warn};

pub const LANGUAGE_BLOB: &str = "discover-tv-by-language.json";
pub const NETWORK_BLOB: &str = "discover-tv-by-network.json";

pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

pub const LANGUAGES: [Language; 7] = [
    Language { code: "en", name: "English" },
    Language { code: "zh", name: "Chinese" },
    Language { code: "ja", name: "Japanese" },
    Language { code: "ko", name: "Korean" },
    Language { code: "es", name: "Spanish" },
    Language { code: "th", name: "Thai" },
    Language { code: "hi", name: "Hindi" },
];

pub struct Network {
    pub id: u32,
    pub name: &'static str,
    pub logo_path: &'static str,
}

pub const NETWORKS: [Network; 12] = [
    Network { id: 2130, name: "Netflix", logo_path: "/tyHnxjQJLH6h4iDQKhN5iqebWmX.png" },
    Network { id: 453, name: "Hulu", logo_path: "/pqUTCleNUiTLAVlelGxUgWn1ELh.png" },
    Network { id: 2552, name: "Apple TV", logo_path: "/bngHRFi794mnMq34gfVcm9nDxN1.png" },
    Network { id: 2739, name: "Disney+", logo_path: "/1edZOYAfoyZyZ3rklNSiUpXX30Q.png" },
    Network { id: 8304, name: "HBO Max", logo_path: "/gqWI9y0owo9sxgzZD7TXOeILYI9.png" },
    Network { id: 3353, name: "Peacock", logo_path: "/gIAcGTjKKr0KOHL5s4O36roJ8p7.png" },
    Network { id: 1024, name: "Prime Video", logo_path: "/w7HfLNm9CWwRmAMU58udl2L7We7.png" },
    Network { id: 2007, name: "Tencent Video", logo_path: "/6Lfll43wYG2eyereOBjpYFRSGs4.png" },
    Network { id: 1330, name: "iQiyi", logo_path: "/fNxBFqWr7eWEgNeBDvvCxsSItXx.png" },
    Network { id: 1419, name: "Youku", logo_path: "/w2TeR3fvPZ9a617tNIF1oOfyPtk.png" },
    Network { id: 1631, name: "Mango TV", logo_path: "/c6GPQWwbXDuD59pGGutCBQ1T711.png" },
    Network { id: 1605, name: "bilibili", logo_path: "/mtmMg3PD4YGfrlmqpEiO6NL2ch9.png" },
];

/// 剧集公共字段
#[derive(Debug, Clone, Serialize)]
pub struct TvSummary {
    pub id: u64,
    pub name: String,
    pub original_name: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub first_air_date: Option<String>,
    pub vote_average: f64,
    pub vote_count: u64,
    pub genre_ids: Vec<u32>,
}

impl From<DiscoveredTv> for TvSummary {
    fn from(tv: DiscoveredTv) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            id: tv.id,
            name: tv.name.unwrap_or_default(),
            original_name: tv.original_name.unwrap_or_default(),
            overview: non_empty(tv.overview),
            poster_path: non_empty(tv.poster_path),
            backdrop_path: non_empty(tv.backdrop_path),
            first_air_date: non_empty(tv.first_air_date),
            vote_average: tv.vote_average.unwrap_or(0.0),
            vote_count: tv.vote_count.unwrap_or(0),
            genre_ids: tv.genre_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguagePick {
    pub language: String,
    pub language_name: String,
    #[serde(flatten)]
    pub tv: TvSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPick {
    pub network_id: u32,
    pub network_name: String,
    pub network_logo_path: Option<String>,
    #[serde(flatten)]
    pub tv: TvSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverDocument<'a, T> {
    count: usize,
    last_updated: String,
    data: &'a [T],
}

async fn first_tv(client: &TmdbClient, filter: DiscoverFilter<'_>) -> Option<TvSummary> {
    match client.discover_tv(filter).await {
        Ok(results) => results.into_iter().next().map(TvSummary::from),
        Err(e) => {
            warn!("TMDB discover {:?} 失败: {}", filter, e);
            None
        }
    }
}

pub async fn discover_by_languages(client: &TmdbClient) -> Vec<LanguagePick> {
    info!("🌍 按语言发现剧集...");
    let mut picks = Vec::new();

    for lang in &LANGUAGES {
        match first_tv(client, DiscoverFilter::OriginalLanguage(lang.code)).await {
            Some(tv) => {
                info!("✅ {}: {} ({})", lang.name, tv.name, tv.original_name);
                picks.push(LanguagePick {
                    language: lang.code.to_string(),
                    language_name: lang.name.to_string(),
                    tv,
                });
            }
            None => info!("❌ {} 无结果", lang.name),
        }
    }

    info!("📊 共 {} 部剧集", picks.len());
    picks
}

pub async fn discover_by_networks(client: &TmdbClient) -> Vec<NetworkPick> {
    info!("📺 按平台发现剧集...");
    let mut picks = Vec::new();

    for network in &NETWORKS {
        match first_tv(client, DiscoverFilter::Network(network.id)).await {
            Some(tv) => {
                info!("✅ {}: {} ({})", network.name, tv.name, tv.original_name);
                picks.push(NetworkPick {
                    network_id: network.id,
                    network_name: network.name.to_string(),
                    network_logo_path: Some(network.logo_path.to_string()),
                    tv,
                });
            }
            None => info!("❌ {} 无结果", network.name),
        }
    }

    info!("📊 共 {} 部剧集", picks.len());
    picks
}

/// 非空时写入，返回条目数
pub async fn save_picks<T: Serialize + Sync>(
    store: &BlobStore,
    name: &str,
    picks: &[T],
) -> Result<usize, StorageError> {
    if picks.is_empty() {
        return Ok(0);
    }
    let document = DiscoverDocument {
        count: picks.len(),
        last_updated: crawl_timestamp(),
        data: picks,
    };
    store.put_json(name, &document).await?;
    info!("💾 已保存 {} 部剧集到 {}", picks.len(), name);
    Ok(picks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TmdbConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TmdbClient {
        TmdbClient::new(&TmdbConfig {
            token: "t".to_string(),
            base_url: server.uri(),
            language: "zh-CN".to_string(),
        })
    }

    #[tokio::test]
    async fn test_languages_skip_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/discover/tv"))
            .and(query_param("with_original_language", "ja"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": 1, "name": "葬送的芙莉莲", "original_name": "葬送のフリーレン", "overview": ""}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/discover/tv"))
            .and(query_param("with_original_language", "ko"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/discover/tv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let picks = discover_by_languages(&client_for(&server)).await;
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].language, "ja");
        assert_eq!(picks[0].language_name, "Japanese");
        assert!(picks[0].tv.overview.is_none());
        assert_eq!(picks[0].tv.vote_count, 0);

        let value = serde_json::to_value(&picks[0]).unwrap();
        assert_eq!(value["languageName"], "Japanese");
        assert_eq!(value["original_name"], "葬送のフリーレン");
    }

    #[tokio::test]
    async fn test_save_picks() {
        let store = BlobStore::in_memory();
        assert_eq!(save_picks::<NetworkPick>(&store, NETWORK_BLOB, &[]).await.unwrap(), 0);
        assert!(store.get_raw(NETWORK_BLOB).await.is_err());

        let pick = NetworkPick {
            network_id: 2130,
            network_name: "Netflix".to_string(),
            network_logo_path: Some("/logo.png".to_string()),
            tv: TvSummary::from(DiscoveredTv {
                id: 66732,
                name: Some("怪奇物语".to_string()),
                ..DiscoveredTv::default()
            }),
        };
        assert_eq!(save_picks(&store, NETWORK_BLOB, &[pick]).await.unwrap(), 1);

        let raw = store.get_raw(NETWORK_BLOB).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["data"][0]["networkId"], 2130);
        assert_eq!(value["data"][0]["id"], 66732);
    }
}
