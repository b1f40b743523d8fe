mod collectors;
mod config;
mod crawler;
mod discover;
mod http_client;
mod reconcile;
mod storage;
mod tmdb;
mod tmdb_proxy;
mod types;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::collectors::HttpPageFetcher;
use crate::config::Config;
use crate::crawler::{CrawlError, Crawler, Source};
use crate::storage::{BlobStore, StorageError};
use crate::tmdb::TmdbClient;

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<TmdbClient>,
    pub crawler: Crawler,
}

impl AppState {
    fn store(&self) -> &BlobStore {
        &self.crawler.store
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let config = Config::from_env().context("加载配置失败")?;
    let store = BlobStore::from_config(&config.storage).context("初始化存储失败")?;
    let tmdb = Arc::new(TmdbClient::new(&config.tmdb));

    let state = AppState {
        tmdb: tmdb.clone(),
        crawler: Crawler {
            fetcher: Arc::new(HttpPageFetcher),
            lookup: tmdb,
            store,
            delay: config.crawl_delay,
        },
    };

    // 启动时在后台跑一次全量抓取
    if config.crawl_on_start {
        let crawler = state.crawler.clone();
        tokio::spawn(async move {
            info!("📡 启动抓取全部来源...");
            for (source, result) in crawler.run_all(&Source::ALL).await {
                if let Err(e) = result {
                    error!("{} 抓取失败: {}", source.slug(), e);
                }
            }
        });
    }

    // CORS 配置
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = app(state).layer(cors).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("🚀 热榜服务启动在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("监听 {} 失败", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(api_info_handler))
        .route("/health", get(health_handler))
        // 抓取
        .route("/crawler/crawl/movies", post(crawl_movies_handler))
        .route("/crawler/crawl/tv", post(crawl_tv_handler))
        .route("/crawler/crawl/{platform}/{category}", post(crawl_handler))
        .route("/crawler/cron/crawl-all", get(crawl_all_handler))
        .route("/crawler/crawl-all/stream", post(crawl_stream_handler))
        .route(
            "/crawler/discover/tv/{by}",
            get(discover_get_handler).post(discover_run_handler),
        )
        // 读取已保存的数据
        .route("/crawler/popular/{platform}/{category}", get(popular_handler))
        .route("/data/{name}", get(data_handler))
        .nest("/tmdb", tmdb_proxy::router())
        .with_state(state)
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

/// GET / - API 信息
async fn api_info_handler() -> impl IntoResponse {
    let sources: Vec<String> = Source::ALL.iter().map(|s| s.slug()).collect();
    Json(json!({
        "name": "Media Trends API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "豆瓣 / Bangumi / Bilibili 热榜 + TMDB 匹配",
        "sources": sources,
        "endpoints": {
            "crawler": {
                "POST /crawler/crawl/{platform}/{category}": "抓取单个来源",
                "GET /crawler/cron/crawl-all": "并行抓取全部来源",
                "POST /crawler/crawl-all/stream": "并行抓取全部来源 (NDJSON 进度)",
                "GET /crawler/popular/{platform}/{category}": "读取热榜",
                "POST /crawler/discover/tv/{language|network}": "运行发现任务",
                "GET /crawler/discover/tv/{language|network}": "读取发现结果",
                "GET /data/{name}.json": "读取已保存的 JSON"
            },
            "tmdb": {
                "GET /tmdb/search/keyword": "综合搜索",
                "GET /tmdb/genre/{movie|tv}/list": "类型列表",
                "GET /tmdb/{movie|tv}/{resource}": "详情 / 图片 / 演职员 / 推荐 / 视频 / 榜单",
                "GET /tmdb/tv/season/details": "季详情",
                "GET /tmdb/trending/{all|movie|tv}": "趋势",
                "GET /tmdb/discover/{movie|tv}": "发现"
            },
            "GET /health": "健康检查"
        }
    }))
}

/// 健康检查，附带各来源最近一次写入时间
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut sources = Map::new();
    for source in Source::ALL {
        let updated = state.store().last_updated(source.blob_name()).await;
        sources.insert(source.slug(), json!(updated));
    }
    Json(json!({
        "status": "ok",
        "sources": Value::Object(sources),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn run_source(state: &AppState, source: Source) -> Response {
    match state.crawler.run(source).await {
        Ok(report) => Json(json!({
            "success": true,
            "count": report.count,
            "saved": report.saved,
            "duplicates": report.duplicates,
        }))
        .into_response(),
        Err(e @ CrawlError::Collect(_)) => error_json(StatusCode::BAD_GATEWAY, e.to_string()),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// POST /crawler/crawl/{platform}/{category}
async fn crawl_handler(
    State(state): State<AppState>,
    Path((platform, category)): Path<(String, String)>,
) -> Response {
    match Source::from_route(&platform, &category) {
        Some(source) => run_source(&state, source).await,
        None => error_json(
            StatusCode::NOT_FOUND,
            format!("未知来源: {}/{}", platform, category),
        ),
    }
}

/// POST /crawler/crawl/movies
async fn crawl_movies_handler(State(state): State<AppState>) -> Response {
    run_source(&state, Source::DoubanMovies).await
}

/// POST /crawler/crawl/tv
async fn crawl_tv_handler(State(state): State<AppState>) -> Response {
    run_source(&state, Source::DoubanTv).await
}

/// GET /crawler/cron/crawl-all - 定时任务入口
async fn crawl_all_handler(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    info!("🕐 定时抓取开始: {}", chrono::Utc::now().to_rfc3339());

    let mut results = Map::new();
    let mut failed = 0;
    for (source, outcome) in state.crawler.run_all(&Source::ALL).await {
        let entry = match outcome {
            Ok(report) => json!({ "count": report.count, "saved": report.saved }),
            Err(e) => {
                failed += 1;
                error!("❌ {} 抓取失败: {}", source.slug(), e);
                json!({ "error": e.to_string() })
            }
        };
        results.insert(source.slug(), entry);
    }

    Json(json!({
        "success": failed == 0,
        "results": Value::Object(results),
        "duration": format!("{}s", started.elapsed().as_secs_f64().round()),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// POST /crawler/crawl-all/stream - 逐行返回抓取进度
async fn crawl_stream_handler(State(state): State<AppState>) -> Response {
    let stream = state.crawler.run_stream(Source::ALL.to_vec());
    let body = Body::from_stream(stream.map(Ok::<_, std::convert::Infallible>));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-ndjson; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// 原样返回存储中的 JSON
async fn serve_blob(store: &BlobStore, name: &str) -> Response {
    match store.get_raw(name).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(StorageError::NotFound(_)) => error_json(StatusCode::NOT_FOUND, "File not found"),
        Err(e) => {
            error!("读取 {} 失败: {}", name, e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file")
        }
    }
}

/// GET /crawler/popular/{platform}/{category}
async fn popular_handler(
    State(state): State<AppState>,
    Path((platform, category)): Path<(String, String)>,
) -> Response {
    match Source::from_route(&platform, &category) {
        Some(source) => serve_blob(state.store(), source.blob_name()).await,
        None => error_json(
            StatusCode::NOT_FOUND,
            format!("未知来源: {}/{}", platform, category),
        ),
    }
}

/// GET /data/{name}
async fn data_handler(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    if !name.ends_with(".json") || name.contains("..") || name.contains('/') {
        return error_json(StatusCode::NOT_FOUND, "File not found");
    }
    serve_blob(state.store(), &name).await
}

fn discover_blob(by: &str) -> Option<&'static str> {
    match by {
        "language" => Some(discover::LANGUAGE_BLOB),
        "network" => Some(discover::NETWORK_BLOB),
        _ => None,
    }
}

/// GET /crawler/discover/tv/{by}
async fn discover_get_handler(State(state): State<AppState>, Path(by): Path<String>) -> Response {
    match discover_blob(&by) {
        Some(name) => serve_blob(state.store(), name).await,
        None => error_json(StatusCode::NOT_FOUND, format!("未知发现任务: {}", by)),
    }
}

/// POST /crawler/discover/tv/{by}
async fn discover_run_handler(State(state): State<AppState>, Path(by): Path<String>) -> Response {
    let saved = match by.as_str() {
        "language" => {
            let picks = discover::discover_by_languages(&state.tmdb).await;
            discover::save_picks(state.store(), discover::LANGUAGE_BLOB, &picks).await
        }
        "network" => {
            let picks = discover::discover_by_networks(&state.tmdb).await;
            discover::save_picks(state.store(), discover::NETWORK_BLOB, &picks).await
        }
        _ => return error_json(StatusCode::NOT_FOUND, format!("未知发现任务: {}", by)),
    };

    match saved {
        Ok(count) => Json(json!({ "success": true, "count": count })).into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
