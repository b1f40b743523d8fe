//! /tmdb 代理路由
//! 参数整理后原样转发给 TMDB，返回其 JSON

use crate::tmdb::TmdbError;
use crate::types::MediaKind;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;

type Params = HashMap<String, String>;

const MOVIE_SORT_BY: &[&str] = &[
    "original_title.asc",
    "original_title.desc",
    "popularity.asc",
    "popularity.desc",
    "revenue.asc",
    "revenue.desc",
    "primary_release_date.asc",
    "title.asc",
    "title.desc",
    "primary_release_date.desc",
    "vote_average.asc",
    "vote_average.desc",
    "vote_count.asc",
    "vote_count.desc",
];

const TV_SORT_BY: &[&str] = &[
    "popularity.asc",
    "popularity.desc",
    "vote_average.asc",
    "vote_average.desc",
    "vote_count.asc",
    "vote_count.desc",
    "first_air_date.asc",
    "first_air_date.desc",
    "name.asc",
    "name.desc",
    "original_name.asc",
    "original_name.desc",
];

/// 转发给 TMDB 的请求
#[derive(Debug, PartialEq)]
struct Upstream {
    path: String,
    params: Vec<(&'static str, String)>,
    /// 只返回响应中的某个字段
    pick: Option<&'static str>,
}

impl Upstream {
    fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
            pick: None,
        }
    }

    fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    fn param_opt(mut self, key: &'static str, value: Option<&String>) -> Self {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.params.push((key, v.clone()));
        }
        self
    }

    fn pick(mut self, field: &'static str) -> Self {
        self.pick = Some(field);
        self
    }
}

#[derive(Debug, PartialEq)]
struct BadRequest(String);

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0 }))).into_response()
    }
}

fn or_default(q: &Params, key: &str, default: &str) -> String {
    q.get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn page(q: &Params) -> String {
    q.get("page")
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1)
        .to_string()
}

fn numeric(q: &Params, key: &str) -> Result<u64, BadRequest> {
    q.get(key)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| BadRequest(format!("Missing or invalid '{}' parameter", key)))
}

fn kind_from(segment: &str) -> Result<MediaKind, BadRequest> {
    MediaKind::parse(segment).ok_or_else(|| BadRequest(format!("Unknown media type: {}", segment)))
}

/// `/tmdb/{movie|tv}/{resource}` 对应的上游请求
fn resource_request(kind: MediaKind, resource: &str, q: &Params) -> Result<Upstream, BadRequest> {
    let k = kind.as_str();
    let language = || or_default(q, "language", "en");

    let upstream = match (kind, resource) {
        (_, "details") => {
            Upstream::new(format!("/3/{}/{}", k, numeric(q, "id")?)).param("language", language())
        }
        (_, "images") => Upstream::new(format!("/3/{}/{}/images", k, numeric(q, "id")?)),
        (_, "external_ids") => {
            Upstream::new(format!("/3/{}/{}/external_ids", k, numeric(q, "id")?))
        }
        (_, "credits") => Upstream::new(format!("/3/{}/{}/credits", k, numeric(q, "id")?))
            .param("language", language()),
        (_, "similar") => Upstream::new(format!("/3/{}/{}/recommendations", k, numeric(q, "id")?))
            .param("language", language()),
        (_, "videos") => Upstream::new(format!("/3/{}/{}/videos", k, numeric(q, "id")?))
            .param("language", language()),
        (_, "popular") | (_, "top_rated") => Upstream::new(format!("/3/{}/{}", k, resource))
            .param("language", language())
            .param("page", page(q)),
        (MediaKind::Movie, "upcoming") => Upstream::new("/3/movie/upcoming")
            .param("language", language())
            .param("region", or_default(q, "region", "US")),
        (MediaKind::Tv, "on_the_air") => Upstream::new("/3/tv/on_the_air")
            .param("language", language())
            .param("timezone", or_default(q, "timezone", "America/New_York")),
        _ => return Err(BadRequest(format!("Unknown resource: {}/{}", k, resource))),
    };
    Ok(upstream)
}

fn discover_request(kind: MediaKind, q: &Params) -> Result<Upstream, BadRequest> {
    let allowed = match kind {
        MediaKind::Movie => MOVIE_SORT_BY,
        MediaKind::Tv => TV_SORT_BY,
    };
    if let Some(sort_by) = q.get("sort_by").filter(|s| !s.is_empty()) {
        if !allowed.contains(&sort_by.as_str()) {
            return Err(BadRequest(format!(
                "Invalid sort_by value. Allowed values: {}",
                allowed.join(", ")
            )));
        }
    }

    Ok(Upstream::new(format!("/3/discover/{}", kind.as_str()))
        .param("language", or_default(q, "language", "en"))
        .param("page", page(q))
        .param_opt("sort_by", q.get("sort_by"))
        .param_opt("with_genres", q.get("with_genres"))
        .param_opt("without_genres", q.get("without_genres"))
        .param_opt("with_networks", q.get("with_networks"))
        .param_opt("with_original_language", q.get("with_original_language")))
}

fn trending_request(target: &str, q: &Params) -> Result<Upstream, BadRequest> {
    if !matches!(target, "all" | "movie" | "tv") {
        return Err(BadRequest(format!("Unknown trending target: {}", target)));
    }
    let window = or_default(q, "timeWindow", "day");
    if window != "day" && window != "week" {
        return Err(BadRequest("timeWindow must be 'day' or 'week'".to_string()));
    }

    let upstream = Upstream::new(format!("/3/trending/{}/{}", target, window))
        .param("language", or_default(q, "language", "en"));
    Ok(if target == "all" {
        upstream
    } else {
        upstream.param("page", page(q))
    })
}

async fn forward(state: &AppState, upstream: Upstream) -> Response {
    match state.tmdb.get_json::<Value>(&upstream.path, &upstream.params).await {
        Ok(mut value) => {
            let body = match upstream.pick {
                Some(field) => value
                    .get_mut(field)
                    .map(Value::take)
                    .unwrap_or_else(|| json!([])),
                None => value,
            };
            Json(body).into_response()
        }
        Err(TmdbError::Status { status, message }) if (400..500).contains(&status) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            Json(json!({ "error": message })),
        )
            .into_response(),
        Err(e) => {
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// GET /tmdb/search/keyword - 综合搜索
async fn search_keyword(State(state): State<AppState>, Query(q): Query<Params>) -> Response {
    let upstream = Upstream::new("/3/search/multi")
        .param("query", or_default(&q, "query", ""))
        .param("page", page(&q))
        .param("language", or_default(&q, "language", "en-US"))
        .pick("results");
    forward(&state, upstream).await
}

/// GET /tmdb/genre/{kind}/list
async fn genre_list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(q): Query<Params>,
) -> Response {
    let kind = match kind_from(&kind) {
        Ok(k) => k,
        Err(e) => return e.into_response(),
    };
    let upstream = Upstream::new(format!("/3/genre/{}/list", kind.as_str()))
        .param("language", or_default(&q, "language", "en"))
        .pick("genres");
    forward(&state, upstream).await
}

async fn movie_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(q): Query<Params>,
) -> Response {
    match resource_request(MediaKind::Movie, &resource, &q) {
        Ok(upstream) => forward(&state, upstream).await,
        Err(e) => e.into_response(),
    }
}

async fn tv_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(q): Query<Params>,
) -> Response {
    match resource_request(MediaKind::Tv, &resource, &q) {
        Ok(upstream) => forward(&state, upstream).await,
        Err(e) => e.into_response(),
    }
}

/// GET /tmdb/tv/season/details?id=&seasonNumber=
async fn tv_season(State(state): State<AppState>, Query(q): Query<Params>) -> Response {
    let (id, season) = match (numeric(&q, "id"), numeric(&q, "seasonNumber")) {
        (Ok(id), Ok(season)) => (id, season),
        (Err(e), _) | (_, Err(e)) => return e.into_response(),
    };
    let upstream = Upstream::new(format!("/3/tv/{}/season/{}", id, season))
        .param("language", or_default(&q, "language", "en"));
    forward(&state, upstream).await
}

async fn trending(
    State(state): State<AppState>,
    Path(target): Path<String>,
    Query(q): Query<Params>,
) -> Response {
    match trending_request(&target, &q) {
        Ok(upstream) => forward(&state, upstream).await,
        Err(e) => e.into_response(),
    }
}

async fn discover(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(q): Query<Params>,
) -> Response {
    match kind_from(&kind).and_then(|k| discover_request(k, &q)) {
        Ok(upstream) => forward(&state, upstream).await,
        Err(e) => e.into_response(),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search/keyword", get(search_keyword))
        .route("/genre/{kind}/list", get(genre_list))
        .route("/movie/{resource}", get(movie_resource))
        .route("/tv/season/details", get(tv_season))
        .route("/tv/{resource}", get(tv_resource))
        .route("/trending/{target}", get(trending))
        .route("/discover/{kind}", get(discover))
}
