use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
    sync::Arc,
    time::{Instant, SystemTime, UNIX_EPOCH},
};
use tower_http::services::{ServeDir, ServeFile};

use crate::catalog::{Category, IndustryData, Product, ProductSource, StaticCatalog};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DIST_DIR: &str = "dist";
const DEFAULT_API_CACHE_MAX_AGE_SECONDS: u64 = 300;
const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

const API_CACHE_MAX_AGE_SECONDS_BOUNDS: (u64, u64) = (0, 86_400);
const REQUEST_ID_HEADER: &str = "x-request-id";

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LogLevel {
    Debug,
    Info,
}

impl PartialOrd for LogLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(level: LogLevel) -> u8 {
            match level {
                LogLevel::Debug => 0,
                LogLevel::Info => 1,
            }
        }

        rank(*self).cmp(&rank(*other))
    }
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
        }
    }
}

#[derive(Clone, Debug)]
struct ServerConfig {
    port: u16,
    dist_dir: PathBuf,
    api_cache_max_age_seconds: u64,
    log_level: LogLevel,
}

impl ServerConfig {
    fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let dist_dir = parse_env_non_empty_string("DIST_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIST_DIR));
        let api_cache_max_age_seconds = parse_env_u64_with_bounds(
            "API_CACHE_MAX_AGE_SECONDS",
            DEFAULT_API_CACHE_MAX_AGE_SECONDS,
            API_CACHE_MAX_AGE_SECONDS_BOUNDS,
        );
        let log_level = parse_log_level("LOG_LEVEL", DEFAULT_LOG_LEVEL);

        Self {
            port,
            dist_dir,
            api_cache_max_age_seconds,
            log_level,
        }
    }

    fn api_cache_control(&self) -> HeaderValue {
        if self.api_cache_max_age_seconds == 0 {
            return HeaderValue::from_static("no-store");
        }

        cache_control(&format!("public, max-age={}", self.api_cache_max_age_seconds))
    }
}

#[derive(Clone)]
pub struct AppState {
    catalog: Arc<StaticCatalog>,
    config: ServerConfig,
}

#[derive(Deserialize, Default)]
struct ProductQuery {
    industry: Option<String>,
    category: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiPayload<T> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiPayload<T> {
    fn data(value: T) -> Self {
        Self {
            ok: true,
            data: Some(value),
            error: None,
        }
    }

    fn error(message: &str) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env();
    let catalog = StaticCatalog::embedded()?;
    let bind_address = format!("0.0.0.0:{}", config.port);

    log_event(
        &config,
        LogLevel::Info,
        "catalog_loaded",
        serde_json::json!({
            "products": catalog.all_products().len(),
            "industries": catalog.industries().len(),
        }),
    );

    let state = AppState {
        catalog: Arc::new(catalog),
        config,
    };
    let port = state.config.port;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    println!("server listening on http://127.0.0.1:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    let dist_dir = state.config.dist_dir.clone();
    let static_service =
        ServeDir::new(&dist_dir).not_found_service(ServeFile::new(dist_dir.join("index.html")));

    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
        .route("/api/industries/{slug}", get(get_industry))
        .fallback_service(static_service)
        .with_state(state)
}

async fn list_products(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<ProductQuery>,
) -> axum::response::Response {
    let request_started_at = Instant::now();
    let request_id = resolve_request_id(&headers);
    log_request_start(&state.config, &request_id, &method, &uri);

    let category = match query.category.as_deref() {
        Some(raw) => match Category::from_slug(raw) {
            Some(category) => Some(category),
            None => {
                return complete(
                    &state.config,
                    &request_id,
                    request_started_at,
                    StatusCode::BAD_REQUEST,
                    ApiPayload::<Vec<Product>>::error("unknown product category"),
                    HeaderValue::from_static("no-store"),
                );
            }
        },
        None => None,
    };

    let catalog = state.catalog.as_ref();
    let selected = match (query.industry.as_deref(), category) {
        (Some(slug), Some(category)) => catalog
            .products_for_industry(slug)
            .into_iter()
            .filter(|product| product.category == category)
            .collect(),
        (Some(slug), None) => catalog.products_for_industry(slug),
        (None, Some(category)) => catalog.products_in_category(category),
        (None, None) => catalog.active_products(),
    };
    let products: Vec<Product> = selected.into_iter().cloned().collect();

    complete(
        &state.config,
        &request_id,
        request_started_at,
        StatusCode::OK,
        ApiPayload::data(products),
        state.config.api_cache_control(),
    )
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> axum::response::Response {
    let request_started_at = Instant::now();
    let request_id = resolve_request_id(&headers);
    log_request_start(&state.config, &request_id, &method, &uri);

    match state.catalog.product_by_id(&id) {
        Some(product) => complete(
            &state.config,
            &request_id,
            request_started_at,
            StatusCode::OK,
            ApiPayload::data(product.clone()),
            state.config.api_cache_control(),
        ),
        None => complete(
            &state.config,
            &request_id,
            request_started_at,
            StatusCode::NOT_FOUND,
            ApiPayload::<Product>::error("product not found"),
            HeaderValue::from_static("no-store"),
        ),
    }
}

async fn get_industry(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> axum::response::Response {
    let request_started_at = Instant::now();
    let request_id = resolve_request_id(&headers);
    log_request_start(&state.config, &request_id, &method, &uri);

    match state.catalog.industry(&slug) {
        Some(industry) => complete(
            &state.config,
            &request_id,
            request_started_at,
            StatusCode::OK,
            ApiPayload::data(industry.clone()),
            state.config.api_cache_control(),
        ),
        None => complete(
            &state.config,
            &request_id,
            request_started_at,
            StatusCode::NOT_FOUND,
            ApiPayload::<IndustryData>::error("industry not found"),
            HeaderValue::from_static("no-store"),
        ),
    }
}

fn log_request_start(config: &ServerConfig, request_id: &str, method: &Method, uri: &Uri) {
    log_event(
        config,
        LogLevel::Debug,
        "api_request_start",
        serde_json::json!({
            "request_id": request_id,
            "method": method.as_str(),
            "path": uri.path(),
        }),
    );
}

fn complete<T: Serialize>(
    config: &ServerConfig,
    request_id: &str,
    request_started_at: Instant,
    status: StatusCode,
    payload: ApiPayload<T>,
    cache_control: HeaderValue,
) -> axum::response::Response {
    log_event(
        config,
        LogLevel::Info,
        "api_request_complete",
        serde_json::json!({
            "request_id": request_id,
            "status": status.as_u16(),
            "error": payload.error.as_deref(),
            "duration_ms": request_started_at.elapsed().as_millis(),
        }),
    );

    json_response(status, payload, cache_control, request_id)
}

fn json_response<T: Serialize>(
    status: StatusCode,
    payload: ApiPayload<T>,
    cache_control: HeaderValue,
    request_id: &str,
) -> axum::response::Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, cache_control);
    headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
    response_with_request_id(status, headers, Json(payload), request_id)
}

fn cache_control(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("no-store"))
}

fn parse_env_u64_with_bounds(name: &str, default: u64, bounds: (u64, u64)) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| (bounds.0..=bounds.1).contains(value))
        .unwrap_or(default)
}

fn parse_env_non_empty_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_log_level(name: &str, default: LogLevel) -> LogLevel {
    match parse_env_non_empty_string(name)
        .unwrap_or_else(|| default.as_str().to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "debug" => LogLevel::Debug,
        "info" => LogLevel::Info,
        _ => default,
    }
}

fn now_unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis())
        .unwrap_or(0)
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}

fn generate_request_id() -> String {
    let counter = REQUEST_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    format!("req-{}-{counter}", now_unix_millis())
}

fn resolve_request_id(headers: &HeaderMap) -> String {
    let value = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|raw| raw.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string);

    value.unwrap_or_else(generate_request_id)
}

fn response_with_request_id(
    status: StatusCode,
    mut headers: HeaderMap,
    payload: impl IntoResponse,
    request_id: &str,
) -> axum::response::Response {
    if let Ok(request_id_header) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, request_id_header);
    }
    (status, headers, payload).into_response()
}

fn log_event(config: &ServerConfig, level: LogLevel, event: &str, fields: serde_json::Value) {
    if level < config.log_level {
        return;
    }

    let mut payload = serde_json::Map::new();
    payload.insert(
        "ts".to_string(),
        serde_json::Value::Number(serde_json::Number::from(now_unix_seconds())),
    );
    payload.insert("level".to_string(), serde_json::Value::String(level.as_str().to_string()));
    payload.insert("event".to_string(), serde_json::Value::String(event.to_string()));

    if let serde_json::Value::Object(extra) = fields {
        for (key, value) in extra {
            payload.insert(key, value);
        }
    }

    println!("{}", serde_json::Value::Object(payload));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_server_config() -> ServerConfig {
        ServerConfig {
            port: DEFAULT_PORT,
            dist_dir: PathBuf::from(DEFAULT_DIST_DIR),
            api_cache_max_age_seconds: DEFAULT_API_CACHE_MAX_AGE_SECONDS,
            log_level: DEFAULT_LOG_LEVEL,
        }
    }

    fn test_state() -> AppState {
        AppState {
            catalog: Arc::new(StaticCatalog::embedded().expect("embedded data is valid")),
            config: test_server_config(),
        }
    }

    fn headers_with_request_id(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            REQUEST_ID_HEADER,
            HeaderValue::from_str(value).expect("valid header"),
        );
        headers
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        serde_json::from_slice(&bytes).expect("body is JSON")
    }

    #[tokio::test]
    async fn list_products_filters_by_industry_and_category() {
        let response = list_products(
            State(test_state()),
            Method::GET,
            Uri::from_static("/api/products?industry=transportation&category=bond"),
            HeaderMap::new(),
            Query(ProductQuery {
                industry: Some("transportation".to_string()),
                category: Some("bond".to_string()),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("public, max-age=300"))
        );

        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        let ids: Vec<&str> = body["data"]
            .as_array()
            .expect("data is a list")
            .iter()
            .filter_map(|product| product["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["sb-220", "sb-340"]);
    }

    #[tokio::test]
    async fn list_products_filters_by_category_alone() {
        let response = list_products(
            State(test_state()),
            Method::GET,
            Uri::from_static("/api/products?category=seal"),
            HeaderMap::new(),
            Query(ProductQuery {
                industry: None,
                category: Some("seal".to_string()),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let ids: Vec<&str> = body["data"]
            .as_array()
            .expect("data is a list")
            .iter()
            .filter_map(|product| product["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["fs-100", "rs-500", "gs-12"]);
    }

    #[tokio::test]
    async fn list_products_rejects_unknown_category() {
        let response = list_products(
            State(test_state()),
            Method::GET,
            Uri::from_static("/api/products?category=glue"),
            HeaderMap::new(),
            Query(ProductQuery {
                industry: None,
                category: Some("glue".to_string()),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "unknown product category");
    }

    #[tokio::test]
    async fn list_products_omits_inactive_products() {
        let response = list_products(
            State(test_state()),
            Method::GET,
            Uri::from_static("/api/products"),
            HeaderMap::new(),
            Query(ProductQuery::default()),
        )
        .await;

        let body = body_json(response).await;
        let products = body["data"].as_array().expect("data is a list");
        assert!(products.iter().all(|product| product["isActive"] == true));
        assert!(products.iter().all(|product| product["id"] != "sb-110"));
    }

    #[tokio::test]
    async fn get_product_echoes_request_id() {
        let response = get_product(
            State(test_state()),
            Path("fs-100".to_string()),
            Method::GET,
            Uri::from_static("/api/products/fs-100"),
            headers_with_request_id("req-fixed"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER),
            Some(&HeaderValue::from_static("req-fixed"))
        );
        let body = body_json(response).await;
        assert_eq!(body["data"]["category"], "SEAL");
        assert_eq!(body["data"]["shortName"], "FS-100");
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let response = get_product(
            State(test_state()),
            Path("nope".to_string()),
            Method::GET,
            Uri::from_static("/api/products/nope"),
            HeaderMap::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
        assert!(response.headers().get(REQUEST_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn industry_payload_carries_resolved_hotspots() {
        let response = get_industry(
            State(test_state()),
            Path("transportation".to_string()),
            Method::GET,
            Uri::from_static("/api/industries/transportation"),
            HeaderMap::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let hotspot = &body["data"]["components"][0]["hotspots"][0];
        assert_eq!(hotspot["id"], "roof-seam");
        assert_eq!(hotspot["product"]["detailUrl"], "/products/seal/rs-500");
    }

    #[test]
    fn zero_max_age_disables_caching() {
        let config = ServerConfig {
            api_cache_max_age_seconds: 0,
            ..test_server_config()
        };

        assert_eq!(config.api_cache_control(), HeaderValue::from_static("no-store"));
    }

    #[test]
    fn blank_request_id_header_is_replaced() {
        let request_id = resolve_request_id(&headers_with_request_id("   "));
        assert!(request_id.starts_with("req-"));
    }
}
