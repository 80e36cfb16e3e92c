//! Purpose: Reference HTTP/JSON backend for the product catalogue.
//! Exports: `ServeConfig`, `serve`, `DEFAULT_CORS_ORIGINS`.
//! Role: Axum server over an in-memory `ProductStore`; same routes and envelopes as the real backend.
//! Invariants: Error bodies are always `{status, error, message, path, timestamp}`.
//! Invariants: Loopback-only unless explicitly allowed.
//! Notes: Delete answers with plain text, every other success is JSON.

use axum::body::Bytes;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::store::{
    DEFAULT_PAGE_SIZE, ListQuery, ProductInput, ProductStore, SortSpec, parse_category_param,
};
use prodcat::api::{Error, ErrorKind};

pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "http://localhost:4173",
];

const DELETE_ACK: &str = "Removido com sucesso.";
const SERVER_FAULT: &str = "Ocorreu um erro no servidor.";

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub seed: bool,
    pub cors_origins: Vec<String>,
    pub allow_non_loopback: bool,
}

struct AppState {
    store: Mutex<ProductStore>,
}

impl AppState {
    fn store(&self) -> MutexGuard<'_, ProductStore> {
        self.store.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    let origins = validate_config(&config)?;

    init_tracing();

    let store = if config.seed {
        ProductStore::with_demo_data(&now_rfc3339())
    } else {
        ProductStore::new()
    };
    if store.is_empty() {
        tracing::info!("catalogue is empty; pass --seed for demo data");
    }
    tracing::info!(bind = %config.bind, products = store.len(), "starting catalogue server");
    let state = Arc::new(AppState {
        store: Mutex::new(store),
    });

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/produtos", get(list_active).post(create_product))
        .route("/produtos/apagados", get(list_deleted))
        .route("/produtos/calcular_total", get(statistics))
        .route(
            "/produtos/:id",
            get(find_product).put(update_product).delete(delete_product),
        )
        .fallback(unknown_route)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_hint("Pick a free port with --bind.")
                .with_source(err)
        })?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(server_failed)?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(server_failed)?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn server_failed(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("server failed")
        .with_source(err)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

/// Check the bind policy and turn configured origins into header values.
pub fn validate_config(config: &ServeConfig) -> Result<Vec<HeaderValue>, Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    config
        .cors_origins
        .iter()
        .map(|origin| {
            let trimmed = origin.trim().trim_end_matches('/');
            let valid = trimmed.starts_with("http://") || trimmed.starts_with("https://");
            HeaderValue::from_str(trimmed)
                .ok()
                .filter(|_| valid)
                .ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message(format!("invalid CORS origin: {origin}"))
                        .with_hint("Use a scheme and host, like http://localhost:5173.")
                })
        })
        .collect()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn now_rfc3339() -> String {
    use time::format_description::well_known::Rfc3339;
    let now = time::OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

async fn healthz() -> Response {
    json_response(StatusCode::OK, json!({ "ok": true }))
}

async fn unknown_route(uri: Uri) -> Response {
    let err = Error::new(ErrorKind::NotFound).with_message("Recurso não encontrado.");
    error_response(err, &uri)
}

async fn list_active(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    list_products(&state, false, &uri)
}

async fn list_deleted(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    list_products(&state, true, &uri)
}

/// Query decoding failures surface as 400s with the standard error body.
fn query_params(uri: &Uri) -> Result<HashMap<String, String>, Error> {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(params)| params)
        .map_err(|rejection| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("Parâmetros inválidos: {}", rejection.body_text()))
        })
}

fn list_products(state: &AppState, deleted: bool, uri: &Uri) -> Response {
    let query = match query_params(uri).and_then(|params| list_query(&params)) {
        Ok(query) => query,
        Err(err) => return error_response(err, uri),
    };
    let page = state.store().list(deleted, &query);
    json_response(StatusCode::OK, page.to_json())
}

fn list_query(params: &HashMap<String, String>) -> Result<ListQuery, Error> {
    Ok(ListQuery {
        category: parse_category_param(params.get("categoria").map(String::as_str))?,
        sort: SortSpec::parse(params.get("sort").map(String::as_str))?,
        page: parse_count(params, "page", 0)?,
        size: parse_count(params, "size", DEFAULT_PAGE_SIZE)?,
    })
}

fn parse_count(params: &HashMap<String, String>, name: &str, default: u64) -> Result<u64, Error> {
    match params.get(name).map(|raw| raw.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message(format!("Parâmetro inválido: {name}={raw}"))
        }),
    }
}

async fn statistics(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let category = query_params(&uri)
        .and_then(|params| parse_category_param(params.get("categoria").map(String::as_str)));
    let category = match category {
        Ok(category) => category,
        Err(err) => return error_response(err, &uri),
    };
    let (count, average) = state.store().statistics(category);
    json_response(
        StatusCode::OK,
        json!({ "qntProdutos": count, "precoMedio": average }),
    )
}

async fn find_product(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    uri: Uri,
) -> Response {
    let result = parse_id(&id).and_then(|id| state.store().get(id).map(|product| product.to_json()));
    match result {
        Ok(value) => json_response(StatusCode::OK, value),
        Err(err) => error_response(err, &uri),
    }
}

async fn create_product(State(state): State<Arc<AppState>>, uri: Uri, body: Bytes) -> Response {
    let result = parse_input(&body).and_then(|input| state.store().create(input, &now_rfc3339()));
    match result {
        Ok(product) => {
            tracing::info!(id = product.id, "product created");
            json_response(StatusCode::OK, product.to_json())
        }
        Err(err) => error_response(err, &uri),
    }
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    uri: Uri,
    body: Bytes,
) -> Response {
    let result = parse_id(&id).and_then(|id| {
        let input = parse_input(&body)?;
        state.store().update(id, input, &now_rfc3339())
    });
    match result {
        Ok(product) => {
            tracing::info!(id = product.id, "product updated");
            json_response(StatusCode::OK, product.to_json())
        }
        Err(err) => error_response(err, &uri),
    }
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    uri: Uri,
) -> Response {
    let result = parse_id(&id).and_then(|id| {
        state.store().soft_delete(id, &now_rfc3339())?;
        Ok(id)
    });
    match result {
        Ok(id) => {
            tracing::info!(id, "product soft-deleted");
            (StatusCode::OK, DELETE_ACK).into_response()
        }
        Err(err) => error_response(err, &uri),
    }
}

fn parse_id(raw: &str) -> Result<u64, Error> {
    raw.trim().parse().map_err(|_| {
        Error::new(ErrorKind::Usage).with_message(format!("ID inválido: {raw}"))
    })
}

/// Decode a request DTO; unknown keys are ignored and every field is optional.
fn parse_input(body: &[u8]) -> Result<ProductInput, Error> {
    let value: Value = serde_json::from_slice(body).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("Corpo da requisição inválido.")
            .with_source(err)
    })?;
    let Value::Object(fields) = value else {
        return Err(Error::new(ErrorKind::Usage).with_message("Corpo da requisição inválido."));
    };
    let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
    let price = match fields.get("preco") {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => Some(number.as_i64().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("O preço deve ser um número inteiro de centavos.")
        })?),
        Some(_) => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("O preço deve ser um número inteiro de centavos."));
        }
    };
    Ok(ProductInput {
        name: text("nome"),
        price,
        category: text("categoria"),
    })
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
    message: String,
    path: String,
    timestamp: String,
}

fn json_response(status: StatusCode, payload: Value) -> Response {
    (status, Json(payload)).into_response()
}

fn error_response(err: Error, uri: &Uri) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage | ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Remote | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
        SERVER_FAULT.to_string()
    } else {
        tracing::debug!(error = %err, path = uri.path(), "request rejected");
        err.message().unwrap_or("error").to_string()
    };
    let body = ErrorResponse {
        status: status.as_u16(),
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        message,
        path: uri.path().to_string(),
        timestamp: now_rfc3339(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_CORS_ORIGINS, ErrorKind, ServeConfig, list_query, parse_id, parse_input,
        query_params, serve, validate_config,
    };
    use axum::http::Uri;

    fn config(bind: &str) -> ServeConfig {
        ServeConfig {
            bind: bind.parse().expect("bind"),
            seed: false,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            allow_non_loopback: false,
        }
    }

    #[tokio::test]
    async fn serve_rejects_non_loopback_bind() {
        let err = serve(config("0.0.0.0:0")).await.expect_err("reject");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn non_loopback_requires_allow_flag() {
        let mut cfg = config("0.0.0.0:8080");
        assert!(validate_config(&cfg).is_err());
        cfg.allow_non_loopback = true;
        let origins = validate_config(&cfg).expect("allowed");
        assert_eq!(origins.len(), 3);
    }

    #[test]
    fn cors_origins_must_be_http_urls() {
        let mut cfg = config("127.0.0.1:8080");
        cfg.cors_origins = vec!["localhost:5173".to_string()];
        let err = validate_config(&cfg).expect_err("scheme");
        assert!(err.message().unwrap_or_default().contains("localhost:5173"));
    }

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("42").expect("id"), 42);
        assert_eq!(parse_id("abc").expect_err("bad").kind(), ErrorKind::Usage);
    }

    #[test]
    fn request_body_fields_are_optional() {
        let input = parse_input(br#"{"nome":"Meia","preco":990}"#).expect("input");
        assert_eq!(input.name.as_deref(), Some("Meia"));
        assert_eq!(input.price, Some(990));
        assert_eq!(input.category, None);

        assert!(parse_input(b"[]").is_err());
        assert!(parse_input(br#"{"preco":"9,90"}"#).is_err());
        assert!(parse_input(br#"{"preco":9.9}"#).is_err());
    }

    #[test]
    fn malformed_query_strings_become_usage_errors() {
        let uri: Uri = "/produtos?categoria=calcados&sort=preco,desc".parse().expect("uri");
        let params = query_params(&uri).expect("params");
        assert_eq!(params.get("sort").map(String::as_str), Some("preco,desc"));
        assert!(list_query(&params).is_ok());

        let uri: Uri = "/produtos".parse().expect("uri");
        assert!(query_params(&uri).expect("empty").is_empty());

        for raw in ["/produtos?categoria=%FF", "/produtos?page=%ZZ", "/produtos?size=-1"] {
            let uri: Uri = raw.parse().expect("uri");
            let err = query_params(&uri)
                .and_then(|params| list_query(&params))
                .expect_err(raw);
            assert_eq!(err.kind(), ErrorKind::Usage, "{raw}");
        }
    }
}
