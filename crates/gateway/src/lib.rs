//! HTTP surface for EvoWeb.
//!
//! Serves the personalized page for each visitor, the visitor's last cached
//! page as JSON, and a health check. Built on Axum.
//!
//! Visitors are told apart by the [`client::VISITOR_COOKIE`] cookie, assigned
//! on the first page load. Visit counts and cached pages are kept per visitor.

pub mod client;
pub mod frontend;

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
};
use evoweb_core::error::{Error, GenerationError};
use evoweb_core::storage::CachedContent;
use evoweb_pipeline::Personalizer;
use serde::Serialize;
use tracing::{error, info};

/// Seconds a client should wait before retrying while a page is generating.
pub const RETRY_AFTER_SECS: u64 = 5;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub personalizer: Personalizer,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/api/latest", get(latest_handler))
        .route("/health", get(health_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: evoweb_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let personalizer = Personalizer::from_config(&config).await?;
    let state = Arc::new(GatewayState { personalizer });
    let app = build_router(state);

    info!(
        addr = %addr,
        backend = %config.engine.backend,
        model = %config.engine.model_id,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Maps pipeline errors onto HTTP responses.
struct PageError(Error);

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::Generation(GenerationError::Busy) => {
                let mut response = (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "A page is already being generated, try again shortly.",
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
                response
            }
            e => {
                error!(error = %e, "Page request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not render the page.").into_response()
            }
        }
    }
}

// --- Handlers ---

async fn page_handler(State(state): State<SharedState>, headers: HeaderMap) -> Result<Response, PageError> {
    let mut signals = client::signals_from_headers(&headers);
    let device = client::device_from_headers(&headers);
    let (visitor_id, is_new) = match client::take_visitor_id(&mut signals) {
        Some(id) => (id, false),
        None => (client::new_visitor_id(), true),
    };

    let page = state
        .personalizer
        .personalize_for(&visitor_id, &signals, &device)
        .await
        .map_err(PageError)?;
    info!(
        request_id = %page.request_id,
        new_visitor = is_new,
        visit_count = page.visit_state.visit_count,
        degraded = ?page.result.degraded_reason(),
        "Served page"
    );

    let mut response = Html(frontend::render_document(&device.locale, page.result.html())).into_response();
    if is_new {
        match HeaderValue::from_str(&client::visitor_cookie(&visitor_id)) {
            Ok(cookie) => {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            Err(e) => error!(error = %e, "Could not encode visitor cookie"),
        }
    }
    Ok(response)
}

async fn latest_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<CachedContent>, StatusCode> {
    let mut signals = client::signals_from_headers(&headers);
    let visitor_id = client::take_visitor_id(&mut signals).ok_or(StatusCode::NOT_FOUND)?;

    match state.personalizer.cached_for(&visitor_id).await {
        Ok(Some(content)) => Ok(Json(content)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(error = %e, "Failed to read cached page");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    engine: String,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        engine: state.personalizer.orchestrator().gateway().status().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use evoweb_config::EngineConfig;
    use evoweb_core::engine::{BackendFactory, CompletionPayload, ModelBackend};
    use evoweb_core::error::{EngineError, EngineInitError};
    use evoweb_engine::EngineGateway;
    use evoweb_pipeline::{GenerationOrchestrator, OrchestratorState};
    use evoweb_core::storage::KeyValueStore;
    use evoweb_storage::InMemoryStore;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn echo_state() -> SharedState {
        let config = EngineConfig {
            backend: "echo".into(),
            ..EngineConfig::default()
        };
        let gateway = evoweb_engine::build_from_config(&config).unwrap();
        let personalizer = Personalizer::new(
            GenerationOrchestrator::new(gateway),
            Arc::new(InMemoryStore::new()),
        );
        Arc::new(GatewayState { personalizer })
    }

    /// Loads fine, never answers.
    struct StuckBackend;

    #[async_trait]
    impl ModelBackend for StuckBackend {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn load(&mut self, _model_id: &str) -> Result<(), EngineInitError> {
            Ok(())
        }

        async fn chat_completion(
            &mut self,
            _payload: CompletionPayload,
        ) -> Result<serde_json::Value, EngineError> {
            std::future::pending().await
        }
    }

    struct StuckFactory;

    impl BackendFactory for StuckFactory {
        fn create(&self) -> Result<Box<dyn ModelBackend>, EngineInitError> {
            Ok(Box::new(StuckBackend))
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(echo_state());

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["engine"], "uninitialized");
    }

    #[tokio::test]
    async fn page_uses_cookies_and_language() {
        let app = build_router(echo_state());

        let req = Request::builder()
            .uri("/")
            .header("cookie", "techgadget=1; theme=dark")
            .header("accept-language", "es-MX,es;q=0.8")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_string(response).await;
        assert!(html.contains("<html lang=\"es\">"));
        assert!(html.contains("offline preview"));
        assert!(html.contains("Detected interests: technology"));
    }

    /// Load `uri` as the visitor with `cookie`, or as a stranger.
    fn page_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            req = req.header("cookie", cookie);
        }
        req.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn first_page_assigns_a_visitor_cookie() {
        let app = build_router(echo_state());

        let response = app.clone().oneshot(page_request("/", None)).await.unwrap();
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.starts_with("evoweb_visitor="));
        assert!(set_cookie.contains("HttpOnly"));

        // A returning visitor keeps the id it was given.
        let cookie = set_cookie.split(';').next().unwrap().to_string();
        let response = app.oneshot(page_request("/", Some(&cookie))).await.unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_string(response).await.contains("Visit count: 2"));
    }

    #[tokio::test]
    async fn visitors_do_not_share_history() {
        let app = build_router(echo_state());

        for _ in 0..2 {
            app.clone()
                .oneshot(page_request("/", Some("evoweb_visitor=alice")))
                .await
                .unwrap();
        }
        let response = app
            .clone()
            .oneshot(page_request("/", Some("evoweb_visitor=bob")))
            .await
            .unwrap();
        let bob = body_string(response).await;
        assert!(bob.contains("Visit count: 1"));

        let response = app
            .clone()
            .oneshot(page_request("/api/latest", Some("evoweb_visitor=carol")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(page_request("/api/latest", Some("evoweb_visitor=alice")))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(json["html"].as_str().unwrap().contains("Visit count: 2"));
    }

    #[tokio::test]
    async fn latest_is_404_until_a_page_is_served() {
        let state = echo_state();
        let app = build_router(state.clone());
        let visitor = Some("evoweb_visitor=v1");

        let response = app.clone().oneshot(page_request("/api/latest", visitor)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        app.clone().oneshot(page_request("/", visitor)).await.unwrap();

        let response = app.clone().oneshot(page_request("/api/latest", visitor)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(json["html"].as_str().unwrap().contains("offline preview"));
        assert!(json["generatedAt"].is_string());

        // Without a visitor cookie there is nothing to look up.
        let response = app.oneshot(page_request("/api/latest", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn overlapping_request_gets_503() {
        let gateway = EngineGateway::new(Arc::new(StuckFactory), "stuck-model");
        let store = Arc::new(InMemoryStore::new());
        let personalizer = Personalizer::new(GenerationOrchestrator::new(gateway), store.clone());
        let state = Arc::new(GatewayState { personalizer });
        let app = build_router(state.clone());

        let visitor = Some("evoweb_visitor=v1");
        let first = tokio::spawn(app.clone().oneshot(page_request("/", visitor)));
        for _ in 0..200 {
            if state.personalizer.orchestrator().state() == OrchestratorState::Requesting {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(state.personalizer.orchestrator().state(), OrchestratorState::Requesting);

        let response = app.oneshot(page_request("/", visitor)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");

        // Only the request being served counted as a visit.
        assert_eq!(
            store.get("visitor/v1/visitCount").await.unwrap().as_deref(),
            Some("1")
        );

        first.abort();
    }
}
