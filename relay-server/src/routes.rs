use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use relay_core::{RelayError, WeatherQuery, WeatherUpstream};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Liveness string served at the root path.
const INDEX_BODY: &str = "Wilson API - Works fine!";

/// Shared handler state.
///
/// The upstream client is immutable; requests share nothing mutable.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn WeatherUpstream>,
}

pub fn router(state: AppState) -> Router {
    // The canonical path carries a trailing slash; the bare form routes to
    // the same handler instead of redirecting.
    Router::new()
        .route("/", get(index))
        .route("/{city}/{country}", get(current_weather))
        .route("/{city}/{country}/", get(current_weather))
        .with_state(state)
}

async fn index() -> &'static str {
    INDEX_BODY
}

/// Relays one current-weather lookup: one upstream call per request, body
/// returned verbatim on success.
async fn current_weather(
    State(state): State<AppState>,
    Path((city, country)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let query = WeatherQuery::new(city, country);
    let body = state.upstream.current_weather(&query).await?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

/// Maps the core error taxonomy onto gateway responses.
struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            RelayError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
            RelayError::Unreachable(_) => (StatusCode::BAD_GATEWAY, "upstream_unreachable"),
            RelayError::UpstreamStatus { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            RelayError::MalformedBody { .. } => {
                (StatusCode::BAD_GATEWAY, "upstream_malformed_body")
            }
        };

        warn!(error = %self.0, code, "upstream exchange failed");

        (status, Json(json!({ "error": code, "detail": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use relay_core::{Config, OpenWeatherUpstream, RetryPolicy};
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{method, path as mock_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Upstream double: records queries, replies with a single canned result.
    #[derive(Debug, Default)]
    struct FakeUpstream {
        calls: Mutex<Vec<WeatherQuery>>,
        reply: Mutex<Option<Result<Bytes, RelayError>>>,
    }

    impl FakeUpstream {
        fn replying(reply: Result<Bytes, RelayError>) -> Arc<Self> {
            Arc::new(Self { calls: Mutex::new(Vec::new()), reply: Mutex::new(Some(reply)) })
        }

        fn calls(&self) -> Vec<WeatherQuery> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WeatherUpstream for FakeUpstream {
        async fn current_weather(&self, query: &WeatherQuery) -> Result<Bytes, RelayError> {
            self.calls.lock().unwrap().push(query.clone());
            self.reply.lock().unwrap().take().expect("unexpected upstream call")
        }
    }

    async fn spawn(upstream: Arc<dyn WeatherUpstream>) -> SocketAddr {
        let app = router(AppState { upstream });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        addr
    }

    #[tokio::test]
    async fn index_reports_liveness_without_calling_upstream() {
        let upstream = Arc::new(FakeUpstream::default());
        let addr = spawn(upstream.clone()).await;

        let res = reqwest::get(format!("http://{addr}/")).await.unwrap();

        assert_eq!(res.status().as_u16(), 200);
        assert_eq!(res.text().await.unwrap(), INDEX_BODY);
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn weather_route_relays_the_upstream_body_verbatim() {
        let payload = r#"{"weather":[{"description":"clear"}],"main":{"temp":290}}"#;
        let upstream = FakeUpstream::replying(Ok(Bytes::from_static(payload.as_bytes())));
        let addr = spawn(upstream.clone()).await;

        let res = reqwest::get(format!("http://{addr}/Kyiv/ua/")).await.unwrap();

        assert_eq!(res.status().as_u16(), 200);
        assert_eq!(
            res.headers().get("content-type").unwrap().to_str().unwrap(),
            "application/json"
        );
        assert_eq!(&res.bytes().await.unwrap()[..], payload.as_bytes());
        assert_eq!(upstream.calls(), vec![WeatherQuery::new("Kyiv", "ua")]);
    }

    #[tokio::test]
    async fn the_bare_path_without_trailing_slash_matches_too() {
        let upstream = FakeUpstream::replying(Ok(Bytes::from_static(b"{}")));
        let addr = spawn(upstream.clone()).await;

        let res = reqwest::get(format!("http://{addr}/Kyiv/ua")).await.unwrap();

        assert_eq!(res.status().as_u16(), 200);
        assert_eq!(upstream.calls(), vec![WeatherQuery::new("Kyiv", "ua")]);
    }

    #[tokio::test]
    async fn path_segments_reach_the_upstream_percent_decoded() {
        let upstream = FakeUpstream::replying(Ok(Bytes::from_static(b"{}")));
        let addr = spawn(upstream.clone()).await;

        let res = reqwest::get(format!("http://{addr}/New%20York/us/")).await.unwrap();

        assert_eq!(res.status().as_u16(), 200);
        assert_eq!(upstream.calls(), vec![WeatherQuery::new("New York", "us")]);
    }

    #[tokio::test]
    async fn upstream_status_maps_to_bad_gateway() {
        let upstream = FakeUpstream::replying(Err(RelayError::UpstreamStatus {
            status: StatusCode::NOT_FOUND,
            detail: "city not found".to_string(),
        }));
        let addr = spawn(upstream).await;

        let res = reqwest::get(format!("http://{addr}/Nowhere/xx/")).await.unwrap();

        assert_eq!(res.status().as_u16(), 502);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "upstream_error");
        assert!(body["detail"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn upstream_timeout_maps_to_gateway_timeout() {
        let upstream =
            FakeUpstream::replying(Err(RelayError::Timeout(Duration::from_millis(100))));
        let addr = spawn(upstream).await;

        let res = reqwest::get(format!("http://{addr}/Kyiv/ua/")).await.unwrap();

        assert_eq!(res.status().as_u16(), 504);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "upstream_timeout");
    }

    #[tokio::test]
    async fn malformed_upstream_body_maps_to_bad_gateway() {
        let upstream = FakeUpstream::replying(Err(RelayError::MalformedBody {
            detail: "expected value at line 1 column 1".to_string(),
        }));
        let addr = spawn(upstream).await;

        let res = reqwest::get(format!("http://{addr}/Kyiv/ua/")).await.unwrap();

        assert_eq!(res.status().as_u16(), 502);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "upstream_malformed_body");
    }

    #[tokio::test]
    async fn credential_never_reaches_a_caller_visible_body() {
        // Full path through the real client: the upstream rejects the key and
        // echoes a message; the relay's error body must not contain the key.
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(mock_path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(401).set_body_raw(
                r#"{"cod":401,"message":"Invalid API key"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let config = Config {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            upstream_url: format!("{}/data/2.5/weather", server.uri()),
            api_key: "sekret-key".to_string(),
            timeout: Duration::from_millis(500),
            retry: RetryPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
        };
        let upstream = OpenWeatherUpstream::new(&config).expect("client must build");
        let addr = spawn(Arc::new(upstream)).await;

        let res = reqwest::get(format!("http://{addr}/Kyiv/ua/")).await.unwrap();

        assert_eq!(res.status().as_u16(), 502);
        let body = res.text().await.unwrap();
        assert!(!body.contains("sekret-key"), "credential leaked: {body}");
        assert!(body.contains("401"));
    }
}
