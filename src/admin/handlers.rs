use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::registry::ResetSummary;
use crate::resilience::{BreakerStats, CircuitState};
use crate::security::rate_limit::RateLimiterStats;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub breakers: Vec<BreakerStats>,
    pub limiters: Vec<RateLimiterStats>,
}

#[derive(Debug, Serialize)]
pub struct BreakerStatus {
    #[serde(flatten)]
    pub stats: BreakerStats,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct LimiterStatus {
    #[serde(flatten)]
    pub stats: RateLimiterStats,
    pub max_requests: u32,
    pub window_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub open_breakers: Vec<String>,
    pub breakers: Vec<BreakerStatus>,
    pub limiters: Vec<LimiterStatus>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub action: &'static str,
    #[serde(flatten)]
    pub reset: ResetSummary,
}

fn overall(breakers: &[BreakerStats]) -> &'static str {
    if breakers.iter().any(|b| b.state == CircuitState::Open) {
        "degraded"
    } else {
        "ok"
    }
}

pub async fn get_health(State(state): State<AppState>) -> Json<HealthReport> {
    let snapshot = state.registry.snapshot();
    Json(HealthReport {
        status: overall(&snapshot.breakers),
        version: env!("CARGO_PKG_VERSION"),
        breakers: snapshot.breakers,
        limiters: snapshot.limiters,
    })
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let breakers: Vec<_> = state
        .registry
        .breakers()
        .map(|b| BreakerStatus {
            stats: b.stats(),
            failure_threshold: b.failure_threshold(),
            reset_timeout_ms: b.reset_timeout().as_millis() as u64,
        })
        .collect();

    let limiters = state
        .registry
        .limiters()
        .map(|l| LimiterStatus {
            stats: l.stats(),
            max_requests: l.max_requests(),
            window_ms: l.window().as_millis() as u64,
        })
        .collect();

    let open_breakers = breakers
        .iter()
        .filter(|b| b.stats.state == CircuitState::Open)
        .map(|b| b.stats.name.clone())
        .collect();

    let stats: Vec<_> = breakers.iter().map(|b| b.stats.clone()).collect();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: overall(&stats),
        open_breakers,
        breakers,
        limiters,
    })
}

pub async fn reset_breakers(State(state): State<AppState>) -> Json<ResetResponse> {
    Json(ResetResponse {
        action: "reset_breakers",
        reset: ResetSummary {
            breakers: state.registry.reset_breakers(),
            limiters: 0,
        },
    })
}

pub async fn reset_limiters(State(state): State<AppState>) -> Json<ResetResponse> {
    Json(ResetResponse {
        action: "reset_limiters",
        reset: ResetSummary {
            breakers: 0,
            limiters: state.registry.reset_limiters(),
        },
    })
}

pub async fn emergency_reset(State(state): State<AppState>) -> Json<ResetResponse> {
    Json(ResetResponse {
        action: "emergency_reset",
        reset: state.registry.emergency_reset(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::admin::{setup_admin_router, setup_health_router};
    use crate::registry::ResilienceRegistry;
    use crate::resilience::CircuitBreaker;
    use crate::security::rate_limit::RateLimiter;

    const KEY: &str = "test-key";

    fn state() -> AppState {
        let mut registry = ResilienceRegistry::new();
        registry.register_breaker(CircuitBreaker::new("database", 1, Duration::from_secs(60)));
        registry.register_limiter(RateLimiter::new("api", 10, Duration::from_secs(60)));
        AppState {
            registry: Arc::new(registry),
            admin_key: Arc::from(KEY),
        }
    }

    fn app(state: AppState) -> Router {
        setup_health_router(state.clone()).merge(setup_admin_router(state))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn admin(method: &str, uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("authorization", format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn trip_database(state: &AppState) {
        let breaker = state.registry.breaker("database").unwrap();
        let _ = breaker.execute(|| async { Err::<(), _>("refused") }).await;
    }

    #[tokio::test]
    async fn test_health_is_public_and_reports_degraded() {
        let state = state();
        let app = app(state.clone());

        let res = app.clone().oneshot(admin("GET", "/health", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["breakers"][0]["state"], "CLOSED");
        assert_eq!(json["limiters"][0]["name"], "api");

        trip_database(&state).await;
        let json = body_json(app.oneshot(admin("GET", "/health", None)).await.unwrap()).await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["breakers"][0]["state"], "OPEN");
        assert_eq!(json["breakers"][0]["failure_count"], 1);
    }

    #[tokio::test]
    async fn test_admin_requires_bearer_key() {
        let app = app(state());

        let res = app.clone().oneshot(admin("GET", "/admin/status", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .clone()
            .oneshot(admin("POST", "/admin/reset/all", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app.oneshot(admin("GET", "/admin/status", Some(KEY))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["breakers"][0]["failure_threshold"], 1);
        assert_eq!(json["limiters"][0]["max_requests"], 10);
    }

    #[tokio::test]
    async fn test_reset_endpoints() {
        let state = state();
        let app = app(state.clone());
        trip_database(&state).await;
        state.registry.limiter("api").unwrap().check_limit("client");

        let json = body_json(
            app.clone()
                .oneshot(admin("POST", "/admin/reset/limiters", Some(KEY)))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(json["action"], "reset_limiters");
        assert_eq!(json["limiters"], 1);
        assert_eq!(json["breakers"], 0);
        assert_eq!(state.registry.snapshot().open_breakers(), ["database"]);

        let json = body_json(
            app.oneshot(admin("POST", "/admin/reset/all", Some(KEY)))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(json["action"], "emergency_reset");
        assert_eq!(json["breakers"], 1);
        assert!(state.registry.snapshot().open_breakers().is_empty());
    }
}
