use super::*;

use std::time::Instant;

const DEFAULT_RATE_LIMIT_PER_SEC: u32 = 180;
// Windows idle longer than this are dropped when the table is pruned.
const STALE_WINDOW_SECS: f32 = 10.0;
const PRUNE_THRESHOLD: usize = 4096;

/// Request guard settings: an optional shared token plus a per-client
/// request budget. Failures surface through the normal error taxonomy
/// (`UNAUTHORIZED` / `RATE_LIMITED` envelopes).
#[derive(Clone)]
pub(super) struct ApiSecurity {
    required_token: Option<String>,
    limiter: RateLimiter,
}

impl ApiSecurity {
    pub(super) fn new(required_token: Option<String>, rate_limit_per_sec: u32) -> Self {
        Self {
            required_token,
            limiter: RateLimiter::new(rate_limit_per_sec),
        }
    }

    /// `NIGHTSWARM_API_TOKEN` unset means an open API (local tooling);
    /// `NIGHTSWARM_API_RATE_LIMIT_PER_SEC` tunes the per-client budget.
    pub(super) fn from_env() -> Self {
        let token = std::env::var("NIGHTSWARM_API_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let per_sec = std::env::var("NIGHTSWARM_API_RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_PER_SEC)
            .max(1);
        Self::new(token, per_sec)
    }

    fn check_token(&self, headers: &axum::http::HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = self.required_token.as_deref() else {
            return Ok(());
        };
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or("")
        };
        let bearer = header("authorization");
        let bearer = bearer
            .strip_prefix("Bearer ")
            .or_else(|| bearer.strip_prefix("bearer "))
            .unwrap_or(bearer);
        if bearer == expected || header("x-api-key") == expected {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Fixed one-second windows per client key.
#[derive(Clone)]
struct RateLimiter {
    per_sec: u32,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    fn new(per_sec: u32) -> Self {
        Self {
            per_sec,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn admit(&self, key: &str) -> Result<(), ApiError> {
        // Counter state stays usable even if a holder panicked.
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started).as_secs_f32() >= 1.0 {
            window.started = now;
            window.count = 0;
        }
        window.count = window.count.saturating_add(1);
        let admitted = window.count <= self.per_sec;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started).as_secs_f32() < STALE_WINDOW_SECS);
        }

        if admitted {
            Ok(())
        } else {
            Err(ApiError::RateLimited)
        }
    }
}

fn client_key(headers: &axum::http::HeaderMap) -> &str {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("local")
}

pub(super) async fn api_guard(
    State(security): State<ApiSecurity>,
    req: Request,
    next: Next,
) -> Result<axum::response::Response, ApiError> {
    security.check_token(req.headers())?;
    security.limiter.admit(client_key(req.headers()))?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    #[test]
    fn token_accepted_as_bearer_or_api_key() {
        let security = ApiSecurity::new(Some("secret".to_string()), 100);
        assert!(security
            .check_token(&headers(&[("authorization", "Bearer secret")]))
            .is_ok());
        assert!(security
            .check_token(&headers(&[("x-api-key", "secret")]))
            .is_ok());

        let err = security
            .check_token(&headers(&[("authorization", "Bearer nope")]))
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert!(security.check_token(&headers(&[])).is_err());

        // No configured token means an open API.
        let open = ApiSecurity::new(None, 100);
        assert!(open.check_token(&headers(&[])).is_ok());
    }

    #[test]
    fn budget_is_tracked_per_client() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.admit("10.0.0.1").is_ok());
        assert!(limiter.admit("10.0.0.1").is_ok());
        let err = limiter.admit("10.0.0.1").unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");
        // A different client has its own window.
        assert!(limiter.admit("10.0.0.2").is_ok());
    }

    #[test]
    fn client_key_prefers_forwarded_header() {
        assert_eq!(
            client_key(&headers(&[("x-forwarded-for", "1.2.3.4"), ("x-real-ip", "5.6.7.8")])),
            "1.2.3.4"
        );
        assert_eq!(client_key(&headers(&[("x-real-ip", "5.6.7.8")])), "5.6.7.8");
        assert_eq!(client_key(&headers(&[])), "local");
    }
}
