///! Sliding-window attempt limiter for the sign-in endpoints, keyed by client address.
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    attempts: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_attempts: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window: Duration::from_secs(window_secs),
        }
    }

    pub async fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now()).await
    }

    /// Records an attempt at `now` unless the client already used up the window.
    pub async fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut attempts = self.attempts.write().await;
        let history = attempts.entry(client.to_string()).or_default();
        history.retain(|&at| now.saturating_duration_since(at) < self.window);

        if history.len() < self.max_attempts {
            history.push(now);
            true
        } else {
            false
        }
    }

    pub async fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now()).await
    }

    /// Drops expired attempts and forgets clients with none left.
    /// Returns the number of clients still tracked.
    pub async fn cleanup_at(&self, now: Instant) -> usize {
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, history| {
            history.retain(|&at| now.saturating_duration_since(at) < self.window);
            !history.is_empty()
        });
        tracing::debug!("Rate limiter cleanup: {} active clients", attempts.len());
        attempts.len()
    }
}

/// Client address: first `X-Forwarded-For` hop when behind a proxy, else the peer address.
pub fn client_key(request: &Request<Body>) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip;
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&request);

    if !limiter.check(&client).await {
        tracing::warn!("Sign-in rate limit exceeded for {}", client);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts. Please try again later.",
        )
            .into_response();
    }

    next.run(request).await
}
