use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::warn;

/// Above this many tracked clients, idle entries are dropped on the next check
const MAX_TRACKED_CLIENTS: usize = 10_000;

#[derive(Debug, Serialize)]
pub struct RateLimitError {
    pub error_code: String,
    pub message: String,
    pub retry_after: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_size: Duration,
}

impl RateLimitConfig {
    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window_size: Duration::from_secs(60),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(20)
    }
}

#[derive(Debug, Default)]
struct RateLimitEntry {
    requests: VecDeque<Instant>,
}

impl RateLimitEntry {
    fn evict_expired(&mut self, now: Instant, window_size: Duration) {
        while let Some(&oldest) = self.requests.front() {
            if now.duration_since(oldest) < window_size {
                break;
            }
            self.requests.pop_front();
        }
    }
}

/// Sliding-window limiter keyed by client address
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn check_rate_limit(&self, key: &str) -> Result<(), (StatusCode, Json<RateLimitError>)> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), (StatusCode, Json<RateLimitError>)> {
        let window = self.config.window_size;
        let mut store = self.store.write().unwrap();

        if store.len() > MAX_TRACKED_CLIENTS {
            store.retain(|_, entry| {
                entry.evict_expired(now, window);
                !entry.requests.is_empty()
            });
        }

        let entry = store.entry(key.to_string()).or_default();
        entry.evict_expired(now, window);

        if entry.requests.len() >= self.config.max_requests as usize {
            let retry_after = entry
                .requests
                .front()
                .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(window)
                .as_secs()
                .max(1);

            warn!(client = %key, retry_after, "rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(RateLimitError {
                    error_code: "RATE_LIMIT_EXCEEDED".to_string(),
                    message: "Too many requests, please slow down".to_string(),
                    retry_after,
                }),
            ));
        }

        entry.requests.push_back(now);
        Ok(())
    }
}

/// Extract client identifier for rate limiting
fn get_client_key(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    // Proxies put the original client first
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(first_ip) = ip_str.split(',').next().map(str::trim).filter(|ip| !ip.is_empty()) {
                return first_ip.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.trim().to_string();
        }
    }

    if let Some(addr) = remote_addr {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    headers: HeaderMap,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<RateLimitError>)> {
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_key = get_client_key(&headers, remote_addr);

    rate_limiter.check_rate_limit(&client_key)?;

    Ok(next.run(req).await)
}
