//! Cross-cutting HTTP middleware
//!
//! - Per-client rate limiting with `X-RateLimit-*` headers
//! - Security headers
//! - Trusted `Host` enforcement
//! - Request logging, metrics and alerting on server errors
//! - `/health` and `/metrics` endpoints

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use regex::Regex;
use serde_json::{json, Value};
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use crate::api::middleware::AppState;
use crate::services::{RateDecision, Severity};

/// Upper bounds (seconds) of the request duration histogram
pub const DURATION_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Path label for requests no route matched
pub const UNMATCHED_PATH: &str = "unmatched";

/// Paths that bypass the request limiter
const UNLIMITED_PATHS: [&str; 2] = ["/health", "/metrics"];

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

// ============================================================================
// Metrics
// ============================================================================

/// Request counters and latency histograms in a private Prometheus registry
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    durations: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let durations = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(DURATION_BUCKETS.to_vec()),
            &["method", "path"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(durations.clone()))?;

        Ok(Self {
            registry,
            requests,
            durations,
        })
    }

    /// Record one request; `path` must be a route template, never a raw URL
    pub fn observe(&self, method: &str, path: &str, status: u16, seconds: f64) {
        let status = status.to_string();
        self.requests
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.durations
            .with_label_values(&[method, path])
            .observe(seconds);
    }

    /// Prometheus text exposition of every registered series
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

// ============================================================================
// Trusted hosts
// ============================================================================

/// Allowed `Host` values; `*` wildcards match any run of characters
#[derive(Debug, Default)]
pub struct TrustedHosts {
    patterns: Vec<Regex>,
}

impl TrustedHosts {
    pub fn new(hosts: &[String]) -> Result<Self, regex::Error> {
        let patterns = hosts
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(|h| Regex::new(&format!("(?i)^{}$", regex::escape(h).replace(r"\*", ".*"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// No restriction configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn allows(&self, host: &str) -> bool {
        let host = strip_port(host);
        self.patterns.iter().any(|p| p.is_match(host))
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(end) = host.find(']') {
        return &host[..=end];
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Reject requests whose `Host` is not trusted
pub async fn trusted_hosts(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.trusted_hosts.is_empty() {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .map(str::to_string);

    match host {
        Some(host) if state.trusted_hosts.allows(&host) => next.run(request).await,
        host => {
            tracing::warn!(host = ?host, "Rejected untrusted host");
            (StatusCode::BAD_REQUEST, "Invalid host header").into_response()
        }
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

/// Rate limit key for a request
///
/// The peer address is used unless the peer is a trusted proxy, in which case the
/// first `X-Forwarded-For` hop (then `X-Real-IP`) names the client. Without a
/// peer every request shares the `anonymous` key.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_proxies: &[IpAddr]) -> String {
    let Some(peer) = peer.map(|addr| addr.ip()) else {
        return "anonymous".to_string();
    };
    if trusted_proxies.contains(&peer) {
        if let Some(forwarded) = forwarded_client(headers) {
            return forwarded.to_string();
        }
    }
    peer.to_string()
}

fn forwarded_client(headers: &HeaderMap) -> Option<IpAddr> {
    let header_ip = |name: &str, first_hop: bool| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| if first_hop { s.split(',').next() } else { Some(s) })
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };
    header_ip("x-forwarded-for", true).or_else(|| header_ip("x-real-ip", false))
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if UNLIMITED_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_ip(request.headers(), peer, &state.config.server.trusted_proxies);

    match state.request_limiter.check(&key).await {
        RateDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { limit, retry_after } => {
            tracing::warn!(client = %key, retry_after, "Rate limit exceeded");
            let mut response = (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u32));
            response
        }
    }
}

// ============================================================================
// Security headers
// ============================================================================

const SECURITY_HEADERS: [(&str, &str); 5] = [
    (
        "strict-transport-security",
        "max-age=63072000; includeSubDomains; preload",
    ),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "permissions-policy",
        "accelerometer=(), autoplay=(), camera=(), geolocation=(), gyroscope=(), magnetometer=(), microphone=(), payment=()",
    ),
];

/// Add security headers the handler did not set itself
pub async fn security_headers(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in SECURITY_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert(HeaderValue::from_static(value));
    }

    if let Some(csp) = state.config.headers.content_security_policy.as_deref() {
        match HeaderValue::from_str(csp) {
            Ok(value) => {
                headers
                    .entry(header::CONTENT_SECURITY_POLICY)
                    .or_insert(value);
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring invalid Content-Security-Policy"),
        }
    }

    response
}

// ============================================================================
// Request logging
// ============================================================================

/// Log every request, record metrics and alert on 5xx responses
pub async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let uri_path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();
    let status = response.status();

    state
        .metrics
        .observe(&method, &route, status.as_u16(), elapsed.as_secs_f64());

    let duration_ms = elapsed.as_millis() as u64;
    tracing::info!(
        target: "lavamedia::http",
        method = %method,
        path = %uri_path,
        route = %route,
        status = status.as_u16(),
        duration_ms,
        "request.completed"
    );

    if status.is_server_error() {
        let alerts = state.alerts.clone();
        let context = json!({
            "method": method,
            "path": uri_path,
            "route": route,
            "status": status.as_u16(),
            "duration_ms": duration_ms,
        });
        tokio::spawn(async move {
            alerts
                .notify("Server error response", Severity::Error, context)
                .await;
        });
    }

    response
}

// ============================================================================
// Endpoints
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match state.pool.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = ?e, "Database health check failed");
            "unavailable"
        }
    };
    Json(json!({ "status": "ok", "database": database }))
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bucket_counts(text: &str) -> Vec<u64> {
        text.lines()
            .filter(|l| l.starts_with("http_request_duration_seconds_bucket{"))
            .filter_map(|l| l.rsplit(' ').next())
            .filter_map(|n| n.parse().ok())
            .collect()
    }

    #[test]
    fn test_metrics_render() {
        let metrics = Metrics::new().unwrap();
        metrics.observe("GET", "/api/content/{id}", 200, 0.003);
        metrics.observe("GET", "/api/content/{id}", 200, 0.2);
        metrics.observe("GET", "/api/content/{id}", 404, 20.0);

        let text = metrics.render().unwrap();
        assert!(text.contains("# TYPE http_requests_total counter"));
        assert!(text.contains("# TYPE http_request_duration_seconds histogram"));
        assert!(text.contains(
            "http_requests_total{method=\"GET\",path=\"/api/content/{id}\",status=\"200\"} 2"
        ));
        assert!(text.contains(
            "http_requests_total{method=\"GET\",path=\"/api/content/{id}\",status=\"404\"} 1"
        ));
        assert!(text.contains("le=\"0.005\"} 1"));
        assert!(text.contains("le=\"+Inf\"} 3"));
        assert!(text.contains(
            "http_request_duration_seconds_count{method=\"GET\",path=\"/api/content/{id}\"} 3"
        ));

        let histogram = metrics
            .durations
            .with_label_values(&["GET", "/api/content/{id}"]);
        assert_eq!(histogram.get_sample_count(), 3);
        assert!((histogram.get_sample_sum() - 20.203).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_escape_label_values() {
        let metrics = Metrics::new().unwrap();
        metrics.observe("GET", "/a\"b", 200, 0.01);

        let text = metrics.render().unwrap();
        assert!(text.contains("path=\"/a\\\"b\""));
    }

    #[test]
    fn test_trusted_hosts() {
        let hosts = TrustedHosts::new(&["example.com".to_string(), "*.example.org".to_string()]).unwrap();
        assert!(hosts.allows("example.com"));
        assert!(hosts.allows("EXAMPLE.com:8080"));
        assert!(hosts.allows("api.example.org"));
        assert!(hosts.allows("a.b.example.org"));
        assert!(!hosts.allows("example.org"));
        assert!(!hosts.allows("evil-example.com"));
        assert!(!hosts.allows("example.com.evil.net"));

        assert!(TrustedHosts::new(&[]).unwrap().is_empty());
        assert!(TrustedHosts::new(&["*".to_string()]).unwrap().allows("anything:1"));
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("localhost:8080"), "localhost");
        assert_eq!(strip_port("localhost"), "localhost");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
        assert_eq!(strip_port("host:"), "host:");
    }

    #[test]
    fn test_client_ip_ignores_forwarding_from_untrusted_peer() {
        let peer: SocketAddr = "10.0.0.9:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.7"));

        assert_eq!(client_ip(&headers, None, &[]), "anonymous");
        assert_eq!(client_ip(&headers, Some(peer), &[]), "10.0.0.9");

        let other_proxy: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer), &[other_proxy]), "10.0.0.9");
    }

    #[test]
    fn test_client_ip_trusted_proxy_precedence() {
        let peer: SocketAddr = "10.0.0.9:4000".parse().unwrap();
        let proxies = [peer.ip()];
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer), &proxies), "10.0.0.9");

        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.7"));
        assert_eq!(client_ip(&headers, Some(peer), &proxies), "192.0.2.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer), &proxies), "203.0.113.5");

        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-address"));
        assert_eq!(client_ip(&headers, Some(peer), &proxies), "192.0.2.7");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn histogram_buckets_are_cumulative(samples in prop::collection::vec(0.0f64..15.0, 1..30)) {
            let metrics = Metrics::new().unwrap();
            for s in &samples {
                metrics.observe("GET", "/x", 200, *s);
            }
            let counts = bucket_counts(&metrics.render().unwrap());
            prop_assert_eq!(counts.len(), DURATION_BUCKETS.len() + 1);
            prop_assert!(counts.windows(2).all(|w| w[0] <= w[1]));
            prop_assert_eq!(counts.last().copied(), Some(samples.len() as u64));
        }
    }
}
