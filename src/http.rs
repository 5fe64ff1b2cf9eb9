//! Nominatim geocoding client with rate limiting.
//!
//! The public OpenStreetMap Nominatim service allows one request per second
//! per client. This module provides:
//! - Dispatch rate limiting (spaces out request starts, shared across threads)
//! - Automatic retry with exponential backoff on 429
//! - A blocking [`Geocoder`] facade over the async client
//!
//! Every failure (network, HTTP status, malformed body) degrades to `None`.

use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::Mutex;

use crate::error::{Result, TripError};
use crate::geocode::Geocoder;
use crate::GpsPoint;

const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = concat!("photo-trip/", env!("CARGO_PKG_VERSION"));

/// Nominatim usage policy: at most one request per second.
pub const DISPATCH_INTERVAL_MS: u64 = 1000;
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    display_name: Option<String>,
}

/// Dispatch rate limiter - spaces out when requests START.
///
/// Each caller reserves a unique slot `interval` after the previous one, so
/// concurrent callers never dispatch faster than the service allows.
pub(crate) struct DispatchRateLimiter {
    interval: Duration,
    next_dispatch: Mutex<Instant>,
    dispatched_count: AtomicU32,
    consecutive_429s: AtomicU32,
}

impl DispatchRateLimiter {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: Mutex::new(Instant::now()),
            dispatched_count: AtomicU32::new(0),
            consecutive_429s: AtomicU32::new(0),
        }
    }

    /// Wait for our dispatch slot and return its sequence number.
    pub(crate) async fn wait_for_dispatch_slot(&self) -> u32 {
        let (wait_duration, dispatch_num) = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();

            let dispatch_at = if *next > now { *next } else { now };
            *next = dispatch_at + self.interval;

            let num = self.dispatched_count.fetch_add(1, Ordering::Relaxed) + 1;
            let wait = dispatch_at.saturating_duration_since(now);
            (wait, num)
        };

        // Wait outside the lock
        if wait_duration > Duration::from_millis(5) {
            debug!("[Dispatch #{}] Waiting {:?} for slot", dispatch_num, wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        dispatch_num
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    /// Exponential backoff: 1s, 2s, 4s, 4s max
    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        let backoff = Duration::from_millis(500 * (1 << count.min(3)));
        warn!("[DispatchRateLimiter] Got 429! Consecutive: {}, backing off {:?}", count, backoff);
        backoff
    }
}

/// Blocking Nominatim client.
///
/// Owns a small tokio runtime; do not call from inside another runtime.
/// Clones share the rate limiter, so one clone per worker thread still
/// respects the global request budget.
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    runtime: Arc<Runtime>,
    rate_limiter: Arc<DispatchRateLimiter>,
}

impl NominatimGeocoder {
    /// Client for the public OpenStreetMap endpoint.
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Client for a self-hosted or mirror endpoint.
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TripError::Http(format!("Failed to create HTTP client: {}", e)))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| TripError::Http(format!("Failed to create tokio runtime: {}", e)))?;

        info!("[NominatimGeocoder] Using {} ({}ms dispatch interval)", endpoint, DISPATCH_INTERVAL_MS);

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            runtime: Arc::new(runtime),
            rate_limiter: Arc::new(DispatchRateLimiter::new(Duration::from_millis(
                DISPATCH_INTERVAL_MS,
            ))),
        })
    }

    /// Place name → coordinate.
    pub async fn search(&self, name: &str) -> Option<GpsPoint> {
        let url = format!("{}/search", self.endpoint);
        let query = [("q", name), ("format", "json"), ("limit", "1")];
        let bytes = self.get_with_retry(&url, &query, name).await?;

        let hits: Vec<SearchHit> = match serde_json::from_slice(&bytes) {
            Ok(h) => h,
            Err(e) => {
                warn!("[Nominatim] Bad search response for '{}': {}", name, e);
                return None;
            }
        };

        let hit = hits.into_iter().next()?;
        let point = GpsPoint::new(hit.lat.parse().ok()?, hit.lon.parse().ok()?);
        point.is_valid().then_some(point)
    }

    /// Coordinate → display address.
    pub async fn reverse_lookup(&self, point: &GpsPoint) -> Option<String> {
        let url = format!("{}/reverse", self.endpoint);
        let lat = point.latitude.to_string();
        let lon = point.longitude.to_string();
        let query = [("lat", lat.as_str()), ("lon", lon.as_str()), ("format", "json")];
        let label = format!("{:.5},{:.5}", point.latitude, point.longitude);
        let bytes = self.get_with_retry(&url, &query, &label).await?;

        match serde_json::from_slice::<ReverseHit>(&bytes) {
            Ok(hit) => hit.display_name,
            Err(e) => {
                warn!("[Nominatim] Bad reverse response for {}: {}", label, e);
                None
            }
        }
    }

    async fn get_with_retry(&self, url: &str, query: &[(&str, &str)], label: &str) -> Option<Vec<u8>> {
        let mut retries = 0;

        loop {
            let dispatch_num = self.rate_limiter.wait_for_dispatch_slot().await;
            let req_start = Instant::now();
            let response = self.client.get(url).query(query).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        retries += 1;
                        if retries > MAX_RETRIES {
                            warn!("[Nominatim {}] Max retries exceeded (429)", label);
                            return None;
                        }
                        let wait = self.rate_limiter.record_429();
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    self.rate_limiter.record_success();

                    if !status.is_success() {
                        warn!("[Nominatim {}] HTTP {}", label, status);
                        return None;
                    }

                    return match resp.bytes().await {
                        Ok(b) => {
                            debug!(
                                "[Nominatim #{}] {} in {:?} ({} bytes)",
                                dispatch_num,
                                label,
                                req_start.elapsed(),
                                b.len()
                            );
                            Some(b.to_vec())
                        }
                        Err(e) => {
                            warn!("[Nominatim {}] Body download error: {}", label, e);
                            None
                        }
                    };
                }
                Err(e) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        warn!("[Nominatim {}] Request error: {}", label, e);
                        return None;
                    }
                    let wait = Duration::from_millis(200 * (1 << retries));
                    warn!("[Nominatim {}] Error: {}, retry {} after {:?}", label, e, retries, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn forward(&self, name: &str) -> Option<GpsPoint> {
        self.runtime.block_on(self.search(name))
    }

    fn reverse(&self, point: &GpsPoint) -> Option<String> {
        self.runtime.block_on(self.reverse_lookup(point))
    }
}
