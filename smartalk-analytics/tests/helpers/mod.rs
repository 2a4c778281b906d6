//! Mock ingestion endpoint for HTTP delivery tests
//!
//! Binds an axum server to an ephemeral port on 127.0.0.1 and records every
//! batch it accepts. The response status and a per-request delay can be
//! changed while the server runs.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use smartalk_common::AnalyticsConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct CollectorState {
    batches: Arc<Mutex<Vec<Value>>>,
    attempts: Arc<AtomicUsize>,
    status: Arc<Mutex<StatusCode>>,
    delay: Arc<Mutex<Duration>>,
}

pub struct MockCollector {
    pub base_url: String,
    state: CollectorState,
    server: JoinHandle<()>,
}

impl MockCollector {
    pub async fn start() -> Self {
        let state = CollectorState {
            batches: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            status: Arc::new(Mutex::new(StatusCode::OK)),
            delay: Arc::new(Mutex::new(Duration::ZERO)),
        };

        let app = Router::new()
            .route("/api/v1/analytics/events/batch", post(receive_batch))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock collector");
        let addr = listener.local_addr().expect("Mock collector has no address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}/api/v1", addr),
            state,
            server,
        }
    }

    /// Analytics config pointing at this collector
    pub fn config(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            base_url: self.base_url.clone(),
            ..AnalyticsConfig::default()
        }
    }

    pub fn set_status(&self, status: StatusCode) {
        *self.state.status.lock().unwrap() = status;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    /// Accepted request bodies, oldest first
    pub fn batches(&self) -> Vec<Value> {
        self.state.batches.lock().unwrap().clone()
    }

    /// Requests received, accepted or not
    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Event types across all accepted batches, in delivery order
    pub fn delivered_types(&self) -> Vec<String> {
        self.batches()
            .iter()
            .flat_map(|batch| batch["events"].as_array().cloned().unwrap_or_default())
            .filter_map(|event| event["eventType"].as_str().map(str::to_string))
            .collect()
    }

    /// Poll until `count` batches were accepted or `timeout` elapses
    pub async fn wait_for_batches(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.batches().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.batches().len() >= count
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn receive_batch(
    State(state): State<CollectorState>,
    Json(body): Json<Value>,
) -> StatusCode {
    state.attempts.fetch_add(1, Ordering::SeqCst);

    let delay = *state.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let status = *state.status.lock().unwrap();
    if status.is_success() {
        state.batches.lock().unwrap().push(body);
    }
    status
}
