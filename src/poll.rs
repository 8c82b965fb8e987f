//! Poll cycle and retry/backoff state machine.
//!
//! One cycle is fetch -> dedup -> normalize -> encode -> write. The
//! device's own `last_reading_at` gates duplicate suppression: polling an
//! unchanged upstream document never writes twice. Any fetch or write
//! failure feeds exponential backoff, capped at five minutes; nothing in
//! the loop is fatal.

use crate::catalog::SensorCatalog;
use crate::influx::InfluxWriter;
use crate::lineproto;
use crate::normalize;
use crate::shutdown::Shutdown;
use crate::state::PollStatus;
use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const BACKOFF_CAP: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum CycleError {
    /// Network/HTTP failure talking to the upstream API. Expected under
    /// flaky connectivity; logged at error level without a dump.
    #[error("api fetch failed: {0}")]
    Fetch(#[source] anyhow::Error),
    /// Store rejected or never received the write.
    #[error("store write failed: {0}")]
    Store(#[source] anyhow::Error),
    /// Anything unanticipated; logged with full diagnostic detail but
    /// follows the same backoff path as the transient classes.
    #[error("unexpected failure: {0}")]
    Unexpected(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Wrote this many points from new data.
    Written(usize),
    /// Upstream document timestamp unchanged since the last written cycle.
    SkippedDuplicate,
    /// Nothing valid to write after normalization; not an error.
    NoReadings,
}

/// Where one cycle fetches the current device document from.
pub trait DeviceSource {
    fn fetch_device(&self) -> impl Future<Output = Result<Value, CycleError>> + Send;
}

/// Where one cycle writes encoded points to.
pub trait PointStore {
    fn write_points(&self, lines: &[String]) -> impl Future<Output = Result<usize, CycleError>> + Send;
}

/// Live upstream: the Smart Citizen API for a single device.
pub struct LiveDevice {
    pub api: crate::api::SckApi,
    pub device_id: String,
}

impl DeviceSource for LiveDevice {
    async fn fetch_device(&self) -> Result<Value, CycleError> {
        self.api
            .fetch_device(&self.device_id)
            .await
            .map_err(|err| CycleError::Fetch(err.into()))
    }
}

impl PointStore for InfluxWriter {
    async fn write_points(&self, lines: &[String]) -> Result<usize, CycleError> {
        self.write_lines(lines).await.map_err(CycleError::Store)
    }
}

/// Exponential backoff: `min(2^failures, 300)` seconds. The ceiling and
/// the growth function are fixed contracts, not configuration.
#[derive(Debug, Default)]
pub struct BackoffState {
    consecutive_failures: u32,
}

impl BackoffState {
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures += 1;
        backoff_wait(self.consecutive_failures)
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }
}

pub fn backoff_wait(failures: u32) -> Duration {
    let secs = 2u64
        .saturating_pow(failures)
        .min(BACKOFF_CAP.as_secs());
    Duration::from_secs(secs)
}

/// One device's poll-parse-write pipeline plus its dedup state.
///
/// `last_reading_at` only advances, and only after a successful write, so
/// a failed write leaves the next cycle free to retry the same document.
pub struct PollCycle<S, W> {
    source: S,
    store: W,
    catalog: SensorCatalog,
    device_id: String,
    status: Arc<PollStatus>,
    last_reading_at: Option<String>,
}

impl<S: DeviceSource, W: PointStore> PollCycle<S, W> {
    pub fn new(
        source: S,
        store: W,
        catalog: SensorCatalog,
        device_id: impl Into<String>,
        status: Arc<PollStatus>,
    ) -> Self {
        Self {
            source,
            store,
            catalog,
            device_id: device_id.into(),
            status,
            last_reading_at: None,
        }
    }

    /// Execute a single poll-parse-write cycle.
    pub async fn poll_once(&mut self) -> Result<CycleOutcome, CycleError> {
        let doc = self.source.fetch_device().await?;
        let device_reading_at = doc
            .get("last_reading_at")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let (Some(current), Some(seen)) = (&device_reading_at, &self.last_reading_at) {
            if current == seen {
                tracing::debug!(timestamp = %current, "skipping duplicate reading");
                return Ok(CycleOutcome::SkippedDuplicate);
            }
        }

        let readings = normalize::parse_sensors(&doc, &self.catalog);
        let lines = lineproto::encode(&readings, &self.device_id)
            .map_err(CycleError::Unexpected)?;
        if lines.is_empty() {
            tracing::warn!("no valid sensor readings in API response");
            return Ok(CycleOutcome::NoReadings);
        }

        let written = self.store.write_points(&lines).await?;
        // The gate only advances; a document missing its top-level
        // timestamp must not reset dedup to square one.
        if device_reading_at.is_some() {
            self.last_reading_at = device_reading_at.clone();
        }
        self.status.record_poll(Utc::now());
        tracing::info!(
            written,
            reading_at = device_reading_at.as_deref().unwrap_or("-"),
            polls_total = self.status.snapshot().polls_total,
            "wrote points"
        );
        Ok(CycleOutcome::Written(written))
    }
}

/// Main loop: poll on the configured interval, back off on failure, stop
/// when the shutdown token trips. In-flight calls finish naturally; no
/// new cycle starts once the token is set.
pub async fn run<S: DeviceSource, W: PointStore>(
    mut cycle: PollCycle<S, W>,
    poll_interval: Duration,
    shutdown: Shutdown,
) {
    let mut backoff = BackoffState::default();

    while !shutdown.is_triggered() {
        match cycle.poll_once().await {
            Ok(_) => {
                backoff.reset();
                if !shutdown.sleep(poll_interval).await {
                    break;
                }
            }
            Err(err) => {
                let wait = backoff.record_failure();
                let attempt = backoff.failures();
                match &err {
                    CycleError::Fetch(source) => {
                        tracing::error!(
                            attempt,
                            backoff_secs = wait.as_secs(),
                            error = %source,
                            "API request failed"
                        );
                    }
                    CycleError::Store(source) => {
                        tracing::error!(
                            attempt,
                            backoff_secs = wait.as_secs(),
                            error = %source,
                            "store write failed; dropping this cycle's points"
                        );
                    }
                    CycleError::Unexpected(source) => {
                        let detail = format!("{source:#}");
                        tracing::error!(
                            attempt,
                            backoff_secs = wait.as_secs(),
                            error = %detail,
                            "unexpected error in poll cycle"
                        );
                    }
                }
                if !shutdown.sleep(wait).await {
                    break;
                }
            }
        }
    }

    tracing::info!("poll loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeDevice {
        responses: Mutex<Vec<Result<Value, CycleError>>>,
    }

    impl FakeDevice {
        fn new(responses: Vec<Result<Value, CycleError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    impl DeviceSource for &FakeDevice {
        async fn fetch_device(&self) -> Result<Value, CycleError> {
            self.responses.lock().unwrap().remove(0)
        }
    }

    #[derive(Default)]
    struct FakeStore {
        calls: AtomicUsize,
        lines: Mutex<Vec<String>>,
        fail_next: AtomicUsize,
    }

    impl PointStore for &FakeStore {
        async fn write_points(&self, lines: &[String]) -> Result<usize, CycleError> {
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(CycleError::Store(anyhow!("bucket unavailable")));
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.lines.lock().unwrap().extend_from_slice(lines);
            Ok(lines.len())
        }
    }

    fn device_doc(ts: &str) -> Value {
        json!({
            "last_reading_at": ts,
            "data": { "sensors": [
                { "id": 55, "value": 21.4, "last_reading_at": ts },
                { "id": 56, "value": 48.0, "last_reading_at": ts },
            ]}
        })
    }

    #[test]
    fn backoff_grows_by_powers_of_two_capped_at_five_minutes() {
        let expected = [2u64, 4, 8, 16, 32, 64, 128, 256, 300, 300];
        let mut previous = Duration::ZERO;
        for (n, want) in (1u32..=10).zip(expected) {
            let wait = backoff_wait(n);
            assert_eq!(wait, Duration::from_secs(want), "n={n}");
            assert!(wait >= previous);
            previous = wait;
        }
        assert_eq!(backoff_wait(64), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn duplicate_timestamp_skips_write_and_counter() {
        let device = FakeDevice::new(vec![
            Ok(device_doc("2026-02-04T17:00:47Z")),
            Ok(device_doc("2026-02-04T17:00:47Z")),
        ]);
        let store = FakeStore::default();
        let status = PollStatus::new();
        let mut cycle =
            PollCycle::new(&device, &store, SensorCatalog, "19396", status.clone());

        assert_eq!(cycle.poll_once().await.unwrap(), CycleOutcome::Written(2));
        assert_eq!(status.snapshot().polls_total, 1);

        assert_eq!(
            cycle.poll_once().await.unwrap(),
            CycleOutcome::SkippedDuplicate
        );
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(status.snapshot().polls_total, 1);
    }

    #[tokio::test]
    async fn new_timestamp_writes_again() {
        let device = FakeDevice::new(vec![
            Ok(device_doc("2026-02-04T17:00:47Z")),
            Ok(device_doc("2026-02-04T17:01:47Z")),
        ]);
        let store = FakeStore::default();
        let status = PollStatus::new();
        let mut cycle =
            PollCycle::new(&device, &store, SensorCatalog, "19396", status.clone());

        cycle.poll_once().await.unwrap();
        assert_eq!(cycle.poll_once().await.unwrap(), CycleOutcome::Written(2));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(status.snapshot().polls_total, 2);
    }

    #[tokio::test]
    async fn empty_normalization_never_touches_the_store() {
        let device = FakeDevice::new(vec![Ok(json!({
            "last_reading_at": "2026-02-04T17:00:47Z",
            "data": { "sensors": [ { "id": 9999, "value": 1.0 } ] }
        }))]);
        let store = FakeStore::default();
        let status = PollStatus::new();
        let mut cycle =
            PollCycle::new(&device, &store, SensorCatalog, "19396", status.clone());

        assert_eq!(cycle.poll_once().await.unwrap(), CycleOutcome::NoReadings);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(status.snapshot().polls_total, 0);
    }

    #[tokio::test]
    async fn three_fetch_failures_back_off_two_four_eight_then_reset() {
        let device = FakeDevice::new(vec![
            Err(CycleError::Fetch(anyhow!("connection refused"))),
            Err(CycleError::Fetch(anyhow!("connection refused"))),
            Err(CycleError::Fetch(anyhow!("connection refused"))),
            Ok(device_doc("2026-02-04T17:00:47Z")),
        ]);
        let store = FakeStore::default();
        let status = PollStatus::new();
        let mut cycle =
            PollCycle::new(&device, &store, SensorCatalog, "19396", status.clone());
        let mut backoff = BackoffState::default();

        for expected_secs in [2u64, 4, 8] {
            let err = cycle.poll_once().await.unwrap_err();
            assert!(matches!(err, CycleError::Fetch(_)));
            assert_eq!(backoff.record_failure(), Duration::from_secs(expected_secs));
        }
        assert_eq!(backoff.failures(), 3);

        assert_eq!(cycle.poll_once().await.unwrap(), CycleOutcome::Written(2));
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
    }

    #[tokio::test]
    async fn failed_write_does_not_advance_dedup_gate() {
        let device = FakeDevice::new(vec![
            Ok(device_doc("2026-02-04T17:00:47Z")),
            Ok(device_doc("2026-02-04T17:00:47Z")),
        ]);
        let store = FakeStore::default();
        store.fail_next.store(1, Ordering::SeqCst);
        let status = PollStatus::new();
        let mut cycle =
            PollCycle::new(&device, &store, SensorCatalog, "19396", status.clone());

        assert!(matches!(
            cycle.poll_once().await,
            Err(CycleError::Store(_))
        ));
        assert_eq!(status.snapshot().polls_total, 0);

        // Same upstream timestamp is retried, not treated as a duplicate.
        assert_eq!(cycle.poll_once().await.unwrap(), CycleOutcome::Written(2));
        assert_eq!(status.snapshot().polls_total, 1);
    }

    #[tokio::test]
    async fn missing_device_timestamp_does_not_reset_dedup_gate() {
        let undated_doc = json!({
            "data": { "sensors": [
                { "id": 55, "value": 22.0, "last_reading_at": "2026-02-04T17:05:00Z" },
            ]}
        });
        let device = FakeDevice::new(vec![
            Ok(device_doc("2026-02-04T17:00:47Z")),
            Ok(undated_doc),
            Ok(device_doc("2026-02-04T17:00:47Z")),
        ]);
        let store = FakeStore::default();
        let status = PollStatus::new();
        let mut cycle =
            PollCycle::new(&device, &store, SensorCatalog, "19396", status.clone());

        assert_eq!(cycle.poll_once().await.unwrap(), CycleOutcome::Written(2));
        assert_eq!(cycle.poll_once().await.unwrap(), CycleOutcome::Written(1));

        // The undated document left the gate at the first timestamp, so
        // re-seeing it is still a duplicate.
        assert_eq!(
            cycle.poll_once().await.unwrap(),
            CycleOutcome::SkippedDuplicate
        );
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(status.snapshot().polls_total, 2);
    }

    #[tokio::test]
    async fn run_exits_promptly_once_shutdown_trips() {
        let device = FakeDevice::new(vec![Ok(device_doc("2026-02-04T17:00:47Z"))]);
        let store = FakeStore::default();
        let status = PollStatus::new();
        let cycle = PollCycle::new(&device, &store, SensorCatalog, "19396", status);
        let shutdown = Shutdown::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger();
        });

        tokio::time::timeout(
            Duration::from_secs(2),
            run(cycle, Duration::from_secs(3600), shutdown),
        )
        .await
        .expect("loop did not observe shutdown");
    }
}
