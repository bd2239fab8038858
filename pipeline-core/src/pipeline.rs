//! One-pass orchestration: fetch every registered location and hand each
//! successful document to a sink.
//!
//! A location's attempt is a two-phase sequence (fetch, then write). Failures
//! are recorded per location and never stop the remaining locations; the
//! aggregate [`RunReport`] is only turned into an error once every location
//! has been attempted.

use chrono::NaiveDate;
use futures::{StreamExt, stream};
use std::fmt;
use tracing::{info, instrument, warn};

use crate::{
    error::{Phase, PipelineError, Result},
    model::{FetchResult, Location, WriteTarget},
    provider::WeatherProvider,
    registry::LocationRegistry,
    sink::Sink,
};

/// Default number of locations processed concurrently during a run.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug)]
pub struct Pipeline {
    registry: LocationRegistry,
    provider: Box<dyn WeatherProvider>,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(registry: LocationRegistry, provider: Box<dyn WeatherProvider>) -> Self {
        Self { registry, provider, concurrency: DEFAULT_CONCURRENCY }
    }

    /// Number of locations in flight at once during [`Pipeline::run`]; values
    /// below one are raised to one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn add_location(&self, location: &Location) -> Result<()> {
        self.registry.add(location)
    }

    pub fn remove_location(&self, location: &Location) -> Result<bool> {
        self.registry.remove(location)
    }

    pub fn list_locations(&self) -> Result<Vec<Location>> {
        self.registry.list()
    }

    /// Fetch the history document for `location` on `date` and write it to
    /// `destination`. Nothing is written unless the fetch returned 2xx.
    #[instrument(skip_all, fields(%location, %date))]
    pub async fn fetch_and_write_history(
        &self,
        date: NaiveDate,
        location: &Location,
        sink: &dyn Sink,
        destination: &WriteTarget,
    ) -> Result<()> {
        let fetched = self.provider.fetch_history(date, location).await?;
        write_fetched(fetched, location, sink, destination).await
    }

    /// Forecast counterpart of [`Pipeline::fetch_and_write_history`], written
    /// to `<root>/<location>/forecast-<date>.json`.
    ///
    /// The textual flags go through [`WeatherProvider::forecast`], so invalid
    /// arguments fail before any network call.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(%location, %date, days = days))]
    pub async fn fetch_and_write_forecast(
        &self,
        location: &Location,
        date: NaiveDate,
        days: u32,
        alerts: &str,
        air_quality: &str,
        sink: &dyn Sink,
        root: &str,
    ) -> Result<WriteTarget> {
        let fetched = self.provider.forecast(location, date, days, alerts, air_quality).await?;
        let destination = WriteTarget::for_forecast(root, location, date);
        write_fetched(fetched, location, sink, &destination).await?;
        Ok(destination)
    }

    /// One pass over every registered location. Each artifact is written to
    /// `<root>/<location>/<date>.json`.
    ///
    /// Only registry failures are returned as `Err`; per-location failures are
    /// recorded in the report.
    pub async fn run(&self, date: NaiveDate, sink: &dyn Sink, root: &str) -> Result<RunReport> {
        // Snapshot: locations added after this point belong to the next run.
        let locations = self.registry.list()?;
        info!(%date, locations = locations.len(), "starting run");

        let outcomes: Vec<LocationOutcome> = stream::iter(locations)
            .map(|location| async move {
                let destination = WriteTarget::for_history(root, &location, date);
                let result = self
                    .fetch_and_write_history(date, &location, sink, &destination)
                    .await
                    .map(|()| destination);

                if let Err(e) = &result {
                    warn!(%location, phase = ?e.phase(), error = %e, "location failed");
                }
                LocationOutcome { location, result }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = RunReport { date, outcomes };
        info!(
            %date,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "run finished"
        );
        Ok(report)
    }
}

async fn write_fetched(
    fetched: FetchResult,
    location: &Location,
    sink: &dyn Sink,
    destination: &WriteTarget,
) -> Result<()> {
    if !fetched.is_success() {
        return Err(PipelineError::FetchFailed {
            location: location.to_string(),
            status_code: fetched.status_code,
            body: fetched.payload.to_string(),
        });
    }

    let payload = fetched.payload.to_string();
    sink.write(&payload, destination).await.map_err(|source| PipelineError::WriteFailed {
        location: location.to_string(),
        destination: destination.to_string(),
        source,
    })?;

    info!(%location, %destination, "data written");
    Ok(())
}

/// Result of one location's attempt: the written target or the failure.
#[derive(Debug)]
pub struct LocationOutcome {
    pub location: Location,
    pub result: Result<WriteTarget>,
}

impl LocationOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Phase the attempt failed in, `None` on success.
    pub fn failed_phase(&self) -> Option<Phase> {
        self.result.as_ref().err().and_then(PipelineError::phase)
    }
}

impl fmt::Display for LocationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(target) => write!(f, "{}: ok ({target})", self.location),
            Err(e) => match e.phase() {
                Some(phase) => write!(f, "{}: {phase} failed: {e}", self.location),
                None => write!(f, "{}: failed: {e}", self.location),
            },
        }
    }
}

/// Aggregate outcome of a run, one entry per location in registry order.
#[derive(Debug)]
pub struct RunReport {
    pub date: NaiveDate,
    pub outcomes: Vec<LocationOutcome>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &LocationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn outcome(&self, location: &str) -> Option<&LocationOutcome> {
        self.outcomes.iter().find(|o| o.location.as_str() == location)
    }

    /// Collapse the report into a single signal: `Err(RunFailed)` if any
    /// location failed.
    pub fn into_result(self) -> Result<RunReport> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PipelineError::RunFailed { failed: self.failed(), total: self.total() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::SinkError,
        model::parse_date,
        provider::testing::{Canned, FakeProvider},
        sink::{LocalSink, RemoteBlobSink},
    };
    use async_trait::async_trait;
    use object_store::{ObjectStore, memory::InMemory, path::Path as ObjectPath};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Records every write; optionally fails them.
    #[derive(Debug, Default)]
    struct RecordingSink {
        writes: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self { fail: true, ..Default::default() }
        }

        fn writes(&self) -> Vec<(String, String)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn write(&self, payload: &str, destination: &WriteTarget) -> Result<(), SinkError> {
            self.writes.lock().unwrap().push((payload.to_string(), destination.to_string()));
            if self.fail {
                return Err(SinkError::Io {
                    path: destination.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            Ok(())
        }
    }

    fn loc(s: &str) -> Location {
        Location::new(s).unwrap()
    }

    fn day() -> NaiveDate {
        parse_date("2024-01-01").unwrap()
    }

    fn pipeline(provider: FakeProvider, locations: &[&str]) -> Pipeline {
        let registry = LocationRegistry::open_in_memory().unwrap();
        for l in locations {
            registry.add(&loc(l)).unwrap();
        }
        Pipeline::new(registry, Box::new(provider))
    }

    #[tokio::test]
    async fn failed_fetch_never_reaches_the_sink() {
        let p = pipeline(FakeProvider::always(Canned::Ok(json!({}), 500)), &[]);
        let sink = RecordingSink::default();

        let err = p
            .fetch_and_write_history(day(), &loc("10001"), &sink, &WriteTarget::new("x.json"))
            .await
            .unwrap_err();

        match err {
            PipelineError::FetchFailed { location, status_code, body } => {
                assert_eq!(location, "10001");
                assert_eq!(status_code, 500);
                assert_eq!(body, "{}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(sink.writes().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_never_reaches_the_sink() {
        let p = pipeline(FakeProvider::always(Canned::Transport(0)), &[]);
        let sink = RecordingSink::default();

        let err = p
            .fetch_and_write_history(day(), &loc("10001"), &sink, &WriteTarget::new("x.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Transport(_)));
        assert_eq!(err.phase(), Some(Phase::Fetch));
        assert!(sink.writes().is_empty());
    }

    #[tokio::test]
    async fn successful_fetch_writes_serialized_payload_to_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        let root = root.to_string_lossy();
        let p = pipeline(FakeProvider::always(Canned::Ok(json!({"temp_c": 21}), 200)), &[]);
        let target = WriteTarget::for_history(&root, &loc("10001"), day());

        p.fetch_and_write_history(day(), &loc("10001"), &LocalSink::new(), &target)
            .await
            .unwrap();

        let written =
            std::fs::read_to_string(dir.path().join("out/10001/2024-01-01.json")).unwrap();
        assert_eq!(written, json!({"temp_c": 21}).to_string());
        assert_eq!(written, r#"{"temp_c":21}"#);
    }

    #[tokio::test]
    async fn sink_failure_is_write_failed() {
        let p = pipeline(FakeProvider::always(Canned::Ok(json!({"temp_c": 21}), 200)), &[]);
        let sink = RecordingSink::failing();

        let err = p
            .fetch_and_write_history(day(), &loc("10001"), &sink, &WriteTarget::new("x.json"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::WriteFailed { ref destination, .. } if destination == "x.json"
        ));
        assert_eq!(err.phase(), Some(Phase::Write));
        assert_eq!(sink.writes().len(), 1);
    }

    #[tokio::test]
    async fn run_continues_past_a_failing_location() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let provider = FakeProvider::always(Canned::Ok(json!({"temp_c": 21}), 200))
            .with("B", Canned::Ok(json!({"error": "boom"}), 500));
        let p = pipeline(provider, &["A", "B", "C"]);

        let report = p.run(day(), &LocalSink::new(), &root).await.unwrap();

        let order: Vec<&str> = report.outcomes.iter().map(|o| o.location.as_str()).collect();
        assert_eq!(order, ["A", "B", "C"]);
        assert!(report.outcome("A").unwrap().is_success());
        assert!(report.outcome("C").unwrap().is_success());
        assert!(matches!(
            report.outcome("B").unwrap().result,
            Err(PipelineError::FetchFailed { status_code: 500, .. })
        ));
        assert_eq!(report.outcome("B").unwrap().failed_phase(), Some(Phase::Fetch));

        assert!(dir.path().join("A/2024-01-01.json").exists());
        assert!(!dir.path().join("B/2024-01-01.json").exists());
        assert!(dir.path().join("C/2024-01-01.json").exists());

        assert_eq!((report.succeeded(), report.failed()), (2, 1));
        let err = report.into_result().unwrap_err();
        assert!(matches!(err, PipelineError::RunFailed { failed: 1, total: 3 }));
    }

    #[tokio::test]
    async fn run_with_all_successes_is_success() {
        let p = pipeline(FakeProvider::always(Canned::Ok(json!({}), 200)), &["A", "B"])
            .with_concurrency(1);
        let sink = RecordingSink::default();

        let report = p.run(day(), &sink, "out").await.unwrap();

        assert!(report.is_success());
        let mut destinations: Vec<String> = sink.writes().into_iter().map(|(_, d)| d).collect();
        destinations.sort();
        assert_eq!(destinations, ["out/A/2024-01-01.json", "out/B/2024-01-01.json"]);
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn run_over_empty_registry_succeeds() {
        let p = pipeline(FakeProvider::always(Canned::Ok(json!({}), 200)), &[]);

        let report = p.run(day(), &RecordingSink::default(), "out").await.unwrap();

        assert_eq!(report.total(), 0);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn run_reports_write_failures_separately() {
        let p = pipeline(FakeProvider::always(Canned::Ok(json!({}), 200)), &["A", "B"]);

        let report = p.run(day(), &RecordingSink::failing(), "out").await.unwrap();

        assert_eq!(report.failed(), 2);
        assert!(report.failures().all(|o| o.failed_phase() == Some(Phase::Write)));
        assert!(report.outcome("A").unwrap().to_string().starts_with("A: write failed"));
    }

    #[tokio::test]
    async fn run_writes_through_a_blob_sink_without_changes() {
        let store = Arc::new(InMemory::new());
        let sink = RemoteBlobSink::new(store.clone());
        let p = pipeline(FakeProvider::always(Canned::Ok(json!({"temp_c": 5}), 200)), &["Oslo"]);

        let report = p.run(day(), &sink, "history").await.unwrap();
        assert!(report.is_success());

        let stored = store
            .get(&ObjectPath::from("history/Oslo/2024-01-01.json"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(&stored[..], br#"{"temp_c":5}"#);
    }

    #[tokio::test]
    async fn forecast_is_written_next_to_history() {
        let p = pipeline(FakeProvider::always(Canned::Ok(json!({"forecast": []}), 200)), &[]);
        let sink = RecordingSink::default();

        let target = p
            .fetch_and_write_forecast(&loc("Oslo"), day(), 3, "no", "YES", &sink, "out")
            .await
            .unwrap();

        assert_eq!(target.as_str(), "out/Oslo/forecast-2024-01-01.json");
        assert_eq!(sink.writes(), vec![(r#"{"forecast":[]}"#.to_string(), target.to_string())]);
    }

    #[tokio::test]
    async fn invalid_forecast_arguments_fail_before_fetching() {
        // Any fetch would surface as a transport error instead.
        let p = pipeline(FakeProvider::always(Canned::Transport(0)), &[]);
        let sink = RecordingSink::default();

        let cases = [(0, "no", "no"), (2, "maybe", "no"), (2, "no", "maybe")];
        for (days, alerts, aqi) in cases {
            let err = p
                .fetch_and_write_forecast(&loc("Oslo"), day(), days, alerts, aqi, &sink, "out")
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidArgument(_)), "{err:?}");
        }
        assert!(sink.writes().is_empty());
    }

    #[test]
    fn registry_errors_propagate_unchanged() {
        let p = pipeline(FakeProvider::always(Canned::Ok(json!({}), 200)), &["A"]);

        let err = p.add_location(&loc("A")).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateLocation(_)));

        assert!(!p.remove_location(&loc("missing")).unwrap());
        assert_eq!(p.list_locations().unwrap(), vec![loc("A")]);
    }
}
