//! Test utilities: mock implementations of the collaborator traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::HarvestError;
use crate::models::{ResultRecord, ResultRow};
use crate::session::{SessionEvent, SessionReporter};
use crate::traits::{PersistenceSink, RenderingSurface, SurfaceConnector};

/// A read where both watched cells still show the default loading marker.
pub fn loading_rows() -> Vec<ResultRow> {
    vec![ResultRow::new("Loading...", "Loading...")]
}

/// A read where both watched cells show the default unavailable marker.
pub fn unavailable_rows() -> Vec<ResultRow> {
    vec![ResultRow::new("#N/A", "#N/A")]
}

// ---------------------------------------------------------------------------
// MockSurface
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SurfaceState {
    /// Scripted reads. Each call pops the first element.
    reads: VecDeque<Result<Vec<ResultRow>, HarvestError>>,
    /// Returned once the script is exhausted.
    fallback: Vec<ResultRow>,
    submit_error: Option<HarvestError>,
    submitted: Vec<(String, String)>,
    read_count: usize,
}

/// Mock rendering surface with a scripted sequence of reads.
#[derive(Clone, Default)]
pub struct MockSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl MockSurface {
    pub fn with_reads(reads: Vec<Result<Vec<ResultRow>, HarvestError>>) -> Self {
        let surface = Self::default();
        surface.state.lock().unwrap().reads = reads.into();
        surface
    }

    /// Every read returns `rows`.
    pub fn repeating(rows: Vec<ResultRow>) -> Self {
        let surface = Self::default();
        surface.state.lock().unwrap().fallback = rows;
        surface
    }

    pub fn always_loading() -> Self {
        Self::repeating(loading_rows())
    }

    pub fn always_unavailable() -> Self {
        Self::repeating(unavailable_rows())
    }

    /// The next submit fails with `error`.
    pub fn with_submit_error(error: HarvestError) -> Self {
        let surface = Self::default();
        surface.state.lock().unwrap().submit_error = Some(error);
        surface
    }

    /// `(cell, formula)` pairs in submit order.
    pub fn submitted(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().unwrap().read_count
    }
}

impl RenderingSurface for MockSurface {
    async fn submit(&self, cell: &str, query: &str) -> Result<(), HarvestError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.submit_error.take() {
            return Err(e);
        }
        state.submitted.push((cell.to_string(), query.to_string()));
        Ok(())
    }

    async fn read_cells(&self, _max_rows: u32) -> Result<Vec<ResultRow>, HarvestError> {
        let mut state = self.state.lock().unwrap();
        state.read_count += 1;
        match state.reads.pop_front() {
            Some(read) => read,
            None => Ok(state.fallback.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockConnector
// ---------------------------------------------------------------------------

/// Mock connector handing out preconfigured surfaces by worksheet id.
#[derive(Clone, Default)]
pub struct MockConnector {
    surfaces: Arc<Mutex<HashMap<String, Result<MockSurface, HarvestError>>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_surface(self, worksheet: &str, surface: MockSurface) -> Self {
        self.surfaces
            .lock()
            .unwrap()
            .insert(worksheet.to_string(), Ok(surface));
        self
    }

    pub fn with_connect_error(self, worksheet: &str, error: HarvestError) -> Self {
        self.surfaces
            .lock()
            .unwrap()
            .insert(worksheet.to_string(), Err(error));
        self
    }
}

impl SurfaceConnector for MockConnector {
    type Surface = MockSurface;

    async fn connect(&self, worksheet: &str) -> Result<MockSurface, HarvestError> {
        self.surfaces
            .lock()
            .unwrap()
            .remove(worksheet)
            .unwrap_or_else(|| Err(HarvestError::Auth(format!("unknown worksheet {worksheet}"))))
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Mock sink that records writes and can reject chosen positions.
#[derive(Clone, Default)]
pub struct MockSink {
    saved: Arc<Mutex<Vec<ResultRecord>>>,
    failing_positions: Arc<Vec<u32>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every record whose position is in `positions`.
    pub fn failing_positions(positions: &[u32]) -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            failing_positions: Arc::new(positions.to_vec()),
        }
    }

    pub fn saved(&self) -> Vec<ResultRecord> {
        self.saved.lock().unwrap().clone()
    }
}

impl PersistenceSink for MockSink {
    async fn write(&self, record: &ResultRecord) -> Result<(), HarvestError> {
        if self.failing_positions.contains(&record.position) {
            return Err(HarvestError::Write(format!(
                "rejected position {}",
                record.position
            )));
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock session reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl SessionReporter for MockReporter {
    fn report(&self, event: SessionEvent<'_>) {
        let label = match &event {
            SessionEvent::Started { .. } => "Started",
            SessionEvent::TaskClaimed { .. } => "TaskClaimed",
            SessionEvent::TaskCompleted { .. } => "TaskCompleted",
            SessionEvent::TaskFailed { .. } => "TaskFailed",
            SessionEvent::WriteFailed { .. } => "WriteFailed",
            SessionEvent::Done { .. } => "Done",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
