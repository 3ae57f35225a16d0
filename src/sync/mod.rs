pub mod canvas;
pub mod classroom;
pub mod ical;
pub mod session;

use thiserror::Error;

use crate::profile::Profile;
use crate::store::ItemStore;
use canvas::CanvasClient;
use classroom::ClassroomClient;

/// Errors surfaced at the adapter boundary.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} returned status {status}")]
    Status {
        context: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("session rejected: {0}")]
    Auth(String),
    #[error("malformed response: {context}")]
    MalformedResponse { context: String },
}

impl SyncError {
    pub(crate) fn malformed(context: impl Into<String>) -> Self {
        Self::MalformedResponse {
            context: context.into(),
        }
    }
}

/// What a load cycle accomplished. Per-record failures are tagged here so one
/// bad record never aborts the rest of its batch.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Items inserted into the store.
    pub inserted: usize,
    /// Records skipped because they were malformed or their fetch failed.
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl LoadReport {
    pub fn record_skip(&mut self, error: impl std::fmt::Display) {
        self.skipped += 1;
        self.errors.push(error.to_string());
    }

    pub fn merge(&mut self, other: LoadReport) {
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}

/// Run one full load cycle: clear the store, then load both LMS adapters
/// concurrently. Adapter failures are logged and folded into the report;
/// this function itself never fails.
///
/// There is no cancellation of in-flight loads. The synchronous reset at the
/// start is the only guard against overlapping cycles, so a still-running
/// earlier load can interleave late insertions (upstream behavior, kept).
pub async fn load_assignments(
    classroom: Option<&ClassroomClient>,
    canvas: &CanvasClient,
    profile: &Profile,
    store: &ItemStore,
) -> LoadReport {
    store.reset();

    let classroom_load = async {
        match classroom {
            Some(client) => match classroom::load_classroom_items(client, profile, store).await {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Classroom load failed: {}", e);
                    let mut report = LoadReport::default();
                    report.errors.push(e.to_string());
                    report
                }
            },
            None => {
                log::info!("Not signed in to Classroom, skipping");
                LoadReport::default()
            }
        }
    };

    let canvas_load = async {
        match canvas::load_canvas_items(canvas, profile, store, chrono::Utc::now()).await {
            Ok(report) => report,
            Err(e) => {
                log::error!("Canvas load failed: {}", e);
                let mut report = LoadReport::default();
                report.errors.push(e.to_string());
                report
            }
        }
    };

    let (mut report, canvas_report) = futures::join!(classroom_load, canvas_load);
    report.merge(canvas_report);
    report
}
