use std::fmt;

use crate::flags::Anomaly;

/// Result of one pipeline stage: either carry on with the stage's output or
/// stop processing the unit because of a fatal anomaly.
#[derive(Clone, Debug, PartialEq)]
pub enum StageOutcome<T> {
    Continue(T),
    Abort(Anomaly),
}

impl<T> StageOutcome<T> {
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort(_))
    }

    pub fn continued(self) -> Option<T> {
        match self {
            Self::Continue(v) => Some(v),
            Self::Abort(_) => None,
        }
    }
}

/// Candidate refinement stages, in the only order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefineStage {
    QualityFilter,
    BrightCut,
    FaintCut,
    Tapebump,
    Reservation,
}

impl fmt::Display for RefineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QualityFilter => write!(f, "Quality filter"),
            Self::BrightCut => write!(f, "Bright-end cut"),
            Self::FaintCut => write!(f, "Faint-end cut"),
            Self::Tapebump => write!(f, "Tapebump exclusion"),
            Self::Reservation => write!(f, "Reservation split"),
        }
    }
}

/// Batch processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug)]
pub enum PipelineStage {
    ReadingRegions,
    ProcessingUnits,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadingRegions => write!(f, "Reading tape bumps"),
            Self::ProcessingUnits => write!(f, "Processing units"),
        }
    }
}

/// Thread-safe progress reporting for a batch.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (e.g. unit count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Progress reporter that ignores everything.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
