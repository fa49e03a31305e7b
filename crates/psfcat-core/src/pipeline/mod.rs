pub mod config;
pub mod external;
mod helpers;
mod orchestrator;
pub mod refine;
mod types;
pub mod unit;

pub use external::{Collaborators, CommandPsfFitter, PsfFitter, StarFileFinder, StarFinder};
pub use helpers::make_rng;
pub use orchestrator::{run_batch, run_batch_reported, BatchSummary};
pub use refine::{refine_candidates, RefineContext, RefinedCandidates};
pub use types::{NoOpReporter, PipelineStage, ProgressReporter, RefineStage, StageOutcome};
pub use unit::{process_unit, BatchManifest, UnitArtifacts, UnitReport, UnitSpec};
