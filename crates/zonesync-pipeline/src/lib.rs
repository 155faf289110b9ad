//! Zone import pipeline.
//!
//! The stages of mirroring the provider's delivery zones into the relational
//! hierarchy: delta detection against the snapshot, AI-assisted staging of a
//! City→District→Area tree, cascading approval, incremental per-city commit
//! into production, and coverage reconciliation. Every multi-unit stage is
//! resumable: progress lives in the database, steps are idempotent, and the
//! retry orchestrator only repeats steps that are safe to repeat.

pub mod approval;
pub mod classify;
pub mod commit;
pub mod coverage;
pub mod delta;
pub mod driver;
pub mod error;
pub mod retry;
pub mod staging;

pub use approval::{ApprovalMachine, CascadePlan, CascadeWrite};
pub use classify::{Classifier, ClassifierConfig, HttpClassifier};
pub use commit::{CommitEngine, CommitStepResult, GeoSyncStepResult};
pub use coverage::{CoverageEngine, CoverageReport, CoverageThresholds, HealthStatus};
pub use delta::{DeltaReport, DeltaSummary};
pub use driver::{AbortHandle, BatchHandle, CommitDriver, CommitStep, DriveOutcome, DriveStatus};
pub use error::{PipelineError, PipelineResult};
pub use retry::RetryPolicy;
pub use staging::{FinalizeResult, InitializeResult, ProcessOutcome, StagingBuilder};
