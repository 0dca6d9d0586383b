//! Batch runs driven by a JSON configuration.

mod config;
mod run;

pub use config::{DatasetMap, DatasetOverlay, DatasetSpec, FigureSpec, InteractiveOutput, MapSpec, RunConfig, SourceSpec, StatisticsOutput};
pub use run::{run, Artifact, ArtifactKind, RunReport, StepFailure};
