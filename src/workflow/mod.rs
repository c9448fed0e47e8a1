// Batch workflow: stage catalog, batch state and the engine that moves batches

pub mod batch;
pub mod catalog;
pub mod definition;
pub mod engine;

pub use batch::Batch;
pub use catalog::{default_definition, DEFAULT_INITIAL_BATCH_NAME, DEFAULT_REENTRY_STAGE};
pub use definition::{Stage, StageCatalogFile, WorkflowDefinition};
pub use engine::{AdvanceOutcome, SplitOutcome, WorkflowEngine};
