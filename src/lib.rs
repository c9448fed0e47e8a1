// Fluxo Library - batch workflow engine for furniture installation projects
// This exposes the core components for testing and integration

pub mod audit;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod errors;
pub mod identity;
pub mod model;
pub mod patch;
pub mod project;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use audit::{AuditEvent, AuditNote, AuditTrail, NoteKind, StageHistoryEntry};
pub use bootstrap::{initialize, AdminSpec, BootstrapReport, DefinitionChange};
pub use config::{config, FluxoConfig};
pub use errors::{DefinitionError, WorkflowError};
pub use identity::{Actor, ConfiguredIdentity, IdentityProvider};
pub use patch::{ClientPatch, EnvironmentPatch};
pub use project::{LifecycleEvent, ProjectLifecycle};
pub use service::{BatchView, Clock, FixedClock, ProjectView, ServiceOptions, SplitView, SystemClock, WorkflowService};
pub use store::{Changeset, InMemoryStore, Mutation, StoreError, WorkflowStore};
#[cfg(feature = "database")]
pub use store::SqliteStore;
pub use telemetry::{create_operation_span, generate_correlation_id, init_telemetry};
pub use workflow::{default_definition, Batch, Stage, WorkflowDefinition, WorkflowEngine};
