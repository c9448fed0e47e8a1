// Project-level status tracking

pub mod lifecycle;

pub use lifecycle::{next_status, LifecycleEvent, ProjectLifecycle};
