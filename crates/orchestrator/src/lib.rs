//! Job orchestrator: engine registry, execution, and campaign control.
//!
//! Jobs name an engine from the registry; the orchestrator optionally runs
//! pre-flight analysis, executes the engine (in-process or as a subprocess),
//! decodes whatever the engine produced, and post-processes the items into
//! a quality-scored result. Campaigns run many jobs under a concurrency
//! bound and aggregate the outcomes.

pub mod decode;
pub mod engine;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;

pub use engine::{Engine, EngineOutput};
pub use orchestrator::JobOrchestrator;
pub use registry::{EngineDescriptor, EngineKind, ScraperRegistry};
