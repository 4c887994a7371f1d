//! Scraper engine registry.
//!
//! Engines are either native (run in-process) or external executables run
//! as subprocesses. Verification marks unavailable engines inactive but
//! keeps them listed, so a missing executable surfaces as a per-job error
//! instead of a silent disappearance.

use shared::config::{ExternalEngineConfig, OrchestratorConfig};
use std::path::Path;
use tracing::{info, warn};

/// How an engine is executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineKind {
    /// Runs inside this process
    Native,
    /// Spawned as a subprocess
    External { executable: String },
}

/// One registered engine
#[derive(Debug, Clone)]
pub struct EngineDescriptor {
    pub name: String,
    pub kind: EngineKind,
    /// Platforms the engine claims to handle (advisory)
    pub platforms: Vec<String>,
    /// Cleared when verification finds the engine unavailable
    pub active: bool,
}

/// Registry of every known engine, active or not
#[derive(Debug, Default)]
pub struct ScraperRegistry {
    engines: Vec<EngineDescriptor>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration: the native crawler plus any
    /// configured external engines.
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let mut registry = Self::new();
        registry.register_native("rabbithole", vec![]);
        for external in &config.external_engines {
            registry.register_external(external.clone());
        }
        registry
    }

    pub fn register_native(&mut self, name: &str, platforms: Vec<String>) {
        info!(engine = name, "Registered native engine");
        self.engines.push(EngineDescriptor {
            name: name.to_string(),
            kind: EngineKind::Native,
            platforms,
            active: true,
        });
    }

    pub fn register_external(&mut self, config: ExternalEngineConfig) {
        info!(
            engine = %config.name,
            executable = %config.executable,
            "Registered external engine"
        );
        self.engines.push(EngineDescriptor {
            name: config.name,
            kind: EngineKind::External {
                executable: config.executable,
            },
            platforms: config.platforms,
            active: true,
        });
    }

    /// Check every engine's availability. External engines need their
    /// executable on disk; native engines are always available. Returns
    /// the number of active engines.
    pub fn verify(&mut self) -> usize {
        for engine in &mut self.engines {
            engine.active = match &engine.kind {
                EngineKind::Native => true,
                EngineKind::External { executable } => {
                    let available = Path::new(executable).is_file();
                    if !available {
                        warn!(
                            engine = %engine.name,
                            executable = %executable,
                            "Engine executable not found, marking inactive"
                        );
                    }
                    available
                }
            };
        }

        self.engines.iter().filter(|e| e.active).count()
    }

    pub fn get(&self, name: &str) -> Option<&EngineDescriptor> {
        self.engines.iter().find(|e| e.name == name)
    }

    pub fn engines(&self) -> &[EngineDescriptor] {
        &self.engines
    }
}
