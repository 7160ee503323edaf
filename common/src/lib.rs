//! Núcleo del pipeline de recolección y enriquecimiento: modelo de datos,
//! contratos de colaboradores, grafo de tareas y su orquestación.

pub mod annotate;
pub mod artifact;
pub mod assign;
pub mod cleanup;
pub mod collector;
pub mod config;
pub mod dag;
pub mod engine;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod programs;
pub mod runner;
pub mod services;
pub mod stages;
pub mod status;
pub mod store;
pub mod task;
pub mod window;
pub mod worker;

pub use artifact::{Artifact, StorageClass};
pub use assign::WorkAssigner;
pub use cleanup::CleanupNormalizer;
pub use collector::IncrementalCollector;
pub use config::{PipelineConfig, RunContext};
pub use dag::PipelineGraph;
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use runner::IdempotentJobRunner;
pub use status::RunBoard;
pub use window::Window;
