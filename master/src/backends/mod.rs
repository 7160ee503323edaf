//! Implementaciones locales de los colaboradores del pipeline.

pub mod exec;
pub mod jobs;
pub mod warehouse;

pub use exec::ShellExecChannel;
pub use jobs::LocalBatchJobService;
pub use warehouse::LocalWarehouse;
