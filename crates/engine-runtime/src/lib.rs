pub mod error;
pub mod orchestrator;
pub mod settings;
pub mod workers;
