pub mod error;
pub mod ingest;
pub mod quality;
pub mod reconcile;
pub mod transform;
