pub mod batch;
pub mod key;
pub mod reconciliation;
pub mod records;
