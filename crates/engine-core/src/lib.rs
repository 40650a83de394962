pub mod error;
pub mod lease;
pub mod retry;
pub mod state;
