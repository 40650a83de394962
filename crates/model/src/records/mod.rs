pub mod source;
pub mod staged;
