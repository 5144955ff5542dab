pub mod docker;
pub mod scratch;
