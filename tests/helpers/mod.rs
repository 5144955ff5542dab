pub mod cli;
pub mod docker;
