// Integration tests for pgprobe

pub mod cli;
pub mod component;
pub mod helpers;
pub mod probes;
