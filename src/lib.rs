pub mod commands;
pub mod config;
pub mod constants;
pub mod db;
pub mod docker;
pub mod probe;
pub mod report;
