pub mod builtin;
pub mod runner;
pub mod url;
