pub mod config;
pub mod list;
pub mod run;

pub use config::cmd_config;
pub use list::cmd_list;
pub use run::cmd_run;
