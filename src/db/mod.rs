pub mod connection;
pub mod error_context;
pub mod scratch;
pub mod script;

pub use connection::{connect_to_database, connect_with_retry, mask_url_password};
pub use scratch::{
    ScratchDatabase, cleanup_all_scratch_databases, registered_scratch_databases,
};
pub use script::InitScript;
