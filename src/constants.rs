use std::time::Duration;

// Configuration file name
pub const CONFIG_FILENAME: &str = "pgprobe.yaml";

// Container defaults
pub const DEFAULT_IMAGE: &str = "postgres:10.14";
pub const DEFAULT_DATABASE: &str = "pgprobe";
pub const DEFAULT_USER: &str = "postgres";
pub const DEFAULT_PASSWORD: &str = "pgprobe";
pub const CONTAINER_NAME_PREFIX: &str = "pgprobe";
pub const POSTGRES_PORT: &str = "5432/tcp";

// Environment variables
pub const DATABASE_URL_ENV: &str = "PGPROBE_DATABASE_URL";
pub const KEEP_ON_FAILURE_ENV: &str = "PGPROBE_KEEP_CONTAINER_ON_FAILURE";

// Scratch databases created on an existing server
pub const SCRATCH_DATABASE_PREFIX: &str = "pgprobe";

// Teardown limits
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const SCRATCH_DROP_TIMEOUT: Duration = Duration::from_secs(5);
