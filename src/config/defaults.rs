use crate::config::types::*;
use crate::constants::DEFAULT_IMAGE;
use std::collections::HashMap;

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            version: None, // Will use default image if not specified
            image: DEFAULT_IMAGE.to_string(),
            environment: HashMap::new(),
            container_name: None,
            auto_cleanup: true,
            keep_on_failure: false,
            reuse: false,
            ready_attempts: 30,
            ready_interval_ms: 1000,
        }
    }
}

impl Default for Probes {
    fn default() -> Self {
        Self {
            include: vec![],
            exclude: vec![],
            setup_scripts: vec![],
            fail_fast: false,
            query_timeout_secs: 30,
            custom: vec![],
        }
    }
}
