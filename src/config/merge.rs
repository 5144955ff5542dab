use crate::config::types::*;

/// Trait for merging optional configuration values
pub trait Merge<T> {
    fn merge(self, other: T) -> T;
}

impl<T> Merge<Option<T>> for Option<T> {
    fn merge(self, other: Option<T>) -> Option<T> {
        other.or(self)
    }
}

impl Merge<ConfigInput> for ConfigInput {
    fn merge(self, other: ConfigInput) -> ConfigInput {
        ConfigInput {
            target: match (self.target, other.target) {
                (Some(a), Some(b)) => Some(a.merge_with(b)),
                (a, b) => b.or(a),
            },
            container: match (self.container, other.container) {
                (Some(a), Some(b)) => Some(a.merge_with(b)),
                (a, b) => b.or(a),
            },
            probes: match (self.probes, other.probes) {
                (Some(a), Some(b)) => Some(a.merge_with(b)),
                (a, b) => b.or(a),
            },
            output: match (self.output, other.output) {
                (Some(a), Some(b)) => Some(OutputInput {
                    format: a.format.merge(b.format),
                }),
                (a, b) => b.or(a),
            },
        }
    }
}

impl TargetInput {
    pub fn merge_with(self, other: TargetInput) -> TargetInput {
        TargetInput {
            database_url: other.database_url.or(self.database_url),
        }
    }
}

impl ContainerInput {
    pub fn merge_with(self, other: ContainerInput) -> ContainerInput {
        ContainerInput {
            version: other.version.or(self.version),
            image: other.image.or(self.image),
            environment: match (self.environment, other.environment) {
                // Environment maps combine, later layer wins per key
                (Some(mut a), Some(b)) => {
                    a.extend(b);
                    Some(a)
                }
                (a, b) => b.or(a),
            },
            container_name: other.container_name.or(self.container_name),
            auto_cleanup: other.auto_cleanup.or(self.auto_cleanup),
            keep_on_failure: other.keep_on_failure.or(self.keep_on_failure),
            reuse: other.reuse.or(self.reuse),
            ready_attempts: other.ready_attempts.or(self.ready_attempts),
            ready_interval_ms: other.ready_interval_ms.or(self.ready_interval_ms),
        }
    }
}

impl ProbesInput {
    pub fn merge_with(self, other: ProbesInput) -> ProbesInput {
        ProbesInput {
            include: other.include.or(self.include),
            exclude: other.exclude.or(self.exclude),
            setup_scripts: other.setup_scripts.or(self.setup_scripts),
            fail_fast: other.fail_fast.or(self.fail_fast),
            query_timeout_secs: other.query_timeout_secs.or(self.query_timeout_secs),
            custom: other.custom.or(self.custom),
        }
    }
}
