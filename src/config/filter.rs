use crate::config::types::Probes;
use glob::Pattern;

/// Decides which probes a run should execute
pub struct ProbeFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ProbeFilter {
    pub fn new(config: &Probes) -> Self {
        Self {
            include: config.include.clone(),
            exclude: config.exclude.clone(),
        }
    }

    /// Check if a probe should run
    pub fn should_run(&self, probe_name: &str) -> bool {
        // Check exclude patterns first
        if self.matches_patterns(&self.exclude, probe_name) {
            return false;
        }

        // If include patterns are specified, the probe must match one of them
        if !self.include.is_empty() {
            return self.matches_patterns(&self.include, probe_name);
        }

        true
    }

    /// Include patterns that match none of the given probe names
    pub fn unmatched_includes<'a>(&self, names: impl IntoIterator<Item = &'a str> + Clone) -> Vec<String> {
        self.include
            .iter()
            .filter(|pattern| {
                !names
                    .clone()
                    .into_iter()
                    .any(|name| self.matches_patterns(std::slice::from_ref(*pattern), name))
            })
            .cloned()
            .collect()
    }

    fn matches_patterns(&self, patterns: &[String], name: &str) -> bool {
        if patterns.is_empty() {
            return false;
        }

        patterns.iter().any(|pattern| {
            Pattern::new(pattern)
                .map(|p| p.matches(name))
                .unwrap_or(false)
        })
    }
}
