use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, HashSet};

use super::{Check, Expectation, Probe};
use crate::config::{Config, ProbeFilter};
use crate::db::InitScript;

const INIT_JSON: &str = include_str!("../../sql/init_json.sql");
const INIT_TSVECTOR: &str = include_str!("../../sql/init_tsvector.sql");
const INIT_LTREE: &str = include_str!("../../sql/init_ltree.sql");
const INIT_HSTORE: &str = include_str!("../../sql/init_hstore.sql");

fn scalar(value: &str) -> Expectation {
    Expectation::Scalar {
        value: value.to_string(),
    }
}

fn contains_rows(values: &[&str]) -> Expectation {
    Expectation::ContainsRows {
        values: values.iter().map(|v| v.to_string()).collect(),
    }
}

fn hstore(contains: &[(&str, &str)], absent: &[&str]) -> Expectation {
    Expectation::Hstore {
        contains: contains
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        absent: absent.iter().map(|k| k.to_string()).collect(),
    }
}

/// Probes shipped with pgprobe
pub fn builtin_probes() -> Vec<Probe> {
    vec![
        Probe {
            name: "simple".to_string(),
            description: "Server accepts connections and answers a trivial query".to_string(),
            init_script: None,
            checks: vec![Check::new("SELECT 1", scalar("1"))],
        },
        Probe {
            name: "jsonb".to_string(),
            description: "jsonb storage and ->> field extraction".to_string(),
            init_script: Some(InitScript::builtin("init_json.sql", INIT_JSON)),
            checks: vec![Check::new(
                "SELECT data->>'title' FROM books WHERE data->>'author' = 'James Joyce'",
                scalar("Ulysses"),
            )],
        },
        Probe {
            name: "tsvector".to_string(),
            description: "Full-text search with tsvector @@ tsquery".to_string(),
            init_script: Some(InitScript::builtin("init_tsvector.sql", INIT_TSVECTOR)),
            checks: vec![
                Check::new(
                    "SELECT count(*) FROM words WHERE data @@ to_tsquery('get & done')",
                    Expectation::Truthy { value: true },
                ),
                Check::new(
                    "SELECT count(*) FROM words WHERE data @@ to_tsquery('get & let')",
                    Expectation::Truthy { value: false },
                ),
            ],
        },
        Probe {
            name: "ltree".to_string(),
            description: "ltree extension: descendant and lquery matching".to_string(),
            init_script: Some(InitScript::builtin("init_ltree.sql", INIT_LTREE)),
            checks: vec![
                Check::new(
                    "SELECT path FROM test WHERE path <@ 'Top.Science'",
                    contains_rows(&[
                        "Top.Science",
                        "Top.Science.Astronomy",
                        "Top.Science.Astronomy.Astrophysics",
                        "Top.Science.Astronomy.Cosmology",
                    ]),
                ),
                Check::new(
                    "SELECT path FROM test WHERE path ~ '*.!pictures@.*.Astronomy.*'",
                    contains_rows(&[
                        "Top.Science.Astronomy",
                        "Top.Science.Astronomy.Astrophysics",
                        "Top.Science.Astronomy.Cosmology",
                    ]),
                ),
            ],
        },
        Probe {
            name: "hstore".to_string(),
            description: "hstore extension: storage, delete() and || concatenation".to_string(),
            init_script: Some(InitScript::builtin("init_hstore.sql", INIT_HSTORE)),
            checks: vec![
                Check::new(
                    "SELECT data FROM dict",
                    hstore(&[("a", "1"), ("b", "2"), ("c", "3")], &[]),
                ),
                Check::new(
                    "SELECT delete(data, 'c') FROM dict",
                    hstore(&[("a", "1"), ("b", "2")], &["c"]),
                ),
                Check::new(
                    "SELECT data || hstore('d', '4') FROM dict",
                    hstore(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")], &[]),
                ),
            ],
        },
    ]
}

/// Builtin probes followed by the custom probes declared in the config
pub fn load_probes(config: &Config) -> Result<Vec<Probe>> {
    let mut probes = builtin_probes();
    let builtin_names: HashSet<String> = probes.iter().map(|p| p.name.clone()).collect();

    for custom in &config.probes.custom {
        if builtin_names.contains(&custom.name) {
            return Err(anyhow!(
                "Custom probe '{}' clashes with a builtin probe of the same name",
                custom.name
            ));
        }

        let init_script = custom
            .init_script
            .as_deref()
            .map(InitScript::from_file)
            .transpose()?;

        probes.push(Probe {
            name: custom.name.clone(),
            description: custom.description.clone(),
            init_script,
            checks: custom.checks.clone(),
        });
    }

    Ok(probes)
}

/// Apply the configured include/exclude patterns
///
/// An include pattern that matches no probe at all is reported as an error
/// rather than silently running nothing.
pub fn select_probes(probes: Vec<Probe>, config: &Config) -> Result<Vec<Probe>> {
    let filter = ProbeFilter::new(&config.probes);

    let unmatched = filter.unmatched_includes(probes.iter().map(|p| p.name.as_str()));
    if !unmatched.is_empty() {
        return Err(anyhow!(
            "No probe matches: {} (see `pgprobe list`)",
            unmatched.join(", ")
        ));
    }

    let selected: Vec<Probe> = probes
        .into_iter()
        .filter(|p| filter.should_run(&p.name))
        .collect();

    if selected.is_empty() {
        return Err(anyhow!("All probes were excluded; nothing to run"));
    }

    Ok(selected)
}
