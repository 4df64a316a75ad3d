//! YAML configuration for query groups.
//!
//! A configuration file maps group names to a [`GroupSpec`]. Every group is
//! validated on load so that the engine never has to re-check the constraints.

use model::{GroupName, GroupSpec};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml file error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("configuration defines no query groups")]
    NoGroups,

    #[error("group {group} requires more than 0 concurrency")]
    ZeroConcurrency { group: GroupName },

    #[error("group {group} has concurrency {concurrency} greater than length of targets {targets}")]
    ConcurrencyExceedsTargets {
        group: GroupName,
        concurrency: usize,
        targets: usize,
    },

    #[error("group {group} requires 1 or more iterations")]
    ZeroIterations { group: GroupName },

    #[error("group {group} has no statements defined")]
    NoStatements { group: GroupName },
}

impl ConfigError {
    /// Name of the offending group, if the error concerns a single group.
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::ZeroConcurrency { group }
            | Self::ConcurrencyExceedsTargets { group, .. }
            | Self::ZeroIterations { group }
            | Self::NoStatements { group } => Some(group),
            _ => None,
        }
    }
}

/// Validated set of query groups, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Config {
    groups: BTreeMap<GroupName, GroupSpec>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Err(ConfigError::NoGroups);
        }
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from already constructed group specifications.
    pub fn from_groups<I>(groups: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (GroupName, GroupSpec)>,
    {
        let config = Self {
            groups: groups.into_iter().collect(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::NoGroups);
        }
        self.groups
            .iter()
            .try_for_each(|(name, spec)| validate_group(name, spec))
    }

    pub fn groups(&self) -> impl Iterator<Item = (&GroupName, &GroupSpec)> {
        self.groups.iter()
    }

    pub fn get(&self, name: &str) -> Option<&GroupSpec> {
        self.groups.get(name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl IntoIterator for Config {
    type Item = (GroupName, GroupSpec);
    type IntoIter = std::collections::btree_map::IntoIter<GroupName, GroupSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

fn validate_group(name: &str, spec: &GroupSpec) -> Result<(), ConfigError> {
    let group = || name.to_owned();
    if spec.concurrency == 0 {
        return Err(ConfigError::ZeroConcurrency { group: group() });
    }
    if spec.concurrency > spec.targets.len() {
        return Err(ConfigError::ConcurrencyExceedsTargets {
            group: group(),
            concurrency: spec.concurrency,
            targets: spec.targets.len(),
        });
    }
    if spec.iterations == 0 {
        return Err(ConfigError::ZeroIterations { group: group() });
    }
    if spec.statements.is_empty() {
        return Err(ConfigError::NoStatements { group: group() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::testing::{arb_group_spec, arb_invalid_group_spec};
    use proptest::prelude::*;

    const VALID: &str = r#"
---
type1:
  databases:
    - db_type1_1
    - db_type1_2
    - db_type1_3
  concurrency: 3
  iterations: 3
  queries:
    - select * from function()
    - select 1
    - select pg_sleep(5)
"#;

    #[test]
    fn test_load_valid_config() {
        let config = Config::from_yaml(VALID).expect("Config should be valid");
        let type1 = config.get("type1").expect("type1 group should exist");

        assert_eq!(config.len(), 1);
        assert_eq!(type1.targets.len(), 3);
        assert_eq!(type1.statements.len(), 3);
        assert_eq!(type1.concurrency, 3);
        assert_eq!(type1.iterations, 3);
    }

    #[test]
    fn test_concurrency_exceeds_targets() {
        let yaml = r#"
typeerror:
  databases: [db_type1_1, db_type1_2, db_type1_3]
  concurrency: 4
  iterations: 3
  queries: [select 1]
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ConcurrencyExceedsTargets { concurrency: 4, targets: 3, .. }
        ));
        assert!(err.to_string().contains("concurrency"));
        assert_eq!(err.group(), Some("typeerror"));
    }

    #[test]
    fn test_missing_statements() {
        let yaml = r#"
typeerror:
  databases: [db_type1_1, db_type1_2, db_type1_3]
  concurrency: 3
  iterations: 3
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::NoStatements { ref group } if group == "typeerror"));
        assert!(err.to_string().contains("statements"));
    }

    #[test]
    fn test_zero_concurrency_and_iterations() {
        let zero_concurrency = "g:\n  targets: [a]\n  concurrency: 0\n  iterations: 1\n  statements: [select 1]\n";
        assert!(matches!(
            Config::from_yaml(zero_concurrency),
            Err(ConfigError::ZeroConcurrency { .. })
        ));

        let zero_iterations = "g:\n  targets: [a]\n  concurrency: 1\n  iterations: 0\n  statements: [select 1]\n";
        assert!(matches!(
            Config::from_yaml(zero_iterations),
            Err(ConfigError::ZeroIterations { .. })
        ));
    }

    #[test]
    fn test_empty_targets_rejected() {
        let yaml = "g:\n  targets: []\n  concurrency: 1\n  iterations: 1\n  statements: [select 1]\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::ConcurrencyExceedsTargets { targets: 0, .. })
        ));
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(Config::from_yaml(""), Err(ConfigError::NoGroups)));
        assert!(matches!(Config::from_yaml("---\n{}\n"), Err(ConfigError::NoGroups)));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = Config::from_yaml("g: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert_eq!(err.group(), None);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, VALID).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config, Config::from_yaml(VALID).unwrap());
    }

    #[test]
    fn test_groups_are_name_ordered() {
        let yaml = r#"
zeta: {targets: [a], concurrency: 1, iterations: 1, statements: [select 1]}
alpha: {targets: [b], concurrency: 1, iterations: 1, statements: [select 1]}
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let names: Vec<_> = config.groups().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    proptest! {
        #[test]
        fn prop_valid_specs_accepted(spec in arb_group_spec()) {
            let config = Config::from_groups([("g".to_string(), spec.clone())]);
            prop_assert!(config.is_ok());
            let config = config.unwrap();
            prop_assert_eq!(config.get("g"), Some(&spec));
        }

        #[test]
        fn prop_invalid_specs_rejected_with_group_name(spec in arb_invalid_group_spec()) {
            let err = Config::from_groups([
                ("ok".to_string(), GroupSpec::new(vec!["a".into()], vec!["select 1".into()])),
                ("broken".to_string(), spec),
            ])
            .unwrap_err();
            prop_assert_eq!(err.group(), Some("broken"));
            prop_assert!(err.to_string().contains("broken"));
        }
    }
}
