//! File and environment configuration
//!
//! Sources, later ones winning:
//! 1. a TOML file (`--config`, `SANDBOX_CONFIG_PATH`, or `./sandbox.toml`
//!    when present)
//! 2. `SANDBOX_*` environment variables (`SANDBOX_EXECUTION_QUOTA=5000`,
//!    `SANDBOX_GLOBALS=Math,JSON`)
//!
//! Host callbacks cannot come from a file; attach them to the
//! [`SandboxOptions`] returned by [`SandboxConfig::into_options`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use crate::executor::security::AuditReport;
use crate::executor::stdlib;
use crate::executor::types::TypeTag;
use crate::sandbox::SandboxOptions;

const ENV_PREFIX: &str = "SANDBOX";
const DEFAULT_CONFIG_FILE: &str = "sandbox.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("unknown type \"{0}\" in prototype_whitelist")]
    UnknownType(String),

    #[error("unknown global \"{0}\"")]
    UnknownGlobal(String),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Serializable sandbox settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub audit: bool,
    pub forbid_function_calls: bool,
    pub forbid_function_creation: bool,
    pub halt_on_sandbox_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_quota: Option<u64>,
    /// Names kept from the default globals; all of them when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub globals: Option<Vec<String>>,
    /// Type name to member names; an empty list allows the whole type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prototype_whitelist: Option<BTreeMap<String, Vec<String>>>,
}

impl SandboxConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().load()
    }

    /// Least-privilege configuration that still permits what an audit saw
    pub fn from_audit(report: &AuditReport) -> Self {
        let known: BTreeSet<&str> = stdlib::default_global_names().into_iter().collect();
        let globals = report
            .globals
            .iter()
            .filter(|name| known.contains(name.as_str()))
            .cloned()
            .collect();
        let prototype_whitelist = report
            .prototype_access
            .iter()
            .map(|(ty, members)| (ty.clone(), members.iter().cloned().collect()))
            .collect();
        SandboxConfig {
            globals: Some(globals),
            prototype_whitelist: Some(prototype_whitelist),
            ..SandboxConfig::default()
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn into_options(self) -> Result<SandboxOptions, ConfigError> {
        let mut options = SandboxOptions {
            audit: self.audit,
            forbid_function_calls: self.forbid_function_calls,
            forbid_function_creation: self.forbid_function_creation,
            halt_on_sandbox_error: self.halt_on_sandbox_error,
            execution_quota: self.execution_quota,
            ..SandboxOptions::default()
        };
        if let Some(globals) = self.globals {
            let known = stdlib::default_global_names();
            if let Some(unknown) = globals.iter().find(|g| !known.contains(&g.as_str())) {
                return Err(ConfigError::UnknownGlobal(unknown.clone()));
            }
            options.globals = Some(globals.into_iter().collect());
        }
        if let Some(whitelist) = self.prototype_whitelist {
            let mut map = HashMap::new();
            for (name, members) in whitelist {
                let tag = TypeTag::from_name(&name).ok_or(ConfigError::UnknownType(name))?;
                map.insert(tag, members.into_iter().collect());
            }
            options.prototype_whitelist = map;
        }
        Ok(options)
    }
}

/// Builder for loading a [`SandboxConfig`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Set the config file path (overrides default search)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore `SANDBOX_*` environment variables
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn load(self) -> Result<SandboxConfig, ConfigError> {
        let explicit = self
            .config_path
            .or_else(|| std::env::var_os("SANDBOX_CONFIG_PATH").map(PathBuf::from));
        let (path, required) = match explicit {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut builder = config::Config::builder().add_source(
            config::File::new(&path.to_string_lossy(), config::FileFormat::Toml)
                .required(required),
        );
        if !self.skip_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("globals"),
            );
        }
        let config: SandboxConfig = builder.build()?.try_deserialize()?;
        tracing::debug!(path = %path.display(), required, "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sandbox-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_from_file() {
        let path = write_temp(
            r#"
            forbid_function_creation = true
            execution_quota = 500
            globals = ["Math", "JSON"]

            [prototype_whitelist]
            Array = ["push", "map"]
            String = []
            "#,
        );
        let config = SandboxConfig::builder()
            .config_path(Some(path.clone()))
            .skip_env(true)
            .load()
            .unwrap();
        std::fs::remove_file(path).unwrap();

        assert!(config.forbid_function_creation);
        assert_eq!(config.execution_quota, Some(500));
        let options = config.into_options().unwrap();
        assert_eq!(options.globals.as_ref().map(|g| g.len()), Some(2));
        assert_eq!(options.prototype_whitelist.len(), 2);
        assert!(options.prototype_whitelist[&TypeTag::String].is_empty());
        assert!(options.prototype_whitelist[&TypeTag::Array].contains("map"));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = SandboxConfig::builder()
            .config_path(Some(PathBuf::from("/nonexistent/sandbox.toml")))
            .skip_env(true)
            .load();
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_unknown_names_rejected() {
        let config = SandboxConfig {
            prototype_whitelist: Some(BTreeMap::from([("Widget".to_string(), vec![])])),
            ..SandboxConfig::default()
        };
        assert!(matches!(config.into_options(), Err(ConfigError::UnknownType(t)) if t == "Widget"));

        let config = SandboxConfig {
            globals: Some(vec!["process".to_string()]),
            ..SandboxConfig::default()
        };
        assert!(matches!(config.into_options(), Err(ConfigError::UnknownGlobal(_))));
    }

    #[test]
    fn test_from_audit_round_trips_through_toml() {
        let mut report = AuditReport::default();
        report.record_global("Math");
        report.record_global("seedValue");
        report.record_member(TypeTag::Array, "push");
        report.record_member(TypeTag::RegExp, "test");

        let config = SandboxConfig::from_audit(&report);
        assert_eq!(config.globals, Some(vec!["Math".to_string()]));

        let path = write_temp(&config.to_toml().unwrap());
        let loaded = SandboxConfig::builder()
            .config_path(Some(path.clone()))
            .skip_env(true)
            .load()
            .unwrap();
        std::fs::remove_file(path).unwrap();

        let expected = config.into_options().unwrap();
        let options = loaded.into_options().unwrap();
        assert_eq!(options.globals, expected.globals);
        assert_eq!(options.prototype_whitelist, expected.prototype_whitelist);
        assert!(options.prototype_whitelist[&TypeTag::RegExp].contains("test"));
    }

    #[test]
    fn test_type_names_match_any_case() {
        assert_eq!(TypeTag::from_name("array"), Some(TypeTag::Array));
        assert_eq!(TypeTag::from_name("BIGINT"), Some(TypeTag::BigInt));
        assert_eq!(TypeTag::from_name("regexp"), Some(TypeTag::RegExp));
        assert_eq!(TypeTag::from_name("Widget"), None);
    }
}
