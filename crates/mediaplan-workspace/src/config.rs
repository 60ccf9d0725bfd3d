//! Toolkit configuration.
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML or
//! JSON file, then `MEDIAPLAN__*` environment variables
//! (`MEDIAPLAN__WORKSPACE__ROOT=/data/plans`).

use std::path::PathBuf;
use std::sync::Arc;

use mediaplan_schema::{BundledSchemaRegistry, SchemaRegistry};
use mediaplan_types::Version;
use serde::{Deserialize, Serialize};

use crate::error::{WorkspaceError, WorkspaceResult};

/// Main toolkit configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolkitConfig {
    /// Schema versions
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Workspace location and upgrade behavior
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Version new and upgraded plans are written in
    #[serde(default = "default_current_version")]
    pub current_version: String,

    /// Major versions plans may be read from
    #[serde(default = "default_supported_majors")]
    pub supported_majors: Vec<u32>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            current_version: default_current_version(),
            supported_majors: default_supported_majors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace root directory
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Plan directory, relative to the root
    #[serde(default = "default_plans_dir")]
    pub plans_dir: String,

    /// Back up plan files before upgrading them
    #[serde(default = "default_true")]
    pub backup: bool,

    /// Backup directory, relative to the root
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            plans_dir: default_plans_dir(),
            backup: true,
            backup_dir: default_backup_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_current_version() -> String {
    "3.0".to_string()
}

fn default_supported_majors() -> Vec<u32> {
    vec![2, 3]
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_plans_dir() -> String {
    "mediaplans".to_string()
}

fn default_backup_dir() -> String {
    "backups".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl ToolkitConfig {
    /// Load configuration, optionally from a file.
    pub fn load(path: Option<&str>) -> WorkspaceResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ToolkitConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MEDIAPLAN")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("schema.supported_majors")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.current_version()?;
        Ok(config)
    }

    pub fn current_version(&self) -> WorkspaceResult<Version> {
        Version::parse(&self.schema.current_version).map_err(|e| {
            WorkspaceError::InvalidConfig(format!("schema.current_version: {e}"))
        })
    }

    /// Schema registry restricted to the configured versions.
    pub fn registry(&self) -> WorkspaceResult<Arc<dyn SchemaRegistry>> {
        let registry = BundledSchemaRegistry::with_versions(
            self.current_version()?,
            self.schema.supported_majors.iter().copied(),
        );
        if registry.supported_versions().is_empty() {
            return Err(WorkspaceError::InvalidConfig(format!(
                "schema.supported_majors {:?} names no bundled schema",
                self.schema.supported_majors
            )));
        }
        Ok(Arc::new(registry))
    }

    pub fn plans_path(&self) -> PathBuf {
        self.workspace.root.join(&self.workspace.plans_dir)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.workspace.root.join(&self.workspace.backup_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ToolkitConfig::default();
        assert_eq!(config.schema.current_version, "3.0");
        assert_eq!(config.schema.supported_majors, vec![2, 3]);
        assert!(config.workspace.backup);
        assert_eq!(config.plans_path(), PathBuf::from("./mediaplans"));
        assert!(!config.logging.json);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[workspace]\nroot = \"/srv/plans\"\nbackup = false\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = ToolkitConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.workspace.root, PathBuf::from("/srv/plans"));
        assert!(!config.workspace.backup);
        assert_eq!(config.workspace.backup_dir, "backups");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.schema.current_version, "3.0");
    }

    #[test]
    fn test_registry_from_config() {
        let registry = ToolkitConfig::default().registry().unwrap();
        assert_eq!(registry.current_version(), Version::new(3, 0));
        assert!(registry.is_version_supported("2.0"));

        let mut narrowed = ToolkitConfig::default();
        narrowed.schema.supported_majors = vec![3];
        assert!(!narrowed.registry().unwrap().is_version_supported("2.0"));

        narrowed.schema.supported_majors = vec![9];
        assert!(matches!(narrowed.registry(), Err(WorkspaceError::InvalidConfig(_))));

        narrowed.schema.current_version = "three".into();
        assert!(narrowed.current_version().is_err());
    }
}
