mod filter;

pub use filter::PluginFilter;

use crate::error::ConfigError;
use crate::models::RiskFactor;
use crate::output::CollisionPolicy;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "scandump.toml";

pub const DEFAULT_CONFIG_CONTENT: &str = r#"# scandump.toml

# Write <protocol>_plugin_outputs.txt evidence files next to the lists.
# If omitted, it defaults to true.
# plugin_outputs = true

# What to do when two plugins of the same risk factor map to the same
# directory name.
# Options: "overwrite" (share the directory, last additional_info wins),
#          "reject" (keep the first plugin only),
#          "namespace" (later plugins get <name>_<plugin_id>)
# If omitted, it defaults to "overwrite".
# collision_policy = "overwrite"

# Worker threads used to write plugin directories.
# 0 picks the number of available cores, 1 writes sequentially.
# jobs = 0

# Minimum risk factor of plugins to write.
# Options: "Critical", "High", "Medium", "Low", "None" (case-insensitive)
# If omitted, it defaults to "None" (write everything).
# min_risk = "None"

# Explicitly skip specific plugins by ID.
# exclude_plugins = ["19506", "10287"]
"#;

fn default_plugin_outputs() -> bool {
    true
}

fn deserialize_risk<'de, D>(deserializer: D) -> Result<RiskFactor, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    value.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_plugin_outputs")]
    pub plugin_outputs: bool,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    #[serde(default)]
    pub jobs: usize,
    #[serde(default, deserialize_with = "deserialize_risk")]
    pub min_risk: RiskFactor,
    #[serde(default)]
    pub exclude_plugins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            plugin_outputs: default_plugin_outputs(),
            collision_policy: CollisionPolicy::default(),
            jobs: 0,
            min_risk: RiskFactor::default(),
            exclude_plugins: Vec::new(),
        }
    }
}

impl Config {
    pub fn plugin_filter(&self) -> PluginFilter {
        PluginFilter::new(self.min_risk, &self.exclude_plugins)
    }

    /// Worker count with 0 resolved to the available parallelism.
    pub fn thread_count(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub plugin_outputs: Option<bool>,
    pub collision_policy: Option<String>,
    pub jobs: Option<usize>,
    pub min_risk: Option<String>,
    pub exclude_plugins: Option<Vec<String>>,
}

/// The explicit path, else `scandump.toml` in the working directory, else
/// the per-user config file, if any of them exists.
pub fn resolve_config_path(config_path: Option<PathBuf>) -> Option<PathBuf> {
    if config_path.is_some() {
        return config_path;
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("scandump").join("config.toml"))
        .filter(|path| path.exists())
}

pub fn read_config_file(config_path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    toml::from_str::<Config>(&content).map_err(|source| ConfigError::Parse {
        path: config_path.to_path_buf(),
        source,
    })
}

pub fn load_config(
    config_path: Option<PathBuf>,
    overrides: ConfigOverrides,
) -> Result<Config, ConfigError> {
    let config = match resolve_config_path(config_path) {
        Some(path) => read_config_file(&path)?,
        None => Config::default(),
    };

    // CLI exclusions extend the config file list
    let exclude_plugins = {
        let mut from_config = config.exclude_plugins.clone();
        if let Some(cli_exclusions) = overrides.exclude_plugins {
            for id in cli_exclusions {
                if !from_config.contains(&id) {
                    from_config.push(id);
                }
            }
        }
        from_config
    };

    let collision_policy = match overrides.collision_policy {
        Some(s) => s.parse().map_err(|message| ConfigError::InvalidValue {
            key: "collision_policy",
            message,
        })?,
        None => config.collision_policy,
    };

    let min_risk = match overrides.min_risk {
        Some(s) => s.parse().map_err(|message| ConfigError::InvalidValue {
            key: "min_risk",
            message,
        })?,
        None => config.min_risk,
    };

    Ok(Config {
        plugin_outputs: overrides.plugin_outputs.unwrap_or(config.plugin_outputs),
        collision_policy,
        jobs: overrides.jobs.unwrap_or(config.jobs),
        min_risk,
        exclude_plugins,
    })
}

pub fn initialize_config_file(config_path_override: Option<&Path>) -> Result<(), String> {
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    let config_path = config_path_override.unwrap_or(default_path);

    if config_path.exists() {
        println!("INFO: '{}' already exists.", config_path.display());
        return Ok(());
    }

    println!(
        "Creating default config file at '{}'",
        config_path.display()
    );
    let mut file = fs::File::create(config_path)
        .map_err(|e| format!("Error creating '{}': {}", config_path.display(), e))?;
    file.write_all(DEFAULT_CONFIG_CONTENT.as_bytes())
        .map_err(|e| format!("Error writing to '{}': {}", config_path.display(), e))?;
    println!(
        "SUCCESS: Created default '{}' configuration file.",
        config_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_content_parses_to_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_CONTENT).unwrap();
        assert!(config.plugin_outputs);
        assert_eq!(config.collision_policy, CollisionPolicy::Overwrite);
        assert_eq!(config.jobs, 0);
        assert_eq!(config.min_risk, RiskFactor::None);
        assert!(config.exclude_plugins.is_empty());
    }

    #[test]
    fn test_file_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            "plugin_outputs = false\ncollision_policy = \"namespace\"\njobs = 4\nmin_risk = \"medium\"\nexclude_plugins = [\"19506\"]\n",
        );

        let config = load_config(Some(path), ConfigOverrides::default()).unwrap();
        assert!(!config.plugin_outputs);
        assert_eq!(config.collision_policy, CollisionPolicy::Namespace);
        assert_eq!(config.thread_count(), 4);
        assert_eq!(config.min_risk, RiskFactor::Medium);
        assert_eq!(config.exclude_plugins, vec!["19506"]);
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            "collision_policy = \"reject\"\nexclude_plugins = [\"19506\"]\n",
        );

        let overrides = ConfigOverrides {
            plugin_outputs: Some(false),
            collision_policy: Some("namespace".to_string()),
            jobs: Some(1),
            min_risk: Some("HIGH".to_string()),
            exclude_plugins: Some(vec!["10287".to_string(), "19506".to_string()]),
        };
        let config = load_config(Some(path), overrides).unwrap();
        assert!(!config.plugin_outputs);
        assert_eq!(config.collision_policy, CollisionPolicy::Namespace);
        assert_eq!(config.jobs, 1);
        assert_eq!(config.min_risk, RiskFactor::High);
        assert_eq!(config.exclude_plugins, vec!["19506", "10287"]);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "min_risk = \"severe\"\n");
        assert!(matches!(
            load_config(Some(path.clone()), ConfigOverrides::default()),
            Err(ConfigError::Parse { .. })
        ));

        fs::write(&path, "").unwrap();
        let overrides = ConfigOverrides {
            collision_policy: Some("skip".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            load_config(Some(path), overrides),
            Err(ConfigError::InvalidValue { key: "collision_policy", .. })
        ));
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nope.toml");
        assert!(matches!(
            load_config(Some(path), ConfigOverrides::default()),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_initialize_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        initialize_config_file(Some(&path)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG_CONTENT);

        fs::write(&path, "jobs = 2\n").unwrap();
        initialize_config_file(Some(&path)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "jobs = 2\n");
    }
}
