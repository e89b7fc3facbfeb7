//! Layered configuration
//!
//! Values are read, lowest priority first, from the user config file, the
//! project's `.tplm/config.yaml` and the environment (`TPLM_USER`,
//! `TPLM_FILTER`). Command-line flags override all of them.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::core::project::Project;

/// Effective configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User name recorded as author and used as the WIP viewer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Filter selector used when `--filter` is not given
    pub default_filter: String,

    /// Tree depth when `--depth` is not given; -1 means unlimited
    pub default_depth: i32,

    /// List substitutes next to their usage links by default
    pub diverge: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: None,
            default_filter: "wip".to_string(),
            default_depth: -1,
            diverge: false,
        }
    }
}

/// One configuration source; absent keys leave lower layers untouched
#[derive(Debug, Default, Deserialize)]
struct ConfigLayer {
    user: Option<String>,
    default_filter: Option<String>,
    default_depth: Option<i32>,
    diverge: Option<bool>,
}

impl Config {
    /// Load all layers for the project containing the current directory
    pub fn load() -> Self {
        let project_file = Project::discover().ok().map(|p| p.config_file());
        Self::load_layers(
            Self::user_config_file().as_deref(),
            project_file.as_deref(),
            |name| std::env::var(name).ok(),
        )
    }

    /// Load from explicit files and an environment lookup
    pub fn load_layers<F>(user_file: Option<&Path>, project_file: Option<&Path>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        for file in [user_file, project_file].into_iter().flatten() {
            if let Some(layer) = read_layer(file) {
                config.apply(layer);
            }
        }
        config.apply(ConfigLayer {
            user: env("TPLM_USER").filter(|s| !s.trim().is_empty()),
            default_filter: env("TPLM_FILTER").filter(|s| !s.trim().is_empty()),
            ..Default::default()
        });
        config
    }

    fn apply(&mut self, layer: ConfigLayer) {
        if let Some(user) = layer.user {
            self.user = Some(user);
        }
        if let Some(filter) = layer.default_filter {
            self.default_filter = filter;
        }
        if let Some(depth) = layer.default_depth {
            self.default_depth = depth;
        }
        if let Some(diverge) = layer.diverge {
            self.diverge = diverge;
        }
    }

    /// `<config dir>/tplm/config.yaml`, if the platform has a config dir
    pub fn user_config_file() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tplm").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Configured user, falling back to the login name
    pub fn user(&self) -> String {
        self.user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Depth limit for traversals; negative values mean unlimited
    pub fn max_depth(depth: i32) -> Option<usize> {
        usize::try_from(depth).ok()
    }
}

fn read_layer(path: &Path) -> Option<ConfigLayer> {
    let content = fs::read_to_string(path).ok()?;
    if content.trim().is_empty() {
        return None;
    }
    match serde_yml::from_str(&content) {
        Ok(layer) => Some(layer),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "ignoring unreadable config file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_layers(None, None, no_env);
        assert_eq!(config, Config::default());
        assert_eq!(Config::max_depth(config.default_depth), None);
        assert_eq!(Config::max_depth(2), Some(2));
    }

    #[test]
    fn test_project_overrides_user_file() {
        let tmp = TempDir::new().unwrap();
        let user_file = tmp.path().join("user.yaml");
        let project_file = tmp.path().join("project.yaml");
        fs::write(&user_file, "user: alice\ndefault_filter: latest\ndefault_depth: 3\n").unwrap();
        fs::write(&project_file, "default_filter: released\n").unwrap();

        let config = Config::load_layers(Some(&user_file), Some(&project_file), no_env);
        assert_eq!(config.user.as_deref(), Some("alice"));
        assert_eq!(config.default_filter, "released");
        assert_eq!(config.default_depth, 3);
    }

    #[test]
    fn test_environment_wins() {
        let tmp = TempDir::new().unwrap();
        let project_file = tmp.path().join("project.yaml");
        fs::write(&project_file, "user: alice\n").unwrap();

        let config = Config::load_layers(None, Some(&project_file), |name| match name {
            "TPLM_USER" => Some("bob".to_string()),
            "TPLM_FILTER" => Some("latest-released".to_string()),
            _ => None,
        });
        assert_eq!(config.user(), "bob");
        assert_eq!(config.default_filter, "latest-released");
    }

    #[test]
    fn test_broken_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("broken.yaml");
        fs::write(&file, "default_depth: [not, a, number\n").unwrap();
        let config = Config::load_layers(Some(&file), None, no_env);
        assert_eq!(config, Config::default());
    }
}
