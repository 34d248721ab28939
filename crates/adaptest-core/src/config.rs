//! Configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::estimator::{EstimatorConfig, StopRule};
use crate::session::SessionServiceConfig;
use crate::simulation::SimulationConfig;

/// Top-level adaptest configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptestConfig {
    /// Newton solver settings.
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// Stopping-rule thresholds.
    #[serde(default)]
    pub stopping: StopRule,
    /// Simulation defaults.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl AdaptestConfig {
    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.estimator.validate().context("invalid [estimator] section")?;
        self.stopping.validate().context("invalid [stopping] section")?;
        Ok(())
    }

    /// Settings for an [`AdaptiveTestService`](crate::session::AdaptiveTestService).
    pub fn service_config(&self) -> SessionServiceConfig {
        SessionServiceConfig {
            estimator: self.estimator,
            stop_rule: self.stopping,
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment variable overrides: `ADAPTEST_SE_THRESHOLD`,
/// `ADAPTEST_MAX_RESPONSES`, `ADAPTEST_MAX_ITERATIONS`.
pub fn load_config() -> Result<AdaptestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("adaptest.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            parse_config(&path)?
        }
        None => AdaptestConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

fn parse_config(path: &Path) -> Result<AdaptestConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<AdaptestConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

/// Apply `ADAPTEST_*` overrides read through `var`.
fn apply_env_overrides<F>(config: &mut AdaptestConfig, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = var("ADAPTEST_SE_THRESHOLD") {
        config.stopping.se_threshold = v
            .trim()
            .parse()
            .with_context(|| format!("invalid ADAPTEST_SE_THRESHOLD: {v}"))?;
    }
    if let Some(v) = var("ADAPTEST_MAX_RESPONSES") {
        config.stopping.max_responses = v
            .trim()
            .parse()
            .with_context(|| format!("invalid ADAPTEST_MAX_RESPONSES: {v}"))?;
    }
    if let Some(v) = var("ADAPTEST_MAX_ITERATIONS") {
        config.estimator.max_iterations = v
            .trim()
            .parse()
            .with_context(|| format!("invalid ADAPTEST_MAX_ITERATIONS: {v}"))?;
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}

/// Contents written by `adaptest init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# adaptest configuration

[estimator]
max_iterations = 50
convergence_threshold = 0.001
min_theta = -3.0
max_theta = 3.0

[stopping]
se_threshold = 0.3
max_responses = 30

[simulation]
replications = 100
seed = 42
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config() {
        let config = AdaptestConfig::default();
        assert_eq!(config.estimator.max_iterations, 50);
        assert_eq!(config.estimator.convergence_threshold, 0.001);
        assert_eq!(config.stopping.se_threshold, 0.3);
        assert_eq!(config.stopping.max_responses, 30);
        assert_eq!(config.simulation.replications, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_toml_matches_defaults() {
        let parsed: AdaptestConfig = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(parsed, AdaptestConfig::default());
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let config: AdaptestConfig = toml::from_str(
            r#"
[stopping]
max_responses = 12
"#,
        )
        .unwrap();
        assert_eq!(config.stopping.max_responses, 12);
        assert_eq!(config.stopping.se_threshold, 0.3);
        assert_eq!(config.estimator.max_theta, 3.0);
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[stopping]\nse_threshold = 0.25\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.stopping.se_threshold, 0.25);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/adaptest.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AdaptestConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("ADAPTEST_SE_THRESHOLD", "0.2"),
                ("ADAPTEST_MAX_RESPONSES", " 15 "),
                ("ADAPTEST_MAX_ITERATIONS", "100"),
            ]),
        )
        .unwrap();
        assert_eq!(config.stopping.se_threshold, 0.2);
        assert_eq!(config.stopping.max_responses, 15);
        assert_eq!(config.estimator.max_iterations, 100);
    }

    #[test]
    fn invalid_env_override_is_an_error() {
        let mut config = AdaptestConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("ADAPTEST_MAX_RESPONSES", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("ADAPTEST_MAX_RESPONSES"));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AdaptestConfig::default();
        config.estimator.min_theta = 3.0;
        assert!(config.validate().is_err());

        let mut config = AdaptestConfig::default();
        config.stopping.max_responses = 0;
        assert!(config.validate().is_err());

        let mut config = AdaptestConfig::default();
        config.estimator.convergence_threshold = 0.0;
        assert!(config.validate().is_err());
    }
}
