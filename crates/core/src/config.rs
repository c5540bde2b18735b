use serde::{Deserialize, Serialize};

/// Process-level settings, loaded once at startup. The mutable, hot-editable
/// state (credential pool, trigger key, fallback, retry budget) lives in
/// [`crate::store::ConfigStore`] instead, since it can change without a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub log_to_file: bool,
    pub log_dir: Option<String>,
    pub default_retry_budget: u32,
    pub body_limit_mb: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
            log_level: "info".to_string(),
            log_to_file: false,
            log_dir: None,
            default_retry_budget: 3,
            body_limit_mb: 20,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml_ng::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.default_retry_budget == 0 {
            anyhow::bail!("default-retry-budget must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_retry_budget_rejected() {
        let mut config = Config::default();
        config.default_retry_budget = 0;
        assert!(config.validate().is_err());
    }
}
