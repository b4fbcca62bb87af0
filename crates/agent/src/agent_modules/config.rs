use serde::{Deserialize, Serialize};
use std::{error::Error, fs, path::Path};
use tracing::{error, info};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AgentCliConfig {
    pub server_url: String,
    /// Site label this machine belongs to; created server-side on first use.
    pub site: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub agent_id: Option<i32>,
    #[serde(default)]
    pub registration_token: Option<String>,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_spool_path")]
    pub spool_path: String,
    #[serde(default = "default_queue_path")]
    pub queue_path: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Queued jobs older than this are dropped with a log entry.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(skip)]
    pub config_path: String,
}

fn default_hostname() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string())
}

fn default_spool_path() -> String {
    "print_spool.jsonl".to_string()
}

fn default_queue_path() -> String {
    "print_queue.db".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_retention_days() -> i64 {
    7
}

fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn load_cli_config(config_path_str: &str) -> Result<AgentCliConfig, Box<dyn Error>> {
    let config_path = Path::new(config_path_str);
    let absolute_path_display = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());
    info!(path = ?absolute_path_display, "Attempting to load config.");

    let config_str = fs::read_to_string(config_path).map_err(|e| {
        error!(path = %config_path_str, error = %e, "Failed to read agent config file.");
        Box::new(e) as Box<dyn Error>
    })?;

    let mut agent_cli_config: AgentCliConfig = toml::from_str(&config_str).map_err(|e| {
        error!(path = %config_path_str, error = %e, "Failed to parse agent config file.");
        Box::new(e) as Box<dyn Error>
    })?;
    agent_cli_config.config_path = config_path_str.to_string();

    info!(server_url = %agent_cli_config.server_url, site = %agent_cli_config.site, "Loaded config successfully.");
    Ok(agent_cli_config)
}

/// Writes the registration result back into the config file, preserving
/// any keys the operator has set by hand.
pub fn save_registration(
    config_path_str: &str,
    agent_id: i32,
    api_key: &str,
) -> Result<(), Box<dyn Error>> {
    let config_path = Path::new(config_path_str);

    let existing_content = fs::read_to_string(config_path).unwrap_or_default();
    let mut existing_toml: toml::Value = toml::from_str(&existing_content)?;

    if let Some(table) = existing_toml.as_table_mut() {
        table.insert(
            "agent_id".to_string(),
            toml::Value::Integer(agent_id as i64),
        );
        table.insert(
            "api_key".to_string(),
            toml::Value::String(api_key.to_string()),
        );
    } else {
        return Err(format!("config file {config_path_str} is not a TOML table").into());
    }

    let updated_content = toml::to_string_pretty(&existing_toml)?;
    fs::write(config_path, updated_content)?;

    info!(path = ?config_path, agent_id, "Saved registration to config file.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "server_url = \"https://portal.example\"").unwrap();
        writeln!(file, "site = \"HQ\"").unwrap();

        let config = load_cli_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server_url, "https://portal.example");
        assert!(config.api_key.is_none());
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.retention_days, 7);
    }

    #[test]
    fn save_registration_preserves_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        fs::write(
            &path,
            "server_url = \"https://portal.example\"\nsite = \"HQ\"\npoll_interval_secs = 9\n",
        )
        .unwrap();

        save_registration(path.to_str().unwrap(), 12, "pwa_secret").unwrap();

        let config = load_cli_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.agent_id, Some(12));
        assert_eq!(config.api_key.as_deref(), Some("pwa_secret"));
        assert_eq!(config.poll_interval_secs, 9);
    }
}
