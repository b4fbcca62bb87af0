use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub jwt_secret: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: i64,

    /// Comma-separated origin allow-list; "*" allows any origin.
    #[serde(default = "default_cors_allow_origins")]
    pub cors_allow_origins: String,

    /// When set, agents must present this token to register.
    #[serde(default)]
    pub agent_registration_token: Option<String>,

    #[serde(default = "default_dedup_window_hours")]
    pub dedup_window_hours: i64,

    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// Password for the seeded admin account; only used when the users
    /// table is empty at startup.
    #[serde(default)]
    pub admin_password: Option<String>,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    jwt_secret: Option<String>,
    listen_addr: Option<String>,
    jwt_expiry_hours: Option<i64>,
    cors_allow_origins: Option<String>,
    agent_registration_token: Option<String>,
    dedup_window_hours: Option<i64>,
    admin_username: Option<String>,
    admin_password: Option<String>,
    log_dir: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_jwt_expiry_hours() -> i64 {
    24
}

fn default_cors_allow_origins() -> String {
    "*".to_string()
}

fn default_dedup_window_hours() -> i64 {
    24
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = if let Some(path_str) = config_path {
            let path = Path::new(path_str);
            if path.exists() {
                let contents = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                toml::from_str(&contents)
                    .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
            } else {
                PartialServerConfig::default()
            }
        } else {
            PartialServerConfig::default()
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        let final_config = ServerConfig {
            database_url: env_config
                .database_url
                .or(file_config.database_url)
                .ok_or("DATABASE_URL is required")?,
            jwt_secret: env_config
                .jwt_secret
                .or(file_config.jwt_secret)
                .ok_or("JWT_SECRET is required")?,
            listen_addr: env_config
                .listen_addr
                .or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            jwt_expiry_hours: env_config
                .jwt_expiry_hours
                .or(file_config.jwt_expiry_hours)
                .unwrap_or_else(default_jwt_expiry_hours),
            cors_allow_origins: env_config
                .cors_allow_origins
                .or(file_config.cors_allow_origins)
                .unwrap_or_else(default_cors_allow_origins),
            agent_registration_token: env_config
                .agent_registration_token
                .or(file_config.agent_registration_token),
            dedup_window_hours: env_config
                .dedup_window_hours
                .or(file_config.dedup_window_hours)
                .unwrap_or_else(default_dedup_window_hours),
            admin_username: env_config
                .admin_username
                .or(file_config.admin_username)
                .unwrap_or_else(default_admin_username),
            admin_password: env_config.admin_password.or(file_config.admin_password),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
        };

        Ok(final_config)
    }

    /// Parsed origin allow-list; an entry of "*" means any origin.
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allow_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origins_splits_and_trims() {
        let config = ServerConfig {
            database_url: "postgres://localhost/printwatch".to_string(),
            jwt_secret: "secret".to_string(),
            listen_addr: default_listen_addr(),
            jwt_expiry_hours: 24,
            cors_allow_origins: "https://a.example , https://b.example".to_string(),
            agent_registration_token: None,
            dedup_window_hours: 24,
            admin_username: "admin".to_string(),
            admin_password: None,
            log_dir: "logs".to_string(),
        };
        assert_eq!(
            config.cors_origins(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
