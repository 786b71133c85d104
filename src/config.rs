//! Bot configuration — environment variables first, `config.json` fallback.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::Identity;

/// The fixed system administrator identity. Seeded into the user registry
/// at startup; never deletable, never reassignable.
pub const SYSTEM_ADMIN_ID: Identity = 6_398_798_394;

/// Default worker role kinds offered on the role-choice menu.
const DEFAULT_WORKER_ROLES: &[&str] = &["Shoemaker", "Restorer", "Dry cleaner"];

/// Resolved bot configuration. The core receives these values already
/// parsed; nothing downstream touches the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot credential.
    pub token: SecretString,
    /// Business-administrator identity (distinct from [`SYSTEM_ADMIN_ID`]
    /// unless deliberately configured to coincide).
    pub admin_id: Identity,
    /// Directory holding the registry files.
    pub data_dir: PathBuf,
    /// The fixed set of worker job categories.
    pub worker_roles: Vec<String>,
}

/// Shape of the optional `config.json` fallback file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    bot_token: Option<String>,
    #[serde(default)]
    admin_id: Option<Identity>,
}

impl BotConfig {
    /// Load configuration. `BOT_TOKEN` / `BOT_ADMIN_ID` environment
    /// variables take precedence; values not set there are read from a
    /// local `config.json` with fields `bot_token` and `admin_id`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut token = std::env::var("BOT_TOKEN").ok().filter(|t| !t.is_empty());
        let mut admin_id = match std::env::var("BOT_ADMIN_ID") {
            Ok(raw) => Some(raw.parse::<Identity>().map_err(|e| {
                ConfigError::InvalidValue {
                    key: "BOT_ADMIN_ID".into(),
                    message: e.to_string(),
                }
            })?),
            Err(_) => None,
        };

        if token.is_none() || admin_id.is_none() {
            if let Ok(data) = std::fs::read_to_string("config.json") {
                let file: ConfigFile = serde_json::from_str(&data)
                    .map_err(|e| ConfigError::ParseError(e.to_string()))?;
                if token.is_none() {
                    token = file.bot_token.filter(|t| !t.is_empty());
                }
                if admin_id.is_none() {
                    admin_id = file.admin_id;
                }
            }
        }

        let token = token.ok_or_else(|| ConfigError::MissingRequired {
            key: "BOT_TOKEN".into(),
            hint: "Set the env var or add \"bot_token\" to config.json.".into(),
        })?;
        let admin_id = admin_id.ok_or_else(|| ConfigError::MissingRequired {
            key: "BOT_ADMIN_ID".into(),
            hint: "Set the env var or add \"admin_id\" to config.json.".into(),
        })?;

        Ok(Self {
            token: SecretString::from(token),
            admin_id,
            data_dir: std::env::var("WORKSHOP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            worker_roles: worker_roles_from_env(),
        })
    }
}

fn worker_roles_from_env() -> Vec<String> {
    match std::env::var("WORKSHOP_ROLES") {
        Ok(raw) => {
            let roles: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if roles.is_empty() {
                default_worker_roles()
            } else {
                roles
            }
        }
        Err(_) => default_worker_roles(),
    }
}

pub fn default_worker_roles() -> Vec<String> {
    DEFAULT_WORKER_ROLES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roles_are_nonempty_and_fixed() {
        let roles = default_worker_roles();
        assert_eq!(roles, vec!["Shoemaker", "Restorer", "Dry cleaner"]);
    }

    #[test]
    fn config_file_parses_partial_fields() {
        let file: ConfigFile = serde_json::from_str(r#"{"admin_id": 77}"#).unwrap();
        assert_eq!(file.admin_id, Some(77));
        assert!(file.bot_token.is_none());
    }

    #[test]
    fn config_file_parses_both_fields() {
        let file: ConfigFile =
            serde_json::from_str(r#"{"bot_token": "123:ABC", "admin_id": 77}"#).unwrap();
        assert_eq!(file.bot_token.as_deref(), Some("123:ABC"));
        assert_eq!(file.admin_id, Some(77));
    }
}
