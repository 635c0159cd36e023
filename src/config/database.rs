use std::path::PathBuf;

use crate::config::helpers::optional_env;
use crate::error::ConfigError;
use crate::settings::Settings;

/// Default database file, relative to the working directory.
pub const DEFAULT_LIBSQL_PATH: &str = "data/personabot.db";

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the local libSQL database file.
    pub libsql_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            libsql_path: PathBuf::from(DEFAULT_LIBSQL_PATH),
        }
    }
}

impl DatabaseConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        // Priority: env var > settings > default
        let libsql_path = optional_env("LIBSQL_PATH")?
            .map(PathBuf::from)
            .or_else(|| settings.libsql_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBSQL_PATH));
        Ok(Self { libsql_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::helpers::tests::ENV_LOCK;

    #[test]
    fn path_priority() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::remove_var("LIBSQL_PATH") };
        assert_eq!(
            DatabaseConfig::resolve(&Settings::default()).unwrap().libsql_path,
            PathBuf::from(DEFAULT_LIBSQL_PATH)
        );

        let settings = Settings {
            libsql_path: Some(PathBuf::from("/tmp/from-settings.db")),
            ..Default::default()
        };
        assert_eq!(
            DatabaseConfig::resolve(&settings).unwrap().libsql_path,
            PathBuf::from("/tmp/from-settings.db")
        );

        unsafe { std::env::set_var("LIBSQL_PATH", "/tmp/from-env.db") };
        assert_eq!(
            DatabaseConfig::resolve(&settings).unwrap().libsql_path,
            PathBuf::from("/tmp/from-env.db")
        );
        unsafe { std::env::remove_var("LIBSQL_PATH") };
    }
}
