use std::env;
use std::io;
use std::path::Path;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

macro_rules! from_environment {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            {
                if let Ok(value) = env::var($key) {
                    match value.parse() {
                        Ok(value) => $config.$name = value,
                        Err(_) => log::warn!("Ignoring invalid value for {}: {:?}", $key, value),
                    }
                }
            }
        )*
    }};
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loglevel: LevelFilter,
    pub database: Database,
    pub bracket: Bracket,
}

impl Config {
    pub async fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let mut file = File::open(path).await?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        Ok(toml::from_slice(&buf)?)
    }

    /// Loads the config file at `path`, falling back to the defaults if the file does not
    /// exist. Values from the environment take precedence over both.
    pub async fn load<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let config = match Self::from_file(path.as_ref()).await {
            Ok(config) => config,
            Err(ConfigError::Io(err)) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err),
        };

        Ok(config.with_environment())
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(self, "OUPA_LOGLEVEL", loglevel);
        self.database = self.database.with_environment();
        self.bracket = self.bracket.with_environment();

        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: LevelFilter::Info,
            database: Database::default(),
            bracket: Bracket::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub prefix: String,
}

impl Database {
    pub fn connect_string(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}?ssl-mode=DISABLED",
            self.driver, self.user, self.password, self.host, self.port, self.database
        )
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(
            self,
            "OUPA_DB_DRIVER",
            driver,
            "OUPA_DB_HOST",
            host,
            "OUPA_DB_PORT",
            port,
            "OUPA_DB_USER",
            user,
            "OUPA_DB_PASSWORD",
            password,
            "OUPA_DB_DATABASE",
            database,
            "OUPA_DB_PREFIX",
            prefix,
        );

        self
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            driver: String::from("mysql"),
            host: String::from("localhost"),
            port: 3306,
            user: String::from("oupafamilly"),
            password: String::new(),
            database: String::from("oupafamilly"),
            prefix: String::new(),
        }
    }
}

/// Options for bracket generation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Bracket {
    /// Shuffle the participants before generating the bracket.
    pub shuffle: bool,
}

impl Bracket {
    pub fn with_environment(mut self) -> Self {
        from_environment!(self, "OUPA_SHUFFLE", shuffle);
        self
    }
}

impl Default for Bracket {
    fn default() -> Self {
        Self { shuffle: true }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
