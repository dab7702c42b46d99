//! Network selection.
//!
//! `NEAR_ENV` picks one of the known networks; node URL, signer account,
//! lending contract and credential location can be overridden from the
//! environment. `NETWORK_CONFIG` points at a TOML file that replaces the
//! built-in table entirely (values may reference `${VAR}`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Lending contract deployed on mainnet.
pub const MAINNET_LENDING_CONTRACT: &str = "v3.oin_finance.near";

const ACCOUNT_ID_PATTERN: &str = r"^(([a-z\d]+[\-_])*[a-z\d]+\.)*([a-z\d]+[\-_])*[a-z\d]+$";
const MIN_ACCOUNT_ID_LEN: usize = 2;
const MAX_ACCOUNT_ID_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unconfigured environment '{0}' (expected production, mainnet, development, testnet, local, test or ci)")]
    UnknownNetwork(String),

    #[error("no signer account for {network}; set {var}")]
    MissingAccount { network: String, var: &'static str },

    #[error("no lending contract for {network}; set LENDING_CONTRACT")]
    MissingContract { network: String },

    #[error("invalid account id '{0}'")]
    InvalidAccountId(String),

    #[error("account id pattern: {0}")]
    Pattern(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Known NEAR networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Local,
    CiTestnet,
}

impl Network {
    pub fn network_id(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Local => "local",
            Network::CiTestnet => "shared-test",
        }
    }

    pub fn default_node_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://rpc.mainnet.near.org",
            Network::Testnet => "https://rpc.testnet.near.org",
            Network::Local => "http://localhost:3030",
            Network::CiTestnet => "https://rpc.ci-testnet.near.org",
        }
    }

    fn node_url_var(&self) -> &'static str {
        match self {
            Network::Mainnet => "NEAR_NODE_URL_MAINNET",
            Network::Testnet => "NEAR_NODE_URL_TESTNET",
            Network::Local => "NEAR_NODE_URL_LOCAL",
            Network::CiTestnet => "NEAR_NODE_URL_CI_TESTNET",
        }
    }

    fn account_var(&self) -> &'static str {
        match self {
            Network::Mainnet => "NEAR_ACCOUNT_MAINNET",
            Network::Testnet => "NEAR_ACCOUNT_TESTNET",
            Network::Local => "NEAR_ACCOUNT_LOCAL",
            Network::CiTestnet => "NEAR_ACCOUNT_CI_TESTNET",
        }
    }

    fn default_account(&self) -> Option<&'static str> {
        match self {
            Network::CiTestnet => Some("test.near"),
            _ => None,
        }
    }

    fn default_contract(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => Some(MAINNET_LENDING_CONTRACT),
            _ => None,
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "mainnet" => Ok(Network::Mainnet),
            "development" | "testnet" => Ok(Network::Testnet),
            "local" => Ok(Network::Local),
            "test" | "ci" => Ok(Network::CiTestnet),
            _ => Err(ConfigError::UnknownNetwork(s.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.network_id())
    }
}

/// Where the agent connects and who it signs as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network_id: String,
    pub node_url: String,
    pub contract_id: String,
    /// Signer account. May be omitted when `key_path` names a key file
    /// that carries the account id.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Credentials directory laid out as `<dir>/<network_id>/<account>.json`
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Single key file used instead of the credentials directory
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("./credentials")
}

impl NetworkConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("NETWORK_CONFIG") {
            if !path.trim().is_empty() {
                return Self::from_file(path.trim());
            }
        }
        let name = std::env::var("NEAR_ENV").unwrap_or_else(|_| "development".to_string());
        let network: Network = name.parse()?;
        Self::for_network(network, |key| std::env::var(key).ok())
    }

    /// Resolve the built-in entry for `network`, reading overrides through
    /// `lookup`.
    pub fn for_network<F>(network: Network, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let node_url = var(network.node_url_var())
            .unwrap_or_else(|| network.default_node_url().to_string());

        let contract_id = var("LENDING_CONTRACT")
            .or_else(|| network.default_contract().map(str::to_string))
            .ok_or_else(|| ConfigError::MissingContract {
                network: network.to_string(),
            })?;

        let key_path = match network {
            Network::Local => {
                let home = var("HOME").unwrap_or_else(|| ".".to_string());
                Some(Path::new(&home).join(".near").join("validator_key.json"))
            }
            _ => None,
        };

        let account_id = var(network.account_var())
            .or_else(|| network.default_account().map(str::to_string));
        if account_id.is_none() && key_path.is_none() {
            return Err(ConfigError::MissingAccount {
                network: network.to_string(),
                var: network.account_var(),
            });
        }

        let credentials_path = var("CREDENTIALS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_credentials_path);

        let config = Self {
            network_id: network.network_id().to_string(),
            node_url,
            contract_id,
            account_id,
            credentials_path,
            key_path,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a network table from TOML, expanding `${VAR}` references first.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            toml::from_str(&expand_env(&content)).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contract_id.trim().is_empty() {
            return Err(ConfigError::MissingContract {
                network: self.network_id.clone(),
            });
        }
        validate_account_id(&self.contract_id)?;
        match &self.account_id {
            Some(account) => validate_account_id(account)?,
            None if self.key_path.is_none() => {
                return Err(ConfigError::MissingAccount {
                    network: self.network_id.clone(),
                    var: "account_id",
                })
            }
            None => {}
        }
        Ok(())
    }

    pub fn log_config(&self) {
        tracing::info!(
            network = %self.network_id,
            node_url = %self.node_url,
            contract = %self.contract_id,
            account = self.account_id.as_deref().unwrap_or("<from key file>"),
            "Network configuration loaded"
        );
    }
}

/// Check `account_id` against NEAR account naming rules.
pub fn validate_account_id(account_id: &str) -> Result<(), ConfigError> {
    let re = regex_lite::Regex::new(ACCOUNT_ID_PATTERN)
        .map_err(|e| ConfigError::Pattern(e.to_string()))?;
    let len = account_id.len();
    if !(MIN_ACCOUNT_ID_LEN..=MAX_ACCOUNT_ID_LEN).contains(&len) || !re.is_match(account_id) {
        return Err(ConfigError::InvalidAccountId(account_id.to_string()));
    }
    Ok(())
}

/// Expand ${VAR_NAME} patterns with environment variable values.
fn expand_env(s: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };
    let mut result = s.to_string();

    for cap in re.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(var_match.as_str()) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }

    result
}
