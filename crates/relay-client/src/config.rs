//! Relay configuration
//!
//! Read from an optional TOML file, then overridden by `RELAY__SECTION__KEY`
//! environment variables.

use std::path::Path;
use std::time::Duration;

use relay_core::{AccountId, Drops};
use relay_crypto::KeyPair;
use relay_protocol::DEFAULT_FAMILY;
use serde::{Deserialize, Serialize};

use crate::confirm::PollSettings;
use crate::error::{RelayError, Result};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "RELAY";

/// Largest accepted `poll.backoff_factor`
pub const MAX_BACKOFF_FACTOR: f64 = 16.0;

/// Complete relay configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub ledger: LedgerSettings,

    /// Module the instructions are addressed to
    #[serde(default)]
    pub module: ModuleSettings,

    /// Real account paying for transport
    #[serde(default)]
    pub carrier: CarrierSettings,

    #[serde(default)]
    pub relay: RelaySettings,

    #[serde(default)]
    pub poll: PollConfig,
}

/// Ledger endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:5005".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleSettings {
    /// Module account address
    #[serde(default)]
    pub account: Option<String>,

    /// Memo type family, e.g. `liteacc`
    #[serde(default = "default_family")]
    pub family: String,
}

fn default_family() -> String {
    DEFAULT_FAMILY.to_string()
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            account: None,
            family: default_family(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CarrierSettings {
    /// Carrier account address
    #[serde(default)]
    pub account: Option<String>,

    /// Carrier secret: a family seed or hex key
    #[serde(default)]
    pub secret: Option<String>,
}

/// Carrier transaction parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_fee")]
    pub fee_drops: u64,

    /// Value of a carrier payment that only transports an instruction
    #[serde(default = "default_value")]
    pub value_drops: u64,

    /// Validity window in ledgers
    #[serde(default = "default_timeout_ledgers")]
    pub timeout_ledgers: u32,
}

fn default_fee() -> u64 {
    10_000
}
fn default_value() -> u64 {
    100_000
}
fn default_timeout_ledgers() -> u32 {
    20
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            fee_drops: default_fee(),
            value_drops: default_value(),
            timeout_ledgers: default_timeout_ledgers(),
        }
    }
}

/// Confirmation backoff
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Wall-clock bound on a single confirmation
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
}

fn default_initial_delay() -> u64 {
    1_000
}
fn default_max_delay() -> u64 {
    8_000
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_deadline() -> u64 {
    120
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_factor: default_backoff_factor(),
            deadline_secs: default_deadline(),
        }
    }
}

impl RelayConfig {
    /// Load from `path` (may be missing) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the relay cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.ledger.endpoint.is_empty() {
            return Err(RelayError::Config("ledger.endpoint is empty".to_string()));
        }
        if self.module.family.is_empty() || self.module.family.contains('/') {
            return Err(RelayError::Config(format!(
                "module.family {:?} must be a non-empty name without '/'",
                self.module.family
            )));
        }
        if self.relay.timeout_ledgers == 0 {
            return Err(RelayError::Config("relay.timeout_ledgers must be positive".to_string()));
        }
        let factor = self.poll.backoff_factor;
        if !factor.is_finite() || !(1.0..=MAX_BACKOFF_FACTOR).contains(&factor) {
            return Err(RelayError::Config(format!(
                "poll.backoff_factor {} must be between 1 and {}",
                factor, MAX_BACKOFF_FACTOR
            )));
        }
        if self.poll.initial_delay_ms == 0 {
            return Err(RelayError::Config("poll.initial_delay_ms must be positive".to_string()));
        }
        if self.poll.initial_delay_ms > self.poll.max_delay_ms {
            return Err(RelayError::Config(
                "poll.initial_delay_ms exceeds poll.max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn module_account(&self) -> Result<AccountId> {
        parse_account("module.account", self.module.account.as_deref())
    }

    pub fn carrier_account(&self) -> Result<AccountId> {
        parse_account("carrier.account", self.carrier.account.as_deref())
    }

    pub fn carrier_key(&self) -> Result<KeyPair> {
        let secret = self
            .carrier
            .secret
            .as_deref()
            .ok_or_else(|| RelayError::Config("carrier.secret is not set".to_string()))?;
        Ok(KeyPair::from_secret_text(secret)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger.request_timeout_secs)
    }

    pub fn fee(&self) -> Drops {
        Drops(self.relay.fee_drops)
    }

    pub fn value(&self) -> Drops {
        Drops(self.relay.value_drops)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            initial_delay: Duration::from_millis(self.poll.initial_delay_ms),
            max_delay: Duration::from_millis(self.poll.max_delay_ms),
            backoff_factor: self.poll.backoff_factor,
            deadline: Duration::from_secs(self.poll.deadline_secs),
        }
    }
}

fn parse_account(name: &str, value: Option<&str>) -> Result<AccountId> {
    let value = value.ok_or_else(|| RelayError::Config(format!("{} is not set", name)))?;
    value
        .parse()
        .map_err(|e| RelayError::Config(format!("{}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.module.family, "liteacc");
        assert_eq!(config.relay.timeout_ledgers, 20);
        assert_eq!(config.fee(), Drops(10_000));
        assert_eq!(config.poll_settings().max_delay, Duration::from_secs(8));
    }

    #[test]
    fn test_file_values() {
        let file = write_config(
            r#"
[ledger]
endpoint = "http://ledger.test:5005"

[module]
account = "rrrrrrrrrrrrrrrrrrrrrhoLvTp"
family = "notary"

[relay]
timeout_ledgers = 90
"#,
        );
        let config = RelayConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.ledger.endpoint, "http://ledger.test:5005");
        assert_eq!(config.module.family, "notary");
        assert_eq!(config.relay.timeout_ledgers, 90);
        assert_eq!(config.relay.value_drops, 100_000);
        assert_eq!(config.module_account().unwrap(), AccountId::new([0; 20]));
    }

    #[test]
    fn test_invalid_family() {
        let file = write_config("[module]\nfamily = \"lite/acc\"\n");
        assert!(matches!(
            RelayConfig::load(Some(file.path())),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn test_missing_carrier() {
        let config = RelayConfig::default();
        assert!(matches!(config.carrier_account(), Err(RelayError::Config(_))));
        assert!(matches!(config.carrier_key(), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_carrier_key_from_hex() {
        let key = KeyPair::generate();
        let config = RelayConfig {
            carrier: CarrierSettings {
                account: None,
                secret: Some(key.secret_hex()),
            },
            ..Default::default()
        };
        assert_eq!(config.carrier_key().unwrap().public_key(), key.public_key());
    }

    #[test]
    fn test_poll_backoff_bounds() {
        for factor in [0.5, 1e30, f64::INFINITY, f64::NAN] {
            let mut config = RelayConfig::default();
            config.poll.backoff_factor = factor;
            assert!(
                matches!(config.validate(), Err(RelayError::Config(_))),
                "factor {} accepted",
                factor
            );
        }

        let mut config = RelayConfig::default();
        config.poll.backoff_factor = MAX_BACKOFF_FACTOR;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_initial_delay() {
        let mut config = RelayConfig::default();
        config.poll.initial_delay_ms = 0;
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }
}
