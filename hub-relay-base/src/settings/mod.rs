//! Settings of a hub relay deployment.
//!
//! Settings are layered from the following sources, later ones overriding
//! earlier ones:
//!
//! 1. Every `*.json` file in `./config`, in lexical order.
//! 2. The comma separated files named by the `CONFIG_FILES` environment
//!    variable.
//! 3. Environment variables prefixed with `RELAY__`, using `__` as the path
//!    separator, e.g. `RELAY__HUB__RELAY_WINDOW=60` or
//!    `RELAY__SPOKES__OPTIMISM__EXIT_TIME=120`.
//!
//! Fee amounts are configured in the chain's smallest unit.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    env,
    path::Path,
};

use eyre::{ensure, Result};
use hub_relay_core::{
    models::{BatchPolicy, FeeConfig},
    ChainId, BASIS_POINTS, U256,
};
use serde::Deserialize;

pub use loader::ENV_PREFIX;
pub use trace::*;

mod loader;

/// Tracing subscriber management
pub mod trace;

/// Outbound bundling of one chain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Bundle size that triggers a commit
    pub max_bundle_messages: usize,
    /// Bundle age (seconds) that triggers a commit
    pub max_bundle_age: Option<u64>,
    /// Minimum fee per message
    pub message_fee: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        let policy = BatchPolicy::default();
        Self {
            max_bundle_messages: policy.max_bundle_messages,
            max_bundle_age: policy.max_bundle_age,
            message_fee: 0,
        }
    }
}

impl BatchSettings {
    /// The batching policy these settings describe
    pub fn policy(&self) -> BatchPolicy {
        BatchPolicy {
            max_bundle_messages: self.max_bundle_messages,
            max_bundle_age: self.max_bundle_age,
            message_fee: U256::from(self.message_fee),
        }
    }
}

fn default_bps() -> u32 {
    BASIS_POINTS
}

/// The hub chain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubSettings {
    /// Chain id of the hub
    pub chain_id: ChainId,
    /// Seconds over which the relayer reward ramps up to the full fee
    #[serde(default)]
    pub relay_window: u64,
    /// Absolute cap on a relayer reward, uncapped if unset
    #[serde(default)]
    pub max_bundle_fee: Option<u64>,
    /// Relative cap on a relayer reward, in basis points of the bundle fees
    #[serde(default = "default_bps")]
    pub max_bundle_fee_bps: u32,
    /// Balance the fee distributor keeps before excess is withdrawn
    #[serde(default)]
    pub target_balance: u64,
    /// Where excess fees are sent
    #[serde(default)]
    pub excess_fees_recipient: Option<String>,
    /// Bundling of hub originated messages
    #[serde(default)]
    pub batch: BatchSettings,
}

impl HubSettings {
    /// Relayer economics of the hub
    pub fn fee_config(&self) -> FeeConfig {
        FeeConfig {
            relay_window: self.relay_window,
            max_bundle_fee: self.max_bundle_fee.map(U256::from).unwrap_or(U256::MAX),
            max_bundle_fee_bps: self.max_bundle_fee_bps,
        }
    }
}

/// A spoke chain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpokeSettings {
    /// Chain id of the spoke
    pub chain_id: ChainId,
    /// Seconds a commitment from this spoke waits on the hub before it can
    /// be relayed
    #[serde(default)]
    pub exit_time: u64,
    /// Bundling of messages sent from this spoke
    #[serde(default)]
    pub batch: BatchSettings,
}

/// Switches of the in-memory harness
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Execute messages as soon as their bundle is proven
    pub auto_execute: bool,
}

/// Settings of a whole deployment: one hub and its spokes.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// The hub
    pub hub: HubSettings,
    /// Spokes by name
    #[serde(default)]
    pub spokes: BTreeMap<String, SpokeSettings>,
    /// Harness switches
    #[serde(default)]
    pub harness: HarnessSettings,
    /// Logging
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl Settings {
    /// Load settings from `./config`, `CONFIG_FILES` and the process
    /// environment.
    pub fn load() -> Result<Self> {
        let extra_files: Vec<String> = env::var("CONFIG_FILES")
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();
        Self::load_from(Some(Path::new("./config")), &extra_files, env::vars().collect())
    }

    /// Load settings from explicit sources. `env` stands in for the process
    /// environment.
    pub fn load_from(
        config_dir: Option<&Path>,
        extra_files: &[String],
        env: HashMap<String, String>,
    ) -> Result<Self> {
        let settings: Self = loader::load_settings_object(config_dir, extra_files, env)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the deployment is consistent.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.spokes.is_empty(), "At least one spoke must be configured");
        ensure!(
            self.hub.max_bundle_fee_bps <= BASIS_POINTS,
            "max_bundle_fee_bps must not exceed {BASIS_POINTS}, got {}",
            self.hub.max_bundle_fee_bps
        );
        ensure!(
            self.hub.batch.max_bundle_messages > 0,
            "Hub max_bundle_messages must be positive"
        );

        let mut seen = HashSet::from([self.hub.chain_id]);
        for (name, spoke) in &self.spokes {
            ensure!(
                seen.insert(spoke.chain_id),
                "Spoke {name} reuses chain id {}",
                spoke.chain_id
            );
            ensure!(
                spoke.batch.max_bundle_messages > 0,
                "Spoke {name} max_bundle_messages must be positive"
            );
        }
        Ok(())
    }

    /// Spoke settings by chain id
    pub fn spoke(&self, chain_id: ChainId) -> Option<&SpokeSettings> {
        self.spokes.values().find(|s| s.chain_id == chain_id)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    const BASE: &str = r#"{
        "hub": {
            "chain_id": 11155111,
            "relay_window": 43200,
            "max_bundle_fee": 5000,
            "max_bundle_fee_bps": 300,
            "target_balance": 1000000
        },
        "spokes": {
            "optimism": { "chain_id": 11155420, "exit_time": 3600 },
            "base": {
                "chain_id": 84532,
                "exit_time": 600,
                "batch": { "max_bundle_messages": 4, "message_fee": 100 }
            }
        },
        "tracing": { "fmt": "json", "level": "debug" }
    }"#;

    fn write_config(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn it_loads_the_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "deployment.json", BASE);
        write_config(dir.path(), "notes.txt", "ignored");

        let settings = Settings::load_from(Some(dir.path()), &[], HashMap::new()).unwrap();
        assert_eq!(settings.hub.chain_id, 11155111);
        assert_eq!(settings.spokes.len(), 2);
        assert_eq!(settings.spoke(84532).unwrap().exit_time, 600);
        assert_eq!(settings.tracing.level, Level::Debug);
        assert!(!settings.harness.auto_execute);

        let fee_config = settings.hub.fee_config();
        assert_eq!(fee_config.relay_window, 43200);
        assert_eq!(fee_config.max_bundle_fee, U256::from(5000u64));
        assert_eq!(fee_config.max_bundle_fee_bps, 300);

        let policy = settings.spoke(84532).unwrap().batch.policy();
        assert_eq!(policy.max_bundle_messages, 4);
        assert_eq!(policy.message_fee, U256::from(100u64));
        assert_eq!(
            settings.spoke(11155420).unwrap().batch,
            BatchSettings::default()
        );
    }

    #[test]
    fn later_sources_override_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "a.json", BASE);
        let extra = dir.path().join("override.json");
        fs::write(&extra, r#"{ "harness": { "auto_execute": true } }"#).unwrap();

        let env = HashMap::from([
            ("RELAY__HUB__RELAY_WINDOW".to_string(), "60".to_string()),
            (
                "RELAY__SPOKES__OPTIMISM__EXIT_TIME".to_string(),
                "5".to_string(),
            ),
            ("UNRELATED__HUB__RELAY_WINDOW".to_string(), "1".to_string()),
        ]);
        let settings = Settings::load_from(
            Some(dir.path()),
            &[extra.to_string_lossy().into_owned()],
            env,
        )
        .unwrap();

        assert!(settings.harness.auto_execute);
        assert_eq!(settings.hub.relay_window, 60);
        assert_eq!(settings.spoke(11155420).unwrap().exit_time, 5);
    }

    #[test]
    fn unknown_tracing_values_do_not_break_loading() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "a.json", BASE);
        write_config(
            dir.path(),
            "b.json",
            r#"{ "tracing": { "fmt": "fancy", "level": "verbose" } }"#,
        );

        let settings = Settings::load_from(Some(dir.path()), &[], HashMap::new()).unwrap();
        assert_eq!(settings.tracing.fmt, Style::Full);
        assert_eq!(settings.tracing.level, Level::Info);

        let env = HashMap::from([("RELAY__TRACING__LEVEL".to_string(), "warn".to_string())]);
        let settings = Settings::load_from(Some(dir.path()), &[], env).unwrap();
        assert_eq!(settings.tracing.level, Level::Warn);
    }

    #[test]
    fn it_rejects_inconsistent_deployments() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "dup.json",
            r#"{
                "hub": { "chain_id": 1 },
                "spokes": { "a": { "chain_id": 1 } }
            }"#,
        );
        let err = Settings::load_from(Some(dir.path()), &[], HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("reuses chain id 1"));

        let err = Settings::load_from(None, &[], HashMap::new()).unwrap_err();
        assert!(format!("{err:?}").contains("Config deserialization error"));
    }
}
