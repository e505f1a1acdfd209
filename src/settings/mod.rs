// src/settings/mod.rs

//! Settings source the launch configuration is read from.
//!
//! Keys follow the client application's store: `rpcType`, `chain` and
//! `chainId`. The orchestrator only writes back the chain when remote mode
//! forces it.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Deserialize;

use crate::errors::{ChainsvcError, Result};
use crate::types::{ChainSpec, LaunchMode};

pub const RPC_TYPE: &str = "rpcType";
pub const CHAIN: &str = "chain";
pub const CHAIN_ID: &str = "chainId";

/// A single setting value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Text(String),
    Integer(i64),
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Text(s)
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Integer(n)
    }
}

/// Key/value store holding user settings.
pub trait SettingsSource: Send + Debug {
    fn get(&self, key: &str) -> Option<SettingValue>;
    fn set(&mut self, key: &str, value: SettingValue);
}

/// In-memory settings, seeded from the config file's `[settings]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySettings {
    values: BTreeMap<String, SettingValue>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.values.iter()
    }
}

impl From<BTreeMap<String, SettingValue>> for MemorySettings {
    fn from(values: BTreeMap<String, SettingValue>) -> Self {
        Self { values }
    }
}

impl SettingsSource for MemorySettings {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: SettingValue) {
        self.values.insert(key.to_string(), value);
    }
}

/// Resolve the RPC launch mode from the `rpcType` value.
pub fn parse_rpc_type(value: Option<&SettingValue>) -> Result<LaunchMode> {
    match value {
        Some(SettingValue::Text(s)) => s.parse::<LaunchMode>().map_err(ChainsvcError::InvalidConfig),
        Some(SettingValue::Integer(n)) => Err(ChainsvcError::InvalidConfig(format!(
            "invalid rpc type: {n} (expected a string)"
        ))),
        None => Err(ChainsvcError::InvalidConfig(format!(
            "invalid rpc type: `{RPC_TYPE}` is not set"
        ))),
    }
}

/// Read `chain` / `chainId`, keeping `current` values for missing keys.
pub fn read_chain(settings: &dyn SettingsSource, current: &ChainSpec) -> Result<ChainSpec> {
    let name = match settings.get(CHAIN) {
        Some(SettingValue::Text(name)) if !name.trim().is_empty() => name,
        Some(other) => {
            return Err(ChainsvcError::InvalidConfig(format!(
                "invalid chain name: {other:?}"
            )));
        }
        None => current.name.clone(),
    };

    let id = match settings.get(CHAIN_ID) {
        Some(SettingValue::Integer(n)) => u64::try_from(n).map_err(|_| {
            ChainsvcError::InvalidConfig(format!("invalid chain id: {n}"))
        })?,
        Some(SettingValue::Text(s)) => s.trim().parse::<u64>().map_err(|_| {
            ChainsvcError::InvalidConfig(format!("invalid chain id: {s:?}"))
        })?,
        None => current.id,
    };

    Ok(ChainSpec { name, id })
}

/// Write `chain` back into the settings source.
pub fn write_chain(settings: &mut dyn SettingsSource, chain: &ChainSpec) {
    settings.set(CHAIN, SettingValue::Text(chain.name.clone()));
    // Chain ids are small; saturate rather than wrap for absurd values.
    let id = i64::try_from(chain.id).unwrap_or(i64::MAX);
    settings.set(CHAIN_ID, SettingValue::Integer(id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_type_must_be_a_known_string() {
        assert_eq!(
            parse_rpc_type(Some(&"remote-auto".into())).unwrap(),
            LaunchMode::RemoteUrl
        );
        assert!(matches!(
            parse_rpc_type(Some(&SettingValue::Integer(1))),
            Err(ChainsvcError::InvalidConfig(_))
        ));
        assert!(matches!(
            parse_rpc_type(None),
            Err(ChainsvcError::InvalidConfig(_))
        ));
    }

    #[test]
    fn chain_id_accepts_numbers_and_numeric_text() {
        let current = ChainSpec::morden();

        let s = MemorySettings::new().with(CHAIN, "mainnet").with(CHAIN_ID, 61_i64);
        assert_eq!(read_chain(&s, &current).unwrap(), ChainSpec::mainnet());

        let s = MemorySettings::new().with(CHAIN_ID, "61");
        assert_eq!(
            read_chain(&s, &current).unwrap(),
            ChainSpec::new("morden", 61)
        );
    }

    #[test]
    fn missing_chain_keys_keep_current_values() {
        let current = ChainSpec::new("kotti", 6);
        let s = MemorySettings::new();
        assert_eq!(read_chain(&s, &current).unwrap(), current);
    }

    #[test]
    fn malformed_chain_values_are_invalid_config() {
        let current = ChainSpec::morden();

        let s = MemorySettings::new().with(CHAIN_ID, -1_i64);
        assert!(matches!(
            read_chain(&s, &current),
            Err(ChainsvcError::InvalidConfig(_))
        ));

        let s = MemorySettings::new().with(CHAIN_ID, "sixty-one");
        assert!(read_chain(&s, &current).is_err());

        let s = MemorySettings::new().with(CHAIN, 61_i64);
        assert!(read_chain(&s, &current).is_err());
    }

    #[test]
    fn write_chain_round_trips_through_read_chain() {
        let mut s = MemorySettings::new();
        write_chain(&mut s, &ChainSpec::mainnet());
        assert_eq!(s.get(CHAIN), Some(SettingValue::Text("mainnet".into())));
        assert_eq!(s.get(CHAIN_ID), Some(SettingValue::Integer(61)));
        assert_eq!(
            read_chain(&s, &ChainSpec::morden()).unwrap(),
            ChainSpec::mainnet()
        );
    }
}
