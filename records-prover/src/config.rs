//! Prover configuration.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// How key pairs are scoped within one submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScope {
    /// One key pair shared by all sensitive fields of a record.
    #[default]
    PerRecord,
    /// A fresh key pair for every sensitive field.
    PerField,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields, default)]
pub struct ProverConfig {
    /// Ledger id folded into every proof transcript. `0x`-prefixed hex.
    #[serde(with = "hex32")]
    pub network_id: [u8; 32],
    pub key_scope: KeyScope,
}

impl ProverConfig {
    pub fn new(network_id: [u8; 32]) -> Self {
        Self {
            network_id,
            key_scope: KeyScope::default(),
        }
    }

    pub fn with_key_scope(mut self, key_scope: KeyScope) -> Self {
        self.key_scope = key_scope;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

mod hex32 {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        let mut out = [0u8; 32];
        hex::decode_to_slice(digits, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}
