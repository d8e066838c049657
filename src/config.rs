use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-mapper dispatch policy.
///
/// Field names on the wire are camelCase (`preventDefaultOnHit`,
/// `grablerPassthroughOnMiss`, ...); missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policy {
    /// Let every event through as if the mapper were not engrabled.
    pub skip: bool,
    /// Suppress the host default when a key is bound here.
    pub prevent_default_on_hit: bool,
    /// Suppress the host default when a key is not bound here.
    pub prevent_default_on_miss: bool,
    /// Keep walking the grabler stack after a hit.
    pub grabler_passthrough_on_hit: bool,
    /// Keep walking the grabler stack after a miss.
    pub grabler_passthrough_on_miss: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            skip: false,
            prevent_default_on_hit: true,
            prevent_default_on_miss: true,
            grabler_passthrough_on_hit: false,
            grabler_passthrough_on_miss: false,
        }
    }
}

impl Policy {
    /// Read a policy from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// A policy that only claims bound keys and lets everything else
    /// fall through untouched.
    pub fn transparent() -> Self {
        Self {
            prevent_default_on_miss: false,
            grabler_passthrough_on_miss: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults_block_on_both_paths() {
        let policy = Policy::default();
        assert!(!policy.skip);
        assert!(policy.prevent_default_on_hit);
        assert!(policy.prevent_default_on_miss);
        assert!(!policy.grabler_passthrough_on_hit);
        assert!(!policy.grabler_passthrough_on_miss);
    }

    #[test]
    fn json_uses_camel_case_and_fills_gaps() {
        let policy =
            Policy::from_json(r#"{"preventDefaultOnMiss": false, "grablerPassthroughOnMiss": true}"#)
                .unwrap();
        assert_eq!(policy, Policy::transparent());

        let empty = Policy::from_json("{}").unwrap();
        assert_eq!(empty, Policy::default());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Policy::from_json(r#"{"skip": "yes"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn serializes_back_to_camel_case() {
        let json = serde_json::to_value(Policy::default()).unwrap();
        assert_eq!(json["preventDefaultOnHit"], serde_json::Value::Bool(true));
        assert_eq!(json["grablerPassthroughOnHit"], serde_json::Value::Bool(false));
    }
}
