//! The desired-state document.
//!
//! A document lists managed resources and data sources as blocks of
//! `{type, name, config}`. Block configs stay untyped JSON here; they are
//! typed against the provider's schemas during planning.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pingone::Region;

/// Default document file name.
pub const DEFAULT_DOCUMENT_FILE: &str = "pingone.deploy.yaml";

/// A parsed deployment document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployDocument {
    /// Provider overrides.
    #[serde(default)]
    pub provider: ProviderBlock,

    /// Managed resources.
    #[serde(default)]
    pub resources: Vec<Block>,

    /// Data sources.
    #[serde(default)]
    pub data: Vec<Block>,
}

/// Provider settings the document may override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderBlock {
    /// Region of the environments, overriding `PINGONE_REGION_CODE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_code: Option<Region>,
}

/// One resource or data source declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Block {
    /// Type name, e.g. `pingone_risk_predictor`.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Local name, unique per type.
    pub name: String,

    /// Attribute values, possibly containing `${...}` references.
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Block {
    /// Creates a block.
    #[must_use]
    pub fn new(type_name: impl Into<String>, name: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            config,
        }
    }
}

/// Whether an address names a managed resource or a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// A managed resource.
    Resource,
    /// A data source.
    Data,
}

/// Address of a block: `<type>.<name>` or `data.<type>.<name>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    /// Resource or data source.
    pub kind: BlockKind,
    /// Type name.
    pub type_name: String,
    /// Local name.
    pub name: String,
}

impl Address {
    /// Address of a managed resource.
    #[must_use]
    pub fn resource(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Resource,
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Address of a data source.
    #[must_use]
    pub fn data(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Data,
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Parses `<type>.<name>` or `data.<type>.<name>`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.split('.').collect();
        match parts.as_slice() {
            ["data", type_name, name] if !type_name.is_empty() && !name.is_empty() => {
                Some(Self::data(*type_name, *name))
            }
            [type_name, name] if !type_name.is_empty() && !name.is_empty() => {
                Some(Self::resource(*type_name, *name))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BlockKind::Resource => write!(f, "{}.{}", self.type_name, self.name),
            BlockKind::Data => write!(f, "data.{}.{}", self.type_name, self.name),
        }
    }
}

impl DeployDocument {
    /// Every block with its address, resources first.
    pub fn blocks(&self) -> impl Iterator<Item = (Address, &Block)> {
        self.resources
            .iter()
            .map(|b| (Address::resource(&b.type_name, &b.name), b))
            .chain(
                self.data
                    .iter()
                    .map(|b| (Address::data(&b.type_name, &b.name), b)),
            )
    }

    /// The block at `address`.
    #[must_use]
    pub fn block(&self, address: &Address) -> Option<&Block> {
        let blocks = match address.kind {
            BlockKind::Resource => &self.resources,
            BlockKind::Data => &self.data,
        };
        blocks
            .iter()
            .find(|b| b.type_name == address.type_name && b.name == address.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_round_trip() {
        let address = Address::parse("data.pingone_risk_predictor.anon").expect("address");
        assert_eq!(address.kind, BlockKind::Data);
        assert_eq!(address.to_string(), "data.pingone_risk_predictor.anon");

        let address = Address::parse("pingone_risk_policy.main").expect("address");
        assert_eq!(address.kind, BlockKind::Resource);
        assert!(Address::parse("pingone_risk_policy").is_none());
        assert!(Address::parse("a.b.c").is_none());
    }

    #[test]
    fn test_block_lookup() {
        let document = DeployDocument {
            resources: vec![Block::new("pingone_verify_voice_phrase", "main", serde_json::json!({}))],
            ..DeployDocument::default()
        };
        assert!(document.block(&Address::resource("pingone_verify_voice_phrase", "main")).is_some());
        assert!(document.block(&Address::data("pingone_verify_voice_phrase", "main")).is_none());
        assert_eq!(document.blocks().count(), 1);
    }
}
