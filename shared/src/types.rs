//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Supported units of sale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaleUnit {
    #[default]
    Kilogram,
    Crate,
    Sack,
}

impl SaleUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleUnit::Kilogram => "kilogram",
            SaleUnit::Crate => "crate",
            SaleUnit::Sack => "sack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "kilogram" => Some(SaleUnit::Kilogram),
            "crate" => Some(SaleUnit::Crate),
            "sack" => Some(SaleUnit::Sack),
            _ => None,
        }
    }
}
