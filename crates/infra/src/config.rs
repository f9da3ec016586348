//! Workflow configuration.
//!
//! Every value has a default; environment variables (`STOREBRIDGE_*`) override
//! them when set.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storebridge_crm::SalesTeamId;
use storebridge_products::UomId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Settings of the order conversion workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Sales team of new opportunities.
    pub default_team: SalesTeamId,
    pub lead_probability: u8,
    /// Follow-up deadline of new opportunities, in days from now.
    pub lead_deadline_days: i64,
    /// Unit of measure for lines whose product has none.
    pub default_uom: UomId,
    /// Prefix of generated sales order names (`{prefix}{number}`).
    pub sales_order_prefix: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_team: SalesTeamId(1),
            lead_probability: 10,
            lead_deadline_days: 1,
            default_uom: UomId::UNIT,
            sales_order_prefix: "SO".to_string(),
        }
    }
}

impl WorkflowConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let lead_probability = parsed(&lookup, "STOREBRIDGE_LEAD_PROBABILITY")?
            .unwrap_or(defaults.lead_probability);
        if lead_probability > 100 {
            return Err(ConfigError::Invalid {
                key: "STOREBRIDGE_LEAD_PROBABILITY",
                value: lead_probability.to_string(),
            });
        }

        Ok(Self {
            default_team: parsed(&lookup, "STOREBRIDGE_DEFAULT_TEAM")?
                .map(SalesTeamId)
                .unwrap_or(defaults.default_team),
            lead_probability,
            lead_deadline_days: parsed(&lookup, "STOREBRIDGE_LEAD_DEADLINE_DAYS")?
                .unwrap_or(defaults.lead_deadline_days),
            default_uom: parsed(&lookup, "STOREBRIDGE_DEFAULT_UOM")?
                .map(UomId)
                .unwrap_or(defaults.default_uom),
            sales_order_prefix: lookup("STOREBRIDGE_SALES_ORDER_PREFIX")
                .unwrap_or(defaults.sales_order_prefix),
        })
    }
}

/// Settings of the Arelux customization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreluxConfig {
    /// Orders up to this weight get the source's default carrier.
    pub max_carrier_weight_grams: u64,
    pub default_activity_type: String,
    pub default_customer_type: String,
}

impl Default for AreluxConfig {
    fn default() -> Self {
        Self {
            max_carrier_weight_grams: 10_000,
            default_activity_type: "arelux".to_string(),
            default_customer_type: "particular".to_string(),
        }
    }
}

impl AreluxConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_carrier_weight_grams: parsed(&lookup, "STOREBRIDGE_ARELUX_MAX_CARRIER_WEIGHT_GRAMS")?
                .unwrap_or(defaults.max_carrier_weight_grams),
            default_activity_type: lookup("STOREBRIDGE_ARELUX_ACTIVITY_TYPE")
                .unwrap_or(defaults.default_activity_type),
            default_customer_type: lookup("STOREBRIDGE_ARELUX_CUSTOMER_TYPE")
                .unwrap_or(defaults.default_customer_type),
        })
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
