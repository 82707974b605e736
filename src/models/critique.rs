//! User-facing critiques: tagged adjustments applied to a prior request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request facet a critique addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritiqueProperty {
    Seniority,
    Budget,
    Timeline,
    Timezone,
    Skills,
    BusinessDomains,
    TechnicalDomains,
}

impl CritiqueProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seniority => "seniority",
            Self::Budget => "budget",
            Self::Timeline => "timeline",
            Self::Timezone => "timezone",
            Self::Skills => "skills",
            Self::BusinessDomains => "business_domains",
            Self::TechnicalDomains => "technical_domains",
        }
    }
}

/// Direction for `adjust` critiques ("more senior", "sooner", "wider").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustDirection {
    More,
    Less,
    Sooner,
    Later,
    Narrower,
    Wider,
}

/// Operation payload, tagged by `operation` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum CritiqueOp {
    Set { value: Value },
    Adjust { direction: AdjustDirection },
    Add { value: Value },
    Remove { item: Value },
}

impl CritiqueOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::Adjust { .. } => "adjust",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
        }
    }
}

/// One adjustment to a prior request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub property: CritiqueProperty,
    #[serde(flatten)]
    pub op: CritiqueOp,
}

impl Critique {
    pub fn set(property: CritiqueProperty, value: Value) -> Self {
        Self { property, op: CritiqueOp::Set { value } }
    }

    pub fn adjust(property: CritiqueProperty, direction: AdjustDirection) -> Self {
        Self { property, op: CritiqueOp::Adjust { direction } }
    }

    pub fn add(property: CritiqueProperty, value: Value) -> Self {
        Self { property, op: CritiqueOp::Add { value } }
    }

    pub fn remove(property: CritiqueProperty, item: Value) -> Self {
        Self { property, op: CritiqueOp::Remove { item } }
    }
}
