use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse magnitude of the expected market reaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactLevel::Low => write!(f, "low"),
            ImpactLevel::Medium => write!(f, "medium"),
            ImpactLevel::High => write!(f, "high"),
            ImpactLevel::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for ImpactLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(ImpactLevel::Low),
            "medium" => Ok(ImpactLevel::Medium),
            "high" => Ok(ImpactLevel::High),
            "critical" => Ok(ImpactLevel::Critical),
            _ => Err(format!("Unknown impact level: {s}")),
        }
    }
}

/// How quickly a subscriber should act on the item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Routine,
    #[default]
    Notable,
    Urgent,
    Breaking,
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyLevel::Routine => write!(f, "routine"),
            UrgencyLevel::Notable => write!(f, "notable"),
            UrgencyLevel::Urgent => write!(f, "urgent"),
            UrgencyLevel::Breaking => write!(f, "breaking"),
        }
    }
}

impl FromStr for UrgencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "routine" => Ok(UrgencyLevel::Routine),
            "notable" => Ok(UrgencyLevel::Notable),
            "urgent" => Ok(UrgencyLevel::Urgent),
            "breaking" => Ok(UrgencyLevel::Breaking),
            _ => Err(format!("Unknown urgency level: {s}")),
        }
    }
}
