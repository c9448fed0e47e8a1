// Domain records shared by the engine, the service and the stores

pub mod ids;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use ids::{BatchId, ClientId, EnvironmentId, FactoryOrderId, NoteId, ProjectId, UserId};

/// Urgency attached to an environment when the project is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum UrgencyLevel {
    #[serde(alias = "Baixa")]
    Low,
    #[default]
    #[serde(alias = "Média", alias = "Media")]
    Normal,
    #[serde(alias = "Alta")]
    High,
}

impl UrgencyLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" | "baixa" => Some(Self::Low),
            "normal" | "média" | "media" => Some(Self::Normal),
            "high" | "alta" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UrgencyLevel::Low => "LOW",
            UrgencyLevel::Normal => "NORMAL",
            UrgencyLevel::High => "HIGH",
        };
        write!(f, "{label}")
    }
}

/// Per-room status, independent from the batch stage pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EnvironmentStatus {
    Pending,
    #[default]
    InBatch,
    PostAssembly,
    Completed,
}

impl EnvironmentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "inbatch" | "in_batch" => Some(Self::InBatch),
            "postassembly" | "post_assembly" => Some(Self::PostAssembly),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Project-level status derived from how far its batches went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProjectStatus {
    #[default]
    PreSale,
    InProgress,
    Completed,
    Assistance,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::PreSale => "PreSale",
            ProjectStatus::InProgress => "InProgress",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Assistance => "Assistance",
        }
    }

    /// Position in the forward-only lifecycle
    pub fn rank(&self) -> u8 {
        match self {
            ProjectStatus::PreSale => 0,
            ProjectStatus::InProgress => 1,
            ProjectStatus::Completed => 2,
            ProjectStatus::Assistance => 3,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PreSale" => Some(Self::PreSale),
            "InProgress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            "Assistance" => Some(Self::Assistance),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client registration data (contact plus the ITPP qualification fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub cpf: Option<String>,
    pub origin: Option<String>,
    pub store_unit: Option<String>,
    pub salesperson: Option<String>,
    pub property_type: Option<String>,
    pub move_in_date: Option<String>,
    pub budget_expectation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub client_id: ClientId,
    pub name: String,
    pub seller_name: String,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

/// A room inside a project; `batch_id` is the single source of batch membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: EnvironmentId,
    pub project_id: ProjectId,
    pub name: String,
    pub area_sqm: f64,
    pub urgency_level: UrgencyLevel,
    pub estimated_value: f64,
    pub observations: String,
    pub status: EnvironmentStatus,
    pub batch_id: Option<BatchId>,
}

/// Input for a room registered together with a new project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnvironment {
    pub name: String,
    pub area_sqm: f64,
    #[serde(default)]
    pub urgency_level: UrgencyLevel,
    #[serde(default)]
    pub estimated_value: f64,
    #[serde(default)]
    pub observations: String,
}

impl NewEnvironment {
    /// Parse the CLI shorthand `name:area[:urgency[:value]]`
    pub fn parse_spec(spec: &str) -> Option<Self> {
        let mut parts = spec.split(':');
        let name = parts.next()?.trim();
        if name.is_empty() {
            return None;
        }
        let area_sqm = parts.next()?.trim().parse::<f64>().ok()?;
        let urgency_level = match parts.next() {
            Some(raw) => UrgencyLevel::parse(raw)?,
            None => UrgencyLevel::Normal,
        };
        let estimated_value = match parts.next() {
            Some(raw) => raw.trim().parse::<f64>().ok()?,
            None => 0.0,
        };
        Some(Self {
            name: name.to_string(),
            area_sqm,
            urgency_level,
            estimated_value,
            observations: String::new(),
        })
    }
}

/// Input for the client registered together with a new project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NewClient {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub salesperson: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub budget_expectation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_system_user: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactoryOrderStatus {
    Requested,
    InProduction,
    Delivered,
}

/// Replacement part requested from the factory for one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryOrder {
    pub id: FactoryOrderId,
    pub project_id: ProjectId,
    pub environment_id: EnvironmentId,
    pub environment_name: String,
    pub part_description: String,
    pub status: FactoryOrderStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_spec_parsing() {
        let env = NewEnvironment::parse_spec("Cozinha:12.5:alta:32000").unwrap();
        assert_eq!(env.name, "Cozinha");
        assert_eq!(env.area_sqm, 12.5);
        assert_eq!(env.urgency_level, UrgencyLevel::High);
        assert_eq!(env.estimated_value, 32000.0);

        let minimal = NewEnvironment::parse_spec("Sala:25").unwrap();
        assert_eq!(minimal.urgency_level, UrgencyLevel::Normal);

        assert!(NewEnvironment::parse_spec("Sala").is_none());
        assert!(NewEnvironment::parse_spec(":10").is_none());
        assert!(NewEnvironment::parse_spec("Sala:10:urgentissimo").is_none());
    }

    #[test]
    fn test_urgency_accepts_portuguese_labels() {
        let parsed: UrgencyLevel = serde_json::from_str("\"Alta\"").unwrap();
        assert_eq!(parsed, UrgencyLevel::High);
        assert!(UrgencyLevel::High > UrgencyLevel::Normal);
    }
}
