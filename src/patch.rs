// Explicit partial updates. Each patch lists exactly the editable fields;
// applying one validates every present field before touching the target.

use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;
use crate::model::{Client, Environment, EnvironmentStatus, UrgencyLevel};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub cpf: Option<String>,
    pub origin: Option<String>,
    pub store_unit: Option<String>,
    pub salesperson: Option<String>,
    pub property_type: Option<String>,
    pub move_in_date: Option<String>,
    pub budget_expectation: Option<f64>,
}

fn set_field<T: PartialEq>(target: &mut T, value: Option<T>, field: &str, changed: &mut Vec<String>) {
    if let Some(value) = value {
        if *target != value {
            *target = value;
            changed.push(field.to_string());
        }
    }
}

fn set_optional<T: PartialEq>(
    target: &mut Option<T>,
    value: Option<T>,
    field: &str,
    changed: &mut Vec<String>,
) {
    if let Some(value) = value {
        if target.as_ref() != Some(&value) {
            *target = Some(value);
            changed.push(field.to_string());
        }
    }
}

impl ClientPatch {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(WorkflowError::validation("client name cannot be empty"));
            }
        }
        if let Some(email) = &self.email {
            if !email.is_empty() && !email.contains('@') {
                return Err(WorkflowError::validation(format!("invalid email: {email}")));
            }
        }
        if let Some(budget) = self.budget_expectation {
            if !budget.is_finite() || budget < 0.0 {
                return Err(WorkflowError::validation("budget expectation must be non-negative"));
            }
        }
        Ok(())
    }

    /// Applies the patch and returns the names of the fields that changed
    pub fn apply(self, client: &mut Client) -> Result<Vec<String>, WorkflowError> {
        self.validate()?;
        let mut changed = Vec::new();
        set_field(&mut client.name, self.name, "name", &mut changed);
        set_field(&mut client.phone, self.phone, "phone", &mut changed);
        set_field(&mut client.email, self.email, "email", &mut changed);
        set_field(&mut client.address, self.address, "address", &mut changed);
        set_optional(&mut client.cpf, self.cpf, "cpf", &mut changed);
        set_optional(&mut client.origin, self.origin, "origin", &mut changed);
        set_optional(&mut client.store_unit, self.store_unit, "store_unit", &mut changed);
        set_optional(&mut client.salesperson, self.salesperson, "salesperson", &mut changed);
        set_optional(&mut client.property_type, self.property_type, "property_type", &mut changed);
        set_optional(&mut client.move_in_date, self.move_in_date, "move_in_date", &mut changed);
        set_optional(
            &mut client.budget_expectation,
            self.budget_expectation,
            "budget_expectation",
            &mut changed,
        );
        Ok(changed)
    }
}

/// Editable environment fields. Batch membership is deliberately absent:
/// only a split moves an environment between batches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentPatch {
    pub name: Option<String>,
    pub area_sqm: Option<f64>,
    pub urgency_level: Option<UrgencyLevel>,
    pub estimated_value: Option<f64>,
    pub observations: Option<String>,
    pub status: Option<EnvironmentStatus>,
}

impl EnvironmentPatch {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(WorkflowError::validation("environment name cannot be empty"));
            }
        }
        if let Some(area) = self.area_sqm {
            if !area.is_finite() || area <= 0.0 {
                return Err(WorkflowError::validation(format!(
                    "area must be positive, got {area}"
                )));
            }
        }
        if let Some(value) = self.estimated_value {
            if !value.is_finite() || value < 0.0 {
                return Err(WorkflowError::validation("estimated value must be non-negative"));
            }
        }
        Ok(())
    }

    pub fn apply(self, environment: &mut Environment) -> Result<Vec<String>, WorkflowError> {
        self.validate()?;
        let mut changed = Vec::new();
        set_field(&mut environment.name, self.name, "name", &mut changed);
        set_field(&mut environment.area_sqm, self.area_sqm, "area_sqm", &mut changed);
        set_field(
            &mut environment.urgency_level,
            self.urgency_level,
            "urgency_level",
            &mut changed,
        );
        set_field(
            &mut environment.estimated_value,
            self.estimated_value,
            "estimated_value",
            &mut changed,
        );
        set_field(&mut environment.observations, self.observations, "observations", &mut changed);
        set_field(&mut environment.status, self.status, "status", &mut changed);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnvironmentId, ProjectId};

    fn kitchen() -> Environment {
        Environment {
            id: EnvironmentId::new(),
            project_id: ProjectId::new(),
            name: "Cozinha".into(),
            area_sqm: 12.0,
            urgency_level: UrgencyLevel::High,
            estimated_value: 32000.0,
            observations: String::new(),
            status: EnvironmentStatus::InBatch,
            batch_id: None,
        }
    }

    #[test]
    fn test_environment_patch_reports_only_real_changes() {
        let mut env = kitchen();
        let changed = EnvironmentPatch {
            area_sqm: Some(14.0),
            urgency_level: Some(UrgencyLevel::High),
            ..Default::default()
        }
        .apply(&mut env)
        .unwrap();
        assert_eq!(changed, vec!["area_sqm".to_string()]);
        assert_eq!(env.area_sqm, 14.0);
    }

    #[test]
    fn test_environment_patch_validation_leaves_target_untouched() {
        let mut env = kitchen();
        let result = EnvironmentPatch {
            name: Some("Cozinha Gourmet".into()),
            area_sqm: Some(-1.0),
            ..Default::default()
        }
        .apply(&mut env);
        assert!(matches!(result, Err(WorkflowError::Validation { .. })));
        assert_eq!(env.name, "Cozinha");
    }

    #[test]
    fn test_client_patch_sets_optional_fields() {
        let mut client = Client {
            name: "Ana Silva".into(),
            ..Default::default()
        };
        let changed = ClientPatch {
            origin: Some("Instagram".into()),
            phone: Some("11999999999".into()),
            ..Default::default()
        }
        .apply(&mut client)
        .unwrap();
        assert_eq!(changed, vec!["phone".to_string(), "origin".to_string()]);
        assert_eq!(client.origin.as_deref(), Some("Instagram"));

        let bad = ClientPatch {
            email: Some("not-an-email".into()),
            ..Default::default()
        };
        assert!(bad.apply(&mut client).is_err());
    }
}
