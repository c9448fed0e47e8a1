use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::errors::DefinitionError;

/// Business stage codes are tokens like "4.4B" or "10.0"
static STAGE_CODE_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z]+(\.[0-9A-Za-z]+)*$"));

fn is_valid_code(code: &str) -> bool {
    match STAGE_CODE_PATTERN.as_ref() {
        Ok(pattern) => pattern.is_match(code),
        Err(_) => !code.trim().is_empty(),
    }
}

/// One step of the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub code: String,
    pub name: String,
    /// Display grouping, e.g. "3. Medição"
    #[serde(default)]
    pub category: String,
    /// Numeric business phase (1 = pre-sale ... 9 = completed, 10 = assistance)
    #[serde(default)]
    pub phase: u8,
    pub owner_role: String,
    pub sla_days: u32,
}

impl Stage {
    pub fn new(code: &str, name: &str, owner_role: &str, sla_days: u32) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            category: String::new(),
            phase: 0,
            owner_role: owner_role.to_string(),
            sla_days,
        }
    }

    pub fn in_phase(mut self, phase: u8, category: &str) -> Self {
        self.phase = phase;
        self.category = category.to_string();
        self
    }
}

/// Ordered stage catalog.
///
/// Positions are the index in the list the definition was built from and are
/// computed once here; nothing ever orders stages by their code text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Stage>", into = "Vec<Stage>")]
pub struct WorkflowDefinition {
    stages: Vec<Stage>,
    positions: HashMap<String, usize>,
}

impl WorkflowDefinition {
    pub fn new(stages: Vec<Stage>) -> Result<Self, DefinitionError> {
        if stages.is_empty() {
            return Err(DefinitionError::Empty);
        }

        let mut positions = HashMap::with_capacity(stages.len());
        for (position, stage) in stages.iter().enumerate() {
            if !is_valid_code(&stage.code) {
                return Err(DefinitionError::InvalidCode {
                    code: stage.code.clone(),
                });
            }
            if positions.insert(stage.code.clone(), position).is_some() {
                return Err(DefinitionError::DuplicateCode {
                    code: stage.code.clone(),
                });
            }
        }

        Ok(Self { stages, positions })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.positions.contains_key(code)
    }

    /// First stage; new projects start here
    pub fn first(&self) -> &Stage {
        &self.stages[0]
    }

    pub fn terminal(&self) -> &Stage {
        &self.stages[self.stages.len() - 1]
    }

    pub fn index_of(&self, code: &str) -> Result<usize, DefinitionError> {
        self.positions
            .get(code)
            .copied()
            .ok_or_else(|| DefinitionError::UnknownStage {
                code: code.to_string(),
            })
    }

    pub fn stage_at(&self, code: &str) -> Result<&Stage, DefinitionError> {
        self.index_of(code).map(|position| &self.stages[position])
    }

    /// Stage following `code`, or `None` when `code` is terminal
    pub fn next(&self, code: &str) -> Result<Option<&Stage>, DefinitionError> {
        let position = self.index_of(code)?;
        Ok(self.stages.get(position + 1))
    }

    pub fn is_terminal(&self, code: &str) -> Result<bool, DefinitionError> {
        Ok(self.index_of(code)? + 1 == self.stages.len())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|stage| stage.code.as_str())
    }

    /// True when both definitions list the same codes in the same order
    pub fn same_order(&self, other: &WorkflowDefinition) -> bool {
        self.codes().eq(other.codes())
    }

    /// Copy of this definition with one stage's SLA replaced; order is untouched
    pub fn with_sla(&self, code: &str, sla_days: u32) -> Result<Self, DefinitionError> {
        let position = self.index_of(code)?;
        let mut updated = self.clone();
        updated.stages[position].sla_days = sla_days;
        Ok(updated)
    }
}

impl TryFrom<Vec<Stage>> for WorkflowDefinition {
    type Error = DefinitionError;

    fn try_from(stages: Vec<Stage>) -> Result<Self, Self::Error> {
        Self::new(stages)
    }
}

impl From<WorkflowDefinition> for Vec<Stage> {
    fn from(definition: WorkflowDefinition) -> Self {
        definition.stages
    }
}

/// Stage list as found in an external TOML catalog file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageCatalogFile {
    pub stages: Vec<Stage>,
}

impl StageCatalogFile {
    pub fn parse(content: &str) -> Result<WorkflowDefinition, anyhow::Error> {
        let catalog: StageCatalogFile = toml::from_str(content)?;
        Ok(WorkflowDefinition::new(catalog.stages)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_stage_definition() -> WorkflowDefinition {
        WorkflowDefinition::new(vec![
            Stage::new("1.1", "Briefing", "Vendedor", 1),
            Stage::new("1.2", "Showroom", "Vendedor", 5),
            Stage::new("2.1", "Projeto", "Projetista", 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_next_walks_the_explicit_order() {
        let definition = three_stage_definition();
        assert_eq!(definition.next("1.1").unwrap().unwrap().code, "1.2");
        assert_eq!(definition.next("1.2").unwrap().unwrap().code, "2.1");
        assert!(definition.next("2.1").unwrap().is_none());
        assert!(definition.is_terminal("2.1").unwrap());
    }

    #[test]
    fn test_next_is_exactly_one_position_ahead() {
        let definition = three_stage_definition();
        for code in definition.codes() {
            if let Some(next) = definition.next(code).unwrap() {
                assert_eq!(
                    definition.index_of(&next.code).unwrap(),
                    definition.index_of(code).unwrap() + 1
                );
            }
        }
    }

    #[test]
    fn test_order_does_not_follow_code_text() {
        // "10.0" sorts before "9.0" as text and "4.4A" is not numeric at all
        let definition = WorkflowDefinition::new(vec![
            Stage::new("4.4A", "Aprovação Financeira", "Financeiro", 2),
            Stage::new("4.4B", "Detalhamento", "Liberador", 3),
            Stage::new("9.0", "Concluído", "Sistema", 0),
            Stage::new("10.0", "Vistoria", "Supervisor", 3),
        ])
        .unwrap();
        assert_eq!(definition.next("9.0").unwrap().unwrap().code, "10.0");
        assert_eq!(definition.terminal().code, "10.0");
        assert_eq!(definition.index_of("4.4B").unwrap(), 1);
    }

    #[test]
    fn test_rejects_duplicates_and_bad_codes() {
        let duplicate = WorkflowDefinition::new(vec![
            Stage::new("1.1", "A", "R", 0),
            Stage::new("1.1", "B", "R", 0),
        ]);
        assert_eq!(
            duplicate.unwrap_err(),
            DefinitionError::DuplicateCode { code: "1.1".into() }
        );

        let blank = WorkflowDefinition::new(vec![Stage::new(" ", "A", "R", 0)]);
        assert!(matches!(blank, Err(DefinitionError::InvalidCode { .. })));

        assert_eq!(WorkflowDefinition::new(vec![]).unwrap_err(), DefinitionError::Empty);
    }

    #[test]
    fn test_unknown_codes_are_reported() {
        let definition = three_stage_definition();
        assert!(matches!(
            definition.stage_at("7.7"),
            Err(DefinitionError::UnknownStage { .. })
        ));
        assert!(definition.next("7.7").is_err());
    }

    #[test]
    fn test_sla_update_keeps_order() {
        let definition = three_stage_definition();
        let updated = definition.with_sla("1.2", 9).unwrap();
        assert_eq!(updated.stage_at("1.2").unwrap().sla_days, 9);
        assert!(updated.same_order(&definition));
        assert!(definition.with_sla("3.3", 1).is_err());
    }

    #[test]
    fn test_serde_round_trip_revalidates() {
        let json = r#"[{"code":"1.1","name":"A","owner_role":"R","sla_days":1},
                       {"code":"1.1","name":"B","owner_role":"R","sla_days":1}]"#;
        assert!(serde_json::from_str::<WorkflowDefinition>(json).is_err());
    }

    #[test]
    fn test_catalog_file_parsing() {
        let content = r#"
            [[stages]]
            code = "1.1"
            name = "Briefing"
            owner_role = "Vendedor"
            sla_days = 1
            phase = 1

            [[stages]]
            code = "1.2"
            name = "Showroom"
            owner_role = "Vendedor"
            sla_days = 5
        "#;
        let definition = StageCatalogFile::parse(content).unwrap();
        assert_eq!(definition.len(), 2);
        assert_eq!(definition.first().phase, 1);
    }
}
