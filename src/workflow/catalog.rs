// Built-in stage catalog for the furniture installation workflow

use super::definition::{Stage, WorkflowDefinition};
use crate::errors::DefinitionError;

/// Split-off work restarts at the first Executive stage
pub const DEFAULT_REENTRY_STAGE: &str = "4.1";

/// Name given to the batch created together with a project
pub const DEFAULT_INITIAL_BATCH_NAME: &str = "Projeto Completo";

const STAGES: &[(&str, &str, u8, &str, &str, u32)] = &[
    ("1.1", "Briefing e Qualificação", 1, "1. Pré-Venda", "Vendedor", 1),
    ("1.2", "Visita Showroom", 1, "1. Pré-Venda", "Vendedor", 1),
    ("1.3", "Follow Up", 1, "1. Pré-Venda", "Vendedor", 5),
    ("2.1", "Projetar Ambientes", 2, "2. Venda / Projeto", "Projetista", 1),
    ("2.2", "Projetar Mobiliário", 2, "2. Venda / Projeto", "Projetista", 4),
    ("2.3", "Orçamento", 2, "2. Venda / Projeto", "Projetista", 0),
    ("2.4", "Renderização", 2, "2. Venda / Projeto", "Projetista", 1),
    ("2.5", "Apresentação", 2, "2. Venda / Projeto", "Vendedor", 0),
    ("2.6", "Ajuste de Proposta", 2, "2. Venda / Projeto", "Projetista", 3),
    ("2.9", "Detalhamento Contrato", 2, "2. Venda / Projeto", "Vendedor", 1),
    ("2.10", "Aprovação Final", 2, "2. Venda / Projeto", "Vendedor", 2),
    ("3.1", "Agendamento", 3, "3. Medição", "Medidor", 0),
    ("3.2", "Execução in Loco", 3, "3. Medição", "Medidor", 1),
    ("4.1", "Construção Ambientes", 4, "4. Executivo", "Liberador", 1),
    ("4.2", "Alinhamento Vendas", 4, "4. Executivo", "Vendedor", 1),
    ("4.3", "Construção Mobiliário", 4, "4. Executivo", "Liberador", 4),
    ("4.4A", "Aprovação Financeira", 4, "4. Executivo", "Financeiro", 2),
    ("4.4B", "Detalhamento Executivo", 4, "4. Executivo", "Liberador", 3),
    ("4.4C", "Aprovação Cliente", 4, "4. Executivo", "Vendedor", 2),
    ("5.1", "Implantação/Pedido", 5, "5. Fabricação", "Financeiro", 1),
    ("5.2", "Produção Indústria", 5, "5. Fabricação", "Indústria", 26),
    ("6.1", "Verificação Pré-Montagem", 6, "6. Entrega", "Coord. Montagem", 2),
    ("6.3", "Transporte", 6, "6. Entrega", "Equipe Entrega", 5),
    ("7.1", "Execução Montagem", 7, "7. Montagem", "Equipe Montagem", 3),
    ("7.2", "Checklist Final", 7, "7. Montagem", "Coord. Montagem", 1),
    ("8.1", "Solicitação Peças", 8, "8. Reposição", "Liberador", 2),
    ("8.2", "Fabricação Reposição", 8, "8. Reposição", "Indústria", 15),
    ("8.4", "Instalação", 8, "8. Reposição", "Equipe Montagem", 7),
    ("9.0", "Projeto Concluído", 9, "9. Concluído", "Sistema", 0),
];

/// The standard delivery catalog, in business order. It ends at `9.0`;
/// technical assistance runs as its own ticket flow outside the batch workflow.
pub fn default_definition() -> Result<WorkflowDefinition, DefinitionError> {
    let stages = STAGES
        .iter()
        .map(|(code, name, phase, category, role, sla)| {
            Stage::new(code, name, role, *sla).in_phase(*phase, category)
        })
        .collect();
    WorkflowDefinition::new(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid_and_ordered() {
        let definition = default_definition().unwrap();
        assert_eq!(definition.len(), 29);
        assert_eq!(definition.first().code, "1.1");
        assert_eq!(definition.terminal().code, "9.0");
        assert!(definition.is_terminal("9.0").unwrap());
        assert_eq!(definition.next("3.2").unwrap().unwrap().code, DEFAULT_REENTRY_STAGE);
        assert_eq!(definition.next("4.4A").unwrap().unwrap().code, "4.4B");
        assert!(definition.next("9.0").unwrap().is_none());
    }

    #[test]
    fn test_phases_never_decrease() {
        let definition = default_definition().unwrap();
        let phases: Vec<u8> = definition.stages().iter().map(|s| s.phase).collect();
        assert!(phases.windows(2).all(|w| w[0] <= w[1]));
    }
}
