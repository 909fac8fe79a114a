use crate::registry::EndpointDefinition;
use crate::services::validation::NormalizedQuery;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    MissingPrerequisite,
    DefaultTenantApplied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub parameter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tool: Option<String>,
    pub message: String,
}

impl Advisory {
    pub fn default_tenant(parameter: &str, company: &str) -> Self {
        Self {
            kind: AdvisoryKind::DefaultTenantApplied,
            parameter: parameter.to_string(),
            source_tool: None,
            message: format!(
                "{} was not given; using the configured default company {}",
                parameter, company
            ),
        }
    }
}

/// Flags parameters that should have come from another tool but were left out.
/// Never blocks a call: the ERP decides whether the identifiers are valid.
pub fn check(endpoint: &EndpointDefinition, query: &NormalizedQuery) -> Vec<Advisory> {
    endpoint
        .prerequisites()
        .filter(|(spec, _)| !query.contains(spec.wire_name()))
        .map(|(spec, tool)| Advisory {
            kind: AdvisoryKind::MissingPrerequisite,
            parameter: spec.name.clone(),
            source_tool: Some(tool.to_string()),
            message: format!(
                "{} was not resolved via {}; results are not narrowed by it",
                spec.name, tool
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EndpointRegistry;
    use crate::services::validation::Validation;
    use serde_json::json;

    #[test]
    fn flags_only_absent_prerequisites() {
        let registry = EndpointRegistry::builtin().expect("registry");
        let vendas = registry.get("vendas_periodo").expect("endpoint");
        let args = json!({"data_inicial": "2025-01-01", "data_final": "2025-01-31", "filial": [7]});
        let query = Validation::new()
            .validate(vendas, args.as_object().expect("object"))
            .expect("valid");
        let advisories = check(vendas, &query);
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].kind, AdvisoryKind::MissingPrerequisite);
        assert_eq!(advisories[0].parameter, "produto");
        assert_eq!(advisories[0].source_tool.as_deref(), Some("consultar_produto"));
    }

    #[test]
    fn endpoints_without_prerequisites_are_silent() {
        let registry = EndpointRegistry::builtin().expect("registry");
        let empresas = registry.get("consultar_empresas").expect("endpoint");
        assert!(check(empresas, &NormalizedQuery::default()).is_empty());
    }
}
