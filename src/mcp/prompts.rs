use crate::errors::{ErrorCode, McpError};
use serde_json::{json, Map, Value};

struct PromptArg {
    name: &'static str,
    description: &'static str,
    required: bool,
    fallback: &'static str,
}

struct PromptDef {
    name: &'static str,
    description: &'static str,
    args: &'static [PromptArg],
    template: &'static str,
}

const PROMPTS: &[PromptDef] = &[
    PromptDef {
        name: "analise_vendas",
        description: "Análise de vendas e faturamento de um período",
        args: &[
            PromptArg {
                name: "periodo",
                description: "Período da análise, ex.: 2025-01-01 a 2025-01-31",
                required: true,
                fallback: "",
            },
            PromptArg {
                name: "unidade_negocio",
                description: "Código da empresa (filial)",
                required: false,
                fallback: "todas",
            },
        ],
        template: "Analise as vendas do período {periodo} para a unidade {unidade_negocio}.\n\n\
1. Se a unidade não for um código, use `consultar_empresas` para descobrir o código da filial.\n\
2. Use `vendas_periodo` com data_inicial, data_final e filial.\n\
3. Para detalhar combustíveis, use `consultar_abastecimento` no mesmo período.\n\
4. Para filtrar produtos, obtenha os códigos com `consultar_produto` antes.\n\n\
Apresente faturamento total, produtos mais vendidos e tendências relevantes.",
    },
    PromptDef {
        name: "consulta_estoque",
        description: "Consulta de estoque e produtos",
        args: &[
            PromptArg {
                name: "tipo_produto",
                description: "Tipo de produto: combustível, conveniência ou todos",
                required: false,
                fallback: "todos",
            },
            PromptArg {
                name: "unidade_negocio",
                description: "Código da empresa (filial)",
                required: false,
                fallback: "todas",
            },
        ],
        template: "Consulte o estoque de produtos do tipo {tipo_produto} na unidade {unidade_negocio}.\n\n\
1. Use `consultar_produto` para listar os produtos ativos.\n\
2. Use `estoque` para obter as quantidades atuais.\n\
3. Destaque itens zerados, abaixo do mínimo e sem movimentação.\n\n\
Responda em tabela: Produto | Estoque atual | Situação | Recomendação.",
    },
    PromptDef {
        name: "relatorio_financeiro",
        description: "Relatório de contas a pagar e a receber",
        args: &[
            PromptArg {
                name: "periodo",
                description: "Período do relatório",
                required: true,
                fallback: "",
            },
            PromptArg {
                name: "tipo",
                description: "pagar, receber ou ambos",
                required: false,
                fallback: "ambos",
            },
        ],
        template: "Gere um relatório financeiro ({tipo}) para o período {periodo}.\n\n\
1. Títulos a pagar: `consultar_titulo_pagar` com as datas do período.\n\
2. Títulos a receber: `consultar_titulo_receber` com as datas do período.\n\
3. Separe em aberto, vencidos e quitados e calcule o saldo projetado.\n\n\
Comece por um resumo executivo e depois detalhe por categoria.",
    },
    PromptDef {
        name: "analise_abastecimento",
        description: "Análise de abastecimentos por bomba e bico",
        args: &[
            PromptArg {
                name: "periodo",
                description: "Período da análise",
                required: true,
                fallback: "",
            },
            PromptArg {
                name: "bomba_codigo",
                description: "Código da bomba, opcional",
                required: false,
                fallback: "todas",
            },
        ],
        template: "Analise os abastecimentos do período {periodo} (bomba: {bomba_codigo}).\n\n\
1. Use `consultar_abastecimento` no período.\n\
2. Use `consultar_bomba` e `consultar_bico` para identificar os equipamentos.\n\
3. Calcule volume por combustível, preço médio e horários de pico.\n\n\
Aponte equipamentos com baixa utilização e possíveis manutenções.",
    },
];

pub fn list_prompts() -> Value {
    let prompts: Vec<Value> = PROMPTS
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "description": p.description,
                "arguments": p.args.iter().map(|a| json!({
                    "name": a.name,
                    "description": a.description,
                    "required": a.required,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "prompts": prompts })
}

fn argument_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

pub fn get_prompt(name: &str, arguments: &Map<String, Value>) -> Result<Value, McpError> {
    let prompt = PROMPTS.iter().find(|p| p.name == name).ok_or_else(|| {
        McpError::new(ErrorCode::InvalidParams, format!("Unknown prompt: {}", name))
    })?;
    let mut text = prompt.template.to_string();
    for arg in prompt.args {
        let value = arguments.get(arg.name).and_then(argument_text);
        let value = match value {
            Some(value) => value,
            None if arg.required => {
                return Err(McpError::invalid_params(format!(
                    "Prompt {} requires argument {}",
                    name, arg.name
                )))
            }
            None => arg.fallback.to_string(),
        };
        text = text.replace(&format!("{{{}}}", arg.name), &value);
    }
    Ok(json!({
        "description": prompt.description,
        "messages": [{ "role": "user", "content": { "type": "text", "text": text } }]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EndpointRegistry;
    use once_cell::sync::Lazy;
    use regex::Regex;

    static TOOL_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([a-z_]+)`").expect("regex"));

    #[test]
    fn templates_only_reference_registered_tools() {
        let registry = EndpointRegistry::builtin().expect("registry");
        for prompt in PROMPTS {
            for cap in TOOL_REF.captures_iter(prompt.template) {
                assert!(registry.get(&cap[1]).is_some(), "{} -> {}", prompt.name, &cap[1]);
            }
        }
    }

    #[test]
    fn fills_arguments_and_fallbacks() {
        let mut args = Map::new();
        args.insert("periodo".into(), json!("janeiro de 2025"));
        let out = get_prompt("analise_vendas", &args).expect("prompt");
        let text = out["messages"][0]["content"]["text"].as_str().expect("text");
        assert!(text.contains("janeiro de 2025"));
        assert!(text.contains("unidade todas"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let err = get_prompt("relatorio_financeiro", &Map::new()).expect_err("periodo");
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert!(err.message.contains("periodo"));
    }

    #[test]
    fn lists_all_prompts() {
        let listed = list_prompts();
        assert_eq!(listed["prompts"].as_array().map(Vec::len), Some(4));
    }
}
