use crate::constants::pagination::{
    FALLBACK_CURSOR_FIELDS, MAX_PAGE_SIZE, MIN_PAGE_SIZE, PAGE_SIZE, RECORD_KEYS,
};
use crate::registry::EndpointDefinition;
use crate::services::validation::NormalizedQuery;
use serde::Serialize;
use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationState {
    cursor_wire: String,
    cursor_field: Option<String>,
    page_size: u64,
    requested_size: Option<i128>,
    cursor: Option<String>,
    query: NormalizedQuery,
    last_page_len: Option<usize>,
    last_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageStep {
    Next(NormalizedQuery),
    Exhausted,
}

/// Pagination summary attached to list results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    pub limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub records: usize,
    pub exhausted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clamped_from: Option<Number>,
}

// Validated integers span i64 and u64, so i128 holds any of them.
fn clamp_page_size(requested: Option<i128>) -> u64 {
    match requested {
        None => PAGE_SIZE,
        Some(value) if value < i128::from(MIN_PAGE_SIZE) => MIN_PAGE_SIZE,
        Some(value) if value > i128::from(MAX_PAGE_SIZE) => MAX_PAGE_SIZE,
        Some(value) => value as u64,
    }
}

fn as_number(value: i128) -> Option<Number> {
    i64::try_from(value)
        .map(Number::from)
        .ok()
        .or_else(|| u64::try_from(value).map(Number::from).ok())
}

/// Shapes the first request of a list endpoint. `None` when the endpoint is not paginated.
pub fn first_page(
    endpoint: &EndpointDefinition,
    mut query: NormalizedQuery,
) -> Option<(NormalizedQuery, ContinuationState)> {
    let spec = endpoint.pagination.as_ref()?;
    let limit_wire = endpoint
        .param(&spec.limit_param)
        .map(|p| p.wire_name())
        .unwrap_or(spec.limit_param.as_str())
        .to_string();
    let cursor_wire = endpoint
        .param(&spec.cursor_param)
        .map(|p| p.wire_name())
        .unwrap_or(spec.cursor_param.as_str())
        .to_string();

    let requested_size = query
        .scalar(&limit_wire)
        .and_then(|raw| raw.parse::<i128>().ok());
    let page_size = clamp_page_size(requested_size);
    query.set_scalar(&limit_wire, page_size.to_string());
    let cursor = query.scalar(&cursor_wire).map(str::to_string);

    let state = ContinuationState {
        cursor_wire,
        cursor_field: spec.cursor_field.clone(),
        page_size,
        requested_size: requested_size.filter(|value| *value != i128::from(page_size)),
        cursor,
        query: query.clone(),
        last_page_len: None,
        last_id: None,
    };
    Some((query, state))
}

/// Records what the page just fetched contained.
pub fn observe(mut state: ContinuationState, records: &[Value]) -> ContinuationState {
    state.last_page_len = Some(records.len());
    state.last_id = records
        .last()
        .and_then(|record| cursor_id(record, state.cursor_field.as_deref()));
    state
}

pub fn next_page(state: &ContinuationState) -> PageStep {
    let len = state.last_page_len.unwrap_or(0) as u64;
    if len < state.page_size {
        return PageStep::Exhausted;
    }
    let Some(last_id) = state.last_id.as_ref() else {
        return PageStep::Exhausted;
    };
    let mut query = state.query.clone();
    query.set_scalar(&state.cursor_wire, last_id.clone());
    PageStep::Next(query)
}

impl ContinuationState {
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn page_info(&self) -> PageInfo {
        let next_cursor = match next_page(self) {
            PageStep::Next(query) => query.scalar(&self.cursor_wire).map(str::to_string),
            PageStep::Exhausted => None,
        };
        PageInfo {
            limit: self.page_size,
            cursor: self.cursor.clone(),
            records: self.last_page_len.unwrap_or(0),
            exhausted: next_cursor.is_none(),
            next_cursor,
            clamped_from: self.requested_size.and_then(as_number),
        }
    }
}

fn render_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn cursor_id(record: &Value, declared: Option<&str>) -> Option<String> {
    let obj = record.as_object()?;
    for field in declared.into_iter().chain(FALLBACK_CURSOR_FIELDS.iter().copied()) {
        if let Some(id) = obj.get(field).and_then(render_id) {
            return Some(id);
        }
    }
    let mut codes = obj
        .iter()
        .filter(|(key, _)| key.ends_with("Codigo"))
        .filter_map(|(_, value)| render_id(value));
    match (codes.next(), codes.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Finds the record list in an ERP payload: a bare array or a wrapped one.
pub fn extract_records(payload: &Value) -> Option<&[Value]> {
    match payload {
        Value::Array(items) => Some(items.as_slice()),
        Value::Object(map) => RECORD_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_array()))
            .map(|items| items.as_slice()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EndpointRegistry;
    use crate::services::validation::Validation;
    use serde_json::json;

    fn setup(args: Value) -> (NormalizedQuery, ContinuationState) {
        let registry = EndpointRegistry::builtin().expect("registry");
        let endpoint = registry.get("consultar_venda").expect("endpoint");
        let query = Validation::new()
            .validate(endpoint, args.as_object().expect("object"))
            .expect("valid");
        first_page(endpoint, query).expect("paginated")
    }

    fn records(count: usize, start: u64) -> Vec<Value> {
        (0..count)
            .map(|i| json!({"codigo": start + i as u64, "valor": 1}))
            .collect()
    }

    #[test]
    fn default_page_size_is_applied() {
        let (query, state) = setup(json!({}));
        assert_eq!(query.scalar("limite"), Some("100"));
        assert_eq!(state.page_size(), 100);
        assert_eq!(state.page_info().clamped_from, None);
    }

    #[test]
    fn oversized_and_undersized_limits_are_clamped() {
        let (query, state) = setup(json!({"limite": 5000}));
        assert_eq!(query.scalar("limite"), Some("2000"));
        assert_eq!(state.page_info().clamped_from, Some(Number::from(5000)));

        let (query, _) = setup(json!({"limite": 0}));
        assert_eq!(query.scalar("limite"), Some("1"));

        let (query, state) = setup(json!({"limite": 2000}));
        assert_eq!(query.scalar("limite"), Some("2000"));
        assert_eq!(state.page_info().clamped_from, None);
    }

    #[test]
    fn limits_beyond_i64_still_clamp_to_the_maximum() {
        let (query, state) = setup(json!({"limite": 10_000_000_000_000_000_000u64}));
        assert_eq!(query.scalar("limite"), Some("2000"));
        let info = state.page_info();
        assert_eq!(info.limit, 2000);
        assert_eq!(
            info.clamped_from,
            Some(Number::from(10_000_000_000_000_000_000u64))
        );
    }

    #[test]
    fn short_page_is_exhausted() {
        let (_, state) = setup(json!({"limite": 10}));
        let state = observe(state, &records(3, 1));
        assert_eq!(next_page(&state), PageStep::Exhausted);
        let info = state.page_info();
        assert!(info.exhausted);
        assert_eq!(info.records, 3);
        assert_eq!(info.next_cursor, None);
    }

    #[test]
    fn full_page_continues_from_last_id() {
        let (_, state) = setup(json!({"limite": 2, "situacao": "A"}));
        let state = observe(state, &records(2, 40));
        let PageStep::Next(query) = next_page(&state) else {
            panic!("expected another page");
        };
        assert_eq!(query.scalar("ultimoCodigo"), Some("41"));
        assert_eq!(query.scalar("limite"), Some("2"));
        assert_eq!(query.scalar("situacao"), Some("A"));
        assert_eq!(state.page_info().next_cursor.as_deref(), Some("41"));
    }

    #[test]
    fn full_page_without_ids_is_exhausted() {
        let (_, state) = setup(json!({"limite": 1}));
        let state = observe(state, &[json!({"valor": 1})]);
        assert_eq!(next_page(&state), PageStep::Exhausted);
    }

    #[test]
    fn cursor_falls_back_to_single_codigo_field() {
        assert_eq!(
            cursor_id(&json!({"vendaCodigo": 9, "valor": 1}), Some("codigo")),
            Some("9".to_string())
        );
        assert_eq!(cursor_id(&json!({"id": "abc"}), None), Some("abc".to_string()));
        assert_eq!(cursor_id(&json!({"aCodigo": 1, "bCodigo": 2}), None), None);
    }

    #[test]
    fn incoming_cursor_is_reported() {
        let (_, state) = setup(json!({"ultimo_codigo": 77}));
        assert_eq!(state.page_info().cursor.as_deref(), Some("77"));
    }

    #[test]
    fn extracts_wrapped_records() {
        let bare = json!([{"codigo": 1}]);
        assert_eq!(extract_records(&bare).map(<[Value]>::len), Some(1));
        let wrapped = json!({"resultados": [{"codigo": 1}, {"codigo": 2}]});
        assert_eq!(extract_records(&wrapped).map(<[Value]>::len), Some(2));
        assert_eq!(extract_records(&json!({"total": 3})), None);
    }
}
