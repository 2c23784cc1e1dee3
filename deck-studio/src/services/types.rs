use deck_axum::RestParams;

pub type StudioParams = RestParams;

/// Params for service-to-service calls made from hooks.
pub fn internal_params(query: &[(&str, &str)]) -> StudioParams {
    RestParams {
        provider: "internal".to_string(),
        query: query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        ..RestParams::default()
    }
}

/// True when the comma-separated query value `key` lists `item`.
pub fn query_lists(params: &StudioParams, key: &str, item: &str) -> bool {
    params
        .query_value(key)
        .is_some_and(|v| v.split(',').map(str::trim).any(|s| s.eq_ignore_ascii_case(item)))
}
