//! Query parameter and form-data editing helpers
//!
//! The URL and its parameter list are edited from both sides. Parsing goes
//! URL -> params on each URL edit; rebuilding goes params -> URL and is
//! debounced by the app layer.

use serde::Serialize;
use url::form_urlencoded;

use crate::models::Param;

/// Split a URL into its base and query (fragment dropped)
fn split_query(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((base, rest)) => {
            let query = rest.split_once('#').map(|(q, _)| q).unwrap_or(rest);
            (base, Some(query))
        }
        None => (url, None),
    }
}

/// Parse the URL's query string into enabled parameters
pub fn parse_query_params(url: &str) -> Vec<Param> {
    match split_query(url) {
        (_, Some(query)) if !query.is_empty() => form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| Param::new(key, value))
            .collect(),
        _ => Vec::new(),
    }
}

/// Encode enabled, keyed parameters as a query string (no leading `?`)
pub fn build_query_string(params: &[Param]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for param in params.iter().filter(|p| p.is_active()) {
        serializer.append_pair(&param.key, &param.value);
    }
    // Keep {{templates}} readable so they still substitute at send time
    serializer.finish().replace("%7B", "{").replace("%7D", "}")
}

/// Rebuild `url` from `params`, replacing any existing query string
pub fn build_url(url: &str, params: &[Param]) -> String {
    let (base, _) = split_query(url);
    let query = build_query_string(params);
    if query.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, query)
    }
}

#[derive(Serialize)]
struct FormField<'a> {
    key: &'a str,
    value: &'a str,
}

/// JSON-encoded `[{key, value}]` of the active form rows
pub fn form_data_body(params: &[Param]) -> String {
    let fields: Vec<FormField> = params
        .iter()
        .filter(|p| p.is_active())
        .map(|p| FormField {
            key: &p.key,
            value: &p.value,
        })
        .collect();
    serde_json::to_string(&fields).unwrap_or_else(|_| String::from("[]"))
}

/// Parse a stored form-data body back into editable rows
pub fn parse_form_data(body: &str) -> Vec<Param> {
    if body.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<Param>>(body) {
        Ok(params) => params,
        Err(e) => {
            tracing::debug!(error = %e, "Form-data body is not a key/value list");
            Vec::new()
        }
    }
}
