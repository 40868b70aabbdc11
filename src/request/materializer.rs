//! Materializer - script, substitution and auth headers, in that order

use base64::Engine;

use crate::error::Result;
use crate::models::{AuthType, Header, HttpMethod, Request, RequestType, Variable};
use crate::script;
use crate::variables::{flatten_scopes, Resolver};
use crate::workspace::Workspace;

/// A fully substituted request, ready for a transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterializedRequest {
    pub request_id: String,
    pub kind: RequestType,
    pub method: HttpMethod,
    pub url: String,
    /// Enabled headers in order, auth last. Duplicates are kept.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl MaterializedRequest {
    /// Last value of a header, compared case-insensitively
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Materialize `request` using its owning collection and the active environment
pub fn prepare(workspace: &Workspace, request: &Request) -> Result<MaterializedRequest> {
    materialize(request, workspace.scope_chain(&request.id))
}

/// Materialize `request` against `scopes` (lowest precedence first).
///
/// For HTTP requests with a script, the script runs first and its variables
/// and headers replace the stored ones. A script failure aborts here.
pub fn materialize(request: &Request, scopes: Vec<Vec<Variable>>) -> Result<MaterializedRequest> {
    let (scopes, headers) = match request.script() {
        Some(source) => {
            tracing::debug!(request_id = %request.id, "Running pre-request script");
            let outcome = script::run(source, &flatten_scopes(&scopes), &request.headers)?;
            (vec![outcome.variables], outcome.headers)
        }
        None => (scopes, request.headers.clone()),
    };

    let resolver = Resolver::new(&scopes);

    let mut resolved_headers = substitute_headers(&resolver, &headers);
    if let Some(auth) = auth_header(&resolver, &request.auth) {
        resolved_headers.push(auth);
    }

    let body = request.body.payload().map(|text| resolver.resolve(&text));

    let materialized = MaterializedRequest {
        request_id: request.id.clone(),
        kind: request.kind,
        method: request.method,
        url: resolver.resolve(&request.url),
        headers: resolved_headers,
        body,
    };
    tracing::debug!(
        request_id = %materialized.request_id,
        url = %materialized.url,
        headers = materialized.headers.len(),
        "Request materialized"
    );
    Ok(materialized)
}

fn substitute_headers(resolver: &Resolver, headers: &[Header]) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|h| h.is_active())
        .map(|h| (resolver.resolve(&h.key), resolver.resolve(&h.value)))
        .collect()
}

/// `Authorization` header for the auth settings, credentials substituted first
fn auth_header(resolver: &Resolver, auth: &AuthType) -> Option<(String, String)> {
    match auth {
        AuthType::Bearer { bearer } => {
            let token = resolver.resolve(&bearer.token);
            Some(("Authorization".to_string(), format!("Bearer {}", token)))
        }
        AuthType::Basic { basic } => {
            let credentials = format!(
                "{}:{}",
                resolver.resolve(&basic.username),
                resolver.resolve(&basic.password)
            );
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            Some(("Authorization".to_string(), format!("Basic {}", encoded)))
        }
        AuthType::None => None,
    }
}
