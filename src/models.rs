use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// HTTP Method enum
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    OPTIONS,
    HEAD,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::HEAD => "HEAD",
        }
    }

    pub fn parse(s: &str) -> Option<HttpMethod> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            "HEAD" => Some(HttpMethod::HEAD),
            _ => None,
        }
    }

    /// The proxy forwards a body for every method except GET
    pub fn has_body(&self) -> bool {
        !matches!(self, HttpMethod::GET)
    }
}

/// Transport protocol of a request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    #[default]
    Http,
    #[serde(rename = "websocket")]
    WebSocket,
    #[serde(rename = "socketio")]
    SocketIo,
}

/// A single scoped variable
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Variable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Variable {
            key: key.into(),
            value: value.into(),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// HTTP Header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            enabled: false,
            ..Header::new(key, value)
        }
    }

    /// Blank rows are left out like disabled ones
    pub fn is_active(&self) -> bool {
        self.enabled && !self.key.is_empty()
    }
}

/// An editable key/value row (query parameters, form-data fields)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl Param {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Param {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Param {
            enabled: false,
            ..Param::new(key, value)
        }
    }

    /// Only enabled rows with a key take part in query strings and form bodies
    pub fn is_active(&self) -> bool {
        self.enabled && !self.key.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken {
    #[serde(default)]
    pub token: String,
}

/// Authentication attached to a request.
///
/// Serialized as `{"type": "basic", "basic": {...}}` so a payload can only
/// exist next to its own tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    None,
    Basic { basic: BasicCredentials },
    Bearer { bearer: BearerToken },
}

impl AuthType {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthType::Basic {
            basic: BasicCredentials {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        AuthType::Bearer {
            bearer: BearerToken {
                token: token.into(),
            },
        }
    }
}

/// Discriminant of [`Body`] as stored on the wire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyType {
    #[default]
    None,
    Json,
    FormData,
    Raw,
}

/// Request body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    /// No body is sent; the text is kept so switching back restores it
    None(String),
    Json(String),
    /// Editable rows; the wire text is derived from them
    FormData(Vec<Param>),
    Raw(String),
}

impl Default for Body {
    fn default() -> Self {
        Body::None(String::new())
    }
}

impl Body {
    pub fn body_type(&self) -> BodyType {
        match self {
            Body::None(_) => BodyType::None,
            Body::Json(_) => BodyType::Json,
            Body::FormData(_) => BodyType::FormData,
            Body::Raw(_) => BodyType::Raw,
        }
    }

    /// Stored text, including the text held by a `None` body
    pub fn text(&self) -> String {
        match self {
            Body::None(text) | Body::Json(text) | Body::Raw(text) => text.clone(),
            Body::FormData(params) => crate::request::params::form_data_body(params),
        }
    }

    /// Text to transmit, if any
    pub fn payload(&self) -> Option<String> {
        match self {
            Body::None(_) => None,
            other => Some(other.text()).filter(|text| !text.is_empty()),
        }
    }

    /// Rebuild a body from its wire pair
    pub fn from_wire(body_type: Option<BodyType>, text: String) -> Body {
        match body_type {
            Some(BodyType::Json) => Body::Json(text),
            Some(BodyType::Raw) => Body::Raw(text),
            Some(BodyType::FormData) => Body::FormData(crate::request::params::parse_form_data(&text)),
            Some(BodyType::None) => Body::None(text),
            // Older records carry a body without a type
            None if !text.is_empty() => Body::Raw(text),
            None => Body::None(text),
        }
    }

    /// Switch the body type, carrying the current content across
    pub fn convert(&self, body_type: BodyType) -> Body {
        if self.body_type() == body_type {
            return self.clone();
        }
        Body::from_wire(Some(body_type), self.text())
    }
}

/// A single request definition
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RequestRecord", into = "RequestRecord")]
pub struct Request {
    pub id: String,
    pub name: String,
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: Body,
    pub auth: AuthType,
    pub kind: RequestType,
    pub pre_request_script: Option<String>,
    pub collection_id: Option<String>,
}

impl Request {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Request {
            id: id.into(),
            name: name.into(),
            ..Request::default()
        }
    }

    /// The script to run before sending, if any applies
    pub fn script(&self) -> Option<&str> {
        match (&self.kind, self.pre_request_script.as_deref()) {
            (RequestType::Http, Some(script)) if !script.trim().is_empty() => Some(script),
            _ => None,
        }
    }
}

/// Wire shape of a request as exchanged with the remote store
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "method_or_default")]
    pub method: HttpMethod,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_type: Option<BodyType>,
    #[serde(default)]
    pub auth: AuthType,
    #[serde(rename = "type", default)]
    pub kind: RequestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_request_script: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub collection_id: Option<String>,
}

impl From<RequestRecord> for Request {
    fn from(record: RequestRecord) -> Self {
        Request {
            id: record.id,
            name: record.name,
            method: record.method,
            url: record.url,
            headers: record.headers,
            body: Body::from_wire(record.body_type, record.body),
            auth: record.auth,
            kind: record.kind,
            pre_request_script: record.pre_request_script,
            collection_id: record.collection_id,
        }
    }
}

impl From<Request> for RequestRecord {
    fn from(request: Request) -> Self {
        RequestRecord {
            body: request.body.text(),
            body_type: Some(request.body.body_type()),
            id: request.id,
            name: request.name,
            method: request.method,
            url: request.url,
            headers: request.headers,
            auth: request.auth,
            kind: request.kind,
            pre_request_script: request.pre_request_script,
            collection_id: request.collection_id,
        }
    }
}

/// A folder inside a collection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub requests: Vec<Request>,
}

/// A collection of requests
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub requests: Vec<Request>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Collection {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Collection {
            id: id.into(),
            name: name.into(),
            ..Collection::default()
        }
    }

    /// Whether the request lives here, directly or inside a folder
    pub fn owns(&self, request_id: &str) -> bool {
        self.requests.iter().any(|r| r.id == request_id)
            || self
                .folders
                .iter()
                .any(|f| f.requests.iter().any(|r| r.id == request_id))
    }

    pub fn all_requests(&self) -> impl Iterator<Item = &Request> {
        self.requests
            .iter()
            .chain(self.folders.iter().flat_map(|f| f.requests.iter()))
    }

    pub fn all_requests_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.requests
            .iter_mut()
            .chain(self.folders.iter_mut().flat_map(|f| f.requests.iter_mut()))
    }
}

/// Environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Environment {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Environment {
            id: id.into(),
            name: name.into(),
            variables: Vec::new(),
        }
    }

    /// Set a variable, replacing an existing key in place
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.variables.iter_mut().find(|v| v.key == key) {
            Some(existing) => existing.value = value,
            None => self.variables.push(Variable { key, value }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .rev()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }
}

/// Response from an HTTP request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default)]
    pub status_text: String,
    #[serde(default, deserialize_with = "header_values")]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Elapsed milliseconds, measured client-side
    #[serde(default)]
    pub time: u64,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// A response that only carries an error
    pub fn failed(message: impl Into<String>, time: u64) -> Self {
        Response {
            error: Some(message.into()),
            time,
            ..Response::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Kind of a socket log message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Sent,
    Received,
    Info,
    Error,
    Success,
}

/// A socket session log entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: String,
    pub time: chrono::DateTime<chrono::Utc>,
}

impl Message {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Message {
            kind,
            text: text.into(),
            time: chrono::Utc::now(),
        }
    }

    pub fn sent(text: impl Into<String>) -> Self {
        Message::new(MessageKind::Sent, text)
    }

    pub fn received(text: impl Into<String>) -> Self {
        Message::new(MessageKind::Received, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Message::new(MessageKind::Info, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Message::new(MessageKind::Error, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Message::new(MessageKind::Success, text)
    }
}

// Store ids are sometimes numeric
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_string_or_number(deserializer)?.unwrap_or_default())
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn method_or_default<'de, D>(deserializer: D) -> Result<HttpMethod, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(HttpMethod::parse).unwrap_or_default())
}

/// Header map whose values may be strings, scalars or lists (`set-cookie`).
/// Lists are joined with ", "; nulls are dropped.
fn header_values<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    fn flatten(value: serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(flatten)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            other => Some(other.to_string()),
        }
    }

    let raw = Option::<HashMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| flatten(value).map(|v| (key, v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_headers_accept_lists() {
        let response: Response = serde_json::from_value(json!({
            "status": 200,
            "headers": {
                "set-cookie": ["a=1; Path=/", "b=2"],
                "content-length": 12,
                "x-empty": null
            }
        }))
        .unwrap();
        assert_eq!(response.headers["set-cookie"], "a=1; Path=/, b=2");
        assert_eq!(response.headers["content-length"], "12");
        assert!(!response.headers.contains_key("x-empty"));
    }

    #[test]
    fn test_request_from_store_json() {
        let value = json!({
            "id": 42,
            "name": "Get users",
            "method": "post",
            "url": "https://api.example.com/users",
            "headers": [{"key": "Accept", "value": "application/json"}],
            "body": "{\"a\":1}",
            "bodyType": "json",
            "type": "http",
            "collectionId": 7,
            "auth": {"type": "bearer", "bearer": {"token": "{{token}}"}}
        });
        let request: Request = serde_json::from_value(value).unwrap();
        assert_eq!(request.id, "42");
        assert_eq!(request.method, HttpMethod::POST);
        assert!(request.headers[0].enabled);
        assert_eq!(request.body, Body::Json("{\"a\":1}".into()));
        assert_eq!(request.auth, AuthType::bearer("{{token}}"));
        assert_eq!(request.collection_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_none_body_keeps_text_on_the_wire() {
        let value = json!({"id": "r1", "body": "{\"keep\":1}", "bodyType": "none"});
        let request: Request = serde_json::from_value(value).unwrap();
        assert_eq!(request.body, Body::None("{\"keep\":1}".into()));
        assert_eq!(request.body.payload(), None);

        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back["body"], "{\"keep\":1}");
        assert_eq!(back["bodyType"], "none");
    }

    #[test]
    fn test_request_defaults_when_fields_missing() {
        let request: Request = serde_json::from_value(json!({"id": "r1"})).unwrap();
        assert_eq!(request.kind, RequestType::Http);
        assert_eq!(request.auth, AuthType::None);
        assert_eq!(request.body, Body::default());
        assert!(request.script().is_none());
    }

    #[test]
    fn test_form_data_body_serializes_filtered_rows() {
        let mut request = Request::new("r1", "form");
        request.body = Body::FormData(vec![
            Param::new("a", "1"),
            Param::disabled("b", "2"),
            Param::new("", "3"),
        ]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["bodyType"], "form-data");
        assert_eq!(value["body"], r#"[{"key":"a","value":"1"}]"#);
        assert_eq!(value["type"], "http");
    }

    #[test]
    fn test_auth_tagging() {
        let auth = AuthType::basic("u", "p");
        let value = serde_json::to_value(&auth).unwrap();
        assert_eq!(value, json!({"type": "basic", "basic": {"username": "u", "password": "p"}}));
        let none: AuthType = serde_json::from_value(json!({"type": "none"})).unwrap();
        assert_eq!(none, AuthType::None);
    }

    #[test]
    fn test_script_only_for_http() {
        let mut request = Request::new("r1", "ws");
        request.pre_request_script = Some("pm.variables.set('a', '1')".into());
        assert!(request.script().is_some());
        request.kind = RequestType::WebSocket;
        assert!(request.script().is_none());
    }

    #[test]
    fn test_body_convert_keeps_content() {
        let body = Body::Json(r#"[{"key":"k","value":"v"}]"#.into());
        assert_eq!(body.convert(BodyType::FormData), Body::FormData(vec![Param::new("k", "v")]));
        let raw = body.convert(BodyType::Raw);
        assert_eq!(raw, Body::Raw(r#"[{"key":"k","value":"v"}]"#.into()));
    }

    #[test]
    fn test_collection_owns_folder_requests() {
        let mut collection = Collection::new("c1", "API");
        collection.folders.push(Folder {
            id: "f1".into(),
            name: "Users".into(),
            requests: vec![Request::new("r2", "list")],
        });
        assert!(collection.owns("r2"));
        assert!(!collection.owns("r3"));
    }
}
