//! Request and response representations used by the dispatcher. Both are plain data, detached
//! from the underlying server, so dispatching can run on any thread.

use axum::body::Bytes;
use axum::http::header::{HeaderName, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use fxhash::FxHashMap;
use serde_json::Value;

/// Incoming request.
#[derive(Clone, Debug)]
pub struct WebRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    path_variables: FxHashMap<String, String>,
    attributes: FxHashMap<String, Value>,
}

impl WebRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            path_variables: Default::default(),
            attributes: Default::default(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path, without the query.
    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Returns the first value of a query parameter.
    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserializes a JSON body.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Variables extracted from the path by the handler mapping.
    #[inline]
    pub fn path_variables(&self) -> &FxHashMap<String, String> {
        &self.path_variables
    }

    pub fn path_variable(&self, name: &str) -> Option<&str> {
        self.path_variables.get(name).map(String::as_str)
    }

    pub fn set_path_variables(&mut self, path_variables: FxHashMap<String, String>) {
        self.path_variables = path_variables;
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute<N: ToString>(&mut self, name: N, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }
}

/// Outgoing response.
#[derive(Clone, Debug)]
pub struct WebResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    error_sent: bool,
}

impl Default for WebResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: vec![],
            error_sent: false,
        }
    }
}

impl WebResponse {
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn set_content_type(&mut self, content_type: &'static str) {
        self.set_header(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn write<B: AsRef<[u8]>>(&mut self, body: B) {
        self.body.extend_from_slice(body.as_ref());
    }

    /// Replaces the response with an error status and a plain text reason.
    pub fn send_error<T: AsRef<str>>(&mut self, status: StatusCode, reason: Option<T>) {
        self.status = status;
        self.body.clear();
        self.error_sent = true;

        let reason = reason
            .as_ref()
            .map(|reason| reason.as_ref())
            .or_else(|| status.canonical_reason())
            .unwrap_or_default();
        if !reason.is_empty() {
            self.set_content_type("text/plain; charset=utf-8");
            self.write(reason);
        }
    }

    pub fn send_redirect(&mut self, location: &str) -> Result<(), axum::http::header::InvalidHeaderValue> {
        let location = HeaderValue::from_str(location)?;
        self.status = StatusCode::FOUND;
        self.set_header(LOCATION, location);
        Ok(())
    }

    /// Checks if an error has been sent. Such response should not be modified further.
    #[inline]
    pub fn is_error_sent(&self) -> bool {
        self.error_sent
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}
