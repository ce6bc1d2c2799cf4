use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use uuid::Uuid;

use super::protocol::Protocol;
use crate::config::AppConfig;

/// Keap personal access tokens and service account keys travel in this header.
pub const KEAP_API_KEY: HeaderName = HeaderName::from_static("x-keap-api-key");

const JSON: HeaderValue = HeaderValue::from_static("application/json");
const TEXT_XML: HeaderValue = HeaderValue::from_static("text/xml");

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream URL not configured: {0}")]
    MissingUpstream(&'static str),

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// An inbound request as seen by the catch-all proxy route.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Full inbound path, mount prefix included.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The request that will be sent upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub protocol: Protocol,
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Upstream status, content type and body, relayed verbatim.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Builds and sends outbound requests to the Keap REST and XML-RPC APIs.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    api_base_url: Option<String>,
    xmlrpc_url: Option<String>,
    mount_path: String,
    user_agent: HeaderValue,
    log_requests: bool,
}

impl Forwarder {
    pub fn new(config: &AppConfig) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.proxy.timeout_secs))
            .user_agent(config.proxy.user_agent.clone())
            .build()
            .map_err(ForwardError::ClientBuild)?;

        let user_agent = HeaderValue::from_str(&config.proxy.user_agent)
            .map_err(|_| ForwardError::InvalidHeader("User-Agent"))?;

        Ok(Self {
            client,
            api_base_url: config.keap.api_base_url.clone(),
            xmlrpc_url: config.keap.xmlrpc_url.clone(),
            mount_path: config.server.mount_path.clone(),
            user_agent,
            log_requests: config.proxy.enable_request_logging,
        })
    }

    /// Classifies, builds and sends `request`, returning whatever upstream
    /// answered. Only failures without an upstream response are errors.
    pub async fn forward(&self, request: ProxyRequest) -> Result<UpstreamResponse, ForwardError> {
        let protocol = Protocol::detect(&request.path, &request.headers, &request.body);
        let outbound = self.build(&request, protocol)?;
        self.send(outbound).await
    }

    /// Builds the outbound request for an already classified inbound request.
    pub fn build(&self, request: &ProxyRequest, protocol: Protocol) -> Result<OutboundRequest, ForwardError> {
        let inbound = strip_undefined(&request.headers);
        match protocol {
            Protocol::Rest => self.build_rest(request, &inbound),
            Protocol::XmlRpc => self.build_xmlrpc(request, &inbound),
        }
    }

    fn build_rest(&self, request: &ProxyRequest, inbound: &HeaderMap) -> Result<OutboundRequest, ForwardError> {
        let base = self
            .api_base_url
            .as_deref()
            .ok_or(ForwardError::MissingUpstream("KEAP_API_BASE_URL"))?;

        let mut url = format!(
            "{}{}",
            base.trim_end_matches('/'),
            strip_mount_prefix(&request.path, &self.mount_path)
        );
        if let Some(query) = request.query.as_deref().filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }

        let mut headers = HeaderMap::new();
        copy_header(inbound, &mut headers, &header::AUTHORIZATION);
        copy_header(inbound, &mut headers, &KEAP_API_KEY);
        headers.insert(
            header::CONTENT_TYPE,
            inbound.get(header::CONTENT_TYPE).cloned().unwrap_or(JSON),
        );
        headers.insert(header::ACCEPT, JSON);
        headers.insert(header::USER_AGENT, self.user_agent.clone());

        let body = if is_empty_body(&request.body) {
            None
        } else {
            Some(request.body.clone())
        };

        Ok(OutboundRequest {
            protocol: Protocol::Rest,
            method: request.method.clone(),
            url,
            headers,
            body,
        })
    }

    fn build_xmlrpc(&self, request: &ProxyRequest, inbound: &HeaderMap) -> Result<OutboundRequest, ForwardError> {
        let url = self
            .xmlrpc_url
            .clone()
            .ok_or(ForwardError::MissingUpstream("KEAP_XMLRPC_URL"))?;

        let mut headers = HeaderMap::new();
        copy_header(inbound, &mut headers, &header::AUTHORIZATION);
        headers.insert(header::CONTENT_TYPE, TEXT_XML);
        headers.insert(header::ACCEPT, TEXT_XML);

        Ok(OutboundRequest {
            protocol: Protocol::XmlRpc,
            method: Method::POST,
            url,
            headers,
            body: Some(request.body.clone()),
        })
    }

    pub async fn send(&self, outbound: OutboundRequest) -> Result<UpstreamResponse, ForwardError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        let mut builder = self
            .client
            .request(outbound.method.clone(), &outbound.url)
            .headers(outbound.headers);
        if let Some(body) = outbound.body {
            builder = builder.body(body);
        }

        let result = async {
            let response = builder.send().await?;
            let status = response.status();
            let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(UpstreamResponse { status, content_type, body })
        }
        .await;

        match result {
            Ok(upstream) => {
                if self.log_requests {
                    tracing::info!(
                        %request_id,
                        protocol = outbound.protocol.as_str(),
                        method = %outbound.method,
                        url = %outbound.url,
                        status = upstream.status.as_u16(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "forwarded request to Keap"
                    );
                }
                Ok(upstream)
            }
            Err(e) => {
                tracing::error!(
                    %request_id,
                    protocol = outbound.protocol.as_str(),
                    method = %outbound.method,
                    url = %outbound.url,
                    timeout = e.is_timeout(),
                    "Keap request failed: {}",
                    e
                );
                Err(ForwardError::Transport(e))
            }
        }
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        match self.content_type {
            Some(content_type) => {
                response.headers_mut().insert(header::CONTENT_TYPE, content_type);
            }
            None => {
                response.headers_mut().remove(header::CONTENT_TYPE);
            }
        }
        response
    }
}

/// Drops header values a browser client produced from an unset variable
/// (`undefined`) as well as empty values.
pub fn strip_undefined(headers: &HeaderMap) -> HeaderMap {
    let mut cleaned = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let text = value.to_str().map(str::trim).unwrap_or("-");
        if text.is_empty() || text == "undefined" {
            continue;
        }
        cleaned.append(name.clone(), value.clone());
    }
    cleaned
}

/// `/api/keap/v1/contacts` with mount `/api/keap` -> `/v1/contacts`.
/// Paths outside the mount are returned unchanged.
pub fn strip_mount_prefix<'a>(path: &'a str, mount: &str) -> &'a str {
    if mount.is_empty() {
        return path;
    }
    match path.strip_prefix(mount) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Whitespace, or a JSON object with no keys.
fn is_empty_body(body: &[u8]) -> bool {
    if body.iter().all(u8::is_ascii_whitespace) {
        return true;
    }
    matches!(
        serde_json::from_slice::<serde_json::Value>(body),
        Ok(serde_json::Value::Object(map)) if map.is_empty()
    )
}

fn copy_header(from: &HeaderMap, to: &mut HeaderMap, name: &HeaderName) {
    if let Some(value) = from.get(name) {
        to.insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder() -> Forwarder {
        let mut config = AppConfig::default();
        config.keap.api_base_url = Some("https://api.infusionsoft.com/crm/rest".to_string());
        config.keap.xmlrpc_url = Some("https://api.infusionsoft.com/crm/xmlrpc/v1".to_string());
        Forwarder::new(&config).unwrap()
    }

    fn request(method: Method, path: &str, headers: &[(&'static str, &'static str)], body: &'static str) -> ProxyRequest {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        ProxyRequest {
            method,
            path: path.to_string(),
            query: None,
            headers: map,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn rest_url_is_base_plus_stripped_path() {
        let f = forwarder();
        let req = request(Method::GET, "/api/keap/v1/contacts/42", &[], "");
        let out = f.build(&req, Protocol::Rest).unwrap();
        assert_eq!(out.url, "https://api.infusionsoft.com/crm/rest/v1/contacts/42");
        assert_eq!(out.method, Method::GET);
        assert!(out.body.is_none());
    }

    #[test]
    fn rest_preserves_query_string() {
        let f = forwarder();
        let mut req = request(Method::GET, "/api/keap/v1/contacts", &[], "");
        req.query = Some("limit=10&offset=20".to_string());
        let out = f.build(&req, Protocol::Rest).unwrap();
        assert_eq!(out.url, "https://api.infusionsoft.com/crm/rest/v1/contacts?limit=10&offset=20");
    }

    #[test]
    fn rest_headers_and_defaults() {
        let f = forwarder();
        let req = request(
            Method::POST,
            "/api/keap/v1/tags",
            &[("authorization", "Bearer abc"), ("cookie", "session=1")],
            r#"{"name":"vip"}"#,
        );
        let out = f.build(&req, Protocol::Rest).unwrap();
        assert_eq!(out.headers[header::AUTHORIZATION], "Bearer abc");
        assert_eq!(out.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(out.headers[header::ACCEPT], "application/json");
        assert!(out.headers[header::USER_AGENT].to_str().unwrap().starts_with("keap-proxy/"));
        assert!(out.headers.get(header::COOKIE).is_none());
        assert_eq!(out.body.as_deref(), Some(br#"{"name":"vip"}"#.as_slice()));
    }

    #[test]
    fn rest_drops_empty_object_body() {
        let f = forwarder();
        let req = request(Method::DELETE, "/api/keap/v1/tags/7", &[("content-type", "application/json")], "{}");
        assert!(f.build(&req, Protocol::Rest).unwrap().body.is_none());
    }

    #[test]
    fn undefined_authorization_is_omitted() {
        let f = forwarder();
        let req = request(Method::GET, "/api/keap/v1/contacts", &[("authorization", "undefined")], "");
        let out = f.build(&req, Protocol::Rest).unwrap();
        assert!(out.headers.get(header::AUTHORIZATION).is_none());

        let xml = f.build(&req, Protocol::XmlRpc).unwrap();
        assert!(xml.headers.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn api_key_header_forwarded_on_rest() {
        let f = forwarder();
        let req = request(Method::GET, "/api/keap/v1/contacts", &[("x-keap-api-key", "KeapAK-123")], "");
        let out = f.build(&req, Protocol::Rest).unwrap();
        assert_eq!(out.headers[&KEAP_API_KEY], "KeapAK-123");
    }

    #[test]
    fn xmlrpc_always_posts_to_fixed_url() {
        let f = forwarder();
        let body = r#"<?xml version="1.0"?><methodCall><methodName>ContactService.load</methodName></methodCall>"#;
        let req = request(
            Method::PUT,
            "/api/keap/some/other/path",
            &[("authorization", "Bearer xyz"), ("content-type", "application/json")],
            body,
        );
        let out = f.build(&req, Protocol::XmlRpc).unwrap();
        assert_eq!(out.method, Method::POST);
        assert_eq!(out.url, "https://api.infusionsoft.com/crm/xmlrpc/v1");
        assert_eq!(out.headers[header::CONTENT_TYPE], "text/xml");
        assert_eq!(out.headers[header::ACCEPT], "text/xml");
        assert_eq!(out.headers[header::AUTHORIZATION], "Bearer xyz");
        assert_eq!(out.body.as_deref(), Some(body.as_bytes()));
    }

    #[test]
    fn missing_upstream_urls_fail_at_build_time() {
        let f = Forwarder::new(&AppConfig::default()).unwrap();
        let req = request(Method::GET, "/api/keap/v1/contacts", &[], "");
        assert!(matches!(
            f.build(&req, Protocol::Rest),
            Err(ForwardError::MissingUpstream("KEAP_API_BASE_URL"))
        ));
        assert!(matches!(
            f.build(&req, Protocol::XmlRpc),
            Err(ForwardError::MissingUpstream("KEAP_XMLRPC_URL"))
        ));
    }

    #[test]
    fn mount_prefix_stripping() {
        assert_eq!(strip_mount_prefix("/api/keap/v1/contacts", "/api/keap"), "/v1/contacts");
        assert_eq!(strip_mount_prefix("/api/keap", "/api/keap"), "/");
        assert_eq!(strip_mount_prefix("/api/keapers/x", "/api/keap"), "/api/keapers/x");
        assert_eq!(strip_mount_prefix("/v1/contacts", ""), "/v1/contacts");
    }

    #[test]
    fn strip_undefined_keeps_other_values() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("undefined"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-requested-with", HeaderValue::from_static(""));
        let cleaned = strip_undefined(&headers);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[header::CONTENT_TYPE], "application/json");
    }
}
