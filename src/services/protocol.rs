use axum::http::{header, HeaderMap};
use serde::Serialize;

/// Upstream protocol a proxied request is sent over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Rest,
    XmlRpc,
}

impl Protocol {
    /// Classifies a request. Any one of these selects XML-RPC:
    /// - the path contains `/xmlrpc` (checked first, content-type is ignored)
    /// - the content-type contains `text/xml`
    /// - a non-JSON body whose text contains `<?xml`
    pub fn detect(path: &str, headers: &HeaderMap, body: &[u8]) -> Self {
        if path.contains("/xmlrpc") {
            return Protocol::XmlRpc;
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();

        if content_type.contains("text/xml") {
            return Protocol::XmlRpc;
        }

        // JSON bodies are never sniffed
        if !content_type.contains("json") && contains_xml_declaration(body) {
            return Protocol::XmlRpc;
        }

        Protocol::Rest
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Rest => "rest",
            Protocol::XmlRpc => "xmlrpc",
        }
    }
}

fn contains_xml_declaration(body: &[u8]) -> bool {
    const MARKER: &[u8] = b"<?xml";
    body.windows(MARKER.len()).any(|w| w == MARKER)
}
