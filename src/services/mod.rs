pub mod protocol;
pub mod proxy_service;
pub mod token_service;

pub use protocol::Protocol;
pub use proxy_service::{ForwardError, Forwarder, OutboundRequest, ProxyRequest, UpstreamResponse};
pub use token_service::{TokenClient, TokenError, TokenPair};
