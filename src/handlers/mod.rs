// handlers/mod.rs - Route handlers
//
// token     POST {mount}/auth, POST {mount}/auth/refresh
// proxy     ANY  {mount}/*  (REST or XML-RPC passthrough)
// webhooks  /webhooks/keap
// system    /, /health
pub mod proxy;
pub mod system;
pub mod token;
pub mod webhooks;
