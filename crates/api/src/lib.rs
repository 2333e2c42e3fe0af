//! HTTP API: request gate, routing, and error mapping.

pub mod app;
pub mod authz;
pub mod context;
pub mod gate;
