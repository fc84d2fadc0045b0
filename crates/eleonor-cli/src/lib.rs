//! Console front-end for the eleonor voice output service.

pub mod config;
pub mod session;
