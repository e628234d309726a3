//! Request-processing core of an embeddable HTTP server: route tree, CORS negotiation and
//! pluggable authentication, plus an axum adapter to serve it.

pub mod api;
pub mod app;
pub mod config;
pub mod cors;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routing;
pub mod server;
pub mod services;
pub mod state;
