//! Library crate for live-quiz-back, exposing modules for binaries and integration tests.

pub mod config;
/// Storage models and backends.
pub mod dao;
mod dto;
mod error;
/// HTTP, SSE and WebSocket routes.
pub mod routes;
/// Supporting services such as OpenAPI generation.
pub mod services;
pub mod state;
