/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Live session operations: hosting, joining, answering and host controls.
pub mod session_service;
/// Server-Sent Events forwarding of session events.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Player WebSocket connection and message handling service.
pub mod websocket_service;
