//! HTTP relay: `POST /api/chat/stream` and `GET /health`.

pub mod error;
pub mod handlers;
pub mod router;
