//! Server-side relay: upstream port and the per-request session.

pub mod session;
pub mod upstream;

pub use session::{RelayHandle, RelayOutcome, RelaySession, RelayState, STREAM_ERROR_MESSAGE, open_relay};
pub use upstream::{BoxUpstreamClient, ByteStream, UpstreamClient};
