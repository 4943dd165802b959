//! Line-oriented SSE decoding shared by the relay and the client.

mod line_buffer;
mod parser;
mod transcoder;

pub use line_buffer::LineBuffer;
pub use parser::EventParser;
pub use transcoder::{DownstreamTranscoder, Transcode, UpstreamTranscoder};
