//! Reply delivery: normalize and chunk answer text, then send it in order with fixed pacing.

mod chunk;
mod sender;

pub use chunk::{chunk_text, normalize, DEFAULT_CHUNK_LIMIT};
pub use sender::{DeliveryReport, OutboundSender};
