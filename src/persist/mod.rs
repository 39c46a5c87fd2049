//! Persistence: fixed-point codec, framing, and resource storage.

pub mod codec;
pub mod store;

pub use codec::{decode_layer_frame, decode_q13, encode_layer_frame, encode_q13};
pub use store::{Config, DirStore, MemoryStore, ResourceStore};
