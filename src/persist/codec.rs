//! Fixed-point conversion and the framed save/load command stream.
//!
//! Values travel as Q13 fixed point: `round(v * 8192)` in a signed 16-bit
//! integer, covering [-4.0, 4.0) with 1/8192 resolution. A save frame is
//! a start marker, a single-byte layer tag, one value record per slot in
//! persisted order, and a stop marker. Value records carry 14 bits
//! (offset-binary across two 7-bit payload bytes), so the framed range is
//! the conventional [-1.0, 1.0) window; full-range Q13 only appears in
//! the raw layer resources.

use crate::control::layer::Layer;
use crate::error::{Result, StrataError};

/// One Q13 unit.
pub const Q13_SCALE: f32 = 8192.0;

/// Start-of-transfer marker byte.
pub const START_BYTE: u8 = 0xFA;
/// End-of-transfer marker byte.
pub const STOP_BYTE: u8 = 0xFC;
/// Status byte introducing the layer tag.
pub const LAYER_TAG_STATUS: u8 = 0xD0;
/// Upper nibble of a value record's status byte; low nibble is the slot.
pub const VALUE_STATUS: u8 = 0xE0;

const FRAME_VALUE_MIN: i16 = -8192;
const FRAME_VALUE_MAX: i16 = 8191;

/// Convert a float to Q13 fixed point, saturating at the i16 limits.
pub fn encode_q13(value: f32) -> i16 {
    (value * Q13_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Convert Q13 fixed point back to float.
pub fn decode_q13(raw: i16) -> f32 {
    raw as f32 / Q13_SCALE
}

/// One command of the save stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    /// Persisted-order layer index (0 = prm ... 4 = rnd).
    LayerTag(u8),
    /// Slot index plus a 14-bit signed Q13 value.
    Value { slot: u8, raw: i16 },
    Stop,
}

impl Command {
    /// Append this command's wire bytes.
    pub fn write(&self, out: &mut Vec<u8>) {
        match *self {
            Command::Start => out.push(START_BYTE),
            Command::Stop => out.push(STOP_BYTE),
            Command::LayerTag(index) => {
                out.push(LAYER_TAG_STATUS);
                out.push(index & 0x7F);
            }
            Command::Value { slot, raw } => {
                let clamped = raw.clamp(FRAME_VALUE_MIN, FRAME_VALUE_MAX);
                let offset = (clamped as i32 + 8192) as u16;
                out.push(VALUE_STATUS | (slot & 0x0F));
                out.push((offset & 0x7F) as u8);
                out.push((offset >> 7) as u8);
            }
        }
    }
}

/// Encode one layer's vector as a complete save frame.
///
/// Record order matches the layer's slot order exactly; a reader
/// reconstructs the vector positionally.
pub fn encode_layer_frame(layer: Layer, values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + values.len() * 3);
    Command::Start.write(&mut out);
    Command::LayerTag(layer.index() as u8).write(&mut out);
    for (slot, value) in values.iter().enumerate() {
        Command::Value {
            slot: slot as u8,
            raw: encode_q13(*value),
        }
        .write(&mut out);
    }
    Command::Stop.write(&mut out);
    out
}

/// Decode a complete save frame back into a layer and its vector.
///
/// Framing is strict: anything other than start / tag / in-order values /
/// stop is rejected so a truncated or interleaved transfer can never be
/// partially applied.
pub fn decode_layer_frame(bytes: &[u8]) -> Result<(Layer, Vec<f32>)> {
    let mut cursor = bytes.iter();
    let malformed = |reason: &str| StrataError::MalformedFrame {
        reason: reason.to_string(),
    };

    if cursor.next() != Some(&START_BYTE) {
        return Err(malformed("missing start marker"));
    }
    if cursor.next() != Some(&LAYER_TAG_STATUS) {
        return Err(malformed("missing layer tag"));
    }
    let tag = *cursor.next().ok_or_else(|| malformed("truncated layer tag"))?;
    if tag as usize >= crate::control::layer::LAYER_COUNT {
        return Err(StrataError::UnknownLayerTag { tag });
    }
    let layer = Layer::from_index(tag as usize);

    let mut values = Vec::with_capacity(layer.slot_count());
    loop {
        let status = *cursor.next().ok_or_else(|| malformed("truncated frame"))?;
        if status == STOP_BYTE {
            break;
        }
        if status & 0xF0 != VALUE_STATUS {
            return Err(malformed("unexpected status byte"));
        }
        let slot = (status & 0x0F) as usize;
        if slot != values.len() {
            return Err(malformed("value records out of order"));
        }
        let lsb = *cursor.next().ok_or_else(|| malformed("truncated value"))?;
        let msb = *cursor.next().ok_or_else(|| malformed("truncated value"))?;
        if lsb > 0x7F || msb > 0x7F {
            return Err(malformed("payload byte out of range"));
        }
        let offset = ((msb as u16) << 7) | lsb as u16;
        values.push(decode_q13(offset as i16 - 8192));
    }

    if cursor.next().is_some() {
        return Err(malformed("trailing bytes after stop marker"));
    }
    if values.len() != layer.slot_count() {
        return Err(malformed("wrong number of value records"));
    }
    Ok((layer, values))
}
