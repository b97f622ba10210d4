//!
//! # Message deserializers
//!
//! Turn raw record payloads into display strings.
//!
use std::fmt;
use std::fmt::Write;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::InspectError;

/// Renders a record payload
pub trait MessageDeserializer: Send + Sync {
    fn deserialize(&self, payload: &[u8]) -> String;
}

impl<F> MessageDeserializer for F
where
    F: Fn(&[u8]) -> String + Send + Sync,
{
    fn deserialize(&self, payload: &[u8]) -> String {
        self(payload)
    }
}

/// Payload bytes as text, invalid UTF-8 replaced
#[derive(Debug, Default, Clone, Copy)]
pub struct TextDeserializer;

impl MessageDeserializer for TextDeserializer {
    fn deserialize(&self, payload: &[u8]) -> String {
        String::from_utf8_lossy(payload).into_owned()
    }
}

/// Hex dump with an ASCII gutter, 16 bytes per row
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryDeserializer;

impl MessageDeserializer for BinaryDeserializer {
    fn deserialize(&self, payload: &[u8]) -> String {
        hex_dump(payload)
    }
}

/// Text unless the payload looks binary
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicDeserializer;

impl MessageDeserializer for DynamicDeserializer {
    fn deserialize(&self, payload: &[u8]) -> String {
        if is_binary(payload) {
            hex_dump(payload)
        } else {
            TextDeserializer.deserialize(payload)
        }
    }
}

/// Compact JSON. Payloads that fail to parse render as `{"error": ...}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDeserializer;

impl MessageDeserializer for JsonDeserializer {
    fn deserialize(&self, payload: &[u8]) -> String {
        let value = serde_json::from_slice::<serde_json::Value>(payload)
            .unwrap_or_else(|err| serde_json::json!({ "error": err.to_string() }));
        value.to_string()
    }
}

/// Built-in deserializers by name
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    #[default]
    Text,
    Binary,
    Dynamic,
    Json,
}

impl MessageFormat {
    pub fn deserializer(&self) -> Box<dyn MessageDeserializer> {
        match self {
            Self::Text => Box::new(TextDeserializer),
            Self::Binary => Box::new(BinaryDeserializer),
            Self::Dynamic => Box::new(DynamicDeserializer),
            Self::Json => Box::new(JsonDeserializer),
        }
    }
}

impl FromStr for MessageFormat {
    type Err = InspectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "default" => Ok(Self::Text),
            "binary" | "hex" => Ok(Self::Binary),
            "dynamic" => Ok(Self::Dynamic),
            "json" => Ok(Self::Json),
            _ => Err(InspectError::UnsupportedFormat(s.to_owned())),
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Dynamic => "dynamic",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

const HEX_COLUMNS: usize = 16;

/// Classic `hexdump -C` style rendering
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(HEX_COLUMNS).enumerate() {
        let _ = write!(out, "{:08x}", row * HEX_COLUMNS);
        for column in 0..HEX_COLUMNS {
            if column % (HEX_COLUMNS / 2) == 0 {
                out.push(' ');
            }
            match chunk.get(column) {
                Some(byte) => {
                    let _ = write!(out, " {byte:02x}");
                }
                None => out.push_str("   "),
            }
        }
        let gutter: String = chunk.iter().copied().map(printable).collect();
        let _ = writeln!(out, "  |{gutter:<HEX_COLUMNS$}|");
    }
    out
}

fn is_binary(bytes: &[u8]) -> bool {
    use content_inspector::{inspect, ContentType};
    matches!(inspect(bytes), ContentType::BINARY)
}

fn printable(byte: u8) -> char {
    match byte {
        0x20..=0x7e => byte as char,
        b'\n' => '.',
        _ => ' ',
    }
}
