//! Parameter value model
//!
//! Every value that can travel to or from the avatar runtime is a
//! [`ParameterValue`]. The conversion to and from OSC arguments lives here and
//! nowhere else, so adding a variant forces every encoding site to be updated.

use rosc::{OscColor, OscMidiMessage, OscType};
use serde::{Deserialize, Serialize};

/// Declared type of an avatar parameter
///
/// Avatar configs only ever declare these three; the names match the
/// `"type"` strings VRChat writes into its OSC config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    Bool,
    Int,
    Float,
}

/// RGBA color, sent as a single packed 32-bit integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color32 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Little-endian packing: `r` is the lowest byte, `a` the highest
    pub fn packed(&self) -> i32 {
        i32::from_le_bytes([self.r, self.g, self.b, self.a])
    }
}

/// Four-byte MIDI message carried inside an OSC argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MidiMessage {
    pub port: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    pub const fn new(port: u8, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            port,
            status,
            data1,
            data2,
        }
    }
}

/// A single transmissible value
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Int32(i32),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    String(String),
    Blob(Vec<u8>),
    Char(char),
    Vector2(f32, f32),
    Vector3(f32, f32, f32),
    Color32(Color32),
    Midi(MidiMessage),
}

impl ParameterValue {
    /// The avatar parameter type this value encodes as, if it is one of the
    /// three kinds avatar configs can declare
    pub fn parameter_type(&self) -> Option<ParameterType> {
        match self {
            Self::Bool(_) => Some(ParameterType::Bool),
            Self::Int32(_) => Some(ParameterType::Int),
            Self::Float32(_) => Some(ParameterType::Float),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float32(v) => Some(*v),
            _ => None,
        }
    }

    /// Encode as OSC message arguments
    ///
    /// Vectors expand to one float argument per component and colors are
    /// packed into a single int, which is what the avatar runtime expects.
    pub fn to_osc_args(&self) -> Vec<OscType> {
        match self {
            Self::Int32(v) => vec![OscType::Int(*v)],
            Self::Float32(v) => vec![OscType::Float(*v)],
            Self::Float64(v) => vec![OscType::Double(*v)],
            Self::Bool(v) => vec![OscType::Bool(*v)],
            Self::String(v) => vec![OscType::String(v.clone())],
            Self::Blob(v) => vec![OscType::Blob(v.clone())],
            Self::Char(v) => vec![OscType::Char(*v)],
            Self::Vector2(x, y) => vec![OscType::Float(*x), OscType::Float(*y)],
            Self::Vector3(x, y, z) => {
                vec![OscType::Float(*x), OscType::Float(*y), OscType::Float(*z)]
            }
            Self::Color32(c) => vec![OscType::Int(c.packed())],
            Self::Midi(m) => vec![OscType::Midi(OscMidiMessage {
                port: m.port,
                status: m.status,
                data1: m.data1,
                data2: m.data2,
            })],
        }
    }

    /// Decode OSC message arguments
    ///
    /// Two or three float arguments decode as a vector; otherwise only the
    /// first argument is considered. Returns `None` for argument kinds with no
    /// parameter equivalent (time tags, nil, arrays, ...).
    pub fn from_osc_args(args: &[OscType]) -> Option<Self> {
        match args {
            [OscType::Float(x), OscType::Float(y)] => return Some(Self::Vector2(*x, *y)),
            [OscType::Float(x), OscType::Float(y), OscType::Float(z)] => {
                return Some(Self::Vector3(*x, *y, *z))
            }
            _ => {}
        }

        let value = match args.first()? {
            OscType::Int(v) => Self::Int32(*v),
            OscType::Float(v) => Self::Float32(*v),
            OscType::Double(v) => Self::Float64(*v),
            OscType::Bool(v) => Self::Bool(*v),
            OscType::String(v) => Self::String(v.clone()),
            OscType::Blob(v) => Self::Blob(v.clone()),
            OscType::Char(v) => Self::Char(*v),
            OscType::Color(OscColor {
                red,
                green,
                blue,
                alpha,
            }) => Self::Color32(Color32::new(*red, *green, *blue, *alpha)),
            OscType::Midi(m) => Self::Midi(MidiMessage::new(m.port, m.status, m.data1, m.data2)),
            _ => return None,
        };
        Some(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<f32> for ParameterValue {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for ParameterValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<char> for ParameterValue {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<(f32, f32)> for ParameterValue {
    fn from((x, y): (f32, f32)) -> Self {
        Self::Vector2(x, y)
    }
}

impl From<(f32, f32, f32)> for ParameterValue {
    fn from((x, y, z): (f32, f32, f32)) -> Self {
        Self::Vector3(x, y, z)
    }
}

impl From<Color32> for ParameterValue {
    fn from(v: Color32) -> Self {
        Self::Color32(v)
    }
}

impl From<MidiMessage> for ParameterValue {
    fn from(v: MidiMessage) -> Self {
        Self::Midi(v)
    }
}
