//! Input controls
//!
//! The avatar runtime exposes a fixed set of buttons and axes under `/input/`.
//! Buttons always travel as ints (1 = pressed, 0 = released) and axes as
//! floats clamped to [-1.0, 1.0], regardless of declared parameter types.

use crate::connection::{ConnectionError, OscSender};
use crate::types::ParameterValue;

/// Address prefix shared by every input control
pub const INPUT_ADDRESS_SPACE: &str = "/input/";

/// Button-style input controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonInput {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    LookLeft,
    LookRight,
    Jump,
    Run,
    ComfortLeft,
    ComfortRight,
    DropRight,
    UseRight,
    GrabRight,
    DropLeft,
    UseLeft,
    GrabLeft,
    PanicButton,
    QuickMenuToggleLeft,
    QuickMenuToggleRight,
    Voice,
}

impl ButtonInput {
    pub const ALL: [ButtonInput; 20] = [
        Self::MoveForward,
        Self::MoveBackward,
        Self::MoveLeft,
        Self::MoveRight,
        Self::LookLeft,
        Self::LookRight,
        Self::Jump,
        Self::Run,
        Self::ComfortLeft,
        Self::ComfortRight,
        Self::DropRight,
        Self::UseRight,
        Self::GrabRight,
        Self::DropLeft,
        Self::UseLeft,
        Self::GrabLeft,
        Self::PanicButton,
        Self::QuickMenuToggleLeft,
        Self::QuickMenuToggleRight,
        Self::Voice,
    ];

    /// OSC address of this button
    pub fn create_address(self) -> &'static str {
        match self {
            Self::MoveForward => "/input/MoveForward",
            Self::MoveBackward => "/input/MoveBackward",
            Self::MoveLeft => "/input/MoveLeft",
            Self::MoveRight => "/input/MoveRight",
            Self::LookLeft => "/input/LookLeft",
            Self::LookRight => "/input/LookRight",
            Self::Jump => "/input/Jump",
            Self::Run => "/input/Run",
            Self::ComfortLeft => "/input/ComfortLeft",
            Self::ComfortRight => "/input/ComfortRight",
            Self::DropRight => "/input/DropRight",
            Self::UseRight => "/input/UseRight",
            Self::GrabRight => "/input/GrabRight",
            Self::DropLeft => "/input/DropLeft",
            Self::UseLeft => "/input/UseLeft",
            Self::GrabLeft => "/input/GrabLeft",
            Self::PanicButton => "/input/PanicButton",
            Self::QuickMenuToggleLeft => "/input/QuickMenuToggleLeft",
            Self::QuickMenuToggleRight => "/input/QuickMenuToggleRight",
            Self::Voice => "/input/Voice",
        }
    }

    /// Encoded value for a button state
    pub fn encode(pressed: bool) -> ParameterValue {
        ParameterValue::Int32(if pressed { 1 } else { 0 })
    }

    /// Send the button state
    pub fn send<S: OscSender + ?Sized>(self, sender: &S, pressed: bool) -> Result<(), ConnectionError> {
        sender.send(self.create_address(), &Self::encode(pressed))
    }

    pub fn press<S: OscSender + ?Sized>(self, sender: &S) -> Result<(), ConnectionError> {
        self.send(sender, true)
    }

    pub fn release<S: OscSender + ?Sized>(self, sender: &S) -> Result<(), ConnectionError> {
        self.send(sender, false)
    }
}

/// Axis-style input controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisInput {
    Vertical,
    Horizontal,
    LookHorizontal,
    UseAxisRight,
    GrabAxisRight,
    MoveHoldFB,
    SpinHoldCwCcw,
    SpinHoldUD,
    SpinHoldLR,
}

impl AxisInput {
    pub const ALL: [AxisInput; 9] = [
        Self::Vertical,
        Self::Horizontal,
        Self::LookHorizontal,
        Self::UseAxisRight,
        Self::GrabAxisRight,
        Self::MoveHoldFB,
        Self::SpinHoldCwCcw,
        Self::SpinHoldUD,
        Self::SpinHoldLR,
    ];

    /// OSC address of this axis
    pub fn create_address(self) -> &'static str {
        match self {
            Self::Vertical => "/input/Vertical",
            Self::Horizontal => "/input/Horizontal",
            Self::LookHorizontal => "/input/LookHorizontal",
            Self::UseAxisRight => "/input/UseAxisRight",
            Self::GrabAxisRight => "/input/GrabAxisRight",
            Self::MoveHoldFB => "/input/MoveHoldFB",
            Self::SpinHoldCwCcw => "/input/SpinHoldCwCcw",
            Self::SpinHoldUD => "/input/SpinHoldUD",
            Self::SpinHoldLR => "/input/SpinHoldLR",
        }
    }

    /// Clamp an axis value into [-1.0, 1.0]
    ///
    /// NaN has no meaningful position and is sent as the neutral 0.0.
    pub fn clamp(value: f32) -> f32 {
        if value.is_nan() {
            0.0
        } else {
            value.clamp(-1.0, 1.0)
        }
    }

    /// Encoded value for an axis position
    pub fn encode(value: f32) -> ParameterValue {
        ParameterValue::Float32(Self::clamp(value))
    }

    /// Send the axis position (clamped)
    pub fn send<S: OscSender + ?Sized>(self, sender: &S, value: f32) -> Result<(), ConnectionError> {
        sender.send(self.create_address(), &Self::encode(value))
    }
}
