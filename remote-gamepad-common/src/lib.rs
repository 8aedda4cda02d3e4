//! Common types and functionality for the remote-gamepad project

pub mod frame;

pub use frame::{ControllerFrame, FrameCodec, FrameError, FRAME_LEN};

/// Full-scale negative value of a virtual stick axis.
pub const AXIS_MIN: i16 = i16::MIN;
/// Full-scale positive value of a virtual stick axis.
pub const AXIS_MAX: i16 = i16::MAX;

bitflags::bitflags! {
    /// The face, shoulder and menu buttons carried in a frame.
    ///
    /// Bit `i` corresponds to the `i`-th entry of [`Button::ALL`]. Both ends
    /// of the link must agree on this order.
    #[derive(Default)]
    pub struct Buttons: u8 {
        const A              = 1u8 << 0;
        const B              = 1u8 << 1;
        const X              = 1u8 << 2;
        const Y              = 1u8 << 3;
        const LEFT_SHOULDER  = 1u8 << 4;
        const RIGHT_SHOULDER = 1u8 << 5;
        const SELECT         = 1u8 << 6;
        const START          = 1u8 << 7;
    }
}

bitflags::bitflags! {
    /// The directional pad carried in a frame. Only the low four bits are used.
    #[derive(Default)]
    pub struct DPad: u8 {
        const UP    = 1u8 << 0;
        const DOWN  = 1u8 << 1;
        const LEFT  = 1u8 << 2;
        const RIGHT = 1u8 << 3;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Button {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    Select,
    Start,
}

impl Button {
    /// Every button, in wire bit order.
    pub const ALL: [Button; 8] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::LeftShoulder,
        Button::RightShoulder,
        Button::Select,
        Button::Start,
    ];

    pub fn flag(self) -> Buttons {
        match self {
            Button::A => Buttons::A,
            Button::B => Buttons::B,
            Button::X => Buttons::X,
            Button::Y => Buttons::Y,
            Button::LeftShoulder => Buttons::LEFT_SHOULDER,
            Button::RightShoulder => Buttons::RIGHT_SHOULDER,
            Button::Select => Buttons::SELECT,
            Button::Start => Buttons::START,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Every direction, in wire bit order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn flag(self) -> DPad {
        match self {
            Direction::Up => DPad::UP,
            Direction::Down => DPad::DOWN,
            Direction::Left => DPad::LEFT,
            Direction::Right => DPad::RIGHT,
        }
    }
}
