use crate::error::ConfigError;
use remote_gamepad_common::{
    Button, Buttons, ControllerFrame, DPad, Direction, AXIS_MAX, AXIS_MIN,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, trace};

/// Something the handheld's keypad can press.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Control {
    Button(Button),
    Direction(Direction),
    /// Tracked, but the frame has no bit for it.
    LeftTrigger,
    /// Tracked, but the frame has no bit for it.
    RightTrigger,
}

impl Control {
    /// Looks up the control bound to a logical key name.
    pub fn from_key_name(name: &str) -> Option<Self> {
        let control = match name {
            "1" => Control::Button(Button::A),
            "2" => Control::Button(Button::B),
            "3" => Control::Button(Button::X),
            "4" => Control::Button(Button::Y),
            "5" => Control::Button(Button::Select),
            "6" => Control::LeftTrigger,
            "7" => Control::RightTrigger,
            "8" => Control::Button(Button::LeftShoulder),
            "9" => Control::Button(Button::RightShoulder),
            "start" => Control::Button(Button::Start),
            "up" => Control::Direction(Direction::Up),
            "down" => Control::Direction(Direction::Down),
            "left" => Control::Direction(Direction::Left),
            "right" => Control::Direction(Direction::Right),
            _ => return None,
        };
        Some(control)
    }
}

/// Maps physical key codes from the event source to controls.
#[derive(Clone, Debug, Default)]
pub struct KeyMap {
    controls: HashMap<u32, Control>,
}

impl KeyMap {
    /// Builds a key map from `code -> key name` pairs.
    pub fn from_names(names: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut controls = HashMap::with_capacity(names.len());
        for (code, name) in names {
            let code: u32 = code
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("keymap: invalid key code `{code}`")))?;
            let control = Control::from_key_name(name)
                .ok_or_else(|| ConfigError::Invalid(format!("keymap: unknown key name `{name}`")))?;
            controls.insert(code, control);
        }
        Ok(Self { controls })
    }

    pub fn get(&self, code: u32) -> Option<Control> {
        self.controls.get(&code).copied()
    }
}

/// An event delivered by the handheld's native key/sensor source.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InputEvent {
    KeyDown(u32),
    KeyUp(u32),
    /// Two accelerometer readings, in the order the sensor delivers them.
    Accelerometer(i32, i32),
    ToggleAnalog,
}

/// Latest known input of the handheld.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    pressed: HashSet<Control>,
    analog_mode: bool,
    analog: (i16, i16),
}

impl InputState {
    pub fn set_pressed(&mut self, control: Control, pressed: bool) {
        if pressed {
            self.pressed.insert(control);
        } else {
            self.pressed.remove(&control);
        }
    }

    pub fn is_pressed(&self, control: Control) -> bool {
        self.pressed.contains(&control)
    }

    pub fn analog_mode(&self) -> bool {
        self.analog_mode
    }

    /// Flips analog mode and returns the new setting.
    pub fn toggle_analog(&mut self) -> bool {
        self.analog_mode = !self.analog_mode;
        self.analog_mode
    }

    /// Records an accelerometer sample. Samples are ignored outside analog
    /// mode; the second reading drives X and the first drives Y.
    pub fn set_accelerometer(&mut self, first: i32, second: i32) {
        if !self.analog_mode {
            return;
        }
        self.analog = (saturate(second), saturate(first));
    }

    /// The stick pair to send: the last accelerometer sample in analog mode,
    /// otherwise full scale from the d-pad keys (left and up win ties).
    pub fn stick(&self) -> (i16, i16) {
        if self.analog_mode {
            return self.analog;
        }

        let x = if self.is_pressed(Control::Direction(Direction::Left)) {
            AXIS_MIN
        } else if self.is_pressed(Control::Direction(Direction::Right)) {
            AXIS_MAX
        } else {
            0
        };
        let y = if self.is_pressed(Control::Direction(Direction::Up)) {
            AXIS_MIN
        } else if self.is_pressed(Control::Direction(Direction::Down)) {
            AXIS_MAX
        } else {
            0
        };
        (x, y)
    }

    pub fn to_frame(&self) -> ControllerFrame {
        let (stick_x, stick_y) = self.stick();

        let mut buttons = Buttons::empty();
        for button in Button::ALL {
            buttons.set(button.flag(), self.is_pressed(Control::Button(button)));
        }
        let mut dpad = DPad::empty();
        for direction in Direction::ALL {
            dpad.set(
                direction.flag(),
                self.is_pressed(Control::Direction(direction)),
            );
        }

        ControllerFrame {
            stick_x,
            stick_y,
            buttons,
            dpad,
        }
    }
}

fn saturate(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Shared handle to the input state. The event source writes through it and
/// the sender loop reads snapshots from it; the lock is never held across I/O.
#[derive(Clone)]
pub struct InputStore {
    state: Arc<Mutex<InputState>>,
    keymap: Arc<KeyMap>,
}

impl InputStore {
    pub fn new(keymap: KeyMap) -> Self {
        Self {
            state: Arc::new(Mutex::new(InputState::default())),
            keymap: Arc::new(keymap),
        }
    }

    pub fn handle_event(&self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(code) | InputEvent::KeyUp(code) => {
                let Some(control) = self.keymap.get(code) else {
                    trace!("Ignoring unmapped key code {code}");
                    return;
                };
                let pressed = matches!(event, InputEvent::KeyDown(_));
                self.state().set_pressed(control, pressed);
            }
            InputEvent::Accelerometer(first, second) => {
                self.state().set_accelerometer(first, second);
            }
            InputEvent::ToggleAnalog => {
                let enabled = self.state().toggle_analog();
                info!(
                    "Analog mode {}",
                    if enabled { "enabled" } else { "disabled" }
                );
            }
        }
    }

    /// Builds a frame from the current state.
    pub fn snapshot(&self) -> ControllerFrame {
        self.state().to_frame()
    }

    fn state(&self) -> MutexGuard<'_, InputState> {
        // The state is plain data, so a panic elsewhere can't leave it torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
