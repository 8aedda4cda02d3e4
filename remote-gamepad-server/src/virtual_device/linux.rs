use crate::config::DeviceConfig;
use crate::virtual_device::{Axis, VirtualDevice};
use input_linux::{
    AbsoluteAxis, AbsoluteEvent, AbsoluteInfo, AbsoluteInfoSetup, EventKind, EventTime, InputId,
    Key, KeyEvent, KeyState, SynchronizeEvent, SynchronizeKind, UInputHandle,
};
use remote_gamepad_common::{Button, AXIS_MAX, AXIS_MIN};
use tokio::fs::{File, OpenOptions};

pub struct UInputDevice {
    handle: UInputHandle<File>,
    pending: Vec<input_linux::sys::input_event>,
}

impl UInputDevice {
    pub async fn new(config: &DeviceConfig) -> anyhow::Result<Self> {
        let uinput_file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open("/dev/uinput")
            .await?;

        let handle = UInputHandle::new(uinput_file);

        // Register inputs
        handle.set_evbit(EventKind::Key)?;
        for button in Button::ALL {
            handle.set_keybit(uinput_key(button))?;
        }

        handle.set_evbit(EventKind::Absolute)?;
        handle.set_absbit(AbsoluteAxis::X)?;
        handle.set_absbit(AbsoluteAxis::Y)?;

        let axis_absolute_info = AbsoluteInfo {
            minimum: i32::from(AXIS_MIN),
            maximum: i32::from(AXIS_MAX),
            value: 0,
            ..AbsoluteInfo::default()
        };

        handle.create(
            &InputId {
                bustype: input_linux::sys::BUS_USB,
                // Xbox 360 wired controller, so games pick a sensible layout
                vendor: 0x045e,
                product: 0x028e,
                version: 0x0110,
            },
            config.name.as_bytes(),
            0,
            &[
                AbsoluteInfoSetup {
                    axis: AbsoluteAxis::X,
                    info: axis_absolute_info,
                },
                AbsoluteInfoSetup {
                    axis: AbsoluteAxis::Y,
                    info: axis_absolute_info,
                },
            ],
        )?;

        Ok(Self {
            handle,
            // 2 axes, 8 buttons, 1 for synchronization
            pending: Vec::with_capacity(11),
        })
    }
}

impl VirtualDevice for UInputDevice {
    fn set_axis(&mut self, axis: Axis, value: i16) -> anyhow::Result<()> {
        let axis = match axis {
            Axis::X => AbsoluteAxis::X,
            Axis::Y => AbsoluteAxis::Y,
        };
        self.pending.push(
            *AbsoluteEvent::new(EventTime::default(), axis, i32::from(value))
                .as_event()
                .as_raw(),
        );
        Ok(())
    }

    fn set_button(&mut self, button: Button, pressed: bool) -> anyhow::Result<()> {
        let state = if pressed {
            KeyState::PRESSED
        } else {
            KeyState::RELEASED
        };
        self.pending.push(
            *KeyEvent::new(EventTime::default(), uinput_key(button), state)
                .as_event()
                .as_raw(),
        );
        Ok(())
    }

    fn sync(&mut self) -> anyhow::Result<()> {
        // Publish the events
        self.pending.push(
            *SynchronizeEvent::new(EventTime::default(), SynchronizeKind::Report, 0)
                .as_event()
                .as_raw(),
        );

        let result = self.handle.write(&self.pending);
        self.pending.clear();
        result?;

        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.pending.clear();
        self.handle.dev_destroy()?;
        Ok(())
    }
}

fn uinput_key(button: Button) -> Key {
    match button {
        Button::A => Key::ButtonSouth,
        Button::B => Key::ButtonEast,
        Button::X => Key::ButtonNorth,
        Button::Y => Key::ButtonWest,
        Button::LeftShoulder => Key::ButtonTL,
        Button::RightShoulder => Key::ButtonTR,
        Button::Select => Key::ButtonSelect,
        Button::Start => Key::ButtonStart,
    }
}
