use crate::config::DeviceConfig;
use crate::virtual_device::{Axis, VirtualDevice};
use remote_gamepad_common::Button;
use std::sync::Arc;
use tracing::debug;
use vigem_client::{TargetId, XButtons, XGamepad, Xbox360Wired};

pub struct ViGEmDevice {
    target: Xbox360Wired<Arc<vigem_client::Client>>,
    gamepad: XGamepad,
}

impl ViGEmDevice {
    pub fn new(config: &DeviceConfig) -> anyhow::Result<Self> {
        let client = Arc::new(vigem_client::Client::connect()?);
        let mut target = Xbox360Wired::new(client, TargetId::XBOX360_WIRED);
        target.plugin()?;
        target.wait_ready()?;
        // ViGEm picks the product name itself; the configured name only shows in logs
        debug!("Plugged in ViGEm target for \"{}\"", config.name);

        Ok(Self {
            target,
            gamepad: XGamepad::default(),
        })
    }
}

impl VirtualDevice for ViGEmDevice {
    fn set_axis(&mut self, axis: Axis, value: i16) -> anyhow::Result<()> {
        match axis {
            Axis::X => self.gamepad.thumb_lx = value,
            // Note: the Y dimension is negated because XInput reports up as positive.
            Axis::Y => self.gamepad.thumb_ly = value.saturating_neg(),
        }
        Ok(())
    }

    fn set_button(&mut self, button: Button, pressed: bool) -> anyhow::Result<()> {
        let xbox_button = match button {
            Button::A => XButtons::A,
            Button::B => XButtons::B,
            Button::X => XButtons::X,
            Button::Y => XButtons::Y,
            Button::LeftShoulder => XButtons::LB,
            Button::RightShoulder => XButtons::RB,
            Button::Select => XButtons::BACK,
            Button::Start => XButtons::START,
        };

        if pressed {
            self.gamepad.buttons.raw |= xbox_button;
        } else {
            self.gamepad.buttons.raw &= !xbox_button;
        }
        Ok(())
    }

    fn sync(&mut self) -> anyhow::Result<()> {
        self.target.update(&self.gamepad)?;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.target.unplug()?;
        Ok(())
    }
}
