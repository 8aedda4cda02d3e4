use crate::config::DeviceConfig;
use remote_gamepad_common::Button;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

/// Creates a new virtual device using the platform-specific APIs.
pub async fn new_device(config: &DeviceConfig) -> anyhow::Result<impl VirtualDevice> {
    #[cfg(target_os = "linux")]
    return linux::UInputDevice::new(config).await;
    #[cfg(target_os = "windows")]
    return windows::ViGEmDevice::new(config);
}

/// A continuous axis of the virtual device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Axis {
    X,
    Y,
}

/// A virtual device acts like a real gamepad device, but is controlled by software.
///
/// Updates are accumulated until [`VirtualDevice::sync`] publishes them as one
/// input event group.
pub trait VirtualDevice: Send {
    fn set_axis(&mut self, axis: Axis, value: i16) -> anyhow::Result<()>;

    fn set_button(&mut self, button: Button, pressed: bool) -> anyhow::Result<()>;

    fn sync(&mut self) -> anyhow::Result<()>;

    /// Removes the device from the system.
    fn close(&mut self) -> anyhow::Result<()>;
}
