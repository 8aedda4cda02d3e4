use crate::axis_mapper::{AxisMapper, AxisSource};
use crate::error::ServerError;
use crate::transport::Listener;
use crate::virtual_device::{Axis, VirtualDevice};
use futures::StreamExt;
use remote_gamepad_common::{Button, ControllerFrame, FrameCodec};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::select;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Pause after a failed accept, so errors like EMFILE don't spin the loop.
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// Serves one handheld at a time, feeding its frames into a virtual device.
///
/// A new connection is only accepted once the previous one has closed, so
/// the device never sees interleaved input from two clients.
pub struct Server<L, D> {
    listener: L,
    device: D,
    mapper: AxisMapper,
}

impl<L: Listener, D: VirtualDevice> Server<L, D> {
    pub fn new(listener: L, device: D, mapper: AxisMapper) -> Self {
        Self {
            listener,
            device,
            mapper,
        }
    }

    /// Run the accept loop until `shutdown` is cancelled, then close the
    /// listener and the virtual device.
    pub async fn run(mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!("Server started, waiting for connections");

        loop {
            let accepted = select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(connection) => connection,
                Err(e) => {
                    error!("New connection error: {e}");
                    select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_ERROR_DELAY) => continue,
                    }
                }
            };
            info!("New connection from {peer}");

            match self.handle_connection(stream, &shutdown).await {
                Ok(()) => info!("Closed connection with [{peer}]"),
                Err(e) => error!("Closing connection with [{peer}] due to error: {e}"),
            }
        }

        info!("Server shutting down");
        drop(self.listener);
        self.device.close()?;
        info!("Server shut down");
        Ok(())
    }

    /// Reads frames from `stream` until it ends, fails, or `shutdown` is
    /// cancelled. The stream is closed when this returns.
    pub async fn handle_connection<S>(
        &mut self,
        stream: S,
        shutdown: &CancellationToken,
    ) -> Result<(), ServerError>
    where
        S: AsyncRead + Unpin,
    {
        let mut frames = FramedRead::new(stream, FrameCodec::new());

        loop {
            let next = select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                next = frames.next() => next,
            };

            let Some(frame) = next else {
                return Ok(());
            };
            apply_frame(&mut self.device, &self.mapper, frame?).map_err(ServerError::Device)?;
        }
    }
}

/// Writes one frame to the device as a single input event group.
pub fn apply_frame(
    device: &mut impl VirtualDevice,
    mapper: &AxisMapper,
    frame: ControllerFrame,
) -> anyhow::Result<()> {
    let position = mapper.map(&frame);
    device.set_axis(Axis::X, position.x)?;
    device.set_axis(Axis::Y, position.y)?;
    for button in Button::ALL {
        device.set_button(button, frame.buttons.contains(button.flag()))?;
    }
    device.sync()?;

    match (position.x_source, position.y_source) {
        (AxisSource::Stick, AxisSource::Stick) => {
            debug!("[STICK] X={} Y={}", position.x, position.y)
        }
        (AxisSource::DPad, AxisSource::DPad) => {
            debug!("[DPAD] X={} Y={}", position.x, position.y)
        }
        (x_source, y_source) => {
            debug!("[{x_source:?}] X={} [{y_source:?}] Y={}", position.x, position.y)
        }
    }
    if !frame.buttons.is_empty() {
        debug!("[BUTTONS] {:?}", frame.buttons);
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::mocks::{DeviceEvent, MockDevice};
    use super::*;
    use crate::config::AxesConfig;
    use crate::transport::bind_tcp;
    use crate::transport::mocks::MockListener;
    use remote_gamepad_common::frame::encode;
    use remote_gamepad_common::{Buttons, FrameError, AXIS_MIN};
    use std::io;
    use std::net::SocketAddr;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn test_server(device: MockDevice) -> (Server<TcpListener, MockDevice>, SocketAddr) {
        let listener = bind_tcp("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = Server::new(listener, device, AxisMapper::new(AxesConfig::default()));
        (server, address)
    }

    async fn wait_for_syncs(device: &MockDevice, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while device.sync_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for frames");
    }

    #[test]
    fn applies_stick_and_buttons() {
        let mut device = MockDevice::new();
        let mapper = AxisMapper::new(AxesConfig::default());
        let frame = ControllerFrame::decode(&encode(-320, 0, 0b0000_0001, 0)).unwrap();

        apply_frame(&mut device, &mapper, frame).unwrap();

        let events = device.get_events();
        assert_eq!(events[0], DeviceEvent::Axis(Axis::X, AXIS_MIN));
        assert_eq!(events[1], DeviceEvent::Axis(Axis::Y, 0));
        assert_eq!(events[2], DeviceEvent::Button(Button::A, true));
        for event in &events[3..10] {
            assert!(matches!(event, DeviceEvent::Button(_, false)), "{event:?}");
        }
        assert_eq!(events[10], DeviceEvent::Sync);
        assert_eq!(events.len(), 11);
    }

    #[tokio::test]
    async fn split_frame_is_applied_once() {
        let device = MockDevice::new();
        let (mut server, _) = test_server(device.clone()).await;
        let bytes = encode(-320, 0, Buttons::A.bits(), 0);
        let stream = tokio_test::io::Builder::new()
            .read(&bytes[..4])
            .read(&bytes[4..])
            .build();

        server
            .handle_connection(stream, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(device.sync_count(), 1);
        assert!(device
            .get_events()
            .contains(&DeviceEvent::Button(Button::A, true)));
    }

    #[tokio::test]
    async fn truncated_stream_is_a_frame_error() {
        let device = MockDevice::new();
        let (mut server, _) = test_server(device.clone()).await;
        let bytes = encode(1, 2, 0, 0);
        let stream = tokio_test::io::Builder::new()
            .read(&bytes)
            .read(&bytes[..2])
            .build();

        let result = server
            .handle_connection(stream, &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(ServerError::Frame(FrameError::Malformed(2)))
        ));
        assert_eq!(device.sync_count(), 1);
    }

    #[tokio::test]
    async fn device_failure_drops_the_connection() {
        let device = MockDevice::new();
        *device.fail_sync.lock().unwrap() = true;
        let (mut server, _) = test_server(device.clone()).await;
        let bytes = encode(1, 2, 0, 0);
        let stream = tokio_test::io::Builder::new().read(&bytes).build();

        let result = server
            .handle_connection(stream, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ServerError::Device(_))));
    }

    #[tokio::test]
    async fn serves_clients_one_at_a_time() {
        let device = MockDevice::new();
        let (server, address) = test_server(device.clone()).await;
        let shutdown = CancellationToken::new();
        let server_task = tokio::spawn(server.run(shutdown.clone()));

        let mut first = TcpStream::connect(address).await.unwrap();
        first.write_all(&encode(0, 0, 0, 0)).await.unwrap();
        wait_for_syncs(&device, 1).await;

        // The second client is only serviced once the first one leaves
        let mut second = TcpStream::connect(address).await.unwrap();
        second.write_all(&encode(266, 0, 0, 0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(device.sync_count(), 1);

        drop(first);
        wait_for_syncs(&device, 2).await;

        shutdown.cancel();
        server_task.await.unwrap().unwrap();
        assert!(device.is_closed());
    }

    #[tokio::test]
    async fn malformed_client_does_not_stop_the_server() {
        let device = MockDevice::new();
        let (server, address) = test_server(device.clone()).await;
        let shutdown = CancellationToken::new();
        let server_task = tokio::spawn(server.run(shutdown.clone()));

        let mut broken = TcpStream::connect(address).await.unwrap();
        broken.write_all(&[1, 2, 3]).await.unwrap();
        drop(broken);

        let mut healthy = TcpStream::connect(address).await.unwrap();
        healthy.write_all(&encode(-320, 0, 0, 0)).await.unwrap();
        wait_for_syncs(&device, 1).await;
        assert!(device
            .get_events()
            .contains(&DeviceEvent::Axis(Axis::X, AXIS_MIN)));

        shutdown.cancel();
        server_task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn accept_errors_are_retried_after_a_pause() {
        static FRAME: [u8; 6] = [0, 0, 0, 0, 0, 0];
        let mut listener = MockListener::default();
        for _ in 0..3 {
            listener
                .accepts
                .push_back(Err(io::Error::new(io::ErrorKind::Other, "too many open files")));
        }
        listener.accepts.push_back(Ok(&FRAME));
        let accept_times = listener.get_accept_times();

        let device = MockDevice::new();
        let server = Server::new(
            listener,
            device.clone(),
            AxisMapper::new(AxesConfig::default()),
        );
        let shutdown = CancellationToken::new();
        let server_task = tokio::spawn(server.run(shutdown.clone()));

        wait_for_syncs(&device, 1).await;
        shutdown.cancel();
        server_task.await.unwrap().unwrap();

        let accept_times = accept_times.lock().unwrap().clone();
        assert!(accept_times.len() >= 4);
        for pair in accept_times[..4].windows(2) {
            assert!(pair[1] - pair[0] >= ACCEPT_ERROR_DELAY);
        }
    }
}
