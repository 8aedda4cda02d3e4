use crate::config::BackoffConfig;
use crate::error::LinkError;
use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::select;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// An established transport to the server.
///
/// `send` takes `&self` so the sender can use a link it cloned out of the
/// [`ConnectionSlot`] without holding the slot's lock during I/O.
#[async_trait]
pub trait Link: Send + Sync {
    async fn send(&self, frame: &[u8]) -> io::Result<()>;
}

/// Opens new links to the server.
#[async_trait]
pub trait Connector: Send + Sync {
    type Link: Link + 'static;

    async fn connect(&self) -> io::Result<Self::Link>;

    /// Human-readable name of the remote end, for logs.
    fn address(&self) -> &str;
}

pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Link = TcpLink;

    async fn connect(&self) -> io::Result<TcpLink> {
        let stream = TcpStream::connect(self.address.as_str()).await?;
        // Frames are tiny and latency matters more than throughput
        stream.set_nodelay(true)?;
        Ok(TcpLink { stream })
    }

    fn address(&self) -> &str {
        &self.address
    }
}

pub struct TcpLink {
    stream: TcpStream,
}

#[async_trait]
impl Link for TcpLink {
    async fn send(&self, frame: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < frame.len() {
            self.stream.writable().await?;
            match self.stream.try_write(&frame[written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Holds the single live link, if any.
///
/// The connection manager installs links; anyone who sees a link fail
/// discards it, which wakes the manager to establish a replacement.
pub struct ConnectionSlot<L> {
    link: Mutex<Option<Arc<L>>>,
    lost: Notify,
    connected: watch::Sender<bool>,
}

impl<L> Default for ConnectionSlot<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> ConnectionSlot<L> {
    pub fn new() -> Self {
        Self {
            link: Mutex::new(None),
            lost: Notify::new(),
            connected: watch::channel(false).0,
        }
    }

    /// The current link, if one is held.
    pub fn current(&self) -> Option<Arc<L>> {
        self.link().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.link().is_some()
    }

    /// Drops `link` if it is still the installed one. Returns whether it was.
    ///
    /// A stale handle (already replaced by a newer link) is left alone.
    pub fn discard(&self, link: &Arc<L>) -> bool {
        let mut current = self.link();
        match current.as_ref() {
            Some(installed) if Arc::ptr_eq(installed, link) => {
                *current = None;
                drop(current);
                self.connected.send_replace(false);
                self.lost.notify_one();
                true
            }
            _ => false,
        }
    }

    /// Watch the connected flag; it flips to `true` on every
    /// disconnected-to-connected transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    fn install(&self, link: L) {
        *self.link() = Some(Arc::new(link));
        self.connected.send_replace(true);
    }

    fn clear(&self) {
        self.link().take();
        self.connected.send_replace(false);
    }

    async fn wait_until_lost(&self) {
        self.lost.notified().await;
    }

    fn link(&self) -> MutexGuard<'_, Option<Arc<L>>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bounded exponential backoff between connect attempts.
#[derive(Clone, Debug)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    factor: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration, factor: f64) -> Self {
        Self {
            floor,
            ceiling,
            factor,
            current: floor,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.floor_ms),
            Duration::from_millis(config.ceiling_ms),
            config.factor,
        )
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the delay to wait now and grows the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        // Grow in f64 so a large factor saturates instead of overflowing Duration
        let grown = self.current.as_secs_f64() * self.factor;
        self.current = if grown >= self.ceiling.as_secs_f64() {
            self.ceiling
        } else {
            Duration::from_secs_f64(grown)
        };
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

/// Keeps at most one link to the server alive, reconnecting in the
/// background whenever the slot is empty.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    slot: Arc<ConnectionSlot<C::Link>>,
    backoff: Backoff,
    connect_timeout: Duration,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(
        connector: C,
        slot: Arc<ConnectionSlot<C::Link>>,
        backoff: Backoff,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            slot,
            backoff,
            connect_timeout,
        }
    }

    /// Run until `shutdown` is cancelled, then drop the held link.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            if self.slot.is_connected() {
                select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = self.slot.wait_until_lost() => {
                        debug!("Lost connection to {}", self.connector.address());
                        continue;
                    }
                }
            }

            let attempt = select! {
                biased;
                _ = shutdown.cancelled() => break,
                attempt = self.connect_once() => attempt,
            };

            match attempt {
                Ok(link) => {
                    self.slot.install(link);
                    self.backoff.reset();
                    debug!("Connected to {}", self.connector.address());
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    debug!("{e}, retrying in {delay:?}");
                    select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.slot.clear();
        debug!("Connection manager exiting");
    }

    async fn connect_once(&self) -> Result<C::Link, LinkError> {
        match tokio::time::timeout(self.connect_timeout, self.connector.connect()).await {
            Ok(Ok(link)) => Ok(link),
            Ok(Err(source)) => Err(LinkError::Connect {
                address: self.connector.address().to_string(),
                source,
            }),
            Err(_) => Err(LinkError::ConnectTimeout(
                self.connector.address().to_string(),
            )),
        }
    }
}
