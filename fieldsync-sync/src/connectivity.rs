//! Process-wide connectivity state.
//!
//! The host platform feeds raw online/offline signals into
//! [`ConnectivityMonitor::handle_host_signal`]. Going offline takes effect
//! immediately; coming back online is only believed once a
//! [`ReachabilityProbe`] confirms it. On every confirmed reconnection the
//! monitor checks the pending queue and, if anything is waiting, raises the
//! sync-needed signal whether or not any UI listener is attached.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use fieldsync_storage::OperationQueue;
use reqwest::Client;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Link state as seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Online => f.write_str("online"),
            ConnectivityState::Offline => f.write_str("offline"),
        }
    }
}

/// Raw signal delivered by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Online,
    Offline,
}

/// Notification delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// A reconnection was confirmed.
    Online,
    /// The link went down.
    Offline,
    /// The link came back with operations waiting in the queue.
    SyncNeeded { pending: usize },
}

/// Independent check that the remote is actually reachable.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Probes a URL with a `HEAD` request. Any answer below 500 counts as
/// reachable; an error status still proves the network path works.
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create probe client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                let reachable = response.status().as_u16() < 500;
                debug!("probe {} answered {}", self.url, response.status());
                reachable
            }
            Err(e) => {
                debug!("probe {} failed: {}", self.url, e);
                false
            }
        }
    }
}

/// A probe whose answer is set by hand.
#[derive(Debug, Default)]
pub struct ManualProbe {
    reachable: AtomicBool,
    calls: AtomicU64,
}

impl ManualProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            calls: AtomicU64::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// How many times the probe ran.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ManualProbe {
    async fn probe(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receiving end of a listener registration.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    rx: mpsc::UnboundedReceiver<ConnectivityEvent>,
}

impl Listener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Waits for the next event. Returns `None` once the listener has been
    /// removed and drained.
    pub async fn recv(&mut self) -> Option<ConnectivityEvent> {
        self.rx.recv().await
    }

    /// Returns an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ConnectivityEvent> {
        self.rx.try_recv().ok()
    }
}

type ListenerMap = HashMap<ListenerId, mpsc::UnboundedSender<ConnectivityEvent>>;

/// Single source of truth for reachability.
pub struct ConnectivityMonitor {
    online: AtomicBool,
    listeners: Mutex<ListenerMap>,
    next_listener: AtomicU64,
    sync_needed: Notify,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    queue: Option<Arc<dyn OperationQueue>>,
    transition: tokio::sync::Mutex<()>,
}

impl ConnectivityMonitor {
    /// Creates a monitor in the given state, trusting host signals as-is.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            sync_needed: Notify::new(),
            probe: None,
            queue: None,
            transition: tokio::sync::Mutex::new(()),
        }
    }

    /// Requires `probe` to confirm every reconnection.
    pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Checks `queue` on reconnection to decide whether a sync is needed.
    pub fn with_queue(mut self, queue: Arc<dyn OperationQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Sets the initial state from the probe, if one is configured.
    pub async fn detect(self) -> Self {
        if let Some(probe) = &self.probe {
            let reachable = probe.probe().await;
            self.online.store(reachable, Ordering::SeqCst);
            info!("initial connectivity: {}", self.state());
        }
        self
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectivityState {
        if self.is_online() {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    fn listeners(&self) -> MutexGuard<'_, ListenerMap> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a listener for connectivity events.
    pub fn add_listener(&self) -> Listener {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners().insert(id, tx);
        Listener { id, rx }
    }

    /// Unregisters a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners().remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    /// Feeds a host signal through the transition rules.
    pub async fn handle_host_signal(&self, signal: HostSignal) {
        let _guard = self.transition.lock().await;
        match signal {
            HostSignal::Offline => self.go_offline(),
            HostSignal::Online => {
                if self.is_online() {
                    return;
                }
                if let Some(probe) = &self.probe {
                    if !probe.probe().await {
                        debug!("host reports online but the probe failed; staying offline");
                        return;
                    }
                }
                self.go_online().await;
            }
        }
    }

    /// Runs the probe once and applies whatever it finds. Without a probe
    /// the current state is returned unchanged.
    pub async fn poll_once(&self) -> bool {
        let Some(probe) = &self.probe else {
            return self.is_online();
        };
        let _guard = self.transition.lock().await;
        let reachable = probe.probe().await;
        match (reachable, self.is_online()) {
            (true, false) => self.go_online().await,
            (false, true) => self.go_offline(),
            _ => {}
        }
        reachable
    }

    /// Polls the probe every `interval` for hosts without native signals.
    pub fn spawn_poller(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.poll_once().await;
            }
        })
    }

    /// Waits until a sync has been requested. A request raised while no
    /// one is waiting is kept until the next call.
    pub async fn sync_needed(&self) {
        self.sync_needed.notified().await;
    }

    /// Raises the sync-needed signal directly.
    pub fn request_sync(&self) {
        self.sync_needed.notify_one();
    }

    fn go_offline(&self) {
        if self.online.swap(false, Ordering::SeqCst) {
            info!("connectivity lost");
            self.broadcast(ConnectivityEvent::Offline);
        }
    }

    async fn go_online(&self) {
        self.online.store(true, Ordering::SeqCst);
        info!("connectivity restored");
        self.broadcast(ConnectivityEvent::Online);

        let Some(queue) = &self.queue else {
            self.sync_needed.notify_one();
            return;
        };
        match queue.len().await {
            Ok(0) => debug!("queue empty after reconnection"),
            Ok(pending) => {
                info!("{} pending operations after reconnection", pending);
                self.sync_needed.notify_one();
                self.broadcast(ConnectivityEvent::SyncNeeded { pending });
            }
            Err(e) => {
                warn!("could not inspect queue after reconnection: {}", e);
                self.sync_needed.notify_one();
            }
        }
    }

    /// Sends to every listener, dropping those whose receiver is gone.
    fn broadcast(&self, event: ConnectivityEvent) {
        self.listeners().retain(|_, tx| tx.send(event).is_ok());
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("listeners", &self.listener_count())
            .field("probe", &self.probe.is_some())
            .finish()
    }
}
