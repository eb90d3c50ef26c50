//! Owns the listening socket, the bounded worker pool, and the reaper that
//! drains worker results.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::crypto::{CipherWrap, RsaPrimitive};
use crate::error::DistrimError;
use crate::finger::Finger;
use crate::finger_space::FingerSpace;
use crate::protocol::envelope::EnvelopeConfig;
use crate::protocol::incoming::{DeliveryHook, IncomingHandler};
use crate::protocol::outgoing::OutgoingContext;
use crate::wire::WireFramer;

/// Listener + bounded worker pool + reaper, in the *idle → running → stopped*
/// lifecycle described for the connection manager.
pub struct ConnectionManager<P: RsaPrimitive + Clone + 'static> {
    config: Config,
    primitive: P,
    local_finger: Finger,
    local_cipher: Arc<CipherWrap<P>>,
    finger_space: Arc<FingerSpace>,
    delivery_hook: Arc<dyn DeliveryHook>,
    framer: Arc<WireFramer>,
    outgoing: OutgoingContext<P>,
    semaphore: Arc<Semaphore>,
    running: AtomicBool,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    shutdown: Arc<Notify>,
    acceptor_handle: Mutex<Option<JoinHandle<()>>>,
    reaper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<P: RsaPrimitive + Clone + 'static> ConnectionManager<P> {
    pub fn new(
        config: Config,
        primitive: P,
        local_finger: Finger,
        local_cipher: Arc<CipherWrap<P>>,
        finger_space: Arc<FingerSpace>,
        delivery_hook: Arc<dyn DeliveryHook>,
    ) -> Arc<Self> {
        let framer = Arc::new(WireFramer::new(config.timeout()));
        let envelope = EnvelopeConfig {
            salt_len_min: config.salt_len_min,
            salt_len_max: config.salt_len_max,
        };
        let outgoing = OutgoingContext {
            primitive: primitive.clone(),
            local_finger: local_finger.clone(),
            local_cipher: local_cipher.clone(),
            finger_space: finger_space.clone(),
            framer: framer.clone(),
            envelope,
            path_length: config.path_length,
            crypt_chunk_size: config.crypt_chunk_size,
        };
        let semaphore = Arc::new(Semaphore::new(config.thread_pool_length));

        Arc::new(Self {
            config,
            primitive,
            local_finger,
            local_cipher,
            finger_space,
            delivery_hook,
            framer,
            outgoing,
            semaphore,
            running: AtomicBool::new(false),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            shutdown: Arc::new(Notify::new()),
            acceptor_handle: Mutex::new(None),
            reaper_handle: Mutex::new(None),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::SeqCst)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::SeqCst)
    }

    /// Bind the listening socket and spawn the acceptor and reaper tasks.
    pub async fn start(self: &Arc<Self>) -> Result<(), DistrimError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.listening_port)).await?;
        log::info!("listening for connections on 0.0.0.0:{}", self.config.listening_port);
        self.running.store(true, Ordering::SeqCst);

        let (result_tx, result_rx) = mpsc::unbounded_channel();

        let acceptor_self = self.clone();
        let acceptor_shutdown = self.shutdown.clone();
        let acceptor = tokio::spawn(async move {
            acceptor_self.run_acceptor(listener, result_tx, acceptor_shutdown).await;
        });

        let reaper_self = self.clone();
        let reaper = tokio::spawn(async move {
            reaper_self.run_reaper(result_rx).await;
        });

        *self.acceptor_handle.lock().unwrap() = Some(acceptor);
        *self.reaper_handle.lock().unwrap() = Some(reaper);
        Ok(())
    }

    async fn run_acceptor(
        self: Arc<Self>,
        listener: TcpListener,
        result_tx: mpsc::UnboundedSender<Result<(), DistrimError>>,
        shutdown: Arc<Notify>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_worker(stream, addr, result_tx.clone()),
                        Err(err) => log::warn!("accept failed: {err}"),
                    }
                }
            }
        }
    }

    fn spawn_worker(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        addr: std::net::SocketAddr,
        result_tx: mpsc::UnboundedSender<Result<(), DistrimError>>,
    ) {
        let semaphore = self.semaphore.clone();
        let this = self.clone();
        tokio::spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let handler = IncomingHandler::new(
                this.primitive.clone(),
                this.local_finger.clone(),
                this.local_cipher.clone(),
                this.finger_space.clone(),
                this.framer.clone(),
                this.delivery_hook.clone(),
                this.config.salt_len_min,
                this.config.salt_len_max,
                this.config.crypt_chunk_size,
            );
            let mut stream = stream;
            let result = handler.handle(&mut stream).await;
            if let Err(ref err) = result {
                log::warn!("connection from {addr} failed: {err}");
            }
            let _ = result_tx.send(result);
            drop(permit);
        });
    }

    async fn run_reaper(self: Arc<Self>, mut result_rx: mpsc::UnboundedReceiver<Result<(), DistrimError>>) {
        while let Some(result) = result_rx.recv().await {
            match result {
                Ok(()) => {
                    self.success_count.fetch_add(1, Ordering::SeqCst);
                }
                Err(_) => {
                    self.failure_count.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    /// Notify all known peers, stop accepting new connections, and drain
    /// in-flight workers with a short polling wait.
    pub async fn stop(self: &Arc<Self>) {
        self.outgoing.leave_all().await;

        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();

        if let Some(handle) = self.acceptor_handle.lock().unwrap().take() {
            let _ = handle.await;
        }

        for _ in 0..50 {
            if self.semaphore.available_permits() == self.config.thread_pool_length {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        if let Some(handle) = self.reaper_handle.lock().unwrap().take() {
            let _ = handle.await;
        }
    }

    pub async fn bootstrap(&self, addr: &str, port: u16) -> Result<(), DistrimError> {
        self.outgoing.bootstrap(addr, port).await
    }

    pub async fn send_message(&self, recipient_ident: &str, text: &str) -> Result<(), DistrimError> {
        self.outgoing.send_message(recipient_ident, text).await
    }
}
