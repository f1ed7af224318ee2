//! Copilot protocol session.
//!
//! A [`CopilotClient`] owns one Copilot CLI child process for its whole
//! lifetime:
//!
//! ```text
//! Unconnected --connect--> Connecting --handshake--> Connected
//!                               |                        |
//!                               +------disconnect--------+--> Disconnecting --> Closed
//! ```
//!
//! Three background tasks run per session: a stdout reader that frames and
//! publishes messages, a stderr logger, and a monitor that owns the child,
//! publishes its exit, and performs termination on request.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::copilot::{
    CopilotMessage, CopilotProcess, CopilotProcessBuilder, FrameBuffer, OutboundMessage,
    SpawnError,
};
use crate::detect::CommandDescriptor;
use crate::error::{classify, ClassifiedError, FailureSignal};

/// Grace period after which a silent CLI is assumed ready.
pub const READY_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Hard limit on the handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a terminated process gets to exit before it is killed.
pub const DISCONNECT_GRACE: Duration = Duration::from_secs(3);

const READ_CHUNK: usize = 8 * 1024;

/// Error type for session operations.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// The process could not be spawned.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// The session already has a process.
    #[error("Copilot process already started")]
    AlreadyStarted,
    /// No process has been started.
    #[error("Copilot process not started")]
    NotStarted,
    /// The handshake has not completed, or the process has gone away.
    #[error("Copilot not connected")]
    NotConnected,
    /// Neither a readiness message nor the grace period arrived in time.
    #[error("Copilot initialization timeout ({})", duration_label(.0))]
    HandshakeTimeout(Duration),
    /// Encoding an outbound message failed.
    #[error("Failed to encode message as JSON: {0}")]
    Encode(#[from] serde_json::Error),
    /// Writing to the process failed.
    #[error("Failed to write to Copilot process: {0}")]
    Io(#[from] std::io::Error),
}

fn duration_label(duration: &Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

impl From<&ClientError> for FailureSignal {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::Spawn(spawn) => FailureSignal::from(spawn),
            ClientError::Encode(json) => FailureSignal::from(json),
            ClientError::Io(io) => Self {
                message: Some(err.to_string()),
                ..FailureSignal::from(io)
            },
            _ => FailureSignal::from_error(err),
        }
    }
}

impl From<&ClientError> for ClassifiedError {
    fn from(err: &ClientError) -> Self {
        classify(err)
    }
}

impl From<ClientError> for ClassifiedError {
    fn from(err: ClientError) -> Self {
        classify(&err)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unconnected,
    Connecting,
    Connected,
    Disconnecting,
    Closed,
}

/// Session options.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Working directory for the process, also passed as an allowed directory.
    pub work_dir: Option<std::path::PathBuf>,
    /// Model requested from the CLI.
    pub model: Option<String>,
    /// Overrides [`HANDSHAKE_TIMEOUT`].
    pub timeout: Option<Duration>,
    /// Log every inbound and outbound message.
    pub debug: bool,
}

type MessageCallback = Box<dyn Fn(&CopilotMessage) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&ClassifiedError) + Send + Sync>;
type ExitCallback = Box<dyn Fn(Option<i32>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Message,
    Error,
    Exit,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    message: BTreeMap<u64, Arc<MessageCallback>>,
    error: BTreeMap<u64, Arc<ErrorCallback>>,
    exit: BTreeMap<u64, Arc<ExitCallback>>,
}

impl Subscribers {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, channel: Channel, id: u64) {
        match channel {
            Channel::Message => {
                self.message.remove(&id);
            }
            Channel::Error => {
                self.error.remove(&id);
            }
            Channel::Exit => {
                self.exit.remove(&id);
            }
        }
    }
}

/// Shared subscriber registry. Callbacks are cloned out before they run so
/// a callback may subscribe or unsubscribe without deadlocking.
#[derive(Clone, Default)]
struct Registry(Arc<Mutex<Subscribers>>);

impl Registry {
    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn publish_message(&self, message: &CopilotMessage) {
        let callbacks: Vec<_> = self.lock().message.values().cloned().collect();
        for callback in callbacks {
            callback(message);
        }
    }

    fn publish_error(&self, error: &ClassifiedError) {
        let callbacks: Vec<_> = self.lock().error.values().cloned().collect();
        for callback in callbacks {
            callback(error);
        }
    }

    fn publish_exit(&self, code: Option<i32>) {
        let callbacks: Vec<_> = self.lock().exit.values().cloned().collect();
        for callback in callbacks {
            callback(code);
        }
    }

    fn subscription(&self, channel: Channel, id: u64) -> Subscription {
        Subscription {
            registry: Arc::downgrade(&self.0),
            channel,
            id,
        }
    }
}

/// Handle returned by the `on_*` methods.
///
/// Dropping the handle leaves the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Subscribers>>,
    channel: Channel,
    id: u64,
}

impl Subscription {
    /// Remove the callback. A no-op once the session is gone.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(self.channel, self.id);
        }
    }
}

/// A session with one Copilot CLI process.
pub struct CopilotClient {
    command: CommandDescriptor,
    config: ClientConfig,
    state: SessionState,
    stdin: Option<ChildStdin>,
    pid: Option<u32>,
    exited: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<Duration>>,
    monitor: Option<JoinHandle<()>>,
    readers: Vec<JoinHandle<()>>,
    subscribers: Registry,
}

impl std::fmt::Debug for CopilotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopilotClient")
            .field("command", &self.command)
            .field("state", &self.state)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl CopilotClient {
    /// Create an unconnected session for `command`.
    #[must_use]
    pub fn new(command: CommandDescriptor, config: ClientConfig) -> Self {
        Self {
            command,
            config,
            state: SessionState::Unconnected,
            stdin: None,
            pid: None,
            exited: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            monitor: None,
            readers: Vec::new(),
            subscribers: Registry::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connected and the process has not exited.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && !self.exited.load(Ordering::SeqCst)
    }

    /// Process id of the live child, if any.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    #[must_use]
    pub fn command(&self) -> &CommandDescriptor {
        &self.command
    }

    /// Call `callback` for every parsed inbound message.
    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CopilotMessage) + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.lock();
        let id = subs.next_id();
        subs.message.insert(id, Arc::new(Box::new(callback)));
        drop(subs);
        self.subscribers.subscription(Channel::Message, id)
    }

    /// Call `callback` for process-level failures.
    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ClassifiedError) + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.lock();
        let id = subs.next_id();
        subs.error.insert(id, Arc::new(Box::new(callback)));
        drop(subs);
        self.subscribers.subscription(Channel::Error, id)
    }

    /// Call `callback` with the exit code when the process exits.
    pub fn on_exit<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<i32>) + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.lock();
        let id = subs.next_id();
        subs.exit.insert(id, Arc::new(Box::new(callback)));
        drop(subs);
        self.subscribers.subscription(Channel::Exit, id)
    }

    /// Spawn the CLI and wait for it to become ready.
    ///
    /// Ready means a `ready` message arrived, or nothing arrived within
    /// [`READY_GRACE_PERIOD`]. On a handshake failure the process is kept so
    /// that [`CopilotClient::disconnect`] can tear it down.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::AlreadyStarted` if a process is live,
    /// `ClientError::Spawn` if spawning fails, and
    /// `ClientError::HandshakeTimeout` if the hard timeout elapses first.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if !matches!(self.state, SessionState::Unconnected | SessionState::Closed) {
            return Err(ClientError::AlreadyStarted);
        }

        let mut builder = CopilotProcessBuilder::new(self.command.clone());
        if let Some(dir) = &self.config.work_dir {
            builder = builder.working_dir(dir);
        }
        if let Some(model) = &self.config.model {
            builder = builder.model(model);
        }

        let mut process = CopilotProcess::spawn(&builder).map_err(|e| {
            tracing::warn!(error = %e, "Connection failed");
            ClientError::from(e)
        })?;

        let (Some(stdin), Some(stdout), Some(stderr)) = (
            process.take_stdin(),
            process.take_stdout(),
            process.take_stderr(),
        ) else {
            let _ = process.kill().await;
            return Err(SpawnError::MissingPipe.into());
        };

        self.exited = Arc::new(AtomicBool::new(false));
        self.pid = process.id();
        self.stdin = Some(stdin);
        self.state = SessionState::Connecting;
        tracing::debug!(pid = ?self.pid, "Copilot process spawned");

        // Register the readiness watcher before any output can be read.
        let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();
        let ready_sub = self.on_message(move |message| {
            if message.is_ready() {
                let _ = ready_tx.send(());
            }
        });

        self.readers = vec![
            tokio::spawn(read_stdout(stdout, self.subscribers.clone(), self.config.debug)),
            tokio::spawn(log_stderr(stderr)),
        ];

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown = Some(shutdown_tx);
        self.monitor = Some(tokio::spawn(monitor(
            process,
            shutdown_rx,
            self.subscribers.clone(),
            Arc::clone(&self.exited),
        )));

        let hard_timeout = self.config.timeout.unwrap_or(HANDSHAKE_TIMEOUT);
        let outcome = tokio::select! {
            Some(()) = ready_rx.recv() => {
                tracing::debug!("Received ready message");
                Ok(())
            }
            () = tokio::time::sleep(READY_GRACE_PERIOD) => {
                tracing::debug!("No ready message received, assuming ready");
                Ok(())
            }
            () = tokio::time::sleep(hard_timeout) => {
                Err(ClientError::HandshakeTimeout(hard_timeout))
            }
        };
        ready_sub.unsubscribe();

        match outcome {
            Ok(()) => {
                self.state = SessionState::Connected;
                tracing::debug!("Connected successfully");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Connection failed");
                Err(e)
            }
        }
    }

    /// Send a prompt.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotStarted` without a process,
    /// `ClientError::NotConnected` before the handshake completes or after
    /// the process exited, and `ClientError::Io` if the write fails.
    pub async fn send_prompt(&mut self, prompt: &str) -> Result<(), ClientError> {
        if self.stdin.is_none() {
            return Err(ClientError::NotStarted);
        }
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let preview: String = prompt.chars().take(50).collect();
        tracing::debug!(prompt = %preview, "Sending prompt");
        self.write(&OutboundMessage::prompt(prompt)).await
    }

    /// Ask the CLI to abort the current operation.
    ///
    /// Best effort: a no-op without a process, and write failures are only
    /// logged.
    pub async fn abort(&mut self) {
        if self.stdin.is_none() {
            return;
        }

        tracing::debug!("Sending abort signal");
        if let Err(e) = self.write(&OutboundMessage::abort()).await {
            tracing::warn!(error = %e, "Failed to send abort");
        }
    }

    async fn write(&mut self, message: &OutboundMessage) -> Result<(), ClientError> {
        let line = message.to_line()?;
        let stdin = self.stdin.as_mut().ok_or(ClientError::NotStarted)?;
        if self.config.debug {
            tracing::debug!(line = %line.trim_end(), "Outbound message");
        }
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Terminate the process and close the session.
    ///
    /// Sends SIGTERM, waits up to [`DISCONNECT_GRACE`], then kills. Always
    /// ends in [`SessionState::Closed`].
    pub async fn disconnect(&mut self) {
        tracing::debug!("Disconnecting");
        self.state = SessionState::Disconnecting;

        // Closing stdin lets a well-behaved CLI exit on its own.
        self.stdin = None;

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(DISCONNECT_GRACE);
        }

        if let Some(monitor) = self.monitor.take() {
            if let Err(e) = monitor.await {
                tracing::warn!(error = %e, "Monitor task failed");
            }
        }

        for reader in self.readers.drain(..) {
            reader.abort();
        }

        self.pid = None;
        self.state = SessionState::Closed;
        tracing::debug!("Disconnected");
    }
}

impl Drop for CopilotClient {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
        // The monitor kills the child once it sees the shutdown request.
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(Duration::ZERO);
        }
    }
}

async fn read_stdout(mut stdout: impl AsyncRead + Unpin, subscribers: Registry, debug: bool) {
    let mut frames = FrameBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                for message in frames.push_messages(&chunk[..n]) {
                    if debug {
                        tracing::debug!(?message, "Inbound message");
                    }
                    subscribers.publish_message(&message);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read Copilot stdout");
                subscribers.publish_error(&classify(&e));
                break;
            }
        }
    }

    if !frames.is_empty() {
        tracing::debug!(bytes = frames.pending().len(), "Discarding partial line at EOF");
    }
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(stderr = %line, "Copilot stderr");
    }
}

async fn monitor(
    mut process: CopilotProcess,
    mut shutdown: oneshot::Receiver<Duration>,
    subscribers: Registry,
    exited: Arc<AtomicBool>,
) {
    let status = tokio::select! {
        status = process.wait() => status,
        Ok(grace) = &mut shutdown => {
            if let Err(e) = process.graceful_terminate(grace).await {
                tracing::warn!(error = %e, "Failed to terminate Copilot process");
            }
            process.wait().await
        }
    };

    exited.store(true, Ordering::SeqCst);

    match status {
        Ok(status) => {
            tracing::debug!(code = ?status.code(), "Process exited");
            subscribers.publish_exit(status.code());
        }
        Err(e) => {
            tracing::warn!(error = %e, "Process error");
            subscribers.publish_error(&classify(&e));
        }
    }
}
