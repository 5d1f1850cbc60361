//! Connection lifecycle and the serialized command executor.

use std::io;
use std::os::unix::net::UnixDatagram as StdUnixDatagram;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempPath;
use tokio::net::UnixDatagram;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wpactl_config::ControlConfig;

use super::Message;
use super::events::{EventDecoder, EventStream};
use super::receiver::Receiver;
use crate::codec::trim_reply;
use crate::error::{ControlError, ParseError};

const CLIENT_SOCKET_PREFIX: &str = "wpactl_";

/// A live control connection to one network interface.
///
/// Created by [`Connection::connect`]; [`Connection::close`] detaches from
/// events and stops the background tasks. Dropping a connection without
/// closing it cancels the tasks but skips the `DETACH` exchange.
pub struct Connection {
    interface: String,
    socket: Arc<UnixDatagram>,
    /// Solicited replies. Holding the lock is what serializes commands.
    replies: Mutex<mpsc::Receiver<Message>>,
    events: Option<EventStream>,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    command_timeout: Duration,
    shutdown_timeout: Duration,
    attached: bool,
    /// Removes our socket file when the connection goes away.
    _local_path: TempPath,
}

impl Connection {
    /// Connect to the daemon socket for `interface`.
    ///
    /// Binds a uniquely named client socket in `config.client_dir`, starts
    /// the receive and event tasks, and subscribes to events with `ATTACH`
    /// unless `config.attach_events` is off.
    pub async fn connect(interface: &str, config: &ControlConfig) -> Result<Self, ControlError> {
        validate_interface(interface)?;

        let remote = config.socket_path(interface);
        let (socket, local_path) = bind_client_socket(&config.client_dir)?;
        socket.connect(&remote).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to connect to {}: {e}", remote.display()),
            )
        })?;
        socket.set_nonblocking(true)?;
        let socket = Arc::new(UnixDatagram::from_std(socket)?);

        let cancel = CancellationToken::new();
        let (solicited_tx, solicited_rx) = mpsc::channel(1);
        let (unsolicited_tx, unsolicited_rx) = mpsc::channel(1);
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));

        let receiver = Receiver::new(
            Arc::clone(&socket),
            solicited_tx,
            unsolicited_tx,
            cancel.clone(),
        );
        let decoder = EventDecoder::new(unsolicited_rx, events_tx, cancel.clone());
        let tasks = vec![
            ("receiver", tokio::spawn(receiver.run())),
            ("event decoder", tokio::spawn(decoder.run())),
        ];

        let mut conn = Self {
            interface: interface.to_string(),
            socket,
            replies: Mutex::new(solicited_rx),
            events: Some(EventStream::new(events_rx)),
            cancel,
            tasks,
            command_timeout: config.command_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
            attached: false,
            _local_path: local_path,
        };

        if config.attach_events {
            if let Err(err) = conn.run("ATTACH").await {
                conn.stop_tasks().await;
                return Err(err);
            }
            conn.attached = true;
        }

        info!(
            interface,
            path = %remote.display(),
            attached = conn.attached,
            "Connected to control interface"
        );
        Ok(conn)
    }

    /// The interface this connection controls.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Take the event stream. Returns `None` if it was already taken.
    ///
    /// Events keep flowing into a bounded buffer until it is taken; once the
    /// stream is dropped, further events are discarded.
    pub fn take_events(&mut self) -> Option<EventStream> {
        self.events.take()
    }

    /// Send `command` and wait for its reply.
    ///
    /// Only one command is in flight at a time; concurrent callers queue up.
    /// Stale replies left over from an earlier timed-out command are
    /// discarded before the command is written.
    pub async fn execute(&self, command: &str) -> Result<Vec<u8>, ControlError> {
        let label = command_label(command);
        let mut replies = self.replies.lock().await;

        while let Ok(stale) = replies.try_recv() {
            warn!(
                interface = %self.interface,
                command = %label,
                stale = ?StaleKind::from(&stale),
                "Discarding reply that arrived after its command timed out"
            );
        }

        debug!(interface = %self.interface, command = %label, "Sending command");
        self.socket.send(command.as_bytes()).await?;

        match tokio::time::timeout(self.command_timeout, replies.recv()).await {
            Ok(Some(Message::Datagram { data, .. })) => Ok(data),
            Ok(Some(Message::Error(err))) => Err(ControlError::Transport(err)),
            Ok(None) => Err(ControlError::closed()),
            Err(_) => {
                warn!(
                    interface = %self.interface,
                    command = %label,
                    timeout = ?self.command_timeout,
                    "Command timed out"
                );
                Err(ControlError::Timeout {
                    command: label,
                    after: self.command_timeout,
                })
            }
        }
    }

    /// Send `command` and require the daemon to answer `OK`.
    pub async fn run(&self, command: &str) -> Result<(), ControlError> {
        let reply = self.execute(command).await?;
        match trim_reply(&reply) {
            b"OK" => Ok(()),
            b"FAIL" => Err(ControlError::Failure {
                command: command_label(command),
            }),
            _ => Err(ParseError::new(String::from_utf8_lossy(&reply)).into()),
        }
    }

    /// Unsubscribe from events, stop the background tasks, and release the
    /// socket.
    ///
    /// Resources are released even if `DETACH` fails; its error is returned.
    pub async fn close(mut self) -> Result<(), ControlError> {
        let detached = if self.attached {
            self.run("DETACH").await
        } else {
            Ok(())
        };
        if let Err(err) = &detached {
            warn!(interface = %self.interface, error = %err, "DETACH failed");
        }

        self.stop_tasks().await;
        info!(interface = %self.interface, "Control connection closed");
        detached
    }

    /// Cancel both tasks and wait (bounded) for each to finish.
    async fn stop_tasks(&mut self) {
        self.cancel.cancel();
        for (name, mut handle) in self.tasks.drain(..) {
            match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => debug!(task = name, "Background task stopped"),
                Ok(Err(err)) => error!(task = name, error = %err, "Background task failed"),
                Err(_) => {
                    error!(
                        task = name,
                        timeout = ?self.shutdown_timeout,
                        "Background task did not stop in time, aborting"
                    );
                    handle.abort();
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("interface", &self.interface)
            .field("attached", &self.attached)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

/// What kind of stale message was thrown away (for logging only).
#[derive(Debug)]
enum StaleKind {
    Reply { len: usize },
    Error(io::ErrorKind),
}

impl From<&Message> for StaleKind {
    fn from(message: &Message) -> Self {
        match message {
            Message::Datagram { data, .. } => Self::Reply { len: data.len() },
            Message::Error(err) => Self::Error(err.kind()),
        }
    }
}

/// Bind a uniquely named socket in `dir`; the returned path unlinks it on drop.
fn bind_client_socket(dir: &Path) -> io::Result<(StdUnixDatagram, TempPath)> {
    let named = tempfile::Builder::new()
        .prefix(CLIENT_SOCKET_PREFIX)
        .make_in(dir, |path| StdUnixDatagram::bind(path))?;
    Ok(named.into_parts())
}

fn validate_interface(interface: &str) -> Result<(), ControlError> {
    if interface.is_empty() || interface == "." || interface == ".." || interface.contains('/') {
        return Err(ControlError::Transport(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid interface name {interface:?}"),
        )));
    }
    Ok(())
}

/// A printable form of `command` safe to log or return in errors.
///
/// `SET_NETWORK` values may be passphrases, so only the id and variable
/// name are kept.
pub(crate) fn command_label(command: &str) -> String {
    if command.starts_with("SET_NETWORK ") {
        let kept: Vec<&str> = command.splitn(4, ' ').take(3).collect();
        format!("{} <redacted>", kept.join(" "))
    } else {
        command.to_string()
    }
}
