//! A scripted stand-in for the daemon's control socket.
//!
//! [`FakeSupplicant`] binds a datagram socket named after an interface in a
//! temporary directory, answers commands from a script, records every
//! command it receives, and can push `<P>`-tagged notifications to the most
//! recent client.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::UnixDatagram;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use wpactl_config::ControlConfig;
use wpactl_core::Connection;

use crate::config::TestConfigBuilder;

/// How the fake daemon answers a command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send these bytes back immediately.
    Text(Vec<u8>),
    /// Send these bytes back after a delay.
    Delayed(Duration, Vec<u8>),
    /// Never answer.
    Silent,
}

type Script = Arc<Mutex<HashMap<String, Reply>>>;

/// A fake daemon listening on `<tempdir>/<interface>`.
///
/// Replies are looked up by the exact command first, then by its first
/// word. Unscripted `PING`, `ATTACH` and `DETACH` get their usual answers;
/// anything else gets `UNKNOWN COMMAND`.
pub struct FakeSupplicant {
    interface: String,
    dir: TempDir,
    socket: Arc<UnixDatagram>,
    script: Script,
    received: Arc<Mutex<Vec<String>>>,
    peer: Arc<Mutex<Option<PathBuf>>>,
    task: JoinHandle<()>,
}

impl FakeSupplicant {
    /// Bind the fake daemon socket for `interface` and start serving.
    pub async fn start(interface: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let socket = UnixDatagram::bind(dir.path().join(interface))
            .expect("failed to bind fake daemon socket");
        let socket = Arc::new(socket);

        let script: Script = Arc::default();
        let received = Arc::default();
        let peer = Arc::default();

        let task = tokio::spawn(serve(
            Arc::clone(&socket),
            Arc::clone(&script),
            Arc::clone(&received),
            Arc::clone(&peer),
        ));

        Self {
            interface: interface.to_string(),
            dir,
            socket,
            script,
            received,
            peer,
            task,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Directory holding the daemon socket (and, by default, client sockets).
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// A config builder already pointed at this daemon.
    pub fn config_builder(&self) -> TestConfigBuilder {
        TestConfigBuilder::new()
            .socket_dir(self.dir())
            .client_dir(self.dir())
    }

    /// The default test config for this daemon.
    pub fn config(&self) -> ControlConfig {
        self.config_builder().build()
    }

    /// Connect a client with the default test config.
    pub async fn connect(&self) -> Connection {
        Connection::connect(&self.interface, &self.config())
            .await
            .expect("failed to connect to fake daemon")
    }

    /// Answer `command` with `reply`.
    pub fn respond(&self, command: &str, reply: impl Into<Vec<u8>>) {
        self.respond_with(command, Reply::Text(reply.into()));
    }

    /// Answer `command` as described by `reply`.
    pub fn respond_with(&self, command: &str, reply: Reply) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .insert(command.to_string(), reply);
    }

    /// Every command received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.received.lock().expect("received lock poisoned").clone()
    }

    /// Push an unsolicited `<priority>text` notification to the last client.
    pub async fn send_event(&self, priority: u8, text: &str) {
        self.send_raw(format!("<{priority}>{text}").as_bytes()).await;
    }

    /// Send raw bytes to the last client.
    pub async fn send_raw(&self, bytes: &[u8]) {
        let peer = self
            .peer
            .lock()
            .expect("peer lock poisoned")
            .clone()
            .expect("no client has talked to the fake daemon yet");
        self.socket
            .send_to(bytes, &peer)
            .await
            .expect("failed to send to client");
    }
}

impl Drop for FakeSupplicant {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lookup(script: &Script, command: &str) -> Reply {
    let script = script.lock().expect("script lock poisoned");
    let verb = command.split(' ').next().unwrap_or_default();
    if let Some(reply) = script.get(command).or_else(|| script.get(verb)) {
        return reply.clone();
    }
    let default: &[u8] = match verb {
        "PING" => b"PONG\n",
        "ATTACH" | "DETACH" => b"OK\n",
        _ => b"UNKNOWN COMMAND\n",
    };
    Reply::Text(default.to_vec())
}

async fn serve(
    socket: Arc<UnixDatagram>,
    script: Script,
    received: Arc<Mutex<Vec<String>>>,
    peer: Arc<Mutex<Option<PathBuf>>>,
) {
    let mut buf = vec![0u8; 4096];
    loop {
        let (n, addr) = match socket.recv_from(&mut buf).await {
            Ok(datagram) => datagram,
            Err(err) => {
                warn!(error = %err, "fake daemon receive failed");
                return;
            }
        };
        let command = String::from_utf8_lossy(&buf[..n]).into_owned();
        let Some(client) = addr.as_pathname().map(Path::to_path_buf) else {
            warn!(%command, "command from unnamed socket ignored");
            continue;
        };
        debug!(%command, "fake daemon received command");

        *peer.lock().expect("peer lock poisoned") = Some(client.clone());
        received
            .lock()
            .expect("received lock poisoned")
            .push(command.clone());

        match lookup(&script, &command) {
            Reply::Text(bytes) => {
                let _ = socket.send_to(&bytes, &client).await;
            }
            Reply::Delayed(delay, bytes) => {
                let socket = Arc::clone(&socket);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = socket.send_to(&bytes, &client).await;
                });
            }
            Reply::Silent => {}
        }
    }
}
