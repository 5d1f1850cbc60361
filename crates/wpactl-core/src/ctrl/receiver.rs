//! Background receive loop: reads datagrams and routes them to a queue.

use std::io;
use std::os::fd::AsRawFd;
use std::sync::Arc;

use nix::sys::socket::{MsgFlags, recv};
use tokio::io::Interest;
use tokio::net::UnixDatagram;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::Message;
use crate::codec::{self, Routing};

/// Reads the socket and hands every datagram to exactly one queue.
pub(crate) struct Receiver {
    socket: Arc<UnixDatagram>,
    solicited: mpsc::Sender<Message>,
    unsolicited: mpsc::Sender<Message>,
    cancel: CancellationToken,
}

impl Receiver {
    pub(crate) fn new(
        socket: Arc<UnixDatagram>,
        solicited: mpsc::Sender<Message>,
        unsolicited: mpsc::Sender<Message>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            socket,
            solicited,
            unsolicited,
            cancel,
        }
    }

    /// Run until cancelled or until a queue's consumer goes away.
    pub(crate) async fn run(self) {
        debug!("receive loop started");

        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                received = self.next_datagram() => received,
            };

            // Read errors most plausibly belong to the outstanding command.
            let (queue, message) = match received {
                Ok(datagram) => self.classify(datagram),
                Err(err) => {
                    warn!(error = %err, "control socket read failed");
                    (&self.solicited, Message::Error(err))
                }
            };

            if !self.forward(queue, message).await {
                break;
            }
        }

        debug!("receive loop stopped");
    }

    /// Wait for the next datagram and read it into an exactly-sized buffer.
    ///
    /// Cancel-safe: nothing is consumed from the socket until the final,
    /// synchronous read.
    async fn next_datagram(&self) -> io::Result<Vec<u8>> {
        // A pending socket error (`ECONNRESET` once the peer disconnects)
        // raises error readiness without read readiness.
        let interest = Interest::READABLE | Interest::ERROR;
        loop {
            self.socket.ready(interest).await?;

            let len = match self.socket.try_io(interest, || peek_len(&self.socket)) {
                Ok(len) => len,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                Err(err) => return Err(err),
            };

            let mut buf = vec![0; len];
            match self.socket.try_recv(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn classify(&self, datagram: Vec<u8>) -> (&mpsc::Sender<Message>, Message) {
        match codec::route(&datagram) {
            Routing::Unsolicited { priority, payload } => {
                trace!(priority, len = payload.len(), "unsolicited message");
                let data = payload.to_vec();
                (&self.unsolicited, Message::Datagram { priority, data })
            }
            Routing::Solicited(_) => {
                trace!(len = datagram.len(), "solicited message");
                let message = Message::Datagram {
                    priority: codec::DEFAULT_PRIORITY,
                    data: datagram,
                };
                (&self.solicited, message)
            }
        }
    }

    /// Hand `message` to `queue`, giving up if the connection shuts down first.
    ///
    /// Returns `false` when the loop should stop.
    async fn forward(&self, queue: &mpsc::Sender<Message>, message: Message) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = queue.send(message) => sent.is_ok(),
        }
    }
}

/// Size of the next pending datagram, without consuming it.
///
/// With `MSG_TRUNC` the kernel reports the real datagram length even though
/// the buffer is empty.
fn peek_len(socket: &UnixDatagram) -> io::Result<usize> {
    let flags = MsgFlags::MSG_PEEK | MsgFlags::MSG_TRUNC | MsgFlags::MSG_DONTWAIT;
    recv(socket.as_raw_fd(), &mut [], flags).map_err(io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        client: Arc<UnixDatagram>,
        daemon: UnixDatagram,
        solicited: mpsc::Receiver<Message>,
        unsolicited: mpsc::Receiver<Message>,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_receiver() -> Harness {
        let (client, daemon) = UnixDatagram::pair().unwrap();
        let (solicited_tx, solicited) = mpsc::channel(1);
        let (unsolicited_tx, unsolicited) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let client = Arc::new(client);
        let receiver = Receiver::new(Arc::clone(&client), solicited_tx, unsolicited_tx, cancel.clone());
        Harness {
            client,
            daemon,
            solicited,
            unsolicited,
            cancel,
            task: tokio::spawn(receiver.run()),
        }
    }

    fn datagram(message: Option<Message>) -> (u8, Vec<u8>) {
        match message {
            Some(Message::Datagram { priority, data }) => (priority, data),
            other => panic!("expected a datagram, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_routes_replies_and_events_apart() {
        let mut h = spawn_receiver();

        h.daemon.send(b"<3>CTRL-EVENT-SCAN-STARTED ").await.unwrap();
        h.daemon.send(b"OK\n").await.unwrap();

        assert_eq!(
            datagram(h.unsolicited.recv().await),
            (3, b"CTRL-EVENT-SCAN-STARTED ".to_vec())
        );
        assert_eq!(datagram(h.solicited.recv().await), (2, b"OK\n".to_vec()));

        h.cancel.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_large_datagrams_whole() {
        let mut h = spawn_receiver();

        let big = vec![b'x'; 16 * 1024];
        h.daemon.send(&big).await.unwrap();

        assert_eq!(datagram(h.solicited.recv().await), (2, big));

        h.cancel.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_preserves_order_within_a_queue() {
        let mut h = spawn_receiver();

        for n in 0..5 {
            h.daemon.send(format!("reply {n}").as_bytes()).await.unwrap();
        }
        for n in 0..5 {
            let (_, data) = datagram(h.solicited.recv().await);
            assert_eq!(data, format!("reply {n}").into_bytes());
        }

        h.cancel.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_socket_error_goes_to_solicited_queue() {
        let mut h = spawn_receiver();
        let dir = tempfile::TempDir::new().unwrap();
        let _other = UnixDatagram::bind(dir.path().join("other")).unwrap();

        // The daemon leaves our command unread and reconnects elsewhere,
        // which resets our end with ECONNRESET.
        h.client.send(b"PING").await.unwrap();
        h.daemon.connect(dir.path().join("other")).unwrap();

        let message = tokio::time::timeout(std::time::Duration::from_secs(2), h.solicited.recv())
            .await
            .expect("socket error was not forwarded");
        match message {
            Some(Message::Error(err)) => assert_eq!(err.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("expected a socket error, got {other:?}"),
        }
        assert!(h.unsolicited.try_recv().is_err());

        h.cancel.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_idle_loop() {
        let h = spawn_receiver();
        h.cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), h.task)
            .await
            .expect("receive loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_loop_blocked_on_full_queue() {
        let h = spawn_receiver();

        // Nobody drains the queue: the second reply blocks the loop.
        h.daemon.send(b"first").await.unwrap();
        h.daemon.send(b"second").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        h.cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), h.task)
            .await
            .expect("receive loop did not stop")
            .unwrap();
    }
}
