//! Decoding of unsolicited notifications into [`WpaEvent`]s.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::Message;
use crate::types::WpaEvent;

const CTRL_PREFIX: &str = "CTRL-";
const EVENT_PREFIX: &str = "CTRL-EVENT-";
const WRONG_KEY: &str = "reason=WRONG_KEY";
/// Token index at which `CTRL-EVENT-SSID-TEMP-DISABLED` carries its reason.
const WRONG_KEY_POSITION: usize = 5;

/// Turn an unsolicited payload into an event.
///
/// Lines that are not `CTRL-` notifications become `MESSAGE` events. For the
/// rest, the name is the first token without its `CTRL-EVENT-` prefix and
/// every later `key=value` token becomes an argument (split on the first `=`).
pub fn decode_event(priority: u8, payload: &[u8]) -> WpaEvent {
    let line = String::from_utf8_lossy(payload).into_owned();
    let mut tokens = line.split(' ');
    let first = tokens.next().unwrap_or_default();

    if !first.starts_with(CTRL_PREFIX) {
        return WpaEvent {
            name: WpaEvent::MESSAGE.to_string(),
            line,
            priority,
            arguments: BTreeMap::new(),
        };
    }

    let name = if line.split(' ').nth(WRONG_KEY_POSITION) == Some(WRONG_KEY) {
        WpaEvent::BAD_PASSPHRASE
    } else {
        first.strip_prefix(EVENT_PREFIX).unwrap_or(first)
    }
    .to_string();

    let arguments = tokens
        .filter_map(|token| token.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    WpaEvent {
        name,
        line,
        priority,
        arguments,
    }
}

/// The consumer end of a connection's event stream.
///
/// Yields events in the order the daemon sent them; returns `None` once the
/// connection has shut down.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<WpaEvent>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::Receiver<WpaEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<WpaEvent> {
        self.rx.recv().await
    }

    /// Take an already-decoded event without waiting.
    pub fn try_recv(&mut self) -> Option<WpaEvent> {
        self.rx.try_recv().ok()
    }
}

/// Background task draining the unsolicited queue onto the event stream.
pub(crate) struct EventDecoder {
    unsolicited: mpsc::Receiver<Message>,
    events: mpsc::Sender<WpaEvent>,
    cancel: CancellationToken,
}

impl EventDecoder {
    pub(crate) fn new(
        unsolicited: mpsc::Receiver<Message>,
        events: mpsc::Sender<WpaEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            unsolicited,
            events,
            cancel,
        }
    }

    /// Run until cancelled. Dropping `self` on exit closes the event stream.
    pub(crate) async fn run(mut self) {
        debug!("event decoder started");

        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                message = self.unsolicited.recv() => message,
            };

            match message {
                Some(Message::Datagram { priority, data }) => {
                    self.publish(decode_event(priority, &data));
                }
                // Read errors are routed to the command side.
                Some(Message::Error(_)) => {}
                None => break,
            }
        }

        debug!("event decoder stopped");
    }

    /// Hand `event` to the stream without waiting for the consumer.
    fn publish(&self, event: WpaEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = %event.name, "event stream full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                trace!(event = %event.name, "no event consumer, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connected_event_without_arguments() {
        let line = "CTRL-EVENT-CONNECTED - Connection to 00:11:22:33:44:55 completed";
        let event = decode_event(2, line.as_bytes());
        assert_eq!(event.name, "CONNECTED");
        assert_eq!(event.line, line);
        assert_eq!(event.priority, 2);
        assert!(event.arguments.is_empty());
    }

    #[test]
    fn test_arguments_split_on_first_equals() {
        let line = "CTRL-EVENT-DISCONNECTED bssid=00:11:22:33:44:55 reason=3 locally_generated=1 note=a=b";
        let event = decode_event(2, line.as_bytes());
        assert_eq!(event.name, "DISCONNECTED");
        assert_eq!(event.argument("bssid"), Some("00:11:22:33:44:55"));
        assert_eq!(event.argument("reason"), Some("3"));
        assert_eq!(event.argument("locally_generated"), Some("1"));
        assert_eq!(event.argument("note"), Some("a=b"));
        assert_eq!(event.arguments.len(), 4);
    }

    #[test]
    fn test_wrong_key_maps_to_bad_passphrase() {
        let line = "CTRL-EVENT-SSID-TEMP-DISABLED id=0 ssid=\"MyNetwork\" auth_failures=1 duration=10 reason=WRONG_KEY";
        let event = decode_event(3, line.as_bytes());
        assert_eq!(event.name, WpaEvent::BAD_PASSPHRASE);
        assert_eq!(event.argument("reason"), Some("WRONG_KEY"));
        assert_eq!(event.argument("duration"), Some("10"));
    }

    #[test]
    fn test_wrong_key_elsewhere_keeps_event_name() {
        let line = "CTRL-EVENT-SSID-TEMP-DISABLED reason=WRONG_KEY";
        let event = decode_event(3, line.as_bytes());
        assert_eq!(event.name, "SSID-TEMP-DISABLED");
    }

    #[test]
    fn test_non_event_lines_are_messages() {
        let line = "Trying to associate with 00:11:22:33:44:55 (SSID='MyNetwork' freq=2412 MHz)";
        let event = decode_event(2, line.as_bytes());
        assert_eq!(event.name, WpaEvent::MESSAGE);
        assert_eq!(event.line, line);
        assert!(event.arguments.is_empty());
    }

    #[test]
    fn test_ctrl_requests_keep_full_token() {
        let event = decode_event(2, b"CTRL-REQ-PASSWORD-1:Password needed for SSID MyNetwork");
        assert_eq!(event.name, "CTRL-REQ-PASSWORD-1:Password");
    }

    #[test]
    fn test_empty_payload_is_a_message() {
        let event = decode_event(1, b"");
        assert_eq!(event.name, WpaEvent::MESSAGE);
        assert_eq!(event.line, "");
    }

    #[tokio::test]
    async fn test_decoder_publishes_and_closes_stream_on_cancel() {
        let (unsolicited_tx, unsolicited_rx) = mpsc::channel(1);
        let (events_tx, events_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(EventDecoder::new(unsolicited_rx, events_tx, cancel.clone()).run());
        let mut stream = EventStream::new(events_rx);

        unsolicited_tx
            .send(Message::Datagram {
                priority: 2,
                data: b"CTRL-EVENT-SCAN-RESULTS ".to_vec(),
            })
            .await
            .unwrap();
        let event = stream.recv().await.unwrap();
        assert_eq!(event.name, "SCAN-RESULTS");

        cancel.cancel();
        task.await.unwrap();
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_decoder_drops_events_when_stream_is_full() {
        let (unsolicited_tx, unsolicited_rx) = mpsc::channel(1);
        let (events_tx, events_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(EventDecoder::new(unsolicited_rx, events_tx, cancel.clone()).run());
        let mut stream = EventStream::new(events_rx);

        for name in ["FIRST", "SECOND", "THIRD"] {
            unsolicited_tx
                .send(Message::Datagram {
                    priority: 2,
                    data: format!("CTRL-EVENT-{name} ").into_bytes(),
                })
                .await
                .unwrap();
        }

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(stream.recv().await.unwrap().name, "FIRST");
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_decoder_keeps_running_without_consumer() {
        let (unsolicited_tx, unsolicited_rx) = mpsc::channel(1);
        let (events_tx, events_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(EventDecoder::new(unsolicited_rx, events_tx, cancel.clone()).run());
        drop(events_rx);

        for _ in 0..3 {
            unsolicited_tx
                .send(Message::Datagram {
                    priority: 2,
                    data: b"CTRL-EVENT-SCAN-STARTED ".to_vec(),
                })
                .await
                .unwrap();
        }

        cancel.cancel();
        task.await.unwrap();
    }
}
