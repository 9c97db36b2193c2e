//! Message channel between the native runtime and the app context
//!
//! Two independent unbounded FIFOs, one per direction. Envelopes travel
//! as opaque serialized text; ordering is guaranteed within a direction,
//! never across directions. The channel itself does no decoding: inbound
//! payloads are handed to the dispatch layer raw so that undecodable
//! input falls under its leniency policy instead of failing in transport.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::{BridgeError, Result};

/// One end of a bidirectional message channel
pub struct ChannelEndpoint {
    tx: Sender<String>,
    rx: Receiver<String>,
}

impl ChannelEndpoint {
    /// Create a connected pair of endpoints
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = unbounded();
        let (b_tx, b_rx) = unbounded();
        (Self { tx: a_tx, rx: b_rx }, Self { tx: b_tx, rx: a_rx })
    }

    /// Serialize and send one envelope
    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        self.send_raw(envelope.to_json()?)
    }

    /// Send an already-serialized payload
    pub fn send_raw(&self, payload: String) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| BridgeError::ChannelClosed)
    }

    /// Take the next buffered inbound payload, if any
    pub fn try_recv_raw(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Take and decode the next buffered inbound envelope
    ///
    /// Intended for the remote (app-context) side of the channel and for
    /// tests; the native pump consumes raw payloads instead.
    pub fn try_recv(&self) -> Option<Result<Envelope>> {
        let raw = self.try_recv_raw()?;
        Some(Envelope::from_json(&raw).map_err(BridgeError::from))
    }

    /// Cloneable handle over the outbound direction
    pub fn sender(&self) -> OutboundSender {
        OutboundSender {
            tx: self.tx.clone(),
        }
    }
}

/// Cloneable sender over one direction of the channel
///
/// This is what modules and the event router hold; they never see the
/// receiving side.
#[derive(Clone)]
pub struct OutboundSender {
    tx: Sender<String>,
}

impl OutboundSender {
    /// Serialize and send one envelope
    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        self.tx
            .send(envelope.to_json()?)
            .map_err(|_| BridgeError::ChannelClosed)
    }

    /// Send a named exec call
    pub fn call_function(
        &self,
        module: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<()> {
        self.send(&Envelope::exec(module, function, args))
    }

    /// Resolve or reject a remote callback by id
    pub fn invoke_callback(&self, id: u64, args: Vec<Value>) -> Result<()> {
        self.send(&Envelope::Invoke { id, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fifo_per_direction() {
        let (native, app) = ChannelEndpoint::pair();
        native.send(&Envelope::Flush).unwrap();
        native
            .send(&Envelope::exec("M", "f", vec![json!(1)]))
            .unwrap();

        assert!(matches!(app.try_recv(), Some(Ok(Envelope::Flush))));
        assert!(matches!(app.try_recv(), Some(Ok(Envelope::Exec { .. }))));
        assert!(app.try_recv().is_none());
    }

    #[test]
    fn test_closed_peer() {
        let (native, app) = ChannelEndpoint::pair();
        drop(app);
        assert!(matches!(
            native.send(&Envelope::Flush),
            Err(BridgeError::ChannelClosed)
        ));
    }

    #[test]
    fn test_outbound_sender_survives_endpoint() {
        let (native, app) = ChannelEndpoint::pair();
        let sender = native.sender();
        sender.invoke_callback(3, vec![json!("ok")]).unwrap();
        match app.try_recv() {
            Some(Ok(Envelope::Invoke { id, args })) => {
                assert_eq!(id, 3);
                assert_eq!(args, vec![json!("ok")]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
