//! Outstanding request table.
//!
//! Every request on the wire has exactly one entry here until a terminal
//! response, a timeout, or a connection loss settles it.

use std::collections::HashMap;

use claw_proto::ResponseFrame;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{LinkError, LinkResult};

/// Who is waiting on a response.
#[derive(Debug)]
pub enum Waiter {
    /// An application call.
    Caller {
        /// Method name, for logs and timeout errors.
        method: String,
        /// Where the outcome goes.
        reply: oneshot::Sender<LinkResult<Value>>,
    },
    /// The connection's own handshake request.
    Handshake,
}

/// Result of routing a response frame.
#[derive(Debug)]
pub enum Settlement {
    /// No request with that id is outstanding.
    Unknown,
    /// Interim acknowledgment; the request is still pending.
    Interim,
    /// A caller received its outcome.
    Delivered,
    /// The handshake reply arrived.
    Handshake(ResponseFrame),
}

/// Map from correlation id to waiter.
#[derive(Debug, Default)]
pub struct PendingCalls {
    waiters: HashMap<String, Waiter>,
}

impl PendingCalls {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`.
    pub fn insert(&mut self, id: impl Into<String>, waiter: Waiter) {
        self.waiters.insert(id.into(), waiter);
    }

    /// Drop the entry for `id` without settling it.
    pub fn remove(&mut self, id: &str) -> Option<Waiter> {
        self.waiters.remove(id)
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Whether nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Route a response to its waiter.
    pub fn settle(&mut self, response: ResponseFrame) -> Settlement {
        if !self.waiters.contains_key(&response.id) {
            return Settlement::Unknown;
        }
        if response.ok && response.is_accepted() {
            return Settlement::Interim;
        }
        let Some(waiter) = self.waiters.remove(&response.id) else {
            return Settlement::Unknown;
        };

        match waiter {
            Waiter::Handshake => Settlement::Handshake(response),
            Waiter::Caller { method, reply } => {
                let outcome = if response.ok {
                    Ok(response.payload.unwrap_or(Value::Null))
                } else {
                    let message = response.error_message();
                    let error = response.error.unwrap_or_default();
                    Err(LinkError::Gateway {
                        code: error.code,
                        message,
                        details: error.details,
                    })
                };
                if reply.send(outcome).is_err() {
                    debug!(method = %method, "caller went away before response arrived");
                }
                Settlement::Delivered
            }
        }
    }

    /// Fail every caller with [`LinkError::ConnectionClosed`] and empty the table.
    ///
    /// Returns the number of callers rejected.
    pub fn reject_all(&mut self) -> usize {
        let mut rejected = 0;
        for (_, waiter) in self.waiters.drain() {
            if let Waiter::Caller { reply, .. } = waiter {
                let _ = reply.send(Err(LinkError::ConnectionClosed));
                rejected += 1;
            }
        }
        rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_proto::ErrorShape;
    use proptest::prelude::*;
    use serde_json::json;

    fn caller(method: &str) -> (Waiter, oneshot::Receiver<LinkResult<Value>>) {
        let (reply, rx) = oneshot::channel();
        (
            Waiter::Caller {
                method: method.to_string(),
                reply,
            },
            rx,
        )
    }

    #[test]
    fn test_success_delivers_payload() {
        let mut pending = PendingCalls::new();
        let (waiter, mut rx) = caller("sessions.list");
        pending.insert("a", waiter);

        let settled = pending.settle(ResponseFrame::success("a", json!({"sessions": []})));
        assert!(matches!(settled, Settlement::Delivered));
        assert!(pending.is_empty());
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!({"sessions": []}));
    }

    #[test]
    fn test_success_without_payload_is_null() {
        let mut pending = PendingCalls::new();
        let (waiter, mut rx) = caller("chat.abort");
        pending.insert("a", waiter);

        let mut res = ResponseFrame::success("a", Value::Null);
        res.payload = None;
        pending.settle(res);
        assert_eq!(rx.try_recv().unwrap().unwrap(), Value::Null);
    }

    #[test]
    fn test_failure_carries_code_and_message() {
        let mut pending = PendingCalls::new();
        let (waiter, mut rx) = caller("chat.send");
        pending.insert("a", waiter);

        pending.settle(ResponseFrame::failure(
            "a",
            ErrorShape::new("INVALID_REQUEST", "unknown session"),
        ));
        match rx.try_recv().unwrap() {
            Err(LinkError::Gateway { code, message, .. }) => {
                assert_eq!(code, "INVALID_REQUEST");
                assert_eq!(message, "unknown session");
            }
            other => panic!("expected gateway error, got {other:?}"),
        }
    }

    #[test]
    fn test_accepted_keeps_request_pending() {
        let mut pending = PendingCalls::new();
        let (waiter, mut rx) = caller("agent");
        pending.insert("run", waiter);

        assert!(matches!(
            pending.settle(ResponseFrame::accepted("run")),
            Settlement::Interim
        ));
        assert_eq!(pending.len(), 1);
        assert!(rx.try_recv().is_err());

        pending.settle(ResponseFrame::success("run", json!({"status": "ok"})));
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!({"status": "ok"}));
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let mut pending = PendingCalls::new();
        let (waiter, _rx) = caller("health");
        pending.insert("known", waiter);

        assert!(matches!(
            pending.settle(ResponseFrame::success("other", json!(1))),
            Settlement::Unknown
        ));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_handshake_response_is_returned() {
        let mut pending = PendingCalls::new();
        pending.insert("hs", Waiter::Handshake);

        let reply = ResponseFrame::failure("hs", ErrorShape::new("UNAUTHORIZED", "bad token"));
        match pending.settle(reply) {
            Settlement::Handshake(res) => assert!(!res.ok),
            other => panic!("expected handshake settlement, got {other:?}"),
        }
    }

    #[test]
    fn test_reject_all() {
        let mut pending = PendingCalls::new();
        let (a, mut rx_a) = caller("a");
        let (b, mut rx_b) = caller("b");
        pending.insert("1", a);
        pending.insert("2", b);
        pending.insert("hs", Waiter::Handshake);

        assert_eq!(pending.reject_all(), 2);
        assert!(pending.is_empty());
        assert!(matches!(rx_a.try_recv().unwrap(), Err(LinkError::ConnectionClosed)));
        assert!(matches!(rx_b.try_recv().unwrap(), Err(LinkError::ConnectionClosed)));
    }

    proptest! {
        #[test]
        fn responses_in_any_order_reach_their_callers(order in Just((0..16usize).collect::<Vec<_>>()).prop_shuffle()) {
            let mut pending = PendingCalls::new();
            let mut receivers = Vec::new();
            for i in 0..16usize {
                let (waiter, rx) = caller("echo");
                pending.insert(format!("req-{i}"), waiter);
                receivers.push(rx);
            }

            for i in order {
                let settled = pending.settle(ResponseFrame::success(format!("req-{i}"), json!(i)));
                prop_assert!(matches!(settled, Settlement::Delivered));
            }
            prop_assert!(pending.is_empty());

            for (i, mut rx) in receivers.into_iter().enumerate() {
                prop_assert_eq!(rx.try_recv().unwrap().unwrap(), json!(i));
            }
        }
    }
}
