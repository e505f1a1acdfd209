// src/notify/channel.rs

use tokio::sync::mpsc;
use tracing::trace;

use crate::notify::{Notification, StatusNotifier};
use crate::types::{Readiness, ServiceKind};

/// Notifier that forwards every call over an unbounded channel.
///
/// A closed receiver is not an error; the notification is just dropped.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    /// Convenience: a notifier plus the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            trace!("notification receiver gone; dropping notification");
        }
    }
}

impl StatusNotifier for ChannelNotifier {
    fn status(&self, service: ServiceKind, readiness: Readiness) {
        self.send(Notification::Status { service, readiness });
    }

    fn info(&self, message: &str) {
        self.send(Notification::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.send(Notification::Error(message.to_string()));
    }

    fn chain(&self, rpc_type: &str, chain_name: &str, chain_id: u64) {
        self.send(Notification::Chain {
            rpc_type: rpc_type.to_string(),
            name: chain_name.to_string(),
            id: chain_id,
        });
    }

    fn rpc_url(&self, url: &str) {
        self.send(Notification::RpcUrl(url.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_arrive_in_order() {
        let (notifier, mut rx) = ChannelNotifier::channel();

        notifier.status(ServiceKind::Rpc, Readiness::Ready);
        notifier.chain("remote", "mainnet", 61);
        notifier.rpc_url("http://localhost:8545");

        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::Status {
                service: ServiceKind::Rpc,
                readiness: Readiness::Ready
            }
        );
        assert_eq!(
            rx.try_recv().unwrap().to_string(),
            "chain remote mainnet 61"
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::RpcUrl("http://localhost:8545".into())
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.error("nobody is listening");
    }
}
