use std::sync::{Arc, Mutex};

use chainsvc::notify::{Notification, StatusNotifier};
use chainsvc::types::{Readiness, ServiceKind};

/// Notifier that keeps every call in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.seen.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().unwrap().is_empty()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    pub fn rpc_urls(&self) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::RpcUrl(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// Readiness reports for one service, oldest first.
    pub fn statuses(&self, service: ServiceKind) -> Vec<Readiness> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Status { service: s, readiness } if s == service => {
                    Some(readiness)
                }
                _ => None,
            })
            .collect()
    }

    fn push(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

impl StatusNotifier for RecordingNotifier {
    fn status(&self, service: ServiceKind, readiness: Readiness) {
        self.push(Notification::Status { service, readiness });
    }

    fn info(&self, message: &str) {
        self.push(Notification::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Notification::Error(message.to_string()));
    }

    fn chain(&self, rpc_type: &str, chain_name: &str, chain_id: u64) {
        self.push(Notification::Chain {
            rpc_type: rpc_type.to_string(),
            name: chain_name.to_string(),
            id: chain_id,
        });
    }

    fn rpc_url(&self, url: &str) {
        self.push(Notification::RpcUrl(url.to_string()));
    }
}
