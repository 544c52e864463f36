use std::time::Instant;

use parking_lot::RwLock;

use hyperhive_events::ui::{ErrorEvent, NotificationEvent};

/// Content of one blocking modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modal {
    pub title: String,
    pub body: String,
    pub received_at: Instant,
}

/// The two independent blocking-UI slots: one for backend errors, one for
/// notifications. Each holds at most one item; a newer event of the same
/// category replaces the current content, and only explicit dismissal clears
/// a slot. The categories never touch each other's slot.
#[derive(Debug, Default)]
pub struct ModalSlots {
    error: RwLock<Option<Modal>>,
    notification: RwLock<Option<Modal>>,
}

impl ModalSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_error(&self, event: &ErrorEvent) {
        *self.error.write() = Some(Modal {
            title: "Error".to_string(),
            body: event.message.clone(),
            received_at: Instant::now(),
        });
    }

    pub fn show_notification(&self, event: &NotificationEvent) {
        *self.notification.write() = Some(Modal {
            title: event.title.clone(),
            body: event.body.clone(),
            received_at: Instant::now(),
        });
    }

    pub fn error(&self) -> Option<Modal> {
        self.error.read().clone()
    }

    pub fn notification(&self) -> Option<Modal> {
        self.notification.read().clone()
    }

    pub fn dismiss_error(&self) {
        *self.error.write() = None;
    }

    pub fn dismiss_notification(&self) {
        *self.notification.write() = None;
    }
}
