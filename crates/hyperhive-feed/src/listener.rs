use std::sync::Arc;

use hyperhive_events::ui::{self, UiEvent};

use crate::modal::ModalSlots;
use crate::progress::ProgressBoard;
use crate::socket::{EventFeed, Subscription};

/// Attach the UI listeners to a shared feed.
///
/// Each decoded batch is classified message by message and routed: errors to
/// the error slot, notifications to the notification slot, VM progress to
/// the board. Batch order makes the modal slots last-write-wins within one
/// frame. Unclassified messages are ignored.
///
/// Dropping the returned subscription detaches the listeners (and closes the
/// connection if nothing else is subscribed).
pub fn attach_ui_listeners(
    feed: &EventFeed,
    board: Arc<ProgressBoard>,
    slots: Arc<ModalSlots>,
) -> Subscription {
    feed.subscribe(move |batch| {
        for message in batch {
            match ui::classify(message) {
                Some(UiEvent::Error(event)) => slots.show_error(&event),
                Some(UiEvent::Notification(event)) => slots.show_notification(&event),
                Some(UiEvent::VmProgress(event)) => board.apply(&event),
                None => {}
            }
        }
    })
}
