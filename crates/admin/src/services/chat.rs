//! Admin-to-customer chat synchronization.
//!
//! A [`MessageSynchronizer`] tracks one selected counterpart at a time:
//!
//! ```text
//! Idle --select--> Loading --history ok--> Live
//!                     |                      |
//!                     +--history failed--> Idle <--clear/select--+
//! ```
//!
//! The change subscription is opened before the history query so that
//! messages inserted in between are not lost; events already present in the
//! history are dropped by id. Leaving `Live` for any reason releases the
//! subscription.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use star_admin_core::{Message, MessageId, NewMessage, UserId};

use crate::data::{DataError, DataService};
use crate::subscription::Subscription;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Error fetching messages: {0}")]
    History(DataError),

    #[error("Could not subscribe to messages: {0}")]
    Subscribe(DataError),

    #[error("Error sending message: {0}")]
    Send(DataError),

    #[error("Message cannot be empty.")]
    EmptyMessage,

    #[error("Select a conversation before sending a message.")]
    NoConversationSelected,
}

/// Realtime channel name for a counterpart's conversation.
#[must_use]
pub fn channel_name(counterpart: UserId) -> String {
    format!("messages-{counterpart}")
}

/// Send a message from `admin` to `counterpart`.
///
/// The message is not echoed locally; it shows up when the change
/// subscription delivers it.
///
/// # Errors
///
/// Returns `ChatError::EmptyMessage` without a remote call for blank input,
/// or `ChatError::Send` if the insert fails.
#[instrument(skip(data, input))]
pub async fn send_message(
    data: &dyn DataService,
    admin: UserId,
    counterpart: UserId,
    input: &str,
) -> Result<(), ChatError> {
    let content = input.trim();
    if content.is_empty() {
        return Err(ChatError::EmptyMessage);
    }

    data.insert_message(&NewMessage {
        content: content.to_string(),
        sender_id: admin,
        receiver_id: counterpart,
    })
    .await
    .map_err(ChatError::Send)
}

struct LiveConversation {
    counterpart: UserId,
    messages: Vec<Message>,
    seen: HashSet<MessageId>,
    subscription: Subscription<Message>,
}

enum SyncState {
    Idle,
    /// Subscribed, history not yet loaded.
    Loading {
        counterpart: UserId,
        subscription: Subscription<Message>,
    },
    Live(LiveConversation),
}

/// Message list for the selected counterpart, kept current from the change
/// feed.
pub struct MessageSynchronizer {
    data: Arc<dyn DataService>,
    admin: UserId,
    state: SyncState,
}

impl MessageSynchronizer {
    #[must_use]
    pub fn new(data: Arc<dyn DataService>, admin: UserId) -> Self {
        Self {
            data,
            admin,
            state: SyncState::Idle,
        }
    }

    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self.state, SyncState::Live(_))
    }

    /// The selected counterpart, while loading or live.
    #[must_use]
    pub const fn counterpart(&self) -> Option<UserId> {
        match &self.state {
            SyncState::Idle => None,
            SyncState::Loading { counterpart, .. } => Some(*counterpart),
            SyncState::Live(live) => Some(live.counterpart),
        }
    }

    /// The conversation so far: history ascending, then live arrivals in
    /// arrival order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        match &self.state {
            SyncState::Live(live) => &live.messages,
            _ => &[],
        }
    }

    /// Switch to `counterpart`: release any current subscription, subscribe,
    /// then load the history.
    ///
    /// If the returned future is dropped while the history is loading, the
    /// synchronizer stays `Loading` and still owns the new subscription;
    /// the next `select`, `clear` or drop releases it.
    ///
    /// # Errors
    ///
    /// Returns `ChatError` if subscribing or the history query fails; the
    /// synchronizer is left `Idle` with no subscription.
    #[instrument(skip(self))]
    pub async fn select(&mut self, counterpart: UserId) -> Result<&[Message], ChatError> {
        self.clear();

        let subscription = self
            .data
            .subscribe_message_inserts(&channel_name(counterpart))
            .await
            .map_err(ChatError::Subscribe)?;
        self.state = SyncState::Loading {
            counterpart,
            subscription,
        };

        let history = match self.data.conversation_messages(self.admin, counterpart).await {
            Ok(history) => history,
            Err(e) => {
                self.clear();
                warn!(error = %e, "History load failed, back to idle");
                return Err(ChatError::History(e));
            }
        };

        let SyncState::Loading { subscription, .. } =
            std::mem::replace(&mut self.state, SyncState::Idle)
        else {
            return Ok(&[]);
        };

        let seen = history.iter().map(|m| m.id).collect();
        let mut live = LiveConversation {
            counterpart,
            messages: history,
            seen,
            subscription,
        };

        // Events that arrived while the history was loading.
        while let Some(event) = live.subscription.try_recv() {
            accept(self.admin, &mut live, event);
        }

        info!(count = live.messages.len(), "Conversation live");
        self.state = SyncState::Live(live);
        Ok(self.messages())
    }

    /// Release the subscription and return to `Idle`.
    pub fn clear(&mut self) {
        match std::mem::replace(&mut self.state, SyncState::Idle) {
            SyncState::Idle => {}
            SyncState::Loading { subscription, .. } => subscription.release(),
            SyncState::Live(live) => live.subscription.release(),
        }
    }

    /// Wait for the next message accepted into the conversation.
    ///
    /// Returns `None` when not live or once the change feed has closed.
    /// Cancel-safe: nothing is lost if the future is dropped before it
    /// completes.
    pub async fn next_message(&mut self) -> Option<Message> {
        let admin = self.admin;
        let SyncState::Live(live) = &mut self.state else {
            return None;
        };

        loop {
            let event = live.subscription.recv().await?;
            if let Some(message) = accept(admin, live, event) {
                return Some(message.clone());
            }
        }
    }

    /// Offer an event to the conversation. Returns whether it was appended.
    pub fn apply_event(&mut self, event: Message) -> bool {
        let admin = self.admin;
        match &mut self.state {
            SyncState::Live(live) => accept(admin, live, event).is_some(),
            _ => false,
        }
    }

    /// Send a message to the selected counterpart.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NoConversationSelected` unless live, otherwise as
    /// [`send_message`].
    pub async fn send(&self, input: &str) -> Result<(), ChatError> {
        let SyncState::Live(live) = &self.state else {
            return Err(ChatError::NoConversationSelected);
        };
        send_message(self.data.as_ref(), self.admin, live.counterpart, input).await
    }
}

/// Append `event` if it belongs to the conversation and is new.
fn accept(admin: UserId, live: &mut LiveConversation, event: Message) -> Option<&Message> {
    if !event.is_between(admin, live.counterpart) || !live.seen.insert(event.id) {
        return None;
    }
    live.messages.push(event);
    live.messages.last()
}
