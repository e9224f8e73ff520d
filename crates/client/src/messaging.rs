//! Live conversation view.
//!
//! A [`ConversationSubscription`] owns one background task that refreshes
//! a conversation's messages on a fixed interval and publishes them on a
//! `watch` channel. Stopping or dropping the subscription cancels the task
//! and any request it has in flight. [`ChatView`] keeps at most one
//! subscription alive, replacing it when another conversation is opened.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use japa_core::auth::User;
use japa_core::messaging::{Conversation, Message, NewConversation, ProfileSummary};
use japa_core::types::DbId;

use crate::api::{ApiClient, ApiError};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("No conversation is open")]
    NoConversation,

    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Api(#[from] ApiError),
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Messages of one conversation, kept fresh by a background task.
#[derive(Debug)]
pub struct ConversationSubscription {
    conversation_id: DbId,
    receiver: watch::Receiver<Vec<Message>>,
    refresh: Arc<Notify>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConversationSubscription {
    /// Spawn the refresh task. The first fetch happens immediately.
    pub fn start(api: &ApiClient, conversation_id: DbId, interval: Duration) -> Self {
        let api = api.scoped();
        let cancel = api.cancellation_token().clone();
        let (sender, receiver) = watch::channel(Vec::new());
        let refresh = Arc::new(Notify::new());

        let task = tokio::spawn(poll_messages(
            api,
            conversation_id,
            interval,
            sender,
            Arc::clone(&refresh),
        ));
        tracing::debug!(conversation_id, "Conversation subscription started");

        Self {
            conversation_id,
            receiver,
            refresh,
            cancel,
            task: Some(task),
        }
    }

    pub fn conversation_id(&self) -> DbId {
        self.conversation_id
    }

    /// The most recently published messages.
    pub fn latest(&self) -> Vec<Message> {
        self.receiver.borrow().clone()
    }

    /// Wait for the message list to change. Returns `false` once the
    /// subscription has stopped.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Fetch now instead of waiting for the next tick.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// The message list as a stream, starting with the current value.
    pub fn stream(&self) -> WatchStream<Vec<Message>> {
        WatchStream::new(self.receiver.clone())
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancel the task and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(conversation_id = self.conversation_id, error = %e, "Subscription task failed");
            }
        }
    }
}

impl Drop for ConversationSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_messages(
    api: ApiClient,
    conversation_id: DbId,
    interval: Duration,
    sender: watch::Sender<Vec<Message>>,
    refresh: Arc<Notify>,
) {
    let cancel = api.cancellation_token().clone();
    loop {
        match api.list_messages(conversation_id).await {
            Ok(messages) => {
                sender.send_if_modified(|current| {
                    if *current == messages {
                        return false;
                    }
                    *current = messages;
                    true
                });
            }
            Err(ApiError::Cancelled) => break,
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "Message refresh failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
            _ = refresh.notified() => {}
        }
    }
    tracing::debug!(conversation_id, "Conversation subscription stopped");
}

// ---------------------------------------------------------------------------
// Chat view
// ---------------------------------------------------------------------------

/// The open conversation of a chat screen.
#[derive(Debug)]
pub struct ChatView {
    api: ApiClient,
    poll_interval: Duration,
    conversation: Option<Conversation>,
    summary: Option<ProfileSummary>,
    subscription: Option<ConversationSubscription>,
}

impl ChatView {
    pub fn new(api: &ApiClient, poll_interval: Duration) -> Self {
        Self {
            api: api.scoped(),
            poll_interval,
            conversation: None,
            summary: None,
            subscription: None,
        }
    }

    /// Open a conversation, replacing whichever one was open.
    ///
    /// Agents also get the applicant's profile summary; failing to load
    /// it does not fail the open.
    pub async fn open(&mut self, conversation_id: DbId, viewer: &User) -> Result<&Conversation, ChatError> {
        if self.conversation_id() != Some(conversation_id) {
            self.close().await;
        }
        let conversation = self.api.get_conversation(conversation_id).await?;

        self.summary = None;
        if viewer.is_agent() {
            match self.api.profile_summary(conversation.user_id).await {
                Ok(summary) => self.summary = Some(summary),
                Err(e) => {
                    tracing::warn!(conversation_id, error = %e, "Failed to load profile summary");
                }
            }
        }

        if self.subscription.is_none() {
            self.subscription = Some(ConversationSubscription::start(
                &self.api,
                conversation_id,
                self.poll_interval,
            ));
        }
        Ok(self.conversation.insert(conversation))
    }

    /// Stop refreshing and forget the open conversation.
    pub async fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.stop().await;
        }
        self.conversation = None;
        self.summary = None;
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    pub fn conversation_id(&self) -> Option<DbId> {
        self.conversation.as_ref().map(|c| c.id)
    }

    pub fn profile_summary(&self) -> Option<&ProfileSummary> {
        self.summary.as_ref()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.subscription
            .as_ref()
            .map(ConversationSubscription::latest)
            .unwrap_or_default()
    }

    pub fn subscription_mut(&mut self) -> Option<&mut ConversationSubscription> {
        self.subscription.as_mut()
    }

    /// Post a message to the open conversation and refresh immediately.
    pub async fn send(&self, text: &str) -> Result<Message, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let conversation_id = self.conversation_id().ok_or(ChatError::NoConversation)?;
        let message = self.api.send_message(conversation_id, text).await?;
        if let Some(subscription) = &self.subscription {
            subscription.refresh_now();
        }
        Ok(message)
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.api.cancel();
    }
}

/// Open a conversation with an agent, optionally with a first message.
pub async fn start_conversation(
    api: &ApiClient,
    agent_id: DbId,
    initial_message: Option<&str>,
) -> Result<Conversation, ApiError> {
    let request = NewConversation {
        agent_id,
        initial_message: initial_message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
    };
    let conversation = api.start_conversation(&request).await?;
    tracing::info!(conversation_id = conversation.id, agent_id, "Conversation started");
    Ok(conversation)
}
