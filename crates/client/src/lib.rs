//! Network side of the Japa onboarding client.
//!
//! REST access to the backend, the explicitly passed auth session,
//! Google sign-in, document storage, live conversations, the assistant
//! chat, and file-backed persistence.

pub mod api;
pub mod assistant;
pub mod config;
pub mod documents;
pub mod messaging;
pub mod oauth;
pub mod persist;
pub mod session;
pub mod storage;
