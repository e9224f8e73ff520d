//! Domain logic for the Japa visa onboarding client.
//!
//! Holds the intake field catalog, the form/backend profile transform,
//! the onboarding wizard controllers, and the typed payloads exchanged
//! with the backend. Nothing in this crate performs network I/O; the
//! wizards reach collaborators through the traits in [`services`].

pub mod agent;
pub mod auth;
pub mod countries;
pub mod documents;
pub mod error;
pub mod fields;
pub mod form;
pub mod format;
pub mod messaging;
pub mod profile;
pub mod recommendation;
pub mod services;
pub mod snapshot;
pub mod transform;
pub mod types;
pub mod validation;
pub mod wizard;
