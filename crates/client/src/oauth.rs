//! Google sign-in via the implicit `id_token` flow.
//!
//! [`begin`] builds the authorization URL together with a random `state`
//! and `nonce`. The browser is sent there; the provider redirects back
//! with the token in the URL fragment. [`PendingOAuth::complete`] checks
//! the returned `state` and the five-minute deadline before handing the
//! token over.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Url;

pub const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// How long a sign-in attempt stays valid.
pub const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(300);

const STATE_LEN: usize = 26;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OAuthError {
    #[error("Google Client ID not configured. Please set JAPA_GOOGLE_CLIENT_ID.")]
    MissingClientId,

    #[error("Invalid redirect URI: {0}")]
    InvalidRedirect(String),

    #[error("Sign-in state did not match; the response may not be for this request")]
    StateMismatch,

    #[error("Google sign-in timed out or was cancelled. Please try again.")]
    Expired,

    #[error("{0}")]
    Provider(String),

    #[error("Invalid response from Google")]
    InvalidResponse,
}

/// What the provider sent back to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthCallback {
    Token { id_token: String, state: String },
    Error(String),
}

impl OAuthCallback {
    /// Read the callback from a full redirect URL. Parameters are looked
    /// up in the fragment first, then in the query string.
    pub fn from_redirect_url(raw: &str) -> Result<Self, OAuthError> {
        let url = Url::parse(raw).map_err(|_| OAuthError::InvalidResponse)?;
        let fragment: Vec<(String, String)> = url
            .fragment()
            .map(|f| {
                let mut scratch = url.clone();
                scratch.set_query(Some(f));
                scratch.query_pairs().into_owned().collect()
            })
            .unwrap_or_default();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        let param = |name: &str| {
            fragment
                .iter()
                .chain(query.iter())
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };

        if let Some(error) = param("error") {
            return Ok(Self::Error(error));
        }
        match (param("id_token"), param("state")) {
            (Some(id_token), Some(state)) => Ok(Self::Token { id_token, state }),
            _ => Err(OAuthError::InvalidResponse),
        }
    }
}

/// A sign-in attempt waiting for its callback.
#[derive(Debug, Clone)]
pub struct PendingOAuth {
    pub state: String,
    pub nonce: String,
    pub authorization_url: String,
    pub started_at: DateTime<Utc>,
}

fn random_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// Start a sign-in attempt.
///
/// Fails with [`OAuthError::MissingClientId`] before anything else when no
/// client id is configured.
pub fn begin(client_id: Option<&str>, redirect_uri: &str) -> Result<PendingOAuth, OAuthError> {
    let client_id = client_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(OAuthError::MissingClientId)?;
    Url::parse(redirect_uri).map_err(|e| OAuthError::InvalidRedirect(e.to_string()))?;

    let state = random_token();
    let nonce = random_token();
    let authorization_url = Url::parse_with_params(
        AUTHORIZATION_ENDPOINT,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "id_token"),
            ("scope", "openid email profile"),
            ("state", state.as_str()),
            ("nonce", nonce.as_str()),
            ("prompt", "select_account"),
        ],
    )
    .map_err(|_| OAuthError::InvalidResponse)?
    .to_string();

    Ok(PendingOAuth {
        state,
        nonce,
        authorization_url,
        started_at: Utc::now(),
    })
}

impl PendingOAuth {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.started_at)
            .to_std()
            .is_ok_and(|elapsed| elapsed > SIGN_IN_TIMEOUT)
    }

    /// Accept the callback and return the identity token.
    pub fn complete(&self, callback: OAuthCallback, now: DateTime<Utc>) -> Result<String, OAuthError> {
        if self.is_expired(now) {
            return Err(OAuthError::Expired);
        }
        match callback {
            OAuthCallback::Error(message) => Err(OAuthError::Provider(message)),
            OAuthCallback::Token { state, .. } if state != self.state => {
                tracing::warn!("OAuth callback state mismatch");
                Err(OAuthError::StateMismatch)
            }
            OAuthCallback::Token { id_token, .. } => Ok(id_token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const REDIRECT: &str = "http://localhost:5173/auth/google/callback";

    #[test]
    fn missing_client_id_fails_first() {
        assert_eq!(begin(None, REDIRECT).unwrap_err(), OAuthError::MissingClientId);
        assert_eq!(begin(Some("  "), "not a url").unwrap_err(), OAuthError::MissingClientId);
    }

    #[test]
    fn authorization_url_carries_state_and_nonce() {
        let pending = begin(Some("abc.apps.googleusercontent.com"), REDIRECT).unwrap();
        assert_eq!(pending.state.len(), STATE_LEN);
        assert_ne!(pending.state, pending.nonce);

        let url = Url::parse(&pending.authorization_url).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".into(), pending.state.clone())));
        assert!(pairs.contains(&("response_type".into(), "id_token".into())));
        assert!(pairs.contains(&("redirect_uri".into(), REDIRECT.into())));
    }

    #[test]
    fn callback_reads_fragment_then_query() {
        let callback =
            OAuthCallback::from_redirect_url(&format!("{REDIRECT}#id_token=tok&state=s1")).unwrap();
        assert_eq!(
            callback,
            OAuthCallback::Token {
                id_token: "tok".into(),
                state: "s1".into()
            }
        );
        let callback =
            OAuthCallback::from_redirect_url(&format!("{REDIRECT}?error=access_denied")).unwrap();
        assert_eq!(callback, OAuthCallback::Error("access_denied".into()));
        assert_matches!(
            OAuthCallback::from_redirect_url(REDIRECT),
            Err(OAuthError::InvalidResponse)
        );
    }

    #[test]
    fn complete_checks_state_and_deadline() {
        let pending = begin(Some("client"), REDIRECT).unwrap();
        let now = pending.started_at;
        let good = OAuthCallback::Token {
            id_token: "tok".into(),
            state: pending.state.clone(),
        };
        let forged = OAuthCallback::Token {
            id_token: "tok".into(),
            state: "other".into(),
        };

        assert_eq!(pending.complete(good.clone(), now).unwrap(), "tok");
        assert_eq!(pending.complete(forged, now), Err(OAuthError::StateMismatch));

        let late = now + chrono::Duration::seconds(301);
        assert_eq!(pending.complete(good, late), Err(OAuthError::Expired));
    }
}
