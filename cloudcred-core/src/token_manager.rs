//! Token lifecycle for token-issuing authenticators.
//!
//! [`TokenManager`] owns the current [`Token`] of one authenticator and
//! re-issues it lazily:
//!
//! - [`poll`](TokenManager::poll) never blocks. It returns the token if it
//!   is still valid, and otherwise fires a request unless one is already in
//!   flight.
//! - [`ready`](TokenManager::ready) awaits the in-flight request and returns
//!   its outcome.
//!
//! At most one request is outstanding at a time. Requests run as spawned
//! tokio tasks, so the caller's thread is never held up. Failures are
//! logged, clear the token, and are retried on the next check. There is no
//! background refresh timer.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::token::{Token, TokenError, now_millis};

/// Observable lifecycle state of a [`TokenManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token and no request outstanding.
    Uninitialized,
    /// A token request is in flight.
    AwaitingToken,
    /// A valid token is held.
    Ready,
    /// The held token has passed its refresh deadline.
    Expired,
}

/// Something that can issue a fresh token.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    /// Human-readable name used in log messages.
    fn name(&self) -> &'static str;

    /// Perform one token request.
    async fn request_token(&self) -> Result<Token, TokenError>;
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<Token>,
    in_flight: bool,
    /// Number of finished requests, successful or not.
    completed: u64,
    last_error: Option<TokenError>,
}

impl TokenState {
    fn valid_token(&self, now: i64) -> Option<Token> {
        self.token.as_ref().filter(|t| t.is_valid_at(now)).cloned()
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<TokenState>,
    notify: Notify,
}

/// Lazily refreshed token owned by a single authenticator.
pub struct TokenManager<S: TokenSource> {
    source: Arc<S>,
    shared: Arc<Shared>,
}

impl<S: TokenSource> TokenManager<S> {
    /// Create a manager with no token. No request is sent until the first
    /// [`poll`](TokenManager::poll) or [`ready`](TokenManager::ready).
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Return the current token if it is valid, without side effects.
    pub fn current(&self) -> Option<Token> {
        self.shared.state.lock().valid_token(now_millis())
    }

    /// Whether a token request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.shared.state.lock().in_flight
    }

    /// Current lifecycle state. Has no side effects.
    pub fn status(&self) -> TokenStatus {
        let state = self.shared.state.lock();
        if state.in_flight {
            return TokenStatus::AwaitingToken;
        }
        match &state.token {
            Some(token) if token.is_valid_at(now_millis()) => TokenStatus::Ready,
            Some(_) => TokenStatus::Expired,
            None => TokenStatus::Uninitialized,
        }
    }

    /// The error of the most recent failed request, if the last request
    /// failed.
    pub fn last_error(&self) -> Option<TokenError> {
        self.shared.state.lock().last_error.clone()
    }

    /// Return the valid token, or start a request for a new one.
    ///
    /// Returns `None` while no valid token is present. Callers are expected
    /// to poll again later.
    pub fn poll(&self) -> Option<Token> {
        let mut state = self.shared.state.lock();
        if let Some(token) = state.valid_token(now_millis()) {
            return Some(token);
        }

        if !state.in_flight {
            if let Err(e) = self.start_request(&mut state) {
                tracing::warn!("Deferring {} token request: {}", self.source.name(), e);
            }
        }
        None
    }

    /// Wait for a valid token.
    ///
    /// Starts a request if needed and resolves when it completes. Returns
    /// the error of the request it waited on if that request failed.
    pub async fn ready(&self) -> Result<Token, TokenError> {
        let mut awaited: Option<u64> = None;

        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if let Some(token) = state.valid_token(now_millis()) {
                    return Ok(token);
                }

                if let Some(generation) = awaited {
                    if state.completed > generation && !state.in_flight {
                        return Err(state.last_error.clone().unwrap_or(TokenError::Transport {
                            message: "token request finished without a token".to_string(),
                        }));
                    }
                }

                if awaited.is_none() {
                    awaited = Some(state.completed);
                }

                if !state.in_flight {
                    self.start_request(&mut state)?;
                }
            }

            notified.await;
        }
    }

    fn start_request(&self, state: &mut TokenState) -> Result<(), TokenError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| TokenError::NoRuntime)?;

        state.in_flight = true;
        tracing::debug!("Requesting new {} token", self.source.name());

        let source = Arc::clone(&self.source);
        let completion = Completion {
            shared: Arc::clone(&self.shared),
            name: source.name(),
            recorded: false,
        };
        handle.spawn(async move {
            let result = source.request_token().await;
            completion.finish(result);
        });

        Ok(())
    }
}

impl<S: TokenSource> std::fmt::Debug for TokenManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TokenManager")
            .field("source", &self.source.name())
            .field("has_token", &state.token.is_some())
            .field("in_flight", &state.in_flight)
            .finish()
    }
}

/// Records the outcome of a spawned request.
///
/// The in-flight flag is cleared on drop so that a panicking or cancelled
/// request does not block future requests.
struct Completion {
    shared: Arc<Shared>,
    name: &'static str,
    recorded: bool,
}

impl Completion {
    fn finish(mut self, result: Result<Token, TokenError>) {
        self.recorded = true;
        let mut state = self.shared.state.lock();
        match result {
            Ok(token) => {
                tracing::info!("Obtained new {} token", self.name);
                state.token = Some(token);
                state.last_error = None;
            }
            Err(e) => {
                tracing::error!("Failed to obtain {} token: {}", self.name, e);
                state.token = None;
                state.last_error = Some(e);
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if !self.recorded {
                state.last_error = Some(TokenError::Transport {
                    message: format!("{} token request was aborted", self.name),
                });
            }
            state.in_flight = false;
            state.completed += 1;
        }
        self.shared.notify.notify_waiters();
    }
}
