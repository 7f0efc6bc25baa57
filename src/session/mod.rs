//! # Session Client
//!
//! Owns the user token and the rotating session key for one service
//! endpoint, and routes every request through a [`RequestQueue`] so at most
//! one is ever in flight.
//!
//! ## Session Key Rotation
//!
//! Any response may carry a fresh `sessionKey`. It replaces the current key
//! and is persisted before anything else about the response is examined, and
//! request fields are filled in only when a queued request actually starts.
//! Together these guarantee that a request always carries the newest key.
//!
//! Each installed token and key pair starts a new credential generation. A
//! response to a request sent under an older generation, such as one
//! abandoned by [`Session::reconnect`], is returned to its caller but never
//! rotates or invalidates the current credentials.
//!
//! ## Invalidation and Recovery
//!
//! A response whose `error` mentions the session moves the client to
//! [`Phase::Invalidated`]. From then on requests fail locally with
//! [`Error::SessionInvalidated`] until the user either asks the operator for a
//! reset (CAPTCHA-gated, see [`Session::request_reset`]) or pastes credentials
//! obtained out of band into [`Session::reconnect`].

mod captcha;
mod state;
mod transport;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use captcha::Captcha;
pub use state::{Phase, SessionState};
pub use transport::{Command, Response, Transport};

use crate::config::{STORE_SESSION_KEY, STORE_USER_TOKEN};
use crate::error::{Error, Result};
use crate::queue::RequestQueue;
use crate::store::Store;

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The server issued a token and session key.
    Active,
    /// The server answered without credentials; recovery is required.
    Invalidated,
}

struct Inner<T, S> {
    endpoint: String,
    transport: T,
    store: S,
    state: Mutex<SessionState>,
    /// Held while a state change is written through to the store.
    persisting: tokio::sync::Mutex<()>,
}

impl<T: Transport, S: Store> Inner<T, S> {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs new credentials as a new generation and persists them.
    async fn install(&self, user_token: &str, session_key: &str) -> Result<()> {
        let _persisting = self.persisting.lock().await;
        self.state().activate(user_token.to_owned(), session_key.to_owned());

        self.store.set(STORE_USER_TOKEN, user_token).await?;
        self.store.set(STORE_SESSION_KEY, session_key).await
    }

    /// Applies rotation, then classifies any server error.
    ///
    /// `generation` is the one the request was built under; a response to
    /// superseded credentials leaves the state alone.
    async fn absorb(&self, response: &Response, generation: u64) -> Result<()> {
        let _persisting = self.persisting.lock().await;

        if self.state().generation() != generation {
            tracing::debug!(generation, "ignoring response to superseded credentials");
            return match response.error() {
                Some(error) => Err(Error::Rejected(error.to_owned())),
                None => Ok(()),
            };
        }

        if let Some(session_key) = response.session_key() {
            self.state().rotate(session_key);
            self.store.set(STORE_SESSION_KEY, session_key).await?;
            tracing::debug!("session key rotated");
        }

        match response.error() {
            Some(error) if response.is_session_error() => {
                self.state().invalidate();
                tracing::warn!(error, "session invalidated by server");
                Err(Error::SessionInvalidated(error.to_owned()))
            }
            Some(error) => Err(Error::Rejected(error.to_owned())),
            None => Ok(()),
        }
    }

    /// Builds a credentialed command from the state as it is right now,
    /// paired with the generation of the credentials it carries.
    fn credentialed(&self, build: impl FnOnce(String, String) -> Command) -> Result<(Command, u64)> {
        let state = self.state();
        if state.phase() == Phase::Invalidated {
            return Err(Error::SessionInvalidated("session must be reset or reconnected".into()));
        }

        let token = state.user_token().ok_or(Error::NotRegistered)?.to_owned();
        let session_key = state.session_key().unwrap_or_default().to_owned();

        Ok((build(token, session_key), state.generation()))
    }
}

/// A session against one service endpoint.
pub struct Session<T, S> {
    inner: Arc<Inner<T, S>>,
    queue: RequestQueue,
}

impl<T: Transport, S: Store> Session<T, S> {
    /// Restores persisted credentials from `store`.
    pub async fn restore(endpoint: impl Into<String>, transport: T, store: S) -> Result<Self> {
        let user_token = store.get(STORE_USER_TOKEN).await?;
        let session_key = store.get(STORE_SESSION_KEY).await?;
        let state = SessionState::restored(user_token, session_key);
        tracing::info!(phase = %state.phase(), "session restored");

        Ok(Self::with_state(endpoint, transport, store, state))
    }

    /// A session with explicit initial state, nothing read from the store.
    pub fn with_state(endpoint: impl Into<String>, transport: T, store: S, state: SessionState) -> Self {
        let inner = Inner { endpoint: endpoint.into(), transport, store, state: Mutex::new(state), persisting: tokio::sync::Mutex::new(()) };
        Self { inner: Arc::new(inner), queue: RequestQueue::new() }
    }

    /// Replaces the request queue, typically with one that has a timeout.
    pub fn with_queue(mut self, queue: RequestQueue) -> Self {
        self.queue = queue;
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn phase(&self) -> Phase {
        self.inner.state().phase()
    }

    /// A snapshot of the current credentials and phase.
    pub fn state(&self) -> SessionState {
        self.inner.state().clone()
    }

    /// Registers `username` and stores the issued credentials.
    ///
    /// A response without both a token and a session key is not an error: it
    /// yields [`Registration::Invalidated`] and the session enters recovery.
    /// Transport failures and timeouts restore the previous phase.
    pub async fn register(&self, username: &str) -> Result<Registration> {
        let previous = {
            let mut state = self.inner.state();
            let previous = state.phase();
            state.set_phase(Phase::Registering);
            previous
        };

        let inner = self.inner.clone();
        let command = Command::Register { user: username.to_owned() };

        let result = self
            .queue
            .enqueue(move || async move {
                let response = inner.transport.send(&inner.endpoint, &command).await?;

                let (Some(token), Some(session_key)) = (response.token(), response.session_key()) else {
                    inner.state().invalidate();
                    tracing::warn!("registration returned no credentials");
                    return Ok(Registration::Invalidated);
                };

                inner.install(token, session_key).await?;
                tracing::info!("registration succeeded");

                Ok(Registration::Active)
            })
            .await;

        if result.is_err() {
            let mut state = self.inner.state();
            if state.phase() == Phase::Registering {
                state.set_phase(previous);
            }
        }

        result
    }

    /// Reads `key`, falling back to `default` on the server side.
    pub async fn get(&self, key: &str, default: &str) -> Result<Response> {
        let (key, default) = (key.to_owned(), default.to_owned());
        self.request(move |token, session_key| Command::Get { token, session_key, key, default }).await
    }

    /// Writes `value` under `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<Response> {
        let (key, value) = (key.to_owned(), value.to_owned());
        self.request(move |token, session_key| Command::Set { token, session_key, key, value }).await
    }

    async fn request<B>(&self, build: B) -> Result<Response>
    where
        B: FnOnce(String, String) -> Command + Send + 'static,
    {
        let inner = self.inner.clone();

        self.queue
            .enqueue(move || async move {
                let (command, generation) = inner.credentialed(build)?;
                tracing::debug!(command = command.name(), key = command.key(), generation, "sending request");

                let response = inner.transport.send(&inner.endpoint, &command).await?;
                inner.absorb(&response, generation).await?;

                Ok(response)
            })
            .await
    }

    /// Asks the operator to reset the session for `mail`.
    ///
    /// Nothing is sent unless `answer` solves `captcha`. The phase does not
    /// change: the reset takes effect out of band and the user comes back
    /// through [`Session::reconnect`].
    pub async fn request_reset(&self, mail: &str, captcha: &Captcha, answer: &str) -> Result<Response> {
        if !captcha.matches(answer) {
            return Err(Error::CaptchaMismatch);
        }

        let inner = self.inner.clone();
        let command = Command::ResetSession { mail: mail.to_owned() };

        self.queue
            .enqueue(move || async move {
                let response = inner.transport.send(&inner.endpoint, &command).await?;
                if let Some(error) = response.error() {
                    return Err(Error::Rejected(error.to_owned()));
                }

                tracing::info!("session reset requested");
                Ok(response)
            })
            .await
    }

    /// Installs credentials obtained out of band and reactivates the session.
    ///
    /// Both values are trimmed and must be non-empty. Requests stuck behind a
    /// hung request are abandoned so recovery never waits on them; whatever
    /// they eventually receive is ignored.
    pub async fn reconnect(&self, user_token: &str, session_key: &str) -> Result<()> {
        let (user_token, session_key) = (user_token.trim().to_owned(), session_key.trim().to_owned());
        if user_token.is_empty() || session_key.is_empty() {
            return Err(Error::MissingCredentials);
        }

        self.queue.reset();
        let inner = self.inner.clone();

        self.queue
            .enqueue(move || async move {
                inner.install(&user_token, &session_key).await?;
                tracing::info!("session reconnected");
                Ok(())
            })
            .await
    }
}
