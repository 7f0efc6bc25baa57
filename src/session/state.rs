use strum::Display;

/// Where a session stands.
///
/// ```text
/// Unbound -> Registering -> Active <-> Invalidated
///                 ^                        |
///                 +------------------------+
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// No token yet.
    #[default]
    Unbound,
    /// A registration request is in flight.
    Registering,
    /// Token and session key are usable.
    Active,
    /// The server rejected the session; reset or reconnect is required.
    Invalidated,
}

/// Credentials and phase shared by a session and its queued requests.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    user_token: Option<String>,
    session_key: Option<String>,
    phase: Phase,
    /// Bumped whenever a new token and key are installed.
    generation: u64,
}

impl SessionState {
    /// State recovered from persisted credentials. A stored token means the
    /// session was usable when last seen.
    pub fn restored(user_token: Option<String>, session_key: Option<String>) -> Self {
        let user_token = user_token.filter(|t| !t.is_empty());
        let session_key = session_key.filter(|k| !k.is_empty());
        let phase = if user_token.is_some() { Phase::Active } else { Phase::Unbound };

        Self { user_token, session_key, phase, generation: 0 }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn user_token(&self) -> Option<&str> {
        self.user_token.as_deref()
    }

    #[inline]
    pub fn session_key(&self) -> Option<&str> {
        self.session_key.as_deref()
    }

    /// Identifies the credentials currently installed. Responses to requests
    /// sent under an older generation must not touch this state.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn activate(&mut self, user_token: String, session_key: String) {
        self.user_token = Some(user_token);
        self.session_key = Some(session_key);
        self.phase = Phase::Active;
        self.generation += 1;
    }

    pub(crate) fn rotate(&mut self, session_key: &str) {
        self.session_key = Some(session_key.to_owned());
    }

    pub(crate) fn invalidate(&mut self) {
        self.phase = Phase::Invalidated;
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("phase", &self.phase)
            .field("has_token", &self.user_token.is_some())
            .field("has_session_key", &self.session_key.is_some())
            .finish()
    }
}
