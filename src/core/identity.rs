//! core::identity
//!
//! Who is acting: the user name and machine recorded in lock files and
//! used as the mirror's commit author.
//!
//! The identity is read once at process start and handed to the
//! components that need it, so tests can construct any identity they like.

/// The acting user and machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub username: String,
    pub machine: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, machine: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            machine: machine.into(),
        }
    }

    /// Read the identity of the current process.
    ///
    /// Falls back to `unknown` / `unknown-machine` when the platform cannot
    /// tell.
    pub fn from_env() -> Self {
        let username = match whoami::username() {
            name if name.trim().is_empty() => "unknown".to_string(),
            name => name,
        };
        let machine = whoami::fallible::hostname()
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "unknown-machine".to_string());
        Self { username, machine }
    }

    /// Commit email used for the mirror: `user@machine`.
    pub fn email(&self) -> String {
        format!("{}@{}", self.username, self.machine)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.username, self.machine)
    }
}
