//! Session state persisted as JSON under the config directory.
//!
//! The session file records the database location and which user is
//! currently logged in. It is loaded once at startup into an explicit
//! [`Session`] value that handlers receive as an argument; nothing
//! mutates it behind the scenes, and writes happen only through
//! [`Session::set_user`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in session file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not logged in; run `feedrake login <name>` or `feedrake register <name>` first")]
    NotLoggedIn,
}

/// On-disk shape. All fields optional so a hand-edited partial file loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SessionFile {
    db_path: Option<String>,
    current_user_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
    state: SessionFile,
}

impl Session {
    /// Load the session from `path`. A missing file yields an empty
    /// session; malformed JSON is an error.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Self {
                path: path.to_path_buf(),
                state: serde_json::from_str(&contents)?,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no session file, starting fresh");
                Ok(Self {
                    path: path.to_path_buf(),
                    state: SessionFile::default(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Database location: configured path, or `feedrake.db` next to the
    /// session file.
    pub fn db_path(&self) -> PathBuf {
        match &self.state.db_path {
            Some(p) => PathBuf::from(p),
            None => self.path.with_file_name("feedrake.db"),
        }
    }

    /// The logged-in user's name, or `NotLoggedIn`.
    pub fn current_user(&self) -> Result<&str, SessionError> {
        self.state
            .current_user_name
            .as_deref()
            .ok_or(SessionError::NotLoggedIn)
    }

    /// The logged-in user's name, if any. For display paths that should
    /// not fail on a logged-out session.
    pub fn user_name(&self) -> Option<&str> {
        self.state.current_user_name.as_deref()
    }

    /// Set (or clear) the current user and write the session file.
    pub fn set_user(&mut self, name: Option<&str>) -> Result<(), SessionError> {
        self.state.current_user_name = name.map(str::to_owned);
        self.save()
    }

    fn save(&self) -> Result<(), SessionError> {
        let contents = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let unique = format!(
            "feedrake-session-{}-{}.json",
            name,
            std::process::id()
        );
        std::env::temp_dir().join(unique)
    }

    #[test]
    fn missing_file_loads_empty_session() {
        let path = scratch_path("missing");
        let session = Session::load(&path).unwrap();
        assert!(session.user_name().is_none());
        assert!(matches!(
            session.current_user(),
            Err(SessionError::NotLoggedIn)
        ));
    }

    #[test]
    fn set_user_round_trips_through_disk() {
        let path = scratch_path("roundtrip");
        let mut session = Session::load(&path).unwrap();
        session.set_user(Some("ada")).unwrap();

        let reloaded = Session::load(&path).unwrap();
        assert_eq!(reloaded.current_user().unwrap(), "ada");

        let mut reloaded = reloaded;
        reloaded.set_user(None).unwrap();
        let cleared = Session::load(&path).unwrap();
        assert!(cleared.user_name().is_none());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_json_is_an_error() {
        let path = scratch_path("malformed");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Session::load(&path),
            Err(SessionError::Json(_))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn db_path_defaults_next_to_session_file() {
        let path = scratch_path("dbpath");
        let session = Session::load(&path).unwrap();
        assert_eq!(
            session.db_path(),
            path.with_file_name("feedrake.db")
        );
    }
}
