//! Per-request session handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

const SESSION_ID_LENGTH: usize = 48;
const MAX_SESSION_ID_LENGTH: usize = 128;

/// Opaque, randomly generated session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let token: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(SESSION_ID_LENGTH)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Accept a token presented by a client, rejecting anything we could not
    /// have issued.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SESSION_ID_LENGTH
            && raw.bytes().all(|b| b.is_ascii_alphanumeric());
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writes made during one request, replayed onto the stored record.
///
/// `None` marks a removed key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub cleared: bool,
    pub entries: HashMap<String, Option<Value>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.entries.is_empty()
    }

    /// Replay the changes onto `data`.
    pub fn apply_to(&self, data: &mut HashMap<String, Value>) {
        if self.cleared {
            data.clear();
        }
        for (key, value) in &self.entries {
            match value {
                Some(value) => {
                    data.insert(key.clone(), value.clone());
                }
                None => {
                    data.remove(key);
                }
            }
        }
    }
}

/// Everything the manager needs to persist a session.
#[derive(Debug)]
pub(crate) struct Pending {
    pub id: SessionId,
    pub previous_id: Option<SessionId>,
    pub is_new: bool,
    pub destroyed: bool,
    pub changes: ChangeSet,
}

#[derive(Debug)]
struct State {
    id: SessionId,
    previous_id: Option<SessionId>,
    is_new: bool,
    destroyed: bool,
    data: HashMap<String, Value>,
    changes: ChangeSet,
}

impl State {
    fn set(&mut self, key: String, value: Option<Value>) {
        match &value {
            Some(v) => {
                self.data.insert(key.clone(), v.clone());
            }
            None => {
                self.data.remove(&key);
            }
        }
        self.changes.entries.insert(key, value);
    }
}

/// The visitor's session for the current request.
///
/// Cloning is cheap and every clone sees the same data. Reads and writes
/// only touch this in-memory copy; the session layer persists the collected
/// changes once the handler is done.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<State>>,
}

impl Session {
    /// A brand new, empty session.
    pub fn new(id: SessionId) -> Self {
        Self::with_state(id, HashMap::new(), true)
    }

    pub(crate) fn from_record(id: SessionId, data: HashMap<String, Value>) -> Self {
        Self::with_state(id, data, false)
    }

    fn with_state(id: SessionId, data: HashMap<String, Value>, is_new: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                id,
                previous_id: None,
                is_new,
                destroyed: false,
                data,
                changes: ChangeSet::default(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> SessionId {
        self.state().id.clone()
    }

    /// Whether the session was created for this request.
    pub fn is_new(&self) -> bool {
        self.state().is_new
    }

    /// Whether anything was written since the session was loaded.
    pub fn is_modified(&self) -> bool {
        let state = self.state();
        !state.changes.is_empty() || state.destroyed || state.previous_id.is_some()
    }

    /// Store a value under `key`.
    ///
    /// # Errors
    ///
    /// Fails if `value` cannot be represented as JSON.
    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::Session(format!("Failed to serialize session value: {e}")))?;
        self.state().set(key.into(), Some(value));
        Ok(())
    }

    /// Store a string value. Unlike [`insert`](Self::insert) this cannot fail.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state()
            .set(key.into(), Some(Value::String(value.into())));
    }

    /// Read a value, `None` if absent or of a different shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.state().data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.state().data.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().data.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.state();
        let previous = state.data.get(key).cloned();
        if previous.is_some() {
            state.set(key.to_string(), None);
        }
        previous
    }

    /// Read and remove a value in one step.
    pub fn pop<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.remove(key)?;
        serde_json::from_value(value).ok()
    }

    /// All entries holding a string value.
    pub fn string_entries(&self) -> Vec<(String, String)> {
        self.state()
            .data
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().data.is_empty()
    }

    /// Remove every entry but keep the token.
    pub fn clear(&self) {
        let mut state = self.state();
        state.data.clear();
        state.changes = ChangeSet {
            cleared: true,
            entries: HashMap::new(),
        };
    }

    /// Move the data to a new token, invalidating the old one.
    ///
    /// Call this when the privilege level changes (e.g. on login) to prevent
    /// session fixation.
    pub fn cycle_id(&self) {
        let mut state = self.state();
        let old = std::mem::replace(&mut state.id, SessionId::generate());
        if !state.is_new && state.previous_id.is_none() {
            state.previous_id = Some(old);
        }

        // The new record starts empty, so it receives the full data set
        state.changes = ChangeSet {
            cleared: true,
            entries: state
                .data
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.clone())))
                .collect(),
        };
    }

    /// Delete the session; the cookie is expired on the way out.
    pub fn destroy(&self) {
        let mut state = self.state();
        state.data.clear();
        state.changes = ChangeSet::default();
        state.destroyed = true;
    }

    /// Hand over the collected changes; subsequent calls see none.
    pub(crate) fn take_pending(&self) -> Pending {
        let mut state = self.state();
        let pending = Pending {
            id: state.id.clone(),
            previous_id: state.previous_id.take(),
            is_new: state.is_new,
            destroyed: state.destroyed,
            changes: std::mem::take(&mut state.changes),
        };
        state.is_new = false;
        pending
    }
}
