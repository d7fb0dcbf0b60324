//! Per-session client identity.
//!
//! A browser keeps the client id and the last used name/avatar in session
//! storage so a reload rejoins as the same player. [`SessionStore`] is that
//! storage: [`MemorySessionStore`] lives as long as the process, and
//! [`FileSessionStore`] survives restarts by writing a small JSON file.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::ClientId;

/// Storage key of the client id.
pub const CLIENT_ID_KEY: &str = "clientId";
/// Storage key of the last display name.
pub const LAST_NAME_KEY: &str = "lastPlayerName";
/// Storage key of the last avatar reference.
pub const LAST_AVATAR_KEY: &str = "lastPlayerAvatar";

/// Display name used when neither the caller nor the store provides one.
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// Session-scoped key/value storage.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Process-lifetime store.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    values: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a JSON object on disk, rewritten on every `set`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSessionStore {
    /// Open the store at `path`. A missing file starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "session store not found, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        let text = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Who the local player is for this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: ClientId,
    pub display_name: String,
    pub avatar: String,
}

impl ClientIdentity {
    pub fn new(
        client_id: ClientId,
        display_name: impl Into<String>,
        avatar: impl Into<String>,
    ) -> Self {
        Self {
            client_id,
            display_name: display_name.into(),
            avatar: avatar.into(),
        }
    }
}

/// Load the session identity, creating and persisting a client id on first use.
///
/// A non-empty `name`/`avatar` wins and is remembered; otherwise the last
/// remembered value is used, then the defaults (`"Anonymous"`, no avatar).
///
/// # Errors
///
/// Returns an error if the store cannot persist a value.
pub fn load_or_create(
    store: &mut impl SessionStore,
    name: Option<&str>,
    avatar: Option<&str>,
) -> Result<ClientIdentity> {
    let client_id = match store.get(CLIENT_ID_KEY).filter(|id| !id.is_empty()) {
        Some(id) => ClientId::new(id),
        None => {
            let id = ClientId::generate();
            store.set(CLIENT_ID_KEY, id.as_str())?;
            info!(client_id = %id, "created session client id");
            id
        }
    };

    let display_name = remember(store, LAST_NAME_KEY, name)?
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());
    let avatar = remember(store, LAST_AVATAR_KEY, avatar)?.unwrap_or_default();

    Ok(ClientIdentity {
        client_id,
        display_name,
        avatar,
    })
}

fn remember(
    store: &mut impl SessionStore,
    key: &str,
    supplied: Option<&str>,
) -> Result<Option<String>> {
    match supplied.filter(|v| !v.is_empty()) {
        Some(value) => {
            store.set(key, value)?;
            Ok(Some(value.to_string()))
        }
        None => Ok(store.get(key).filter(|v| !v.is_empty())),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn first_load_generates_and_persists_id() {
        let mut store = MemorySessionStore::new();
        let identity = load_or_create(&mut store, Some("Ann"), Some("a.svg")).unwrap();
        assert_eq!(store.get(CLIENT_ID_KEY).unwrap(), identity.client_id.as_str());
        assert_eq!(identity.display_name, "Ann");
        assert_eq!(identity.avatar, "a.svg");
    }

    #[test]
    fn reload_keeps_id_and_last_name() {
        let mut store = MemorySessionStore::new();
        let first = load_or_create(&mut store, Some("Ann"), Some("a.svg")).unwrap();
        let second = load_or_create(&mut store, None, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn new_name_replaces_remembered_one() {
        let mut store = MemorySessionStore::new();
        let first = load_or_create(&mut store, Some("Ann"), None).unwrap();
        let second = load_or_create(&mut store, Some("Annie"), Some("")).unwrap();
        assert_eq!(first.client_id, second.client_id);
        assert_eq!(second.display_name, "Annie");
        assert_eq!(store.get(LAST_NAME_KEY).as_deref(), Some("Annie"));
    }

    #[test]
    fn defaults_when_nothing_known() {
        let mut store = MemorySessionStore::new();
        let identity = load_or_create(&mut store, None, None).unwrap();
        assert_eq!(identity.display_name, DEFAULT_DISPLAY_NAME);
        assert_eq!(identity.avatar, "");
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = std::env::temp_dir().join(format!("pot-room-{}.json", ClientId::generate()));
        let first = {
            let mut store = FileSessionStore::open(&path).unwrap();
            load_or_create(&mut store, Some("Bob"), Some("b.svg")).unwrap()
        };
        let mut reopened = FileSessionStore::open(&path).unwrap();
        let second = load_or_create(&mut reopened, None, None).unwrap();
        assert_eq!(first, second);
        std::fs::remove_file(reopened.path()).unwrap();
    }

    #[test]
    fn file_store_rejects_garbage() {
        let path = std::env::temp_dir().join(format!("pot-room-{}.json", ClientId::generate()));
        std::fs::write(&path, "not json").unwrap();
        assert!(FileSessionStore::open(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
