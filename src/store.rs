//! Durable per-user data kept as whole-file JSON snapshots.
//!
//! Every mutation rewrites the file. A missing or blank file reads as empty.
//! Each store serialises its read-modify-write cycles behind a mutex so
//! concurrent handlers for different users don't lose each other's updates.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{de::DeserializeOwned, Serialize};
use teloxide::types::UserId;

pub const DEFAULT_TOPIC: &str = "C++";
pub const TOPIC_MIN_CHARS: usize = 2;
pub const TOPIC_MAX_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} does not contain valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("store lock was poisoned")]
    Poisoned,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("topic should be between {min}-{max} characters, got {0}", min = TOPIC_MIN_CHARS, max = TOPIC_MAX_CHARS)]
pub struct TopicError(pub usize);

#[derive(Debug, thiserror::Error)]
pub enum SetTopicError {
    #[error(transparent)]
    Invalid(#[from] TopicError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Trims `raw` and checks it fits the allowed topic length.
pub fn validate_topic(raw: &str) -> Result<&str, TopicError> {
    let topic = raw.trim();
    let len = topic.chars().count();
    if (TOPIC_MIN_CHARS..=TOPIC_MAX_CHARS).contains(&len) {
        Ok(topic)
    } else {
        Err(TopicError(len))
    }
}

struct JsonFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFile {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load<T: DeserializeOwned + Default>(&self) -> Result<T, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => return Err(self.io_error(source)),
        };
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn save<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        // Write next to the target and rename so readers never see a torn file.
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, json).map_err(|source| self.io_error(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            self.io_error(source)
        })
    }

    fn read<T: DeserializeOwned + Default>(&self) -> Result<T, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.load()
    }

    /// Loads, applies `f`, and writes back only when `f` reports a change.
    fn update<T, R>(&self, f: impl FnOnce(&mut T) -> (bool, R)) -> Result<R, StoreError>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut value = self.load()?;
        let (changed, result) = f(&mut value);
        if changed {
            self.save(&value)?;
        }
        Ok(result)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// User id -> topic, stored as `{"<id>": "<topic>"}`.
pub struct TopicStore {
    file: JsonFile,
}

impl TopicStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    /// The user's topic, or [`DEFAULT_TOPIC`] if they never set one.
    pub fn get(&self, user: UserId) -> Result<String, StoreError> {
        let topics: HashMap<String, String> = self.file.read()?;
        Ok(topics
            .get(&user.0.to_string())
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string()))
    }

    /// Validates and stores the topic, returning the stored (trimmed) text.
    /// An out-of-range topic leaves the file untouched.
    pub fn set(&self, user: UserId, raw: &str) -> Result<String, SetTopicError> {
        let topic = validate_topic(raw)?.to_string();
        self.file
            .update(|topics: &mut HashMap<String, String>| {
                topics.insert(user.0.to_string(), topic.clone());
                (true, ())
            })?;
        Ok(topic)
    }
}

/// Set of users receiving the daily quiz, stored as a JSON list of ids.
pub struct SubscriberStore {
    file: JsonFile,
}

impl SubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub fn list(&self) -> Result<Vec<UserId>, StoreError> {
        let ids: Vec<u64> = self.file.read()?;
        Ok(ids.into_iter().map(UserId).collect())
    }

    /// Returns `false` if the user was already subscribed.
    pub fn add(&self, user: UserId) -> Result<bool, StoreError> {
        self.file.update(|ids: &mut Vec<u64>| {
            if ids.contains(&user.0) {
                (false, false)
            } else {
                ids.push(user.0);
                (true, true)
            }
        })
    }

    /// Returns `false` if the user wasn't subscribed.
    pub fn remove(&self, user: UserId) -> Result<bool, StoreError> {
        self.remove_all(&[user]).map(|removed| removed > 0)
    }

    /// Drops every listed user in a single rewrite and returns how many were present.
    pub fn remove_all(&self, users: &[UserId]) -> Result<usize, StoreError> {
        self.file.update(|ids: &mut Vec<u64>| {
            let before = ids.len();
            ids.retain(|id| !users.contains(&UserId(*id)));
            let removed = before - ids.len();
            (removed > 0, removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_store(dir: &tempfile::TempDir) -> TopicStore {
        TopicStore::new(dir.path().join("topics.json"))
    }

    #[test]
    fn unset_topic_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = topic_store(&dir);
        assert_eq!(store.get(UserId(1)).unwrap(), DEFAULT_TOPIC);
    }

    #[test]
    fn topics_within_bounds_are_stored_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = topic_store(&dir);
        let longest = "x".repeat(TOPIC_MAX_CHARS);

        for topic in ["Go", "Data Structures", "Квантова фізика", longest.as_str()] {
            assert_eq!(store.set(UserId(7), topic).unwrap(), topic);
            assert_eq!(store.get(UserId(7)).unwrap(), topic);
        }
    }

    #[test]
    fn out_of_range_topic_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = topic_store(&dir);

        assert!(matches!(
            store.set(UserId(3), "x"),
            Err(SetTopicError::Invalid(TopicError(1)))
        ));
        assert_eq!(store.get(UserId(3)).unwrap(), DEFAULT_TOPIC);
        assert!(!dir.path().join("topics.json").exists());

        store.set(UserId(3), "Rust").unwrap();
        let too_long = "y".repeat(TOPIC_MAX_CHARS + 1);
        assert!(matches!(
            store.set(UserId(3), &too_long),
            Err(SetTopicError::Invalid(TopicError(n))) if n == TOPIC_MAX_CHARS + 1
        ));
        assert!(matches!(
            store.set(UserId(3), "   "),
            Err(SetTopicError::Invalid(TopicError(0)))
        ));
        assert_eq!(store.get(UserId(3)).unwrap(), "Rust");
    }

    #[test]
    fn topics_of_different_users_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = topic_store(&dir);
        store.set(UserId(1), "Python").unwrap();
        store.set(UserId(2), "Haskell").unwrap();

        let reopened = topic_store(&dir);
        assert_eq!(reopened.get(UserId(1)).unwrap(), "Python");
        assert_eq!(reopened.get(UserId(2)).unwrap(), "Haskell");
    }

    #[test]
    fn unreadable_topic_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topics.json");
        fs::create_dir(&path).unwrap();

        assert!(matches!(
            TopicStore::new(&path).set(UserId(1), "Rust"),
            Err(SetTopicError::Store(StoreError::Io { .. }))
        ));
    }

    #[test]
    fn failed_rename_cleans_up_the_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscribers.json");
        // Renaming a file over a directory fails.
        fs::create_dir(&path).unwrap();
        let file = JsonFile::new(&path);

        assert!(matches!(
            file.save(&vec![1u64, 2]),
            Err(StoreError::Io { .. })
        ));
        assert!(!tmp_path(&path).exists());
        assert!(path.is_dir());
    }

    #[test]
    fn blank_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscribers.json");
        fs::write(&path, "  \n").unwrap();
        assert!(SubscriberStore::new(&path).list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topics.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TopicStore::new(&path).get(UserId(1)),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn subscribing_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SubscriberStore::new(dir.path().join("subscribers.json"));

        assert!(store.add(UserId(10)).unwrap());
        assert!(store.add(UserId(20)).unwrap());
        assert!(!store.add(UserId(10)).unwrap());
        assert_eq!(store.list().unwrap(), vec![UserId(10), UserId(20)]);

        assert!(!store.remove(UserId(99)).unwrap());
        assert_eq!(store.list().unwrap(), vec![UserId(10), UserId(20)]);

        assert!(store.remove(UserId(10)).unwrap());
        assert_eq!(store.list().unwrap(), vec![UserId(20)]);
    }

    #[test]
    fn subscribers_file_is_a_plain_id_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscribers.json");
        let store = SubscriberStore::new(&path);
        store.add(UserId(5)).unwrap();
        store.add(UserId(6)).unwrap();

        let ids: Vec<u64> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(ids, vec![5, 6]);
    }

    #[test]
    fn remove_all_prunes_in_one_pass() {
        let dir = tempfile::tempdir().unwrap();
        let store = SubscriberStore::new(dir.path().join("subscribers.json"));
        for id in 1..=4 {
            store.add(UserId(id)).unwrap();
        }

        assert_eq!(store.remove_all(&[UserId(2), UserId(4), UserId(8)]).unwrap(), 2);
        assert_eq!(store.list().unwrap(), vec![UserId(1), UserId(3)]);
    }
}
