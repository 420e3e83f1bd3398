use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use strum_macros::Display;
use thiserror::Error as ThisError;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Duration, Instant};

use crate::stream::{Fields, IdRequest, Stream, StreamError, StreamId};
use crate::utils::unix_millis;

/// The Store owns the string, hash and stream tables. Each table sits behind its own
/// reader/writer lock and no operation ever holds more than one of them. Keys written with a
/// time-to-live are removed by a single background task once their TTL elapses, reads never
/// observe an expired key even before that happens.
///
/// Cloning is cheap, clones share the same tables.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    /// Creates an empty store and spawns its expiration task, so it must be called from within a
    /// Tokio runtime. The task stops once every clone of the store is dropped.
    pub fn new() -> Store {
        let waker = Arc::new(Notify::new());
        let inner = Arc::new(InnerStore {
            strings: RwLock::new(Strings::default()),
            hashes: RwLock::new(HashMap::new()),
            streams: RwLock::new(HashMap::new()),
            waker: waker.clone(),
        });

        tokio::spawn(remove_expired_keys(Arc::downgrade(&inner), waker));

        Self { inner }
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        let strings = self.inner.strings.read();
        strings.get(key, Instant::now()).map(|entry| entry.data.clone())
    }

    pub fn set(&self, key: Key, data: Bytes) {
        let mut strings = self.inner.strings.write();
        strings.insert(
            key,
            Entry {
                data,
                expires_at: None,
            },
            Instant::now(),
        );
    }

    /// Sets the key so that it expires after `ttl`. A TTL too large to be represented never
    /// expires.
    pub fn set_with_ttl(&self, key: Key, data: Bytes, ttl: Duration) {
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl) else {
            return self.set(key, data);
        };

        let mut strings = self.inner.strings.write();
        strings.insert(
            key,
            Entry {
                data,
                expires_at: Some(expires_at),
            },
            now,
        );

        let expires_next = strings.ttls.first().map(|(when, _)| *when) == Some(expires_at);
        if expires_next {
            self.inner.waker.notify_one();
        }
    }

    /// Sets every pair and returns how many of the keys did not exist before.
    pub fn set_many(&self, pairs: Vec<(Key, Bytes)>) -> usize {
        let now = Instant::now();
        let mut strings = self.inner.strings.write();

        let mut created = 0;
        for (key, data) in pairs {
            let entry = Entry {
                data,
                expires_at: None,
            };
            if !strings.insert(key, entry, now) {
                created += 1;
            }
        }

        created
    }

    /// Removes the key from every table holding it and returns whether it existed in any. The
    /// tables are locked one after the other.
    pub fn remove(&self, key: &str) -> bool {
        let string = self.inner.strings.write().remove(key, Instant::now()).is_some();
        let hash = self.inner.hashes.write().remove(key).is_some();
        let stream = self.inner.streams.write().remove(key).is_some();

        string || hash || stream
    }

    /// Removes every given key and returns how many existed.
    pub fn remove_many<'a, I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter().filter(|key| self.remove(key)).count()
    }

    pub fn exists(&self, key: &str) -> bool {
        let strings = self.inner.strings.read();
        strings.get(key, Instant::now()).is_some()
    }

    /// Remaining time to live. `None` when the key does not exist or does not expire.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let strings = self.inner.strings.read();

        strings
            .get(key, now)
            .and_then(|entry| entry.expires_at)
            .map(|expires_at| expires_at.saturating_duration_since(now))
    }

    pub fn keys_matching<F>(&self, predicate: F) -> Vec<Key>
    where
        F: Fn(&str) -> bool,
    {
        let now = Instant::now();
        let strings = self.inner.strings.read();

        strings
            .entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && predicate(key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of live string keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let strings = self.inner.strings.read();

        strings
            .entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds `increment` to the integer stored at `key`. The key must exist. The key keeps its
    /// time to live.
    pub fn incr_by(&self, key: &str, increment: i64) -> Result<i64, IncrError> {
        let now = Instant::now();
        let mut strings = self.inner.strings.write();

        let entry = strings
            .entries
            .get_mut(key)
            .filter(|entry| !entry.is_expired(now))
            .ok_or(IncrError::KeyNotFound)?;

        let value = std::str::from_utf8(&entry.data)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|value| value.checked_add(increment))
            .ok_or(IncrError::NotAnInteger)?;

        entry.data = Bytes::from(value.to_string());

        Ok(value)
    }

    /// Sets the given fields of the hash, creating the hash if needed. Returns how many fields
    /// are new.
    pub fn hset(&self, hash: Key, fields: Vec<(String, Bytes)>) -> usize {
        let mut hashes = self.inner.hashes.write();
        let hash = hashes.entry(hash).or_default();

        let mut created = 0;
        for (field, value) in fields {
            if hash.insert(field, value).is_none() {
                created += 1;
            }
        }

        created
    }

    pub fn hget(&self, hash: &str, field: &str) -> Option<Bytes> {
        let hashes = self.inner.hashes.read();
        hashes.get(hash).and_then(|hash| hash.get(field)).cloned()
    }

    /// Every field and value of the hash, `None` when the hash does not exist.
    pub fn hgetall(&self, hash: &str) -> Option<Vec<(String, Bytes)>> {
        let hashes = self.inner.hashes.read();
        hashes.get(hash).map(|hash| {
            hash.iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()
        })
    }

    /// Appends an entry to the stream, creating the stream on its first valid entry.
    pub fn xadd(
        &self,
        stream: Key,
        id: IdRequest,
        fields: Fields,
    ) -> Result<StreamId, StreamError> {
        let now_ms = unix_millis();

        let mut streams = self.inner.streams.write();
        match streams.get_mut(&stream) {
            Some(existing) => existing.add(id, fields, now_ms),
            None => {
                let mut created = Stream::default();
                let id = created.add(id, fields, now_ms)?;
                streams.insert(stream, created);
                Ok(id)
            }
        }
    }

    /// The id XADD would give the next entry of the stream, without adding it.
    pub fn next_stream_id(&self, stream: &str, id: IdRequest) -> Result<StreamId, StreamError> {
        let now_ms = unix_millis();

        let streams = self.inner.streams.read();
        match streams.get(stream) {
            Some(existing) => existing.next_id(id, now_ms),
            None => Stream::default().next_id(id, now_ms),
        }
    }

    /// A copy of the stream's entries in id order.
    pub fn stream(&self, stream: &str) -> Option<Vec<(StreamId, Fields)>> {
        let streams = self.inner.streams.read();
        streams.get(stream).map(|stream| {
            stream
                .entries()
                .map(|(id, fields)| (*id, fields.clone()))
                .collect()
        })
    }

    pub fn key_type(&self, key: &str) -> KeyType {
        if self.exists(key) {
            return KeyType::String;
        }

        if self.inner.hashes.read().contains_key(key) {
            return KeyType::Hash;
        }

        if self.inner.streams.read().contains_key(key) {
            return KeyType::Stream;
        }

        KeyType::None
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

type Key = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum KeyType {
    String,
    Hash,
    Stream,
    None,
}

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum IncrError {
    #[error("key does not exist")]
    KeyNotFound,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
}

struct InnerStore {
    strings: RwLock<Strings>,
    hashes: RwLock<HashMap<Key, HashMap<String, Bytes>>>,
    streams: RwLock<HashMap<Key, Stream>>,
    waker: Arc<Notify>,
}

impl Drop for InnerStore {
    fn drop(&mut self) {
        // Lets the expiration task observe that the store is gone.
        self.waker.notify_one();
    }
}

struct Entry {
    data: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }
}

// Every entry with an expiration has exactly one matching `(expires_at, key)` element in `ttls`.
#[derive(Default)]
struct Strings {
    entries: HashMap<Key, Entry>,
    ttls: BTreeSet<(Instant, Key)>,
}

impl Strings {
    fn get(&self, key: &str, now: Instant) -> Option<&Entry> {
        self.entries.get(key).filter(|entry| !entry.is_expired(now))
    }

    /// Returns whether a live value was replaced.
    fn insert(&mut self, key: Key, entry: Entry, now: Instant) -> bool {
        let expires_at = entry.expires_at;
        let previous = self.entries.insert(key.clone(), entry);

        let replaced = match previous {
            Some(previous) => {
                if let Some(when) = previous.expires_at {
                    self.ttls.remove(&(when, key.clone()));
                }
                !previous.is_expired(now)
            }
            None => false,
        };

        if let Some(when) = expires_at {
            self.ttls.insert((when, key));
        }

        replaced
    }

    fn remove(&mut self, key: &str, now: Instant) -> Option<Entry> {
        let entry = self.entries.remove(key)?;

        if let Some(when) = entry.expires_at {
            self.ttls.remove(&(when, key.to_string()));
        }

        Some(entry).filter(|entry| !entry.is_expired(now))
    }

    /// Drops every expired key and returns when the next one expires.
    fn remove_expired_keys(&mut self, now: Instant) -> Option<Instant> {
        let expired_keys: Vec<(Instant, Key)> = self
            .ttls
            .iter()
            .take_while(|(expires_at, _)| expires_at <= &now)
            .cloned()
            .collect();

        for (when, key) in expired_keys {
            self.entries.remove(&key);
            self.ttls.remove(&(when, key));
        }

        self.ttls.first().map(|&(expires_at, _)| expires_at)
    }
}

async fn remove_expired_keys(store: Weak<InnerStore>, waker: Arc<Notify>) {
    loop {
        let next_expiration = match store.upgrade() {
            Some(store) => store.strings.write().remove_expired_keys(Instant::now()),
            None => return,
        };

        if let Some(next_expiration) = next_expiration {
            tokio::select! {
                _ = sleep_until(next_expiration) => {}
                _ = waker.notified() => {}
            }
        } else {
            waker.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    fn stored_keys(store: &Store) -> usize {
        store.inner.strings.read().entries.len()
    }

    #[tokio::test]
    async fn ttl() {
        time::pause();

        let store = Store::new();

        store.set_with_ttl(
            "key1".to_string(),
            Bytes::from("value1"),
            Duration::from_secs(10),
        );
        store.set_with_ttl(
            "key2".to_string(),
            Bytes::from("value2"),
            Duration::from_secs(20),
        );

        assert_eq!(stored_keys(&store), 2);

        time::advance(Duration::from_secs(10)).await;
        time::sleep(Duration::from_millis(1)).await;

        assert_eq!(stored_keys(&store), 1);
        assert!(store.exists("key2"));

        time::advance(Duration::from_secs(20)).await;
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(stored_keys(&store), 0);

        store.set_with_ttl(
            "key3".to_string(),
            Bytes::from("value3"),
            Duration::from_secs(20),
        );

        assert_eq!(stored_keys(&store), 1);

        time::advance(Duration::from_secs(20)).await;
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(stored_keys(&store), 0);
    }

    #[tokio::test]
    async fn expired_key_is_hidden_before_removal() {
        let store = Store::new();

        // Inserted behind the expiration task's back, so only the read path can hide it.
        store.inner.strings.write().insert(
            "key".to_string(),
            Entry {
                data: Bytes::from("value"),
                expires_at: Some(Instant::now()),
            },
            Instant::now(),
        );

        assert_eq!(stored_keys(&store), 1);
        assert_eq!(store.get("key"), None);
        assert!(!store.exists("key"));
        assert_eq!(store.ttl("key"), None);
        assert!(store.keys_matching(|_| true).is_empty());
    }

    #[tokio::test]
    async fn overwrite_cancels_previous_expiration() {
        time::pause();

        let store = Store::new();
        store.set_with_ttl(
            "key".to_string(),
            Bytes::from("old"),
            Duration::from_secs(10),
        );
        store.set("key".to_string(), Bytes::from("new"));

        time::advance(Duration::from_secs(10)).await;
        time::sleep(Duration::from_millis(1)).await;

        assert_eq!(store.get("key"), Some(Bytes::from("new")));
        assert_eq!(store.ttl("key"), None);
        assert!(store.inner.strings.read().ttls.is_empty());
    }

    #[tokio::test]
    async fn ttl_reports_remaining_time() {
        time::pause();

        let store = Store::new();
        store.set("persistent".to_string(), Bytes::from("1"));
        store.set_with_ttl(
            "volatile".to_string(),
            Bytes::from("1"),
            Duration::from_secs(30),
        );

        time::advance(Duration::from_secs(10)).await;

        assert_eq!(store.ttl("persistent"), None);
        assert_eq!(store.ttl("missing"), None);
        assert_eq!(store.ttl("volatile"), Some(Duration::from_secs(20)));
    }

    #[tokio::test]
    async fn remove_clears_pending_expiration() {
        let store = Store::new();
        store.set_with_ttl(
            "key".to_string(),
            Bytes::from("value"),
            Duration::from_secs(10),
        );

        assert!(store.remove("key"));
        assert!(!store.remove("key"));
        assert!(store.inner.strings.read().ttls.is_empty());
    }

    #[tokio::test]
    async fn remove_many_covers_every_type() {
        let store = Store::new();
        store.set("string".to_string(), Bytes::from("1"));
        store.hset(
            "hash".to_string(),
            vec![("f".to_string(), Bytes::from("v"))],
        );
        store
            .xadd(
                "stream".to_string(),
                IdRequest::Explicit(StreamId::new(1, 1)),
                vec![],
            )
            .unwrap();

        let removed = store.remove_many(["string", "hash", "stream", "missing"]);

        assert_eq!(removed, 3);
        assert_eq!(store.key_type("string"), KeyType::None);
        assert_eq!(store.key_type("hash"), KeyType::None);
        assert_eq!(store.key_type("stream"), KeyType::None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn remove_clears_a_name_from_every_table() {
        let store = Store::new();
        store.set("k".to_string(), Bytes::from("v"));
        store.hset("k".to_string(), vec![("f".to_string(), Bytes::from("v"))]);
        store
            .xadd(
                "k".to_string(),
                IdRequest::Explicit(StreamId::new(1, 1)),
                vec![],
            )
            .unwrap();

        assert!(store.remove("k"));
        assert_eq!(store.key_type("k"), KeyType::None);
        assert_eq!(store.hgetall("k"), None);
        assert_eq!(store.stream("k"), None);
        assert!(!store.remove("k"));

        store.set("k".to_string(), Bytes::from("v"));
        store.hset("k".to_string(), vec![("f".to_string(), Bytes::from("v"))]);
        assert_eq!(store.remove_many(["k", "k"]), 1);
    }

    #[tokio::test]
    async fn set_many_counts_new_keys() {
        let store = Store::new();
        store.set("a".to_string(), Bytes::from("0"));

        let created = store.set_many(vec![
            ("a".to_string(), Bytes::from("1")),
            ("b".to_string(), Bytes::from("2")),
        ]);

        assert_eq!(created, 1);
        assert_eq!(store.get("a"), Some(Bytes::from("1")));
        assert_eq!(store.get("b"), Some(Bytes::from("2")));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn incr_by() {
        let store = Store::new();

        assert_eq!(store.incr_by("missing", 1), Err(IncrError::KeyNotFound));

        store.set("counter".to_string(), Bytes::from("5"));
        assert_eq!(store.incr_by("counter", 1), Ok(6));
        assert_eq!(store.incr_by("counter", -10), Ok(-4));
        assert_eq!(store.get("counter"), Some(Bytes::from("-4")));

        store.set("text".to_string(), Bytes::from("abc"));
        assert_eq!(store.incr_by("text", 1), Err(IncrError::NotAnInteger));

        store.set("max".to_string(), Bytes::from(i64::MAX.to_string()));
        assert_eq!(store.incr_by("max", 1), Err(IncrError::NotAnInteger));
    }

    #[tokio::test]
    async fn incr_by_keeps_ttl() {
        time::pause();

        let store = Store::new();
        store.set_with_ttl("key".to_string(), Bytes::from("1"), Duration::from_secs(5));

        assert_eq!(store.incr_by("key", 1), Ok(2));
        assert_eq!(store.ttl("key"), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn hashes() {
        let store = Store::new();

        assert_eq!(store.hgetall("user"), None);

        let created = store.hset(
            "user".to_string(),
            vec![
                ("name".to_string(), Bytes::from("ada")),
                ("lang".to_string(), Bytes::from("rust")),
            ],
        );
        assert_eq!(created, 2);

        let created = store.hset(
            "user".to_string(),
            vec![("name".to_string(), Bytes::from("grace"))],
        );
        assert_eq!(created, 0);

        assert_eq!(store.hget("user", "name"), Some(Bytes::from("grace")));
        assert_eq!(store.hget("user", "age"), None);
        assert_eq!(store.hget("nobody", "name"), None);

        let mut fields = store.hgetall("user").unwrap();
        fields.sort();
        assert_eq!(
            fields,
            vec![
                ("lang".to_string(), Bytes::from("rust")),
                ("name".to_string(), Bytes::from("grace")),
            ]
        );
    }

    #[tokio::test]
    async fn streams_track_their_own_last_id() {
        let store = Store::new();
        let fields = || vec![(Bytes::from("f"), Bytes::from("v"))];

        assert_eq!(
            store.xadd(
                "a".to_string(),
                IdRequest::Explicit(StreamId::new(100, 0)),
                fields()
            ),
            Ok(StreamId::new(100, 0))
        );

        // A different stream is not constrained by stream "a".
        assert_eq!(
            store.xadd(
                "b".to_string(),
                IdRequest::Explicit(StreamId::new(1, 0)),
                fields()
            ),
            Ok(StreamId::new(1, 0))
        );

        assert_eq!(
            store.xadd(
                "a".to_string(),
                IdRequest::Explicit(StreamId::new(99, 5)),
                fields()
            ),
            Err(StreamError::NotIncreasing)
        );

        // A rejected first entry does not create the stream.
        assert_eq!(
            store.xadd(
                "c".to_string(),
                IdRequest::Explicit(StreamId::MIN),
                fields()
            ),
            Err(StreamError::ZeroId)
        );
        assert_eq!(store.stream("c"), None);

        assert_eq!(
            store.stream("a"),
            Some(vec![(StreamId::new(100, 0), fields())])
        );
    }

    #[tokio::test]
    async fn key_types() {
        let store = Store::new();
        store.set("string".to_string(), Bytes::from("1"));
        store.hset(
            "hash".to_string(),
            vec![("f".to_string(), Bytes::from("v"))],
        );
        store
            .xadd(
                "stream".to_string(),
                IdRequest::Explicit(StreamId::new(1, 1)),
                vec![],
            )
            .unwrap();

        assert_eq!(store.key_type("string"), KeyType::String);
        assert_eq!(store.key_type("hash"), KeyType::Hash);
        assert_eq!(store.key_type("stream"), KeyType::Stream);
        assert_eq!(store.key_type("missing"), KeyType::None);
        assert_eq!(KeyType::Hash.to_string(), "hash");
    }
}
