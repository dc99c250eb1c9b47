use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::AddAssign;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Duration, Instant};

/// The Store is responsible for managing typed values, with optional time-to-live settings for
/// each key. It automatically handles the expiration and removal of keys when their TTLs elapse.
/// The store is designed to be thread-safe, allowing it to be shared and cloned cheaply using
/// reference counting.
///
/// Every `lock()` is a separate critical section. Callers that need several operations to be
/// observed atomically must perform them under a single guard.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new() -> Store {
        let state = State {
            keys: HashMap::new(),
            ttls: BTreeSet::new(),
        };

        let waker = Notify::new();
        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
            waker,
        });

        tokio::spawn({
            let inner = inner.clone();
            async move { remove_expired_keys(inner).await }
        });

        Self { inner }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// A value held by a key.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(Bytes),
    Hash(HashMap<String, Bytes>),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    SortedSet(HashMap<String, f64>),
}

impl Value {
    /// The name reported by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Hash(_) => "hash",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
        }
    }

    /// Collections that lost their last element are removed from the keyspace.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Value::String(_) => false,
            Value::Hash(h) => h.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::SortedSet(z) => z.is_empty(),
        }
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::String(data)
    }
}

pub struct InnerStore {
    state: Mutex<State>,
    waker: Notify,
}

pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
    waker: &'a Notify,
}

impl<'a> InnerStoreLocked<'a> {
    pub fn set(&mut self, key: String, value: impl Into<Value>) {
        let entry = Entry {
            value: value.into(),
            expires_at: None,
        };
        self.insert(key, entry);
    }

    pub fn set_with_ttl(
        &mut self,
        key: String,
        value: impl Into<Value>,
        ttl: Duration,
    ) -> Result<(), String> {
        let expires_at = deadline(ttl)?;
        let entry = Entry {
            value: value.into(),
            expires_at: Some(expires_at),
        };

        self.insert(key.clone(), entry);
        self.track_expiration(key, expires_at);

        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state
            .keys
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.state
            .keys
            .get_mut(key)
            .filter(|entry| entry.is_live())
            .map(|entry| &mut entry.value)
    }

    /// Returns the value at `key`, inserting the one built by `default` when the key is absent.
    /// An existing TTL is preserved.
    pub fn get_or_insert_with(&mut self, key: &str, default: impl FnOnce() -> Value) -> &mut Value {
        if !self.exists(key) {
            self.set(key.to_string(), default());
        }

        let entry = self
            .state
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                value: Value::String(Bytes::new()),
                expires_at: None,
            });
        &mut entry.value
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let entry = self.state.keys.remove(key)?;
        if let Some(expires_at) = entry.expires_at {
            self.state.ttls.remove(&(expires_at, key.to_string()));
        }
        entry.is_live().then_some(entry.value)
    }

    /// Drops `key` when it holds a collection without elements.
    pub fn remove_if_empty(&mut self, key: &str) {
        if self.get(key).is_some_and(Value::is_empty_collection) {
            self.remove(key);
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets a timeout on `key`. Returns `false` if the key does not exist, and an error when the
    /// deadline is not representable.
    pub fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, String> {
        let expires_at = deadline(ttl)?;

        let previous = match self.state.keys.get_mut(key).filter(|e| e.is_live()) {
            Some(entry) => entry.expires_at.replace(expires_at),
            None => return Ok(false),
        };

        if let Some(previous) = previous {
            self.state.ttls.remove(&(previous, key.to_string()));
        }
        self.track_expiration(key.to_string(), expires_at);

        Ok(true)
    }

    /// The remaining time to live of `key`, `None` when the key has no timeout or is absent.
    pub fn get_ttl(&self, key: &str) -> Option<Duration> {
        self.state
            .keys
            .get(key)
            .filter(|entry| entry.is_live())
            .and_then(|entry| entry.expires_at)
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }

    /// `TTL` reply: remaining seconds rounded to the nearest second, `-1` for a key without a
    /// timeout and `-2` for a missing key.
    pub fn ttl_secs(&self, key: &str) -> i64 {
        match self.get_ttl(key) {
            Some(ttl) => ((ttl.as_millis() + 500) / 1000) as i64,
            None if self.exists(key) => -1,
            None => -2,
        }
    }

    pub fn size(&self) -> usize {
        self.state.keys.values().filter(|e| e.is_live()).count()
    }

    pub fn flush(&mut self) {
        self.state.keys.clear();
        self.state.ttls.clear();
    }

    /// Adds `increment` to the integer stored at `key`. Values that do not parse as `T` are
    /// rejected, the stored value is left untouched.
    pub fn incr_by<T>(&mut self, key: &str, increment: T) -> Result<T, String>
    where
        T: FromStr + ToString + AddAssign + Default,
    {
        let err = "ERR value is not an integer or out of range";

        let mut value = match self.get(key) {
            Some(Value::String(data)) => std::str::from_utf8(data.as_ref())
                .map_err(|_| err.to_string())
                .and_then(|s| s.parse::<T>().map_err(|_| err.to_string()))?,
            Some(_) => return Err(WRONGTYPE.to_string()),
            None => T::default(),
        };

        value += increment;
        self.set_keep_ttl(key, Value::String(value.to_string().into()));

        Ok(value)
    }

    /// Replaces the value at `key` without touching its expiration.
    pub fn set_keep_ttl(&mut self, key: &str, value: Value) {
        match self.state.keys.get_mut(key).filter(|e| e.is_live()) {
            Some(entry) => entry.value = value,
            None => self.set(key.to_string(), value),
        }
    }

    pub fn remove_expired_keys(&mut self) -> Option<Instant> {
        let now = Instant::now();

        let expired_keys: Vec<(Instant, String)> = self
            .state
            .ttls
            .iter()
            .take_while(|(expires_at, _)| expires_at <= &now)
            .cloned()
            .collect();

        for (when, key) in expired_keys {
            self.state.keys.remove(&key);
            self.state.ttls.remove(&(when, key));
        }

        self.state
            .ttls
            .iter()
            .next()
            .map(|&(expires_at, _)| expires_at)
    }

    fn insert(&mut self, key: String, entry: Entry) {
        if let Some(Entry {
            expires_at: Some(previous),
            ..
        }) = self.state.keys.insert(key.clone(), entry)
        {
            self.state.ttls.remove(&(previous, key));
        }
    }

    fn track_expiration(&mut self, key: Key, expires_at: Instant) {
        self.state.ttls.insert((expires_at, key.clone()));

        let next_to_expire = self.state.ttls.iter().next().map(|(_, key)| key);
        let expires_next = next_to_expire == Some(&key);
        if expires_next {
            self.waker.notify_one();
        }
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl InnerStore {
    pub fn lock(&self) -> InnerStoreLocked<'_> {
        let state = self.state.lock();
        InnerStoreLocked {
            state,
            waker: &self.waker,
        }
    }
}

pub const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
pub const INVALID_EXPIRE_TIME: &str = "ERR invalid expire time";

fn deadline(ttl: Duration) -> Result<Instant, String> {
    Instant::now()
        .checked_add(ttl)
        .ok_or_else(|| INVALID_EXPIRE_TIME.to_string())
}

type Key = String;

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| at > Instant::now())
    }
}

pub struct State {
    keys: HashMap<Key, Entry>,
    ttls: BTreeSet<(Instant, Key)>,
}

async fn remove_expired_keys(store: Arc<InnerStore>) {
    loop {
        let (next_expiration, waker) = {
            let mut store = store.lock();
            let next_expiration = store.remove_expired_keys();
            (next_expiration, store.waker)
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
    use tokio::time::Duration;

    #[tokio::test]
    async fn ttl() {
        time::pause();

        let store = Store::new();

        {
            let mut store = store.lock();

            store.set_with_ttl(
                "key1".to_string(),
                Bytes::from("value1"),
                Duration::from_secs(10),
            ).unwrap();

            store.set_with_ttl(
                "key2".to_string(),
                Bytes::from("value2"),
                Duration::from_secs(20),
            ).unwrap();
        }

        assert_eq!(store.lock().size(), 2);

        time::advance(Duration::from_secs(10)).await;
        time::sleep(Duration::from_millis(1)).await;

        assert_eq!(store.lock().size(), 1);
        assert!(store.lock().exists("key2"));

        time::advance(Duration::from_secs(20)).await;
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.lock().size(), 0);
    }

    #[tokio::test]
    async fn overwrite_clears_previous_ttl() {
        time::pause();

        let store = Store::new();

        store.lock().set_with_ttl(
            "key1".to_string(),
            Bytes::from("short"),
            Duration::from_secs(5),
        ).unwrap();
        store.lock().set("key1".to_string(), Bytes::from("forever"));

        time::advance(Duration::from_secs(10)).await;
        time::sleep(Duration::from_millis(1)).await;

        assert_eq!(
            store.lock().get("key1"),
            Some(&Value::String(Bytes::from("forever")))
        );
        assert_eq!(store.lock().get_ttl("key1"), None);
    }

    #[tokio::test]
    async fn expire_existing_and_missing_keys() {
        time::pause();

        let store = Store::new();
        store.lock().set("key1".to_string(), Bytes::from("1"));

        assert_eq!(store.lock().expire("key1", Duration::from_secs(30)), Ok(true));
        assert_eq!(store.lock().expire("missing", Duration::from_secs(30)), Ok(false));
        assert_eq!(
            store.lock().get_ttl("key1"),
            Some(Duration::from_secs(30))
        );

        time::advance(Duration::from_secs(31)).await;
        time::sleep(Duration::from_millis(1)).await;

        assert!(!store.lock().exists("key1"));
    }

    #[tokio::test]
    async fn unrepresentable_deadlines_are_rejected() {
        let store = Store::new();
        let mut state = store.lock();
        state.set("key1".to_string(), Bytes::from("1"));

        assert_eq!(
            state.expire("key1", Duration::from_secs(i64::MAX as u64)),
            Err(INVALID_EXPIRE_TIME.to_string())
        );
        assert_eq!(
            state.set_with_ttl("key2".to_string(), Bytes::from("2"), Duration::MAX),
            Err(INVALID_EXPIRE_TIME.to_string())
        );
        assert_eq!(state.get_ttl("key1"), None);
        assert!(!state.exists("key2"));
    }

    #[tokio::test]
    async fn ttl_secs_rounds_to_the_nearest_second() {
        time::pause();

        let store = Store::new();
        store.lock().set("plain".to_string(), Bytes::from("1"));
        store
            .lock()
            .set_with_ttl("key1".to_string(), Bytes::from("1"), Duration::from_secs(100))
            .unwrap();

        assert_eq!(store.lock().ttl_secs("key1"), 100);
        time::advance(Duration::from_millis(400)).await;
        assert_eq!(store.lock().ttl_secs("key1"), 100);
        time::advance(Duration::from_millis(200)).await;
        assert_eq!(store.lock().ttl_secs("key1"), 99);
        assert_eq!(store.lock().ttl_secs("plain"), -1);
        assert_eq!(store.lock().ttl_secs("missing"), -2);
    }

    #[tokio::test]
    async fn incr_by_rejects_non_integers_and_collections() {
        let store = Store::new();
        let mut state = store.lock();

        assert_eq!(state.incr_by("counter", 5i64), Ok(5));
        assert_eq!(state.incr_by("counter", -2i64), Ok(3));

        state.set("text".to_string(), Bytes::from("abc"));
        assert!(state.incr_by("text", 1i64).is_err());

        state.set("list".to_string(), Value::List(VecDeque::new()));
        assert_eq!(state.incr_by("list", 1i64), Err(WRONGTYPE.to_string()));
    }

    #[tokio::test]
    async fn empty_collections_are_removed() {
        let store = Store::new();
        let mut state = store.lock();

        state.set("set".to_string(), Value::Set(HashSet::new()));
        state.remove_if_empty("set");

        assert!(!state.exists("set"));
        assert_eq!(state.size(), 0);
    }
}
