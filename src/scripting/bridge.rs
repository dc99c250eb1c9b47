//! The store operations reachable from scripts through `redis.call` and `redis.pcall`.
//!
//! Every invocation takes the store lock once. Two bridge calls made by the same script are two
//! separate critical sections: other clients may run in between.

use bytes::Bytes;
use itertools::Itertools;
use std::any::Any;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use strum_macros::{Display, EnumString, VariantNames};
use thiserror::Error as ThisError;
use tokio::time::Duration;
use tracing::{debug, trace};

use crate::scripting::value::ScriptValue;
use crate::store::{InnerStoreLocked, Store, Value, INVALID_EXPIRE_TIME, WRONGTYPE};

#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum BridgeError {
    #[error("{}", WRONGTYPE)]
    WrongType,
    #[error("{}", INVALID_EXPIRE_TIME)]
    InvalidExpireTime,
    #[error("ERR internal failure while running '{command}': {message}")]
    Fault { command: String, message: String },
}

/// Commands scripts may run. Names are matched case insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, VariantNames)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
pub enum BridgeCommand {
    Get,
    Set,
    Del,
    Exists,
    Incr,
    Decr,
    HGet,
    HSet,
    HGetAll,
    LPush,
    RPush,
    LPop,
    RPop,
    SAdd,
    SIsMember,
    SCard,
    Type,
    Expire,
    Ttl,
    MGet,
    MSet,
    HExists,
    HDel,
    HLen,
    LLen,
    LRange,
    ZAdd,
    ZScore,
    ZCard,
    ZRem,
    DbSize,
    FlushDb,
}

/// Runs `name` against the store. Unknown names yield `Nil`. Wrong type errors and faults raised
/// while dispatching are returned as `Err`.
///
/// Arguments are raw bytes. Values are stored as given, keys, fields and numbers are read as
/// UTF-8 text.
pub fn call(store: &Store, name: &str, args: &[Bytes]) -> Result<ScriptValue, BridgeError> {
    let Ok(command) = name.parse::<BridgeCommand>() else {
        debug!(command = name, "unknown command called from script");
        return Ok(ScriptValue::Nil);
    };

    trace!(%command, args = args.len(), "bridge call");

    guard(command, || command.exec(store, args))
}

/// Same as [`call`], failures come back as an error value instead.
pub fn pcall(store: &Store, name: &str, args: &[Bytes]) -> ScriptValue {
    call(store, name, args).unwrap_or_else(|err| ScriptValue::Error(err.to_string()))
}

/// Runs `f`, turning a panic into a [`BridgeError::Fault`].
fn guard(
    command: BridgeCommand,
    f: impl FnOnce() -> Result<ScriptValue, BridgeError>,
) -> Result<ScriptValue, BridgeError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        Err(BridgeError::Fault {
            command: command.to_string(),
            message: panic_message(panic),
        })
    })
}

impl BridgeCommand {
    fn min_args(self) -> usize {
        use BridgeCommand::*;
        match self {
            DbSize | FlushDb => 0,
            Get | Del | Exists | Incr | Decr | HGetAll | LPop | RPop | SCard | Type | Ttl
            | MGet | HLen | LLen | ZCard => 1,
            Set | HGet | LPush | RPush | SAdd | SIsMember | Expire | MSet | HExists | HDel
            | ZScore | ZRem => 2,
            HSet | LRange | ZAdd => 3,
        }
    }

    /// The reply given when fewer than `min_args` arguments were passed.
    fn missing_args_reply(self) -> ScriptValue {
        use BridgeCommand::*;
        match self {
            Get | Set | Incr | Decr | HGet | HSet | HGetAll | LPop | RPop | MGet | LRange
            | ZScore => ScriptValue::Nil,
            Type => ScriptValue::str("none"),
            Ttl => ScriptValue::Int(-2),
            MSet | FlushDb => ScriptValue::ok(),
            _ => ScriptValue::Int(0),
        }
    }

    fn exec(self, store: &Store, args: &[Bytes]) -> Result<ScriptValue, BridgeError> {
        use BridgeCommand::*;

        if args.len() < self.min_args() {
            return Ok(self.missing_args_reply());
        }

        let mut db = store.lock();
        let value: ScriptValue = match self {
            Get => match db.get(&text(&args[0])) {
                Some(Value::String(data)) => ScriptValue::Str(data.clone()),
                _ => ScriptValue::Nil,
            },
            Set => {
                db.set(text(&args[0]).into_owned(), args[1].clone());
                ScriptValue::ok()
            }
            Del => args.iter().filter(|key| db.remove(&text(key)).is_some()).count().into(),
            Exists => args.iter().filter(|key| db.exists(&text(key))).count().into(),
            Incr => incr_by(&mut db, &text(&args[0]), 1)?,
            Decr => incr_by(&mut db, &text(&args[0]), -1)?,
            HGet => hash(&db, &text(&args[0]))
                .and_then(|h| h.get(&*text(&args[1])).cloned())
                .into(),
            HSet => {
                let hash = hash_mut(&mut db, &text(&args[0]))?;
                let added = args[1..]
                    .iter()
                    .tuples::<(_, _)>()
                    .filter(|(field, value)| {
                        hash.insert(text(field).into_owned(), Bytes::clone(value))
                            .is_none()
                    })
                    .count();
                added.into()
            }
            HGetAll => match hash(&db, &text(&args[0])) {
                Some(h) => ScriptValue::Array(
                    h.iter()
                        .sorted_by(|a, b| a.0.cmp(b.0))
                        .flat_map(|(field, value)| {
                            [ScriptValue::str(field.as_str()), ScriptValue::Str(value.clone())]
                        })
                        .collect(),
                ),
                None => ScriptValue::Nil,
            },
            LPush | RPush => {
                let list = list_mut(&mut db, &text(&args[0]))?;
                for value in &args[1..] {
                    if self == LPush {
                        list.push_front(value.clone());
                    } else {
                        list.push_back(value.clone());
                    }
                }
                list.len().into()
            }
            LPop | RPop => {
                let key = text(&args[0]);
                let popped = match db.get_mut(&key) {
                    Some(Value::List(list)) if self == LPop => list.pop_front(),
                    Some(Value::List(list)) => list.pop_back(),
                    _ => None,
                };
                db.remove_if_empty(&key);
                popped.into()
            }
            SAdd => {
                let set = set_mut(&mut db, &text(&args[0]))?;
                args[1..]
                    .iter()
                    .filter(|member| set.insert(Bytes::clone(member)))
                    .count()
                    .into()
            }
            SIsMember => set(&db, &text(&args[0]))
                .is_some_and(|s| s.contains(&args[1]))
                .into(),
            SCard => set(&db, &text(&args[0])).map_or(0, HashSet::len).into(),
            Type => ScriptValue::str(db.get(&text(&args[0])).map_or("none", Value::type_name)),
            Expire => {
                let key = text(&args[0]);
                match text(&args[1]).parse::<i64>() {
                    Ok(secs) if secs <= 0 => db.remove(&key).is_some().into(),
                    Ok(secs) => db
                        .expire(&key, Duration::from_secs(secs as u64))
                        .map_err(|_| BridgeError::InvalidExpireTime)?
                        .into(),
                    Err(_) => ScriptValue::Int(0),
                }
            }
            Ttl => ScriptValue::Int(db.ttl_secs(&text(&args[0]))),
            MGet => ScriptValue::Array(
                args.iter()
                    .map(|key| match db.get(&text(key)) {
                        Some(Value::String(data)) => ScriptValue::Str(data.clone()),
                        _ => ScriptValue::Nil,
                    })
                    .collect(),
            ),
            MSet => {
                for (key, value) in args.iter().tuples::<(_, _)>() {
                    db.set(text(key).into_owned(), value.clone());
                }
                ScriptValue::ok()
            }
            HExists => hash(&db, &text(&args[0]))
                .is_some_and(|h| h.contains_key(&*text(&args[1])))
                .into(),
            HDel => {
                let key = text(&args[0]);
                let deleted = match db.get_mut(&key) {
                    Some(Value::Hash(h)) => args[1..]
                        .iter()
                        .filter(|f| h.remove(&*text(f)).is_some())
                        .count(),
                    _ => 0,
                };
                db.remove_if_empty(&key);
                deleted.into()
            }
            HLen => hash(&db, &text(&args[0])).map_or(0, HashMap::len).into(),
            LLen => match db.get(&text(&args[0])) {
                Some(Value::List(list)) => list.len().into(),
                _ => ScriptValue::Int(0),
            },
            LRange => lrange(&db, &text(&args[0]), &text(&args[1]), &text(&args[2])),
            ZAdd => {
                let Some(pairs) = score_pairs(&args[1..]) else {
                    return Ok(ScriptValue::Int(0));
                };
                let zset = zset_mut(&mut db, &text(&args[0]))?;
                pairs
                    .into_iter()
                    .filter(|(score, member)| zset.insert(member.to_string(), *score).is_none())
                    .count()
                    .into()
            }
            ZScore => zset(&db, &text(&args[0]))
                .and_then(|z| z.get(&*text(&args[1])).copied())
                .map_or(ScriptValue::Nil, ScriptValue::Float),
            ZCard => zset(&db, &text(&args[0])).map_or(0, HashMap::len).into(),
            ZRem => {
                let key = text(&args[0]);
                let removed = match db.get_mut(&key) {
                    Some(Value::SortedSet(z)) => args[1..]
                        .iter()
                        .filter(|m| z.remove(&*text(m)).is_some())
                        .count(),
                    _ => 0,
                };
                db.remove_if_empty(&key);
                removed.into()
            }
            DbSize => db.size().into(),
            FlushDb => {
                db.flush();
                ScriptValue::ok()
            }
        };

        Ok(value)
    }
}

fn text(arg: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(arg)
}

/// Counters parse permissively: the leading integer of the stored string is used and anything
/// unparseable counts as 0.
fn incr_by(
    db: &mut InnerStoreLocked<'_>,
    key: &str,
    delta: i64,
) -> Result<ScriptValue, BridgeError> {
    let current = match db.get(key) {
        None => 0,
        Some(Value::String(data)) => leading_integer(&String::from_utf8_lossy(data)),
        Some(_) => return Err(BridgeError::WrongType),
    };

    let next = current.wrapping_add(delta);
    db.set_keep_ttl(key, Value::String(Bytes::from(next.to_string())));

    Ok(ScriptValue::Int(next))
}

fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end].parse::<i64>().map_or(0, |n| sign * n)
}

fn lrange(db: &InnerStoreLocked<'_>, key: &str, start: &str, stop: &str) -> ScriptValue {
    let (Ok(start), Ok(stop)) = (start.parse::<i64>(), stop.parse::<i64>()) else {
        return ScriptValue::Nil;
    };
    let Some(Value::List(list)) = db.get(key) else {
        return ScriptValue::Nil;
    };

    let len = list.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop {
        return ScriptValue::Array(vec![]);
    }

    ScriptValue::Array(
        list.iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .map(ScriptValue::Str)
            .collect(),
    )
}

/// `score member [score member ...]`, rejected as a whole when a score is not a number.
fn score_pairs(args: &[Bytes]) -> Option<Vec<(f64, Cow<'_, str>)>> {
    args.iter()
        .tuples::<(_, _)>()
        .map(|(score, member)| Some((text(score).parse::<f64>().ok()?, text(member))))
        .collect()
}

fn hash<'a>(db: &'a InnerStoreLocked<'_>, key: &str) -> Option<&'a HashMap<String, Bytes>> {
    match db.get(key) {
        Some(Value::Hash(h)) => Some(h),
        _ => None,
    }
}

fn set<'a>(db: &'a InnerStoreLocked<'_>, key: &str) -> Option<&'a HashSet<Bytes>> {
    match db.get(key) {
        Some(Value::Set(s)) => Some(s),
        _ => None,
    }
}

fn zset<'a>(db: &'a InnerStoreLocked<'_>, key: &str) -> Option<&'a HashMap<String, f64>> {
    match db.get(key) {
        Some(Value::SortedSet(z)) => Some(z),
        _ => None,
    }
}

fn hash_mut<'a>(
    db: &'a mut InnerStoreLocked<'_>,
    key: &str,
) -> Result<&'a mut HashMap<String, Bytes>, BridgeError> {
    match db.get_or_insert_with(key, || Value::Hash(HashMap::new())) {
        Value::Hash(h) => Ok(h),
        _ => Err(BridgeError::WrongType),
    }
}

fn list_mut<'a>(
    db: &'a mut InnerStoreLocked<'_>,
    key: &str,
) -> Result<&'a mut VecDeque<Bytes>, BridgeError> {
    match db.get_or_insert_with(key, || Value::List(VecDeque::new())) {
        Value::List(l) => Ok(l),
        _ => Err(BridgeError::WrongType),
    }
}

fn set_mut<'a>(
    db: &'a mut InnerStoreLocked<'_>,
    key: &str,
) -> Result<&'a mut HashSet<Bytes>, BridgeError> {
    match db.get_or_insert_with(key, || Value::Set(HashSet::new())) {
        Value::Set(s) => Ok(s),
        _ => Err(BridgeError::WrongType),
    }
}

fn zset_mut<'a>(
    db: &'a mut InnerStoreLocked<'_>,
    key: &str,
) -> Result<&'a mut HashMap<String, f64>, BridgeError> {
    match db.get_or_insert_with(key, || Value::SortedSet(HashMap::new())) {
        Value::SortedSet(z) => Ok(z),
        _ => Err(BridgeError::WrongType),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::VariantNames;

    fn args(args: &[&str]) -> Vec<Bytes> {
        args.iter()
            .map(|s| Bytes::copy_from_slice(s.as_bytes()))
            .collect()
    }

    fn run(store: &Store, name: &str, a: &[&str]) -> ScriptValue {
        call(store, name, &args(a)).unwrap()
    }

    #[test]
    fn command_names_are_closed_and_case_insensitive() {
        assert_eq!(BridgeCommand::VARIANTS.len(), 32);
        assert!(BridgeCommand::VARIANTS.contains(&"HGETALL"));
        assert!(BridgeCommand::VARIANTS.contains(&"FLUSHDB"));
        assert_eq!("hgetall".parse::<BridgeCommand>(), Ok(BridgeCommand::HGetAll));
        assert_eq!("SisMember".parse::<BridgeCommand>(), Ok(BridgeCommand::SIsMember));
        assert!("PUBLISH".parse::<BridgeCommand>().is_err());
    }

    #[tokio::test]
    async fn strings_and_counters() {
        let store = Store::new();

        assert_eq!(run(&store, "GET", &["k"]), ScriptValue::Nil);
        assert_eq!(run(&store, "set", &["k", "v"]), ScriptValue::ok());
        assert_eq!(run(&store, "GET", &["k"]), ScriptValue::str("v"));
        assert_eq!(run(&store, "EXISTS", &["k", "k", "nope"]), ScriptValue::Int(2));

        assert_eq!(run(&store, "INCR", &["n"]), ScriptValue::Int(1));
        assert_eq!(run(&store, "DECR", &["m"]), ScriptValue::Int(-1));
        assert_eq!(run(&store, "SET", &["p", "12abc"]), ScriptValue::ok());
        assert_eq!(run(&store, "INCR", &["p"]), ScriptValue::Int(13));
        assert_eq!(run(&store, "INCR", &["k"]), ScriptValue::Int(1));

        assert_eq!(run(&store, "DEL", &["k", "n", "missing"]), ScriptValue::Int(2));
        assert_eq!(run(&store, "DBSIZE", &[]), ScriptValue::Int(2));
        assert_eq!(run(&store, "FLUSHDB", &[]), ScriptValue::ok());
        assert_eq!(run(&store, "DBSIZE", &[]), ScriptValue::Int(0));
    }

    #[tokio::test]
    async fn missing_arguments_fall_back_to_defaults() {
        let store = Store::new();

        assert_eq!(run(&store, "GET", &[]), ScriptValue::Nil);
        assert_eq!(run(&store, "DEL", &[]), ScriptValue::Int(0));
        assert_eq!(run(&store, "TYPE", &[]), ScriptValue::str("none"));
        assert_eq!(run(&store, "TTL", &[]), ScriptValue::Int(-2));
        assert_eq!(run(&store, "MSET", &["a"]), ScriptValue::ok());
        assert_eq!(run(&store, "HSET", &["h", "f"]), ScriptValue::Nil);
        assert_eq!(run(&store, "DBSIZE", &[]), ScriptValue::Int(0));
    }

    #[tokio::test]
    async fn unknown_commands_yield_nil() {
        let store = Store::new();

        assert_eq!(run(&store, "PUBLISH", &["chan", "msg"]), ScriptValue::Nil);
        assert_eq!(pcall(&store, "NOPE", &[]), ScriptValue::Nil);
    }

    #[tokio::test]
    async fn hashes() {
        let store = Store::new();

        assert_eq!(run(&store, "HSET", &["h", "b", "2", "a", "1"]), ScriptValue::Int(2));
        assert_eq!(run(&store, "HSET", &["h", "a", "3"]), ScriptValue::Int(0));
        assert_eq!(run(&store, "HGET", &["h", "a"]), ScriptValue::str("3"));
        assert_eq!(run(&store, "HGET", &["h", "zz"]), ScriptValue::Nil);
        assert_eq!(run(&store, "HEXISTS", &["h", "b"]), ScriptValue::Int(1));
        assert_eq!(run(&store, "HLEN", &["h"]), ScriptValue::Int(2));
        assert_eq!(
            run(&store, "HGETALL", &["h"]),
            ScriptValue::Array(vec![
                ScriptValue::str("a"),
                ScriptValue::str("3"),
                ScriptValue::str("b"),
                ScriptValue::str("2"),
            ])
        );
        assert_eq!(run(&store, "HGETALL", &["missing"]), ScriptValue::Nil);
        assert_eq!(run(&store, "HDEL", &["h", "a", "b", "c"]), ScriptValue::Int(2));
        assert_eq!(run(&store, "TYPE", &["h"]), ScriptValue::str("none"));
    }

    #[tokio::test]
    async fn lists() {
        let store = Store::new();

        assert_eq!(run(&store, "RPUSH", &["l", "b", "c"]), ScriptValue::Int(2));
        assert_eq!(run(&store, "LPUSH", &["l", "a"]), ScriptValue::Int(3));
        assert_eq!(run(&store, "LLEN", &["l"]), ScriptValue::Int(3));
        assert_eq!(
            run(&store, "LRANGE", &["l", "0", "-1"]),
            ScriptValue::Array(vec![
                ScriptValue::str("a"),
                ScriptValue::str("b"),
                ScriptValue::str("c"),
            ])
        );
        assert_eq!(
            run(&store, "LRANGE", &["l", "-2", "10"]),
            ScriptValue::Array(vec![ScriptValue::str("b"), ScriptValue::str("c")])
        );
        assert_eq!(
            run(&store, "LRANGE", &["l", "2", "1"]),
            ScriptValue::Array(vec![])
        );
        assert_eq!(run(&store, "LRANGE", &["l", "x", "1"]), ScriptValue::Nil);
        assert_eq!(run(&store, "LRANGE", &["missing", "0", "1"]), ScriptValue::Nil);

        assert_eq!(run(&store, "LPOP", &["l"]), ScriptValue::str("a"));
        assert_eq!(run(&store, "RPOP", &["l"]), ScriptValue::str("c"));
        assert_eq!(run(&store, "RPOP", &["l"]), ScriptValue::str("b"));
        assert_eq!(run(&store, "RPOP", &["l"]), ScriptValue::Nil);
        assert_eq!(run(&store, "EXISTS", &["l"]), ScriptValue::Int(0));
    }

    #[tokio::test]
    async fn sets_and_sorted_sets() {
        let store = Store::new();

        assert_eq!(run(&store, "SADD", &["s", "x", "y", "x"]), ScriptValue::Int(2));
        assert_eq!(run(&store, "SISMEMBER", &["s", "x"]), ScriptValue::Int(1));
        assert_eq!(run(&store, "SISMEMBER", &["s", "z"]), ScriptValue::Int(0));
        assert_eq!(run(&store, "SCARD", &["s"]), ScriptValue::Int(2));
        assert_eq!(run(&store, "TYPE", &["s"]), ScriptValue::str("set"));

        assert_eq!(run(&store, "ZADD", &["z", "1.5", "a", "2", "b"]), ScriptValue::Int(2));
        assert_eq!(run(&store, "ZADD", &["z", "3", "a"]), ScriptValue::Int(0));
        assert_eq!(run(&store, "ZADD", &["z", "nan?", "c"]), ScriptValue::Int(0));
        assert_eq!(run(&store, "ZSCORE", &["z", "a"]), ScriptValue::Float(3.0));
        assert_eq!(run(&store, "ZSCORE", &["z", "c"]), ScriptValue::Nil);
        assert_eq!(run(&store, "ZCARD", &["z"]), ScriptValue::Int(2));
        assert_eq!(run(&store, "ZREM", &["z", "a", "b"]), ScriptValue::Int(2));
        assert_eq!(run(&store, "TYPE", &["z"]), ScriptValue::str("none"));
    }

    #[tokio::test]
    async fn expirations() {
        let store = Store::new();

        run(&store, "SET", &["k", "v"]);
        assert_eq!(run(&store, "TTL", &["k"]), ScriptValue::Int(-1));
        assert_eq!(run(&store, "TTL", &["missing"]), ScriptValue::Int(-2));
        assert_eq!(run(&store, "EXPIRE", &["k", "100"]), ScriptValue::Int(1));
        assert_eq!(run(&store, "TTL", &["k"]), ScriptValue::Int(100));
        assert_eq!(run(&store, "EXPIRE", &["missing", "100"]), ScriptValue::Int(0));
        assert_eq!(run(&store, "EXPIRE", &["k", "soon"]), ScriptValue::Int(0));
        assert_eq!(run(&store, "EXPIRE", &["k", "0"]), ScriptValue::Int(1));
        assert_eq!(run(&store, "EXISTS", &["k"]), ScriptValue::Int(0));
    }

    #[tokio::test]
    async fn unrepresentable_expire_times_are_errors() {
        let store = Store::new();
        run(&store, "SET", &["k", "v"]);

        assert_eq!(
            call(&store, "EXPIRE", &args(&["k", "9223372036854775807"])),
            Err(BridgeError::InvalidExpireTime)
        );
        assert_eq!(
            pcall(&store, "EXPIRE", &args(&["k", "9223372036854775807"])),
            ScriptValue::Error(INVALID_EXPIRE_TIME.to_string())
        );
        assert_eq!(run(&store, "TTL", &["k"]), ScriptValue::Int(-1));
    }

    #[tokio::test]
    async fn binary_values_are_kept_verbatim() {
        let store = Store::new();
        let value = Bytes::from_static(&[255, 0, 200]);
        let key = Bytes::from("k");

        assert_eq!(
            call(&store, "SET", &[key.clone(), value.clone()]),
            Ok(ScriptValue::ok())
        );
        assert_eq!(
            call(&store, "GET", &[key]),
            Ok(ScriptValue::Str(value.clone()))
        );

        call(&store, "RPUSH", &[Bytes::from("l"), value.clone()]).unwrap();
        assert_eq!(run(&store, "LPOP", &["l"]), ScriptValue::Str(value.clone()));

        call(&store, "SADD", &[Bytes::from("s"), value.clone()]).unwrap();
        assert_eq!(
            call(&store, "SISMEMBER", &[Bytes::from("s"), value]),
            Ok(ScriptValue::Int(1))
        );
    }

    #[tokio::test]
    async fn panics_become_faults() {
        let store = Store::new();

        let err = guard(BridgeCommand::Get, || {
            let _db = store.lock();
            panic!("boom")
        });
        assert_eq!(
            err,
            Err(BridgeError::Fault {
                command: "GET".to_string(),
                message: "boom".to_string(),
            })
        );

        let err = guard(BridgeCommand::Set, || panic!("failed at {}", 3)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ERR internal failure while running 'SET': failed at 3"
        );

        // The lock is released while unwinding.
        assert_eq!(run(&store, "SET", &["k", "v"]), ScriptValue::ok());
    }

    #[tokio::test]
    async fn multi_key_strings() {
        let store = Store::new();

        assert_eq!(run(&store, "MSET", &["a", "1", "b", "2", "dangling"]), ScriptValue::ok());
        run(&store, "LPUSH", &["l", "x"]);
        assert_eq!(
            run(&store, "MGET", &["a", "missing", "l", "b"]),
            ScriptValue::Array(vec![
                ScriptValue::str("1"),
                ScriptValue::Nil,
                ScriptValue::Nil,
                ScriptValue::str("2"),
            ])
        );
        assert_eq!(run(&store, "EXISTS", &["dangling"]), ScriptValue::Int(0));
    }

    #[tokio::test]
    async fn wrong_type_writes() {
        let store = Store::new();
        run(&store, "SET", &["k", "v"]);

        assert_eq!(
            call(&store, "LPUSH", &args(&["k", "x"])),
            Err(BridgeError::WrongType)
        );
        assert_eq!(
            pcall(&store, "HSET", &args(&["k", "f", "v"])),
            ScriptValue::Error(WRONGTYPE.to_string())
        );
        run(&store, "RPUSH", &["l", "x"]);
        assert_eq!(
            call(&store, "INCR", &args(&["l"])),
            Err(BridgeError::WrongType)
        );
        // Reads on the wrong type are misses.
        assert_eq!(run(&store, "HGET", &["k", "f"]), ScriptValue::Nil);
        assert_eq!(run(&store, "LLEN", &["k"]), ScriptValue::Int(0));
        assert_eq!(run(&store, "GET", &["k"]), ScriptValue::str("v"));
    }

    #[test]
    fn leading_integer_parsing() {
        assert_eq!(leading_integer("42"), 42);
        assert_eq!(leading_integer("  -7xyz"), -7);
        assert_eq!(leading_integer("3.9"), 3);
        assert_eq!(leading_integer("abc"), 0);
        assert_eq!(leading_integer(""), 0);
    }
}
