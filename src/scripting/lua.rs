//! Lua 5.4 behind the [`ScriptRuntime`] traits.
//!
//! Scripts see the conventional Redis surface: `KEYS`, `ARGV` and the `redis` table with `call`,
//! `pcall`, `error_reply`, `status_reply`, `log`, `sha1hex`, `register_function` and the `LOG_*`
//! levels. Only the base, table, string, math, utf8 and coroutine libraries are loaded.

use bytes::Bytes;
use itertools::Itertools;
use mlua::{Function, Lua, LuaOptions, MultiValue, StdLib, Table, Value};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::scripting::bridge;
use crate::scripting::cache::sha1_hex;
use crate::scripting::error::ScriptError;
use crate::scripting::runtime::{ExportedFunction, ScriptContext, ScriptRuntime};
use crate::scripting::value::ScriptValue;
use crate::store::Store;

const ENGINE: &str = "LUA";
const CHUNK_NAME: &str = "=user_script";
const REGISTERED_FUNCTIONS: &str = "scriptdis.registered_functions";
const MAX_NESTING: usize = 64;

const LOG_DEBUG: i64 = 0;
const LOG_VERBOSE: i64 = 1;
const LOG_NOTICE: i64 = 2;
const LOG_WARNING: i64 = 3;

/// Entries of the `redis` table that belong to the runtime and are never exported.
const BUILTINS: &[&str] = &[
    "call",
    "pcall",
    "error_reply",
    "status_reply",
    "log",
    "sha1hex",
    "register_function",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct LuaRuntime;

impl ScriptRuntime for LuaRuntime {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn open(&self, store: Store) -> Result<Box<dyn ScriptContext>, ScriptError> {
        Ok(Box::new(LuaContext::new(store)?))
    }
}

pub struct LuaContext {
    lua: Lua,
    registered: Arc<Mutex<BTreeMap<String, ExportedFunction>>>,
}

impl LuaContext {
    fn new(store: Store) -> mlua::Result<Self> {
        let libs = StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE;
        let lua = Lua::new_with(libs, LuaOptions::default())?;

        let globals = lua.globals();
        for name in ["dofile", "loadfile"] {
            globals.set(name, Value::Nil)?;
        }

        let registered = Arc::new(Mutex::new(BTreeMap::new()));
        lua.set_named_registry_value(REGISTERED_FUNCTIONS, lua.create_table()?)?;

        let redis = lua.create_table()?;

        let call = lua.create_function({
            let store = store.clone();
            move |lua, args: MultiValue| {
                let Some((name, args)) = command_args(&args)? else {
                    return Ok(Value::Nil);
                };
                match bridge::call(&store, &name, &args) {
                    Ok(value) => to_lua(lua, value),
                    Err(err) => Err(mlua::Error::RuntimeError(err.to_string())),
                }
            }
        })?;
        redis.set("call", call)?;

        let pcall = lua.create_function(move |lua, args: MultiValue| {
            let value = match command_args(&args) {
                Ok(Some((name, args))) => bridge::pcall(&store, &name, &args),
                Ok(None) => ScriptValue::Nil,
                Err(err) => ScriptValue::Error(describe(&err)),
            };
            to_lua(lua, value)
        })?;
        redis.set("pcall", pcall)?;

        let error_reply = lua.create_function(|lua, msg: mlua::String| {
            let reply = lua.create_table()?;
            reply.set("err", msg)?;
            Ok(reply)
        })?;
        redis.set("error_reply", error_reply)?;

        let status_reply = lua.create_function(|lua, msg: mlua::String| {
            let reply = lua.create_table()?;
            reply.set("ok", msg)?;
            Ok(reply)
        })?;
        redis.set("status_reply", status_reply)?;

        redis.set("log", lua.create_function(|_, args: MultiValue| log(args))?)?;

        let sha1hex = lua.create_function(|_, data: mlua::String| Ok(sha1_hex(&*data.as_bytes())))?;
        redis.set("sha1hex", sha1hex)?;

        let register_function = lua.create_function({
            let registered = registered.clone();
            move |lua, args: MultiValue| {
                let (function, callback) = registration(args)?;

                let mut registered = registered.lock();
                if registered.contains_key(&function.name) {
                    return Err(mlua::Error::RuntimeError(format!(
                        "ERR function '{}' already exists in the library",
                        function.name
                    )));
                }

                let functions: Table = lua.named_registry_value(REGISTERED_FUNCTIONS)?;
                functions.set(function.name.as_str(), callback)?;
                registered.insert(function.name.clone(), function);
                Ok(())
            }
        })?;
        redis.set("register_function", register_function)?;

        redis.set("LOG_DEBUG", LOG_DEBUG)?;
        redis.set("LOG_VERBOSE", LOG_VERBOSE)?;
        redis.set("LOG_NOTICE", LOG_NOTICE)?;
        redis.set("LOG_WARNING", LOG_WARNING)?;

        globals.set("redis", redis)?;

        Ok(Self { lua, registered })
    }

    fn lookup(&self, name: &str) -> mlua::Result<Option<Function>> {
        let functions: Table = self.lua.named_registry_value(REGISTERED_FUNCTIONS)?;
        if let Value::Function(function) = functions.raw_get::<Value>(name)? {
            return Ok(Some(function));
        }

        match self.lua.globals().get::<Value>("redis")? {
            Value::Table(redis) => match redis.get::<Value>(name)? {
                Value::Function(function) => Ok(Some(function)),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }
}

impl ScriptContext for LuaContext {
    fn bind(&mut self, keys: &[String], args: &[String]) -> Result<(), ScriptError> {
        let keys = self.lua.create_sequence_from(keys.iter().map(String::as_str))?;
        let args = self.lua.create_sequence_from(args.iter().map(String::as_str))?;

        let globals = self.lua.globals();
        if let Value::Table(redis) = globals.get::<Value>("redis")? {
            redis.set("KEYS", keys.clone())?;
            redis.set("ARGV", args.clone())?;
        }
        globals.set("KEYS", keys)?;
        globals.set("ARGV", args)?;

        Ok(())
    }

    fn run(&mut self, source: &str) -> Result<ScriptValue, ScriptError> {
        // Library sources start with a `#!lua name=...` line, which Lua does not accept.
        let source = match source.starts_with("#!") {
            true => format!("--{}", source),
            false => source.to_string(),
        };

        let value: Value = self.lua.load(source).set_name(CHUNK_NAME).call(())?;
        Ok(from_lua(value, 0)?)
    }

    fn exports(&self) -> Result<Vec<ExportedFunction>, ScriptError> {
        let mut exports = self.registered.lock().clone();

        if let Value::Table(redis) = self.lua.globals().get::<Value>("redis")? {
            for pair in redis.pairs::<Value, Value>() {
                let (Value::String(name), Value::Function(_)) = pair? else {
                    continue;
                };
                let name = name.to_string_lossy().to_string();
                if !BUILTINS.contains(&name.as_str()) {
                    exports
                        .entry(name.clone())
                        .or_insert_with(|| ExportedFunction::new(name));
                }
            }
        }

        Ok(exports
            .into_values()
            .filter(|function| !function.name.starts_with('_'))
            .collect())
    }

    fn call(&mut self, name: &str) -> Result<ScriptValue, ScriptError> {
        let function = self.lookup(name)?.ok_or_else(|| {
            ScriptError::execution(format!("function '{}' is not callable", name))
        })?;

        let globals = self.lua.globals();
        let keys: Value = globals.get("KEYS")?;
        let args: Value = globals.get("ARGV")?;

        let value: Value = function.call((keys, args))?;
        Ok(from_lua(value, 0)?)
    }
}

impl From<mlua::Error> for ScriptError {
    fn from(err: mlua::Error) -> Self {
        ScriptError::execution(describe(&err))
    }
}

/// The message a client sees for `err`: callback wrappers removed, first line only.
fn describe(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => describe(cause),
        mlua::Error::RuntimeError(msg) => first_line(msg),
        mlua::Error::SyntaxError { message, .. } => first_line(message),
        err => first_line(&err.to_string()),
    }
}

fn first_line(msg: &str) -> String {
    msg.lines().next().unwrap_or_default().to_string()
}

/// Splits `redis.call` arguments into a command name and its raw arguments. `None` when called
/// without arguments.
fn command_args(args: &MultiValue) -> mlua::Result<Option<(String, Vec<Bytes>)>> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args.iter() {
        let Some(part) = arg_bytes(value) else {
            return Err(mlua::Error::RuntimeError(
                "ERR Lua redis lib command arguments must be strings or integers".to_string(),
            ));
        };
        parts.push(part);
    }

    let mut parts = parts.into_iter();
    Ok(parts
        .next()
        .map(|name| (String::from_utf8_lossy(&name).into_owned(), parts.collect())))
}

/// Lua strings are byte strings and are passed on untouched.
fn arg_bytes(value: &Value) -> Option<Bytes> {
    match value {
        Value::String(s) => Some(Bytes::copy_from_slice(&s.as_bytes())),
        Value::Integer(i) => Some(Bytes::from(i.to_string())),
        Value::Number(n) => Some(Bytes::from(n.to_string())),
        Value::Boolean(b) => Some(Bytes::from_static(if *b { b"1" } else { b"0" })),
        _ => None,
    }
}

fn log(args: MultiValue) -> mlua::Result<()> {
    if args.len() < 2 {
        return Ok(());
    }

    let mut args = args.into_iter();
    let level = args.next();
    let message = args
        .filter_map(|value| arg_bytes(&value))
        .map(|part| String::from_utf8_lossy(&part).into_owned())
        .join(" ");

    match level {
        Some(Value::Integer(LOG_DEBUG | LOG_VERBOSE)) => debug!(target: "script", "{}", message),
        Some(Value::Integer(LOG_WARNING)) => warn!(target: "script", "{}", message),
        _ => info!(target: "script", "{}", message),
    }

    Ok(())
}

/// Accepts `register_function(name, callback)` and
/// `register_function{function_name=..., callback=..., description=..., flags={...}}`.
fn registration(args: MultiValue) -> mlua::Result<(ExportedFunction, Function)> {
    let mut args = args.into_iter();

    match (args.next(), args.next()) {
        (Some(Value::String(name)), Some(Value::Function(callback))) => Ok((
            ExportedFunction::new(name.to_string_lossy().to_string()),
            callback,
        )),
        (Some(Value::Table(options)), None) => {
            let name: String = options.get("function_name")?;
            let callback: Function = options.get("callback")?;
            let description: Option<String> = options.get("description")?;
            let flags: Option<Vec<String>> = options.get("flags")?;

            let function = ExportedFunction {
                name,
                description,
                flags: flags.unwrap_or_default(),
            };
            Ok((function, callback))
        }
        _ => Err(mlua::Error::RuntimeError(
            "ERR wrong arguments to redis.register_function".to_string(),
        )),
    }
}

fn from_lua(value: Value, depth: usize) -> mlua::Result<ScriptValue> {
    let value = match value {
        Value::Nil => ScriptValue::Nil,
        Value::Boolean(b) => ScriptValue::Bool(b),
        Value::Integer(i) => ScriptValue::Int(i),
        Value::Number(n) => ScriptValue::Float(n),
        Value::String(s) => ScriptValue::Str(Bytes::copy_from_slice(&s.as_bytes())),
        Value::Table(table) => {
            if let Value::String(err) = table.raw_get::<Value>("err")? {
                return Ok(ScriptValue::Error(err.to_string_lossy().to_string()));
            }
            if let Value::String(ok) = table.raw_get::<Value>("ok")? {
                return Ok(ScriptValue::Status(ok.to_string_lossy().to_string()));
            }
            if depth >= MAX_NESTING {
                return Err(mlua::Error::RuntimeError(
                    "ERR reached lua stack limit".to_string(),
                ));
            }

            // Keys are dropped, values keep the table's iteration order.
            let mut items = Vec::new();
            for pair in table.pairs::<Value, Value>() {
                let (_, item) = pair?;
                items.push(from_lua(item, depth + 1)?);
            }
            ScriptValue::Array(items)
        }
        other => ScriptValue::Unsupported(other.type_name()),
    };

    Ok(value)
}

fn to_lua(lua: &Lua, value: ScriptValue) -> mlua::Result<Value> {
    let value = match value {
        ScriptValue::Nil => Value::Nil,
        ScriptValue::Bool(b) => Value::Boolean(b),
        ScriptValue::Int(i) => Value::Integer(i),
        ScriptValue::Float(f) => Value::Number(f),
        ScriptValue::Str(s) => Value::String(lua.create_string(&s[..])?),
        ScriptValue::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.into_iter().enumerate() {
                // Lua sequences cannot hold nil.
                let item = match item {
                    ScriptValue::Nil => Value::Boolean(false),
                    item => to_lua(lua, item)?,
                };
                table.raw_set(i + 1, item)?;
            }
            Value::Table(table)
        }
        ScriptValue::Status(s) => {
            let table = lua.create_table()?;
            table.set("ok", s)?;
            Value::Table(table)
        }
        ScriptValue::Error(s) => {
            let table = lua.create_table()?;
            table.set("err", s)?;
            Value::Table(table)
        }
        ScriptValue::Unsupported(_) => Value::Nil,
    };

    Ok(value)
}
