use crate::scripting::error::ScriptError;
use crate::scripting::value::ScriptValue;
use crate::store::Store;

/// An embeddable interpreter. Each invocation opens its own context and drops it when done.
pub trait ScriptRuntime: Send + Sync {
    /// Engine tag recorded on libraries, e.g. `LUA`.
    fn engine(&self) -> &'static str;

    /// A fresh, isolated context whose `call`/`pcall` bridge runs against `store`.
    fn open(&self, store: Store) -> Result<Box<dyn ScriptContext>, ScriptError>;
}

/// One execution context. Never shared between invocations.
pub trait ScriptContext {
    /// Binds KEYS and ARGV as 1-based sequences.
    fn bind(&mut self, keys: &[String], args: &[String]) -> Result<(), ScriptError>;

    /// Runs `source` to completion and converts the value it returns.
    fn run(&mut self, source: &str) -> Result<ScriptValue, ScriptError>;

    /// Functions exported by the code run so far.
    fn exports(&self) -> Result<Vec<ExportedFunction>, ScriptError>;

    /// Calls the exported function `name` with the bound KEYS and ARGV. Errors raised by the
    /// function are returned, never propagated as panics.
    fn call(&mut self, name: &str) -> Result<ScriptValue, ScriptError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFunction {
    pub name: String,
    pub description: Option<String>,
    pub flags: Vec<String>,
}

impl ExportedFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            flags: Vec::new(),
        }
    }
}
