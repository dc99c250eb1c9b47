use std::sync::Arc;

use crate::scripting::{FunctionRegistry, LuaRuntime, ScriptEngine, ScriptRuntime};
use crate::store::Store;

/// Shared server state handed to every command: the keyspace, the script engine and the
/// function registry. Cloning is cheap.
#[derive(Clone)]
pub struct Db {
    pub store: Store,
    pub scripts: Arc<ScriptEngine>,
    pub functions: Arc<FunctionRegistry>,
}

impl Db {
    pub fn new(store: Store) -> Db {
        Db::with_runtime(store, Arc::new(LuaRuntime))
    }

    pub fn with_runtime(store: Store, runtime: Arc<dyn ScriptRuntime>) -> Db {
        Db {
            scripts: Arc::new(ScriptEngine::new(store.clone(), runtime.clone())),
            functions: Arc::new(FunctionRegistry::new(store.clone(), runtime)),
            store,
        }
    }
}

impl Default for Db {
    fn default() -> Self {
        Db::new(Store::new())
    }
}
