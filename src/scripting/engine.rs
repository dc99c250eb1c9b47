use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::scripting::cache::ScriptCache;
use crate::scripting::error::ScriptError;
use crate::scripting::runtime::ScriptRuntime;
use crate::scripting::value::ScriptValue;
use crate::store::Store;

/// Runs ad-hoc scripts (EVAL, EVALSHA) and owns the script cache.
pub struct ScriptEngine {
    store: Store,
    cache: ScriptCache,
    runtime: Arc<dyn ScriptRuntime>,
}

impl ScriptEngine {
    pub fn new(store: Store, runtime: Arc<dyn ScriptRuntime>) -> Self {
        Self {
            store,
            cache: ScriptCache::new(),
            runtime,
        }
    }

    /// Runs `source` in a fresh context with `keys` and `args` bound.
    pub fn eval(
        &self,
        source: &str,
        keys: &[String],
        args: &[String],
    ) -> Result<ScriptValue, ScriptError> {
        let start = Instant::now();

        let result = self.runtime.open(self.store.clone()).and_then(|mut ctx| {
            ctx.bind(keys, args)?;
            ctx.run(source)
        });

        match &result {
            Ok(_) => debug!(elapsed = ?start.elapsed(), keys = keys.len(), "script finished"),
            Err(err) => warn!(error = %err, "script failed"),
        }

        result
    }

    /// Runs the cached script with the given digest.
    pub fn eval_sha(
        &self,
        digest: &str,
        keys: &[String],
        args: &[String],
    ) -> Result<ScriptValue, ScriptError> {
        let source = self.cache.get(digest).ok_or(ScriptError::NoScript)?;
        self.eval(&source, keys, args)
    }

    pub fn load(&self, source: &str) -> String {
        self.cache.load(source)
    }

    pub fn exists(&self, digest: &str) -> bool {
        self.cache.exists(digest)
    }

    pub fn flush(&self) {
        self.cache.flush();
        debug!("script cache flushed");
    }
}
