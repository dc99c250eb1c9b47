use glob_match::glob_match;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

use crate::scripting::cache::sha1_hex;
use crate::scripting::error::ScriptError;
use crate::scripting::runtime::{ExportedFunction, ScriptRuntime};
use crate::scripting::value::ScriptValue;
use crate::store::Store;

/// A named, server-resident block of script source and the functions it exports.
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    pub name: String,
    pub source: Arc<str>,
    /// SHA-1 of `source`.
    pub digest: String,
    pub engine: &'static str,
    pub created_at: SystemTime,
    pub functions: BTreeMap<String, Arc<Function>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub library: String,
    /// SHA-1 of the library name, the function name and the library source. Changes whenever
    /// the library source changes.
    pub digest: String,
    pub description: Option<String>,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub libraries: usize,
    pub functions: usize,
}

#[derive(Default)]
struct Registry {
    libraries: BTreeMap<String, Arc<Library>>,
    /// `library.function` index over `libraries`.
    functions: HashMap<String, Arc<Function>>,
}

impl Registry {
    fn install(&mut self, library: Arc<Library>) {
        self.remove(&library.name);

        for function in library.functions.values() {
            self.functions
                .insert(qualified(&library.name, &function.name), function.clone());
        }
        self.libraries.insert(library.name.clone(), library);
    }

    fn remove(&mut self, name: &str) -> Option<Arc<Library>> {
        let library = self.libraries.remove(name)?;
        for function in library.functions.keys() {
            self.functions.remove(&qualified(name, function));
        }
        Some(library)
    }
}

fn qualified(library: &str, function: &str) -> String {
    format!("{}.{}", library, function)
}

/// Libraries and their functions. Both indexes sit behind one lock and change together.
pub struct FunctionRegistry {
    state: RwLock<Registry>,
    store: Store,
    runtime: Arc<dyn ScriptRuntime>,
}

impl FunctionRegistry {
    pub fn new(store: Store, runtime: Arc<dyn ScriptRuntime>) -> Self {
        Self {
            state: RwLock::new(Registry::default()),
            store,
            runtime,
        }
    }

    /// Installs the library `name`, replacing an existing one only when `replace` is set.
    /// Returns the library digest.
    pub fn create_library(
        &self,
        name: &str,
        source: &str,
        replace: bool,
    ) -> Result<String, ScriptError> {
        validate_library_name(name)?;

        if !replace && self.state.read().libraries.contains_key(name) {
            return Err(ScriptError::LibraryExists(name.to_string()));
        }

        // Discovery runs the source, keep it outside the lock.
        let exports = self.discover(source).map_err(|err| {
            warn!(library = name, error = %err, "failed to load library");
            err
        })?;

        let digest = sha1_hex(source);
        let functions = exports
            .into_iter()
            .map(|export| {
                let function = Function {
                    digest: sha1_hex(format!("{}:{}{}", name, export.name, source)),
                    library: name.to_string(),
                    name: export.name,
                    description: export.description,
                    flags: export.flags,
                };
                (function.name.clone(), Arc::new(function))
            })
            .collect::<BTreeMap<_, _>>();

        let library = Arc::new(Library {
            name: name.to_string(),
            source: Arc::from(source),
            digest: digest.clone(),
            engine: self.runtime.engine(),
            created_at: SystemTime::now(),
            functions,
        });

        let mut state = self.state.write();
        if !replace && state.libraries.contains_key(name) {
            return Err(ScriptError::LibraryExists(name.to_string()));
        }

        info!(
            library = name,
            functions = library.functions.len(),
            replace,
            "library loaded"
        );
        state.install(library);

        Ok(digest)
    }

    /// Installs a library whose name and engine come from a leading
    /// `#!<engine> name=<library>` line. Returns the library name.
    pub fn load_library(&self, source: &str, replace: bool) -> Result<String, ScriptError> {
        let name = parse_shebang(source, self.runtime.engine())?;
        self.create_library(&name, source, replace)?;
        Ok(name)
    }

    pub fn delete_library(&self, name: &str) -> Result<(), ScriptError> {
        self.state
            .write()
            .remove(name)
            .ok_or_else(|| ScriptError::LibraryNotFound(name.to_string()))?;

        info!(library = name, "library deleted");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Library>> {
        self.state.read().libraries.get(name).cloned()
    }

    /// Libraries whose name matches the glob `pattern`, sorted by name.
    pub fn list(&self, pattern: Option<&str>) -> Vec<Arc<Library>> {
        self.state
            .read()
            .libraries
            .values()
            .filter(|library| pattern.map_or(true, |pattern| matches(pattern, &library.name)))
            .cloned()
            .collect()
    }

    pub fn function(&self, library: &str, function: &str) -> Result<Arc<Function>, ScriptError> {
        let state = self.state.read();

        if let Some(found) = state.functions.get(&qualified(library, function)) {
            return Ok(found.clone());
        }

        if state.libraries.contains_key(library) {
            Err(ScriptError::FunctionNotFound {
                library: library.to_string(),
                function: function.to_string(),
            })
        } else {
            Err(ScriptError::LibraryNotFound(library.to_string()))
        }
    }

    /// Runs `library.function` with `keys` and `args` bound.
    ///
    /// The library source is executed again on every call before the function is invoked.
    // TODO: keep a prepared context per library digest instead of re-running the source.
    pub fn call_function(
        &self,
        library: &str,
        function: &str,
        keys: &[String],
        args: &[String],
    ) -> Result<ScriptValue, ScriptError> {
        let found = self.function(library, function)?;
        let source = self
            .get(&found.library)
            .map(|library| library.source.clone())
            .ok_or_else(|| ScriptError::LibraryNotFound(library.to_string()))?;

        let start = Instant::now();
        let mut ctx = self.runtime.open(self.store.clone())?;
        ctx.bind(keys, args)?;
        ctx.run(&source)?;
        let result = ctx.call(&found.name);

        match &result {
            Ok(_) => debug!(library, function, elapsed = ?start.elapsed(), "function finished"),
            Err(err) => warn!(library, function, error = %err, "function failed"),
        }

        result
    }

    /// One line per library: name, engine and digest.
    pub fn dump(&self) -> String {
        self.state
            .read()
            .libraries
            .values()
            .map(|library| {
                format!(
                    "LIBRARY {} ENGINE {} CODE {}\n",
                    library.name, library.engine, library.digest
                )
            })
            .collect()
    }

    pub fn stats(&self) -> Stats {
        let state = self.state.read();
        Stats {
            libraries: state.libraries.len(),
            functions: state.functions.len(),
        }
    }

    pub fn flush(&self) {
        let mut state = self.state.write();
        state.libraries.clear();
        state.functions.clear();

        info!("function libraries flushed");
    }

    fn discover(&self, source: &str) -> Result<Vec<ExportedFunction>, ScriptError> {
        let mut ctx = self.runtime.open(self.store.clone())?;
        ctx.run(source)?;
        ctx.exports()
    }
}

fn parse_shebang(source: &str, engine: &str) -> Result<String, ScriptError> {
    let header = source
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("#!"))
        .ok_or_else(|| ScriptError::InvalidLibrary("Missing library metadata".to_string()))?;

    let mut parts = header.split_whitespace();
    let declared = parts.next().unwrap_or_default();
    if !declared.eq_ignore_ascii_case(engine) {
        return Err(ScriptError::InvalidLibrary(format!(
            "Engine '{}' not found",
            declared
        )));
    }

    let mut name = None;
    for part in parts {
        match part.split_once('=') {
            Some(("name", value)) => name = Some(value.to_string()),
            _ => {
                return Err(ScriptError::InvalidLibrary(format!(
                    "Invalid metadata value given: {}",
                    part
                )))
            }
        }
    }

    name.ok_or_else(|| ScriptError::InvalidLibrary("Library name was not given".to_string()))
}

fn validate_library_name(name: &str) -> Result<(), ScriptError> {
    if name.is_empty() {
        return Err(ScriptError::InvalidLibrary(
            "library name can't be empty".to_string(),
        ));
    }
    if name.contains('.') {
        return Err(ScriptError::InvalidLibrary(format!(
            "library name '{}' can't contain '.'",
            name
        )));
    }
    Ok(())
}

fn matches(pattern: &str, name: &str) -> bool {
    pattern == "*" || glob_match(pattern, name)
}
