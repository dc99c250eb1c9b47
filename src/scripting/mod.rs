//! Server-side scripting: ad-hoc scripts addressed by digest (EVAL, EVALSHA, SCRIPT) and named
//! function libraries (FUNCTION, FCALL).
//!
//! Scripts run to completion on the calling task with no timeout. Each `redis.call` takes the
//! store lock on its own, so other clients may observe and interleave with the intermediate
//! state of a running script. Writes made before a script fails are kept.

pub mod bridge;
pub mod cache;
pub mod engine;
pub mod error;
pub mod lua;
pub mod registry;
pub mod runtime;
pub mod value;

pub use cache::{sha1_hex, ScriptCache};
pub use engine::ScriptEngine;
pub use error::{ErrorKind, ScriptError};
pub use lua::LuaRuntime;
pub use registry::{Function, FunctionRegistry, Library, Stats};
pub use runtime::{ExportedFunction, ScriptContext, ScriptRuntime};
pub use value::ScriptValue;
