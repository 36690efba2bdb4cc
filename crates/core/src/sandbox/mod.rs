//! Sandboxed execution of descriptor bodies

pub mod env;
pub mod interpreter;
pub mod stub;
pub mod value;

pub use env::{STUB_GLOBALS, Sandbox, TARGET_KINDS};
pub use interpreter::{Interpreter, ParseContext, TargetCall};
pub use stub::Stub;
pub use value::{Builtin, GlobKind, Value};
