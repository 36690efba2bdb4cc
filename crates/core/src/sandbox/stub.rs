//! Inert placeholder for descriptor symbols the sandbox does not model

use std::fmt;

use super::value::Value;

/// Stand-in for an unmodeled function, module or constant.
///
/// Every operation applied to a stub (call, attribute access, arithmetic,
/// indexing, iteration) returns a new stub whose trace records the operation.
/// None of them can fail or touch anything outside the trace string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stub {
    trace: String,
}

impl Stub {
    pub fn new(name: impl Into<String>) -> Self {
        Self { trace: name.into() }
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }

    /// `name(arg, key=value)`
    pub fn call(&self, args: &[Value], kwargs: &[(String, Value)]) -> Stub {
        let rendered: Vec<String> = args
            .iter()
            .map(Value::to_str)
            .chain(kwargs.iter().map(|(k, v)| format!("{k}={}", v.repr())))
            .collect();
        Stub::new(format!("{}({})", self.trace, rendered.join(", ")))
    }

    pub fn attr(&self, name: &str) -> Stub {
        Stub::new(format!("{}.{}", self.trace, name))
    }

    /// `stub <op> other`
    pub fn binary(&self, op: &str, other: &Value) -> Stub {
        Stub::new(format!("{} {} {}", self.trace, op, other.repr()))
    }

    /// `other <op> stub`
    pub fn reflected(other: &Value, op: &str, stub: &Stub) -> Stub {
        Stub::new(format!("{} {} {}", other.repr(), op, stub.trace))
    }

    pub fn unary(&self, op: &str) -> Stub {
        Stub::new(format!("{}{}", op, self.trace))
    }

    pub fn index(&self, key: &Value) -> Stub {
        Stub::new(format!("{}[{}]", self.trace, key.repr()))
    }

    /// Iterating a stub yields exactly one element
    pub fn iter(&self) -> Stub {
        Stub::new(format!("{}[]", self.trace))
    }
}

impl fmt::Display for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Any({})", self.trace)
    }
}
