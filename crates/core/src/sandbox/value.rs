//! Runtime values of the descriptor interpreter

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::Arc;

use super::stub::Stub;
use crate::syntax::ast::FunctionDef;

/// Glob helper flavours, tagged by a one-character prefix in the pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobKind {
    Plain,
    Recursive,
    Zsh,
}

impl GlobKind {
    pub fn prefix(self) -> char {
        match self {
            GlobKind::Plain => 'g',
            GlobKind::Recursive => 'r',
            GlobKind::Zsh => 'z',
        }
    }
}

/// Natively implemented callables
#[derive(Debug, Clone, PartialEq)]
pub enum Builtin {
    /// Records a target of the given kind
    Target(Arc<str>),
    Glob(GlobKind),
    PantsVersion,
    BuildRoot,
    BuildfilePath,
    Len,
    Str,
    Int,
    Bool,
    List,
    Tuple,
    Dict,
    Sorted,
    Range,
    Set,
    Print,
}

impl Builtin {
    pub fn name(&self) -> &str {
        match self {
            Builtin::Target(kind) => &**kind,
            Builtin::Glob(GlobKind::Plain) => "globs",
            Builtin::Glob(GlobKind::Recursive) => "rglobs",
            Builtin::Glob(GlobKind::Zsh) => "zglobs",
            Builtin::PantsVersion => "pants_version",
            Builtin::BuildRoot => "get_buildroot",
            Builtin::BuildfilePath => "buildfile_path",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Tuple => "tuple",
            Builtin::Dict => "dict",
            Builtin::Sorted => "sorted",
            Builtin::Range => "range",
            Builtin::Set => "set",
            Builtin::Print => "print",
        }
    }
}

/// A descriptor value: either known to the interpreter or an inert stub.
///
/// Every variant except `Unknown` is a known value with real semantics.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Insertion-ordered mapping
    Dict(Vec<(Value, Value)>),
    Builtin(Builtin),
    Function(Arc<FunctionDef>),
    /// A method looked up on a known value, e.g. `'{}-lib'.format`
    Method {
        receiver: Box<Value>,
        name: String,
    },
    Unknown(Stub),
}

impl Value {
    pub fn is_known(&self) -> bool {
        !matches!(self, Value::Unknown(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Builtin(_) => "builtin_function",
            Value::Function(_) => "function",
            Value::Method { .. } => "method",
            Value::Unknown(_) => "Any",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
            Value::Builtin(_) | Value::Function(_) | Value::Method { .. } | Value::Unknown(_) => {
                true
            }
        }
    }

    /// Human-facing rendering, strings without quotes
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Unknown(stub) => stub.to_string(),
            other => other.repr(),
        }
    }

    /// Literal-style rendering, strings quoted
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote(s),
            Value::List(items) => format!("[{}]", join_repr(items)),
            Value::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Value::Tuple(items) => format!("({})", join_repr(items)),
            Value::Dict(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
            Value::Builtin(builtin) => format!("<built-in function {}>", builtin.name()),
            Value::Function(def) => format!("<function {}>", def.name),
            Value::Method { receiver, name } => {
                format!("<method {} of {}>", name, receiver.type_name())
            }
            Value::Unknown(stub) => stub.trace().to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Structural equality between known values
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(k2, v2)| k.equals(k2) && v.equals(v2))
                    })
            }
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Unknown(a), Value::Unknown(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering between comparable known values
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// Elements produced by iterating the value, `None` if it is not iterable
    pub fn iterate(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items.clone()),
            Value::Str(s) => Some(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Dict(entries) => Some(entries.iter().map(|(k, _)| k.clone()).collect()),
            Value::Unknown(stub) => Some(vec![Value::Unknown(stub.iter())]),
            _ => None,
        }
    }

    /// Recursively flattens nested sequences; strings and scalars are leaves
    pub fn elements(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.collect_elements(&mut out);
        out
    }

    fn collect_elements(&self, out: &mut Vec<Value>) {
        match self {
            Value::List(items) | Value::Tuple(items) => {
                for item in items {
                    item.collect_elements(out);
                }
            }
            other => out.push(other.clone()),
        }
    }

    pub fn dict_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Dict(entries) => entries.iter().find(|(k, _)| k.equals(key)).map(|(_, v)| v),
            _ => None,
        }
    }
}

fn join_repr(items: &[Value]) -> String {
    items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr_and_str() {
        let value = Value::List(vec![
            Value::Str("it's".to_string()),
            Value::Int(3),
            Value::Float(2.0),
            Value::None,
            Value::Tuple(vec![Value::Bool(true)]),
        ]);
        assert_eq!(value.repr(), r"['it\'s', 3, 2.0, None, (True,)]");
        assert_eq!(Value::Str("plain".to_string()).to_str(), "plain");
    }

    #[test]
    fn test_elements_flattens_nested_sequences() {
        let nested = Value::List(vec![
            Value::Str("a".to_string()),
            Value::List(vec![Value::Str("b".to_string())]),
            Value::Tuple(vec![Value::Str("c".to_string()), Value::Str("d".to_string())]),
        ]);
        let flat: Vec<String> = nested.elements().iter().map(Value::to_str).collect();
        assert_eq!(flat, vec!["a", "b", "c", "d"]);

        let scalar = Value::Str("solo".to_string());
        assert_eq!(scalar.elements().len(), 1);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Str(String::new()).truthy());
        assert!(!Value::List(Vec::new()).truthy());
        assert!(Value::Unknown(Stub::new("x")).truthy());
        assert!(Value::Int(-1).truthy());
    }

    #[test]
    fn test_mixed_numeric_equality_and_ordering() {
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert_eq!(
            Value::Str("a".to_string()).compare(&Value::Str("b".to_string())),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Str("a".to_string()).compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_glob_builtin_names() {
        assert_eq!(Builtin::Glob(GlobKind::Plain).name(), "globs");
        assert_eq!(Builtin::Glob(GlobKind::Recursive).name(), "rglobs");
        assert_eq!(Builtin::Glob(GlobKind::Zsh).name(), "zglobs");
    }
}
