//! Tree-walking evaluator for descriptor bodies
//!
//! All per-parse state lives in a [`ParseContext`] owned by the caller for
//! the duration of one parse. The interpreter itself only holds the symbol
//! tables of the file being executed.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::env::Sandbox;
use super::stub::Stub;
use super::value::{Builtin, GlobKind, Value};
use crate::error::ScriptError;
use crate::syntax::ast::{
    Argument, AssignTarget, BinOp, CmpOp, Expr, FunctionDef, Stmt, StmtKind, UnaryOp,
};

const MAX_CALL_DEPTH: usize = 64;
/// Elements of one list, tuple or dict, or bytes of one string
const MAX_SEQUENCE_LEN: usize = 100_000;
/// Total elements plus string bytes reachable from one value
const MAX_VALUE_SIZE: usize = 1_000_000;
const MAX_VALUE_DEPTH: usize = 100;

const STR_METHODS: &[&str] = &[
    "format",
    "join",
    "replace",
    "startswith",
    "endswith",
    "split",
    "strip",
    "lstrip",
    "rstrip",
    "lower",
    "upper",
];
const LIST_METHODS: &[&str] = &["append", "extend", "insert"];
const DICT_METHODS: &[&str] = &["get", "keys", "values", "items", "update"];

type EvalResult<T> = Result<T, ScriptError>;

/// One invocation of a target-kind function
#[derive(Debug, Clone)]
pub struct TargetCall {
    pub kind: String,
    pub kwargs: Vec<(String, Value)>,
    pub line: usize,
}

impl TargetCall {
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        kwarg(&self.kwargs, key)
    }
}

/// State of a single parse: what is being parsed and what it produced
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub buildpath: String,
    pub buildfile: PathBuf,
    pub calls: Vec<TargetCall>,
    pub warnings: Vec<String>,
}

impl ParseContext {
    pub fn new(buildpath: impl Into<String>, buildfile: impl Into<PathBuf>) -> Self {
        Self {
            buildpath: buildpath.into(),
            buildfile: buildfile.into(),
            calls: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

pub struct Interpreter<'a> {
    sandbox: &'a Sandbox,
    context: &'a mut ParseContext,
    globals: HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
    line: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(sandbox: &'a Sandbox, context: &'a mut ParseContext) -> Self {
        Self {
            sandbox,
            context,
            globals: sandbox.scope(),
            frames: Vec::new(),
            line: 0,
        }
    }

    /// Executes a module body in a fresh scope
    pub fn run(
        sandbox: &Sandbox,
        context: &mut ParseContext,
        module: &[Stmt],
    ) -> Result<(), ScriptError> {
        Interpreter::new(sandbox, context).execute(module)
    }

    pub fn execute(&mut self, module: &[Stmt]) -> Result<(), ScriptError> {
        match self.exec_block(module)? {
            Flow::Normal => Ok(()),
            Flow::Return(_) => Err(self.fault("'return' outside function")),
            Flow::Break | Flow::Continue => Err(self.fault("'break' or 'continue' outside loop")),
        }
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    fn fault(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::eval(self.line, message)
    }

    /// Size of `value` in elements plus string bytes, failing once it
    /// crosses the sequence, size or nesting bounds
    fn measure(&self, value: &Value) -> EvalResult<usize> {
        let mut total = 0usize;
        let mut pending = vec![(value, 1usize)];
        while let Some((current, depth)) = pending.pop() {
            if depth > MAX_VALUE_DEPTH {
                return Err(self.fault("value is nested too deeply"));
            }
            let size = match current {
                Value::Str(s) => s.len().max(1),
                Value::Unknown(stub) => stub.trace().len().max(1),
                Value::List(items) | Value::Tuple(items) => items.len() + 1,
                Value::Dict(entries) => entries.len() + 1,
                _ => 1,
            };
            if size > MAX_SEQUENCE_LEN + 1 {
                return Err(self.fault(format!(
                    "{} of length {} exceeds the size limit",
                    current.type_name(),
                    size - 1
                )));
            }
            total += size;
            if total > MAX_VALUE_SIZE {
                return Err(self.fault("value exceeds the size limit"));
            }
            match current {
                Value::List(items) | Value::Tuple(items) => {
                    pending.extend(items.iter().map(|item| (item, depth + 1)));
                }
                Value::Dict(entries) => {
                    for (key, item) in entries {
                        pending.push((key, depth + 1));
                        pending.push((item, depth + 1));
                    }
                }
                Value::Method { receiver, .. } => pending.push((receiver.as_ref(), depth + 1)),
                _ => {}
            }
        }
        Ok(total)
    }

    fn bounded(&self, value: Value) -> EvalResult<Value> {
        self.measure(&value)?;
        Ok(value)
    }

    /// Re-checks a variable after an in-place update
    fn check_stored(&self, name: &str) -> EvalResult<()> {
        let stored = self
            .frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.globals.get(name));
        match stored {
            Some(value) => self.measure(value).map(|_| ()),
            None => Ok(()),
        }
    }

    fn float_to_int(&self, f: f64) -> EvalResult<i64> {
        let truncated = f.trunc();
        // i64::MIN is exactly representable, i64::MAX is not
        if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < -(i64::MIN as f64) {
            Ok(truncated as i64)
        } else if f.is_nan() {
            Err(self.fault("cannot convert float NaN to integer"))
        } else {
            Err(self.fault("integer overflow"))
        }
    }

    fn warn(&mut self, message: String) {
        warn!(buildpath = %self.context.buildpath, line = self.line, "{message}");
        let message = format!("line {}: {}", self.line, message);
        if !self.context.warnings.contains(&message) {
            self.context.warnings.push(message);
        }
    }

    // Scopes

    fn current_scope_mut(&mut self) -> &mut HashMap<String, Value> {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.globals,
        }
    }

    fn store(&mut self, name: &str, value: Value) {
        self.current_scope_mut().insert(name.to_string(), value);
    }

    fn lookup(&mut self, name: &str) -> Value {
        if let Some(value) = self.frames.last().and_then(|frame| frame.get(name)) {
            return value.clone();
        }
        if let Some(value) = self.globals.get(name) {
            return value.clone();
        }
        self.warn(format!("undefined name '{name}' treated as a stub"));
        Value::Unknown(Stub::new(name))
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Value> {
        if let Some(frame) = self.frames.last_mut() {
            if frame.contains_key(name) {
                return frame.get_mut(name);
            }
        }
        self.globals.get_mut(name)
    }

    // Statements

    fn exec_block(&mut self, body: &[Stmt]) -> EvalResult<Flow> {
        for stmt in body {
            self.line = stmt.line;
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value)?;
            }
            StmtKind::AugAssign { name, op, value } => {
                let current = self.lookup(name);
                let rhs = self.eval(value)?;
                let updated = self.bounded(self.binary(*op, current, rhs)?)?;
                self.store(name, updated);
            }
            StmtKind::Import(bindings) => {
                for (bound, path) in bindings {
                    debug!(buildpath = %self.context.buildpath, module = %path, "import bound to stub");
                    self.store(bound, Value::Unknown(Stub::new(path.as_str())));
                }
            }
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    if self.eval(condition)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                return self.exec_block(otherwise);
            }
            StmtKind::For {
                targets,
                iter,
                body,
            } => {
                let source = self.eval(iter)?;
                for item in self.iterable(&source)? {
                    self.bind_targets(targets, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                }
            }
            StmtKind::Def(def) => {
                self.store(&def.name, Value::Function(def.clone()));
            }
            StmtKind::Return(value) => {
                if self.frames.is_empty() {
                    return Err(self.fault("'return' outside function"));
                }
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &AssignTarget, value: Value) -> EvalResult<()> {
        match target {
            AssignTarget::Name(name) => {
                self.store(name, value);
                Ok(())
            }
            AssignTarget::Unpack(names) => self.unpack(names, value),
            AssignTarget::Other(Expr::Subscript { object, index }) => {
                let key = self.eval(index)?;
                if let Expr::Name(name) = object.as_ref() {
                    return self.assign_item(name, key, value);
                }
                match self.eval(object)? {
                    Value::Unknown(_) => Ok(()),
                    other => Err(self.fault(format!(
                        "item assignment on a temporary '{}' is not supported",
                        other.type_name()
                    ))),
                }
            }
            AssignTarget::Other(Expr::Attribute { object, name }) => match self.eval(object)? {
                Value::Unknown(_) => Ok(()),
                other => Err(self.fault(format!(
                    "'{}' object has no writable attribute '{}'",
                    other.type_name(),
                    name
                ))),
            },
            AssignTarget::Other(_) => Err(self.fault("cannot assign to expression")),
        }
    }

    fn assign_item(&mut self, name: &str, key: Value, value: Value) -> EvalResult<()> {
        let line = self.line;
        let Some(slot) = self.slot_mut(name) else {
            self.warn(format!("item assignment to undefined name '{name}' ignored"));
            return Ok(());
        };
        let assigned = match slot {
            Value::Dict(entries) => {
                dict_insert(entries, key, value);
                Ok(())
            }
            Value::List(items) => match key {
                Value::Int(index) => {
                    let at = normalize_index(index, items.len())
                        .ok_or_else(|| ScriptError::eval(line, "list assignment index out of range"))?;
                    items[at] = value;
                    Ok(())
                }
                Value::Unknown(_) => Ok(()),
                other => Err(ScriptError::eval(
                    line,
                    format!("list indices must be integers, not '{}'", other.type_name()),
                )),
            },
            Value::Unknown(_) => Ok(()),
            other => Err(ScriptError::eval(
                line,
                format!("'{}' object does not support item assignment", other.type_name()),
            )),
        };
        assigned?;
        self.check_stored(name)
    }

    fn bind_targets(&mut self, targets: &[String], item: Value) -> EvalResult<()> {
        match targets {
            [single] => {
                self.store(single, item);
                Ok(())
            }
            names => self.unpack(names, item),
        }
    }

    fn unpack(&mut self, names: &[String], value: Value) -> EvalResult<()> {
        if let Value::Unknown(stub) = &value {
            for (i, name) in names.iter().enumerate() {
                self.store(name, Value::Unknown(stub.index(&Value::Int(i as i64))));
            }
            return Ok(());
        }
        let items = self.iterable(&value)?;
        if items.len() != names.len() {
            return Err(self.fault(format!(
                "expected {} values to unpack, got {}",
                names.len(),
                items.len()
            )));
        }
        for (name, item) in names.iter().zip(items) {
            self.store(name, item);
        }
        Ok(())
    }

    fn iterable(&self, value: &Value) -> EvalResult<Vec<Value>> {
        value
            .iterate()
            .ok_or_else(|| self.fault(format!("'{}' object is not iterable", value.type_name())))
    }

    // Expressions

    /// Evaluates `expr`; every value it builds is size-checked
    fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        let value = self.evaluate(expr)?;
        match expr {
            Expr::None
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Name(_) => Ok(value),
            _ => self.bounded(value),
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Name(name) => Ok(self.lookup(name)),
            Expr::List(items) => Ok(Value::List(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            Expr::Dict(pairs) => {
                let mut entries = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    dict_insert(&mut entries, key, value);
                }
                Ok(Value::Dict(entries))
            }
            Expr::ListComp {
                element,
                targets,
                iter,
                condition,
            } => {
                let source = self.eval(iter)?;
                let items = self.iterable(&source)?;
                let saved: Vec<(String, Option<Value>)> = targets
                    .iter()
                    .map(|name| (name.clone(), self.current_scope_mut().get(name).cloned()))
                    .collect();
                let result = self.comprehend(element, targets, condition.as_deref(), items);
                for (name, previous) in saved {
                    match previous {
                        Some(value) => self.store(&name, value),
                        None => {
                            self.current_scope_mut().remove(&name);
                        }
                    }
                }
                result
            }
            Expr::Call { func, args } => {
                if let Some((receiver, method)) = mutation_target(func) {
                    let (args, kwargs) = self.eval_arguments(args)?;
                    if let Some(result) = self.mutate_in_place(receiver, method, &args, &kwargs)? {
                        return Ok(result);
                    }
                    let callee = self.eval(func)?;
                    return self.call(callee, args, kwargs);
                }
                let callee = self.eval(func)?;
                let (args, kwargs) = self.eval_arguments(args)?;
                self.call(callee, args, kwargs)
            }
            Expr::Attribute { object, name } => {
                let object = self.eval(object)?;
                Ok(self.attribute(object, name))
            }
            Expr::Subscript { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                self.subscript(object, index)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, left, right)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                self.unary(*op, operand)
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.compare(*op, left, right)
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.truthy() { self.eval(right) } else { Ok(left) }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.truthy() { Ok(left) } else { self.eval(right) }
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn eval_all(&mut self, items: &[Expr]) -> EvalResult<Vec<Value>> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    fn comprehend(
        &mut self,
        element: &Expr,
        targets: &[String],
        condition: Option<&Expr>,
        items: Vec<Value>,
    ) -> EvalResult<Value> {
        let mut out = Vec::new();
        let mut size = 0usize;
        for item in items {
            self.bind_targets(targets, item)?;
            if let Some(condition) = condition {
                if !self.eval(condition)?.truthy() {
                    continue;
                }
            }
            let value = self.eval(element)?;
            size += self.measure(&value)?;
            if size > MAX_VALUE_SIZE || out.len() >= MAX_SEQUENCE_LEN {
                return Err(self.fault("list comprehension exceeds the size limit"));
            }
            out.push(value);
        }
        Ok(Value::List(out))
    }

    fn eval_arguments(
        &mut self,
        arguments: &[Argument],
    ) -> EvalResult<(Vec<Value>, Vec<(String, Value)>)> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Value)> = Vec::new();
        for argument in arguments {
            match argument {
                Argument::Positional(expr) => args.push(self.eval(expr)?),
                Argument::Keyword(key, expr) => {
                    let value = self.eval(expr)?;
                    set_kwarg(&mut kwargs, key, value);
                }
                Argument::Splat(expr) => {
                    let value = self.eval(expr)?;
                    args.extend(self.iterable(&value)?);
                }
                Argument::KwSplat(expr) => match self.eval(expr)? {
                    Value::Dict(entries) => {
                        for (key, value) in entries {
                            let Value::Str(key) = key else {
                                return Err(self.fault("keywords must be strings"));
                            };
                            set_kwarg(&mut kwargs, &key, value);
                        }
                    }
                    Value::Unknown(stub) => {
                        self.warn(format!("keyword arguments from '{}' ignored", stub.trace()));
                    }
                    other => {
                        return Err(self.fault(format!(
                            "argument after ** must be a mapping, not '{}'",
                            other.type_name()
                        )));
                    }
                },
            }
        }
        Ok((args, kwargs))
    }

    // Calls

    fn call(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        match callee {
            Value::Unknown(stub) => Ok(Value::Unknown(stub.call(&args, &kwargs))),
            Value::Builtin(builtin) => self.call_builtin(&builtin, args, kwargs),
            Value::Function(def) => self.call_function(&def, args, kwargs),
            Value::Method { receiver, name } => self.call_method(*receiver, &name, args, kwargs),
            other => Err(self.fault(format!("'{}' object is not callable", other.type_name()))),
        }
    }

    fn call_function(
        &mut self,
        def: &FunctionDef,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(self.fault("maximum recursion depth exceeded"));
        }
        if args.len() > def.params.len() {
            return Err(self.fault(format!(
                "{}() takes {} positional arguments but {} were given",
                def.name,
                def.params.len(),
                args.len()
            )));
        }
        if let Some((key, _)) = kwargs
            .iter()
            .find(|(key, _)| !def.params.iter().any(|param| &param.name == key))
        {
            return Err(self.fault(format!(
                "{}() got an unexpected keyword argument '{}'",
                def.name, key
            )));
        }

        let mut frame = HashMap::new();
        let mut positional = args.into_iter();
        for param in &def.params {
            let keyword = kwarg(&kwargs, &param.name);
            let value = match (positional.next(), keyword) {
                (Some(_), Some(_)) => {
                    return Err(self.fault(format!(
                        "{}() got multiple values for argument '{}'",
                        def.name, param.name
                    )));
                }
                (Some(value), None) => value,
                (None, Some(value)) => value.clone(),
                (None, None) => match &param.default {
                    Some(default) => self.eval(default)?,
                    None => {
                        return Err(self.fault(format!(
                            "{}() missing required argument '{}'",
                            def.name, param.name
                        )));
                    }
                },
            };
            frame.insert(param.name.clone(), value);
        }

        let line = self.line;
        self.frames.push(frame);
        let outcome = self.exec_block(&def.body);
        self.frames.pop();
        self.line = line;

        match outcome? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::None),
            Flow::Break | Flow::Continue => Err(self.fault("'break' or 'continue' outside loop")),
        }
    }

    fn call_builtin(
        &mut self,
        builtin: &Builtin,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        let has_stub = args
            .iter()
            .chain(kwargs.iter().map(|(_, value)| value))
            .any(|value| !value.is_known());

        match builtin {
            Builtin::Target(kind) => self.record_target(kind, args, kwargs),
            Builtin::Glob(kind) => self.glob(*kind, &args, &kwargs),
            Builtin::Print => {
                let rendered: Vec<String> = args.iter().map(Value::to_str).collect();
                debug!(buildpath = %self.context.buildpath, "print: {}", rendered.join(" "));
                Ok(Value::None)
            }
            Builtin::Str => match args.as_slice() {
                [] => Ok(Value::Str(String::new())),
                [value] => Ok(Value::Str(value.to_str())),
                _ => Err(self.fault("str() takes at most 1 argument")),
            },
            _ if has_stub => Ok(Value::Unknown(Stub::new(builtin.name()).call(&args, &kwargs))),
            Builtin::PantsVersion => Ok(Value::Int(self.sandbox.interpreter_version())),
            Builtin::BuildRoot => Ok(Value::Str(
                self.sandbox.root().to_string_lossy().into_owned(),
            )),
            Builtin::BuildfilePath => Ok(Value::Str(
                self.context.buildfile.to_string_lossy().into_owned(),
            )),
            Builtin::Len => {
                let [value] = args.as_slice() else {
                    return Err(self.fault("len() takes exactly one argument"));
                };
                let len = match value {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) | Value::Tuple(items) => items.len(),
                    Value::Dict(entries) => entries.len(),
                    other => {
                        return Err(self.fault(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )));
                    }
                };
                Ok(Value::Int(len as i64))
            }
            Builtin::Int => self.to_int(&args),
            Builtin::Bool => Ok(Value::Bool(args.first().is_some_and(Value::truthy))),
            Builtin::List => Ok(Value::List(self.sequence_argument("list", &args)?)),
            Builtin::Tuple => Ok(Value::Tuple(self.sequence_argument("tuple", &args)?)),
            Builtin::Set => {
                let mut unique: Vec<Value> = Vec::new();
                for item in self.sequence_argument("set", &args)? {
                    if !unique.iter().any(|seen| seen.equals(&item)) {
                        unique.push(item);
                    }
                }
                Ok(Value::List(unique))
            }
            Builtin::Dict => self.build_dict(&args, &kwargs),
            Builtin::Sorted => self.sorted(&args, &kwargs),
            Builtin::Range => self.range(&args),
        }
    }

    fn record_target(
        &mut self,
        kind: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        if !args.is_empty() {
            self.warn(format!(
                "{kind}() ignores {} positional argument(s)",
                args.len()
            ));
        }
        debug!(buildpath = %self.context.buildpath, kind, line = self.line, "target declared");
        self.context.calls.push(TargetCall {
            kind: kind.to_string(),
            kwargs,
            line: self.line,
        });
        Ok(Value::None)
    }

    /// `|<prefix>|<pattern>` for each pattern, then each exclude element
    /// suffixed with `-`
    fn glob(
        &mut self,
        kind: GlobKind,
        args: &[Value],
        kwargs: &[(String, Value)],
    ) -> EvalResult<Value> {
        let mut patterns: Vec<Value> = args
            .iter()
            .map(|pattern| Value::Str(format!("|{}|{}", kind.prefix(), pattern.to_str())))
            .collect();
        if let Some(exclude) = kwarg(kwargs, "exclude") {
            for element in exclude.elements() {
                if matches!(element, Value::None) {
                    continue;
                }
                patterns.push(self.binary(BinOp::Add, element, Value::Str("-".to_string()))?);
            }
        }
        Ok(Value::List(patterns))
    }

    fn to_int(&self, args: &[Value]) -> EvalResult<Value> {
        match args {
            [] => Ok(Value::Int(0)),
            [Value::Int(n)] => Ok(Value::Int(*n)),
            [Value::Bool(b)] => Ok(Value::Int(i64::from(*b))),
            [Value::Float(f)] => self.float_to_int(*f).map(Value::Int),
            [Value::Str(s)] => s.trim().replace('_', "").parse::<i64>().map(Value::Int).map_err(|_| {
                self.fault(format!(
                    "invalid literal for int() with base 10: {}",
                    Value::Str(s.clone()).repr()
                ))
            }),
            [other] => Err(self.fault(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
            _ => Err(self.fault("int() takes at most 1 argument")),
        }
    }

    fn sequence_argument(&self, name: &str, args: &[Value]) -> EvalResult<Vec<Value>> {
        match args {
            [] => Ok(Vec::new()),
            [value] => self.iterable(value),
            _ => Err(self.fault(format!("{name}() takes at most 1 argument"))),
        }
    }

    fn build_dict(&self, args: &[Value], kwargs: &[(String, Value)]) -> EvalResult<Value> {
        let mut entries = Vec::new();
        match args {
            [] => {}
            [Value::Dict(existing)] => entries = existing.clone(),
            [pairs] => {
                for item in self.iterable(pairs)? {
                    match item.iterate().as_deref() {
                        Some([key, value]) => dict_insert(&mut entries, key.clone(), value.clone()),
                        _ => {
                            return Err(self.fault(
                                "dictionary update sequence element must be a pair",
                            ));
                        }
                    }
                }
            }
            _ => return Err(self.fault("dict() takes at most 1 positional argument")),
        }
        for (key, value) in kwargs {
            dict_insert(&mut entries, Value::Str(key.clone()), value.clone());
        }
        Ok(Value::Dict(entries))
    }

    fn sorted(&self, args: &[Value], kwargs: &[(String, Value)]) -> EvalResult<Value> {
        let [source] = args else {
            return Err(self.fault("sorted() takes exactly one positional argument"));
        };
        if let Some((key, _)) = kwargs.iter().find(|(key, _)| key != "reverse") {
            return Err(self.fault(format!("sorted() got an unexpected keyword argument '{key}'")));
        }
        let mut items = self.iterable(source)?;
        let mut incomparable = None;
        items.sort_by(|a, b| {
            a.compare(b).unwrap_or_else(|| {
                if incomparable.is_none() {
                    incomparable = Some((a.type_name(), b.type_name()));
                }
                Ordering::Equal
            })
        });
        if let Some((a, b)) = incomparable {
            return Err(self.fault(format!(
                "'<' not supported between instances of '{a}' and '{b}'"
            )));
        }
        if kwarg(kwargs, "reverse").is_some_and(Value::truthy) {
            items.reverse();
        }
        Ok(Value::List(items))
    }

    fn range(&self, args: &[Value]) -> EvalResult<Value> {
        let mut bounds = Vec::with_capacity(args.len());
        for arg in args {
            match Number::of(arg) {
                Some(Number::Int(n)) => bounds.push(n),
                _ => {
                    return Err(self.fault(format!(
                        "range() expects integers, got '{}'",
                        arg.type_name()
                    )));
                }
            }
        }
        let (start, stop, step) = match bounds.as_slice() {
            [stop] => (0, *stop, 1),
            [start, stop] => (*start, *stop, 1),
            [start, stop, step] => (*start, *stop, *step),
            _ => return Err(self.fault("range() takes 1 to 3 arguments")),
        };
        if step == 0 {
            return Err(self.fault("range() arg 3 must not be zero"));
        }
        let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
        let len = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && start > stop {
            (start - stop - 1) / -step + 1
        } else {
            0
        };
        if len > MAX_SEQUENCE_LEN as i128 {
            return Err(self.fault(format!("range() of {len} elements exceeds the size limit")));
        }
        let items = (0..len)
            .map(|i| Value::Int((start + i * step) as i64))
            .collect();
        Ok(Value::List(items))
    }

    fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> EvalResult<Value> {
        let has_stub = args
            .iter()
            .chain(kwargs.iter().map(|(_, value)| value))
            .any(|value| !value.is_known());
        if has_stub && name != "format" && name != "join" {
            return Ok(method_stub(&receiver, name, &args, &kwargs));
        }

        match (&receiver, name) {
            (Value::Str(s), "format") => Ok(Value::Str(self.format_string(s, &args, &kwargs)?)),
            (Value::Str(s), "join") => self.join(s, &args),
            (Value::Str(s), "replace") => {
                let (old, new, limit) = match args.as_slice() {
                    [Value::Str(old), Value::Str(new)] => (old, new, None),
                    [Value::Str(old), Value::Str(new), Value::Int(count)] => {
                        (old, new, usize::try_from(*count).ok())
                    }
                    _ => return Err(self.fault("replace() expects two strings and an optional count")),
                };
                let mut hits = if old.is_empty() {
                    s.chars().count() + 1
                } else {
                    s.matches(old.as_str()).count()
                };
                if let Some(limit) = limit {
                    hits = hits.min(limit);
                }
                let grown = hits.saturating_mul(new.len().saturating_sub(old.len()));
                if s.len().saturating_add(grown) > MAX_SEQUENCE_LEN {
                    return Err(self.fault("replace() result exceeds the size limit"));
                }
                Ok(Value::Str(match limit {
                    Some(limit) => s.replacen(old.as_str(), new, limit),
                    None => s.replace(old.as_str(), new),
                }))
            }
            (Value::Str(s), "startswith" | "endswith") => {
                let [pattern] = args.as_slice() else {
                    return Err(self.fault(format!("{name}() takes exactly one argument")));
                };
                let candidates: Vec<&str> = match pattern {
                    Value::Str(p) => vec![p.as_str()],
                    Value::Tuple(items) => items.iter().filter_map(Value::as_str).collect(),
                    other => {
                        return Err(self.fault(format!(
                            "{name}() argument must be str or a tuple of str, not '{}'",
                            other.type_name()
                        )));
                    }
                };
                let hit = candidates.iter().any(|p| {
                    if name == "startswith" { s.starts_with(p) } else { s.ends_with(p) }
                });
                Ok(Value::Bool(hit))
            }
            (Value::Str(s), "split") => self.split(s, &args, &kwargs),
            (Value::Str(s), "strip" | "lstrip" | "rstrip") => {
                let chars = match args.first() {
                    None | Some(Value::None) => None,
                    Some(Value::Str(chars)) => Some(chars.clone()),
                    Some(other) => {
                        return Err(self.fault(format!(
                            "{name} arg must be None or str, not '{}'",
                            other.type_name()
                        )));
                    }
                };
                let stripped = match (name, chars) {
                    ("strip", None) => s.trim(),
                    ("lstrip", None) => s.trim_start(),
                    (_, None) => s.trim_end(),
                    ("strip", Some(chars)) => s.trim_matches(|c| chars.contains(c)),
                    ("lstrip", Some(chars)) => s.trim_start_matches(|c| chars.contains(c)),
                    (_, Some(chars)) => s.trim_end_matches(|c| chars.contains(c)),
                };
                Ok(Value::Str(stripped.to_string()))
            }
            (Value::Str(s), "lower") => Ok(Value::Str(s.to_lowercase())),
            (Value::Str(s), "upper") => Ok(Value::Str(s.to_uppercase())),
            // Mutating a temporary has no observable effect
            (Value::List(_), "append" | "extend" | "insert") | (Value::Dict(_), "update") => {
                Ok(Value::None)
            }
            (Value::Dict(entries), "get") => match args.as_slice() {
                [key] => Ok(lookup_entry(entries, key).cloned().unwrap_or(Value::None)),
                [key, default] => Ok(lookup_entry(entries, key).cloned().unwrap_or_else(|| default.clone())),
                _ => Err(self.fault("get() takes one or two arguments")),
            },
            (Value::Dict(entries), "keys") => {
                Ok(Value::List(entries.iter().map(|(k, _)| k.clone()).collect()))
            }
            (Value::Dict(entries), "values") => {
                Ok(Value::List(entries.iter().map(|(_, v)| v.clone()).collect()))
            }
            (Value::Dict(entries), "items") => Ok(Value::List(
                entries
                    .iter()
                    .map(|(k, v)| Value::Tuple(vec![k.clone(), v.clone()]))
                    .collect(),
            )),
            _ => Ok(method_stub(&receiver, name, &args, &kwargs)),
        }
    }

    /// In-place `list.append/extend/insert` and `dict.update` on a named
    /// variable. Returns `None` when the call is not an in-place mutation.
    fn mutate_in_place(
        &mut self,
        name: &str,
        method: &str,
        args: &[Value],
        kwargs: &[(String, Value)],
    ) -> EvalResult<Option<Value>> {
        let line = self.line;
        let Some(slot) = self.slot_mut(name) else {
            return Ok(None);
        };
        match (slot, method) {
            (Value::List(items), "append") => {
                let [item] = args else {
                    return Err(ScriptError::eval(line, "append() takes exactly one argument"));
                };
                items.push(item.clone());
            }
            (Value::List(items), "extend") => {
                let [source] = args else {
                    return Err(ScriptError::eval(line, "extend() takes exactly one argument"));
                };
                let extra = source.iterate().ok_or_else(|| {
                    ScriptError::eval(
                        line,
                        format!("'{}' object is not iterable", source.type_name()),
                    )
                })?;
                items.extend(extra);
            }
            (Value::List(items), "insert") => match args {
                [Value::Int(index), item] => {
                    let len = items.len() as i64;
                    let at = if *index < 0 { (len + index).max(0) } else { (*index).min(len) };
                    items.insert(at as usize, item.clone());
                }
                [Value::Unknown(_), _] => return Ok(None),
                _ => {
                    return Err(ScriptError::eval(line, "insert() expects an integer index and a value"));
                }
            },
            (Value::Dict(entries), "update") => {
                let mut updates = Vec::new();
                match args {
                    [] => {}
                    [Value::Dict(other)] => updates.extend(other.iter().cloned()),
                    [Value::Unknown(_)] => return Ok(None),
                    [other] => {
                        return Err(ScriptError::eval(
                            line,
                            format!("cannot update dict from '{}'", other.type_name()),
                        ));
                    }
                    _ => {
                        return Err(ScriptError::eval(line, "update() takes at most 1 positional argument"));
                    }
                }
                updates.extend(kwargs.iter().map(|(k, v)| (Value::Str(k.clone()), v.clone())));
                for (key, value) in updates {
                    dict_insert(entries, key, value);
                }
            }
            _ => return Ok(None),
        }
        self.check_stored(name)?;
        Ok(Some(Value::None))
    }

    // Operators

    fn attribute(&mut self, object: Value, name: &str) -> Value {
        if let Value::Unknown(stub) = &object {
            return Value::Unknown(stub.attr(name));
        }
        let is_method = match &object {
            Value::Str(_) => STR_METHODS.contains(&name),
            Value::List(_) => LIST_METHODS.contains(&name),
            Value::Dict(_) => DICT_METHODS.contains(&name),
            _ => false,
        };
        if is_method {
            return Value::Method {
                receiver: Box::new(object),
                name: name.to_string(),
            };
        }
        self.warn(format!(
            "unknown attribute '{name}' on '{}' treated as a stub",
            object.type_name()
        ));
        Value::Unknown(Stub::new(object.repr()).attr(name))
    }

    fn subscript(&self, object: Value, index: Value) -> EvalResult<Value> {
        match (object, index) {
            (Value::Unknown(stub), index) => Ok(Value::Unknown(stub.index(&index))),
            (object, Value::Unknown(stub)) => Ok(Value::Unknown(
                Stub::new(object.repr()).index(&Value::Unknown(stub)),
            )),
            (Value::List(items) | Value::Tuple(items), Value::Int(i)) => normalize_index(i, items.len())
                .and_then(|at| items.get(at).cloned())
                .ok_or_else(|| self.fault("index out of range")),
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                normalize_index(i, chars.len())
                    .map(|at| Value::Str(chars[at].to_string()))
                    .ok_or_else(|| self.fault("string index out of range"))
            }
            (Value::Dict(entries), key) => lookup_entry(&entries, &key)
                .cloned()
                .ok_or_else(|| self.fault(format!("key {} not found", key.repr()))),
            (object @ (Value::List(_) | Value::Tuple(_) | Value::Str(_)), index) => {
                Err(self.fault(format!(
                    "{} indices must be integers, not '{}'",
                    object.type_name(),
                    index.type_name()
                )))
            }
            (object, _) => Err(self.fault(format!(
                "'{}' object is not subscriptable",
                object.type_name()
            ))),
        }
    }

    fn binary(&self, op: BinOp, left: Value, right: Value) -> EvalResult<Value> {
        let symbol = op.symbol();
        match (left, right) {
            (Value::Unknown(stub), right) => Ok(Value::Unknown(stub.binary(symbol, &right))),
            (left, Value::Unknown(stub)) => Ok(Value::Unknown(Stub::reflected(&left, symbol, &stub))),
            (Value::Str(a), Value::Str(b)) if op == BinOp::Add => Ok(Value::Str(a + &b)),
            (Value::List(mut a), Value::List(b)) if op == BinOp::Add => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (Value::Tuple(mut a), Value::Tuple(b)) if op == BinOp::Add => {
                a.extend(b);
                Ok(Value::Tuple(a))
            }
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) if op == BinOp::Mul => {
                let count = self.repeat_count(s.len(), n)?;
                Ok(Value::Str(s.repeat(count)))
            }
            (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items))
                if op == BinOp::Mul =>
            {
                let count = self.repeat_count(items.len(), n)?;
                Ok(Value::List(repeat_items(&items, count)))
            }
            (Value::Str(template), operand) if op == BinOp::Mod => {
                Ok(Value::Str(self.percent_format(&template, &operand)?))
            }
            (left, right) => match (Number::of(&left), Number::of(&right)) {
                (Some(a), Some(b)) => self.arithmetic(op, a, b),
                _ => Err(self.fault(format!(
                    "unsupported operand type(s) for {symbol}: '{}' and '{}'",
                    left.type_name(),
                    right.type_name()
                ))),
            },
        }
    }

    fn arithmetic(&self, op: BinOp, a: Number, b: Number) -> EvalResult<Value> {
        if let (Number::Int(x), Number::Int(y)) = (a, b) {
            if y == 0 && matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) {
                return Err(self.fault("integer division or modulo by zero"));
            }
            let result = match op {
                BinOp::Add => x.checked_add(y),
                BinOp::Sub => x.checked_sub(y),
                BinOp::Mul => x.checked_mul(y),
                BinOp::Div => return Ok(Value::Float(x as f64 / y as f64)),
                BinOp::FloorDiv => x.checked_div(y).map(|q| {
                    if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q }
                }),
                BinOp::Mod => x.checked_rem(y).map(|r| {
                    if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }
                }),
            };
            return result
                .map(Value::Int)
                .ok_or_else(|| self.fault("integer overflow"));
        }

        let (x, y) = (a.as_f64(), b.as_f64());
        if y == 0.0 && matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) {
            return Err(self.fault("float division by zero"));
        }
        let result = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div => x / y,
            BinOp::FloorDiv => (x / y).floor(),
            BinOp::Mod => {
                let r = x % y;
                if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }
            }
        };
        Ok(Value::Float(result))
    }

    fn repeat_count(&self, unit: usize, times: i64) -> EvalResult<usize> {
        if times <= 0 {
            return Ok(0);
        }
        let times = times as usize;
        if unit.saturating_mul(times) > MAX_SEQUENCE_LEN {
            return Err(self.fault("repetition exceeds the size limit"));
        }
        Ok(times)
    }

    fn unary(&self, op: UnaryOp, operand: Value) -> EvalResult<Value> {
        let symbol = match op {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "not ",
        };
        match (op, operand) {
            (UnaryOp::Not, value) => Ok(Value::Bool(!value.truthy())),
            (_, Value::Unknown(stub)) => Ok(Value::Unknown(stub.unary(symbol))),
            (UnaryOp::Neg, Value::Int(n)) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| self.fault("integer overflow")),
            (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(b))),
            (UnaryOp::Pos, value @ (Value::Int(_) | Value::Float(_))) => Ok(value),
            (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
            (_, value) => Err(self.fault(format!(
                "bad operand type for unary {symbol}: '{}'",
                value.type_name()
            ))),
        }
    }

    /// Equality and identity are decided even for stubs; ordering and
    /// membership with a stub operand produce a stub.
    fn compare(&self, op: CmpOp, left: Value, right: Value) -> EvalResult<Value> {
        let symbol = match op {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        };
        if !matches!(op, CmpOp::Eq | CmpOp::NotEq | CmpOp::Is | CmpOp::IsNot) {
            if let Value::Unknown(stub) = &left {
                return Ok(Value::Unknown(stub.binary(symbol, &right)));
            }
            if let Value::Unknown(stub) = &right {
                return Ok(Value::Unknown(Stub::reflected(&left, symbol, stub)));
            }
        }

        let result = match op {
            CmpOp::Eq | CmpOp::Is => left.equals(&right),
            CmpOp::NotEq | CmpOp::IsNot => !left.equals(&right),
            CmpOp::In => self.contains(&right, &left)?,
            CmpOp::NotIn => !self.contains(&right, &left)?,
            CmpOp::Lt | CmpOp::LtEq | CmpOp::Gt | CmpOp::GtEq => {
                let ordering = left.compare(&right).ok_or_else(|| {
                    self.fault(format!(
                        "'{symbol}' not supported between instances of '{}' and '{}'",
                        left.type_name(),
                        right.type_name()
                    ))
                })?;
                match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::LtEq => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }
            }
        };
        Ok(Value::Bool(result))
    }

    fn contains(&self, container: &Value, item: &Value) -> EvalResult<bool> {
        match container {
            Value::Str(haystack) => match item {
                Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
                other => Err(self.fault(format!(
                    "'in <string>' requires string as left operand, not '{}'",
                    other.type_name()
                ))),
            },
            Value::List(items) | Value::Tuple(items) => Ok(items.iter().any(|x| x.equals(item))),
            Value::Dict(entries) => Ok(entries.iter().any(|(k, _)| k.equals(item))),
            other => Err(self.fault(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    // String formatting

    fn format_string(
        &self,
        template: &str,
        args: &[Value],
        kwargs: &[(String, Value)],
    ) -> EvalResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();
        let mut next_auto = 0usize;
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => field.push(ch),
                            None => return Err(self.fault("single '{' encountered in format string")),
                        }
                    }
                    let key = field.split([':', '!']).next().unwrap_or_default();
                    let value = if key.is_empty() {
                        next_auto += 1;
                        args.get(next_auto - 1)
                    } else if let Ok(position) = key.parse::<usize>() {
                        args.get(position)
                    } else {
                        kwarg(kwargs, key)
                    };
                    let value = value.ok_or_else(|| {
                        self.fault(format!("format field '{{{field}}}' has no matching argument"))
                    })?;
                    if field.contains("!r") {
                        out.push_str(&value.repr());
                    } else {
                        out.push_str(&value.to_str());
                    }
                    if out.len() > MAX_SEQUENCE_LEN {
                        return Err(self.fault("format() result exceeds the size limit"));
                    }
                }
                '}' => return Err(self.fault("single '}' encountered in format string")),
                c => out.push(c),
            }
        }
        Ok(out)
    }

    /// `'%s-%d' % (a, b)` with the `s`, `r`, `d`, `i` and `%` conversions
    fn percent_format(&self, template: &str, operand: &Value) -> EvalResult<String> {
        let values = match operand {
            Value::Tuple(items) => items.clone(),
            other => vec![other.clone()],
        };
        let mut values = values.into_iter();
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let conversion = chars
                .next()
                .ok_or_else(|| self.fault("incomplete format"))?;
            if conversion == '%' {
                out.push('%');
                continue;
            }
            let value = values
                .next()
                .ok_or_else(|| self.fault("not enough arguments for format string"))?;
            match conversion {
                's' => out.push_str(&value.to_str()),
                'r' => out.push_str(&value.repr()),
                'd' | 'i' => match Number::of(&value) {
                    Some(Number::Int(n)) => out.push_str(&n.to_string()),
                    Some(Number::Float(f)) => out.push_str(&self.float_to_int(f)?.to_string()),
                    None => {
                        return Err(self.fault(format!(
                            "%{conversion} format: a number is required, not '{}'",
                            value.type_name()
                        )));
                    }
                },
                other => {
                    return Err(self.fault(format!("unsupported format character '{other}'")));
                }
            }
        }
        if values.next().is_some() {
            return Err(self.fault("not all arguments converted during string formatting"));
        }
        Ok(out)
    }

    fn join(&self, separator: &str, args: &[Value]) -> EvalResult<Value> {
        let [source] = args else {
            return Err(self.fault("join() takes exactly one argument"));
        };
        let items = self.iterable(source)?;
        if items.iter().any(|item| !item.is_known()) {
            let receiver = Value::Str(separator.to_string());
            return Ok(method_stub(&receiver, "join", args, &[]));
        }
        let mut parts = Vec::with_capacity(items.len());
        for item in &items {
            match item {
                Value::Str(s) => parts.push(s.as_str()),
                other => {
                    return Err(self.fault(format!(
                        "sequence item: expected str instance, '{}' found",
                        other.type_name()
                    )));
                }
            }
        }
        let length = parts
            .iter()
            .map(|part| part.len())
            .sum::<usize>()
            .saturating_add(separator.len().saturating_mul(parts.len().saturating_sub(1)));
        if length > MAX_SEQUENCE_LEN {
            return Err(self.fault("join() result exceeds the size limit"));
        }
        Ok(Value::Str(parts.join(separator)))
    }

    fn split(&self, s: &str, args: &[Value], kwargs: &[(String, Value)]) -> EvalResult<Value> {
        let separator = match args.first().or_else(|| kwarg(kwargs, "sep")) {
            None | Some(Value::None) => None,
            Some(Value::Str(sep)) if !sep.is_empty() => Some(sep.as_str()),
            Some(Value::Str(_)) => return Err(self.fault("empty separator")),
            Some(other) => {
                return Err(self.fault(format!(
                    "must be str or None, not '{}'",
                    other.type_name()
                )));
            }
        };
        let maxsplit = match args.get(1).or_else(|| kwarg(kwargs, "maxsplit")) {
            None => -1,
            Some(Value::Int(n)) => *n,
            Some(other) => {
                return Err(self.fault(format!(
                    "maxsplit must be an integer, not '{}'",
                    other.type_name()
                )));
            }
        };
        let parts: Vec<&str> = match (separator, maxsplit) {
            (None, n) if n < 0 => s.split_whitespace().collect(),
            (None, n) => split_whitespace_n(s, n as usize),
            (Some(sep), n) if n < 0 => s.split(sep).collect(),
            (Some(sep), n) => s.splitn(n as usize + 1, sep).collect(),
        };
        Ok(Value::List(
            parts.into_iter().map(|part| Value::Str(part.to_string())).collect(),
        ))
    }
}

fn mutation_target(func: &Expr) -> Option<(&str, &str)> {
    match func {
        Expr::Attribute { object, name }
            if LIST_METHODS.contains(&name.as_str()) || name == "update" =>
        {
            match object.as_ref() {
                Expr::Name(receiver) => Some((receiver.as_str(), name.as_str())),
                _ => None,
            }
        }
        _ => None,
    }
}

fn method_stub(receiver: &Value, name: &str, args: &[Value], kwargs: &[(String, Value)]) -> Value {
    Value::Unknown(Stub::new(receiver.repr()).attr(name).call(args, kwargs))
}

fn kwarg<'v>(kwargs: &'v [(String, Value)], key: &str) -> Option<&'v Value> {
    kwargs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn set_kwarg(kwargs: &mut Vec<(String, Value)>, key: &str, value: Value) {
    match kwargs.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value,
        None => kwargs.push((key.to_string(), value)),
    }
}

fn lookup_entry<'v>(entries: &'v [(Value, Value)], key: &Value) -> Option<&'v Value> {
    entries.iter().find(|(k, _)| k.equals(key)).map(|(_, v)| v)
}

fn dict_insert(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match entries.iter_mut().find(|(k, _)| k.equals(&key)) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let at = if index < 0 { index + len } else { index };
    (0..len).contains(&at).then_some(at as usize)
}

fn repeat_items(items: &[Value], count: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

fn split_whitespace_n(s: &str, maxsplit: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() && parts.len() < maxsplit {
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest);
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_module;

    fn run(source: &str) -> (ParseContext, Result<(), ScriptError>) {
        let sandbox = Sandbox::new("/repo");
        let mut context = ParseContext::new("src/app", "/repo/src/app/BUILD");
        let module = parse_module(source).expect("source should parse");
        let result = Interpreter::run(&sandbox, &mut context, &module);
        (context, result)
    }

    fn eval_global(source: &str, name: &str) -> Value {
        let sandbox = Sandbox::new("/repo");
        let mut context = ParseContext::new("src/app", "/repo/src/app/BUILD");
        let module = parse_module(source).expect("source should parse");
        let mut interpreter = Interpreter::new(&sandbox, &mut context);
        interpreter.execute(&module).expect("source should run");
        interpreter.global(name).cloned().expect("global should be bound")
    }

    #[test]
    fn test_target_calls_are_recorded_in_order() {
        let (context, result) = run(
            "java_library(name='core', dependencies=[':util'])\n\
             scala_library(name='api')\n",
        );
        result.unwrap();
        let kinds: Vec<&str> = context.calls.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["java_library", "scala_library"]);
        assert_eq!(
            context.calls[0].kwarg("name").and_then(Value::as_str),
            Some("core")
        );
        assert_eq!(context.calls[1].line, 2);
    }

    #[test]
    fn test_unsupported_globals_never_fail() {
        let (context, result) = run(
            "jar_library(name='guava', jars=[jar(org='com.google', name='guava', rev='1.0').intransitive()])\n\
             x = artifact(org='a') + '-suffix'\n\
             for item in scoped(provided):\n    pass\n",
        );
        result.unwrap();
        assert_eq!(context.calls.len(), 1);
        assert!(context.warnings.is_empty());
    }

    #[test]
    fn test_undefined_name_becomes_stub_with_warning() {
        let (context, result) = run("value = mystery_macro(1)\n");
        result.unwrap();
        assert_eq!(context.warnings.len(), 1);
        assert!(context.warnings[0].contains("mystery_macro"));
    }

    #[test]
    fn test_glob_helpers_encode_kind_and_excludes() {
        let value = eval_global(
            "srcs = rglobs('*.java', 'x/*.scala', exclude=[['Skip.java'], 'Old.java'])\n",
            "srcs",
        );
        let rendered: Vec<String> = value.elements().iter().map(Value::to_str).collect();
        assert_eq!(
            rendered,
            vec!["|r|*.java", "|r|x/*.scala", "Skip.java-", "Old.java-"]
        );
    }

    #[test]
    fn test_environment_queries() {
        assert!(matches!(eval_global("v = pants_version()\n", "v"), Value::Int(20)));
        assert_eq!(
            eval_global("r = get_buildroot()\n", "r").as_str(),
            Some("/repo")
        );
        assert_eq!(
            eval_global("f = buildfile_path()\n", "f").as_str(),
            Some("/repo/src/app/BUILD")
        );
    }

    #[test]
    fn test_functions_loops_and_comprehensions() {
        let source = "\
def lib(name, deps=None):
    deps = deps or []
    return [':' + d for d in deps if d != name]

out = []
for n in ['a', 'b']:
    out.extend(lib(n, ['a', 'b', 'c']))
out.append('{}-{}'.format('x', 1))
";
        let value = eval_global(source, "out");
        let rendered: Vec<String> = value.elements().iter().map(Value::to_str).collect();
        assert_eq!(rendered, vec![":b", ":c", ":a", ":c", "x-1"]);
    }

    #[test]
    fn test_string_and_dict_helpers() {
        let source = "\
cfg = {'a': 1}
cfg['b'] = 2
cfg.update(c=3)
keys = sorted(cfg.keys(), reverse=True)
label = '%s:%d' % ('lib', len(keys))
parts = 'a/b/c'.split('/', 1)
";
        let keys = eval_global(source, "keys");
        assert_eq!(keys.repr(), "['c', 'b', 'a']");
        assert_eq!(eval_global(source, "label").as_str(), Some("lib:3"));
        assert_eq!(eval_global(source, "parts").repr(), "['a', 'b/c']");
    }

    #[test]
    fn test_genuine_faults_are_errors() {
        let (_, result) = run("x = 1\ny = x + 'a'\n");
        assert!(matches!(result, Err(ScriptError::Eval { line: 2, .. })));

        let (_, result) = run("x = [1, 2][5]\n");
        assert!(result.is_err());

        let (_, result) = run("x = 1 // 0\n");
        assert!(result.is_err());

        let (_, result) = run("def f():\n    return f()\nf()\n");
        let message = result.unwrap_err().to_string();
        assert!(message.contains("recursion"));
    }

    #[test]
    fn test_size_limits_are_errors() {
        let (_, result) = run("l = [0] * 100000\nl = l + l\n");
        assert!(matches!(result, Err(ScriptError::Eval { line: 2, .. })));

        let (_, result) = run("s = 'ab'\nfor i in range(64):\n    s = s + s\n");
        assert!(result.unwrap_err().to_string().contains("size limit"));

        let (_, result) = run("l = [1]\nfor i in range(64):\n    l.extend(l)\n");
        assert!(result.is_err());

        let (_, result) = run("l = []\nfor i in range(64):\n    l = [l, l]\n");
        assert!(result.is_err());

        let (_, result) = run("l = []\nfor i in range(1000):\n    l = [l]\n");
        assert!(result.unwrap_err().to_string().contains("nested too deeply"));

        let (_, result) = run("d = {}\nfor i in range(64):\n    d['k'] = [d, d]\n");
        assert!(result.is_err());

        let (_, result) = run("s = 'x' * 1000\nl = [s for i in range(10000)]\n");
        assert!(result.is_err());

        let (_, result) = run("s = 'x' * 1000\nt = s.join(['a'] * 1000)\n");
        assert!(result.is_err());

        let (_, result) = run("s = 'x' * 1000\nt = s.replace('x', s)\n");
        assert!(result.is_err());

        let (_, result) = run("s = 'x' * 1000\nt = ('{0}' * 1000).format(s)\n");
        assert!(result.is_err());

        let (_, result) = run("l = [0] * 100000\nn = len(range(100000))\n");
        assert!(result.is_ok());
    }

    #[test]
    fn test_float_conversion_overflow_is_an_error() {
        let (_, result) = run("n = int(1e300)\n");
        assert!(result.unwrap_err().to_string().contains("integer overflow"));

        let (_, result) = run("s = '%d' % 1e300\n");
        assert!(result.is_err());

        assert!(matches!(eval_global("n = int(-2.9)\n", "n"), Value::Int(-2)));
        assert_eq!(eval_global("s = '%d' % 7.8\n", "s").as_str(), Some("7"));
    }

    #[test]
    fn test_python_integer_semantics() {
        assert!(matches!(eval_global("v = -7 // 2\n", "v"), Value::Int(-4)));
        assert!(matches!(eval_global("v = -7 % 3\n", "v"), Value::Int(2)));
        assert!(matches!(eval_global("v = len(range(0, 10, 3))\n", "v"), Value::Int(4)));
    }

    #[test]
    fn test_stub_operands_in_comparisons() {
        assert!(matches!(
            eval_global("v = 'x' in jar_rules\n", "v"),
            Value::Unknown(_)
        ));
        assert!(matches!(eval_global("v = jar_rules == 1\n", "v"), Value::Bool(false)));
    }

    #[test]
    fn test_scopes_do_not_leak_between_runs() {
        let sandbox = Sandbox::new("/repo");
        let module = parse_module("java_library = 1\n").unwrap();
        let mut context = ParseContext::new("a", "/repo/a/BUILD");
        Interpreter::run(&sandbox, &mut context, &module).unwrap();
        assert!(sandbox.is_target_kind("java_library"));
    }
}
