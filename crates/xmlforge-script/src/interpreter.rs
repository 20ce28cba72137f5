//! Metered tree-walking evaluator.
//!
//! One `Interpreter` serves exactly one call: it owns the globals, the frame
//! stack and the runtime meter, and is dropped when the call returns.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::ast::{AssignOp, BinaryOp, Block, Expr, ExprKind, Literal, Stmt, StmtKind, UnaryOp};
use crate::builtins::{self, resolve_index, NativeCall, NativeFunction};
use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult, TraceFrame};
use crate::limits::ExecutionLimits;
use crate::modules;
use crate::ops;
use crate::program::Program;
use crate::runtime::Runtime;
use crate::validate::import_denied;
use crate::value::{Args, Value};

/// Combined nesting of calls, blocks and expressions on the host stack.
const MAX_EVAL_DEPTH: usize = 1024;

struct Frame {
    function: String,
    locals: HashMap<String, Value>,
    imports: Vec<String>,
    line: u32,
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub(crate) struct Interpreter<'p> {
    program: &'p Program,
    globals: HashMap<String, Value>,
    frames: Vec<Frame>,
    eval_depth: usize,
    rt: Runtime,
}

impl<'p> Interpreter<'p> {
    pub(crate) fn new(program: &'p Program, limits: &ExecutionLimits) -> Self {
        Self {
            program,
            globals: HashMap::new(),
            frames: Vec::new(),
            eval_depth: 0,
            rt: Runtime::new(limits),
        }
    }

    pub(crate) fn runtime(&mut self) -> &mut Runtime {
        &mut self.rt
    }

    /// Evaluate global initialisers in source order.
    pub(crate) fn init_globals(&mut self) -> RuntimeResult<()> {
        for (name, value) in self.program.globals() {
            let v = self.eval(value)?;
            self.rt.check_nesting(&v, 0)?;
            self.globals.insert(name.clone(), v);
        }
        Ok(())
    }

    pub(crate) fn call(&mut self, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let decl = self
            .program
            .function(name)
            .ok_or_else(|| name_error(&format!("function '{name}' is not defined")))?;
        if args.len() != decl.params.len() {
            return Err(RuntimeError::type_error(format!(
                "{name}() takes {} argument(s) but {} were given",
                decl.params.len(),
                args.len()
            )));
        }
        if self.frames.len() >= self.rt.limits().max_call_depth {
            return Err(RuntimeError::new(
                RuntimeErrorKind::CallDepthExceeded,
                format!(
                    "maximum call depth of {} exceeded",
                    self.rt.limits().max_call_depth
                ),
            ));
        }

        let locals = decl.params.iter().cloned().zip(args).collect();
        self.frames.push(Frame {
            function: name.to_string(),
            locals,
            imports: Vec::new(),
            line: decl.line,
        });
        let outcome = self.exec_block(&decl.body);
        let frame = self.frames.pop();
        match outcome {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(_) => Ok(Value::Null),
            Err(mut err) => {
                if let Some(frame) = frame {
                    err.trace.push(TraceFrame {
                        function: frame.function,
                        line: frame.line,
                    });
                }
                Err(err)
            }
        }
    }

    fn enter(&mut self) -> RuntimeResult<()> {
        self.eval_depth += 1;
        if self.eval_depth > MAX_EVAL_DEPTH {
            return Err(RuntimeError::new(
                RuntimeErrorKind::CallDepthExceeded,
                "evaluation nested too deeply",
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.eval_depth -= 1;
    }

    fn exec_block(&mut self, block: &Block) -> RuntimeResult<Flow> {
        self.enter()?;
        let result = self.exec_stmts(block);
        self.leave();
        result
    }

    fn exec_stmts(&mut self, block: &Block) -> RuntimeResult<Flow> {
        for stmt in block {
            match self.exec(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> RuntimeResult<Flow> {
        self.rt.tick()?;
        if let Some(frame) = self.frames.last_mut() {
            frame.line = stmt.line;
        }
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                let v = self.eval(value)?;
                self.define(name, v);
            }
            StmtKind::Assign { target, op, value } => {
                let v = self.eval(value)?;
                let indices = self.eval_all(&target.indices)?;
                self.rt.check_nesting(&v, indices.len())?;
                self.assign(&target.root, &indices, *op, v)?;
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
                if let Some(body) = otherwise {
                    return self.exec_block(body);
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval(condition)?.truthy() {
                    self.rt.tick()?;
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::For {
                var,
                iterable,
                body,
            } => {
                let items = self.iteration_items(iterable)?;
                for item in items {
                    self.rt.tick()?;
                    self.define(var, item);
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Return(value) => {
                let v = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(v));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Import { module } => self.import(module)?,
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn iteration_items(&mut self, iterable: &Expr) -> RuntimeResult<Vec<Value>> {
        let source = self.eval(iterable)?;
        let items: Vec<Value> = match &source {
            Value::List(items) => items.to_vec(),
            Value::Map(entries) => entries.keys().map(Value::str).collect(),
            Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
            Value::Node(node) => node
                .borrow()
                .element_children()
                .into_iter()
                .map(Value::Node)
                .collect(),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "'{}' is not iterable",
                    other.type_name()
                )))
            }
        };
        self.rt.charge(items.len() as u64 / 8)?;
        Ok(items)
    }

    fn import(&mut self, module: &str) -> RuntimeResult<()> {
        if !modules::is_allowed(module) {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ImportDenied,
                import_denied(module).to_string(),
            ));
        }
        if let Some(frame) = self.frames.last_mut() {
            if !frame.imports.iter().any(|m| m == module) {
                frame.imports.push(module.to_string());
            }
        }
        Ok(())
    }

    fn module_visible(&self, module: &str) -> bool {
        self.program.imports_module(module)
            || self
                .frames
                .last()
                .is_some_and(|frame| frame.imports.iter().any(|m| m == module))
    }

    fn define(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.locals.insert(name.to_string(), value);
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    fn lookup(&self, name: &str) -> RuntimeResult<Value> {
        self.frames
            .last()
            .and_then(|frame| frame.locals.get(name))
            .or_else(|| self.globals.get(name))
            .cloned()
            .ok_or_else(|| name_error(&format!("name '{name}' is not defined")))
    }

    fn assign(&mut self, root: &str, indices: &[Value], op: AssignOp, value: Value) -> RuntimeResult<()> {
        let Interpreter {
            frames, globals, rt, ..
        } = self;
        let slot = place_mut(frames, globals, root).ok_or_else(|| {
            name_error(&format!(
                "cannot assign to undeclared variable '{root}'; declare it with let"
            ))
        })?;
        match indices.split_last() {
            None => {
                let updated = combine(rt, op, slot, value)?;
                rt.check_value(&updated)?;
                *slot = updated;
            }
            Some((last, init)) => {
                let container = descend(slot, init)?;
                assign_index(rt, container, last, op, value)?;
            }
        }
        Ok(())
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> RuntimeResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        self.enter()?;
        let result = self.eval_inner(expr);
        self.leave();
        result
    }

    fn eval_inner(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        self.rt.tick()?;
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::str(s),
            }),
            ExprKind::Var(name) => self.lookup(name),
            ExprKind::List(items) => {
                let values = self.eval_all(items)?;
                for v in &values {
                    self.rt.check_nesting(v, 1)?;
                }
                self.rt.check_len(values.len())?;
                Ok(Value::list(values))
            }
            ExprKind::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::Str(s) => s.to_string(),
                        other => {
                            return Err(RuntimeError::type_error(format!(
                                "map keys must be str, not {}",
                                other.type_name()
                            )))
                        }
                    };
                    let value = self.eval(value)?;
                    self.rt.check_nesting(&value, 1)?;
                    map.insert(key, value);
                }
                self.rt.check_len(map.len())?;
                Ok(Value::map(map))
            }
            ExprKind::Unary { op, operand } => {
                let v = self.eval(operand)?;
                match (op, &v) {
                    (UnaryOp::Not, _) => Ok(Value::Bool(!v.truthy())),
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| RuntimeError::value_error("integer overflow")),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Neg, other) => Err(RuntimeError::type_error(format!(
                        "bad operand type for unary -: '{}'",
                        other.type_name()
                    ))),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                ops::binary(&mut self.rt, *op, &l, &r)
            }
            ExprKind::And(lhs, rhs) => {
                let l = self.eval(lhs)?;
                if !l.truthy() {
                    return Ok(l);
                }
                self.eval(rhs)
            }
            ExprKind::Or(lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy() {
                    return Ok(l);
                }
                self.eval(rhs)
            }
            ExprKind::Index { target, index } => {
                let t = self.eval(target)?;
                let i = self.eval(index)?;
                index_value(&t, &i)
            }
            ExprKind::Call { name, args } => match builtins::lookup(name) {
                Some(native) => self.call_builtin(native, args),
                None => {
                    let values = self.eval_all(args)?;
                    self.call(name, values)
                }
            },
            ExprKind::ModuleCall {
                module,
                function,
                args,
            } => {
                if !modules::is_allowed(module) {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::ImportDenied,
                        import_denied(module).to_string(),
                    ));
                }
                if !self.module_visible(module) {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::ModuleNotImported,
                        format!("module '{module}' is used without being imported; add import \"{module}\";"),
                    ));
                }
                let native = modules::lookup(module, function).ok_or_else(|| {
                    name_error(&format!("module '{module}' has no function '{function}'"))
                })?;
                let values = self.eval_all(args)?;
                self.invoke_pure(native, values)
            }
            ExprKind::DynamicImport(name) => match self.eval(name)? {
                Value::Str(module) => {
                    self.import(&module)?;
                    Ok(Value::Str(module))
                }
                other => Err(RuntimeError::type_error(format!(
                    "import() argument must be str, not {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn invoke_pure(&mut self, native: &'static NativeFunction, values: Vec<Value>) -> RuntimeResult<Value> {
        check_native_arity(native, values.len())?;
        let result = match native.call {
            NativeCall::Pure(f) => f(&mut self.rt, Args::new(native.qualified, values))?,
            NativeCall::Mutating(f) => {
                let mut values = values;
                let mut target = values.remove(0);
                f(&mut self.rt, &mut target, Args::new(native.qualified, values))?
            }
        };
        self.rt.check_value(&result)?;
        Ok(result)
    }

    /// Mutating builtins update the variable or element named by their first
    /// argument in place; anything else is passed by value.
    fn call_builtin(&mut self, native: &'static NativeFunction, args: &[Expr]) -> RuntimeResult<Value> {
        let NativeCall::Mutating(f) = native.call else {
            let values = self.eval_all(args)?;
            return self.invoke_pure(native, values);
        };
        check_native_arity(native, args.len())?;
        let Some((first, rest)) = args.split_first() else {
            return Err(RuntimeError::type_error(format!(
                "{}() requires an argument",
                native.qualified
            )));
        };
        let Some((root, index_exprs)) = place_of(first) else {
            let values = self.eval_all(args)?;
            return self.invoke_pure(native, values);
        };

        let rest_values = self.eval_all(rest)?;
        let indices = self.eval_all(&index_exprs)?;
        for v in &rest_values {
            self.rt.check_nesting(v, indices.len() + 1)?;
        }
        let Interpreter {
            frames, globals, rt, ..
        } = self;
        let slot = place_mut(frames, globals, root)
            .ok_or_else(|| name_error(&format!("name '{root}' is not defined")))?;
        let target = descend(slot, &indices)?;
        let result = f(rt, target, Args::new(native.qualified, rest_values))?;
        rt.check_value(&result)?;
        Ok(result)
    }
}

fn check_native_arity(native: &NativeFunction, count: usize) -> RuntimeResult<()> {
    if native.accepts(count) {
        Ok(())
    } else {
        Err(RuntimeError::type_error(format!(
            "{}() takes {} argument(s) but {count} were given",
            native.qualified,
            native.arity()
        )))
    }
}

fn name_error(message: &str) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::Name, message)
}

/// `x`, `x[i]`, `x[i][j]` ... as a root variable plus index expressions.
fn place_of(expr: &Expr) -> Option<(&str, Vec<Expr>)> {
    match &expr.kind {
        ExprKind::Var(name) => Some((name.as_str(), Vec::new())),
        ExprKind::Index { target, index } => {
            let (root, mut indices) = place_of(target)?;
            indices.push((**index).clone());
            Some((root, indices))
        }
        _ => None,
    }
}

/// Storage for a variable: the innermost frame's locals, then globals.
fn place_mut<'v>(
    frames: &'v mut [Frame],
    globals: &'v mut HashMap<String, Value>,
    name: &str,
) -> Option<&'v mut Value> {
    if let Some(frame) = frames.last_mut() {
        if frame.locals.contains_key(name) {
            return frame.locals.get_mut(name);
        }
    }
    globals.get_mut(name)
}

/// Follow index steps into nested lists and maps, un-sharing each level.
fn descend<'v>(mut value: &'v mut Value, indices: &[Value]) -> RuntimeResult<&'v mut Value> {
    for index in indices {
        value = match value {
            Value::List(items) => {
                let Value::Int(i) = index else {
                    return Err(RuntimeError::type_error(format!(
                        "list indices must be int, not {}",
                        index.type_name()
                    )));
                };
                let items = Rc::make_mut(items);
                let at = resolve_index(*i, items.len())
                    .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Index, "list index out of range"))?;
                &mut items[at]
            }
            Value::Map(entries) => {
                let Value::Str(key) = index else {
                    return Err(RuntimeError::type_error(format!(
                        "map keys must be str, not {}",
                        index.type_name()
                    )));
                };
                Rc::make_mut(entries)
                    .get_mut(&**key)
                    .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Key, format!("{:?}", &**key)))?
            }
            other => return Err(subscript_error(other, index)),
        };
    }
    Ok(value)
}

fn assign_index(
    rt: &mut Runtime,
    container: &mut Value,
    index: &Value,
    op: AssignOp,
    value: Value,
) -> RuntimeResult<()> {
    match (container, index) {
        (Value::List(items), Value::Int(i)) => {
            let items = Rc::make_mut(items);
            let at = resolve_index(*i, items.len()).ok_or_else(|| {
                RuntimeError::new(RuntimeErrorKind::Index, "list assignment index out of range")
            })?;
            let updated = combine(rt, op, &items[at], value)?;
            rt.check_value(&updated)?;
            items[at] = updated;
        }
        (Value::Map(entries), Value::Str(key)) => {
            let entries = Rc::make_mut(entries);
            let updated = match (op, entries.get(&**key)) {
                (AssignOp::Set, _) => value,
                (_, Some(old)) => combine(rt, op, old, value)?,
                (_, None) => {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::Key,
                        format!("{:?}", &**key),
                    ))
                }
            };
            rt.check_value(&updated)?;
            if !entries.contains_key(&**key) {
                rt.check_len(entries.len() + 1)?;
            }
            entries.insert(key.to_string(), updated);
        }
        (Value::Str(_), _) => {
            return Err(RuntimeError::type_error(
                "'str' object does not support item assignment",
            ))
        }
        (target, index) => return Err(subscript_error(target, index)),
    }
    Ok(())
}

fn combine(rt: &mut Runtime, op: AssignOp, old: &Value, value: Value) -> RuntimeResult<Value> {
    match op {
        AssignOp::Set => Ok(value),
        AssignOp::Add => ops::binary(rt, BinaryOp::Add, old, &value),
        AssignOp::Sub => ops::binary(rt, BinaryOp::Sub, old, &value),
    }
}

fn subscript_error(target: &Value, index: &Value) -> RuntimeError {
    match target {
        Value::List(_) | Value::Str(_) => RuntimeError::type_error(format!(
            "{} indices must be int, not {}",
            target.type_name(),
            index.type_name()
        )),
        Value::Map(_) => RuntimeError::type_error(format!(
            "map keys must be str, not {}",
            index.type_name()
        )),
        _ => RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            target.type_name()
        )),
    }
}

fn index_value(target: &Value, index: &Value) -> RuntimeResult<Value> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => resolve_index(*i, items.len())
            .map(|at| items[at].clone())
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Index, "list index out of range")),
        (Value::Str(s), Value::Int(i)) => {
            let count = s.chars().count();
            resolve_index(*i, count)
                .and_then(|at| s.chars().nth(at))
                .map(|c| Value::str(c.to_string()))
                .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Index, "string index out of range"))
        }
        (Value::Map(entries), Value::Str(key)) => entries
            .get(&**key)
            .cloned()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Key, format!("{:?}", &**key))),
        _ => Err(subscript_error(target, index)),
    }
}
