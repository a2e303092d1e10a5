//! Statement evaluator
//!
//! Walks a parsed module and builds its [`Namespace`]. Nothing is ever
//! executed: calls of imported symbols become [`CallNode`]s, and the only
//! functions that run are the builtins and the `LazyConfig` loaders.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lazycfg_tree::{CallNode, ConfigMap, Target, Value, TARGET_KEY};
use tracing::trace;

use crate::builtins::{self, Builtin};
use crate::error::{LoadError, LoadResult, Span};
use crate::loader::{ModuleTarget, Session};
use crate::namespace::{prelude, Binding, Helper, Namespace};
use crate::parser::ast::{BoolOp, Expr, ExprKind, ImportName, Keyword, Module, Stmt, StmtKind, UnaryOp};

/// One step of an assignment target below its root name
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(i64),
}

impl Segment {
    fn describe(&self) -> String {
        match self {
            Self::Key(key) => format!("'{key}'"),
            Self::Index(index) => format!("index {index}"),
        }
    }
}

pub(crate) struct Evaluator<'s> {
    session: &'s mut Session,
    file: PathBuf,
    ns: Namespace,
}

impl<'s> Evaluator<'s> {
    pub(crate) fn new(session: &'s mut Session, file: PathBuf) -> Self {
        Self {
            session,
            file,
            ns: Namespace::default(),
        }
    }

    pub(crate) fn run(mut self, module: &Module) -> LoadResult<Namespace> {
        for stmt in &module.body {
            self.statement(stmt)?;
        }
        Ok(self.ns)
    }

    fn error(&self, span: Span, message: impl Into<String>) -> LoadError {
        LoadError::evaluation(&self.file, span, message)
    }

    fn dir(&self) -> &Path {
        self.file.parent().unwrap_or_else(|| Path::new("."))
    }

    // -- statements --------------------------------------------------------

    fn statement(&mut self, stmt: &Stmt) -> LoadResult<()> {
        match &stmt.kind {
            StmtKind::Import { module, alias } => {
                let (name, symbol) = match alias {
                    Some(alias) => (alias.clone(), module.join(".")),
                    None => (module[0].clone(), module[0].clone()),
                };
                self.ns.set(name, Binding::Symbol(symbol));
            }
            StmtKind::FromImport { level: 0, module, names } => {
                let module = module.join(".");
                for import in names {
                    let binding = match import.name.as_str() {
                        "LazyCall" => Binding::Helper(Helper::LazyCall),
                        "LazyConfig" => Binding::Helper(Helper::LazyConfig),
                        name => Binding::Symbol(format!("{module}.{name}")),
                    };
                    self.ns.set(import.binding(), binding);
                }
            }
            StmtKind::FromImport { level, module, names } => {
                self.relative_import(*level, module, names, stmt.span)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.eval_data(target)?;
                let rhs = self.eval_data(value)?;
                let result = builtins::binary(*op, &current, &rhs).map_err(|m| self.error(stmt.span, m))?;
                self.assign(target, Binding::Data(result))?;
            }
            StmtKind::Assert { test, message } => {
                if !self.truthy(test)? {
                    let detail = match message {
                        Some(message) => builtins::to_str(&self.eval_data(message)?),
                        None => String::new(),
                    };
                    let text = if detail.is_empty() {
                        "assertion failed".to_string()
                    } else {
                        format!("assertion failed: {detail}")
                    };
                    return Err(self.error(test.span, text));
                }
            }
            StmtKind::Pass => {}
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(())
    }

    fn relative_import(&mut self, level: usize, module: &[String], names: &[ImportName], span: Span) -> LoadResult<()> {
        let target = self
            .session
            .resolve_module(self.dir(), level, module)
            .map_err(|m| self.error(span, m))?;
        trace!(file = %self.file.display(), module = ?target, "relative import");

        match target {
            ModuleTarget::File(path) => {
                let imported = self.session.namespace(&path)?;
                for import in names {
                    let binding = imported.get(&import.name).cloned().ok_or_else(|| {
                        self.error(
                            import.span,
                            format!("cannot import name '{}' from '{}'", import.name, path.display()),
                        )
                    })?;
                    self.ns.set(import.binding(), binding);
                }
            }
            ModuleTarget::Package { dir, init } => {
                let package = init.as_deref().map(|init| self.session.namespace(init)).transpose()?;
                for import in names {
                    let from_init = package.as_ref().and_then(|ns| ns.get(&import.name)).cloned();
                    let binding = match from_init {
                        Some(binding) => binding,
                        None => {
                            let sub = self
                                .session
                                .resolve_module(&dir, 1, std::slice::from_ref(&import.name))
                                .map_err(|_| {
                                    self.error(
                                        import.span,
                                        format!("cannot import name '{}' from package '{}'", import.name, dir.display()),
                                    )
                                })?;
                            let ns = match sub {
                                ModuleTarget::File(path) => self.session.namespace(&path)?,
                                ModuleTarget::Package { init: Some(init), .. } => self.session.namespace(&init)?,
                                ModuleTarget::Package { init: None, .. } => Namespace::default(),
                            };
                            Binding::Data(Value::Map(ns.filtered()))
                        }
                    };
                    self.ns.set(import.binding(), binding);
                }
            }
        }
        Ok(())
    }

    // -- assignment --------------------------------------------------------

    fn assign(&mut self, target: &Expr, value: Binding) -> LoadResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                if name == "cfg" {
                    return Err(self.error(target.span, "cannot rebind 'cfg'"));
                }
                self.ns.set(name.clone(), value);
                Ok(())
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                let Binding::Data(Value::List(values)) = value else {
                    return Err(self.error(target.span, format!("cannot unpack {}", value.describe())));
                };
                if values.len() != items.len() {
                    return Err(self.error(
                        target.span,
                        format!("cannot unpack {} values into {} targets", values.len(), items.len()),
                    ));
                }
                for (item, value) in items.iter().zip(values) {
                    self.assign(item, Binding::Data(value))?;
                }
                Ok(())
            }
            ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => self.assign_nested(target, value),
            _ => Err(self.error(target.span, "cannot assign to expression")),
        }
    }

    fn assign_nested(&mut self, target: &Expr, value: Binding) -> LoadResult<()> {
        let (root, mut segments) = self.lvalue(target)?;
        let span = target.span;

        // A key named `cfg` is only reachable as `cfg.cfg`
        if root == "cfg" {
            let Segment::Key(name) = segments.remove(0) else {
                return Err(self.error(span, "cfg keys must be strings"));
            };
            self.ns.export(&name);
            if segments.is_empty() {
                self.ns.set(name, value);
                return Ok(());
            }
            if !self.ns.contains(&name) {
                self.ns.set(name.clone(), Binding::Data(Value::Map(ConfigMap::new())));
            }
            return self.store(&name, &segments, value, true, span);
        }

        if !self.ns.contains(&root) {
            let message = if prelude(&root).is_some() {
                format!("cannot assign into '{root}'")
            } else {
                format!("name '{root}' is not defined")
            };
            return Err(self.error(span, message));
        }
        self.store(&root, &segments, value, false, span)
    }

    fn store(&mut self, name: &str, segments: &[Segment], value: Binding, create: bool, span: Span) -> LoadResult<()> {
        let Binding::Data(value) = value else {
            return Err(self.error(
                span,
                format!("cannot store {} inside a config value", value.describe()),
            ));
        };
        let result = match self.ns.get_mut(name) {
            Some(Binding::Data(root)) => store_path(root, segments, value, create),
            Some(other) => Err(format!("cannot assign into {}", other.describe())),
            None => Err(format!("name '{name}' is not defined")),
        };
        result.map_err(|m| self.error(span, m))
    }

    /// Split an assignment target into its root name and path segments
    fn lvalue(&mut self, expr: &Expr) -> LoadResult<(String, Vec<Segment>)> {
        match &expr.kind {
            ExprKind::Name(name) => Ok((name.clone(), Vec::new())),
            ExprKind::Attribute { value, attr } => {
                let (root, mut segments) = self.lvalue(value)?;
                segments.push(Segment::Key(attr.clone()));
                Ok((root, segments))
            }
            ExprKind::Subscript { value, index } => {
                let (root, mut segments) = self.lvalue(value)?;
                let segment = match self.eval_data(index)? {
                    Value::Str(key) => Segment::Key(key),
                    Value::Int(i) => Segment::Index(i),
                    other => {
                        return Err(self.error(index.span, format!("invalid subscript of type '{}'", other.kind())));
                    }
                };
                segments.push(segment);
                Ok((root, segments))
            }
            _ => Err(self.error(expr.span, "cannot assign to expression")),
        }
    }

    // -- expressions -------------------------------------------------------

    fn lookup(&self, name: &str, span: Span) -> LoadResult<Binding> {
        if name == "cfg" {
            return Ok(Binding::Root);
        }
        self.ns
            .get(name)
            .cloned()
            .or_else(|| prelude(name))
            .ok_or_else(|| self.error(span, format!("name '{name}' is not defined")))
    }

    fn is_bound(&self, name: &str) -> bool {
        self.ns.contains(name) || prelude(name).is_some()
    }

    /// Evaluate an expression that must produce config data
    fn eval_data(&mut self, expr: &Expr) -> LoadResult<Value> {
        match self.eval(expr)? {
            Binding::Data(value) => Ok(value),
            other => Err(self.error(
                expr.span,
                format!("{} is not a config value", other.describe()),
            )),
        }
    }

    fn truthy(&mut self, expr: &Expr) -> LoadResult<bool> {
        Ok(match self.eval(expr)? {
            Binding::Data(value) => builtins::truthy(&value),
            _ => true,
        })
    }

    fn eval(&mut self, expr: &Expr) -> LoadResult<Binding> {
        let span = expr.span;
        let value = match &expr.kind {
            ExprKind::None => Value::Null,
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Int(i) => Value::Int(*i),
            ExprKind::Float(f) => Value::Float(*f),
            ExprKind::Str(s) => Value::Str(s.clone()),
            ExprKind::Name(name) => return self.lookup(name, span),
            ExprKind::Attribute { value, attr } => {
                let base = self.eval(value)?;
                return self.attribute(base, attr, span);
            }
            ExprKind::Subscript { value, index } => {
                let base = self.eval_data(value)?;
                let index = self.eval_data(index)?;
                subscript(&base, &index).map_err(|m| self.error(span, m))?
            }
            ExprKind::Call { func, args, keywords } => return self.call(func, args, keywords, span),
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                Value::List(items.iter().map(|item| self.eval_data(item)).collect::<LoadResult<_>>()?)
            }
            ExprKind::Dict(entries) => {
                let mut map = ConfigMap::new();
                for (key, value) in entries {
                    let Value::Str(key_text) = self.eval_data(key)? else {
                        return Err(self.error(key.span, "config mapping keys must be strings"));
                    };
                    let value = self.eval_data(value)?;
                    map.insert(key_text, value);
                }
                Value::Map(map)
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => Value::Bool(!self.truthy(operand)?),
                UnaryOp::Neg | UnaryOp::Pos => {
                    let operand = self.eval_data(operand)?;
                    builtins::negate(&operand, *op == UnaryOp::Neg).map_err(|m| self.error(span, m))?
                }
            },
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_data(left)?;
                let right = self.eval_data(right)?;
                builtins::binary(*op, &left, &right).map_err(|m| self.error(span, m))?
            }
            ExprKind::Compare { left, ops } => {
                let mut current = self.eval_data(left)?;
                let mut result = true;
                for (op, right) in ops {
                    let next = self.eval_data(right)?;
                    if !builtins::compare(*op, &current, &next).map_err(|m| self.error(span, m))? {
                        result = false;
                        break;
                    }
                    current = next;
                }
                Value::Bool(result)
            }
            ExprKind::BoolOp { op, left, right } => {
                let left_value = self.eval(left)?;
                let left_true = match &left_value {
                    Binding::Data(value) => builtins::truthy(value),
                    _ => true,
                };
                let short_circuit = match op {
                    BoolOp::And => !left_true,
                    BoolOp::Or => left_true,
                };
                return if short_circuit { Ok(left_value) } else { self.eval(right) };
            }
            ExprKind::IfElse { test, body, orelse } => {
                return if self.truthy(test)? { self.eval(body) } else { self.eval(orelse) };
            }
        };
        Ok(Binding::Data(value))
    }

    fn attribute(&self, base: Binding, attr: &str, span: Span) -> LoadResult<Binding> {
        match base {
            Binding::Data(Value::Map(mut map)) => map
                .shift_remove(attr)
                .map(Binding::Data)
                .ok_or_else(|| self.error(span, format!("mapping has no key '{attr}'"))),
            Binding::Data(Value::Call(call)) => {
                if attr == TARGET_KEY {
                    return Ok(Binding::Data(Value::Str(call.target_name().to_string())));
                }
                call.arg(attr)
                    .cloned()
                    .map(Binding::Data)
                    .ok_or_else(|| self.error(span, format!("call to '{}' has no argument '{attr}'", call.target_name())))
            }
            Binding::Symbol(symbol) => Ok(Binding::Symbol(format!("{symbol}.{attr}"))),
            Binding::Helper(Helper::LazyConfig) => match attr {
                "load" => Ok(Binding::Helper(Helper::Load)),
                "load_rel" => Ok(Binding::Helper(Helper::LoadRel)),
                other => Err(self.error(span, format!("LazyConfig has no attribute '{other}'"))),
            },
            Binding::Root => self
                .ns
                .get(attr)
                .cloned()
                .ok_or_else(|| self.error(span, format!("cfg has no key '{attr}'"))),
            other => Err(self.error(span, format!("{} has no attribute '{attr}'", other.describe()))),
        }
    }

    // -- calls -------------------------------------------------------------

    fn call(&mut self, func: &Expr, args: &[Expr], keywords: &[Keyword], span: Span) -> LoadResult<Binding> {
        // An unbound dotted callee names something outside the config
        let callee = match (func.dotted_name(), func.root_name()) {
            (Some(dotted), Some(root)) if dotted.contains('.') && !self.is_bound(root) => Binding::Symbol(dotted),
            _ => self.eval(func)?,
        };

        let positional = args.iter().map(|arg| self.eval(arg)).collect::<LoadResult<Vec<_>>>()?;
        let mut kwargs = IndexMap::new();
        for keyword in keywords {
            match &keyword.name {
                Some(name) => {
                    let value = self.eval_data(&keyword.value)?;
                    kwargs.insert(name.clone(), value);
                }
                None => match self.eval_data(&keyword.value)? {
                    Value::Map(map) => kwargs.extend(map),
                    other => {
                        return Err(self.error(
                            keyword.value.span,
                            format!("argument after ** must be a mapping, not {}", other.kind()),
                        ));
                    }
                },
            }
        }

        match callee {
            Binding::Helper(Helper::LazyCall) => {
                if positional.len() != 1 || !kwargs.is_empty() {
                    return Err(self.error(span, "LazyCall() takes exactly one target argument"));
                }
                let target = match positional.into_iter().next() {
                    Some(Binding::Symbol(name) | Binding::Data(Value::Str(name))) => Target::Name(name),
                    Some(Binding::Builtin(builtin)) => Target::Name(builtin.qualified_name()),
                    Some(other) => {
                        return Err(self.error(span, format!("LazyCall() target must be a symbol or a name, not {}", other.describe())));
                    }
                    None => return Err(self.error(span, "LazyCall() missing target")),
                };
                Ok(Binding::Deferred(target))
            }
            Binding::Deferred(target) => self.deferred(target, positional, kwargs, span),
            Binding::Symbol(symbol) if symbol == "os.getenv" => self.builtin(Builtin::Getenv, positional, kwargs, span),
            Binding::Symbol(symbol) => self.deferred(Target::Name(symbol), positional, kwargs, span),
            Binding::Builtin(builtin) => self.builtin(builtin, positional, kwargs, span),
            Binding::Helper(helper @ (Helper::Load | Helper::LoadRel)) => self.load(helper, positional, kwargs, span),
            other => Err(self.error(span, format!("{} is not callable", other.describe()))),
        }
    }

    fn deferred(&self, target: Target, positional: Vec<Binding>, kwargs: ConfigMap, span: Span) -> LoadResult<Binding> {
        if !positional.is_empty() {
            return Err(self.error(
                span,
                format!("deferred call to '{target}' takes keyword arguments only, got {} positional", positional.len()),
            ));
        }
        trace!(target = %target, args = kwargs.len(), "deferred call");
        Ok(Binding::Data(Value::Call(CallNode::with_args(target, kwargs))))
    }

    fn builtin(&self, builtin: Builtin, positional: Vec<Binding>, kwargs: ConfigMap, span: Span) -> LoadResult<Binding> {
        let args = positional
            .into_iter()
            .map(|arg| match arg {
                Binding::Data(value) => Ok(value),
                other => Err(self.error(span, format!("{}() got {}", builtin.name(), other.describe()))),
            })
            .collect::<LoadResult<Vec<_>>>()?;
        builtin
            .call(args, kwargs)
            .map(Binding::Data)
            .map_err(|m| self.error(span, m))
    }

    /// `LazyConfig.load(path, keys=None)` and `LazyConfig.load_rel(path, keys=None)`
    fn load(&mut self, helper: Helper, positional: Vec<Binding>, mut kwargs: ConfigMap, span: Span) -> LoadResult<Binding> {
        let mut positional = positional.into_iter();
        let path = match positional.next() {
            Some(Binding::Data(Value::Str(path))) => PathBuf::from(path),
            _ => return Err(self.error(span, format!("{}() requires a path string", helper.name()))),
        };
        let keys = match (positional.next(), kwargs.shift_remove("keys")) {
            (Some(_), Some(_)) => {
                return Err(self.error(span, format!("{}() got multiple values for 'keys'", helper.name())));
            }
            (Some(Binding::Data(keys)), None) | (None, Some(keys)) => keys,
            (Some(other), None) => {
                return Err(self.error(span, format!("{}() keys must be data, not {}", helper.name(), other.describe())));
            }
            (None, None) => Value::Null,
        };
        if positional.next().is_some() || !kwargs.is_empty() {
            return Err(self.error(span, format!("{}() takes a path and optional keys", helper.name())));
        }

        let path = if helper == Helper::LoadRel && path.is_relative() {
            self.dir().join(path)
        } else {
            path
        };
        let loaded = self.session.namespace(&path)?;

        match keys {
            Value::Null => Ok(Binding::Data(Value::Map(loaded.filtered()))),
            Value::Str(key) => self.select(&loaded, &key, &path, span),
            Value::List(keys) => {
                let mut values = Vec::with_capacity(keys.len());
                for key in keys {
                    let Value::Str(key) = key else {
                        return Err(self.error(span, "keys must be strings"));
                    };
                    match self.select(&loaded, &key, &path, span)? {
                        Binding::Data(value) => values.push(value),
                        other => {
                            return Err(self.error(span, format!("key '{key}' is bound to {}", other.describe())));
                        }
                    }
                }
                Ok(Binding::Data(Value::List(values)))
            }
            other => Err(self.error(span, format!("keys must be a string or a sequence, not {}", other.kind()))),
        }
    }

    fn select(&self, loaded: &Namespace, key: &str, path: &Path, span: Span) -> LoadResult<Binding> {
        loaded
            .get(key)
            .cloned()
            .ok_or_else(|| self.error(span, format!("'{key}' is not defined in {}", path.display())))
    }
}

fn subscript(base: &Value, index: &Value) -> Result<Value, String> {
    match (base, index) {
        (Value::List(items), Value::Int(i)) => normalize_index(*i, items.len())
            .map(|i| items[i].clone())
            .ok_or_else(|| format!("list index {i} out of range")),
        (Value::Map(map), Value::Str(key)) => map.get(key).cloned().ok_or_else(|| format!("mapping has no key '{key}'")),
        (Value::Call(call), Value::Str(key)) if key == TARGET_KEY => Ok(Value::Str(call.target_name().to_string())),
        (Value::Call(call), Value::Str(key)) => call
            .arg(key)
            .cloned()
            .ok_or_else(|| format!("call to '{}' has no argument '{key}'", call.target_name())),
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            normalize_index(*i, chars.len())
                .map(|i| Value::Str(chars[i].to_string()))
                .ok_or_else(|| format!("string index {i} out of range"))
        }
        _ => Err(format!("'{}' is not subscriptable by '{}'", base.kind(), index.kind())),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len_i = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len_i } else { index };
    usize::try_from(index).ok().filter(|i| *i < len)
}

/// Write `value` at `segments` below `root`
///
/// With `create`, missing intermediate keys become empty mappings.
fn store_path(root: &mut Value, segments: &[Segment], value: Value, create: bool) -> Result<(), String> {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for segment in parents {
        current = match (current, segment) {
            (Value::Map(map), Segment::Key(key)) => {
                if create {
                    map.entry(key.clone()).or_insert_with(|| Value::Map(ConfigMap::new()))
                } else {
                    map.get_mut(key).ok_or_else(|| format!("mapping has no key '{key}'"))?
                }
            }
            (Value::Call(call), Segment::Key(key)) => {
                if create && call.arg(key).is_none() {
                    call.set_arg(key.clone(), Value::Map(ConfigMap::new()));
                }
                let target = call.target_name().to_string();
                call.arg_mut(key)
                    .ok_or_else(|| format!("call to '{target}' has no argument '{key}'"))?
            }
            (Value::List(items), Segment::Index(i)) => {
                let len = items.len();
                let index = normalize_index(*i, len).ok_or_else(|| format!("list index {i} out of range"))?;
                &mut items[index]
            }
            (other, segment) => {
                return Err(format!("cannot look up {} inside a {}", segment.describe(), other.kind()));
            }
        };
    }

    match (current, last) {
        (Value::Map(map), Segment::Key(key)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (Value::Call(call), Segment::Key(key)) if key == TARGET_KEY => match value {
            Value::Str(name) => {
                call.set_target(name);
                Ok(())
            }
            other => Err(format!("call target must be a string, not {}", other.kind())),
        },
        (Value::Call(call), Segment::Key(key)) => {
            call.set_arg(key.clone(), value);
            Ok(())
        }
        (Value::List(items), Segment::Index(i)) => {
            let len = items.len();
            let index = normalize_index(*i, len).ok_or_else(|| format!("list assignment index {i} out of range"))?;
            items[index] = value;
            Ok(())
        }
        (other, segment) => Err(format!("cannot assign {} inside a {}", segment.describe(), other.kind())),
    }
}
