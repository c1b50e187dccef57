//! Statement interpreter
use crate::compile::Compiler;
use crate::expr::{self, Expr, Host};
use crate::group::RESERVED_PREFIX;
use crate::source::{Input, LineReader};
use crate::stmt::{Stmt, Target};
use crate::symtab::{ModuleLoader, Scope, SymbolTable};
use crate::{Config, DefinedVar, Error, GroupRef, Procedure, Result, Val, Writer};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Outcome of executing a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Normal,
    Continue,
    Break,
    Return(Val),
}

/// Alphabet for call scope names
const SCOPE_ALPHABET: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Interpreter owning a symbol table and pending input
pub struct Evaluator {
    table: SymbolTable,
    scope: Scope,
    input: Input,
    config: Config,
    depth: usize,
}

impl Evaluator {
    /// Evaluator printing to stdout
    pub fn new(config: Config) -> Self {
        Self::with_writer(config, crate::stdout_writer())
    }

    /// Evaluator sending output and diagnostics to `writer`
    pub fn with_writer(config: Config, writer: Writer) -> Self {
        let mut table = SymbolTable::standard(writer);
        table.set_path(config.path.clone());
        table.set_extension(&config.extension);
        let scope = Scope::isolated(table.root().clone());
        let mut input = Input::new();
        input.set_prompts(&config.prompt, &config.continuation_prompt);
        Self {
            table,
            scope,
            input,
            config,
            depth: 0,
        }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut SymbolTable {
        &mut self.table
    }

    /// Top level execution context
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read further statements from `reader` once queued input runs out
    pub fn set_reader(&mut self, reader: Box<dyn LineReader>) {
        self.input.set_reader(Some(reader));
    }

    pub fn set_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.table.set_loader(loader);
    }

    /// Evaluate source text at top level, returning value of last expression
    pub fn eval(&mut self, text: &str) -> Result<Option<Val>> {
        self.input.push_text(text, "<string>");
        self.run()
    }

    /// Evaluate source file at top level
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Option<Val>> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{} - {e}", path.display())))?;
        self.input.push_text(&text, &path.display().to_string());
        self.run()
    }

    /// Run statements until input is exhausted. Pending input is discarded on
    /// failure.
    pub fn run(&mut self) -> Result<Option<Val>> {
        let mut last = None;
        loop {
            let stmt = match self.compile_next() {
                Ok(Stmt::Eof) => return Ok(last),
                Ok(stmt) => stmt,
                Err(e) => {
                    self.input.clear();
                    return Err(e);
                }
            };
            match self.execute(&stmt) {
                Ok(Some(v)) => last = Some(v),
                Ok(None) => (),
                Err(e) => {
                    self.input.clear();
                    return Err(e);
                }
            }
        }
    }

    /// Compile next top level statement from pending input
    pub fn compile_next(&mut self) -> Result<Stmt> {
        Compiler::new(&mut self.input, &self.table, &self.scope).compile()
    }

    /// Discard pending input
    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    /// Execute statement at top level. Returns value of expression
    /// statements that are not command-style calls.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Option<Val>> {
        let scope = self.scope.clone();
        match stmt {
            Stmt::Eval {
                expr,
                command: false,
            } => self.eval_expr(expr, &scope).map(Some),
            stmt => {
                match self.interpret(stmt, &scope)? {
                    Signal::Normal => (),
                    sig => warn!("ignoring {sig:?} outside of loop or procedure"),
                }
                Ok(None)
            }
        }
    }

    /// Run statements from `input` in `scope` until exhausted
    pub(crate) fn run_input(&mut self, input: &mut Input, scope: &Scope) -> Result<()> {
        loop {
            let stmt = Compiler::new(input, &self.table, scope).compile()?;
            if let Stmt::Eof = stmt {
                return Ok(());
            }
            if let Signal::Return(_) = self.interpret(&stmt, scope)? {
                warn!("ignoring return outside of procedure");
            }
        }
    }

    /// Execute statement in given scope
    pub fn interpret(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Signal> {
        match stmt {
            Stmt::Eval { expr, .. } => {
                self.eval_expr(expr, scope)?;
            }
            Stmt::Assign { target, value } => self.assign(target, value, scope)?,
            Stmt::DefVar { name, expr } => {
                let var = DefinedVar {
                    expr: expr.clone(),
                    source: expr.source().to_string(),
                };
                self.table
                    .set_symbol(scope, name, Val::Defined(Arc::new(var)), None)?;
            }
            Stmt::Def(def) => {
                let mut kwargs = vec![];
                for (name, default) in &def.kwargs {
                    kwargs.push((name.clone(), self.eval_expr(default, scope)?));
                }
                let procedure = Procedure {
                    name: def.name.clone(),
                    params: def.params.clone(),
                    kwargs,
                    body: def.body.clone(),
                    doc: def.doc.clone(),
                };
                self.table
                    .set_symbol(scope, &def.name, Val::Proc(Arc::new(procedure)), None)?;
            }
            Stmt::If(branches) => {
                for (cond, body) in branches {
                    if self.eval_expr(cond, scope)?.is_true() {
                        return self.block(body, scope);
                    }
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_expr(cond, scope)?.is_true() {
                    match self.block(body, scope)? {
                        Signal::Break => break,
                        Signal::Return(v) => return Ok(Signal::Return(v)),
                        Signal::Normal | Signal::Continue => (),
                    }
                }
            }
            Stmt::For { var, iter, body } => {
                for item in iterable(self.eval_expr(iter, scope)?)? {
                    self.bind_local(scope, var, item)?;
                    match self.block(body, scope)? {
                        Signal::Break => break,
                        Signal::Return(v) => return Ok(Signal::Return(v)),
                        Signal::Normal | Signal::Continue => (),
                    }
                }
            }
            Stmt::Try { body, except } => match self.block(body, scope) {
                Ok(sig) => return Ok(sig),
                Err(e) => {
                    debug!("try block failed - {e}");
                    return self.block(except, scope);
                }
            },
            Stmt::Del(names) => {
                for name in names {
                    self.table.delete_symbol(scope, name)?;
                }
            }
            Stmt::Print(items) => {
                let items = match items {
                    Some(expr) => items_of(self.eval_expr(expr, scope)?),
                    None => vec![],
                };
                let line = items
                    .iter()
                    .map(Val::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.table.write(&format!("{line}\n"));
            }
            Stmt::Return(values) => {
                let v = match values {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Val::Nil,
                };
                return Ok(Signal::Return(v));
            }
            Stmt::Break => return Ok(Signal::Break),
            Stmt::Continue => return Ok(Signal::Continue),
            Stmt::Import(imports) => {
                for import in imports {
                    self.import(
                        scope,
                        &import.module,
                        import.alias.as_deref(),
                        import.names.as_deref(),
                        false,
                    )?;
                }
            }
            Stmt::Eof => (),
        }
        Ok(Signal::Normal)
    }

    /// Execute statements until one produces a signal other than Normal
    fn block(&mut self, body: &[Stmt], scope: &Scope) -> Result<Signal> {
        for stmt in body {
            match self.interpret(stmt, scope)? {
                Signal::Normal => (),
                sig => return Ok(sig),
            }
        }
        Ok(Signal::Normal)
    }

    fn bind_local(&self, scope: &Scope, name: &str, value: Val) -> Result<()> {
        if scope.local().is_const(name) {
            return Err(Error::InvalidTarget(format!(
                "cannot re-assign value of constant {name}"
            )));
        }
        scope.local().set(name, value);
        Ok(())
    }

    fn assign(&mut self, target: &Target, value: &Expr, scope: &Scope) -> Result<()> {
        let mut indices = vec![];
        for group in &target.path {
            for idx in group {
                indices.push(self.eval_expr(idx, scope)?);
            }
        }
        let value = self.eval_expr(value, scope)?;

        let (group, name) = self.table.binding_slot(scope, &target.name, None)?;
        if group.is_const(&name) {
            return Err(Error::InvalidTarget(format!(
                "cannot re-assign value of constant {}",
                target.name
            )));
        }
        if indices.is_empty() {
            group.set(&name, value);
            return Ok(());
        }

        let mut stored = group.get(&name)?;
        if let Val::Defined(_) = stored {
            return Err(Error::InvalidTarget(format!(
                "cannot assign into defined variable {}",
                target.name
            )));
        }
        // copy-on-write: values bound elsewhere never see the change
        let mut slot = &mut stored;
        for idx in &indices {
            slot = expr::index_mut(slot, idx)?;
        }
        *slot = value;
        group.set(&name, stored);
        Ok(())
    }

    /// Evaluate expression in given scope
    pub fn eval_expr(&mut self, expr: &Expr, scope: &Scope) -> Result<Val> {
        expr::eval(expr, &mut Frame { ev: self, scope })
    }

    /// Invoke callable value
    pub fn call(
        &mut self,
        func: Val,
        args: Vec<Val>,
        kwargs: Vec<(String, Val)>,
        scope: &Scope,
    ) -> Result<Val> {
        match func {
            Val::Proc(p) => self.call_procedure(&p, args, kwargs),
            Val::Native(n) => {
                if !kwargs.is_empty() {
                    return Err(Error::UnexpectedArguments(format!(
                        "{} does not take keyword arguments",
                        n.name
                    )));
                }
                (n.func)(&mut Frame { ev: self, scope }, &args)
            }
            v => Err(Error::InvalidTarget(format!(
                "{} is not callable",
                v.type_name()
            ))),
        }
    }

    /// Invoke procedure in a fresh call scope.
    ///
    /// Failures in the procedure body are reported through the writer and
    /// yield Nil.
    pub fn call_procedure(
        &mut self,
        proc: &Procedure,
        args: Vec<Val>,
        kwargs: Vec<(String, Val)>,
    ) -> Result<Val> {
        if args.len() != proc.params.len() {
            return Err(Error::UnexpectedArguments(format!(
                "{} takes {} positional arguments - got {}",
                proc.name,
                proc.params.len(),
                args.len()
            )));
        }
        if self.depth >= self.config.max_depth {
            return Err(Error::EvaluationFailure(format!(
                "maximum call depth exceeded in {}",
                proc.name
            )));
        }

        let call_scope = CallScope::new(self.table.root(), &proc.name);
        let scope = Scope::isolated(call_scope.group.clone());
        for (param, arg) in proc.params.iter().zip(args) {
            scope.local().set(param, arg);
        }
        let mut bound = proc.kwargs.clone();
        for (name, value) in kwargs {
            match bound.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = value,
                None => bound.push((name, value)),
            }
        }
        for (name, value) in bound {
            scope.local().set(&name, value);
        }

        debug!("calling {} in {}", proc.name, call_scope.name);
        self.depth += 1;
        let result = self.block(&proc.body, &scope);
        self.depth -= 1;

        match result {
            Ok(Signal::Return(v)) => Ok(unwrap_singleton(v)),
            Ok(Signal::Normal) => Ok(Val::Nil),
            Ok(sig) => {
                warn!("ignoring {sig:?} outside of loop in {}", proc.name);
                Ok(Val::Nil)
            }
            Err(e) => {
                error!("error in procedure {} - {e}", proc.name);
                self.table
                    .write(&format!("Error in procedure {}: {e}\n", proc.name));
                Ok(Val::Nil)
            }
        }
    }
}

/// Anonymous namespace for a single procedure call, detached from root when dropped
struct CallScope {
    parent: GroupRef,
    name: String,
    group: GroupRef,
}

impl CallScope {
    fn new(parent: &GroupRef, proc: &str) -> Self {
        let name = format!(
            "{RESERVED_PREFIX}{proc}_{}",
            nanoid::nanoid!(8, &SCOPE_ALPHABET)
        );
        let group = GroupRef::new();
        parent.set(&name, Val::Group(group.clone()));
        Self {
            parent: parent.clone(),
            name,
            group,
        }
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        self.parent.remove(&self.name);
    }
}

/// Procedures return lists of values, a single value is returned bare
fn unwrap_singleton(v: Val) -> Val {
    match v {
        Val::List(mut items) if items.len() == 1 => items.remove(0),
        v => v,
    }
}

fn items_of(v: Val) -> Vec<Val> {
    match v {
        Val::List(items) => items,
        v => vec![v],
    }
}

/// Items a `for` loop iterates over
fn iterable(v: Val) -> Result<Vec<Val>> {
    match v {
        Val::List(items) => Ok(items),
        Val::String(s) => Ok(s.chars().map(|c| Val::String(c.to_string())).collect()),
        Val::Group(g) => Ok(g.names().into_iter().map(Val::String).collect()),
        v => Err(Error::InvalidTarget(format!(
            "cannot iterate over {}",
            v.type_name()
        ))),
    }
}

/// Evaluator bound to the scope an expression runs in. Passed to native
/// functions.
pub struct Frame<'a> {
    ev: &'a mut Evaluator,
    scope: &'a Scope,
}

impl Frame<'_> {
    pub fn scope(&self) -> &Scope {
        self.scope
    }

    pub fn table(&self) -> &SymbolTable {
        &self.ev.table
    }

    pub fn write(&self, text: &str) {
        self.ev.table.write(text)
    }

    /// Import or reload module into current module scope
    pub fn import(&mut self, name: &str, reload: bool) -> Result<GroupRef> {
        self.ev.import(self.scope, name, None, None, reload)
    }

    pub fn call(&mut self, func: Val, args: Vec<Val>) -> Result<Val> {
        self.ev.call(func, args, vec![], self.scope)
    }
}

impl Host for Frame<'_> {
    fn lookup(&mut self, name: &str) -> Result<Val> {
        match self.ev.table.get_symbol(self.scope, name)? {
            Val::Defined(var) => {
                if self.ev.depth >= self.ev.config.max_depth {
                    return Err(Error::EvaluationFailure(format!(
                        "maximum depth exceeded evaluating {name}"
                    )));
                }
                self.ev.depth += 1;
                let v = self.ev.eval_expr(&var.expr, self.scope);
                self.ev.depth -= 1;
                v
            }
            v => Ok(v),
        }
    }

    fn call(&mut self, func: Val, args: Vec<Val>, kwargs: Vec<(String, Val)>) -> Result<Val> {
        self.ev.call(func, args, kwargs, self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Mutex;

    fn evaluator() -> (Evaluator, Arc<Mutex<String>>) {
        let out = Arc::new(Mutex::new(String::new()));
        let sink = out.clone();
        let ev = Evaluator::with_writer(
            Config::default(),
            Arc::new(move |s: &str| sink.lock().unwrap().push_str(s)),
        );
        (ev, out)
    }

    #[test]
    fn eval_returns_last_value() {
        let (mut ev, _) = evaluator();
        assert_eq!(ev.eval("x = 2\nx * 3"), Ok(Some(Val::Int(6))));
        assert_eq!(ev.eval("y = 1"), Ok(None));
    }

    #[test]
    fn print_joins_items() {
        let (mut ev, out) = evaluator();
        ev.eval("print 1, 'two', [3]\nprint").unwrap();
        assert_eq!(*out.lock().unwrap(), "1 two [3]\n\n");
    }

    #[test]
    fn command_style_value_is_suppressed() {
        let (mut ev, _) = evaluator();
        assert_eq!(ev.eval("len 'abc'"), Ok(None));
        assert_eq!(ev.eval("len('abc')"), Ok(Some(Val::Int(3))));
    }

    #[test]
    fn failure_discards_pending_input() {
        let (mut ev, _) = evaluator();
        assert_matches!(ev.eval("nope\nx = 1"), Err(Error::UnresolvedSymbol(_)));
        assert_matches!(ev.eval("x"), Err(Error::UnresolvedSymbol(_)));
    }

    #[test]
    fn defined_variable_is_live() {
        let (mut ev, _) = evaluator();
        ev.eval("a = 1\ndef b = a + 1\na = 10").unwrap();
        assert_eq!(ev.eval("b"), Ok(Some(Val::Int(11))));
        assert_matches!(ev.eval("b[0] = 1"), Err(Error::InvalidTarget(_)));
        ev.eval("b = 3").unwrap();
        assert_eq!(ev.eval("a = 20\nb"), Ok(Some(Val::Int(3))));
    }

    #[test]
    fn call_scope_is_removed() {
        let (mut ev, _) = evaluator();
        ev.eval("def f(x): return x").unwrap();
        let before = ev.table().root().total_len();
        assert_eq!(ev.eval("f(1)"), Ok(Some(Val::Int(1))));
        assert_eq!(ev.eval("f()"), Err(Error::UnexpectedArguments(
            "f takes 1 positional arguments - got 0".to_string()
        )));
        assert_eq!(ev.table().root().total_len(), before);
    }

    #[test]
    fn procedure_failure_is_reported() {
        let (mut ev, out) = evaluator();
        ev.eval("def f():\n  return nope\nenddef").unwrap();
        assert_eq!(ev.eval("f()"), Ok(Some(Val::Nil)));
        assert!(out
            .lock()
            .unwrap()
            .starts_with("Error in procedure f: Unresolved symbol - nope"));
    }

    #[test]
    fn recursion_is_bounded() {
        let mut ev = Evaluator::with_writer(
            Config {
                max_depth: 32,
                ..Config::default()
            },
            Arc::new(|_: &str| ()),
        );
        ev.eval("def fact(n):\n  if n <= 1: return 1\n  return n * fact(n - 1)\nenddef")
            .unwrap();
        assert_eq!(ev.eval("fact(10)"), Ok(Some(Val::Int(3628800))));

        ev.eval("def forever(n): return forever(n)").unwrap();
        assert_eq!(ev.eval("forever(1)"), Ok(Some(Val::Nil)));
    }

    #[test]
    fn native_rejects_kwargs() {
        let (mut ev, _) = evaluator();
        assert_matches!(ev.eval("len('a', x=1)"), Err(Error::UnexpectedArguments(_)));
    }

    #[test]
    fn for_over_string_and_group() {
        let (mut ev, out) = evaluator();
        ev.eval("for c in 'ab': print c").unwrap();
        ev.eval("g = group()\ng.y = 1\ng.x = 2\nfor n in g: print n").unwrap();
        assert_eq!(*out.lock().unwrap(), "a\nb\nx\ny\n");
        assert_matches!(ev.eval("for i in 3: print i"), Err(Error::InvalidTarget(_)));
    }
}
