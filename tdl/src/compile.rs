//! Compiler from logical statements to [Stmt] trees
use crate::expr::{self, Arg, Expr, Node};
use crate::source::{find_assign, find_top_level, find_word, strip_enclosing, Input, Statement};
use crate::stmt::{Import, ProcDef, Stmt, Target};
use crate::symtab::{Scope, SymbolTable};
use crate::{Error, Result};
use std::sync::Arc;

/// Keywords only valid while compiling the block they belong to
const BLOCK_KEYWORDS: [&str; 8] = [
    "elif", "else", "endif", "endwhile", "endfor", "enddef", "except", "endtry",
];

/// Compiles statements from an [Input], one at a time.
///
/// Compilation consults the symbol table to recognise command-style calls,
/// so statements should be compiled just before they are executed.
pub struct Compiler<'a> {
    input: &'a mut Input,
    table: &'a SymbolTable,
    scope: &'a Scope,
}

impl<'a> Compiler<'a> {
    pub fn new(input: &'a mut Input, table: &'a SymbolTable, scope: &'a Scope) -> Self {
        Self {
            input,
            table,
            scope,
        }
    }

    /// Compile next statement, or [Stmt::Eof] at end of input
    pub fn compile(&mut self) -> Result<Stmt> {
        match self.input.next_statement() {
            Some(st) => self.statement(&st),
            None => Ok(Stmt::Eof),
        }
    }

    fn statement(&mut self, st: &Statement) -> Result<Stmt> {
        let rest = st.text[st.key.len()..].trim();
        match st.key.as_str() {
            "if" => self.if_stmt(st, rest),
            "while" => self.while_stmt(st, rest),
            "for" => self.for_stmt(st, rest),
            "try" => self.try_stmt(st, rest),
            "def" => self.def_stmt(st, rest),
            "del" => Ok(Stmt::Del(del_names(st, rest)?)),
            "print" => Ok(Stmt::Print(arg_list(rest)?)),
            "return" => Ok(Stmt::Return(arg_list(rest)?)),
            "break" | "continue" => {
                if !rest.is_empty() {
                    return Err(malformed(st, &format!("unexpected text after {}", st.key)));
                }
                Ok(if st.key == "break" {
                    Stmt::Break
                } else {
                    Stmt::Continue
                })
            }
            "import" | "from" if is_import(st, rest) => import_stmt(st, rest),
            key if BLOCK_KEYWORDS.contains(&key) && is_keyword_use(rest) => {
                Err(malformed(st, &format!("'{key}' outside of block")))
            }
            _ => self.simple(st),
        }
    }

    /// Compile trailing text of a block header as a statement
    fn inline(&mut self, st: &Statement, text: &str) -> Result<Stmt> {
        self.statement(&Statement::new(text, st.lineno, st.file.clone()))
    }

    /// Body started by trailing text of a continuation keyword, e.g. `else: x = 1`
    fn leading(&mut self, st: &Statement, text: &str) -> Result<Vec<Stmt>> {
        if text.is_empty() {
            Ok(vec![])
        } else {
            Ok(vec![self.inline(st, text)?])
        }
    }

    /// Compile statements up to one of `terminators`, returning the body and
    /// the terminating statement
    fn block(&mut self, st: &Statement, terminators: &[&str]) -> Result<(Vec<Stmt>, Statement)> {
        self.input.enter_block();
        let result = self.block_inner(st, terminators);
        self.input.exit_block();
        result
    }

    fn block_inner(
        &mut self,
        st: &Statement,
        terminators: &[&str],
    ) -> Result<(Vec<Stmt>, Statement)> {
        let mut body = vec![];
        loop {
            let Some(next) = self.input.next_statement() else {
                return Err(malformed(
                    st,
                    &format!("missing {} before end of input", terminators.join(" or ")),
                ));
            };
            if terminators.contains(&next.key.as_str()) {
                return Ok((body, next));
            }
            body.push(self.statement(&next)?);
        }
    }

    fn if_stmt(&mut self, st: &Statement, rest: &str) -> Result<Stmt> {
        let (head, tail) = header(st, rest)?;
        let cond = condition(st, head)?;
        if !tail.is_empty() {
            return Ok(Stmt::If(vec![(cond, vec![self.inline(st, tail)?])]));
        }

        let mut branches = vec![];
        let mut current = (cond, vec![]);
        let mut seen_else = false;
        loop {
            let (body, term) = self.block(st, &["elif", "else", "endif"])?;
            current.1.extend(body);
            branches.push(current);
            let term_rest = term.text[term.key.len()..].trim();
            match term.key.as_str() {
                "endif" => {
                    end_keyword(&term, term_rest)?;
                    return Ok(Stmt::If(branches));
                }
                _ if seen_else => {
                    return Err(malformed(&term, &format!("'{}' after else", term.key)));
                }
                "elif" => {
                    let (head, tail) = header(&term, term_rest)?;
                    current = (condition(&term, head)?, self.leading(&term, tail)?);
                }
                _ => {
                    seen_else = true;
                    let tail = bare_header(&term, term_rest)?;
                    current = (expr::compile("True")?, self.leading(&term, tail)?);
                }
            }
        }
    }

    fn while_stmt(&mut self, st: &Statement, rest: &str) -> Result<Stmt> {
        let (head, tail) = header(st, rest)?;
        let cond = condition(st, head)?;
        let body = self.body(st, tail, "endwhile")?;
        Ok(Stmt::While { cond, body })
    }

    fn for_stmt(&mut self, st: &Statement, rest: &str) -> Result<Stmt> {
        let (head, tail) = header(st, rest)?;
        let i = find_word(head, "in").ok_or_else(|| malformed(st, "expected 'in'"))?;
        let var = expr::compile(&head[..i])
            .ok()
            .and_then(|e| e.as_name().map(String::from))
            .filter(|n| !n.contains('.'))
            .ok_or_else(|| malformed(st, "loop variable must be a single name"))?;
        let iter = condition(st, &head[i + 2..])?;
        let body = self.body(st, tail, "endfor")?;
        Ok(Stmt::For { var, iter, body })
    }

    fn try_stmt(&mut self, st: &Statement, rest: &str) -> Result<Stmt> {
        let tail = bare_header(st, rest)?;
        if !tail.is_empty() {
            return Err(malformed(st, "try requires a block"));
        }
        let (body, term) = self.block(st, &["except", "endtry"])?;
        if term.key == "endtry" {
            end_keyword(&term, term.text[term.key.len()..].trim())?;
            return Ok(Stmt::Try {
                body,
                except: vec![],
            });
        }
        let tail = bare_header(&term, term.text[term.key.len()..].trim())?;
        let mut except = self.leading(&term, tail)?;
        let (rest, end) = self.block(st, &["endtry"])?;
        end_keyword(&end, end.text[end.key.len()..].trim())?;
        except.extend(rest);
        Ok(Stmt::Try { body, except })
    }

    /// Inline body from `tail`, or a block up to `terminator`
    fn body(&mut self, st: &Statement, tail: &str, terminator: &str) -> Result<Vec<Stmt>> {
        if !tail.is_empty() {
            return Ok(vec![self.inline(st, tail)?]);
        }
        let (body, term) = self.block(st, &[terminator])?;
        end_keyword(&term, term.text[term.key.len()..].trim())?;
        Ok(body)
    }

    fn def_stmt(&mut self, st: &Statement, rest: &str) -> Result<Stmt> {
        let Some(colon) = find_top_level(rest, ':') else {
            return defvar(st, rest);
        };
        let (head, tail) = (rest[..colon].trim(), rest[colon + 1..].trim());
        let node = expr::parse(head)
            .map_err(|e| malformed(st, &format!("invalid procedure header - {e}")))?;
        let (name, args) = match node {
            Node::Call(func, args) => match *func {
                Node::Name(name) => (name, args),
                _ => return Err(malformed(st, "invalid procedure name")),
            },
            Node::Name(name) => (name, vec![]),
            _ => return Err(malformed(st, "invalid procedure header")),
        };

        let mut params = vec![];
        let mut kwargs = vec![];
        for arg in args {
            match arg {
                Arg::Pos(Node::Name(p)) if !p.contains('.') => {
                    if !kwargs.is_empty() {
                        return Err(malformed(
                            st,
                            &format!("parameter {p} follows keyword parameter"),
                        ));
                    }
                    params.push(p);
                }
                Arg::Kw(k, default) => kwargs.push((k, Expr::from_node(&default, head)?)),
                _ => return Err(malformed(st, "invalid parameter")),
            }
        }

        let mut body = if tail.is_empty() {
            let (body, term) = self.block(st, &["enddef"])?;
            end_keyword(&term, term.text[term.key.len()..].trim())?;
            body
        } else {
            match self.inline(st, tail)? {
                Stmt::Eval {
                    expr,
                    command: false,
                } if expr.as_str_literal().is_none() => vec![Stmt::Return(Some(expr))],
                stmt => vec![stmt],
            }
        };

        let doc = match body.first() {
            Some(Stmt::Eval { expr, .. }) => expr.as_str_literal().map(docstring),
            _ => None,
        };
        if doc.is_some() {
            body.remove(0);
        }

        Ok(Stmt::Def(Arc::new(ProcDef {
            name,
            params,
            kwargs,
            body: Arc::new(body),
            doc,
        })))
    }

    /// Assignment, command-style call, or expression
    fn simple(&mut self, st: &Statement) -> Result<Stmt> {
        if let Some(call) = self.command_call(&st.text) {
            let expr = expr::compile(&call)
                .map_err(|e| malformed(st, &format!("invalid command - {e}")))?;
            return Ok(Stmt::Eval {
                expr,
                command: true,
            });
        }

        let Some(i) = find_assign(&st.text) else {
            return Ok(Stmt::Eval {
                expr: expr::compile(&st.text)?,
                command: false,
            });
        };
        let (lhs, rhs) = (st.text[..i].trim(), st.text[i + 1..].trim());
        if rhs.is_empty() {
            return Err(malformed(st, "missing value in assignment"));
        }
        let target = target(lhs).ok_or_else(|| malformed(st, "invalid assignment target"))??;
        Ok(Stmt::Assign {
            target,
            value: expr::compile(rhs)?,
        })
    }

    /// Rewrite `name arg, ...` as `name(arg, ...)` when name is callable
    fn command_call(&self, text: &str) -> Option<String> {
        let word = text.split_whitespace().next()?;
        if word.contains(['(', ',', '=', '[', '\'', '"']) {
            return None;
        }
        if !matches!(self.table.get_symbol(self.scope, word), Ok(v) if v.is_callable()) {
            return None;
        }
        let rest = text[word.len()..].trim();
        if rest.starts_with(['=', '[', '.', '+', '-', '*', '/', '%', '<', '>', '!'])
            || ["and", "or", "in", "not", "if"]
                .iter()
                .any(|op| find_word(rest, op) == Some(0))
        {
            return None;
        }
        Some(format!("{word}({rest})"))
    }
}

fn malformed(st: &Statement, msg: &str) -> Error {
    Error::MalformedStatement(format!(
        "{msg} at {}:{} - '{}'",
        st.file, st.lineno, st.text
    ))
}

/// Whether a block keyword is used as a statement rather than as a name
fn is_keyword_use(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with(':') || !rest.starts_with(['=', '[', '.', '('])
}

/// Split block header at its colon into head and trailing statement
fn header<'s>(st: &Statement, rest: &'s str) -> Result<(&'s str, &'s str)> {
    let i = find_top_level(rest, ':').ok_or_else(|| malformed(st, "expected ':'"))?;
    Ok((rest[..i].trim(), rest[i + 1..].trim()))
}

/// Header of `else`, `try`, `except` with optional colon and no condition
fn bare_header<'s>(st: &Statement, rest: &'s str) -> Result<&'s str> {
    match rest.strip_prefix(':') {
        Some(tail) => Ok(tail.trim()),
        None if rest.is_empty() => Ok(rest),
        None => Err(malformed(st, &format!("unexpected text after {}", st.key))),
    }
}

/// Block terminators take no arguments
fn end_keyword(st: &Statement, rest: &str) -> Result<()> {
    if rest.is_empty() || rest == ":" {
        Ok(())
    } else {
        Err(malformed(st, &format!("unexpected text after {}", st.key)))
    }
}

fn condition(st: &Statement, text: &str) -> Result<Expr> {
    if text.is_empty() {
        return Err(malformed(st, "missing condition"));
    }
    expr::compile(text)
}

/// Expression for optional list of `print` / `return` arguments
fn arg_list(rest: &str) -> Result<Option<Expr>> {
    let inner = strip_enclosing(rest);
    if inner.trim().is_empty() {
        return Ok(None);
    }
    expr::compile(&format!("[{inner}]")).map(Some)
}

fn del_names(st: &Statement, rest: &str) -> Result<Vec<String>> {
    let inner = strip_enclosing(rest);
    if inner.trim().is_empty() {
        return Err(malformed(st, "nothing to delete"));
    }
    match expr::parse(&format!("[{inner}]"))? {
        Node::List(items) => items
            .into_iter()
            .map(|n| match n {
                Node::Name(name) => Ok(name),
                _ => Err(malformed(st, "only names can be deleted")),
            })
            .collect(),
        _ => Err(malformed(st, "invalid del statement")),
    }
}

/// `def name = expr`
fn defvar(st: &Statement, rest: &str) -> Result<Stmt> {
    let i = find_assign(rest).ok_or_else(|| malformed(st, "expected ':' or '='"))?;
    let (lhs, rhs) = (rest[..i].trim(), rest[i + 1..].trim());
    let name = expr::compile(lhs)
        .ok()
        .and_then(|e| e.as_name().map(String::from))
        .ok_or_else(|| malformed(st, "invalid name for defined variable"))?;
    if rhs.is_empty() {
        return Err(malformed(st, "missing expression"));
    }
    Ok(Stmt::DefVar {
        name,
        expr: expr::compile(rhs)?,
    })
}

/// Assignment target from left hand side, `None` if it is not assignable
fn target(lhs: &str) -> Option<Result<Target>> {
    fn walk(node: Node, source: &str, path: &mut Vec<Vec<Expr>>) -> Option<Result<String>> {
        match node {
            Node::Name(name) => Some(Ok(name)),
            Node::Index(base, indices) => {
                let name = walk(*base, source, path)?;
                let exprs = indices
                    .iter()
                    .map(|n| Expr::from_node(n, source))
                    .collect::<Result<Vec<_>>>();
                match exprs {
                    Ok(exprs) => path.push(exprs),
                    Err(e) => return Some(Err(e)),
                }
                Some(name)
            }
            _ => None,
        }
    }

    let node = expr::parse(lhs).ok()?;
    let mut path = vec![];
    let name = walk(node, lhs, &mut path)?;
    Some(name.map(|name| Target { name, path }))
}

/// Strip common leading whitespace from docstring lines
fn docstring(text: &str) -> String {
    text.trim()
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_import(st: &Statement, rest: &str) -> bool {
    !rest.is_empty()
        && !rest.starts_with(['=', '[', '.', '('])
        && (st.key == "import" || find_word(rest, "import").is_some())
}

fn import_stmt(st: &Statement, rest: &str) -> Result<Stmt> {
    let is_ident = |s: &str| {
        !s.is_empty()
            && !s.starts_with(|c: char| c.is_ascii_digit())
            && s.chars().all(|c| c.is_alphanumeric() || c == '_')
    };
    let invalid = || malformed(st, "invalid import statement");

    if st.key == "from" {
        let i = find_word(rest, "import").ok_or_else(invalid)?;
        let module = rest[..i].trim();
        let names: Vec<String> = strip_enclosing(&rest[i + "import".len()..])
            .split(',')
            .map(|n| n.trim().to_string())
            .collect();
        if !is_ident(module) || !names.iter().all(|n| is_ident(n.as_str())) {
            return Err(invalid());
        }
        return Ok(Stmt::Import(vec![Import {
            module: module.to_string(),
            alias: None,
            names: Some(names),
        }]));
    }

    rest.split(',')
        .map(|item| {
            let words: Vec<&str> = item.split_whitespace().collect();
            let (module, alias) = match words[..] {
                [module] => (module, None),
                [module, "as", alias] => (module, Some(alias)),
                _ => return Err(invalid()),
            };
            if !is_ident(module) || !alias.map_or(true, is_ident) {
                return Err(invalid());
            }
            Ok(Import {
                module: module.to_string(),
                alias: alias.map(String::from),
                names: None,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Stmt::Import)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdout_writer;
    use assert_matches::assert_matches;

    fn compile_all(text: &str) -> Result<Vec<Stmt>> {
        let table = SymbolTable::standard(stdout_writer());
        let scope = Scope::isolated(table.root().clone());
        let mut input = Input::new();
        input.push_text(text, "test");
        let mut compiler = Compiler::new(&mut input, &table, &scope);
        let mut stmts = vec![];
        loop {
            match compiler.compile()? {
                Stmt::Eof => return Ok(stmts),
                s => stmts.push(s),
            }
        }
    }

    fn compile_one(text: &str) -> Result<Stmt> {
        let mut stmts = compile_all(text)?;
        assert_eq!(stmts.len(), 1, "expected single statement from {text}");
        Ok(stmts.remove(0))
    }

    #[test]
    fn eval_and_assign() {
        assert_matches!(compile_one("1 + 2"), Ok(Stmt::Eval { command: false, .. }));
        assert_matches!(
            compile_one("x = 1"),
            Ok(Stmt::Assign { target: Target { name, path }, .. }) if name == "x" && path.is_empty()
        );
        assert_matches!(
            compile_one("m[0][1, 2] = 1"),
            Ok(Stmt::Assign { target: Target { name, path }, .. })
                if name == "m" && path.len() == 2 && path[1].len() == 2
        );
        assert_matches!(compile_one("x == 1"), Ok(Stmt::Eval { .. }));
    }

    #[test]
    fn invalid_assign_target() {
        assert_matches!(compile_one("f(x) = 1"), Err(Error::MalformedStatement(_)));
        assert_matches!(compile_one("1 = x"), Err(Error::MalformedStatement(_)));
        assert_matches!(compile_one("x ="), Err(Error::MalformedStatement(_)));
    }

    #[test]
    fn command_style_call() {
        let stmt = compile_one("len 'abc'").unwrap();
        assert_matches!(&stmt, Stmt::Eval { command: true, expr } if expr.source() == "len('abc')");
        assert_matches!(compile_one("len"), Ok(Stmt::Eval { command: true, .. }));
        // callable names used as values are not rewritten
        assert_matches!(compile_one("len == len"), Ok(Stmt::Eval { command: false, .. }));
        assert_matches!(compile_one("len = 3"), Ok(Stmt::Assign { .. }));
    }

    #[test]
    fn if_branches() {
        let stmt = compile_one("if x:\n  a = 1\nelif y: b = 2\nelse:\n  c = 3\nendif").unwrap();
        assert_matches!(stmt, Stmt::If(branches) if branches.len() == 3);

        let stmt = compile_one("if x: a = 1").unwrap();
        assert_matches!(stmt, Stmt::If(branches) if branches.len() == 1 && branches[0].1.len() == 1);

        let stmt = compile_one("if x:\nelse: b = 1\nendif").unwrap();
        assert_matches!(stmt, Stmt::If(branches) if branches.len() == 2 && branches[0].1.is_empty());
    }

    #[test]
    fn if_errors() {
        assert_matches!(
            compile_all("if x:\nelse:\nelif y:\nendif"),
            Err(Error::MalformedStatement(_))
        );
        assert_matches!(
            compile_all("if x:\nelse:\nelse:\nendif"),
            Err(Error::MalformedStatement(_))
        );
        assert_matches!(compile_all("if x:\n a = 1"), Err(Error::MalformedStatement(_)));
        assert_matches!(compile_all("if x\n a = 1\nendif"), Err(Error::MalformedStatement(_)));
        assert_matches!(compile_all("endif"), Err(Error::MalformedStatement(_)));
        assert_matches!(compile_all("else:"), Err(Error::MalformedStatement(_)));
    }

    #[test]
    fn loops() {
        assert_matches!(
            compile_one("for i in range(3):\n  print i\nendfor"),
            Ok(Stmt::For { var, body, .. }) if var == "i" && body.len() == 1
        );
        assert_matches!(
            compile_one("for x.y in l: print x"),
            Err(Error::MalformedStatement(_))
        );
        assert_matches!(
            compile_one("for (a, b) in l: print a"),
            Err(Error::MalformedStatement(_))
        );
        assert_matches!(
            compile_one("while x < 3:\n  x = x + 1\n  if x == 2: break\nendwhile"),
            Ok(Stmt::While { body, .. }) if body.len() == 2
        );
        assert_matches!(compile_one("break now"), Err(Error::MalformedStatement(_)));
    }

    #[test]
    fn try_except() {
        assert_matches!(
            compile_one("try:\n  x = 1\nexcept:\n  x = 2\n  y = 3\nendtry"),
            Ok(Stmt::Try { body, except }) if body.len() == 1 && except.len() == 2
        );
        assert_matches!(
            compile_one("try:\n  x = 1\nexcept: x = 2\nendtry"),
            Ok(Stmt::Try { except, .. }) if except.len() == 1
        );
        assert_matches!(compile_one("try: x = 1"), Err(Error::MalformedStatement(_)));
    }

    #[test]
    fn def_forms() {
        assert_matches!(
            compile_one("def total = a + b"),
            Ok(Stmt::DefVar { name, .. }) if name == "total"
        );

        let Ok(Stmt::Def(def)) = compile_one("def f(x, y=2): x + y") else {
            panic!("expected def");
        };
        assert_eq!(def.name, "f");
        assert_eq!(def.params, vec!["x"]);
        assert_eq!(def.kwargs.len(), 1);
        assert_matches!(def.body[..], [Stmt::Return(Some(_))]);

        let Ok(Stmt::Def(def)) =
            compile_one("def g():\n  '''Does\n     things'''\n  return 1\nenddef")
        else {
            panic!("expected def");
        };
        assert_eq!(def.doc.as_deref(), Some("Does\nthings"));
        assert_matches!(def.body[..], [Stmt::Return(_)]);
    }

    #[test]
    fn def_errors() {
        assert_matches!(
            compile_one("def f(x=1, y): return y"),
            Err(Error::MalformedStatement(_))
        );
        assert_matches!(
            compile_one("def f(1): return 1"),
            Err(Error::MalformedStatement(_))
        );
        assert_matches!(compile_all("def f():\n  return 1"), Err(Error::MalformedStatement(_)));
    }

    #[test]
    fn argument_lists() {
        assert_matches!(compile_one("print"), Ok(Stmt::Print(None)));
        assert_matches!(compile_one("print()"), Ok(Stmt::Print(None)));
        assert_matches!(
            compile_one("print(1, 2)"),
            Ok(Stmt::Print(Some(e))) if e.source() == "[1, 2]"
        );
        assert_matches!(
            compile_one("return (a) + (b)"),
            Ok(Stmt::Return(Some(e))) if e.source() == "[(a) + (b)]"
        );
        assert_matches!(
            compile_one("del a, b.c"),
            Ok(Stmt::Del(names)) if names == vec!["a", "b.c"]
        );
        assert_matches!(compile_one("del a[0]"), Err(Error::MalformedStatement(_)));
    }

    #[test]
    fn imports() {
        assert_matches!(
            compile_one("import a, b as c"),
            Ok(Stmt::Import(items)) if items == vec![
                Import { module: "a".to_string(), alias: None, names: None },
                Import { module: "b".to_string(), alias: Some("c".to_string()), names: None },
            ]
        );
        assert_matches!(
            compile_one("from m import x, y"),
            Ok(Stmt::Import(items)) if items[0].names == Some(vec!["x".to_string(), "y".to_string()])
        );
        assert_matches!(compile_one("import a as"), Err(Error::MalformedStatement(_)));
        // `from` is an ordinary name when not used in an import
        assert_matches!(compile_one("from = 1"), Ok(Stmt::Assign { .. }));
    }

    #[test]
    fn semicolon_separated() {
        let stmts = compile_all("x = 'a;b' ; y = 2").unwrap();
        assert_eq!(stmts.len(), 2);
        assert_matches!(&stmts[0], Stmt::Assign { value, .. } if value.as_str_literal() == Some("a;b"));
    }
}
