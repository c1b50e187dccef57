//! Tests for embedding in host application

use assert_matches::assert_matches;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tdl::{
    Config, Error, Evaluator, GroupRef, LineReader, NativeFn, NativeModules, Val, CORE_GROUPS,
};
use tracing_test::traced_test;

fn evaluator(config: Config) -> (Evaluator, Arc<Mutex<String>>) {
    let out = Arc::new(Mutex::new(String::new()));
    let sink = out.clone();
    let ev = Evaluator::with_writer(
        config,
        Arc::new(move |s: &str| sink.lock().unwrap().push_str(s)),
    );
    (ev, out)
}

/// Fresh directory of module sources
fn module_dir(files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tdl-test-{}", nanoid::nanoid!()));
    std::fs::create_dir_all(&dir).unwrap();
    for (name, src) in files {
        std::fs::write(dir.join(name), src).unwrap();
    }
    dir
}

fn config_with_path(dir: PathBuf) -> Config {
    Config {
        path: vec![dir],
        ..Config::default()
    }
}

fn greeter() -> GroupRef {
    let group = GroupRef::new();
    group.set("greeting", Val::string("hello"));
    group.bind_native(NativeFn {
        name: "greet",
        doc: "greet(NAME) - Greets NAME".to_string(),
        func: |_, args| match args {
            [Val::String(name)] => Ok(Val::String(format!("hello, {name}"))),
            _ => Err(Error::UnexpectedArguments(
                "greet expects a name".to_string(),
            )),
        },
    });
    group
}

#[test]
fn core_groups_present() {
    let (mut ev, _) = evaluator(Config::default());
    for name in CORE_GROUPS {
        assert!(ev.table().has_group(ev.scope(), name), "missing {name}");
    }
    assert_eq!(
        ev.eval("_sys.version"),
        Ok(Some(Val::string(env!("CARGO_PKG_VERSION"))))
    );
    assert_eq!(ev.eval("_main.x = 1\nx"), Ok(Some(Val::Int(1))));
}

#[test]
fn output_goes_to_writer() {
    let (mut ev, out) = evaluator(Config::default());
    ev.eval("print 'hi'\nshow_group('_math')").unwrap();
    let out = out.lock().unwrap();
    assert!(out.starts_with("hi\n== _math: "));
    assert!(out.contains("  pi: 3.14"));
}

#[test]
fn host_bound_native() {
    let (mut ev, _) = evaluator(Config::default());
    ev.table().root().bind_native(NativeFn {
        name: "twice",
        doc: "twice(X) - Returns X + X".to_string(),
        func: |f, args| match args {
            [v] => {
                let add = f.table().get_symbol(f.scope(), "add")?;
                f.call(add, vec![v.clone(), v.clone()])
            }
            _ => Err(Error::UnexpectedArguments("twice expects one argument".to_string())),
        },
    });
    ev.eval("def add(a, b): return a + b").unwrap();
    assert_eq!(ev.eval("twice(4)"), Ok(Some(Val::Int(8))));
    assert_eq!(ev.eval("twice('ab')"), Ok(Some(Val::string("abab"))));
}

#[test]
fn host_reads_and_writes_symbols() {
    let (mut ev, _) = evaluator(Config::default());
    let scope = ev.scope().clone();
    ev.table()
        .set_symbol(&scope, "settings.depth", Val::Int(3), None)
        .unwrap();
    assert_eq!(ev.eval("settings.depth + 1"), Ok(Some(Val::Int(4))));

    ev.eval("settings.depth = 5").unwrap();
    assert_eq!(ev.table().get_symbol(&scope, "settings.depth"), Ok(Val::Int(5)));
    assert!(ev.table().has_group(&scope, "settings"));
    assert!(!ev.table().has_symbol(&scope, "settings.width"));
}

#[test]
fn import_script_module() {
    let dir = module_dir(&[(
        "geometry.tdl",
        "side = 2\ndef area(s): return s * s\n",
    )]);
    let (mut ev, _) = evaluator(config_with_path(dir.clone()));

    ev.eval("import geometry").unwrap();
    assert_eq!(ev.eval("geometry.area(3)"), Ok(Some(Val::Int(9))));
    assert_eq!(ev.eval("geometry.side"), Ok(Some(Val::Int(2))));

    ev.eval("from geometry import area\nimport geometry as geo").unwrap();
    assert_eq!(ev.eval("area(4)"), Ok(Some(Val::Int(16))));
    assert_eq!(ev.eval("geo.side"), Ok(Some(Val::Int(2))));

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn import_twice_yields_same_module() {
    let dir = module_dir(&[("counter.tdl", "count = 0\n")]);
    let (mut ev, _) = evaluator(config_with_path(dir.clone()));
    let scope = ev.scope().clone();

    let first = ev.import(&scope, "counter", None, None, false).unwrap();
    ev.eval("counter.count = 5").unwrap();
    let second = ev.import(&scope, "counter", None, None, false).unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(ev.eval("counter.count"), Ok(Some(Val::Int(5))));

    let reloaded = ev.import(&scope, "counter", None, None, true).unwrap();
    assert!(!first.ptr_eq(&reloaded));
    assert_eq!(ev.eval("counter.count"), Ok(Some(Val::Int(0))));

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn reload_builtin() {
    let dir = module_dir(&[("conf.tdl", "level = 1\n")]);
    let (mut ev, _) = evaluator(config_with_path(dir.clone()));
    ev.eval("import conf\nconf.level = 9").unwrap();
    ev.eval("reload('conf')").unwrap();
    assert_eq!(ev.eval("conf.level"), Ok(Some(Val::Int(1))));

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn import_missing_module() {
    let (mut ev, _) = evaluator(Config::default());
    assert_eq!(
        ev.eval("import nowhere_to_be_found"),
        Err(Error::ModuleNotFound("nowhere_to_be_found".to_string()))
    );
}

#[test]
fn import_failing_module() {
    let dir = module_dir(&[("broken.tdl", "x = \n")]);
    let (mut ev, _) = evaluator(config_with_path(dir.clone()));
    assert_matches!(ev.eval("import broken"), Err(_));
    assert!(ev.table().module("broken").is_none());

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn native_modules() {
    let (mut ev, _) = evaluator(Config::default());
    let mut modules = NativeModules::new();
    modules.register("greeter", greeter);
    ev.set_loader(Box::new(modules));

    assert_eq!(
        ev.eval("import greeter\ngreeter.greet('tdl')"),
        Ok(Some(Val::string("hello, tdl")))
    );
    assert_eq!(
        ev.eval("from greeter import greeting\ngreeting"),
        Ok(Some(Val::string("hello")))
    );
    assert_matches!(ev.table().module("greeter"), Some(m) if m.is_native());
    assert_matches!(
        ev.eval("from greeter import missing"),
        Err(Error::UnresolvedSymbol(_))
    );
}

#[test]
fn search_names() {
    let (mut ev, _) = evaluator(Config::default());
    ev.table_mut().root().set("tools", Val::Group(greeter()));
    assert_matches!(ev.eval("greeting"), Err(Error::UnresolvedSymbol(_)));

    ev.table_mut().set_search_names(vec!["tools".to_string()]);
    assert_eq!(ev.eval("greeting"), Ok(Some(Val::string("hello"))));
    assert!(ev
        .table()
        .search_names()
        .iter()
        .any(|n| n == "_builtin"));
}

/// Reader replaying canned lines, recording prompts it was given
struct Script {
    lines: Vec<&'static str>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl LineReader for Script {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.lines.is_empty() {
            true => None,
            false => Some(self.lines.remove(0).to_string()),
        }
    }
}

#[test]
fn interactive_reader() {
    let (mut ev, out) = evaluator(Config::default());
    let prompts = Arc::new(Mutex::new(vec![]));
    ev.set_reader(Box::new(Script {
        lines: vec!["for i in [1, 2]:", "  print i", "endfor", "x = [1,", " 2]", "len(x)"],
        prompts: prompts.clone(),
    }));

    assert_eq!(ev.run(), Ok(Some(Val::Int(2))));
    assert_eq!(*out.lock().unwrap(), "1\n2\n");
    assert_eq!(
        *prompts.lock().unwrap(),
        vec!["tdl> ", "... ", "... ", "tdl> ", "... ", "tdl> ", "tdl> "]
    );
}

#[traced_test]
#[test]
fn procedure_errors_are_logged() {
    let (mut ev, out) = evaluator(Config::default());
    ev.eval("def broken(): return 1 + 'a'").unwrap();
    assert_eq!(ev.eval("broken()"), Ok(Some(Val::Nil)));
    assert!(out.lock().unwrap().starts_with("Error in procedure broken: "));
    assert!(logs_contain("error in procedure broken"));
}
