//! REPL for tdlctl
use anyhow::Result;

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tdl::{Evaluator, LineReader, Stmt, Val};

use crate::editor::{self, Editor};
use rustyline::error::ReadlineError;

/// Feeds lines typed into the line editor to the evaluator
struct EditorReader {
    rl: Rc<RefCell<Editor>>,
    /// Prompt shown for lines starting a statement
    prompt: String,
    done: bool,
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        if self.done {
            return None;
        }
        let mut rl = self.rl.borrow_mut();
        if let Some(helper) = rl.helper_mut() {
            helper.set_continuation(prompt != self.prompt);
        }
        match rl.readline(prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                Some(line)
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                self.done = true;
                None
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                self.done = true;
                None
            }
        }
    }
}

/// Entrypoint for running REPL.
/// Returns Err if REPL terminated with error
pub(crate) fn run(ev: &mut Evaluator) -> Result<()> {
    let rl = Rc::new(RefCell::new(editor::editor()?));
    let history = history_file();

    load_history(&mut rl.borrow_mut(), &history);
    let prompt = ev.config().prompt.clone();
    ev.set_reader(Box::new(EditorReader {
        rl: rl.clone(),
        prompt,
        done: false,
    }));

    loop {
        let stmt = match ev.compile_next() {
            Ok(Stmt::Eof) => break,
            Ok(stmt) => stmt,
            Err(e) => {
                eprintln!("{}", e);
                ev.clear_input();
                continue;
            }
        };
        match ev.execute(&stmt) {
            Ok(Some(Val::Nil)) | Ok(None) => (),
            Ok(Some(v)) => println!("{v}"),
            Err(e) => {
                eprintln!("{}", e);
                ev.clear_input();
            }
        }
    }

    save_history(&mut rl.borrow_mut(), &history);
    Ok(())
}

/// Path to file to use for history
fn history_file() -> Option<PathBuf> {
    let dir = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(dirs::home_dir)?;
    Some(dir.as_path().join(".tdlctl_history"))
}

fn load_history(rl: &mut Editor, history: &Option<PathBuf>) {
    if let Some(history) = history {
        if history.exists() {
            if let Err(e) = rl.load_history(history) {
                eprintln!("Failed to load {} - {}", history.to_string_lossy(), e);
            }
        }
    }
}

fn save_history(rl: &mut Editor, history: &Option<PathBuf>) {
    if let Some(history) = history {
        if let Err(e) = rl.save_history(history) {
            eprintln!("Failed to save {} - {}", history.to_string_lossy(), e);
        }
    }
}
