//! Line editor for tdlctl REPL

use rustyline::{
    history::DefaultHistory,
    validate::{ValidationResult, Validator},
    Completer, Helper, Highlighter, Hinter, Result,
};

/// Custom rustyline::Editor
pub(crate) type Editor = rustyline::Editor<ReplEditor, DefaultHistory>;

/// Create a line editor
pub fn editor() -> Result<Editor> {
    let editor = ReplEditor::default();
    let mut rl = rustyline::Editor::new()?;
    rl.set_helper(Some(editor));
    Ok(rl)
}

/// Editor for tdlctl repl. Unbalanced open brackets are left to the
/// interpreter, which prompts for continuation lines.
#[derive(Default, Completer, Helper, Highlighter, Hinter)]
pub struct ReplEditor {
    /// Line being read continues an earlier one, e.g. inside open brackets or
    /// a triple quoted string
    continuation: bool,
}

impl ReplEditor {
    pub fn set_continuation(&mut self, continuation: bool) {
        self.continuation = continuation;
    }

    /// Error for lines starting a statement. Continuation lines are checked
    /// by the interpreter once the statement is complete.
    fn check(&self, line: &str) -> Option<String> {
        match self.continuation {
            true => None,
            false => bracket_error(line),
        }
    }
}

/// First bracket error in `line`, ignoring quoted text and comments
fn bracket_error(line: &str) -> Option<String> {
    let mut stack = vec![];
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                _ if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '#' => break,
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some(o) if o == open => {}
                    Some(wanted) => return Some(format!("{wanted} is not closed")),
                    None => return Some(format!("{c} is not paired")),
                }
            }
            _ => {}
        }
    }
    None
}

impl Validator for ReplEditor {
    fn validate(
        &self,
        ctx: &mut rustyline::validate::ValidationContext,
    ) -> Result<rustyline::validate::ValidationResult> {
        match self.check(ctx.input()) {
            Some(msg) => Ok(ValidationResult::Invalid(Some(format!(" - {msg}")))),
            None => Ok(ValidationResult::Valid(None)),
        }
    }

    fn validate_while_typing(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_and_open_lines_are_valid() {
        assert_eq!(bracket_error("f(a, [1, 2])"), None);
        assert_eq!(bracket_error("x = [1,"), None);
        assert_eq!(bracket_error("s = ')' # ]"), None);
    }

    #[test]
    fn mismatched_brackets() {
        assert_eq!(bracket_error("f(]"), Some("( is not closed".to_string()));
        assert_eq!(bracket_error("x)"), Some(") is not paired".to_string()));
    }

    #[test]
    fn continuation_lines_are_not_checked() {
        let mut editor = ReplEditor::default();
        assert_eq!(editor.check(")'''"), Some(") is not paired".to_string()));

        editor.set_continuation(true);
        assert_eq!(editor.check(")'''"), None);
        assert_eq!(editor.check(" 2]"), None);
    }
}
