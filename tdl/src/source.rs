//! Assembly of logical statements from physical source lines
//!
//! Physical lines are joined while brackets are unbalanced or a triple-quoted
//! string is open. End-of-line comments are stripped and unquoted `;` splits
//! a line into several statements.
use std::collections::VecDeque;
use std::sync::Arc;

/// Blocking source of lines for interactive input
pub trait LineReader {
    /// Read the next line, or `None` at end of input
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

/// A physical source line
#[derive(Debug, Clone)]
struct Line {
    text: String,
    lineno: usize,
    file: Arc<str>,
}

/// A logical statement ready for compilation
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    /// Leading word of statement, lowercased
    pub key: String,
    pub lineno: usize,
    pub file: Arc<str>,
}

impl Statement {
    pub fn new(text: &str, lineno: usize, file: Arc<str>) -> Self {
        let key = text
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Self {
            text: text.to_string(),
            key,
            lineno,
            file,
        }
    }
}

/// Queue of pending source lines, optionally backed by an interactive reader
#[derive(Default)]
pub struct Input {
    lines: VecDeque<Line>,
    reader: Option<Box<dyn LineReader>>,
    prompt: String,
    continuation_prompt: String,
    block_depth: usize,
    lineno: usize,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue text after any pending lines
    pub fn push_text(&mut self, text: &str, file: &str) {
        let file: Arc<str> = Arc::from(file);
        for (i, line) in text.lines().enumerate() {
            self.lines.push_back(Line {
                text: line.to_string(),
                lineno: i + 1,
                file: Arc::clone(&file),
            });
        }
    }

    pub fn set_reader(&mut self, reader: Option<Box<dyn LineReader>>) {
        self.reader = reader;
    }

    pub fn set_prompts(&mut self, prompt: &str, continuation_prompt: &str) {
        self.prompt = prompt.to_string();
        self.continuation_prompt = continuation_prompt.to_string();
    }

    /// Drop all pending lines
    pub fn clear(&mut self) {
        self.lines.clear();
        self.block_depth = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub(crate) fn enter_block(&mut self) {
        self.block_depth += 1;
    }

    pub(crate) fn exit_block(&mut self) {
        self.block_depth = self.block_depth.saturating_sub(1);
    }

    fn next_line(&mut self, continuation: bool) -> Option<Line> {
        if let Some(line) = self.lines.pop_front() {
            return Some(line);
        }
        let prompt = if continuation || self.block_depth > 0 {
            &self.continuation_prompt
        } else {
            &self.prompt
        };
        let text = self.reader.as_mut()?.read_line(prompt)?;
        self.lineno += 1;
        Some(Line {
            text,
            lineno: self.lineno,
            file: Arc::from("<stdin>"),
        })
    }

    /// Next non-empty logical statement, or `None` at end of input
    pub fn next_statement(&mut self) -> Option<Statement> {
        loop {
            let line = self.next_line(false)?;
            let (lineno, file) = (line.lineno, Arc::clone(&line.file));

            let mut scanner = Scanner::default();
            let mut text = strip_comment(&mut scanner, line.text.trim()).to_string();
            while scanner.is_open() {
                let in_string = scanner.in_string();
                let Some(next) = self.next_line(true) else {
                    break;
                };
                let raw = if in_string {
                    next.text.as_str()
                } else {
                    next.text.trim()
                };
                text.push(if in_string { '\n' } else { ' ' });
                text.push_str(strip_comment(&mut scanner, raw));
            }

            if let Some(i) = find_unquoted(&text, ';') {
                let rest = text[i + 1..].to_string();
                text.truncate(i);
                if !rest.trim().is_empty() {
                    self.lines.push_front(Line {
                        text: rest,
                        lineno,
                        file: Arc::clone(&file),
                    });
                }
            }

            let text = text.trim();
            if !text.is_empty() {
                return Some(Statement::new(text, lineno, file));
            }
        }
    }
}

fn strip_comment<'a>(scanner: &mut Scanner, line: &'a str) -> &'a str {
    let end = scanner.feed(line, |_, ch, _| ch == '#');
    scanner.end_line();
    match end {
        Some(i) => line[..i].trim_end(),
        None => line,
    }
}

/// Tracks quoting and bracket depth across text
#[derive(Debug, Default, Clone, Copy)]
struct Scanner {
    depth: i32,
    /// Open quote character, and whether it is tripled
    quote: Option<(char, bool)>,
    escaped: bool,
}

impl Scanner {
    /// Feed text through scanner. `visit` is called with byte offset,
    /// character, and bracket depth for every character outside string
    /// literals; scanning stops at the first offset where it returns true.
    fn feed(&mut self, text: &str, mut visit: impl FnMut(usize, char, i32) -> bool) -> Option<usize> {
        let mut skip = 0;
        for (i, ch) in text.char_indices() {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            match self.quote {
                Some((q, triple)) => {
                    if self.escaped {
                        self.escaped = false;
                    } else if ch == '\\' {
                        self.escaped = true;
                    } else if ch == q && !triple {
                        self.quote = None;
                    } else if ch == q && is_triple(&text[i..], q) {
                        self.quote = None;
                        skip = 2;
                    }
                }
                None => {
                    if visit(i, ch, self.depth) {
                        return Some(i);
                    }
                    match ch {
                        '\'' | '"' => {
                            let triple = is_triple(&text[i..], ch);
                            self.quote = Some((ch, triple));
                            if triple {
                                skip = 2;
                            }
                        }
                        '(' | '[' | '{' => self.depth += 1,
                        ')' | ']' | '}' => self.depth -= 1,
                        _ => {}
                    }
                }
            }
        }
        None
    }

    /// Single quoted strings never span lines
    fn end_line(&mut self) {
        if matches!(self.quote, Some((_, false))) {
            self.quote = None;
            self.escaped = false;
        }
    }

    fn in_string(&self) -> bool {
        self.quote.is_some()
    }

    /// Whether or not text fed so far needs continuation lines
    fn is_open(&self) -> bool {
        self.depth > 0 || self.in_string()
    }
}

fn is_triple(text: &str, q: char) -> bool {
    text.chars().take(3).filter(|c| *c == q).count() == 3
}

/// Byte offset of first `ch` outside string literals
pub(crate) fn find_unquoted(text: &str, ch: char) -> Option<usize> {
    Scanner::default().feed(text, |_, c, _| c == ch)
}

/// Byte offset of first `ch` outside string literals and brackets
pub(crate) fn find_top_level(text: &str, ch: char) -> Option<usize> {
    Scanner::default().feed(text, |_, c, depth| c == ch && depth == 0)
}

/// Byte offset of the first top-level `=` that is not part of a comparison
pub(crate) fn find_assign(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    Scanner::default().feed(text, |i, c, depth| {
        c == '='
            && depth == 0
            && !matches!(i.checked_sub(1).map(|p| bytes[p]), Some(b'=' | b'!' | b'<' | b'>'))
            && bytes.get(i + 1) != Some(&b'=')
    })
}

/// Byte offset of the first top-level occurrence of `word` as a whole word
pub(crate) fn find_word(text: &str, word: &str) -> Option<usize> {
    let is_name = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    Scanner::default().feed(text, |i, _, depth| {
        depth == 0
            && text[i..].starts_with(word)
            && !is_name(text[..i].chars().next_back())
            && !is_name(text[i + word.len()..].chars().next())
    })
}

/// Strip one pair of enclosing `(...)` or `[...]` spanning all of `text`
pub(crate) fn strip_enclosing(text: &str) -> &str {
    let text = text.trim();
    let close = match text.chars().next() {
        Some('(') => ')',
        Some('[') => ']',
        _ => return text,
    };
    let matching = Scanner::default().feed(text, |_, c, depth| c == close && depth == 1);
    match matching {
        Some(i) if i == text.len() - 1 => &text[1..i],
        _ => text,
    }
}
