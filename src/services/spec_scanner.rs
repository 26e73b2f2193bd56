//! Playwright spec-file scanner.
//!
//! Tokenizes JavaScript/TypeScript source (identifiers, punctuation, string,
//! template and regex literals; comments dropped) and matches call shapes on
//! the token stream:
//!
//! - `test('title', ...)`, `test.only|skip|fixme|fail|slow('title', ...)`
//! - `test.describe('title', ...)`, `test.describe.serial|parallel|only|skip('title', ...)`
//! - `{ tag: '@x' }` / `{ tag: ['@a', '@b'] }` options after a test title
//! - `getByTestId('id')`
//! - any literal containing `/api/` (endpoint references)

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{AppError, AppResult};
use crate::models::{SpecFileInfo, SpecTest};

/// File suffixes treated as spec files.
const SPEC_SUFFIXES: &[&str] = &[".spec.js", ".spec.ts", ".spec.mjs"];

/// Directories never descended into.
const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "playwright-report", "test-results"];

const TEST_MODIFIERS: &[&str] = &["only", "skip", "fixme", "fail", "slow"];
const DESCRIBE_MODIFIERS: &[&str] = &["serial", "parallel", "only", "skip", "fixme"];

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Punct(char),
    Str(String),
    Regex(String),
    Other,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
}

impl Token {
    fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }

    fn string(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Str(s) => Some(s),
            _ => None,
        }
    }

    fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize) {
        self.tokens.push(Token { kind, line });
    }

    /// A `/` starts a regex literal when the previous token cannot end an
    /// expression.
    fn regex_allowed(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            None => true,
            Some(TokenKind::Punct(c)) => !matches!(c, ')' | ']' | '}'),
            Some(TokenKind::Ident(word)) => matches!(
                word.as_str(),
                "return" | "typeof" | "case" | "in" | "of" | "new" | "delete" | "void"
            ),
            _ => false,
        }
    }

    fn tokenize(mut self) -> Vec<Token> {
        while let Some(c) = self.peek(0) {
            let line = self.line;
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek(1) == Some('/') => {
                    while let Some(c) = self.peek(0) {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    while let Some(c) = self.bump() {
                        if c == '*' && self.peek(0) == Some('/') {
                            self.bump();
                            break;
                        }
                    }
                }
                '/' if self.regex_allowed() => {
                    let pattern = self.read_regex();
                    self.push(TokenKind::Regex(pattern), line);
                }
                '\'' | '"' => {
                    self.bump();
                    let value = self.read_quoted(c);
                    self.push(TokenKind::Str(value), line);
                }
                '`' => {
                    self.bump();
                    let value = self.read_template();
                    self.push(TokenKind::Str(value), line);
                }
                c if c.is_alphabetic() || c == '_' || c == '$' => {
                    let mut word = String::new();
                    while let Some(c) = self.peek(0) {
                        if c.is_alphanumeric() || c == '_' || c == '$' {
                            word.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    self.push(TokenKind::Ident(word), line);
                }
                c if c.is_ascii_digit() => {
                    while let Some(c) = self.peek(0) {
                        if c.is_alphanumeric() || c == '.' || c == '_' {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    self.push(TokenKind::Other, line);
                }
                c => {
                    self.bump();
                    self.push(TokenKind::Punct(c), line);
                }
            }
        }
        self.tokens
    }

    fn read_escape(&mut self) -> Option<char> {
        match self.bump()? {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            '\n' => None,
            other => Some(other),
        }
    }

    fn read_quoted(&mut self, quote: char) -> String {
        let mut value = String::new();
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    if let Some(e) = self.read_escape() {
                        value.push(e);
                    }
                }
                c if c == quote => break,
                '\n' => break,
                c => value.push(c),
            }
        }
        value
    }

    /// Template literal; `${...}` expressions are kept verbatim.
    fn read_template(&mut self) -> String {
        let mut value = String::new();
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    if let Some(e) = self.read_escape() {
                        value.push(e);
                    }
                }
                '`' => break,
                '$' if self.peek(0) == Some('{') => {
                    value.push('$');
                    let mut depth = 0;
                    while let Some(c) = self.bump() {
                        value.push(c);
                        match c {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                c => value.push(c),
            }
        }
        value
    }

    /// Regex literal source with `\/` unescaped; flags are dropped.
    fn read_regex(&mut self) -> String {
        self.bump();
        let mut value = String::new();
        let mut in_class = false;
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    if let Some(next) = self.bump() {
                        if next != '/' {
                            value.push('\\');
                        }
                        value.push(next);
                    }
                }
                '[' => {
                    in_class = true;
                    value.push(c);
                }
                ']' => {
                    in_class = false;
                    value.push(c);
                }
                '/' if !in_class => break,
                '\n' => break,
                c => value.push(c),
            }
        }
        while let Some(c) = self.peek(0) {
            if c.is_ascii_alphabetic() {
                self.bump();
            } else {
                break;
            }
        }
        value
    }
}

/// Whether `path` names a spec file.
pub fn is_spec_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| SPEC_SUFFIXES.iter().any(|s| name.ends_with(s)))
}

/// Find spec files under `root`, sorted by path.
pub fn find_spec_files(root: &Path) -> AppResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(AppError::InvalidInput(format!(
            "Spec directory {} does not exist",
            root.display()
        )));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root).sort_by_file_name().into_iter();
    for entry in walker.filter_entry(|e| {
        !(e.file_type().is_dir()
            && e.file_name()
                .to_str()
                .is_some_and(|n| IGNORED_DIRS.contains(&n)))
    }) {
        let entry = entry.map_err(|e| AppError::FileSystem(e.to_string()))?;
        if entry.file_type().is_file() && is_spec_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!("Found {} spec files under {}", files.len(), root.display());
    Ok(files)
}

/// Path of `file` relative to `root`, `/`-separated.
pub fn relative_path(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read and scan every spec file under `root`.
///
/// Returns each file's info together with its raw contents.
pub fn scan_spec_dir(root: &Path) -> AppResult<Vec<(SpecFileInfo, String)>> {
    let mut scanned = Vec::new();
    for file in find_spec_files(root)? {
        let source = std::fs::read_to_string(&file).map_err(|e| {
            AppError::FileSystem(format!("Failed to read {}: {}", file.display(), e))
        })?;
        let info = scan_spec_source(&relative_path(root, &file), &source);
        scanned.push((info, source));
    }
    Ok(scanned)
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// `@tag` words inside a title.
fn title_tags(title: &str) -> Vec<String> {
    title
        .split_whitespace()
        .filter(|w| w.starts_with('@') && w.len() > 1)
        .map(|w| {
            w.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
                .to_string()
        })
        .collect()
}

/// Tags from a `{ tag: ... }` options object starting at `start` (`{`).
fn option_tags(tokens: &[Token], start: usize) -> Vec<String> {
    let mut tags = Vec::new();
    let mut depth = 0;
    let mut i = start;
    while i < tokens.len() {
        let t = &tokens[i];
        if t.is_punct('{') {
            depth += 1;
        } else if t.is_punct('}') {
            depth -= 1;
            if depth == 0 {
                break;
            }
        } else if depth == 1
            && t.ident() == Some("tag")
            && tokens.get(i + 1).is_some_and(|t| t.is_punct(':'))
        {
            match tokens.get(i + 2) {
                Some(t) if t.string().is_some() => {
                    tags.extend(t.string().map(str::to_string));
                }
                Some(t) if t.is_punct('[') => {
                    let mut j = i + 3;
                    while let Some(t) = tokens.get(j) {
                        if t.is_punct(']') {
                            break;
                        }
                        if let Some(s) = t.string() {
                            tags.push(s.to_string());
                        }
                        j += 1;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    tags
}

/// Scan spec source text. `path` is recorded as-is.
pub fn scan_spec_source(path: &str, source: &str) -> SpecFileInfo {
    let tokens = Lexer::new(source).tokenize();
    let mut info = SpecFileInfo {
        path: path.to_string(),
        ..Default::default()
    };

    // (title, bracket depth before the describe call's opening paren)
    let mut describe_stack: Vec<(String, usize)> = Vec::new();
    let mut depth = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::Punct('(' | '[' | '{') => depth += 1,
            TokenKind::Punct(')' | ']' | '}') => {
                depth = depth.saturating_sub(1);
                while describe_stack.last().is_some_and(|(_, d)| *d >= depth) {
                    describe_stack.pop();
                }
            }
            TokenKind::Str(s) | TokenKind::Regex(s) if s.contains("/api/") => {
                push_unique(&mut info.api_endpoints, s);
            }
            TokenKind::Ident(word) => {
                let after_dot = i > 0 && tokens[i - 1].is_punct('.');
                if word == "getByTestId" {
                    if let (Some(open), Some(arg)) = (tokens.get(i + 1), tokens.get(i + 2))
                        && open.is_punct('(')
                        && let Some(id) = arg.string()
                    {
                        push_unique(&mut info.test_ids, id);
                    }
                    continue;
                }
                if word != "test" || after_dot {
                    continue;
                }
                match match_test_call(&tokens, i) {
                    Some(Call::Describe { title }) => {
                        push_unique(&mut info.describes, &title);
                        // The call's `(` has not been counted yet.
                        describe_stack.push((title, depth));
                    }
                    Some(Call::Test {
                        title,
                        modifier,
                        title_index,
                    }) => {
                        let mut tags = title_tags(&title);
                        if tokens.get(title_index + 1).is_some_and(|t| t.is_punct(','))
                            && tokens.get(title_index + 2).is_some_and(|t| t.is_punct('{'))
                        {
                            tags.extend(option_tags(&tokens, title_index + 2));
                        }
                        for tag in &tags {
                            push_unique(&mut info.tags, tag);
                        }
                        let describe_path =
                            describe_stack.iter().map(|(t, _)| t.clone()).collect();
                        info.tests.push(SpecTest {
                            title,
                            describe_path,
                            tags,
                            modifier,
                            line: token.line,
                        });
                    }
                    None => {}
                }
            }
            _ => {}
        }
    }

    for describe in &info.describes {
        for tag in title_tags(describe) {
            push_unique(&mut info.tags, &tag);
        }
    }

    info
}

enum Call {
    Describe {
        title: String,
    },
    Test {
        title: String,
        modifier: Option<String>,
        title_index: usize,
    },
}

/// Match the call shape starting at the `test` identifier at `i`.
fn match_test_call(tokens: &[Token], i: usize) -> Option<Call> {
    let at = |k: usize| tokens.get(i + k);

    // test('title'
    if at(1)?.is_punct('(') {
        let title = at(2)?.string()?.to_string();
        return Some(Call::Test {
            title,
            modifier: None,
            title_index: i + 2,
        });
    }

    if !at(1)?.is_punct('.') {
        return None;
    }
    let member = at(2)?.ident()?;

    if member == "describe" {
        // test.describe('title'  |  test.describe.serial('title'
        let title_at = if at(3)?.is_punct('(') {
            4
        } else if at(3)?.is_punct('.')
            && at(4)?.ident().is_some_and(|m| DESCRIBE_MODIFIERS.contains(&m))
            && at(5)?.is_punct('(')
        {
            6
        } else {
            return None;
        };
        let title = at(title_at)?.string()?.to_string();
        return Some(Call::Describe { title });
    }

    if TEST_MODIFIERS.contains(&member) && at(3)?.is_punct('(') {
        let title = at(4)?.string()?.to_string();
        return Some(Call::Test {
            title,
            modifier: Some(member.to_string()),
            title_index: i + 4,
        });
    }

    None
}
