//! Declaration scanning
//!
//! Recovers type and function declarations from C++ source text by looking
//! at declaration headers only. Function bodies are never parsed; whatever
//! they contain passes through to the compiler untouched.
//!
//! Recognized shapes:
//! - a type: `struct Name {` whose next line is the `PyObject_HEAD` marker,
//!   up to the matching `};`
//! - a function: `<return type> <prefix>_<rest>(<params>) {` at line start,
//!   where `<prefix>` has no underscore

use regex::Regex;
use std::sync::LazyLock;

/// Marker field that must open the body of every exported type
pub const TYPE_MARKER: &str = "PyObject_HEAD";

static TYPE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*struct[ \t]+([A-Za-z][A-Za-z0-9]*)\s*\{[ \t]*\r?\n[ \t]*PyObject_HEAD\b")
        .expect("should build valid regex")
});

static FUNCTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*([A-Za-z_][A-Za-z0-9_]*(?:\s*\*+\s*|\s+))([A-Za-z][A-Za-z0-9]*)_([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(([^)]*)\)\s*\{",
    )
    .expect("should build valid regex")
});

/// A recognized type declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    /// Declaration text from `struct` through the closing `};`
    pub header: String,
    /// 1-based line of the type name
    pub line: usize,
}

/// A recognized `<prefix>_<rest>` function declaration header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub return_type: String,
    /// Text before the first underscore: a type name or the `meth` prefix
    pub prefix: String,
    /// Text after the first underscore
    pub rest: String,
    /// Parameters as written, receiver included
    pub params: Vec<String>,
    /// 1-based line of the function name
    pub line: usize,
}

impl FunctionDecl {
    /// Full function name as it appears in source
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}_{}", self.prefix, self.rest)
    }

    /// Number of parameters after the leading receiver
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len().saturating_sub(1)
    }
}

/// Everything recovered from one source fragment, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedSource {
    pub types: Vec<TypeDecl>,
    pub functions: Vec<FunctionDecl>,
}

/// Scan one source fragment
#[must_use]
pub fn scan(source: &str) -> ScannedSource {
    ScannedSource {
        types: scan_types(source),
        functions: scan_functions(source),
    }
}

fn scan_types(source: &str) -> Vec<TypeDecl> {
    let mut types = Vec::new();

    for captures in TYPE_HEADER.captures_iter(source) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        let Some(open) = source
            .get(whole.start()..)
            .and_then(|tail| tail.find('{'))
            .map(|offset| whole.start() + offset)
        else {
            continue;
        };

        // Records with unbalanced braces are not types; the compiler will
        // report them.
        let Some(close) = matching_brace(source, open) else {
            continue;
        };
        let Some(end) = record_terminator(source, close) else {
            continue;
        };

        let start = whole.start() + leading_blank_len(whole.as_str());
        let Some(header) = source.get(start..=end) else {
            continue;
        };

        types.push(TypeDecl {
            name: name.as_str().to_string(),
            header: header.to_string(),
            line: line_of(source, name.start()),
        });
    }

    types
}

fn scan_functions(source: &str) -> Vec<FunctionDecl> {
    FUNCTION_HEADER
        .captures_iter(source)
        .filter_map(|captures| {
            let return_type = captures.get(1)?;
            let prefix = captures.get(2)?;
            let rest = captures.get(3)?;
            let params = captures.get(4)?;

            Some(FunctionDecl {
                return_type: return_type.as_str().trim().to_string(),
                prefix: prefix.as_str().to_string(),
                rest: rest.as_str().to_string(),
                params: split_params(params.as_str()),
                line: line_of(source, prefix.start()),
            })
        })
        .collect()
}

/// Split a parameter list, treating `()` and `(void)` as empty
fn split_params(params: &str) -> Vec<String> {
    let params: Vec<String> = params
        .split(',')
        .map(|param| param.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|param| !param.is_empty())
        .collect();

    if params.len() == 1 && params.first().is_some_and(|param| param == "void") {
        return Vec::new();
    }

    params
}

/// Byte index of the `}` matching the `{` at `open`
fn matching_brace(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;

    for (offset, ch) in source.get(open..)?.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }

    None
}

/// Byte index of the `;` closing a record whose body ends at `close`
fn record_terminator(source: &str, close: usize) -> Option<usize> {
    let tail = source.get(close + 1..)?;
    let skipped = tail.len() - tail.trim_start().len();
    tail.trim_start()
        .starts_with(';')
        .then_some(close + 1 + skipped)
}

fn leading_blank_len(text: &str) -> usize {
    text.len() - text.trim_start().len()
}

fn line_of(source: &str, offset: usize) -> usize {
    source
        .get(..offset)
        .map_or(0, |before| before.matches('\n').count())
        + 1
}
