//! Line-origin markers and numbered listings
//!
//! Generated text is appended to the author's fragment. `#line` directives
//! make compiler diagnostics inside the fragment point at the original
//! file and diagnostics inside the generated tables point at the real
//! written file.

use std::path::Path;

/// Accumulates generated lines
#[derive(Debug, Default)]
pub(crate) struct CodeWriter {
    lines: Vec<String>,
}

impl CodeWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub(crate) fn blank(&mut self) {
        self.lines.push(String::new());
    }

    pub(crate) fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Quote a path for a `#line` directive
fn quoted(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Join an original fragment and its generated tables.
///
/// `origin` is the file the author edits; `written` is where the combined
/// text will be stored.
#[must_use]
pub fn with_origin(source: &str, origin: &Path, generated: &str, written: &Path) -> String {
    let mut text = format!("#line 1 {}\n", quoted(origin));
    text.push_str(source);
    if !source.is_empty() && !source.ends_with('\n') {
        text.push('\n');
    }

    // The directive names the physical line that follows it
    let next_line = text.matches('\n').count() + 2;
    text.push_str(&format!("#line {next_line} {}\n", quoted(written)));
    text.push_str(generated);
    text
}

/// Render text with right-aligned 1-based line numbers
#[must_use]
pub fn numbered(text: &str) -> String {
    let width = text.lines().count().max(1).to_string().len();
    text.lines()
        .enumerate()
        .map(|(index, line)| format!("{:>width$} | {line}\n", index + 1))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests can panic")]
mod tests {
    use super::*;

    #[test]
    fn generated_part_reports_its_physical_line() {
        let text = with_origin(
            "int a;\nint b;",
            Path::new("src/frag.cpp"),
            "int generated;\n",
            Path::new("build/temp/m/src/frag.cpp"),
        );

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.first().unwrap(), &"#line 1 \"src/frag.cpp\"");
        assert_eq!(lines.get(1).unwrap(), &"int a;");
        assert_eq!(
            lines.get(3).unwrap(),
            &"#line 5 \"build/temp/m/src/frag.cpp\""
        );
        // Physical line 5 is the first generated line
        assert_eq!(lines.get(4).unwrap(), &"int generated;");
    }

    #[test]
    fn windows_paths_are_escaped() {
        let text = with_origin("", Path::new(r"C:\src\a.cpp"), "", Path::new("b.cpp"));
        assert!(text.starts_with("#line 1 \"C:\\\\src\\\\a.cpp\"\n"));
        assert!(text.contains("#line 3 \"b.cpp\""));
    }

    #[test]
    fn numbered_pads_line_numbers() {
        let text = (1..=10).map(|n| format!("l{n}\n")).collect::<String>();
        let listing = numbered(&text);
        assert!(listing.starts_with(" 1 | l1\n"));
        assert!(listing.ends_with("10 | l10\n"));
    }

    #[test]
    fn code_writer_joins_lines() {
        let mut writer = CodeWriter::new();
        writer.line("a");
        writer.blank();
        writer.line(String::from("b"));
        assert_eq!(writer.finish(), "a\n\nb\n");
    }
}
