//! Indent-aware string builder for Python code generation.

/// Indent-aware string builder that produces formatted Python source code.
pub struct CodeWriter {
    buf: String,
    indent_level: usize,
    indent_width: usize,
    /// True if the current line has not yet been written to.
    at_line_start: bool,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::with_indent(4)
    }

    pub fn with_indent(indent_width: usize) -> Self {
        Self {
            buf: String::with_capacity(4096),
            indent_level: 0,
            indent_width,
            at_line_start: true,
        }
    }

    /// Write a complete line (appends newline).
    pub fn line(&mut self, text: &str) {
        self.write_indent();
        self.buf.push_str(text);
        self.buf.push('\n');
        self.at_line_start = true;
    }

    /// Write an empty line.
    pub fn blank(&mut self) {
        self.buf.push('\n');
        self.at_line_start = true;
    }

    /// Write `{prefix}{text}` where `text` may span several lines. Continuation
    /// lines keep their own relative indentation on top of the current level.
    pub fn lines(&mut self, prefix: &str, text: &str) {
        let mut parts = text.split('\n');
        let first = parts.next().unwrap_or_default();
        self.line(&format!("{}{}", prefix, first));
        for part in parts {
            self.line(part);
        }
    }

    /// Increase indent by one level.
    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    /// Decrease indent by one level.
    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    /// Write `text:` and increase indent (e.g. `class Outputs(BaseOutputs):`).
    pub fn block_open(&mut self, text: &str) {
        self.line(&format!("{}:", text));
        self.indent();
    }

    /// Decrease indent, writing `pass` first if the block is still empty.
    pub fn block_close(&mut self, empty: bool) {
        if empty {
            self.line("pass");
        }
        self.dedent();
    }

    /// Consume the writer and return the generated string.
    pub fn finish(self) -> String {
        self.buf
    }

    fn write_indent(&mut self) {
        if self.at_line_start && self.indent_level > 0 {
            self.buf
                .push_str(&" ".repeat(self.indent_level * self.indent_width));
        }
        self.at_line_start = false;
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_line() {
        let mut w = CodeWriter::new();
        w.line("x = 1");
        assert_eq!(w.finish(), "x = 1\n");
    }

    #[test]
    fn block_open_close() {
        let mut w = CodeWriter::new();
        w.block_open("class Foo(Bar)");
        w.line("x = 1");
        w.block_close(false);
        w.line("y = 2");
        assert_eq!(w.finish(), "class Foo(Bar):\n    x = 1\ny = 2\n");
    }

    #[test]
    fn empty_block_gets_pass() {
        let mut w = CodeWriter::new();
        w.block_open("class Empty");
        w.block_close(true);
        assert_eq!(w.finish(), "class Empty:\n    pass\n");
    }

    #[test]
    fn nested_indent() {
        let mut w = CodeWriter::with_indent(2);
        w.block_open("class Outer");
        w.block_open("class Inner");
        w.line("a = 1");
        w.block_close(false);
        w.block_close(false);
        assert_eq!(w.finish(), "class Outer:\n  class Inner:\n    a = 1\n");
    }

    #[test]
    fn multi_line_expression() {
        let mut w = CodeWriter::new();
        w.block_open("class Node");
        w.lines("value = ", "Person(\n    name=\"Ada\",\n)");
        w.block_close(false);
        assert_eq!(
            w.finish(),
            "class Node:\n    value = Person(\n        name=\"Ada\",\n    )\n"
        );
    }

    #[test]
    fn dedent_saturates_at_zero() {
        let mut w = CodeWriter::new();
        w.dedent();
        w.line("x");
        assert_eq!(w.finish(), "x\n");
    }
}
