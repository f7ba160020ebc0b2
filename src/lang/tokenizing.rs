use crate::lang::source_buffer::{LineReader, SourceBuffer, SourceLocation};
use std::fmt::{self, Display, Formatter};

/// The prompt shown while a multi-line string is still open.
pub const CONTINUATION_PROMPT: &str = "\"\"> ";

/// A whitespace delimited word pulled from the source.  The tokenizer does not interpret the text,
/// it only records where the word came from and whether it was the first word of its line.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The text of the word.
    pub text: String,

    /// Where in the source the word started.
    pub location: SourceLocation,

    /// True when nothing but blanks precede the word on its line.  Definition headers are only
    /// accepted in this position.
    pub first_on_line: bool,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Check if the given character is considered whitespace.
pub fn is_whitespace(next: &char) -> bool {
    *next == ' ' || *next == '\t' || *next == '\r' || *next == '\n'
}

/// Skip over whitespace in the text.  Stopping only at either the end of the buffer or the next
/// non-whitespace character.
fn skip_whitespace(buffer: &mut SourceBuffer) {
    while let Some(next) = buffer.peek_next() {
        if !is_whitespace(&next) {
            break;
        }

        let _ = buffer.next_char();
    }
}

/// Consume the single separator that follows a word.  Delimited text starts right after it, so
/// `" hi "` captures `hi ` and not ` hi `.
pub fn skip_separator(buffer: &mut SourceBuffer) {
    if let Some(next) = buffer.peek_next()
        && is_whitespace(&next)
    {
        let _ = buffer.next_char();
    }
}

/// Pull text out of the buffer until we hit a whitespace character.  Words can contain any
/// character except whitespace.
fn process_until_whitespace(buffer: &mut SourceBuffer) -> String {
    let mut text = String::new();

    while let Some(next) = buffer.peek_next() {
        if is_whitespace(&next) {
            break;
        }

        text.push(next);
        let _ = buffer.next_char();
    }

    text
}

/// Get the next token from the buffer, advancing the cursor past it.  None once only whitespace
/// remains.
pub fn next_token(buffer: &mut SourceBuffer) -> Option<Token> {
    skip_whitespace(buffer);

    if buffer.is_exhausted() {
        return None;
    }

    let start = buffer.cursor();
    let location = buffer.location();
    let first_on_line = buffer.is_line_start(start);
    let text = process_until_whitespace(buffer);

    Some(Token {
        text,
        location,
        first_on_line,
    })
}

/// Scan for the closing delimiter of a single line form such as `" text "` or `-> text <-`.  The
/// separator after the opening word is skipped first.  Nothing is consumed if the delimiter is not
/// on the line.
pub fn take_delimited(buffer: &mut SourceBuffer, delimiter: &str) -> Option<String> {
    skip_separator(buffer);
    buffer.take_until(delimiter)
}

/// The result of scanning a string that may span several physical lines.
#[derive(Debug, PartialEq)]
pub struct MultiLineText {
    /// Everything between the delimiters, lines joined with newlines.
    pub text: String,

    /// True when the closing delimiter was found on a continuation line.  Any text after it on
    /// that line is dropped.
    pub spanned_lines: bool,

    /// True when text followed the closing delimiter on a continuation line.
    pub dropped_trailing_text: bool,
}

/// Scan forward to the closing delimiter, reading continuation lines from the reader when the
/// current line runs out.  None when the input ends before the delimiter shows up.
pub fn take_multi_line(
    buffer: &mut SourceBuffer,
    reader: &mut dyn LineReader,
    delimiter: &str,
) -> Option<MultiLineText> {
    if let Some(text) = buffer.take_until(delimiter) {
        return Some(MultiLineText {
            text,
            spanned_lines: false,
            dropped_trailing_text: false,
        });
    }

    let mut text = buffer.take_rest();

    loop {
        let line = reader.read_line(CONTINUATION_PROMPT)?;

        text.push('\n');

        match line.find(delimiter) {
            Some(offset) => {
                text.push_str(&line[..offset]);

                let trailing = line[offset + delimiter.len()..].trim();

                return Some(MultiLineText {
                    text,
                    spanned_lines: true,
                    dropped_trailing_text: !trailing.is_empty(),
                });
            }

            None => text.push_str(&line),
        }
    }
}

/// Translate the escape sequences of a string literal: `\n`, `\r`, `\t`, `\\`, `\"` and `\'`.
/// Unknown escapes are passed through untouched.
pub fn translate_escapes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(next) = chars.next() {
        if next != '\\' {
            result.push(next);
            continue;
        }

        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lines(Vec<&'static str>);

    impl LineReader for Lines {
        fn read_line(&mut self, _prompt: &str) -> Option<String> {
            if self.0.is_empty() {
                None
            } else {
                Some(self.0.remove(0).to_string())
            }
        }
    }

    fn words(text: &str) -> Vec<(String, bool)> {
        let mut buffer = SourceBuffer::new("<test>", 1, text);
        let mut result = Vec::new();

        while let Some(token) = next_token(&mut buffer) {
            result.push((token.text, token.first_on_line));
        }

        result
    }

    #[test]
    fn splits_on_blanks_and_tabs() {
        assert_eq!(
            words("sq:\tdup  * ;"),
            vec![
                ("sq:".to_string(), true),
                ("dup".to_string(), false),
                ("*".to_string(), false),
                (";".to_string(), false)
            ]
        );
    }

    #[test]
    fn blank_line_has_no_tokens() {
        assert!(words(" \t ").is_empty());
    }

    #[test]
    fn delimited_text_starts_after_one_separator() {
        let mut buffer = SourceBuffer::new("<test>", 1, "\"  two blanks\" rest");
        let token = next_token(&mut buffer).map(|t| t.text);

        assert_eq!(token.as_deref(), Some("\""));
        assert_eq!(take_delimited(&mut buffer, "\""), Some(" two blanks".to_string()));
        assert_eq!(buffer.remaining(), " rest");
    }

    #[test]
    fn multi_line_text_reads_continuations() {
        let mut buffer = SourceBuffer::new("<test>", 1, "first");
        let mut reader = Lines(vec!["second", "third\"\"\" ignored"]);
        let scanned = take_multi_line(&mut buffer, &mut reader, "\"\"\"");

        assert_eq!(
            scanned,
            Some(MultiLineText {
                text: "first\nsecond\nthird".to_string(),
                spanned_lines: true,
                dropped_trailing_text: true
            })
        );
    }

    #[test]
    fn multi_line_text_fails_at_end_of_input() {
        let mut buffer = SourceBuffer::new("<test>", 1, "never closed");
        let mut reader = Lines(vec!["still open"]);

        assert_eq!(take_multi_line(&mut buffer, &mut reader, "\"\"\""), None);
    }

    #[test]
    fn escapes_are_translated() {
        assert_eq!(translate_escapes(r"a\tb\nc\\d\q"), "a\tb\nc\\d\\q");
    }
}
