use std::{ fmt::{ self,
                  Display,
                  Formatter },
           hash::{ Hash,
                   Hasher } };



/// The location in the source input where a token was found.  Cells keep a copy of it so that
/// compile errors and abort reports can point back at the text that produced them.
///
/// This is a read-only structure.  Use the field accessor methods to get the values.
#[derive(Clone, Debug, PartialEq, PartialOrd, Eq)]
pub struct SourceLocation
{
    /// Either the path to the file or a description of the source.  For example code entered in
    /// the REPL will have a tag of "\<repl\>".
    path: String,

    /// The 1 based line number in the source.
    line: usize,

    /// The 1 based column number in the source.
    column: usize
}


impl Hash for SourceLocation
{
    fn hash<H: Hasher>(&self, state: &mut H)
    {
        self.path.hash(state);
        self.line.hash(state);
        self.column.hash(state);
    }
}


/// Used for error reporting to show where in the source an error originated.
impl Display for SourceLocation
{
    fn fmt(&self, formatter: &mut Formatter<'_>) -> Result<(), fmt::Error>
    {
        write!(formatter, "{} ({}, {})", self.path, self.line, self.column)
    }
}


impl Default for SourceLocation
{
    fn default() -> Self
    {
        Self::new_from_path("unspecified")
    }
}


impl SourceLocation
{
    /// Create a new SourceLocation at the first column of the first line of the given source.
    pub fn new_from_path(path: &str) -> Self
    {
        SourceLocation { path: path.to_owned(), line: 1, column: 1 }
    }

    /// Create a new SourceLocation with all of the needed information.
    pub fn new_from_info(path: &str, line: usize, column: usize) -> Self
    {
        SourceLocation { path: path.to_owned(), line, column }
    }

    /// The path to the source or a meaningful description of it.
    pub fn path(&self) -> &String
    {
        &self.path
    }

    /// The 1 based line number.
    pub fn line(&self) -> usize
    {
        self.line
    }

    /// The 1 based column number.
    pub fn column(&self) -> usize
    {
        self.column
    }
}



/// Anything that can hand the compiler more lines of input.  The REPL wraps a line editor, tests
/// and script files feed text from memory.  The compiler itself only asks for more input when a
/// multi-line string is still open at the end of a line.
pub trait LineReader
{
    /// Show the prompt and read the next line without its line terminator.  None signals the end
    /// of the input.
    fn read_line(&mut self, prompt: &str) -> Option<String>;

    /// The name used for this input in source locations.
    fn source_name(&self) -> &str
    {
        "<repl>"
    }
}



/// One physical line of source input and a cursor into it.  The tokenizer consumes the line from
/// the front and the cursor is shared with the compiler words that need to scan forward for a
/// closing delimiter.
///
/// Unlike a plain character iterator the buffer keeps the whole line around, so delimited scans
/// can search ahead without consuming anything when the delimiter is missing.
pub struct SourceBuffer
{
    /// The text of the line, never includes the trailing line terminator.
    text: String,

    /// Byte offset of the cursor within the text.
    cursor: usize,

    /// Where this line came from and its line number.
    origin: SourceLocation
}


impl SourceBuffer
{
    /// Create a new buffer for the given line of source.  Any trailing line terminator is removed.
    pub fn new(path: &str, line: usize, text: &str) -> Self
    {
        let text = text.trim_end_matches([ '\n', '\r' ]).to_string();

        SourceBuffer
            {
                text,
                cursor: 0,
                origin: SourceLocation::new_from_info(path, line, 1)
            }
    }

    /// The full text of the line.
    pub fn text(&self) -> &str
    {
        &self.text
    }

    /// The text that has not been consumed yet.
    pub fn remaining(&self) -> &str
    {
        &self.text[self.cursor..]
    }

    /// Byte offset of the cursor.
    pub fn cursor(&self) -> usize
    {
        self.cursor
    }

    /// Has every character of the line been consumed?
    pub fn is_exhausted(&self) -> bool
    {
        self.cursor >= self.text.len()
    }

    /// The location of the cursor in the source.
    pub fn location(&self) -> SourceLocation
    {
        self.location_of(self.cursor)
    }

    /// The location of an arbitrary byte offset within the line.
    pub fn location_of(&self, offset: usize) -> SourceLocation
    {
        let column = self.text[..offset.min(self.text.len())].chars().count() + 1;

        SourceLocation::new_from_info(self.origin.path(), self.origin.line(), column)
    }

    /// Take a peek at the next character without consuming it.
    pub fn peek_next(&self) -> Option<char>
    {
        self.remaining().chars().next()
    }

    /// Get and consume the next character.
    pub fn next_char(&mut self) -> Option<char>
    {
        let next = self.peek_next();

        if let Some(next_char) = next
        {
            self.cursor += next_char.len_utf8();
        }

        next
    }

    /// Is the given offset the first non-blank position of the line?
    pub fn is_line_start(&self, offset: usize) -> bool
    {
        self.text[..offset.min(self.text.len())].chars().all(|c| c == ' ' || c == '\t')
    }

    /// Find the delimiter ahead of the cursor.  When found the text before it is returned and the
    /// cursor moves past the delimiter, otherwise nothing is consumed.
    pub fn take_until(&mut self, delimiter: &str) -> Option<String>
    {
        let offset = self.remaining().find(delimiter)?;
        let text = self.remaining()[..offset].to_string();

        self.cursor += offset + delimiter.len();
        Some(text)
    }

    /// Consume everything left on the line and return it.
    pub fn take_rest(&mut self) -> String
    {
        let rest = self.remaining().to_string();

        self.cursor = self.text.len();
        rest
    }

    /// Abandon the rest of the line.
    pub fn skip_rest(&mut self)
    {
        self.cursor = self.text.len();
    }
}



#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn take_until_leaves_cursor_alone_when_missing()
    {
        let mut buffer = SourceBuffer::new("<test>", 1, "abc def");

        assert_eq!(buffer.take_until("\""), None);
        assert_eq!(buffer.cursor(), 0);
        assert_eq!(buffer.take_until(" "), Some("abc".to_string()));
        assert_eq!(buffer.remaining(), "def");
    }

    #[test]
    fn columns_count_characters()
    {
        let buffer = SourceBuffer::new("<test>", 3, "é x\n");

        assert_eq!(buffer.text(), "é x");
        assert_eq!(buffer.location_of(3).column(), 3);
        assert_eq!(buffer.location_of(3).line(), 3);
    }

    #[test]
    fn line_start_ignores_leading_blanks()
    {
        let buffer = SourceBuffer::new("<test>", 1, "  \tsq: dup * ;");

        assert!(buffer.is_line_start(3));
        assert!(!buffer.is_line_start(8));
    }
}
