//! Error taxonomy: recoverable parse errors and fatal resource errors.

use std::fmt;

/// Malformed-input conditions. Reported through the error sink, never
/// fatal; tokenization continues with the recovery behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorCode {
    /// `<>` emitted as character data.
    EmptyTag,
    /// `</>` silently discarded.
    EmptyEndTag,
    /// `</` not followed by a tag name; reverts to character data.
    StrayEndTagOpen,
    /// `<` or end of input inside a tag; the partial tag is emitted.
    UnexpectedTagEnd,
    /// Malformed markup collected as a bogus comment.
    BogusComment,
    /// Junk between a doctype name and `>`.
    BogusDoctype,
    /// Numeric character reference in the Windows-1252 control range.
    CharRefControl,
    /// Numeric character reference with no valid scalar value.
    CharRefOutOfRange,
}

/// Parse error with the byte offset it was detected at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub code: ParseErrorCode,
    pub position: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at byte {}", self.code, self.position)
    }
}

/// Stream resource failure. Fatal: the tokenizer cannot continue after one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamError {
    /// Rewind past the start of the buffer.
    RewindOvershoot { want: usize, have: usize },
    /// Cursor or range edge not on a UTF-8 scalar boundary.
    NotCharBoundary { at: usize },
    /// Pushed-back code point does not match the buffer.
    PushBackMismatch { expected: u8 },
    /// Replacement range outside the buffer.
    BadRange { start: usize, end: usize },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::RewindOvershoot { want, have } => {
                write!(f, "rewind of {want} bytes with only {have} consumed")
            }
            StreamError::NotCharBoundary { at } => {
                write!(f, "byte {at} is not a scalar boundary")
            }
            StreamError::PushBackMismatch { expected } => {
                write!(f, "push-back of 0x{expected:02X} does not match the buffer")
            }
            StreamError::BadRange { start, end } => {
                write!(f, "range {start}..{end} is outside the buffer")
            }
        }
    }
}

impl std::error::Error for StreamError {}

/// Fatal tokenizer failure; `run` must not be called again after one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenizerError {
    Stream(StreamError),
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizerError::Stream(err) => write!(f, "stream failure: {err}"),
        }
    }
}

impl std::error::Error for TokenizerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TokenizerError::Stream(err) => Some(err),
        }
    }
}

impl From<StreamError> for TokenizerError {
    fn from(err: StreamError) -> Self {
        TokenizerError::Stream(err)
    }
}
