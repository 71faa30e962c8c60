//! Shared types for the tokenizer path.

mod counters;
mod error;
mod span;
mod token;

pub use counters::TokenizerStats;
pub use error::{ParseError, ParseErrorCode, StreamError, TokenizerError};
pub use span::Span;
pub use token::{Attribute, ContentModel, Doctype, Namespace, Tag, Token};
