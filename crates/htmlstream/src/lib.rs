//! Streaming, resumable HTML5 tokenizer.
//!
//! The tokenizer consumes decoded text from a shared [`Stream`] and
//! delivers character runs, tags, comments, doctypes and EOF to a token
//! sink, recovering from malformed input instead of rejecting it. It is a
//! pure transducer: suspend it whenever the stream runs dry, push more
//! input, and run it again.
//!
//! Invariants:
//! - Chunk equivalence: feeding input in one chunk or many yields the same
//!   token sequence, modulo coalescing of adjacent character runs.
//! - Tokens are delivered exactly once, in recognition order.
//! - Token spans index the stream buffer and are only valid during sink
//!   delivery; copy out what must survive.
//!
//! ```
//! use htmlstream::tokenizer::token_fmt::{CollectSink, OwnedToken};
//! use htmlstream::{RunState, Stream, Tokenizer};
//!
//! let (sink, tokens) = CollectSink::new();
//! let mut tokenizer = Tokenizer::new();
//! tokenizer.set_token_sink(Box::new(sink));
//!
//! let mut stream = Stream::new();
//! stream.push_str("<p>hi</p>");
//! stream.close();
//!
//! let state = tokenizer.run(&mut stream).expect("no stream failure");
//! assert_eq!(state, RunState::Complete);
//! assert_eq!(tokens.borrow().len(), 4); // <p>, "hi", </p>, EOF
//! assert_eq!(
//!     tokens.borrow()[1],
//!     OwnedToken::Character("hi".to_string())
//! );
//! ```

pub mod entities;
mod shared;
pub mod stream;
pub mod tokenizer;

pub use shared::{
    Attribute, ContentModel, Doctype, Namespace, ParseError, ParseErrorCode, Span, StreamError,
    Tag, Token, TokenizerError, TokenizerStats,
};
pub use stream::{BufferEdit, Peek, Stream};
pub use tokenizer::{RunState, TokenSink, Tokenizer};
