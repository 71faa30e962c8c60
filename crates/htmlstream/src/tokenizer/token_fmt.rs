//! Deterministic token rendering and owned token capture.
//!
//! Spans are only valid during sink delivery, so tests (and any consumer
//! that wants tokens past that point) resolve them immediately: either to a
//! stable display line via [`render_token`] or to an [`OwnedToken`] via
//! [`CollectSink`].

use std::cell::RefCell;
use std::fmt::Write;
use std::rc::Rc;

use crate::shared::Token;
use crate::stream::Stream;

use super::TokenSink;

/// Owned copy of a delivered token, spans resolved at delivery time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnedToken {
    Character(String),
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Comment(String),
    Doctype {
        name: String,
        correct: bool,
    },
    Eof,
}

/// Render a token to a stable single-line string.
pub fn render_token(token: Token<'_>, stream: &Stream) -> String {
    match token {
        Token::Character(span) => format!("CHAR \"{}\"", escape_text(stream.slice(span))),
        Token::StartTag(tag) => {
            let mut out = String::new();
            out.push_str("START name=");
            out.push_str(stream.slice(tag.name));
            out.push_str(" attrs=[");
            for (i, attr) in tag.attributes.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(stream.slice(attr.name));
                out.push_str("=\"");
                out.push_str(&escape_text(stream.slice(attr.value)));
                out.push('"');
            }
            out.push_str("] self_closing=");
            out.push_str(if tag.self_closing { "true" } else { "false" });
            out
        }
        Token::EndTag(tag) => format!("END name={}", stream.slice(tag.name)),
        Token::Comment(span) => format!("COMMENT \"{}\"", escape_text(stream.slice(span))),
        Token::Doctype(doctype) => format!(
            "DOCTYPE name={} correct={}",
            stream.slice(doctype.name),
            doctype.correct
        ),
        Token::Eof => "EOF".to_string(),
    }
}

/// Sink that copies every delivered token into a shared buffer.
pub struct CollectSink {
    tokens: Rc<RefCell<Vec<OwnedToken>>>,
}

impl CollectSink {
    /// The sink goes into the tokenizer; the handle stays with the caller.
    pub fn new() -> (Self, Rc<RefCell<Vec<OwnedToken>>>) {
        let tokens = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                tokens: Rc::clone(&tokens),
            },
            tokens,
        )
    }
}

impl TokenSink for CollectSink {
    fn token(&mut self, token: Token<'_>, stream: &Stream) {
        let owned = match token {
            Token::Character(span) => OwnedToken::Character(stream.slice(span).to_string()),
            Token::StartTag(tag) => OwnedToken::StartTag {
                name: stream.slice(tag.name).to_string(),
                attributes: tag
                    .attributes
                    .iter()
                    .map(|attr| {
                        (
                            stream.slice(attr.name).to_string(),
                            stream.slice(attr.value).to_string(),
                        )
                    })
                    .collect(),
                self_closing: tag.self_closing,
            },
            Token::EndTag(tag) => OwnedToken::EndTag {
                name: stream.slice(tag.name).to_string(),
            },
            Token::Comment(span) => OwnedToken::Comment(stream.slice(span).to_string()),
            Token::Doctype(doctype) => OwnedToken::Doctype {
                name: stream.slice(doctype.name).to_string(),
                correct: doctype.correct,
            },
            Token::Eof => OwnedToken::Eof,
        };
        self.tokens.borrow_mut().push(owned);
    }
}

/// Merge adjacent character tokens. Character runs may split at
/// input-chunk boundaries, so comparisons across different chunkings
/// normalize through this first.
pub fn coalesce(tokens: &[OwnedToken]) -> Vec<OwnedToken> {
    let mut out: Vec<OwnedToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let (Some(OwnedToken::Character(run)), OwnedToken::Character(text)) =
            (out.last_mut(), token)
        {
            run.push_str(text);
            continue;
        }
        out.push(token.clone());
    }
    out
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' || ch == '\u{7f}' => {
                let _ = write!(&mut out, "\\u{{{:02X}}}", ch as u32);
            }
            _ => out.push(ch),
        }
    }
    out
}
