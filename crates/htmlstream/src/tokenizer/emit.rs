//! Token finalisation and delivery.

use crate::shared::{Attribute, Span, Token};
use crate::stream::Stream;

use super::{TokenSink, Tokenizer};

fn deliver(sink: &mut Option<Box<dyn TokenSink>>, token: Token<'_>, stream: &Stream) {
    #[cfg(any(test, feature = "debug-trace"))]
    log::trace!(target: "htmlstream.tokenizer", "emit {token:?}");
    if let Some(sink) = sink.as_mut() {
        sink.token(token, stream);
    }
}

/// Drop later duplicates of any attribute name (case-sensitive byte
/// equality); the first occurrence wins and order is preserved.
fn dedup_attributes(attrs: &mut Vec<Attribute>, stream: &Stream) {
    let mut i = 0;
    while i < attrs.len() {
        let name = attrs[i].name;
        let mut j = i + 1;
        while j < attrs.len() {
            let other = attrs[j].name;
            if name.len() == other.len() && stream.range_eq_cs(name.start, other.start, name.len())
            {
                attrs.remove(j);
            } else {
                j += 1;
            }
        }
        i += 1;
    }
}

impl Tokenizer {
    /// Emit the tag under construction.
    pub(super) fn emit_current_tag(&mut self, stream: &Stream) {
        dedup_attributes(&mut self.context.current_tag.attributes, stream);
        if !self.context.current_tag_is_end {
            // Close-tag matching in RCDATA/CDATA compares against this.
            self.context.last_start_tag = self.context.current_tag.name;
        }
        self.stats.tokens_emitted += 1;
        let token = if self.context.current_tag_is_end {
            Token::EndTag(&self.context.current_tag)
        } else {
            Token::StartTag(&self.context.current_tag)
        };
        deliver(&mut self.token_sink, token, stream);
    }

    /// Emit the pending character run, if any, and clear it.
    pub(super) fn flush_characters(&mut self, stream: &Stream) {
        if self.context.current_chars.is_empty() {
            return;
        }
        let span = std::mem::take(&mut self.context.current_chars);
        self.emit_character(span, stream);
    }

    pub(super) fn emit_character(&mut self, span: Span, stream: &Stream) {
        self.stats.tokens_emitted += 1;
        deliver(&mut self.token_sink, Token::Character(span), stream);
    }

    /// Emit the accumulated comment body (possibly empty) and clear it.
    pub(super) fn emit_comment(&mut self, stream: &Stream) {
        let span = std::mem::take(&mut self.context.current_comment);
        self.stats.tokens_emitted += 1;
        deliver(&mut self.token_sink, Token::Comment(span), stream);
    }

    pub(super) fn emit_current_doctype(&mut self, stream: &Stream) {
        self.stats.tokens_emitted += 1;
        deliver(
            &mut self.token_sink,
            Token::Doctype(&self.context.current_doctype),
            stream,
        );
    }

    /// Emit the EOF token once; later calls are no-ops.
    pub(super) fn emit_eof(&mut self, stream: &Stream) {
        if self.eof_emitted {
            return;
        }
        self.eof_emitted = true;
        self.stats.tokens_emitted += 1;
        deliver(&mut self.token_sink, Token::Eof, stream);
    }
}
