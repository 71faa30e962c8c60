//! Streaming HTML5 tokenizer.
//!
//! The tokenizer is an explicit, resumable state machine over a shared
//! [`Stream`]. Handlers consume input through the stream's cursor protocol,
//! accumulate spans in the scratch [`Context`], and deliver finished tokens
//! to the installed sink. A handler that needs input the stream does not
//! yet have suspends the run with every scratch field intact; invoking
//! `run` again after more input was pushed resumes exactly where
//! tokenization stopped.
//!
//! Invariants:
//! - Tokens are delivered in recognition order, exactly once each.
//! - Concatenated character tokens cover every code point the machine
//!   classified as character data, in stream order; runs may split at
//!   input-chunk boundaries but never elsewhere.
//! - Malformed input is reported through the error sink and recovered
//!   from; only stream resource failures abort a run.
//! - The tokenizer is the only mutator of the stream buffer (case folds,
//!   entity replacement, push-back) and forwards every byte-moving edit to
//!   the registered buffer observer.

use entity::EntityScratch;
use states::State;

use crate::shared::{
    Attribute, ContentModel, Doctype, Namespace, ParseError, ParseErrorCode, Span, Tag,
    TokenizerError, TokenizerStats,
};
use crate::stream::{BufferEdit, Peek, Stream};

mod emit;
mod entity;
mod states;
pub mod token_fmt;

#[cfg(test)]
mod tests;

/// Sink receiving each token exactly once, in recognition order.
///
/// Spans borrow the stream buffer as it is at delivery time; resolve or
/// copy them before returning, later tokenization may rewrite bytes at or
/// past the cursor.
pub trait TokenSink {
    fn token(&mut self, token: crate::shared::Token<'_>, stream: &Stream);
}

/// Outcome of [`Tokenizer::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Out of buffered input; push more and run again.
    Suspended,
    /// The EOF token has been delivered; the stream is exhausted.
    Complete,
}

/// Handler outcome: keep dispatching or yield for more input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Suspend,
}

/// Whitespace set used by tag and doctype states.
fn is_space(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\x0b' | '\x0c' | ' ')
}

/// Scratch state for the token under construction.
#[derive(Default)]
struct Context {
    current_tag: Tag,
    current_tag_is_end: bool,
    current_comment: Span,
    current_doctype: Doctype,
    current_chars: Span,
    /// Attribute-value state to resume after an entity in a value.
    prev_state: State,
    /// Consumed prefix of a potential close tag (RCDATA/CDATA).
    close_tag_match: Span,
    /// Name of the last emitted start tag, matched by close tags.
    last_start_tag: Span,
    /// Progress through the literal `DOCTYPE` keyword.
    match_doctype_count: u8,
    match_entity: EntityScratch,
}

/// Streaming HTML5 tokenizer.
pub struct Tokenizer {
    state: State,
    content_model: ContentModel,
    context: Context,
    token_sink: Option<Box<dyn TokenSink>>,
    error_sink: Option<Box<dyn FnMut(ParseError)>>,
    buffer_observer: Option<Box<dyn FnMut(BufferEdit)>>,
    stats: TokenizerStats,
    eof_emitted: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            state: State::Data,
            content_model: ContentModel::Pcdata,
            context: Context::default(),
            token_sink: None,
            error_sink: None,
            buffer_observer: None,
            stats: TokenizerStats::default(),
            eof_emitted: false,
        }
    }

    /// Install the token sink. Without one, emitted tokens are dropped.
    pub fn set_token_sink(&mut self, sink: Box<dyn TokenSink>) {
        self.token_sink = Some(sink);
    }

    /// Install the parse-error sink.
    pub fn set_error_sink(&mut self, sink: Box<dyn FnMut(ParseError)>) {
        self.error_sink = Some(sink);
    }

    /// Install the observer notified of byte-moving buffer edits.
    pub fn set_buffer_observer(&mut self, observer: Box<dyn FnMut(BufferEdit)>) {
        self.buffer_observer = Some(observer);
    }

    /// Switch the content model. Drivers call this between tokens, based on
    /// the element that was just opened.
    pub fn set_content_model(&mut self, model: ContentModel) {
        self.content_model = model;
    }

    pub fn content_model(&self) -> ContentModel {
        self.content_model
    }

    /// Copy of the instrumentation counters.
    pub fn stats(&self) -> TokenizerStats {
        self.stats
    }

    /// Drive the state machine until it runs out of buffered input or the
    /// EOF token has been delivered.
    pub fn run(&mut self, stream: &mut Stream) -> Result<RunState, TokenizerError> {
        if self.eof_emitted {
            return Ok(RunState::Complete);
        }
        loop {
            self.stats.steps += 1;
            let step = match self.state {
                State::Data => self.handle_data(stream),
                State::EntityData => self.handle_entity_data(stream),
                State::TagOpen => self.handle_tag_open(stream),
                State::CloseTagOpen => self.handle_close_tag_open(stream),
                State::CloseTagMatch => self.handle_close_tag_match(stream),
                State::TagName => self.handle_tag_name(stream),
                State::BeforeAttributeName => self.handle_before_attribute_name(stream),
                State::AttributeName => self.handle_attribute_name(stream),
                State::AfterAttributeName => self.handle_after_attribute_name(stream),
                State::BeforeAttributeValue => self.handle_before_attribute_value(stream),
                State::AttributeValueDq => self.handle_attribute_value_dq(stream),
                State::AttributeValueSq => self.handle_attribute_value_sq(stream),
                State::AttributeValueUq => self.handle_attribute_value_uq(stream),
                State::EntityInAttributeValue => self.handle_entity_in_attribute_value(stream),
                State::BogusComment => self.handle_bogus_comment(stream),
                State::MarkupDeclarationOpen => self.handle_markup_declaration_open(stream),
                State::CommentStart => self.handle_comment_start(stream),
                State::Comment => self.handle_comment(stream),
                State::CommentDash => self.handle_comment_dash(stream),
                State::CommentEnd => self.handle_comment_end(stream),
                State::MatchDoctype => self.handle_match_doctype(stream),
                State::Doctype => self.handle_doctype(stream),
                State::BeforeDoctypeName => self.handle_before_doctype_name(stream),
                State::DoctypeName => self.handle_doctype_name(stream),
                State::AfterDoctypeName => self.handle_after_doctype_name(stream),
                State::BogusDoctype => self.handle_bogus_doctype(stream),
                State::NumberedEntity => self.handle_numbered_entity(stream),
                State::NamedEntity => self.handle_named_entity(stream),
            }?;
            if matches!(step, Step::Suspend) {
                break;
            }
        }
        if self.eof_emitted {
            Ok(RunState::Complete)
        } else {
            Ok(RunState::Suspended)
        }
    }

    fn transition(&mut self, next: State) {
        if self.state == next {
            return;
        }
        #[cfg(any(test, feature = "debug-trace"))]
        log::trace!(
            target: "htmlstream.tokenizer",
            "state {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
        self.stats.state_transitions += 1;
    }

    fn parse_error(&mut self, code: ParseErrorCode, position: usize) {
        self.stats.parse_errors += 1;
        if let Some(sink) = self.error_sink.as_mut() {
            sink(ParseError { code, position });
        }
    }

    fn notify_buffer_edit(&mut self, edit: BufferEdit) {
        if let Some(observer) = self.buffer_observer.as_mut() {
            observer(edit);
        }
    }

    /// Delimiters that interrupt a character-data run.
    fn data_delimiters(&self) -> &'static [u8] {
        match self.content_model {
            ContentModel::Pcdata | ContentModel::Rcdata => b"&<",
            ContentModel::Cdata => b"<",
            ContentModel::Plaintext => b"",
        }
    }

    /// Reset the tag scratch for a new tag whose name starts at the cursor.
    fn start_tag(&mut self, stream: &Stream, is_end: bool) {
        let tag = &mut self.context.current_tag;
        tag.name = stream.cur_span();
        tag.attributes.clear();
        tag.self_closing = false;
        tag.ns = Namespace::Html;
        self.context.current_tag_is_end = is_end;
    }

    /// Open a fresh attribute whose name starts at the cursor.
    fn new_attribute(&mut self, stream: &Stream) {
        self.context.current_tag.attributes.push(Attribute {
            name: stream.cur_span(),
            value: Span::empty(),
        });
    }

    fn extend_attr_name(&mut self, stream: &Stream) {
        if let Some(attr) = self.context.current_tag.attributes.last_mut() {
            attr.name.extend_to(stream.cur_span());
        } else {
            debug_assert!(false, "attribute name extended with no open attribute");
        }
    }

    fn extend_attr_value(&mut self, stream: &Stream) {
        if let Some(attr) = self.context.current_tag.attributes.last_mut() {
            attr.value.extend_to(stream.cur_span());
        } else {
            debug_assert!(false, "attribute value extended with no open attribute");
        }
    }

    fn handle_data(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        self.context.current_chars = Span::empty();
        loop {
            match stream.peek() {
                Peek::Char('&')
                    if matches!(
                        self.content_model,
                        ContentModel::Pcdata | ContentModel::Rcdata
                    ) =>
                {
                    self.flush_characters(stream);
                    // Leave the '&' in place; the entity consumer reads it.
                    self.transition(State::EntityData);
                    return Ok(Step::Continue);
                }
                Peek::Char('<') if self.content_model != ContentModel::Plaintext => {
                    self.flush_characters(stream);
                    // Track the '<' so a failed tag open can re-emit it.
                    self.context.current_chars = stream.cur_span();
                    self.transition(State::TagOpen);
                    stream.advance();
                    return Ok(Step::Continue);
                }
                Peek::Char(_) => {
                    let run = stream.take_run(self.data_delimiters());
                    self.context.current_chars.extend_to(run);
                }
                Peek::OutOfData => {
                    // Flush before yielding so runs never straddle a refill.
                    self.flush_characters(stream);
                    return Ok(Step::Suspend);
                }
                Peek::Eof => {
                    self.flush_characters(stream);
                    self.emit_eof(stream);
                    return Ok(Step::Suspend);
                }
            }
        }
    }

    fn handle_entity_data(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        if !self.context.match_entity.complete {
            return self.consume_entity(stream);
        }
        match stream.peek() {
            Peek::Char(_) => {
                // The cursor sits on the resolved code point (or on the '&'
                // nothing resolved from); either way it is one character.
                let span = stream.cur_span();
                self.emit_character(span, stream);
                self.context.match_entity.complete = false;
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Eof => {
                debug_assert!(false, "entity consumer left the cursor at EOF");
                self.context.match_entity.complete = false;
                self.transition(State::Data);
                Ok(Step::Continue)
            }
        }
    }

    fn handle_tag_open(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        if matches!(stream.peek(), Peek::OutOfData) {
            return Ok(Step::Suspend);
        }
        match self.content_model {
            ContentModel::Rcdata | ContentModel::Cdata => {
                if let Peek::Char('/') = stream.peek() {
                    self.context.current_chars.extend_to(stream.cur_span());
                    self.transition(State::CloseTagOpen);
                    stream.advance();
                } else {
                    // Not a close tag, so the pending '<' is plain data.
                    self.flush_characters(stream);
                    self.transition(State::Data);
                }
            }
            ContentModel::Pcdata => match stream.peek() {
                Peek::Char('!') => {
                    self.context.current_chars.extend_to(stream.cur_span());
                    self.transition(State::MarkupDeclarationOpen);
                    stream.advance();
                }
                Peek::Char('/') => {
                    self.context.current_chars.extend_to(stream.cur_span());
                    self.transition(State::CloseTagOpen);
                    stream.advance();
                }
                Peek::Char(c) if c.is_ascii_alphabetic() => {
                    if c.is_ascii_uppercase() {
                        stream.lowercase_cur();
                    }
                    self.start_tag(stream, false);
                    self.transition(State::TagName);
                    stream.advance();
                }
                Peek::Char('>') => {
                    self.parse_error(ParseErrorCode::EmptyTag, stream.cursor());
                    self.context.current_chars.extend_to(stream.cur_span());
                    self.flush_characters(stream);
                    self.transition(State::Data);
                    stream.advance();
                }
                Peek::Char('?') => {
                    self.parse_error(ParseErrorCode::BogusComment, stream.cursor());
                    self.context.current_chars.extend_to(stream.cur_span());
                    self.context.current_comment = stream.cur_span();
                    self.transition(State::BogusComment);
                    stream.advance();
                }
                _ => {
                    self.flush_characters(stream);
                    self.transition(State::Data);
                }
            },
            ContentModel::Plaintext => {
                debug_assert!(false, "tag open reached in plaintext content model");
                self.flush_characters(stream);
                self.transition(State::Data);
            }
        }
        Ok(Step::Continue)
    }

    fn handle_close_tag_open(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        if matches!(
            self.content_model,
            ContentModel::Rcdata | ContentModel::Cdata
        ) {
            self.context.close_tag_match = Span::empty();
            self.transition(State::CloseTagMatch);
            return Ok(Step::Continue);
        }
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if c.is_ascii_alphabetic() => {
                if c.is_ascii_uppercase() {
                    stream.lowercase_cur();
                }
                self.start_tag(stream, true);
                self.transition(State::TagName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                // "</>" is dropped without a token.
                self.parse_error(ParseErrorCode::EmptyEndTag, stream.cursor());
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.parse_error(ParseErrorCode::StrayEndTagOpen, stream.cursor());
                self.flush_characters(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.parse_error(ParseErrorCode::BogusComment, stream.cursor());
                self.context.current_comment = stream.cur_span();
                self.transition(State::BogusComment);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    /// Match the consumed bytes against the last start tag's name. Used
    /// only in RCDATA/CDATA; on success the content model reverts to PCDATA
    /// and the close tag is re-read through the PCDATA path.
    fn handle_close_tag_match(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        let target = self.context.last_start_tag;
        while self.context.close_tag_match.len() < target.len() {
            match stream.peek() {
                Peek::OutOfData => return Ok(Step::Suspend),
                Peek::Eof => {
                    // Input ended mid-name: "</" was plain data after all.
                    stream.rewind(self.context.close_tag_match.len())?;
                    self.parse_error(ParseErrorCode::StrayEndTagOpen, stream.cursor());
                    self.flush_characters(stream);
                    self.transition(State::Data);
                    return Ok(Step::Continue);
                }
                Peek::Char(_) => {
                    self.context.close_tag_match.extend_to(stream.cur_span());
                    stream.advance();
                    let matched = self.context.close_tag_match;
                    if matched.len() > target.len()
                        || (matched.len() == target.len()
                            && !stream.range_eq_ci(target.start, matched.start, target.len()))
                    {
                        stream.rewind(matched.len())?;
                        self.flush_characters(stream);
                        self.transition(State::Data);
                        return Ok(Step::Continue);
                    }
                }
            }
        }
        // Full-length, case-insensitive match; the next character decides.
        let next = match stream.peek() {
            Peek::OutOfData => return Ok(Step::Suspend),
            Peek::Eof => None,
            Peek::Char(c) => Some(c),
        };
        stream.rewind(self.context.close_tag_match.len())?;
        if let Some(c) = next
            && !matches!(c, '\t' | '\n' | '\x0b' | '\x0c' | ' ' | '>' | '/' | '<')
        {
            self.flush_characters(stream);
            self.transition(State::Data);
            return Ok(Step::Continue);
        }
        self.content_model = ContentModel::Pcdata;
        self.transition(State::CloseTagOpen);
        Ok(Step::Continue)
    }

    fn handle_tag_name(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                self.transition(State::BeforeAttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                self.emit_current_tag(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char(c) if c.is_ascii_uppercase() => {
                stream.lowercase_cur();
                self.context.current_tag.name.extend_to(stream.cur_span());
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('<') | Peek::Eof => {
                self.parse_error(ParseErrorCode::UnexpectedTagEnd, stream.cursor());
                self.emit_current_tag(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char('/') => {
                // TODO: recognize self-closing start tags; for now a slash
                // in a tag is skipped like whitespace.
                self.transition(State::BeforeAttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.context.current_tag.name.extend_to(stream.cur_span());
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_before_attribute_name(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                self.emit_current_tag(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char(c) if c.is_ascii_uppercase() => {
                stream.lowercase_cur();
                self.new_attribute(stream);
                self.transition(State::AttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('/') => {
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('<') | Peek::Eof => {
                self.parse_error(ParseErrorCode::UnexpectedTagEnd, stream.cursor());
                self.emit_current_tag(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.new_attribute(stream);
                self.transition(State::AttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_attribute_name(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                self.transition(State::AfterAttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('=') => {
                self.transition(State::BeforeAttributeValue);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                self.emit_current_tag(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char(c) if c.is_ascii_uppercase() => {
                stream.lowercase_cur();
                self.extend_attr_name(stream);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('/') => {
                self.transition(State::BeforeAttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('<') | Peek::Eof => {
                self.parse_error(ParseErrorCode::UnexpectedTagEnd, stream.cursor());
                self.emit_current_tag(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.extend_attr_name(stream);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_after_attribute_name(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('=') => {
                self.transition(State::BeforeAttributeValue);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                self.emit_current_tag(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char(c) if c.is_ascii_uppercase() => {
                stream.lowercase_cur();
                self.new_attribute(stream);
                self.transition(State::AttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('/') => {
                self.transition(State::BeforeAttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('<') | Peek::Eof => {
                self.parse_error(ParseErrorCode::UnexpectedTagEnd, stream.cursor());
                self.emit_current_tag(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.new_attribute(stream);
                self.transition(State::AttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_before_attribute_value(
        &mut self,
        stream: &mut Stream,
    ) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('"') => {
                self.transition(State::AttributeValueDq);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('&') => {
                // The '&' belongs to the unquoted value's entity handling.
                self.transition(State::AttributeValueUq);
                Ok(Step::Continue)
            }
            Peek::Char('\'') => {
                self.transition(State::AttributeValueSq);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                self.emit_current_tag(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('<') | Peek::Eof => {
                self.parse_error(ParseErrorCode::UnexpectedTagEnd, stream.cursor());
                self.emit_current_tag(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.extend_attr_value(stream);
                self.transition(State::AttributeValueUq);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_attribute_value_dq(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char('"') => {
                self.transition(State::BeforeAttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('&') => {
                self.context.prev_state = self.state;
                self.transition(State::EntityInAttributeValue);
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.parse_error(ParseErrorCode::UnexpectedTagEnd, stream.cursor());
                self.emit_current_tag(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.extend_attr_value(stream);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_attribute_value_sq(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char('\'') => {
                self.transition(State::BeforeAttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('&') => {
                self.context.prev_state = self.state;
                self.transition(State::EntityInAttributeValue);
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.parse_error(ParseErrorCode::UnexpectedTagEnd, stream.cursor());
                self.emit_current_tag(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.extend_attr_value(stream);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_attribute_value_uq(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                self.transition(State::BeforeAttributeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('&') => {
                self.context.prev_state = self.state;
                self.transition(State::EntityInAttributeValue);
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                self.emit_current_tag(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('<') | Peek::Eof => {
                self.parse_error(ParseErrorCode::UnexpectedTagEnd, stream.cursor());
                self.emit_current_tag(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.extend_attr_value(stream);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_entity_in_attribute_value(
        &mut self,
        stream: &mut Stream,
    ) -> Result<Step, TokenizerError> {
        if !self.context.match_entity.complete {
            return self.consume_entity(stream);
        }
        match stream.peek() {
            Peek::Char(_) => {
                self.extend_attr_value(stream);
                self.context.match_entity.complete = false;
                self.transition(self.context.prev_state);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Eof => {
                debug_assert!(false, "entity consumer left the cursor at EOF");
                self.context.match_entity.complete = false;
                self.transition(self.context.prev_state);
                Ok(Step::Continue)
            }
        }
    }

    fn handle_bogus_comment(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        loop {
            match stream.peek() {
                Peek::OutOfData => return Ok(Step::Suspend),
                Peek::Eof => break,
                Peek::Char('>') => {
                    stream.advance();
                    break;
                }
                Peek::Char(_) => {
                    self.context.current_comment.extend_to(stream.cur_span());
                    stream.advance();
                }
            }
        }
        self.emit_comment(stream);
        self.transition(State::Data);
        Ok(Step::Continue)
    }

    fn handle_markup_declaration_open(
        &mut self,
        stream: &mut Stream,
    ) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char('-') => {
                self.transition(State::CommentStart);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char(c) if c.to_ascii_uppercase() == 'D' => {
                stream.uppercase_cur();
                self.context.match_doctype_count = 1;
                self.transition(State::MatchDoctype);
                stream.advance();
                Ok(Step::Continue)
            }
            _ => {
                self.parse_error(ParseErrorCode::BogusComment, stream.cursor());
                self.context.current_comment = Span::empty();
                self.transition(State::BogusComment);
                Ok(Step::Continue)
            }
        }
    }

    fn handle_comment_start(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        if matches!(stream.peek(), Peek::OutOfData) {
            return Ok(Step::Suspend);
        }
        self.context.current_comment = Span::empty();
        if let Peek::Char('-') = stream.peek() {
            self.transition(State::Comment);
            stream.advance();
        } else {
            // Only one dash: it re-enters the stream as bogus-comment data.
            stream.push_back(b'-')?;
            self.parse_error(ParseErrorCode::BogusComment, stream.cursor());
            self.transition(State::BogusComment);
        }
        Ok(Step::Continue)
    }

    fn handle_comment(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char('-') => {
                self.transition(State::CommentDash);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.emit_comment(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.context.current_comment.extend_to(stream.cur_span());
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_comment_dash(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char('-') => {
                self.transition(State::CommentEnd);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.emit_comment(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                // The skipped dash rejoins the body along with this char.
                self.context.current_comment.extend_to(stream.cur_span());
                self.transition(State::Comment);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_comment_end(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char('>') => {
                self.emit_comment(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('-') => {
                // Surplus dash: the body grows to end just before it.
                let cur = stream.cur_span();
                if self.context.current_comment.is_empty() {
                    self.context.current_comment = cur;
                } else {
                    self.context.current_comment.end = cur.start;
                }
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.emit_comment(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                // "--" was not the end after all; it rejoins the body.
                self.context.current_comment.extend_to(stream.cur_span());
                self.transition(State::Comment);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    /// Match the literal `DOCTYPE`, uppercasing as it goes so the keyword
    /// reads canonically in the buffer afterwards.
    fn handle_match_doctype(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        const REST: &[u8] = b"OCTYPE";
        let count = self.context.match_doctype_count as usize;
        debug_assert!((1..=6).contains(&count), "doctype match counter out of range");
        let expected = REST[count.clamp(1, 6) - 1];
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if c.to_ascii_uppercase() == expected as char => {
                stream.uppercase_cur();
                if count == 6 {
                    self.context.current_doctype = Doctype::default();
                    self.transition(State::Doctype);
                } else {
                    self.context.match_doctype_count += 1;
                }
                stream.advance();
                Ok(Step::Continue)
            }
            _ => {
                // Put the consumed "DOCTYP" prefix back; it becomes the
                // start of the bogus comment body.
                for &b in b"DOCTYP"[..count].iter().rev() {
                    stream.push_back(b)?;
                }
                self.parse_error(ParseErrorCode::BogusComment, stream.cursor());
                self.context.current_comment = Span::empty();
                self.transition(State::BogusComment);
                Ok(Step::Continue)
            }
        }
    }

    fn handle_doctype(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                stream.advance();
                self.transition(State::BeforeDoctypeName);
                Ok(Step::Continue)
            }
            _ => {
                self.transition(State::BeforeDoctypeName);
                Ok(Step::Continue)
            }
        }
    }

    fn handle_before_doctype_name(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                self.emit_current_doctype(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.emit_current_doctype(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(c) => {
                if c.is_ascii_lowercase() {
                    stream.uppercase_cur();
                }
                self.context.current_doctype.name = stream.cur_span();
                self.context.current_doctype.correct = false;
                self.transition(State::DoctypeName);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_doctype_name(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                self.transition(State::AfterDoctypeName);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                self.context.current_doctype.correct =
                    stream.range_eq_ascii(self.context.current_doctype.name, b"HTML");
                self.emit_current_doctype(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.emit_current_doctype(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(c) => {
                if c.is_ascii_lowercase() {
                    stream.uppercase_cur();
                }
                self.context.current_doctype.name.extend_to(stream.cur_span());
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_after_doctype_name(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char(c) if is_space(c) => {
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Char('>') => {
                self.context.current_doctype.correct =
                    stream.range_eq_ascii(self.context.current_doctype.name, b"HTML");
                self.emit_current_doctype(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.emit_current_doctype(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                self.parse_error(ParseErrorCode::BogusDoctype, stream.cursor());
                self.context.current_doctype.correct = false;
                self.transition(State::BogusDoctype);
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }

    fn handle_bogus_doctype(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char('>') => {
                self.emit_current_doctype(stream);
                self.transition(State::Data);
                stream.advance();
                Ok(Step::Continue)
            }
            Peek::Eof => {
                self.emit_current_doctype(stream);
                self.transition(State::Data);
                Ok(Step::Continue)
            }
            Peek::Char(_) => {
                stream.advance();
                Ok(Step::Continue)
            }
        }
    }
}
