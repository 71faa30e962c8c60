//! Character-reference consumption.
//!
//! The entity consumer is a sub-machine: `consume_entity` performs one-time
//! setup after the `&`, then `NumberedEntity`/`NamedEntity` drive the
//! numeric accumulator or the stepwise table matcher. On completion the
//! matched span has been rewritten in the stream buffer (or left alone when
//! nothing resolved), the cursor sits on the first resulting code point,
//! and control returns to the state that saw the `&`.

use crate::entities::{EntitySearch, EntityStep};
use crate::shared::{ParseErrorCode, Span, TokenizerError};
use crate::stream::{Peek, Stream};

use super::states::State;
use super::{Step, Tokenizer};

/// Windows-1252 interpretations of numeric references 0x80..=0x9F.
const CP1252: [char; 32] = [
    '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
    '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
];

/// Entity-match scratch; lives across suspensions mid-reference.
#[derive(Default)]
pub(super) struct EntityScratch {
    /// Everything consumed so far, `&` included.
    pub(super) span: Span,
    /// Numeric base; 0 until the `x` probe has run.
    pub(super) base: u32,
    /// Accumulated numeric value (saturating).
    pub(super) value: u32,
    /// Whether at least one digit was consumed.
    pub(super) had_data: bool,
    /// Longest named match found so far.
    pub(super) found: Option<char>,
    /// Length of `span` when `found` was recorded.
    pub(super) prev_len: usize,
    pub(super) search: EntitySearch,
    pub(super) return_state: Option<State>,
    pub(super) complete: bool,
    pub(super) done_setup: bool,
}

/// Final interpretation of a numeric reference value.
fn resolve_numeric(value: u32) -> (char, Option<ParseErrorCode>) {
    match value {
        0x80..=0x9F => (
            CP1252[(value - 0x80) as usize],
            Some(ParseErrorCode::CharRefControl),
        ),
        0 => ('\u{FFFD}', Some(ParseErrorCode::CharRefOutOfRange)),
        v => match char::from_u32(v) {
            Some(cp) => (cp, None),
            // Surrogates and values past the last scalar.
            None => ('\u{FFFD}', Some(ParseErrorCode::CharRefOutOfRange)),
        },
    }
}

fn is_entity_digit(c: char, base: u32) -> bool {
    if base == 16 {
        c.is_ascii_hexdigit()
    } else {
        c.is_ascii_digit()
    }
}

impl Tokenizer {
    /// Entry point for both entity states: record where the reference
    /// starts, then route to the numeric or named sub-state.
    pub(super) fn consume_entity(&mut self, stream: &mut Stream) -> Result<Step, TokenizerError> {
        if !self.context.match_entity.done_setup {
            let ent = &mut self.context.match_entity;
            ent.span = stream.cur_span();
            ent.base = 0;
            ent.value = 0;
            ent.had_data = false;
            ent.found = None;
            ent.prev_len = ent.span.len();
            ent.search = EntitySearch::new();
            ent.return_state = Some(self.state);
            ent.complete = false;
            ent.done_setup = true;
            stream.advance();
        }
        match stream.peek() {
            Peek::OutOfData => Ok(Step::Suspend),
            Peek::Char('#') => {
                self.context.match_entity.span.extend_to(stream.cur_span());
                self.transition(State::NumberedEntity);
                stream.advance();
                Ok(Step::Continue)
            }
            _ => {
                self.transition(State::NamedEntity);
                Ok(Step::Continue)
            }
        }
    }

    pub(super) fn handle_numbered_entity(
        &mut self,
        stream: &mut Stream,
    ) -> Result<Step, TokenizerError> {
        if matches!(stream.peek(), Peek::OutOfData) {
            return Ok(Step::Suspend);
        }
        if self.context.match_entity.base == 0 {
            if let Peek::Char('x' | 'X') = stream.peek() {
                self.context.match_entity.base = 16;
                self.context.match_entity.span.extend_to(stream.cur_span());
                stream.advance();
            } else {
                self.context.match_entity.base = 10;
            }
        }
        loop {
            match stream.peek() {
                Peek::OutOfData => return Ok(Step::Suspend),
                Peek::Char(c) if is_entity_digit(c, self.context.match_entity.base) => {
                    let ent = &mut self.context.match_entity;
                    ent.had_data = true;
                    let digit = c.to_digit(ent.base).unwrap_or(0);
                    ent.value = ent.value.saturating_mul(ent.base).saturating_add(digit);
                    ent.span.extend_to(stream.cur_span());
                    stream.advance();
                }
                _ => break,
            }
        }
        // A trailing semicolon is part of the reference, digits or not.
        if let Peek::Char(';') = stream.peek() {
            self.context.match_entity.span.extend_to(stream.cur_span());
            stream.advance();
        }
        let span = self.context.match_entity.span;
        stream.rewind(span.len())?;
        if self.context.match_entity.had_data {
            let (cp, error) = resolve_numeric(self.context.match_entity.value);
            if let Some(code) = error {
                self.parse_error(code, span.start);
            }
            let edit = stream.replace_range(span, cp)?;
            self.notify_buffer_edit(edit);
        }
        self.finish_entity();
        Ok(Step::Continue)
    }

    pub(super) fn handle_named_entity(
        &mut self,
        stream: &mut Stream,
    ) -> Result<Step, TokenizerError> {
        loop {
            let c = match stream.peek() {
                Peek::OutOfData => return Ok(Step::Suspend),
                Peek::Eof => break,
                Peek::Char(c) => c,
            };
            if !c.is_ascii() {
                // Entity names are ASCII only.
                break;
            }
            let ent = &mut self.context.match_entity;
            match ent.search.step(c as u8) {
                EntityStep::Match(cp) => {
                    ent.found = Some(cp);
                    ent.span.extend_to(stream.cur_span());
                    ent.prev_len = ent.span.len();
                }
                EntityStep::NeedsMore => {
                    ent.span.extend_to(stream.cur_span());
                }
                EntityStep::NoMatch => break,
            }
            stream.advance();
        }
        // A ';' directly after the longest match belongs to it.
        if self.context.match_entity.found.is_some()
            && matches!(stream.peek(), Peek::Char(';'))
            && self.context.match_entity.prev_len == self.context.match_entity.span.len()
        {
            self.context.match_entity.prev_len += stream.cur_span().len();
        }
        let span = self.context.match_entity.span;
        stream.rewind(span.len())?;
        if let Some(cp) = self.context.match_entity.found {
            // Bytes past `prev_len` formed no entity; they stay in the
            // buffer and are reprocessed as ordinary input.
            let matched = Span::new(span.start, span.start + self.context.match_entity.prev_len);
            let edit = stream.replace_range(matched, cp)?;
            self.notify_buffer_edit(edit);
        }
        self.finish_entity();
        Ok(Step::Continue)
    }

    fn finish_entity(&mut self) {
        let ent = &mut self.context.match_entity;
        ent.done_setup = false;
        ent.complete = true;
        let next = ent.return_state.take().unwrap_or(State::Data);
        self.transition(next);
    }
}
