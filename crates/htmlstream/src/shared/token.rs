//! Token model.

use super::span::Span;

/// Element namespace. Written by the tree builder when it reparents tags
/// into foreign content; the tokenizer always emits [`Namespace::Html`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Namespace {
    #[default]
    Html,
    MathMl,
    Svg,
}

/// Attribute with name and value spans into the stream buffer.
///
/// A value-less attribute keeps an empty value span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Attribute {
    pub name: Span,
    pub value: Span,
}

/// Start or end tag.
///
/// The tokenizer reuses one `Tag` (including its attribute storage) for
/// every tag it constructs; sinks that need tag data to survive past the
/// delivery call must copy it out.
#[derive(Clone, Debug, Default)]
pub struct Tag {
    pub name: Span,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
    pub ns: Namespace,
}

/// Doctype payload.
///
/// `correct` is the primary signal: true iff the collected name equals
/// `HTML` after the in-place uppercasing applied while reading it. The
/// identifier fields complete the interface but are never populated by the
/// tokenizer itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct Doctype {
    pub name: Span,
    pub public_id: Option<Span>,
    pub system_id: Option<Span>,
    pub correct: bool,
}

/// Token delivered to the sink.
///
/// Tag and doctype payloads borrow the tokenizer's scratch state and are
/// only valid for the duration of the sink call.
#[derive(Clone, Copy, Debug)]
pub enum Token<'t> {
    Character(Span),
    StartTag(&'t Tag),
    EndTag(&'t Tag),
    Comment(Span),
    Doctype(&'t Doctype),
    Eof,
}

/// Interpretation applied to character data, set by the driver between
/// tokens (after `<script>`, `<title>`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentModel {
    /// Tags and character references.
    #[default]
    Pcdata,
    /// Character references and the matching close tag only.
    Rcdata,
    /// The matching close tag only.
    Cdata,
    /// Nothing; everything is character data.
    Plaintext,
}
