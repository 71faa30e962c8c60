//! Tokenizer state machine definitions.

/// One variant per tokenizer state; the machine starts in `Data`.
///
/// `NumberedEntity` and `NamedEntity` belong to the entity sub-machine and
/// are only entered through `consume_entity`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum State {
    #[default]
    Data,
    EntityData,
    TagOpen,
    CloseTagOpen,
    CloseTagMatch,
    TagName,
    BeforeAttributeName,
    AttributeName,
    AfterAttributeName,
    BeforeAttributeValue,
    AttributeValueDq,
    AttributeValueSq,
    AttributeValueUq,
    EntityInAttributeValue,
    BogusComment,
    MarkupDeclarationOpen,
    CommentStart,
    Comment,
    CommentDash,
    CommentEnd,
    MatchDoctype,
    Doctype,
    BeforeDoctypeName,
    DoctypeName,
    AfterDoctypeName,
    BogusDoctype,
    NumberedEntity,
    NamedEntity,
}
