use std::cell::RefCell;
use std::rc::Rc;

use super::token_fmt::{CollectSink, OwnedToken, coalesce};
use super::{RunState, Tokenizer};
use crate::shared::{ContentModel, ParseError, ParseErrorCode};
use crate::stream::{BufferEdit, Stream};

fn chars(text: &str) -> OwnedToken {
    OwnedToken::Character(text.to_string())
}

fn start(name: &str, attributes: &[(&str, &str)]) -> OwnedToken {
    OwnedToken::StartTag {
        name: name.to_string(),
        attributes: attributes
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect(),
        self_closing: false,
    }
}

fn end(name: &str) -> OwnedToken {
    OwnedToken::EndTag {
        name: name.to_string(),
    }
}

fn comment(text: &str) -> OwnedToken {
    OwnedToken::Comment(text.to_string())
}

fn doctype(name: &str, correct: bool) -> OwnedToken {
    OwnedToken::Doctype {
        name: name.to_string(),
        correct,
    }
}

fn collecting_tokenizer() -> (Tokenizer, Rc<RefCell<Vec<OwnedToken>>>) {
    let (sink, tokens) = CollectSink::new();
    let mut tokenizer = Tokenizer::new();
    tokenizer.set_token_sink(Box::new(sink));
    (tokenizer, tokens)
}

fn tokenize(input: &str) -> Vec<OwnedToken> {
    let (mut tokenizer, tokens) = collecting_tokenizer();
    let mut stream = Stream::new();
    stream.push_str(input);
    stream.close();
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Complete
    );
    let out = tokens.borrow().clone();
    out
}

/// Feed one character at a time, pumping the tokenizer between pushes.
fn tokenize_char_at_a_time(input: &str) -> Vec<OwnedToken> {
    let (mut tokenizer, tokens) = collecting_tokenizer();
    let mut stream = Stream::new();
    let mut buf = [0u8; 4];
    for ch in input.chars() {
        stream.push_str(ch.encode_utf8(&mut buf));
        let state = tokenizer.run(&mut stream).expect("no stream failure");
        assert_eq!(state, RunState::Suspended);
    }
    stream.close();
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Complete
    );
    let out = tokens.borrow().clone();
    out
}

#[test]
fn plain_start_and_end_tags() {
    assert_eq!(
        tokenize("<p>hi</p>"),
        vec![start("p", &[]), chars("hi"), end("p"), OwnedToken::Eof]
    );
}

#[test]
fn quoted_attribute_with_entity() {
    assert_eq!(
        tokenize("<a href=\"x&amp;y\">z</a>"),
        vec![
            start("a", &[("href", "x&y")]),
            chars("z"),
            end("a"),
            OwnedToken::Eof
        ]
    );
}

#[test]
fn doctype_html_is_correct() {
    assert_eq!(
        tokenize("<!DOCTYPE html>"),
        vec![doctype("HTML", true), OwnedToken::Eof]
    );
}

#[test]
fn doctype_name_is_uppercased_in_place() {
    assert_eq!(
        tokenize("<!dOcTyPe HtMl>"),
        vec![doctype("HTML", true), OwnedToken::Eof]
    );
}

#[test]
fn doctype_other_name_is_quirky() {
    assert_eq!(
        tokenize("<!DOCTYPE foo>"),
        vec![doctype("FOO", false), OwnedToken::Eof]
    );
}

#[test]
fn doctype_without_name_is_quirky() {
    assert_eq!(
        tokenize("<!DOCTYPE>"),
        vec![doctype("", false), OwnedToken::Eof]
    );
}

#[test]
fn doctype_trailing_junk_goes_bogus() {
    assert_eq!(
        tokenize("<!DOCTYPE html PUBLIC \"x\">"),
        vec![doctype("HTML", false), OwnedToken::Eof]
    );
}

#[test]
fn comment_preserves_inner_dashes() {
    assert_eq!(
        tokenize("<!-- a -- b -->"),
        vec![comment(" a -- b "), OwnedToken::Eof]
    );
}

#[test]
fn empty_comment() {
    assert_eq!(tokenize("<!---->"), vec![comment(""), OwnedToken::Eof]);
}

#[test]
fn comment_with_surplus_dash_keeps_it_in_the_body() {
    assert_eq!(
        tokenize("<!-- x --->"),
        vec![comment(" x --"), OwnedToken::Eof]
    );
}

#[test]
fn unterminated_comment_is_emitted_at_eof() {
    assert_eq!(tokenize("<!-- xyz"), vec![comment(" xyz"), OwnedToken::Eof]);
}

#[test]
fn single_dash_declaration_is_a_bogus_comment() {
    assert_eq!(tokenize("<!->"), vec![comment("-"), OwnedToken::Eof]);
}

#[test]
fn processing_instruction_is_a_bogus_comment() {
    assert_eq!(
        tokenize("<?xml version=\"1.0\"?>"),
        vec![comment("?xml version=\"1.0\"?"), OwnedToken::Eof]
    );
}

#[test]
fn markup_declaration_junk_is_a_bogus_comment() {
    assert_eq!(tokenize("<!foo>"), vec![comment("foo"), OwnedToken::Eof]);
}

#[test]
fn doctype_keyword_mismatch_replays_the_uppercased_prefix() {
    // The matched prefix was uppercased in place before the mismatch.
    assert_eq!(
        tokenize("<!doctypx>"),
        vec![comment("DOCTYPx"), OwnedToken::Eof]
    );
}

#[test]
fn end_tag_open_junk_is_a_bogus_comment() {
    assert_eq!(tokenize("</ x>"), vec![comment(" x"), OwnedToken::Eof]);
}

#[test]
fn empty_tag_is_character_data() {
    assert_eq!(tokenize("a<>b"), vec![chars("a"), chars("<>"), chars("b"), OwnedToken::Eof]);
}

#[test]
fn empty_end_tag_is_dropped() {
    assert_eq!(
        coalesce(&tokenize("a</>b")),
        vec![chars("ab"), OwnedToken::Eof]
    );
}

#[test]
fn lone_open_angle_at_eof_is_character_data() {
    assert_eq!(tokenize("<"), vec![chars("<"), OwnedToken::Eof]);
    assert_eq!(tokenize("</"), vec![chars("</"), OwnedToken::Eof]);
}

#[test]
fn non_tag_after_open_angle_reverts_to_data() {
    assert_eq!(
        coalesce(&tokenize("<1>")),
        vec![chars("<1>"), OwnedToken::Eof]
    );
}

#[test]
fn tag_names_and_attribute_names_are_lowercased() {
    assert_eq!(
        tokenize("<DiV CLASS=Box>"),
        vec![start("div", &[("class", "Box")]), OwnedToken::Eof]
    );
}

#[test]
fn duplicate_attributes_keep_the_first_occurrence() {
    assert_eq!(
        tokenize("<X a=1 A=2>"),
        vec![start("x", &[("a", "1")]), OwnedToken::Eof]
    );
    assert_eq!(
        tokenize("<a x=1 y=2 x=3>"),
        vec![start("a", &[("x", "1"), ("y", "2")]), OwnedToken::Eof]
    );
}

#[test]
fn attribute_value_styles() {
    assert_eq!(
        tokenize("<a q=\"d q\" s='s q' u=uq v>"),
        vec![
            start("a", &[("q", "d q"), ("s", "s q"), ("u", "uq"), ("v", "")]),
            OwnedToken::Eof
        ]
    );
}

#[test]
fn slash_in_tag_is_skipped_and_never_self_closes() {
    let tokens = tokenize("<br/>");
    assert_eq!(tokens, vec![start("br", &[]), OwnedToken::Eof]);
    let tokens = tokenize("<a b/c=1>");
    assert_eq!(
        tokens,
        vec![start("a", &[("b", ""), ("c", "1")]), OwnedToken::Eof]
    );
}

#[test]
fn unterminated_tag_is_emitted_at_eof() {
    assert_eq!(tokenize("<p"), vec![start("p", &[]), OwnedToken::Eof]);
    assert_eq!(
        tokenize("<a href"),
        vec![start("a", &[("href", "")]), OwnedToken::Eof]
    );
    assert_eq!(
        tokenize("<a href=\"x"),
        vec![start("a", &[("href", "x")]), OwnedToken::Eof]
    );
}

#[test]
fn open_angle_inside_tag_emits_and_reprocesses() {
    assert_eq!(
        tokenize("<a<b>"),
        vec![start("a", &[]), start("b", &[]), OwnedToken::Eof]
    );
}

#[test]
fn numeric_references_resolve() {
    assert_eq!(
        coalesce(&tokenize("&#x41;&#65;")),
        vec![chars("AA"), OwnedToken::Eof]
    );
    assert_eq!(coalesce(&tokenize("&#9;")), vec![chars("\t"), OwnedToken::Eof]);
}

#[test]
fn numeric_reference_windows_1252_fixups() {
    assert_eq!(
        coalesce(&tokenize("&#128;&#x80;&#159;")),
        vec![chars("\u{20AC}\u{20AC}\u{0178}"), OwnedToken::Eof]
    );
}

#[test]
fn numeric_reference_out_of_range_is_replacement_character() {
    assert_eq!(
        coalesce(&tokenize("&#0;&#x110000;&#xD800;&#99999999999;")),
        vec![
            chars("\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}"),
            OwnedToken::Eof
        ]
    );
}

#[test]
fn bare_numeric_reference_stays_as_data() {
    assert_eq!(
        coalesce(&tokenize("&#;")),
        vec![chars("&#;"), OwnedToken::Eof]
    );
    assert_eq!(
        coalesce(&tokenize("&#x;")),
        vec![chars("&#x;"), OwnedToken::Eof]
    );
    assert_eq!(coalesce(&tokenize("&#")), vec![chars("&#"), OwnedToken::Eof]);
}

#[test]
fn named_reference_without_semicolon_resolves_legacy_names() {
    assert_eq!(
        coalesce(&tokenize("a&ampz")),
        vec![chars("a&z"), OwnedToken::Eof]
    );
    assert_eq!(coalesce(&tokenize("&amp")), vec![chars("&"), OwnedToken::Eof]);
}

#[test]
fn named_reference_longest_match_wins() {
    assert_eq!(
        coalesce(&tokenize("&notin;x")),
        vec![chars("\u{2209}x"), OwnedToken::Eof]
    );
    // "noty" falls back to the shorter "not" and replays the tail.
    assert_eq!(
        coalesce(&tokenize("&noty")),
        vec![chars("\u{00AC}y"), OwnedToken::Eof]
    );
}

#[test]
fn unknown_named_reference_stays_as_data() {
    assert_eq!(
        coalesce(&tokenize("&nosuch;")),
        vec![chars("&nosuch;"), OwnedToken::Eof]
    );
    assert_eq!(coalesce(&tokenize("&;")), vec![chars("&;"), OwnedToken::Eof]);
    assert_eq!(coalesce(&tokenize("&")), vec![chars("&"), OwnedToken::Eof]);
}

#[test]
fn entities_in_attribute_values() {
    assert_eq!(
        tokenize("<a b=&amp>"),
        vec![start("a", &[("b", "&")]), OwnedToken::Eof]
    );
    assert_eq!(
        tokenize("<a b='&#65;'>"),
        vec![start("a", &[("b", "A")]), OwnedToken::Eof]
    );
    assert_eq!(
        tokenize("<a b=\"x&notin;y\">"),
        vec![start("a", &[("b", "x\u{2209}y")]), OwnedToken::Eof]
    );
    assert_eq!(
        tokenize("<a b=\"&xyz;\">"),
        vec![start("a", &[("b", "&xyz;")]), OwnedToken::Eof]
    );
}

#[test]
fn rcdata_only_recognizes_the_matching_close_tag() {
    let (mut tokenizer, tokens) = collecting_tokenizer();
    let mut stream = Stream::new();
    stream.push_str("<title>");
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Suspended
    );
    tokenizer.set_content_model(ContentModel::Rcdata);
    stream.push_str("a&amp;b<x></tixle></TITLE>c");
    stream.close();
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Complete
    );
    assert_eq!(
        coalesce(&tokens.borrow()),
        vec![
            start("title", &[]),
            chars("a&b<x></tixle>"),
            end("title"),
            chars("c"),
            OwnedToken::Eof
        ]
    );
    assert_eq!(tokenizer.content_model(), ContentModel::Pcdata);
}

#[test]
fn cdata_ignores_entities_and_nested_tags() {
    let (mut tokenizer, tokens) = collecting_tokenizer();
    let mut stream = Stream::new();
    stream.push_str("<script>");
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Suspended
    );
    tokenizer.set_content_model(ContentModel::Cdata);
    stream.push_str("if (a &amp;& b) { x = '<div>'; }</script>done");
    stream.close();
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Complete
    );
    assert_eq!(
        coalesce(&tokens.borrow()),
        vec![
            start("script", &[]),
            chars("if (a &amp;& b) { x = '<div>'; }"),
            end("script"),
            chars("done"),
            OwnedToken::Eof
        ]
    );
}

#[test]
fn close_tag_match_requires_a_delimiter_after_the_name() {
    let (mut tokenizer, tokens) = collecting_tokenizer();
    let mut stream = Stream::new();
    stream.push_str("<title>");
    let _ = tokenizer.run(&mut stream).expect("no stream failure");
    tokenizer.set_content_model(ContentModel::Rcdata);
    stream.push_str("a</titles></title>");
    stream.close();
    let _ = tokenizer.run(&mut stream).expect("no stream failure");
    assert_eq!(
        coalesce(&tokens.borrow()),
        vec![
            start("title", &[]),
            chars("a</titles>"),
            end("title"),
            OwnedToken::Eof
        ]
    );
}

#[test]
fn plaintext_consumes_everything() {
    let (mut tokenizer, tokens) = collecting_tokenizer();
    tokenizer.set_content_model(ContentModel::Plaintext);
    let mut stream = Stream::new();
    stream.push_str("a<b>&amp;</plaintext>c");
    stream.close();
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Complete
    );
    assert_eq!(
        coalesce(&tokens.borrow()),
        vec![chars("a<b>&amp;</plaintext>c"), OwnedToken::Eof]
    );
}

#[test]
fn empty_input_emits_only_eof() {
    assert_eq!(tokenize(""), vec![OwnedToken::Eof]);
}

#[test]
fn run_without_close_suspends() {
    let (mut tokenizer, tokens) = collecting_tokenizer();
    let mut stream = Stream::new();
    stream.push_str("abc");
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Suspended
    );
    assert_eq!(*tokens.borrow(), vec![chars("abc")]);
}

#[test]
fn run_after_completion_is_a_no_op() {
    let (mut tokenizer, tokens) = collecting_tokenizer();
    let mut stream = Stream::new();
    stream.push_str("x");
    stream.close();
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Complete
    );
    let count = tokens.borrow().len();
    assert_eq!(
        tokenizer.run(&mut stream).expect("no stream failure"),
        RunState::Complete
    );
    assert_eq!(tokens.borrow().len(), count, "EOF must be delivered once");
}

#[test]
fn chunked_feeding_matches_whole_feeding() {
    let corpus = [
        "<p>hi</p>",
        "<a href=\"x&amp;y\">z</a>",
        "<!DOCTYPE html>",
        "<!-- a -- b -->",
        "<X a=1 A=2>",
        "&#x41;&#65;",
        "a&ampz",
        "&notin;x",
        "<br/>",
        "<?pi?>",
        "plain text",
        "<a<b>",
        "héllo &amp; wörld 🙂",
        "<!doctypx><em>ok</em>",
    ];
    for input in corpus {
        let whole = coalesce(&tokenize(input));
        let chunked = coalesce(&tokenize_char_at_a_time(input));
        assert_eq!(whole, chunked, "chunk divergence for {input:?}");
    }
}

#[test]
fn attribute_names_are_unique_after_emission() {
    let inputs = [
        "<a x=1 x=2 x=3>",
        "<a aa=1 AA=2 aA=3>",
        "<a x y x=1 y=2>",
    ];
    for input in inputs {
        for token in tokenize(input) {
            if let OwnedToken::StartTag { attributes, .. } = token {
                let mut names: Vec<_> = attributes.iter().map(|(n, _)| n.clone()).collect();
                names.sort();
                names.dedup();
                assert_eq!(
                    names.len(),
                    attributes.len(),
                    "duplicate attribute survived in {input:?}"
                );
            }
        }
    }
}

#[test]
fn parse_errors_are_reported_with_positions() {
    let errors: Rc<RefCell<Vec<ParseError>>> = Rc::new(RefCell::new(Vec::new()));
    let errors_handle = Rc::clone(&errors);
    let (sink, _tokens) = CollectSink::new();
    let mut tokenizer = Tokenizer::new();
    tokenizer.set_token_sink(Box::new(sink));
    tokenizer.set_error_sink(Box::new(move |err| {
        errors_handle.borrow_mut().push(err);
    }));
    let mut stream = Stream::new();
    stream.push_str("<>");
    stream.close();
    let _ = tokenizer.run(&mut stream).expect("no stream failure");
    assert_eq!(
        *errors.borrow(),
        vec![ParseError {
            code: ParseErrorCode::EmptyTag,
            position: 1
        }]
    );
    assert_eq!(tokenizer.stats().parse_errors, 1);
}

#[test]
fn buffer_observer_sees_entity_rewrites() {
    let edits: Rc<RefCell<Vec<BufferEdit>>> = Rc::new(RefCell::new(Vec::new()));
    let edits_handle = Rc::clone(&edits);
    let (sink, _tokens) = CollectSink::new();
    let mut tokenizer = Tokenizer::new();
    tokenizer.set_token_sink(Box::new(sink));
    tokenizer.set_buffer_observer(Box::new(move |edit| {
        edits_handle.borrow_mut().push(edit);
    }));
    let mut stream = Stream::new();
    stream.push_str("a&#65;b");
    stream.close();
    let _ = tokenizer.run(&mut stream).expect("no stream failure");
    assert_eq!(
        *edits.borrow(),
        vec![BufferEdit {
            offset: 1,
            old_len: 5,
            new_len: 1
        }]
    );
}

#[test]
fn stats_count_emitted_tokens() {
    let (mut tokenizer, tokens) = collecting_tokenizer();
    let mut stream = Stream::new();
    stream.push_str("<p>hi</p>");
    stream.close();
    let _ = tokenizer.run(&mut stream).expect("no stream failure");
    let stats = tokenizer.stats();
    assert_eq!(stats.tokens_emitted as usize, tokens.borrow().len());
    assert!(stats.steps >= stats.state_transitions);
}
