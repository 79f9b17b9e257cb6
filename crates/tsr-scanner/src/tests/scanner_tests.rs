use tsr_common::DiagnosticSink;

use crate::scanner::{split_greater_than, tokenize};
use crate::token::TokenValue;
use crate::SyntaxKind;

fn kinds(source: &str) -> Vec<SyntaxKind> {
    let sink = DiagnosticSink::new();
    tokenize("test", source, &sink)
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn greater_than_compounds_are_maximal() {
    use SyntaxKind::*;
    assert_eq!(
        kinds("a >> b >>> c >>= d >>>= e"),
        vec![
            Identifier,
            GreaterThanGreaterThanToken,
            Identifier,
            GreaterThanGreaterThanGreaterThanToken,
            Identifier,
            GreaterThanGreaterThanEqualsToken,
            Identifier,
            GreaterThanGreaterThanGreaterThanEqualsToken,
            Identifier,
            EndOfFileToken,
        ]
    );
}

#[test]
fn split_greater_than_peels_one_angle() {
    use SyntaxKind::*;
    assert_eq!(
        split_greater_than(GreaterThanGreaterThanToken),
        Some(GreaterThanToken)
    );
    assert_eq!(
        split_greater_than(GreaterThanGreaterThanGreaterThanToken),
        Some(GreaterThanGreaterThanToken)
    );
    assert_eq!(
        split_greater_than(GreaterThanGreaterThanEqualsToken),
        Some(GreaterThanEqualsToken)
    );
    assert_eq!(
        split_greater_than(GreaterThanGreaterThanGreaterThanEqualsToken),
        Some(GreaterThanGreaterThanEqualsToken)
    );
    assert_eq!(split_greater_than(GreaterThanToken), None);
}

#[test]
fn slash_is_division_after_an_expression_and_regex_otherwise() {
    use SyntaxKind::*;
    assert_eq!(
        kinds("a / b"),
        vec![Identifier, SlashToken, Identifier, EndOfFileToken]
    );
    assert_eq!(
        kinds("= /ab/g"),
        vec![EqualsToken, RegularExpressionLiteral, EndOfFileToken]
    );
    assert_eq!(kinds("/ab/"), vec![RegularExpressionLiteral, EndOfFileToken]);
    // `)` can end an expression, so the slash divides.
    assert_eq!(
        kinds("(a) / b"),
        vec![
            OpenParenToken,
            Identifier,
            CloseParenToken,
            SlashToken,
            Identifier,
            EndOfFileToken
        ]
    );
}

#[test]
fn numeric_literal_forms() {
    let sink = DiagnosticSink::new();
    let tokens = tokenize("test", "0xFF 0b1_0 0o17 1_000.5 2e3 10n", &sink);
    let values: Vec<&TokenValue> = tokens.iter().map(|t| &t.value).collect();
    assert!(matches!(values[0], TokenValue::Number(n) if *n == 255.0));
    assert!(matches!(values[1], TokenValue::Number(n) if *n == 2.0));
    assert!(matches!(values[2], TokenValue::Number(n) if *n == 15.0));
    assert!(matches!(values[3], TokenValue::Number(n) if *n == 1000.5));
    assert!(matches!(values[4], TokenValue::Number(n) if *n == 2000.0));
    assert_eq!(tokens[5].kind, SyntaxKind::BigIntLiteral);
    assert!(matches!(&tokens[5].value, TokenValue::BigInt(d) if &**d == "10"));
    assert!(sink.is_empty());
}

#[test]
fn invalid_numeric_literal_is_reported_and_scanning_continues() {
    let sink = DiagnosticSink::new();
    let tokens = tokenize("test", "0x; 1", &sink);
    assert_eq!(tokens[0].kind, SyntaxKind::NumericLiteral);
    assert_eq!(tokens[1].kind, SyntaxKind::SemicolonToken);
    assert_eq!(tokens[2].kind, SyntaxKind::NumericLiteral);
    assert!(sink.has_errors());
}

#[test]
fn string_escapes_are_cooked() {
    let sink = DiagnosticSink::new();
    let tokens = tokenize("test", r#""a\nb\tA\x41\u{1F600}""#, &sink);
    assert_eq!(tokens[0].kind, SyntaxKind::StringLiteral);
    assert_eq!(tokens[0].string_value(), Some("a\nb\tAA\u{1F600}"));
    assert!(sink.is_empty());
}

#[test]
fn unterminated_string_is_reported() {
    let sink = DiagnosticSink::new();
    let tokens = tokenize("test", "\"abc\nx", &sink);
    assert_eq!(tokens[0].kind, SyntaxKind::StringLiteral);
    assert!(sink.has_errors());
    assert_eq!(tokens[1].kind, SyntaxKind::Identifier);
}

#[test]
fn template_parts_nest_through_substitutions() {
    use SyntaxKind::*;
    assert_eq!(
        kinds("`a${x}b${ {k: 1} }c`"),
        vec![
            TemplateHead,
            Identifier,
            TemplateMiddle,
            OpenBraceToken,
            Identifier,
            ColonToken,
            NumericLiteral,
            CloseBraceToken,
            TemplateTail,
            EndOfFileToken,
        ]
    );
    assert_eq!(
        kinds("`plain`"),
        vec![NoSubstitutionTemplateLiteral, EndOfFileToken]
    );
}

#[test]
fn nested_templates_inside_substitutions() {
    use SyntaxKind::*;
    assert_eq!(
        kinds("`a${`b${x}`}c`"),
        vec![
            TemplateHead,
            TemplateHead,
            Identifier,
            TemplateTail,
            TemplateTail,
            EndOfFileToken,
        ]
    );
}

#[test]
fn keywords_and_contextual_keywords() {
    use SyntaxKind::*;
    assert_eq!(
        kinds("class keyof readonly frobnicate"),
        vec![
            ClassKeyword,
            KeyOfKeyword,
            ReadonlyKeyword,
            Identifier,
            EndOfFileToken
        ]
    );
    assert!(KeyOfKeyword.is_identifier_like());
    assert!(!ClassKeyword.is_identifier_like());
}

#[test]
fn line_break_flag_is_set_across_newlines() {
    let sink = DiagnosticSink::new();
    let tokens = tokenize("test", "a\nb // trailing\nc", &sink);
    assert!(!tokens[0].preceded_by_line_break);
    assert!(tokens[1].preceded_by_line_break);
    assert!(tokens[2].preceded_by_line_break);
}

#[test]
fn comments_are_skipped_and_unterminated_block_comment_reported() {
    let sink = DiagnosticSink::new();
    let tokens = tokenize("test", "a /* b\nc */ d /* open", &sink);
    assert_eq!(
        tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![
            SyntaxKind::Identifier,
            SyntaxKind::Identifier,
            SyntaxKind::EndOfFileToken
        ]
    );
    assert!(sink.has_errors());
}
