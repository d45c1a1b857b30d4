//! Tests for the decode module

use super::*;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

// ============================================================================
// ArrayScanner Tests
// ============================================================================

/// Feed `body` to a fresh scanner in `chunk` byte pieces and collect every
/// framed element until the scanner needs more data or ends.
fn scan_in_chunks(body: &str, chunk: usize) -> (Vec<serde_json::Value>, ScanStep) {
    let mut scanner = ArrayScanner::new(ENVELOPE_ITEM_PATH);
    let mut items = Vec::new();
    let mut rest = body.as_bytes();

    loop {
        match scanner.step().unwrap() {
            ScanStep::Item(bytes) => items.push(serde_json::from_slice(&bytes).unwrap()),
            ScanStep::End => return (items, ScanStep::End),
            ScanStep::NeedMore => {
                if rest.is_empty() {
                    return (items, ScanStep::NeedMore);
                }
                let take = chunk.min(rest.len());
                scanner.push(&rest[..take]);
                rest = &rest[take..];
            }
        }
    }
}

const ENVELOPE: &str =
    r#"{"data": {"data": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}, {"id": 3}]}}"#;

#[test_case(usize::MAX; "single chunk")]
#[test_case(7; "seven byte chunks")]
#[test_case(1; "byte by byte")]
fn test_scanner_frames_items_regardless_of_chunking(chunk: usize) {
    let (items, outcome) = scan_in_chunks(ENVELOPE, chunk);
    assert_eq!(outcome, ScanStep::End);
    assert_eq!(
        items,
        vec![
            json!({"id": 1, "name": "a"}),
            json!({"id": 2, "name": "b"}),
            json!({"id": 3}),
        ]
    );
}

#[test]
fn test_scanner_empty_array() {
    let (items, outcome) = scan_in_chunks(r#"{"data": {"data": []}}"#, usize::MAX);
    assert_eq!(outcome, ScanStep::End);
    assert!(items.is_empty());
}

#[test]
fn test_scanner_envelope_without_item_array() {
    let (items, outcome) = scan_in_chunks(r#"{"data": {"count": 0}}"#, usize::MAX);
    assert_eq!(outcome, ScanStep::End);
    assert!(items.is_empty());
}

#[test]
fn test_scanner_skips_unrelated_keys() {
    let body = r#"{"meta": {"data": "decoy"}, "data": {"total": 2, "data": [10, 20], "more": false}}"#;
    let (items, outcome) = scan_in_chunks(body, 3);
    assert_eq!(outcome, ScanStep::End);
    assert_eq!(items, vec![json!(10), json!(20)]);
}

#[test]
fn test_scanner_strings_with_structural_characters() {
    let body = r#"{"data": {"data": [{"note": "a ] tricky } string"}, {"esc": "quote \" and \\ slash"}]}}"#;
    let (items, outcome) = scan_in_chunks(body, 5);
    assert_eq!(outcome, ScanStep::End);
    assert_eq!(
        items,
        vec![
            json!({"note": "a ] tricky } string"}),
            json!({"esc": "quote \" and \\ slash"}),
        ]
    );
}

#[test]
fn test_scanner_nested_elements() {
    let body = r#"{"data": {"data": [{"booking": {"user": {"id": 5}}, "tags": [1, [2, 3]]}]}}"#;
    let (items, outcome) = scan_in_chunks(body, 4);
    assert_eq!(outcome, ScanStep::End);
    assert_eq!(
        items,
        vec![json!({"booking": {"user": {"id": 5}}, "tags": [1, [2, 3]]})]
    );
}

#[test]
fn test_scanner_scalar_items() {
    let (items, outcome) =
        scan_in_chunks(r#"{"data": {"data": [1, -2.5, true, null, "x"]}}"#, 2);
    assert_eq!(outcome, ScanStep::End);
    assert_eq!(
        items,
        vec![json!(1), json!(-2.5), json!(true), json!(null), json!("x")]
    );
}

#[test]
fn test_scanner_truncated_body_keeps_framed_items() {
    // Ten items promised, cut off inside the fourth.
    let body = r#"{"data": {"data": [{"id": 1}, {"id": 2}, {"id": 3}, {"id"#;
    let (items, outcome) = scan_in_chunks(body, usize::MAX);
    assert_eq!(outcome, ScanStep::NeedMore);
    assert_eq!(items, vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
}

#[test]
fn test_scanner_root_array_is_not_the_envelope() {
    let (items, outcome) = scan_in_chunks(r#"[{"id": 1}]"#, usize::MAX);
    assert_eq!(outcome, ScanStep::End);
    assert!(items.is_empty());
}

#[test]
fn test_scanner_rejects_garbage() {
    let mut scanner = ArrayScanner::new(ENVELOPE_ITEM_PATH);
    scanner.push(b"<html>bad gateway</html>");
    assert!(scanner.step().is_err());
}

#[test]
fn test_scanner_rejects_bad_literal() {
    let mut scanner = ArrayScanner::new(ENVELOPE_ITEM_PATH);
    scanner.push(br#"{"data": nope}"#);
    assert!(scanner.step().is_err());
}

#[test]
fn test_scanner_whitespace_everywhere() {
    let body = "  {\n  \"data\" : {\n    \"data\" : [\n      { \"id\" : 1 } ,\n      2\n    ]\n  }\n}  ";
    let (items, outcome) = scan_in_chunks(body, 1);
    assert_eq!(outcome, ScanStep::End);
    assert_eq!(items, vec![json!({"id": 1}), json!(2)]);
}

// ============================================================================
// PageDecoder Tests
// ============================================================================

fn body_stream(
    chunks: Vec<reqwest::Result<bytes::Bytes>>,
) -> impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> {
    futures::stream::iter(chunks)
}

fn ok_chunks(body: &str, size: usize) -> Vec<reqwest::Result<bytes::Bytes>> {
    body.as_bytes()
        .chunks(size)
        .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
        .collect()
}

/// A real transport error, for exercising the mid-body fault path.
async fn connection_error() -> reqwest::Error {
    reqwest::Client::new()
        .get("http://127.0.0.1:1/unreachable")
        .send()
        .await
        .unwrap_err()
}

#[tokio::test]
async fn test_decoder_yields_items_across_chunks() {
    let mut decoder = PageDecoder::new(body_stream(ok_chunks(ENVELOPE, 9)));

    let mut items = Vec::new();
    while let Some(event) = decoder.next().await {
        match event {
            DecodeEvent::Item(v) => items.push(v),
            DecodeEvent::Aborted => panic!("unexpected abort"),
        }
    }

    assert_eq!(items.len(), 3);
    assert_eq!(decoder.items_yielded(), 3);
    assert_eq!(items[0], json!({"id": 1, "name": "a"}));
}

#[tokio::test]
async fn test_decoder_truncated_body_aborts_after_framed_items() {
    let body = r#"{"data": {"data": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4"#;
    let mut decoder = PageDecoder::new(body_stream(ok_chunks(body, 16)));

    let mut items = 0;
    let mut aborted = false;
    while let Some(event) = decoder.next().await {
        match event {
            DecodeEvent::Item(_) => items += 1,
            DecodeEvent::Aborted => aborted = true,
        }
    }

    assert_eq!(items, 3);
    assert!(aborted);
    assert_eq!(decoder.items_yielded(), 3);
}

#[tokio::test]
async fn test_decoder_chunk_error_aborts() {
    let err = connection_error().await;
    let chunks = vec![
        Ok(bytes::Bytes::from_static(br#"{"data": {"data": [{"id": 1}, "#)),
        Err(err),
    ];
    let mut decoder = PageDecoder::new(body_stream(chunks));

    assert!(matches!(
        decoder.next().await,
        Some(DecodeEvent::Item(ref v)) if *v == json!({"id": 1})
    ));
    assert!(matches!(decoder.next().await, Some(DecodeEvent::Aborted)));
    assert!(decoder.next().await.is_none());
    assert_eq!(decoder.items_yielded(), 1);
}

#[tokio::test]
async fn test_decoder_malformed_body_aborts_immediately() {
    let mut decoder = PageDecoder::new(body_stream(ok_chunks("<html>oops</html>", 64)));

    assert!(matches!(decoder.next().await, Some(DecodeEvent::Aborted)));
    assert!(decoder.next().await.is_none());
    assert_eq!(decoder.items_yielded(), 0);
}

#[tokio::test]
async fn test_decoder_empty_page_ends_cleanly() {
    let mut decoder = PageDecoder::new(body_stream(ok_chunks(r#"{"data": {"data": []}}"#, 8)));

    assert!(decoder.next().await.is_none());
    assert_eq!(decoder.items_yielded(), 0);
}
