//! Property-based tests for the frame parser
//!
//! - Splitting the byte stream anywhere never changes the decoded events
//! - Malformed payload lines never produce events and never halt parsing
//! - Token order is preserved exactly

use super::{FrameParser, StreamEvent};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Strategies
// ============================================================================

/// Token text including whitespace, quotes and non-ASCII characters
fn arb_token_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?\"\\\\éüß→😀]{0,24}"
}

fn token_frame(content: &str) -> String {
    format!("data: {}\n\n", json!({ "type": "token", "content": content }))
}

/// A line that must be ignored: non-data lines and data lines whose
/// payload is not a JSON object with a known type
fn arb_noise_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{0,20}".prop_map(|text| format!(": {text}\n")),
        "[a-z]{1,10}".prop_map(|text| format!("event: {text}\n")),
        Just("\n".to_string()),
        "[a-z{}:, ]{1,20}"
            .prop_filter("must not be valid JSON", |text| {
                serde_json::from_str::<serde_json::Value>(text).is_err()
            })
            .prop_map(|text| format!("data: {text}\n")),
        "[a-z]{1,10}".prop_map(|kind| format!(
            "data: {}\n",
            json!({ "type": format!("x-{kind}"), "content": "ignored" })
        )),
    ]
}

fn feed_in_pieces(bytes: &[u8], cuts: &[usize]) -> Vec<StreamEvent> {
    let mut parser = FrameParser::new();
    let mut events = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        let cut = cut.clamp(start, bytes.len());
        events.extend(parser.feed(&bytes[start..cut]));
        start = cut;
    }
    events.extend(parser.feed(&bytes[start..]));
    events
}

fn tokens_of(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Token { content } => Some(content.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_single_frame_split_twice_matches_unsplit(
        content in arb_token_text(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let frame = token_frame(&content);
        let bytes = frame.as_bytes();
        let mut cuts = vec![a.index(bytes.len() + 1), b.index(bytes.len() + 1)];
        cuts.sort_unstable();

        let whole = FrameParser::new().feed(bytes);
        let split = feed_in_pieces(bytes, &cuts);

        prop_assert_eq!(&whole, &split);
        prop_assert_eq!(whole.len(), 1);
    }

    #[test]
    fn prop_arbitrary_chunking_preserves_token_order(
        contents in proptest::collection::vec(arb_token_text(), 0..12),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..16),
    ) {
        let stream: String = contents.iter().map(|c| token_frame(c)).collect();
        let bytes = stream.as_bytes();
        let mut cuts: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
        cuts.sort_unstable();

        let events = feed_in_pieces(bytes, &cuts);
        prop_assert_eq!(tokens_of(&events), contents.clone());
        prop_assert_eq!(tokens_of(&events).concat(), contents.concat());
    }

    #[test]
    fn prop_noise_never_produces_events_or_halts(
        noise in proptest::collection::vec(arb_noise_line(), 0..10),
        contents in proptest::collection::vec(arb_token_text(), 1..5),
    ) {
        let mut stream = String::new();
        for (i, content) in contents.iter().enumerate() {
            if let Some(line) = noise.get(i) {
                stream.push_str(line);
            }
            stream.push_str(&token_frame(content));
        }
        for line in noise.iter().skip(contents.len()) {
            stream.push_str(line);
        }

        let mut parser = FrameParser::new();
        let events = parser.feed(stream.as_bytes());

        prop_assert!(!parser.is_finished());
        prop_assert_eq!(events.len(), contents.len());
        prop_assert_eq!(tokens_of(&events), contents);
    }
}
