//! Defensive decoding of classifier responses.
//!
//! The classifier is a text generator that was *asked* for JSON. What comes
//! back may be a clean array, an array wrapped in prose or a code fence, an
//! object keyed by question number, or nothing usable at all. Decoding runs
//! in fixed steps:
//!
//! 1. strip a code fence, trim
//! 2. pick the JSON candidate (whole text, else widest `[...]`, else widest `{...}`)
//! 3. drop trailing commas before `]` / `}`
//! 4. decode; on failure every slot stays empty
//! 5. resolve the value to one [`ResponseShape`] and fill positional slots
//!
//! Labels are only ever taken from the response. A slot that cannot be
//! filled stays `None`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use exampaper_shared::{Classification, CognitiveLabel};

use crate::labels::LabelNormalizer;

/// Field names read as the 1-based question index, in priority order.
const INDEX_FIELDS: &[&str] = &["index", "i", "idx", "id", "number", "question"];

/// Field names read as the label, in priority order.
const LABEL_FIELDS: &[&str] = &["label", "level", "bloom_level", "bloom", "category"];

/// Wrapper key whose array holds the per-item entries.
const ITEMS_FIELD: &str = "items";

/// Confidence assumed when a single-item response omits it.
const DEFAULT_CONFIDENCE: f32 = 0.5;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// First fenced block; the optional info string (`json`) is skipped.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("fence regex")
});

/// A comma followed only by whitespace before a closing bracket or brace.
static TRAILING_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r",(\s*[\]}])").expect("trailing comma regex")
});

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a whole batch came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFailure {
    /// No bracket- or brace-delimited text in the response.
    NoStructure,
    /// The candidate text did not decode as JSON, even after repair.
    Undecodable,
    /// Decoded JSON of a shape we don't read positional labels from.
    UnrecognizedShape,
}

/// Positional labels recovered from one batch response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchParse {
    /// Exactly `n` slots, aligned with the request order.
    pub labels: Vec<Option<CognitiveLabel>>,
    /// Set when the batch as a whole was unrecoverable.
    pub failure: Option<BatchFailure>,
}

impl BatchParse {
    fn failed(n: usize, failure: BatchFailure) -> Self {
        Self {
            labels: vec![None; n],
            failure: Some(failure),
        }
    }

    /// Number of slots holding a label.
    pub fn resolved(&self) -> usize {
        self.labels.iter().filter(|l| l.is_some()).count()
    }
}

/// The closed set of decoded layouts we read labels from.
#[derive(Debug)]
enum ResponseShape<'a> {
    /// `[{"index": 1, "label": "Apply"}, ...]`
    IndexedItems(&'a [Value]),
    /// `["Apply", "Remember", ...]`
    BareLabels(&'a [Value]),
    /// `{"1": "Apply", "2": "Remember"}`
    KeyedByIndex(&'a Map<String, Value>),
    Unrecognized,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Recover `n` positional labels from a raw classifier response.
///
/// Always returns exactly `n` entries; `None` marks an item the caller
/// should hand to a fallback classifier.
pub fn parse_batch(
    raw: &str,
    n: usize,
    normalizer: &LabelNormalizer,
) -> Vec<Option<CognitiveLabel>> {
    decode_batch(raw, n, normalizer).labels
}

/// Like [`parse_batch`], but also reports whether the batch failed as a whole.
pub fn decode_batch(raw: &str, n: usize, normalizer: &LabelNormalizer) -> BatchParse {
    if n == 0 {
        return BatchParse {
            labels: Vec::new(),
            failure: None,
        };
    }

    let value = match decode_value(raw, Preference::Array) {
        Ok(value) => value,
        Err(failure) => {
            warn!(?failure, n, "classifier response unrecoverable");
            return BatchParse::failed(n, failure);
        }
    };

    let shape = resolve_shape(&value);
    debug!(shape = shape_name(&shape), n, "classifier response decoded");

    let labels = match shape {
        ResponseShape::IndexedItems(items) => read_indexed_items(items, n, normalizer),
        ResponseShape::BareLabels(items) => read_bare_labels(items, n, normalizer),
        ResponseShape::KeyedByIndex(map) => read_keyed(map, n, normalizer),
        ResponseShape::Unrecognized => {
            warn!(n, "classifier response has an unrecognized shape");
            return BatchParse::failed(n, BatchFailure::UnrecognizedShape);
        }
    };

    BatchParse {
        labels,
        failure: None,
    }
}

/// Decode a single-question response of the form
/// `{"level": "...", "verb": "...", "confidence": 0.8}`.
pub fn parse_single(raw: &str, normalizer: &LabelNormalizer) -> Option<Classification> {
    let value = decode_value(raw, Preference::Object).ok()?;

    let object = match &value {
        Value::Object(map) => map,
        Value::Array(items) if items.len() == 1 => items[0].as_object()?,
        Value::String(s) => {
            return normalizer
                .normalize(s)
                .map(|label| Classification::new(label, None, DEFAULT_CONFIDENCE));
        }
        _ => return None,
    };

    let label = read_label(object, normalizer)?;
    let verb = object
        .get("verb")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);
    let confidence = object
        .get("confidence")
        .and_then(read_confidence)
        .unwrap_or(DEFAULT_CONFIDENCE);

    Some(Classification::new(label, verb, confidence))
}

// ---------------------------------------------------------------------------
// Steps 1-4: text → JSON value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preference {
    Array,
    Object,
}

fn decode_value(raw: &str, prefer: Preference) -> Result<Value, BatchFailure> {
    let unfenced = strip_code_fence(raw);
    let candidate = select_candidate(unfenced, prefer).ok_or(BatchFailure::NoStructure)?;
    let repaired = remove_trailing_commas(candidate);
    serde_json::from_str(&repaired).map_err(|e| {
        debug!(error = %e, "classifier JSON decode failed");
        BatchFailure::Undecodable
    })
}

/// Return the contents of the first code fence, or the trimmed text.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(caps) = FENCE_RE.captures(trimmed) {
        if let Some(inner) = caps.get(1) {
            return inner.as_str().trim();
        }
    }

    // Unterminated fence (truncated response): drop the opening line.
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.split_once('\n').map_or("", |(_, body)| body);
        return body.trim();
    }

    trimmed
}

/// Choose the substring to decode.
fn select_candidate(text: &str, prefer: Preference) -> Option<&str> {
    let complete = (text.starts_with('[') && text.ends_with(']'))
        || (text.starts_with('{') && text.ends_with('}'));
    if complete {
        return Some(text);
    }

    let array = widest_span(text, '[', ']');
    let object = widest_span(text, '{', '}');
    match prefer {
        Preference::Array => array.or(object),
        Preference::Object => object.or(array),
    }
}

/// From the first `open` to the last `close`, if they are in order.
fn widest_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn remove_trailing_commas(text: &str) -> String {
    TRAILING_COMMA_RE.replace_all(text, "$1").into_owned()
}

// ---------------------------------------------------------------------------
// Step 5: shape dispatch
// ---------------------------------------------------------------------------

fn resolve_shape(value: &Value) -> ResponseShape<'_> {
    match value {
        Value::Array(items) if items.iter().all(Value::is_object) => {
            ResponseShape::IndexedItems(items)
        }
        Value::Array(items) if items.iter().all(Value::is_string) => {
            ResponseShape::BareLabels(items)
        }
        Value::Object(map) => match map.get(ITEMS_FIELD) {
            Some(inner @ Value::Array(_)) => resolve_shape(inner),
            _ if map.keys().any(|k| parse_index(k).is_some()) => ResponseShape::KeyedByIndex(map),
            _ => ResponseShape::Unrecognized,
        },
        _ => ResponseShape::Unrecognized,
    }
}

fn shape_name(shape: &ResponseShape<'_>) -> &'static str {
    match shape {
        ResponseShape::IndexedItems(_) => "indexed_items",
        ResponseShape::BareLabels(_) => "bare_labels",
        ResponseShape::KeyedByIndex(_) => "keyed_by_index",
        ResponseShape::Unrecognized => "unrecognized",
    }
}

/// Put `label` into the 1-based slot `index` unless it is out of range or taken.
fn place(slots: &mut [Option<CognitiveLabel>], index: usize, label: CognitiveLabel) -> bool {
    if index == 0 || index > slots.len() {
        return false;
    }
    let slot = &mut slots[index - 1];
    if slot.is_some() {
        return false;
    }
    *slot = Some(label);
    true
}

fn read_indexed_items(
    items: &[Value],
    n: usize,
    normalizer: &LabelNormalizer,
) -> Vec<Option<CognitiveLabel>> {
    let mut slots = vec![None; n];

    for object in items.iter().filter_map(Value::as_object) {
        let Some(idx) = read_index(object) else {
            continue;
        };
        if let Some(label) = read_label(object, normalizer) {
            if !place(&mut slots, idx, label) {
                debug!(index = idx, "duplicate or out-of-range index ignored");
            }
        }
    }

    // Salvage: a full-length list lends each empty slot the item at its own
    // position, whatever index that item claimed.
    if items.len() == n && slots.iter().any(Option::is_none) {
        let mut salvaged = 0usize;
        for (pos, item) in items.iter().enumerate() {
            if slots[pos].is_some() {
                continue;
            }
            let label = item
                .as_object()
                .and_then(|object| read_label(object, normalizer));
            if let Some(label) = label {
                slots[pos] = Some(label);
                salvaged += 1;
            }
        }
        debug!(salvaged, "positional salvage pass");
    }

    slots
}

fn read_bare_labels(
    items: &[Value],
    n: usize,
    normalizer: &LabelNormalizer,
) -> Vec<Option<CognitiveLabel>> {
    let mut slots = vec![None; n];
    for (pos, item) in items.iter().take(n).enumerate() {
        if let Some(label) = item.as_str().and_then(|s| normalizer.normalize(s)) {
            place(&mut slots, pos + 1, label);
        }
    }
    slots
}

fn read_keyed(
    map: &Map<String, Value>,
    n: usize,
    normalizer: &LabelNormalizer,
) -> Vec<Option<CognitiveLabel>> {
    let mut slots = vec![None; n];
    for (key, value) in map {
        let Some(idx) = parse_index(key) else {
            continue;
        };
        let label = match value {
            Value::String(s) => normalizer.normalize(s),
            Value::Object(object) => read_label(object, normalizer),
            _ => None,
        };
        if let Some(label) = label {
            place(&mut slots, idx, label);
        }
    }
    slots
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn read_index(object: &Map<String, Value>) -> Option<usize> {
    let value = INDEX_FIELDS.iter().find_map(|field| object.get(*field))?;
    match value {
        Value::Number(num) => num.as_u64().and_then(|v| usize::try_from(v).ok()),
        Value::String(s) => parse_index(s),
        _ => None,
    }
}

fn read_label(object: &Map<String, Value>, normalizer: &LabelNormalizer) -> Option<CognitiveLabel> {
    LABEL_FIELDS
        .iter()
        .find_map(|field| object.get(*field))
        .and_then(Value::as_str)
        .and_then(|s| normalizer.normalize(s))
}

/// Digit-only strings (surrounding whitespace allowed).
fn parse_index(s: &str) -> Option<usize> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn read_confidence(value: &Value) -> Option<f32> {
    let raw = match value {
        Value::Number(num) => num.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    raw.is_finite().then_some(raw as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use CognitiveLabel::*;

    fn parse(raw: &str, n: usize) -> Vec<Option<CognitiveLabel>> {
        parse_batch(raw, n, &LabelNormalizer::default())
    }

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/responses/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn indexed_items_leave_gaps() {
        let raw = r#"[{"i":1,"level":"Remember"},{"i":3,"level":"Apply"}]"#;
        assert_eq!(parse(raw, 3), vec![Some(Remember), None, Some(Apply)]);
    }

    #[test]
    fn bare_label_list() {
        assert_eq!(
            parse(r#"["Remember","Analyze"]"#, 2),
            vec![Some(Remember), Some(Analyze)]
        );
    }

    #[test]
    fn bare_labels_truncate_and_pad() {
        assert_eq!(
            parse(r#"["Apply","Create","Evaluate"]"#, 2),
            vec![Some(Apply), Some(Create)]
        );
        assert_eq!(parse(r#"["Apply"]"#, 3), vec![Some(Apply), None, None]);
    }

    #[test]
    fn not_json_fails_whole_batch() {
        let parsed = decode_batch("not json at all", 4, &LabelNormalizer::default());
        assert_eq!(parsed.labels, vec![None; 4]);
        assert_eq!(parsed.failure, Some(BatchFailure::NoStructure));
    }

    #[test]
    fn broken_json_fails_whole_batch() {
        let parsed = decode_batch(
            r#"[{"index": 1, "label": "Apply"}, {"index": 2, "label": ]"#,
            2,
            &LabelNormalizer::default(),
        );
        assert_eq!(parsed.labels, vec![None, None]);
        assert_eq!(parsed.failure, Some(BatchFailure::Undecodable));
    }

    #[test]
    fn fenced_with_trailing_commas_matches_clean_input() {
        let clean = r#"[{"i":1,"level":"Remember"},{"i":3,"level":"Apply"}]"#;
        let messy = "Here you go:\n```json\n[\n  {\"i\": 1, \"level\": \"Remember\",},\n  {\"i\": 3, \"level\": \"Apply\"},\n]\n```\nLet me know!";
        assert_eq!(parse(messy, 3), parse(clean, 3));
    }

    #[test]
    fn unterminated_fence_is_tolerated() {
        let raw = "```json\n[\"Apply\", \"Create\"]";
        assert_eq!(parse(raw, 2), vec![Some(Apply), Some(Create)]);
    }

    #[test]
    fn prose_around_array() {
        let raw = "Sure! The levels are [\"Understand\", \"Evaluate\"] as requested.";
        assert_eq!(parse(raw, 2), vec![Some(Understand), Some(Evaluate)]);
    }

    #[test]
    fn items_wrapper_recurses() {
        let raw = r#"{"items": [{"index": 2, "label": "create"}, {"index": 1, "label": "APPLY"}]}"#;
        assert_eq!(parse(raw, 2), vec![Some(Apply), Some(Create)]);

        let raw = r#"{"items": ["Remember", "Understand"]}"#;
        assert_eq!(parse(raw, 2), vec![Some(Remember), Some(Understand)]);
    }

    #[test]
    fn object_keyed_by_index() {
        let raw = r#"{"1": "Analysis", "3": "Remember", "7": "Apply", "note": "ok"}"#;
        assert_eq!(parse(raw, 3), vec![Some(Analyze), None, Some(Remember)]);
    }

    #[test]
    fn string_indices_are_accepted() {
        let raw = r#"[{"index": "2", "label": "Apply"}, {"index": " 1 ", "label": "Remember"}]"#;
        assert_eq!(parse(raw, 2), vec![Some(Remember), Some(Apply)]);
    }

    #[test]
    fn duplicate_index_first_writer_wins() {
        let raw = r#"[{"index":1,"label":"Apply"},{"index":1,"label":"Create"},{"index":2,"label":"Remember"}]"#;
        assert_eq!(parse(raw, 2), vec![Some(Apply), Some(Remember)]);
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let raw = r#"[{"index":0,"label":"Apply"},{"index":5,"label":"Create"}]"#;
        assert_eq!(parse(raw, 3), vec![None, None, None]);
    }

    #[test]
    fn salvage_fills_unindexed_items_by_position() {
        // Full-length list where only the middle item carries an index.
        let raw = r#"[{"label":"Remember"},{"index":2,"label":"Apply"},{"level":"Create"}]"#;
        assert_eq!(parse(raw, 3), vec![Some(Remember), Some(Apply), Some(Create)]);
    }

    #[test]
    fn salvage_needs_full_length_list() {
        let raw = r#"[{"label":"Remember"},{"index":3,"label":"Apply"}]"#;
        assert_eq!(parse(raw, 3), vec![None, None, Some(Apply)]);
    }

    #[test]
    fn salvage_fills_gap_left_by_duplicate_index() {
        // Both items claim slot 1; slot 2 is filled from the item at position 2.
        let raw = r#"[{"index":1,"label":"Apply"},{"index":1,"label":"Create"}]"#;
        assert_eq!(parse(raw, 2), vec![Some(Apply), Some(Create)]);
    }

    #[test]
    fn salvage_ignores_claimed_index_but_keeps_placed_slots() {
        // Both items claim slot 2, leaving slot 1 to the item at position 1.
        let raw = r#"[{"index":2,"label":"Apply"},{"index":2,"label":"Create"}]"#;
        assert_eq!(parse(raw, 2), vec![Some(Apply), Some(Apply)]);

        // A slot placed by index is never overwritten by salvage.
        let raw = r#"[{"index":2,"label":"Remember"},{"index":9,"label":"Create"}]"#;
        assert_eq!(parse(raw, 2), vec![Some(Remember), Some(Remember)]);
    }

    #[test]
    fn unknown_label_leaves_slot_empty() {
        let raw = r#"["Remember", "Memorize", "Apply"]"#;
        assert_eq!(parse(raw, 3), vec![Some(Remember), None, Some(Apply)]);
    }

    #[test]
    fn unrecognized_shape_fails_batch() {
        let parsed = decode_batch(r#"{"status": "ok"}"#, 2, &LabelNormalizer::default());
        assert_eq!(parsed.failure, Some(BatchFailure::UnrecognizedShape));
        assert_eq!(parsed.labels, vec![None, None]);

        let parsed = decode_batch(r#"["Apply", {"index": 2}]"#, 2, &LabelNormalizer::default());
        assert_eq!(parsed.failure, Some(BatchFailure::UnrecognizedShape));
    }

    #[test]
    fn always_n_slots() {
        for raw in ["", "[]", "{}", "[1, 2, 3]", r#"["Apply"]"#, "```\n```"] {
            for n in 0..4 {
                assert_eq!(parse(raw, n).len(), n, "raw={raw:?} n={n}");
            }
        }
    }

    #[test]
    fn item_gaps_are_not_batch_failures() {
        let parsed = decode_batch(
            r#"[{"i":1,"level":"Remember"}]"#,
            2,
            &LabelNormalizer::default(),
        );
        assert_eq!(parsed.failure, None);
        assert_eq!(parsed.resolved(), 1);
    }

    #[test]
    fn fixture_chatty_response() {
        let raw = fixture("chatty-fenced.txt");
        assert_eq!(
            parse(&raw, 4),
            vec![Some(Understand), Some(Apply), None, Some(Evaluate)]
        );
    }

    #[test]
    fn fixture_keyed_response() {
        let raw = fixture("keyed-object.json");
        assert_eq!(
            parse(&raw, 3),
            vec![Some(Remember), Some(Analyze), Some(Create)]
        );
    }

    #[test]
    fn single_object_response() {
        let n = LabelNormalizer::default();
        let parsed = parse_single(
            r#"{"level": "Analyze", "verb": "compare", "confidence": 0.82}"#,
            &n,
        )
        .unwrap();
        assert_eq!(parsed.label, Analyze);
        assert_eq!(parsed.verb.as_deref(), Some("compare"));
        assert!((parsed.confidence - 0.82).abs() < 1e-6);
    }

    #[test]
    fn single_response_defaults_and_failures() {
        let n = LabelNormalizer::default();
        let parsed = parse_single("```json\n{\"level\": \"evaluating\",}\n```", &n).unwrap();
        assert_eq!(parsed.label, Evaluate);
        assert_eq!(parsed.verb, None);
        assert_eq!(parsed.confidence, DEFAULT_CONFIDENCE);

        assert!(parse_single(r#"{"level": "Expert"}"#, &n).is_none());
        assert!(parse_single("I cannot classify this.", &n).is_none());
    }
}
