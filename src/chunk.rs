//! Rule-boundary segmenter for the comprehensive rules text.
//!
//! Splits the rulebook into [`CorpusSegment`]s along numbered-rule
//! boundaries so that each segment holds one major rule section (or a
//! size-capped slice of one).
//!
//! # Algorithm
//!
//! 1. Walk the text line by line.
//! 2. A line opening with a rule number (`100.1`, `702.19a`, `509.1b.`)
//!    is a boundary candidate.
//! 3. At a boundary, flush the buffer if the major rule number (the part
//!    before the first dot) changed, or if the buffer already exceeds
//!    `max_chars`.
//! 4. Blank lines are dropped; every other line joins the buffer.
//! 5. Each segment is tagged with the last rule number seen before it was
//!    flushed, or `"unknown"` when it contains none.
//!
//! # Example
//!
//! ```rust
//! use mtg_judge::chunk::segment_rules;
//!
//! let text = "100.1. These rules apply.\n100.2. More.\n101.1. Another section.";
//! let segments = segment_rules(text, 1500);
//! assert_eq!(segments.len(), 2);
//! assert_eq!(segments[0].segment_id, "100.2.");
//! ```

use regex::Regex;
use std::sync::OnceLock;

use crate::models::CorpusSegment;

/// Segment id for text that precedes any numbered rule.
pub const UNKNOWN_SEGMENT_ID: &str = "unknown";

fn rule_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+\.\d+[a-z]?\.?)\s").expect("static regex"))
}

fn major_rule(rule_num: &str) -> &str {
    rule_num.split('.').next().unwrap_or(rule_num)
}

/// Split rulebook text into segments on numbered-rule boundaries.
///
/// `max_chars` caps how much text accumulates before the next rule
/// boundary forces a new segment. A single rule longer than the cap is
/// never split mid-rule.
pub fn segment_rules(text: &str, max_chars: usize) -> Vec<CorpusSegment> {
    let mut segments = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    // Length of `buf.join("\n")`, tracked incrementally.
    let mut buf_len = 0usize;
    let mut current_rule: Option<String> = None;

    for line in text.lines() {
        if let Some(caps) = rule_number_re().captures(line) {
            let rule_num = caps[1].to_string();

            let section_changed = match &current_rule {
                None => true,
                Some(cur) => major_rule(cur) != major_rule(&rule_num),
            };

            if !buf.is_empty() && (section_changed || buf_len > max_chars) {
                flush(&mut segments, &buf, current_rule.as_deref());
                buf.clear();
                buf_len = 0;
            }

            current_rule = Some(rule_num);
        }

        if !line.trim().is_empty() {
            let chars = line.chars().count();
            buf_len += if buf.is_empty() { chars } else { chars + 1 };
            buf.push(line);
        }
    }

    if !buf.is_empty() {
        flush(&mut segments, &buf, current_rule.as_deref());
    }

    segments
}

fn flush(segments: &mut Vec<CorpusSegment>, lines: &[&str], rule: Option<&str>) {
    let text = lines.join("\n").trim().to_string();
    if text.is_empty() {
        return;
    }
    segments.push(CorpusSegment {
        segment_id: rule.unwrap_or(UNKNOWN_SEGMENT_ID).to_string(),
        text,
    });
}
