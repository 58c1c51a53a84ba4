//! Evidence extraction.
//!
//! Scans a response for signal segments with a fixed, ordered set of pattern
//! detectors and reports each hit as an [`EvidenceSpan`]. Extraction is a pure
//! function of its inputs: the same text and question type always yield the
//! same spans in the same order.
//!
//! | Tag | Detects | Question types |
//! |-----|---------|----------------|
//! | `quantified-claim` | numbers with units, percentages, money, "doubled" | all |
//! | `example-given` | "for example", "such as", "in my last role" | all |
//! | `causal-reasoning` | "because", "therefore", "due to" | all |
//! | `sequence-marker` | "firstly", "then", "finally", list bullets | all |
//! | `technical-term` | engineering vocabulary, big-O notation | technical |
//! | `self-reflection` | "I learned", "looking back", "I should have" | behavioral, situational |
//! | `ownership` | "I led", "I decided", "I was responsible" | all |
//! | `outcome` | "resulted in", "we shipped", "in the end" | all |
//! | `hypothetical` | "I would", "my approach would be" | situational |
//! | `hedging` | "maybe", "I guess", "not sure" | all |
//! | `question-keyword` | words shared with the question text | all (question-aware only) |
//!
//! Spans from different detectors may overlap; a single detector never emits
//! overlapping spans for its own tag.

use std::collections::{BTreeSet, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{EvidenceSpan, EvidenceTag, QuestionType};

const ALL_TYPES: &[QuestionType] = &[
    QuestionType::Behavioral,
    QuestionType::Technical,
    QuestionType::Situational,
];

/// One pattern detector: a tag, the question types it runs for, and its patterns.
struct Detector {
    tag: EvidenceTag,
    rationale: &'static str,
    question_types: &'static [QuestionType],
    patterns: Vec<Regex>,
}

impl Detector {
    fn new(
        tag: EvidenceTag,
        rationale: &'static str,
        question_types: &'static [QuestionType],
        patterns: &[&str],
    ) -> Self {
        Self {
            tag,
            rationale,
            question_types,
            patterns: patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
        }
    }

    fn applies_to(&self, question_type: QuestionType) -> bool {
        self.question_types.contains(&question_type)
    }
}

lazy_static! {
    /// Detectors in application order. Output order does not depend on this
    /// order (spans are sorted), but tie-breaking between equal ranges does.
    static ref DETECTORS: Vec<Detector> = vec![
        Detector::new(
            EvidenceTag::QuantifiedClaim,
            "gave a specific quantity",
            ALL_TYPES,
            &[
                r"(?i)\b\d+(?:[.,]\d+)*\s*(?:%|percent\b|x\b|times\b|ms\b|milliseconds?\b|seconds?\b|minutes?\b|hours?\b|days?\b|weeks?\b|months?\b|years?\b|users?\b|customers?\b|requests?\b|people\b|engineers?\b|members?\b|servers?\b|k\b|m\b|gb\b|tb\b)",
                r"(?i)[$€£]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:k|m|million|billion)\b)?",
                r"(?i)\b(?:doubled|tripled|halved|quadrupled)\b",
            ],
        ),
        Detector::new(
            EvidenceTag::ExampleGiven,
            "cited a concrete example",
            ALL_TYPES,
            &[
                r"(?i)\b(?:for example|for instance|such as|to give an example|in my (?:last|previous|current) (?:role|job|team|project|company)|at my (?:last|previous) (?:company|job|role)|one time)\b",
                r"(?i)\be\.g\.",
            ],
        ),
        Detector::new(
            EvidenceTag::CausalReasoning,
            "explained cause and effect",
            ALL_TYPES,
            &[r"(?i)\b(?:because|therefore|thus|hence|as a result|so that|which meant|due to|consequently|this led to|that['’]s why|the reason (?:is|was))\b"],
        ),
        Detector::new(
            EvidenceTag::SequenceMarker,
            "used a structural marker",
            ALL_TYPES,
            &[
                r"(?i)\b(?:first(?:ly)?|second(?:ly)?|third(?:ly)?|then|next|after that|finally|lastly|in conclusion|to summari[sz]e|step (?:one|two|three|\d+))\b",
                r"(?m)^[ \t]*(?:\d+[.)]|[-*•])[ \t]+",
            ],
        ),
        Detector::new(
            EvidenceTag::TechnicalTerm,
            "used technical vocabulary",
            &[QuestionType::Technical],
            &[
                r"(?i)\b(?:algorithms?|complexity|latency|throughput|cach(?:e|es|ing)|databases?|index(?:es|ing)?|quer(?:y|ies)|apis?|threads?|concurren(?:cy|t)|async(?:hronous)?|mutex(?:es)?|locks?|queues?|schemas?|microservices?|scal(?:e|ing|ability|able)|load balanc(?:er|ing)|big-?o|hash ?maps?|trees?|graphs?|recursion|memory|cpu|deploy(?:ed|ing|ment)?|kubernetes|docker|sql|nosql|shard(?:s|ing)?|replicas?|replication|consistency|idempoten(?:t|cy)|protocols?|tcp|http|rest|grpc|compilers?|benchmarks?|profil(?:er|ing))\b",
                r"\bO\([^)]{1,20}\)",
            ],
        ),
        Detector::new(
            EvidenceTag::SelfReflection,
            "reflected on their own performance",
            &[QuestionType::Behavioral, QuestionType::Situational],
            &[r"(?i)\b(?:i learned|i['’]ve learned|i realized|i realised|looking back|in hindsight|i would do (?:it|things) differently|my mistake|i should have|(?:it|this|that) taught me|i reflected|next time i|i now)\b"],
        ),
        Detector::new(
            EvidenceTag::Ownership,
            "took personal ownership",
            ALL_TYPES,
            &[r"(?i)\b(?:i (?:led|owned|decided|built|designed|drove|initiated|implemented|proposed|organi[sz]ed|took (?:ownership|responsibility|the lead))|my responsibility|i was responsible)\b"],
        ),
        Detector::new(
            EvidenceTag::Outcome,
            "stated a concrete outcome",
            ALL_TYPES,
            &[r"(?i)\b(?:as a result|resulted in|the outcome|which led to|we (?:shipped|delivered|launched|reduced|increased|improved|saved|cut)|ended up|in the end)\b"],
        ),
        Detector::new(
            EvidenceTag::Hypothetical,
            "laid out a course of action",
            &[QuestionType::Situational],
            &[r"(?i)\b(?:i would|i['’]d|my approach would be|if i were|the first thing i would|i might)\b"],
        ),
        Detector::new(
            EvidenceTag::Hedging,
            "hedged or expressed uncertainty",
            ALL_TYPES,
            &[r"(?i)\b(?:i guess|maybe|not sure|i don['’]t know|kind of|sort of|probably|i suppose)\b"],
        ),
    ];

    static ref WORD: Regex = Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'’-]*").unwrap();

    /// Words that carry no topical signal when matching responses to questions.
    static ref STOPWORDS: HashSet<&'static str> = {
        let words = [
            "about", "above", "after", "again", "also", "been", "before", "being", "between",
            "both", "could", "describe", "does", "doing", "each", "explain", "from", "have",
            "having", "here", "into", "just", "more", "most", "other", "over", "same", "should",
            "some", "such", "tell", "than", "that", "their", "them", "then", "there", "these",
            "they", "this", "those", "through", "time", "under", "very", "walk", "want", "were",
            "what", "when", "where", "which", "while", "with", "would", "your", "yours", "give",
            "example", "please", "think", "like",
        ];
        words.into_iter().collect()
    };
}

/// Extract evidence spans from a response.
///
/// Empty text yields an empty vector. Spans are ordered by `(start, end, tag)`.
pub fn extract(response: &str, question_type: QuestionType) -> Vec<EvidenceSpan> {
    if response.is_empty() {
        return Vec::new();
    }
    let offsets = CharOffsets::new(response);
    let mut spans = Vec::new();

    for detector in DETECTORS.iter().filter(|d| d.applies_to(question_type)) {
        let ranges = detector
            .patterns
            .iter()
            .flat_map(|p| p.find_iter(response).map(|m| (m.start(), m.end())));
        push_non_overlapping(
            &mut spans,
            ranges.collect(),
            detector.tag,
            detector.rationale,
            &offsets,
        );
    }

    sort_spans(&mut spans);
    spans
}

/// Extract evidence, including `question-keyword` spans for response words
/// that share a stem with the question's content words.
pub fn extract_for_question(
    response: &str,
    question_type: QuestionType,
    question: &str,
) -> Vec<EvidenceSpan> {
    let mut spans = extract(response, question_type);
    let keywords = question_keywords(question);
    if keywords.is_empty() || response.is_empty() {
        return spans;
    }

    let offsets = CharOffsets::new(response);
    let ranges = WORD
        .find_iter(response)
        .filter(|m| keywords.contains(&stem(m.as_str())))
        .map(|m| (m.start(), m.end()))
        .collect();
    push_non_overlapping(
        &mut spans,
        ranges,
        EvidenceTag::QuestionKeyword,
        "addressed a topic named in the question",
        &offsets,
    );

    sort_spans(&mut spans);
    spans
}

/// Content-word stems of a question.
pub fn question_keywords(question: &str) -> BTreeSet<String> {
    WORD.find_iter(question)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.chars().count() > 3 && !STOPWORDS.contains(w.as_str()))
        .map(|w| stem(&w))
        .collect()
}

/// Crude suffix stripping so "caching" and "cache" compare equal.
fn stem(word: &str) -> String {
    let mut w = word
        .to_lowercase()
        .trim_end_matches("'s")
        .trim_end_matches("’s")
        .to_string();
    for suffix in ["ing", "ed", "es", "s"] {
        if w.len() > suffix.len() + 3 && w.ends_with(suffix) {
            w.truncate(w.len() - suffix.len());
            break;
        }
    }
    if w.len() > 4 && w.ends_with('e') {
        w.pop();
    }
    w
}

/// Convert byte ranges into spans, dropping any range that overlaps one
/// already kept for the same tag. At equal starts the longer range wins.
fn push_non_overlapping(
    spans: &mut Vec<EvidenceSpan>,
    mut ranges: Vec<(usize, usize)>,
    tag: EvidenceTag,
    rationale: &str,
    offsets: &CharOffsets,
) {
    ranges.retain(|(s, e)| s < e);
    ranges.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut last_end = 0usize;
    let mut first = true;
    for (start, end) in ranges {
        if !first && start < last_end {
            continue;
        }
        first = false;
        last_end = end;
        spans.push(EvidenceSpan {
            start: offsets.char_index(start),
            end: offsets.char_index(end),
            tag,
            rationale: rationale.to_string(),
        });
    }
}

fn sort_spans(spans: &mut [EvidenceSpan]) {
    spans.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.end.cmp(&b.end))
            .then(a.tag.cmp(&b.tag))
    });
}

/// Byte-offset to character-offset lookup for one text.
struct CharOffsets {
    boundaries: Vec<usize>,
}

impl CharOffsets {
    fn new(text: &str) -> Self {
        Self {
            boundaries: text.char_indices().map(|(i, _)| i).collect(),
        }
    }

    /// Character index of a byte offset on a char boundary (or the text end).
    fn char_index(&self, byte: usize) -> usize {
        self.boundaries.partition_point(|&b| b < byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TECHNICAL_ANSWER: &str = "First, I profiled the service because p99 latency was 800ms. \
        Then we added a cache in front of the database, which cut latency by 40%. \
        For example, the search endpoint went from 1.2 seconds to 200ms.";

    fn tags(spans: &[EvidenceSpan]) -> BTreeSet<EvidenceTag> {
        spans.iter().map(|s| s.tag).collect()
    }

    #[test]
    fn empty_text_yields_no_spans() {
        assert!(extract("", QuestionType::Technical).is_empty());
        assert!(extract_for_question("", QuestionType::Technical, "Design a cache").is_empty());
    }

    #[test]
    fn detects_expected_tags_in_technical_answer() {
        let spans = extract(TECHNICAL_ANSWER, QuestionType::Technical);
        let found = tags(&spans);
        for tag in [
            EvidenceTag::SequenceMarker,
            EvidenceTag::CausalReasoning,
            EvidenceTag::QuantifiedClaim,
            EvidenceTag::TechnicalTerm,
            EvidenceTag::ExampleGiven,
        ] {
            assert!(found.contains(&tag), "missing {tag}: {spans:?}");
        }
        let quantities: Vec<String> = spans
            .iter()
            .filter(|s| s.tag == EvidenceTag::QuantifiedClaim)
            .map(|s| s.excerpt(TECHNICAL_ANSWER))
            .collect();
        assert!(quantities.contains(&"40%".to_string()), "{quantities:?}");
        assert!(quantities.contains(&"800ms".to_string()), "{quantities:?}");
    }

    #[test]
    fn question_type_gates_detectors() {
        let text = "I would check the cache first. Looking back, I learned a lot.";
        let technical = tags(&extract(text, QuestionType::Technical));
        let behavioral = tags(&extract(text, QuestionType::Behavioral));
        let situational = tags(&extract(text, QuestionType::Situational));

        assert!(technical.contains(&EvidenceTag::TechnicalTerm));
        assert!(!behavioral.contains(&EvidenceTag::TechnicalTerm));
        assert!(behavioral.contains(&EvidenceTag::SelfReflection));
        assert!(!technical.contains(&EvidenceTag::SelfReflection));
        assert!(situational.contains(&EvidenceTag::Hypothetical));
        assert!(!behavioral.contains(&EvidenceTag::Hypothetical));
    }

    #[test]
    fn extraction_is_deterministic() {
        for qt in QuestionType::ALL {
            let a = extract_for_question(TECHNICAL_ANSWER, qt, "How would you reduce latency?");
            let b = extract_for_question(TECHNICAL_ANSWER, qt, "How would you reduce latency?");
            assert_eq!(a, b);
        }
    }

    #[test]
    fn spans_stay_within_character_bounds() {
        let texts = [
            TECHNICAL_ANSWER,
            "Ünïcödé first — then 30% fewer tickets, because naïve caching…",
            "1. Gather data\n2. Decide\n- then act",
            "maybe",
            "€5k saved",
        ];
        for text in texts {
            let len = text.chars().count();
            for qt in QuestionType::ALL {
                for span in extract_for_question(text, qt, "How did you decide on caching?") {
                    assert!(span.is_within(len), "{span:?} out of bounds for {text:?}");
                }
            }
        }
    }

    #[test]
    fn multibyte_prefix_shifts_character_offsets() {
        let text = "ééé 50% faster";
        let span = extract(text, QuestionType::Technical)
            .into_iter()
            .find(|s| s.tag == EvidenceTag::QuantifiedClaim)
            .unwrap();
        assert_eq!((span.start, span.end), (4, 7));
        assert_eq!(span.excerpt(text), "50%");
    }

    #[test]
    fn no_self_overlap_within_a_tag() {
        let text = "Firstly, firstly then then next finally. 10 ms 10ms $10k 10 users";
        for qt in QuestionType::ALL {
            let spans = extract(text, qt);
            for tag in EvidenceTag::ALL {
                let same: Vec<_> = spans.iter().filter(|s| s.tag == tag).collect();
                for pair in same.windows(2) {
                    assert!(
                        pair[0].end <= pair[1].start,
                        "overlap for {tag}: {:?}",
                        pair
                    );
                }
            }
        }
    }

    #[test]
    fn overlapping_spans_from_different_detectors_are_kept() {
        // "as a result" is both causal reasoning and an outcome marker.
        let spans = extract("As a result the team moved faster.", QuestionType::Behavioral);
        let at_zero: BTreeSet<_> = spans
            .iter()
            .filter(|s| s.start == 0)
            .map(|s| s.tag)
            .collect();
        assert!(at_zero.contains(&EvidenceTag::CausalReasoning));
        assert!(at_zero.contains(&EvidenceTag::Outcome));
    }

    #[test]
    fn question_keywords_match_inflections() {
        let keywords = question_keywords("How would you design a caching layer?");
        assert!(keywords.contains("design"));
        assert!(keywords.contains("cach"));
        assert!(!keywords.contains("would"));

        let spans = extract_for_question(
            "I designed a cache with a write-through layer.",
            QuestionType::Technical,
            "How would you design a caching layer?",
        );
        let matched: Vec<String> = spans
            .iter()
            .filter(|s| s.tag == EvidenceTag::QuestionKeyword)
            .map(|s| s.excerpt("I designed a cache with a write-through layer."))
            .collect();
        assert_eq!(matched, vec!["designed", "cache", "layer"]);
    }

    #[test]
    fn spans_are_sorted() {
        let spans = extract_for_question(
            TECHNICAL_ANSWER,
            QuestionType::Technical,
            "Tell me about reducing latency",
        );
        for pair in spans.windows(2) {
            assert!((pair[0].start, pair[0].end) <= (pair[1].start, pair[1].end));
        }
    }
}
