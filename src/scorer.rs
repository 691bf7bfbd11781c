//! # Sentiment Scorer
//!
//! Pluggable capability: text in, `{compound, confidence, label}` out.
//! The pipeline only sees the trait; the bundled implementation is a
//! weighted financial lexicon with negation handling. Scoring is CPU-bound
//! and fast, so the trait is synchronous.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::model::SentimentLabel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    /// Compound polarity in `[-1, 1]`.
    pub compound: f64,
    /// Confidence in `[0, 1]`; grows with text length.
    pub confidence: f64,
    pub label: SentimentLabel,
}

impl SentimentResult {
    pub fn neutral() -> Self {
        Self {
            compound: 0.0,
            confidence: 0.5,
            label: SentimentLabel::Neutral,
        }
    }
}

pub trait SentimentScorer: Send + Sync {
    /// Must handle empty input by returning a neutral, low-confidence
    /// result rather than failing. A returned error marks the article as
    /// scoring-failed in the run report; it never aborts the batch.
    fn score(&self, text: &str) -> anyhow::Result<SentimentResult>;

    /// Stamped onto every persisted score.
    fn model_version(&self) -> &str;
}

static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).expect("valid sentiment lexicon")
});

/// Normalization constant for the compound score: `sum / sqrt(sum^2 + ALPHA)`
/// maps the unbounded lexicon sum into `(-1, 1)`.
const ALPHA: f64 = 15.0;

const MODEL_VERSION: &str = "lexicon-v1.0";

#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_weight(&self, w: &str) -> f64 {
        *LEXICON.get(w).unwrap_or(&0.0)
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> anyhow::Result<SentimentResult> {
        let tokens: Vec<String> = tokenize(text).collect();
        if tokens.is_empty() {
            return Ok(SentimentResult::neutral());
        }

        let mut sum = 0.0f64;
        for i in 0..tokens.len() {
            let base = self.word_weight(&tokens[i]);
            if base == 0.0 {
                continue;
            }
            // Negation within the preceding 1..=3 tokens flips the sign.
            let negated = (1..=3).any(|k| i >= k && is_negator(&tokens, i - k));
            sum += if negated { -base } else { base };
        }

        let compound = sum / (sum * sum + ALPHA).sqrt();
        // Longer text, more evidence. Floor 0.5, cap 0.95.
        let confidence = (0.5 + (tokens.len() as f64 / 100.0) * 0.5).min(0.95);

        Ok(SentimentResult {
            compound,
            confidence,
            label: SentimentLabel::from_score(compound),
        })
    }

    fn model_version(&self) -> &str {
        MODEL_VERSION
    }
}

/// Alphanumeric tokens, lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tokens: &[String], i: usize) -> bool {
    match tokens[i].as_str() {
        "not" | "no" | "never" | "isn" | "wasn" | "aren" | "cannot" | "without" => true,
        // Plain verbs, negators only as the contraction "can't"/"won't"
        // (the tokenizer splits those into two tokens).
        "can" | "won" => tokens.get(i + 1).is_some_and(|t| t == "t"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_neutral_low_confidence() {
        let s = LexiconScorer::new();
        for text in ["", "   ", "\t\n"] {
            let r = s.score(text).unwrap();
            assert_eq!(r.compound, 0.0);
            assert_eq!(r.label, SentimentLabel::Neutral);
            assert!(r.confidence <= 0.5);
        }
    }

    #[test]
    fn bullish_headline_scores_positive() {
        let s = LexiconScorer::new();
        let r = s
            .score("Apple announces record profits, stock soars on strong growth")
            .unwrap();
        assert_eq!(r.label, SentimentLabel::Positive);
        assert!(r.compound > 0.05);
        assert!(r.compound <= 1.0);
    }

    #[test]
    fn bearish_headline_scores_negative() {
        let s = LexiconScorer::new();
        let r = s
            .score("Tesla recalls thousands of vehicles amid safety concerns, shares plunge")
            .unwrap();
        assert_eq!(r.label, SentimentLabel::Negative);
        assert!(r.compound < -0.05);
        assert!(r.compound >= -1.0);
    }

    #[test]
    fn negation_flips_polarity() {
        let s = LexiconScorer::new();
        let plain = s.score("profit growth").unwrap();
        let negated = s.score("no profit growth").unwrap();
        assert!(plain.compound > 0.0);
        assert!(negated.compound < 0.0);
    }

    #[test]
    fn contractions_negate_but_plain_can_and_won_do_not() {
        let s = LexiconScorer::new();
        // "can"/"won" as ordinary verbs leave polarity alone.
        assert!(s.score("company can deliver growth").unwrap().compound > 0.0);
        assert!(s.score("company won strong growth").unwrap().compound > 0.0);
        // Their contractions still flip it.
        assert!(s.score("won't deliver growth").unwrap().compound < 0.0);
        assert!(s.score("can't sustain profit").unwrap().compound < 0.0);
    }

    #[test]
    fn unknown_words_stay_neutral() {
        let s = LexiconScorer::new();
        let r = s.score("Fed announces interest rate decision").unwrap();
        assert_eq!(r.label, SentimentLabel::Neutral);
    }

    #[test]
    fn confidence_grows_with_length_and_caps() {
        let s = LexiconScorer::new();
        let short = s.score("profit").unwrap();
        let long_text = "profit ".repeat(300);
        let long = s.score(&long_text).unwrap();
        assert!(long.confidence > short.confidence);
        assert!(long.confidence <= 0.95);
    }
}
