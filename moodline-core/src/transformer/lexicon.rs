//! Word-valence sentiment scorer. Deliberately small: a token either carries
//! valence or it does not, a preceding negator flips it, and the summed
//! valence is squashed into [-1, 1]. Deterministic for identical input.

use crate::message::{Sentiment, SentimentLabel};
use crate::transformer::SentimentScorer;

const POSITIVE_WORDS: &[&str] = &[
    "amazing",
    "awesome",
    "best",
    "brilliant",
    "delightful",
    "enjoy",
    "enjoyed",
    "excellent",
    "fantastic",
    "glad",
    "good",
    "great",
    "happy",
    "love",
    "loved",
    "loves",
    "nice",
    "superb",
    "thrilled",
    "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry",
    "annoying",
    "awful",
    "bad",
    "broken",
    "disappointed",
    "disappointing",
    "fail",
    "failed",
    "failure",
    "hate",
    "hated",
    "hates",
    "horrible",
    "poor",
    "sad",
    "terrible",
    "useless",
    "worst",
    "worthless",
];

const NEGATORS: &[&str] = &["not", "no", "never", "nothing", "cannot"];

/// How many tokens after a negator still have their valence flipped.
const NEGATION_WINDOW: u8 = 2;

/// Squashing constant for the summed valence; keeps single-word messages
/// comfortably inside the label thresholds' positive/negative bands.
const NORMALIZATION_ALPHA: f64 = 15.0;

const LABEL_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> Sentiment {
        let mut valence_sum = 0.0_f64;
        let mut negation_window = 0u8;
        let mut saw_token = false;

        for raw in text.split_whitespace() {
            let token = raw
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            saw_token = true;

            if NEGATORS.contains(&token.as_str()) || token.ends_with("n't") {
                negation_window = NEGATION_WINDOW;
                continue;
            }

            let valence = if POSITIVE_WORDS.contains(&token.as_str()) {
                1.0
            } else if NEGATIVE_WORDS.contains(&token.as_str()) {
                -1.0
            } else {
                0.0
            };

            if valence != 0.0 {
                valence_sum += if negation_window > 0 { -valence } else { valence };
            }
            negation_window = negation_window.saturating_sub(1);
        }

        if !saw_token {
            return Sentiment::neutral();
        }

        let score = valence_sum / (valence_sum * valence_sum + NORMALIZATION_ALPHA).sqrt();
        let label = if score >= LABEL_THRESHOLD {
            SentimentLabel::Positive
        } else if score <= -LABEL_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        Sentiment { label, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_and_negative_examples() {
        let scorer = LexiconScorer;
        assert_eq!(
            scorer.score("I love this!").label,
            SentimentLabel::Positive
        );
        assert_eq!(
            scorer.score("terrible experience").label,
            SentimentLabel::Negative
        );
    }

    #[test]
    fn plain_statements_are_neutral() {
        let scorer = LexiconScorer;
        let sentiment = scorer.score("the sky is blue today");
        assert_eq!(sentiment.label, SentimentLabel::Neutral);
        assert_eq!(sentiment.score, 0.0);
    }

    #[test]
    fn unintelligible_text_gets_the_neutral_default() {
        let scorer = LexiconScorer;
        assert_eq!(scorer.score(""), Sentiment::neutral());
        assert_eq!(scorer.score("   "), Sentiment::neutral());
        assert_eq!(scorer.score("!!! ???"), Sentiment::neutral());
    }

    #[test]
    fn negation_flips_valence() {
        let scorer = LexiconScorer;
        assert_eq!(scorer.score("not good at all").label, SentimentLabel::Negative);
        assert_eq!(scorer.score("isn't bad").label, SentimentLabel::Positive);
    }

    #[test]
    fn scores_are_bounded_and_ordered() {
        let scorer = LexiconScorer;
        let mild = scorer.score("good").score;
        let strong = scorer.score("good great amazing wonderful superb").score;
        assert!(mild > 0.0 && mild <= 1.0);
        assert!(strong > mild && strong <= 1.0);
        assert!(scorer.score("awful terrible worst").score >= -1.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = LexiconScorer;
        let text = "I loved the demo but the packaging was disappointing";
        assert_eq!(scorer.score(text), scorer.score(text));
    }
}
