//! Canonical contradiction detection.
//!
//! Shared by belief admission (flag-and-demote) and the validation gate
//! (critical failure). The algorithm is deliberately simple and pinned by
//! tests: lowercase word tokenization, negation markers scoped to a
//! sentence, and a narrow copular-mismatch check for "X is Y" facts.
//! No stemming, no n-gram windows.

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "of", "to", "in", "on", "at", "and", "or", "it",
    "its", "his", "her", "their", "that", "this", "be", "been",
];

const NEGATION_MARKERS: &[&str] = &["not ", "n't", "never", "no longer"];

/// Markers that introduce a naming complement ("is named X", "is called X").
const NAMING_MARKERS: &[&str] = &["named", "called"];

/// Lowercase alphanumeric word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Tokens minus stopwords.
pub fn content_words(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Fraction of `reference` words present in `tokens`, 0 when the
/// reference is empty.
pub fn overlap_fraction(reference: &[String], tokens: &[String]) -> f32 {
    if reference.is_empty() {
        return 0.0;
    }
    let hits = reference.iter().filter(|w| tokens.contains(w)).count();
    hits as f32 / reference.len() as f32
}

/// True if any content word of `subject` appears in `text`.
pub fn subject_overlaps(subject: &str, text: &str) -> bool {
    let subject_words = content_words(subject);
    if subject_words.is_empty() {
        return false;
    }
    let text_tokens = tokenize(text);
    subject_words.iter().any(|w| text_tokens.contains(w))
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?']).filter(|s| !s.trim().is_empty())
}

fn has_negation(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    NEGATION_MARKERS.iter().any(|m| lower.contains(m))
}

/// Negation path: a sentence of `candidate` carries a negation marker and
/// restates at least 60% of the fact's content words.
fn negates(fact: &str, candidate: &str) -> bool {
    let fact_words = content_words(fact);
    if fact_words.is_empty() {
        return false;
    }
    sentences(candidate).any(|sentence| {
        has_negation(sentence) && overlap_fraction(&fact_words, &tokenize(sentence)) >= 0.6
    })
}

/// Split "X is Y" into (subject, complement tokens). Lowercased.
fn split_copular(text: &str) -> Option<(String, Vec<String>)> {
    let lower = text.to_lowercase();
    let idx = lower.find(" is ")?;
    let subject = lower[..idx].to_string();
    let complement = tokenize(&lower[idx + 4..]);
    if complement.is_empty() {
        return None;
    }
    Some((subject, complement))
}

/// Copular path: the candidate re-asserts "X is <something else>" against
/// a fact "X is <complement>". Two frames only:
/// - naming frame: both complements start with "named"/"called" and the
///   remaining token sets are disjoint ("is named Arthur" vs "is named Bob")
/// - single-word frame: both complements lead with a single differing word
///   ("is closed" vs "is open")
/// Anything else (e.g. "is generous" vs "is named Arthur") is not treated
/// as a contradiction.
fn copular_mismatch(fact: &str, candidate: &str) -> bool {
    let Some((fact_subject, fact_complement)) = split_copular(fact) else {
        return false;
    };
    let subject_words = content_words(&fact_subject);
    if subject_words.is_empty() {
        return false;
    }

    let fact_naming = NAMING_MARKERS.contains(&fact_complement[0].as_str());

    sentences(candidate).any(|sentence| {
        if has_negation(sentence) {
            // The negation path owns negated sentences.
            return false;
        }
        let Some((c_subject, c_complement)) = split_copular(sentence) else {
            return false;
        };
        if overlap_fraction(&subject_words, &tokenize(&c_subject)) < 1.0 {
            return false;
        }

        let c_naming = NAMING_MARKERS.contains(&c_complement[0].as_str());
        match (fact_naming, c_naming) {
            (true, true) => {
                let fact_names = &fact_complement[1..];
                let c_names = &c_complement[1..];
                !fact_names.is_empty()
                    && !c_names.is_empty()
                    && fact_names.iter().all(|w| !c_names.contains(w))
            }
            (false, false) if fact_complement.len() == 1 => {
                c_complement[0] != fact_complement[0]
            }
            _ => false,
        }
    })
}

/// Does `candidate` contradict the canonical `fact`?
pub fn contradicts(fact: &str, candidate: &str) -> bool {
    negates(fact, candidate) || copular_mismatch(fact, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KING_FACT: &str = "The king is named Arthur";

    #[test]
    fn test_negated_restatement_contradicts() {
        assert!(contradicts(
            KING_FACT,
            "The king is not named Arthur. His name is Bob."
        ));
    }

    #[test]
    fn test_contraction_negation_detected() {
        assert!(contradicts(KING_FACT, "The king isn't named Arthur."));
    }

    #[test]
    fn test_unrelated_negation_passes() {
        assert!(!contradicts(KING_FACT, "I never met the queen of the east."));
    }

    #[test]
    fn test_plain_restatement_passes() {
        assert!(!contradicts(KING_FACT, "The king is named Arthur, as all know."));
    }

    #[test]
    fn test_naming_frame_mismatch_contradicts() {
        assert!(contradicts(KING_FACT, "The king is named Bob."));
    }

    #[test]
    fn test_attribute_assertion_does_not_contradict_naming_fact() {
        assert!(!contradicts(KING_FACT, "The king is generous."));
    }

    #[test]
    fn test_single_word_frame_mismatch() {
        assert!(contradicts("The gate is closed", "The gate is open."));
        assert!(!contradicts("The gate is closed", "The gate is closed, friend."));
    }

    #[test]
    fn test_subject_must_match() {
        assert!(!contradicts("The gate is closed", "The shop is open."));
    }

    #[test]
    fn test_subject_overlaps() {
        assert!(subject_overlaps("king", KING_FACT));
        assert!(subject_overlaps("the old king", KING_FACT));
        assert!(!subject_overlaps("queen", KING_FACT));
    }

    #[test]
    fn test_tokenize_strips_punctuation() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn test_overlap_fraction() {
        let reference = vec!["king".to_string(), "arthur".to_string()];
        let tokens = tokenize("the king rode out");
        assert_eq!(overlap_fraction(&reference, &tokens), 0.5);
    }
}
