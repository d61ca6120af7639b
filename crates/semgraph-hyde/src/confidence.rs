//! Deterministic confidence heuristic, independent of any LLM call so it
//! can be unit-tested without a collaborator.

const CONNECTIVES: &[&str] = &[
    "however",
    "therefore",
    "moreover",
    "furthermore",
    "nonetheless",
    "consequently",
    "nevertheless",
    "thus",
    "hence",
];

fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .count()
}

fn keyword_overlap_ratio(query: &str, content: &str) -> f64 {
    let query_words: std::collections::HashSet<String> = query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let content_words: std::collections::HashSet<String> = content
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    let overlap = query_words.intersection(&content_words).count();
    overlap as f64 / query_words.len() as f64
}

/// The base heuristic, before jitter.
pub fn base_confidence(content: &str, query: &str) -> f64 {
    let char_len = content.chars().count();
    let word_count = content.split_whitespace().count();
    let mut confidence = 0.3;

    for threshold in [200, 500, 1000] {
        if char_len >= threshold {
            confidence += 0.05;
        }
    }

    if count_sentences(content) >= 3 {
        confidence += 0.1;
    }

    if word_count > 200 {
        confidence += 0.15;
    } else if word_count > 100 {
        confidence += 0.1;
    }

    confidence += keyword_overlap_ratio(query, content) * 0.25;

    let lower = content.to_lowercase();
    if CONNECTIVES.iter().any(|c| lower.contains(c)) {
        confidence += 0.05;
    }

    if char_len < 100 || word_count < 20 {
        confidence -= 0.2;
    }

    confidence.clamp(0.1, 0.95)
}

/// A small xorshift PRNG seeded per call site (no `rand` dependency at this
/// layer — see `/DESIGN.md`). `seed` should vary per hypothesis (e.g. query
/// hash mixed with hypothesis index) so sibling hypotheses jitter apart.
fn jitter(seed: u64) -> f64 {
    let mut x = seed | 1;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    // map to [-0.05, 0.05]
    ((x % 1001) as f64 / 1000.0 - 0.5) * 0.1
}

/// Confidence with the ±0.05 jitter applied and re-clamped (spec §4.4: "a
/// small ±0.05 random jitter prevents ties but is not security-sensitive").
pub fn confidence_with_jitter(content: &str, query: &str, jitter_seed: u64) -> f64 {
    (base_confidence(content, query) + jitter(jitter_seed)).clamp(0.1, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_penalised() {
        let confidence = base_confidence("too short", "query");
        assert!(confidence <= 0.2);
    }

    #[test]
    fn long_overlapping_content_scores_higher() {
        let query = "What is backpropagation?";
        let long = "Backpropagation is a method used in artificial neural networks \
            to compute gradients efficiently. However, the technique requires \
            careful tuning. Therefore practitioners often combine it with \
            momentum. It was popularised by Geoffrey Hinton and colleagues. \
            The algorithm computes partial derivatives layer by layer."
            .repeat(2);
        let confidence = base_confidence(&long, query);
        assert!(confidence > 0.6);
    }

    #[test]
    fn confidence_always_within_bounds() {
        for seed in 0..50u64 {
            let c = confidence_with_jitter("a reasonably long hypothesis body here", "query", seed);
            assert!((0.1..=0.95).contains(&c));
        }
    }

    #[test]
    fn jitter_differentiates_siblings() {
        let a = confidence_with_jitter("identical content for both hypotheses here", "q", 1);
        let b = confidence_with_jitter("identical content for both hypotheses here", "q", 2);
        assert!((a - b).abs() > 0.0001);
    }
}
