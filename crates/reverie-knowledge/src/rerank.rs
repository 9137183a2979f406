//! Lexical reranking applied on top of vector similarity.

/// Common short words excluded from query term extraction.
const STOP_WORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "could", "does", "for", "from", "have",
    "into", "just", "like", "more", "most", "only", "over", "some", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "very", "were", "what", "when",
    "where", "which", "while", "will", "with", "would", "your",
];

/// Multiplier applied per matched-term fraction.
const MATCH_BOOST: f32 = 0.5;
/// Extra multiplier when matched terms cluster within the window.
const PROXIMITY_BONUS: f32 = 1.2;
/// Token window used for the proximity bonus.
const PROXIMITY_WINDOW: usize = 5;
/// Penalty when nothing matches and conversational context was given.
const MISS_PENALTY_WITH_CONTEXT: f32 = 0.9;
/// Penalty when nothing matches and no context was given.
const MISS_PENALTY_WITHOUT_CONTEXT: f32 = 0.6;

/// Extract rerank terms from a normalized query: longer than three
/// characters, stop words removed.
pub fn extract_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| token.len() > 3)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Adjust a base similarity score with lexical signals.
///
/// The boost scales with the fraction of query terms literally present
/// in the candidate; clustered matches earn a proximity bonus. A
/// candidate matching nothing is attenuated, harder when the query had
/// no conversational context.
pub fn rerank_score(base: f32, terms: &[String], candidate: &str, has_context: bool) -> f32 {
    if terms.is_empty() {
        return base;
    }
    let text = candidate.to_lowercase();
    let tokens = text.split_whitespace().collect::<Vec<_>>();

    let mut positions = Vec::new();
    let mut matched = 0usize;
    for term in terms {
        let position = tokens.iter().position(|token| token.contains(term.as_str()));
        if let Some(position) = position {
            matched += 1;
            positions.push(position);
        }
    }

    if matched == 0 {
        let penalty = if has_context {
            MISS_PENALTY_WITH_CONTEXT
        } else {
            MISS_PENALTY_WITHOUT_CONTEXT
        };
        return base * penalty;
    }

    let fraction = matched as f32 / terms.len() as f32;
    let mut score = base * (1.0 + fraction * MATCH_BOOST);
    if clustered(&positions) {
        score *= PROXIMITY_BONUS;
    }
    score
}

/// True when at least two match positions fall within the window.
fn clustered(positions: &[usize]) -> bool {
    for (i, a) in positions.iter().enumerate() {
        for b in positions.iter().skip(i + 1) {
            if a.abs_diff(*b) <= PROXIMITY_WINDOW {
                return true;
            }
        }
    }
    false
}
