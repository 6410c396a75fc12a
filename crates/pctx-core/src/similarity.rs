//! Lexical similarity used by the bundled content indexes.
//!
//! Real deployments put an embedding model behind
//! [`ContentIndex::query`](crate::store::ContentIndex::query). The in-memory
//! and SQLite indexes shipped with pctx stand in for one with a cheap
//! term-frequency vector and cosine distance, which is enough to rank lines
//! that share vocabulary with the question.

use std::collections::HashMap;

/// Lowercased alphanumeric terms of `text`, in order.
///
/// Underscores count as word characters so `snake_case` identifiers stay
/// whole.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Term-frequency vector of `text`.
pub fn term_vector(text: &str) -> HashMap<String, f32> {
    let mut tf = HashMap::new();
    for term in tokenize(text) {
        *tf.entry(term).or_insert(0.0) += 1.0;
    }
    tf
}

/// Cosine similarity between two sparse term vectors.
///
/// Returns a value in `[0.0, 1.0]`; `0.0` when either vector is empty.
pub fn cosine_similarity(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f32 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum();
    let norm_a: f32 = a.values().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.values().map(|x| x * x).sum::<f32>().sqrt();

    let denom = norm_a * norm_b;
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(0.0, 1.0)
}

/// Distance between a query vector and a document: `1 - cosine`.
///
/// `0.0` means identical term distributions, `1.0` no shared terms.
pub fn distance(query: &HashMap<String, f32>, document: &str) -> f64 {
    1.0 - cosine_similarity(query, &term_vector(document)) as f64
}
