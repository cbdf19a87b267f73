//! Vector math shared by the in-memory backend and MMR search.

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine distance, `1 - cosine_similarity`. Ranges over `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Select up to `k` candidates by maximal marginal relevance.
///
/// Each step picks the candidate maximising
/// `lambda * sim(query, c) - (1 - lambda) * max(sim(c, selected))`.
/// `lambda = 1` is pure relevance, `lambda = 0` pure diversity. Returns
/// indices into `candidates` in selection order.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let effective_k = k.min(candidates.len());
    if effective_k == 0 {
        return Vec::new();
    }

    let query_similarity: Vec<f32> =
        candidates.iter().map(|c| cosine_similarity(query, c)).collect();

    let mut selected: Vec<usize> = Vec::with_capacity(effective_k);
    // Highest similarity to any already selected candidate.
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];

    while selected.len() < effective_k {
        let mut best: Option<(usize, f32)> = None;
        for (i, &relevance) in query_similarity.iter().enumerate() {
            if selected.contains(&i) {
                continue;
            }
            let penalty = if selected.is_empty() { 0.0 } else { redundancy[i] };
            let score = lambda * relevance - (1.0 - lambda) * penalty;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let Some((chosen, _)) = best else {
            break;
        };
        selected.push(chosen);
        for (i, candidate) in candidates.iter().enumerate() {
            let similarity = cosine_similarity(candidate, &candidates[chosen]);
            if similarity > redundancy[i] {
                redundancy[i] = similarity;
            }
        }
    }

    selected
}
