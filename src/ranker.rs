use serde::Serialize;

use crate::{
    corpus::{Corpus, Exemplar},
    error::{Error, Result},
    matrix::DocumentMatrix,
    vectorizer::VectorModel,
};

/// An exemplar selected for a query, with its position and similarity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedExemplar<'a> {
    /// 1-indexed position in the ranking.
    pub rank: usize,
    /// Position of the exemplar in the corpus.
    pub index: usize,
    pub score: f32,
    pub exemplar: &'a Exemplar,
}

/// Rank corpus entries by cosine similarity to `query` and keep the best
/// `k`.
///
/// Scores are sorted descending; equal scores keep ascending corpus
/// order, so the result is reproducible for identical input. Returns
/// `min(k, corpus.len())` entries. A query with no known terms scores 0
/// everywhere and therefore yields the first `k` exemplars.
pub fn top_k<'a>(
    query: &str,
    model: &VectorModel,
    matrix: &DocumentMatrix,
    corpus: &'a Corpus,
    k: usize,
) -> Result<Vec<RankedExemplar<'a>>> {
    if k == 0 {
        return Err(Error::InvalidArgument("k must be at least 1".into()));
    }
    if matrix.len() != corpus.len() {
        return Err(Error::InvalidArgument(format!(
            "document matrix has {} rows but corpus has {} exemplars",
            matrix.len(),
            corpus.len()
        )));
    }

    let query_vector = model.transform(query);

    let mut scored: Vec<(usize, f32)> = matrix
        .rows()
        .iter()
        .map(|row| query_vector.cosine(row))
        .enumerate()
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .enumerate()
        .map(|(i, (index, score))| RankedExemplar {
            rank: i + 1,
            index,
            score,
            exemplar: &corpus[index],
        })
        .collect())
}
