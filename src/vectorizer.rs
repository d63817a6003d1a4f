use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    analyzer::{ANALYZER_ID, Analyzer},
    corpus::Corpus,
    fingerprint::{Fingerprint, fingerprint},
    matrix::{DocumentMatrix, SparseVector},
};

/// A fitted TF-IDF space: sorted vocabulary plus one IDF weight per term.
///
/// The vocabulary is kept in lexicographic order so that dimension `i` is
/// the `i`-th smallest term, which makes numbering reproducible and lets
/// lookups binary-search without a separate index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorModel {
    fingerprint: Fingerprint,
    analyzer: String,
    documents: usize,
    vocabulary: Vec<String>,
    idf: Vec<f32>,
}

impl VectorModel {
    /// Fit vocabulary and smoothed IDF weights over `texts`.
    ///
    /// `idf(t) = ln((1 + n) / (1 + df(t))) + 1`
    pub fn fit(fingerprint: Fingerprint, texts: &[&str]) -> Self {
        let mut analyzer = Analyzer::new();
        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        for text in texts {
            let unique: BTreeSet<String> =
                analyzer.terms(text).into_iter().collect();
            for term in unique {
                *df.entry(term).or_default() += 1;
            }
        }

        let n = texts.len() as f64;
        let (vocabulary, idf) = df
            .into_iter()
            .map(|(term, count)| {
                let weight = ((1.0 + n) / (1.0 + count as f64)).ln() + 1.0;
                (term, weight as f32)
            })
            .unzip();

        Self {
            fingerprint,
            analyzer: ANALYZER_ID.to_string(),
            documents: texts.len(),
            vocabulary,
            idf,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn analyzer(&self) -> &str {
        &self.analyzer
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn dimension(&self) -> u32 {
        self.vocabulary.len() as u32
    }

    pub fn term_index(&self, term: &str) -> Option<u32> {
        self.vocabulary
            .binary_search_by(|t| t.as_str().cmp(term))
            .ok()
            .map(|i| i as u32)
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.term_index(term).map(|i| self.idf[i as usize])
    }

    /// Project text into this space without refitting. Terms outside the
    /// vocabulary are ignored; the result is L2-normalized.
    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&Analyzer::new().terms(text))
    }

    fn weigh(&self, terms: &[String]) -> SparseVector {
        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for term in terms {
            if let Some(index) = self.term_index(term) {
                *counts.entry(index).or_default() += 1.0;
            }
        }

        let mut vector = SparseVector::from_sorted(
            counts
                .into_iter()
                .map(|(index, tf)| (index, tf * self.idf[index as usize])),
        );
        vector.normalize();
        vector
    }

    /// Structural checks for a model read back from storage.
    pub fn is_well_formed(&self) -> bool {
        self.vocabulary.len() == self.idf.len()
            && self.vocabulary.windows(2).all(|w| w[0] < w[1])
            && self.idf.iter().all(|w| w.is_finite() && *w > 0.0)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Fit a model over the corpus questions and vectorize those same
/// questions into an index-aligned document matrix.
///
/// # Examples
///
/// ```
/// use fewshot::{Corpus, vectorizer::build};
///
/// let corpus = Corpus::builtin();
/// let (model, matrix) = build(&corpus);
/// assert_eq!(matrix.len(), corpus.len());
/// assert_eq!(matrix.dimension(), model.dimension());
/// ```
pub fn build(corpus: &Corpus) -> (VectorModel, DocumentMatrix) {
    let fp = fingerprint(corpus);
    let texts = corpus.questions();

    let model = VectorModel::fit(fp, &texts);

    let mut analyzer = Analyzer::new();
    let rows = texts
        .iter()
        .map(|text| model.weigh(&analyzer.terms(text)))
        .collect();
    let matrix = DocumentMatrix::new(fp, model.dimension(), rows);

    tracing::debug!(
        documents = corpus.len(),
        vocabulary = model.dimension(),
        "fitted vector model"
    );

    (model, matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Exemplar;

    fn corpus(questions: &[&str]) -> Corpus {
        Corpus::new(
            questions
                .iter()
                .enumerate()
                .map(|(i, q)| Exemplar::new(format!("i{i}"), *q, "a"))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn vocabulary_is_sorted_and_deduplicated() {
        let (model, _) = build(&corpus(&["banana bread", "apple pie apple"]));
        assert_eq!(model.vocabulary(), &["apple", "banana", "bread", "pie"]);
        assert!(model.is_well_formed());
    }

    #[test]
    fn idf_is_smoothed() {
        let (model, _) =
            build(&corpus(&["apple pie", "banana bread", "apple tart"]));
        let apple = model.idf("apple").unwrap();
        let pie = model.idf("pie").unwrap();
        assert!((apple - ((4.0f32 / 3.0).ln() + 1.0)).abs() < 1e-6);
        assert!((pie - ((4.0f32 / 2.0).ln() + 1.0)).abs() < 1e-6);
        assert!(pie > apple);
    }

    #[test]
    fn rows_are_unit_length_and_aligned() {
        let c = corpus(&["apple pie", "banana bread", "apple tart"]);
        let (model, matrix) = build(&c);
        assert_eq!(matrix.len(), 3);
        for (i, row) in matrix.rows().iter().enumerate() {
            assert!((row.norm() - 1.0).abs() < 1e-6);
            assert_eq!(row, &model.transform(&c[i].question));
        }
    }

    #[test]
    fn term_frequency_counts_repeats() {
        let (model, _) = build(&corpus(&["apple pie", "banana"]));
        let v = model.transform("apple apple pie");
        let apple = model.term_index("apple").unwrap();
        let pie = model.term_index("pie").unwrap();
        let pos = |idx| v.indices.iter().position(|&i| i == idx).unwrap();
        assert!(v.values[pos(apple)] > v.values[pos(pie)]);
    }

    #[test]
    fn unknown_terms_are_ignored() {
        let (model, _) = build(&corpus(&["apple pie", "banana bread"]));
        assert!(model.transform("kiwi mango").is_zero());
        assert!(model.transform("").is_zero());
        assert_eq!(model.transform("KIWI Apple").nnz(), 1);
    }

    #[test]
    fn model_and_matrix_carry_corpus_fingerprint() {
        let c = corpus(&["apple pie"]);
        let (model, matrix) = build(&c);
        assert_eq!(model.fingerprint(), &fingerprint(&c));
        assert_eq!(matrix.fingerprint(), &fingerprint(&c));
        assert_eq!(model.analyzer(), ANALYZER_ID);
        assert_eq!(model.documents(), 1);
    }

    #[test]
    fn json_bytes_restore_model() {
        let (model, _) = build(&Corpus::builtin());
        let restored = VectorModel::from_bytes(&model.to_bytes().unwrap());
        assert_eq!(restored.unwrap(), model);
    }

    #[test]
    fn malformed_model_detected() {
        let (model, _) = build(&corpus(&["apple pie"]));
        let mut value = serde_json::to_value(&model).unwrap();
        value["vocabulary"] = serde_json::json!(["pie", "apple"]);
        let broken: VectorModel = serde_json::from_value(value).unwrap();
        assert!(!broken.is_well_formed());
    }
}
