use std::path::Path;

use crate::{
    corpus::{Corpus, Exemplar},
    error::Result,
    fingerprint::Fingerprint,
    index_cache::{self, IndexSource, LoadedIndex},
    ranker::{self, RankedExemplar},
    store::{CacheStore, DirStore},
    vectorizer,
};

/// Selects the exemplars most similar to a query.
///
/// Each instance owns its corpus together with a model and matrix built
/// for exactly that corpus, so independent instances never share state.
///
/// # Examples
///
/// ```
/// use fewshot::{Corpus, Retriever, store::MemoryStore};
///
/// let store = MemoryStore::new();
/// let retriever = Retriever::with_store(Corpus::builtin(), &store).unwrap();
/// let examples = retriever.retrieve("How many orders were shipped?", 3).unwrap();
/// assert_eq!(examples.len(), 3);
/// assert_eq!(examples[0].intent, "Counting");
/// ```
#[derive(Debug)]
pub struct Retriever {
    corpus: Corpus,
    index: LoadedIndex,
}

impl Retriever {
    /// Open with the three-file cache layout in `cache_dir`.
    pub fn open(corpus: Corpus, cache_dir: &Path) -> Result<Self> {
        Self::with_store(corpus, &DirStore::new(cache_dir))
    }

    /// Open against any cache store, reusing a valid record or building
    /// and persisting a new one.
    pub fn with_store<S>(corpus: Corpus, store: &S) -> Result<Self>
    where
        S: CacheStore + ?Sized,
    {
        let index = index_cache::load_or_build(store, &corpus, vectorizer::build);
        Ok(Self::from_index(corpus, index))
    }

    /// Discard any stored record and build from scratch.
    pub fn rebuild<S>(corpus: Corpus, store: &S) -> Result<Self>
    where
        S: CacheStore + ?Sized,
    {
        let index = index_cache::rebuild(store, &corpus, vectorizer::build);
        Ok(Self::from_index(corpus, index))
    }

    fn from_index(corpus: Corpus, index: LoadedIndex) -> Self {
        tracing::debug!(
            exemplars = corpus.len(),
            vocabulary = index.model.dimension(),
            source = ?index.source,
            "retriever ready"
        );
        Self { corpus, index }
    }

    /// The `k` exemplars most similar to `query`, best first.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Exemplar>> {
        Ok(self
            .rank(query, k)?
            .into_iter()
            .map(|r| r.exemplar.clone())
            .collect())
    }

    /// Like [`Retriever::retrieve`], keeping corpus indices and scores.
    pub fn rank(&self, query: &str, k: usize) -> Result<Vec<RankedExemplar<'_>>> {
        ranker::top_k(
            query,
            &self.index.model,
            &self.index.matrix,
            &self.corpus,
            k,
        )
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.index.fingerprint
    }

    pub fn vocabulary_size(&self) -> usize {
        self.index.model.vocabulary().len()
    }

    pub fn source(&self) -> IndexSource {
        self.index.source
    }
}
