use crate::{
    analyzer::ANALYZER_ID,
    corpus::Corpus,
    fingerprint::{Fingerprint, fingerprint},
    matrix::DocumentMatrix,
    store::{CacheStore, StoredRecord},
    vectorizer::VectorModel,
};

/// How a [`LoadedIndex`] came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    /// Reused from a valid cache record.
    Cached,
    /// Freshly built; `persisted` is false if writing the cache failed.
    Built { persisted: bool },
}

/// A model and matrix that belong to the same corpus version.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub fingerprint: Fingerprint,
    pub model: VectorModel,
    pub matrix: DocumentMatrix,
    pub source: IndexSource,
}

/// What is currently stored, relative to a given corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub location: String,
    pub current: Fingerprint,
    /// Marker text found in the store, if any.
    pub stored: Option<String>,
    /// Whether the stored record would be reused as-is.
    pub fresh: bool,
}

/// Return the cached model and matrix for `corpus`, or build and persist
/// them.
///
/// A cached record is reused only if its marker, its model and its matrix
/// all carry the corpus fingerprint, the model was fitted with the
/// current analyzer, and the matrix has one row per exemplar. Anything
/// else, including read errors, is a miss. A failure to persist is logged
/// and the fresh build is returned anyway.
pub fn load_or_build<S, F>(
    store: &S,
    corpus: &Corpus,
    builder: F,
) -> LoadedIndex
where
    S: CacheStore + ?Sized,
    F: FnOnce(&Corpus) -> (VectorModel, DocumentMatrix),
{
    let fp = fingerprint(corpus);

    match store.load() {
        Ok(Some(record)) => {
            if let Some((model, matrix)) = decode(&record, &fp, corpus) {
                tracing::debug!(
                    location = %store.describe(),
                    fingerprint = %fp,
                    "vector cache hit"
                );
                return LoadedIndex {
                    fingerprint: fp,
                    model,
                    matrix,
                    source: IndexSource::Cached,
                };
            }
        }
        Ok(None) => {
            tracing::debug!(location = %store.describe(), "vector cache empty");
        }
        Err(e) => {
            tracing::warn!(
                location = %store.describe(),
                "vector cache unreadable, rebuilding: {e}"
            );
        }
    }

    build_and_persist(store, corpus, fp, builder)
}

/// Clear the store, then build and persist unconditionally.
///
/// If the fresh build cannot be persisted the store is left empty rather
/// than holding the old record.
pub fn rebuild<S, F>(store: &S, corpus: &Corpus, builder: F) -> LoadedIndex
where
    S: CacheStore + ?Sized,
    F: FnOnce(&Corpus) -> (VectorModel, DocumentMatrix),
{
    if let Err(e) = store.clear() {
        tracing::warn!(
            location = %store.describe(),
            "failed to clear vector cache: {e}"
        );
    }
    build_and_persist(store, corpus, fingerprint(corpus), builder)
}

/// Report whether the store holds a reusable record for `corpus`.
pub fn inspect<S>(store: &S, corpus: &Corpus) -> CacheStatus
where
    S: CacheStore + ?Sized,
{
    let current = fingerprint(corpus);
    let record = store.load().unwrap_or_else(|e| {
        tracing::warn!(location = %store.describe(), "vector cache unreadable: {e}");
        None
    });

    let fresh = record
        .as_ref()
        .is_some_and(|r| decode(r, &current, corpus).is_some());

    CacheStatus {
        location: store.describe(),
        current,
        stored: record.map(|r| r.fingerprint),
        fresh,
    }
}

fn build_and_persist<S, F>(
    store: &S,
    corpus: &Corpus,
    fp: Fingerprint,
    builder: F,
) -> LoadedIndex
where
    S: CacheStore + ?Sized,
    F: FnOnce(&Corpus) -> (VectorModel, DocumentMatrix),
{
    let (model, matrix) = builder(corpus);

    let persisted = match encode(&fp, &model, &matrix) {
        Ok(record) => match store.save(&record) {
            Ok(()) => {
                tracing::debug!(
                    location = %store.describe(),
                    fingerprint = %fp,
                    "vector cache written"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    location = %store.describe(),
                    "failed to persist vector cache: {e}"
                );
                false
            }
        },
        Err(e) => {
            tracing::warn!("failed to serialize vector model: {e}");
            false
        }
    };

    LoadedIndex {
        fingerprint: fp,
        model,
        matrix,
        source: IndexSource::Built { persisted },
    }
}

fn encode(
    fp: &Fingerprint,
    model: &VectorModel,
    matrix: &DocumentMatrix,
) -> serde_json::Result<StoredRecord> {
    Ok(StoredRecord {
        fingerprint: fp.to_hex(),
        model: model.to_bytes()?,
        matrix: matrix.to_bytes(),
    })
}

fn decode(
    record: &StoredRecord,
    fp: &Fingerprint,
    corpus: &Corpus,
) -> Option<(VectorModel, DocumentMatrix)> {
    if Fingerprint::from_hex(&record.fingerprint).as_ref() != Some(fp) {
        tracing::debug!(
            stored = %record.fingerprint,
            current = %fp,
            "corpus changed since cache was written"
        );
        return None;
    }

    let model = match VectorModel::from_bytes(&record.model) {
        Ok(model) => model,
        Err(e) => {
            tracing::warn!("cached vector model is corrupt: {e}");
            return None;
        }
    };
    let Some(matrix) = DocumentMatrix::from_bytes(&record.matrix) else {
        tracing::warn!("cached document matrix is corrupt");
        return None;
    };

    let consistent = model.fingerprint() == fp
        && matrix.fingerprint() == fp
        && model.analyzer() == ANALYZER_ID
        && model.is_well_formed()
        && model.documents() == corpus.len()
        && matrix.len() == corpus.len()
        && matrix.dimension() == model.dimension();
    if !consistent {
        tracing::warn!("cached vector artifacts disagree, rebuilding");
        return None;
    }

    Some((model, matrix))
}
