//! fewshot - deterministic few-shot exemplar retrieval.
//!
//! fewshot keeps a small corpus of labeled question/answer exemplars,
//! fits a TF-IDF vector space over the questions, and returns the `k`
//! exemplars most similar to an incoming question by cosine similarity.
//! The fitted model and document matrix are cached on disk, keyed by a
//! SHA-256 fingerprint of the corpus, and rebuilt whenever the corpus
//! changes.
//!
//! # Quick start
//!
//! ```no_run
//! use fewshot::{CacheDir, Corpus, Retriever};
//!
//! let cache_dir = CacheDir::resolve(None).unwrap();
//! let retriever = Retriever::open(Corpus::builtin(), cache_dir.root()).unwrap();
//!
//! for example in retriever.retrieve("Which users bought books?", 3).unwrap() {
//!     println!("Question: {}\nAnswer: {}", example.question, example.answer);
//! }
//! ```

pub mod analyzer;
pub mod cache_dir;
pub mod cli;
pub mod corpus;
pub mod error;
pub mod fingerprint;
pub mod index_cache;
pub mod matrix;
pub mod mcp;
pub mod ranker;
pub mod retriever;
pub mod store;
pub mod vectorizer;

pub use cache_dir::CacheDir;
pub use corpus::{Corpus, Exemplar};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use retriever::Retriever;
