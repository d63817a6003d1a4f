use tantivy::tokenizer::{
    LowerCaser,
    RemoveLongFilter,
    SimpleTokenizer,
    TextAnalyzer,
    TokenStream,
};

/// Identifier recorded in every fitted model. A model fitted with a
/// different analyzer is never reused.
pub const ANALYZER_ID: &str = "simple-lower-min2-v1";

/// Tokens of this many bytes or more are dropped.
const MAX_TOKEN_LEN: usize = 40;

/// Tokens shorter than this many characters are dropped.
const MIN_TOKEN_CHARS: usize = 2;

/// The single text pipeline used for both fitting and transforming.
///
/// Splits on non-alphanumeric characters, drops overlong tokens,
/// lowercases, and discards one-character tokens. No stop words and no
/// stemming are applied.
pub struct Analyzer {
    inner: TextAnalyzer,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        let inner = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .build();
        Self { inner }
    }

    /// Split `text` into terms, in order of appearance.
    pub fn terms(&mut self, text: &str) -> Vec<String> {
        let mut terms = Vec::new();
        let mut stream = self.inner.token_stream(text);
        while stream.advance() {
            let token = stream.token();
            if token.text.chars().count() >= MIN_TOKEN_CHARS {
                terms.push(token.text.clone());
            }
        }
        terms
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("id", &ANALYZER_ID)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_punctuation() {
        let mut analyzer = Analyzer::new();
        assert_eq!(
            analyzer.terms("Show ALL products, please!"),
            vec!["show", "all", "products", "please"]
        );
    }

    #[test]
    fn drops_single_characters() {
        let mut analyzer = Analyzer::new();
        assert_eq!(
            analyzer.terms("List the top 5 most expensive products."),
            vec!["list", "the", "top", "most", "expensive", "products"]
        );
    }

    #[test]
    fn splits_dates_and_identifiers() {
        let mut analyzer = Analyzer::new();
        assert_eq!(
            analyzer.terms("between 2023-06-01 and user_id = 3"),
            vec!["between", "2023", "06", "01", "and", "user", "id"]
        );
    }

    #[test]
    fn empty_text_has_no_terms() {
        let mut analyzer = Analyzer::new();
        assert!(analyzer.terms("").is_empty());
        assert!(analyzer.terms("  ? ! a ").is_empty());
    }

    #[test]
    fn drops_overlong_tokens() {
        let mut analyzer = Analyzer::new();
        let long = "x".repeat(MAX_TOKEN_LEN + 1);
        assert_eq!(analyzer.terms(&format!("keep {long}")), vec!["keep"]);
    }
}
