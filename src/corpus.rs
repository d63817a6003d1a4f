use std::{ops::Index, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One labeled exemplar: an intent, a natural-language question and the
/// answer that resolves it.
///
/// Field names on disk accept the aliases `query_text`/`answer_text` and
/// `sql` so corpus files written for other tools load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemplar {
    pub intent: String,
    #[serde(alias = "query_text")]
    pub question: String,
    #[serde(alias = "answer_text", alias = "sql")]
    pub answer: String,
}

impl Exemplar {
    pub fn new(
        intent: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// The ordered, non-empty set of exemplars retrieval draws from.
///
/// Position is identity: row `i` of every document matrix built from a
/// corpus corresponds to `corpus[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    exemplars: Vec<Exemplar>,
}

impl Corpus {
    /// Wrap a list of exemplars, rejecting an empty list.
    ///
    /// # Examples
    ///
    /// ```
    /// use fewshot::{Corpus, Exemplar};
    ///
    /// let corpus = Corpus::new(vec![Exemplar::new(
    ///     "Counting",
    ///     "How many orders have been shipped?",
    ///     "SELECT COUNT(*) FROM orders WHERE status = 'shipped';",
    /// )])
    /// .unwrap();
    /// assert_eq!(corpus.len(), 1);
    /// assert!(Corpus::new(vec![]).is_err());
    /// ```
    pub fn new(exemplars: Vec<Exemplar>) -> Result<Self> {
        if exemplars.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        Ok(Self { exemplars })
    }

    /// Load a corpus from a JSON array of exemplar objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Corpus(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw).map_err(|e| match e {
            Error::Json(e) => {
                Error::Corpus(format!("malformed {}: {e}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let exemplars: Vec<Exemplar> = serde_json::from_str(raw)?;
        Self::new(exemplars)
    }

    /// The text-to-SQL exemplars shipped with the binary.
    pub fn builtin() -> Self {
        Self {
            exemplars: BUILTIN
                .iter()
                .map(|(intent, question, answer)| {
                    Exemplar::new(*intent, *question, *answer)
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.exemplars.len()
    }

    /// Always `false` for a constructed corpus; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Exemplar> {
        self.exemplars.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Exemplar> {
        self.exemplars.iter()
    }

    pub fn as_slice(&self) -> &[Exemplar] {
        &self.exemplars
    }

    /// Question texts in corpus order, the input to vectorization.
    pub fn questions(&self) -> Vec<&str> {
        self.exemplars.iter().map(|e| e.question.as_str()).collect()
    }
}

impl Index<usize> for Corpus {
    type Output = Exemplar;

    fn index(&self, index: usize) -> &Exemplar {
        &self.exemplars[index]
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a Exemplar;
    type IntoIter = std::slice::Iter<'a, Exemplar>;

    fn into_iter(self) -> Self::IntoIter {
        self.exemplars.iter()
    }
}

const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "Filtering",
        "Show all products in the electronics category that cost less than $100.",
        "SELECT * FROM products WHERE category = 'electronics' AND price < 100;",
    ),
    (
        "Aggregation",
        "What is the average price of all products?",
        "SELECT AVG(price) FROM products;",
    ),
    (
        "Join-related",
        "List names of users and the names of products they ordered.",
        "SELECT u.name, p.name FROM users u JOIN orders o ON u.user_id = o.user_id JOIN order_items oi ON o.order_id = oi.order_id JOIN products p ON oi.product_id = p.product_id;",
    ),
    (
        "Superlative",
        "Which product has received the highest number of reviews?",
        "SELECT p.name FROM products p JOIN reviews r ON p.product_id = r.product_id GROUP BY p.product_id, p.name ORDER BY COUNT(*) DESC LIMIT 1;",
    ),
    (
        "Grouping",
        "For each product category, how many products are currently in stock?",
        "SELECT category, COUNT(*) AS num_products FROM products GROUP BY category;",
    ),
    (
        "Ordering / Ranking",
        "List the top 5 most expensive products.",
        "SELECT * FROM products ORDER BY price DESC LIMIT 5;",
    ),
    (
        "Boolean Logic",
        "Find premium users who signed up in 2023 or 2024.",
        "SELECT * FROM users WHERE is_premium = 1 AND YEAR(signup_date) IN (2023, 2024);",
    ),
    (
        "Range Query",
        "Show orders placed between 2023-06-01 and 2023-07-31.",
        "SELECT * FROM orders WHERE order_date BETWEEN '2023-06-01' AND '2023-07-31';",
    ),
    (
        "Counting",
        "How many orders have been shipped?",
        "SELECT COUNT(*) AS shipped_orders FROM orders WHERE status = 'shipped';",
    ),
    (
        "Existence Check",
        "Which users have written at least one review?",
        "SELECT u.* FROM users u WHERE EXISTS (SELECT 1 FROM reviews r WHERE r.user_id = u.user_id);",
    ),
    (
        "Nested / Subquery",
        "List products priced above the average product price.",
        "SELECT * FROM products WHERE price > (SELECT AVG(price) FROM products);",
    ),
    (
        "Multi-hop Reasoning",
        "Which users purchased electronics products and rated them 5 stars?",
        "SELECT DISTINCT u.name FROM users u JOIN orders o ON u.user_id = o.user_id JOIN order_items oi ON o.order_id = oi.order_id JOIN products p ON oi.product_id = p.product_id JOIN reviews r ON r.user_id = u.user_id AND r.product_id = p.product_id WHERE p.category = 'electronics' AND r.rating = 5;",
    ),
    (
        "Comparison Between Groups",
        "Which product category has the highest average rating?",
        "SELECT category FROM (SELECT p.category, AVG(r.rating) AS avg_rating FROM products p JOIN reviews r ON p.product_id = r.product_id GROUP BY p.category) AS cat_ratings ORDER BY avg_rating DESC LIMIT 1;",
    ),
    (
        "Difference / Exclusion",
        "Which products have never been ordered?",
        "SELECT p.* FROM products p LEFT JOIN order_items oi ON p.product_id = oi.product_id WHERE oi.product_id IS NULL;",
    ),
    (
        "Projection",
        "Show only the name and price of all books.",
        "SELECT name, price FROM products WHERE category = 'books';",
    ),
    (
        "Lookup / Select",
        "Retrieve full details of the user with user_id = 3.",
        "SELECT * FROM users WHERE user_id = 3;",
    ),
];
