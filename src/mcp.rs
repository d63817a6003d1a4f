use std::sync::Arc;

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{error, ranker::RankedExemplar, retriever::Retriever};

const DEFAULT_RETRIEVE_COUNT: usize = 3;

#[derive(Clone)]
pub struct FewshotMcpServer {
    retriever: Arc<Retriever>,
    tool_router: ToolRouter<Self>,
}

impl FewshotMcpServer {
    fn new(retriever: Retriever) -> Self {
        Self {
            retriever: Arc::new(retriever),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl FewshotMcpServer {
    /// Retrieve the exemplars most similar to a question.
    #[tool(
        name = "fewshot_retrieve",
        description = "Return the k stored question/answer exemplars most similar to a question, best first."
    )]
    pub async fn fewshot_retrieve(
        &self,
        params: Parameters<RetrieveParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let k = params.k.unwrap_or(DEFAULT_RETRIEVE_COUNT);

        let ranked = self.retriever.rank(&params.query, k).map_err(|e| {
            rmcp::ErrorData::invalid_params(e.to_string(), None)
        })?;

        let items: Vec<RetrieveResultItem> =
            ranked.iter().map(RetrieveResultItem::from).collect();

        let summary = format_retrieve_summary(&items, &params.query);
        let structured = serde_json::to_value(RetrieveResponse {
            query: params.query,
            result_count: items.len(),
            results: items,
        })
        .map_err(|e| mcp_error("failed to serialize results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        result.is_error = Some(false);
        result.meta = None;
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for FewshotMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::new("fewshot", env!("CARGO_PKG_VERSION"));
        server_info.title = Some("fewshot MCP".to_string());
        server_info.icons = None;
        server_info.website_url = None;

        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = server_info;
        info.instructions = Some(
            "Use fewshot_retrieve to fetch worked question/answer examples similar to the question you are answering."
                .to_string(),
        );
        info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveParams {
    /// The question to find exemplars for.
    pub query: String,
    /// Number of exemplars to return (default: 3).
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    query: String,
    result_count: usize,
    results: Vec<RetrieveResultItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResultItem {
    rank: usize,
    index: usize,
    score: f32,
    intent: String,
    question: String,
    answer: String,
}

impl From<&RankedExemplar<'_>> for RetrieveResultItem {
    fn from(r: &RankedExemplar<'_>) -> Self {
        Self {
            rank: r.rank,
            index: r.index,
            score: r.score,
            intent: r.exemplar.intent.clone(),
            question: r.exemplar.question.clone(),
            answer: r.exemplar.answer.clone(),
        }
    }
}

fn format_retrieve_summary(
    results: &[RetrieveResultItem],
    query: &str,
) -> String {
    let mut lines = Vec::with_capacity(results.len() * 3 + 1);
    let suffix = if results.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} example{} for \"{query}\":",
        results.len(),
        suffix
    ));

    for item in results {
        lines.push(format!(
            "Example {} [{:.3}] ({})",
            item.rank, item.score, item.intent
        ));
        lines.push(format!("Question: {}", item.question));
        lines.push(format!("Answer: {}", item.answer));
    }

    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(retriever: Retriever) -> error::Result<()> {
    let server = FewshotMcpServer::new(retriever);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Corpus, store::MemoryStore};

    fn server() -> FewshotMcpServer {
        let store = MemoryStore::new();
        FewshotMcpServer::new(
            Retriever::with_store(Corpus::builtin(), &store).unwrap(),
        )
    }

    #[tokio::test]
    async fn retrieve_tool_returns_structured_results() {
        let params = RetrieveParams {
            query: "How many orders have been shipped?".to_string(),
            k: Some(2),
        };

        let result = server().fewshot_retrieve(Parameters(params)).await.unwrap();

        let structured = result.structured_content.expect("structured");
        let results = structured
            .get("results")
            .and_then(|v| v.as_array())
            .expect("results array");

        assert_eq!(results.len(), 2);
        let first = &results[0];
        assert_eq!(first.get("rank").and_then(|v| v.as_u64()), Some(1));
        assert_eq!(first.get("index").and_then(|v| v.as_u64()), Some(8));
        assert_eq!(
            first.get("intent").and_then(|v| v.as_str()),
            Some("Counting")
        );
        assert_eq!(
            structured.get("resultCount").and_then(|v| v.as_u64()),
            Some(2)
        );

        let summary = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default();
        assert!(summary.contains("Found 2 examples"));
        assert!(summary.contains("Question: How many orders have been shipped?"));
    }

    #[tokio::test]
    async fn retrieve_tool_rejects_zero_k() {
        let params = RetrieveParams {
            query: "anything".to_string(),
            k: Some(0),
        };
        assert!(server().fewshot_retrieve(Parameters(params)).await.is_err());
    }

    #[test]
    fn summary_uses_singular_for_one_result() {
        let items = vec![RetrieveResultItem {
            rank: 1,
            index: 0,
            score: 0.5,
            intent: "Counting".to_string(),
            question: "How many?".to_string(),
            answer: "SELECT 1;".to_string(),
        }];
        let summary = format_retrieve_summary(&items, "q");
        assert!(summary.starts_with("Found 1 example for \"q\":"));
        assert!(summary.contains("Answer: SELECT 1;"));
    }
}
