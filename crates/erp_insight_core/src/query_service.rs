//! crates/erp_insight_core/src/query_service.rs
//!
//! The query orchestrator. It sequences SQL generation, execution, explanation
//! and suggestion calls into a single `QueryResult`, applying a fallback at
//! every stage so that no public operation ever returns an error.

use crate::domain::{DataRow, DatabaseStatistics, DatabaseSummary, QueryResult};
use crate::ports::{ErpRepository, InferenceService, PortError};
use crate::sql_text::is_generation_failure;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Rows handed to the model when asking for an explanation.
const EXPLANATION_SAMPLE_ROWS: usize = 5;
/// Upper bound on insight lines kept from the summary.
const MAX_INSIGHTS: usize = 5;

pub const GENERATION_FAILED: &str = "Could not generate a valid SQL query.";
pub const NO_MATCHING_DATA: &str = "No data matching your query was found.";
pub const NO_ROWS_RETURNED: &str = "The query ran successfully but returned no rows.";
const ANALYSIS_UNAVAILABLE: &str = "The analysis could not be generated right now.";
const INSIGHTS_UNAVAILABLE: &str = "Insights could not be retrieved.";
const RECOMMENDATIONS_UNAVAILABLE: &str = "Recommendations could not be retrieved.";

/// Returned by [`QueryService::query_suggestions`] when the statistics needed
/// to build a context are unavailable.
pub const FALLBACK_SUGGESTIONS: [&str; 5] = [
    "Which suppliers have the most receipts?",
    "Which articles were received this month?",
    "What is the total purchase amount per supplier?",
    "Which receipts are still pending reception?",
    "Which articles are purchased the most?",
];

const HEADER_TABLE_PROMPT: &str = "Explain what the CabeceraAlbaranProveedor table is in Sage 200. \
Include its purpose, main fields, relationships with other tables, \
and its importance in purchase management.";

const LINE_TABLE_PROMPT: &str = "Explain what the LineasAlbaranProveedor table is in Sage 200. \
Include its purpose, main fields, its relationship with CabeceraAlbaranProveedor, \
and how it is used for detailed control of receptions.";

const SUPPLIER_TABLE_PROMPT: &str = "Explain what the Proveedor table is in Sage 200. \
Include its purpose, the information it stores, its importance in the supply chain, \
and how it relates to delivery notes.";

const ARTICLE_TABLE_PROMPT: &str = "Explain what the Articulo table is in Sage 200. \
Include its purpose, the kinds of information it stores (prices, stock, categories), \
and its role in inventory management.";

const SCHEMA_PROMPT: &str = "Explain the overall structure of the Sage 200 database, focusing on:
- The purchasing module (delivery notes, suppliers)
- The inventory module (articles, stock)
- How these entities relate to each other
- Their importance for business management";

//=========================================================================================
// Pipeline Stage Outcomes
//=========================================================================================

/// Outcome of the SQL generation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SqlGeneration {
    Generated(String),
    /// Carries whatever the model returned so it can be shown to the user.
    Failed(String),
}

impl SqlGeneration {
    fn classify(raw: String) -> Self {
        if is_generation_failure(&raw) {
            Self::Failed(raw)
        } else {
            Self::Generated(raw)
        }
    }
}

/// How a successful execution should be described to the model.
struct ExecutionContext<'a> {
    caption: String,
    empty_message: &'a str,
    suggestion_seed: String,
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

/// Combines the repository and the inference service into end-user queries.
///
/// Holds no mutable state; concurrent calls are independent.
#[derive(Clone)]
pub struct QueryService {
    repository: Arc<dyn ErpRepository>,
    inference: Arc<dyn InferenceService>,
}

impl QueryService {
    pub fn new(repository: Arc<dyn ErpRepository>, inference: Arc<dyn InferenceService>) -> Self {
        Self {
            repository,
            inference,
        }
    }

    /// Answers a natural-language question: generate SQL, run it, explain the
    /// rows and suggest follow-ups.
    pub async fn process_natural_language(&self, query: &str) -> QueryResult {
        let start_time = Instant::now();
        info!("Processing natural-language query: '{}'", query);

        let generation = SqlGeneration::classify(self.inference.generate_sql(query).await);

        let mut result = match generation {
            SqlGeneration::Failed(raw) => {
                warn!("SQL generation failed for query '{}'", query);
                QueryResult {
                    sql: raw,
                    error: GENERATION_FAILED.to_string(),
                    explanation: self.inference.ask(query).await,
                    ..QueryResult::default()
                }
            }
            SqlGeneration::Generated(sql) => {
                debug!("Generated SQL:\n{}", sql);
                match self.repository.execute_arbitrary(&sql).await {
                    Ok(rows) => {
                        let context = ExecutionContext {
                            caption: format!("original query: {}", query),
                            empty_message: NO_MATCHING_DATA,
                            suggestion_seed: query.to_string(),
                        };
                        self.describe_rows(sql, rows, context).await
                    }
                    Err(e) => {
                        error!("Generated SQL failed to execute: {}", e);
                        let explanation = self
                            .inference
                            .ask(&format!("Explain why this SQL query might fail: {}", sql))
                            .await;
                        QueryResult {
                            error: format!("Error executing the query against the database: {}", e),
                            explanation,
                            sql,
                            ..QueryResult::default()
                        }
                    }
                }
            }
        };

        result.elapsed = start_time.elapsed();
        info!(
            "⏱️ Natural-language query finished in {:?} (success: {}, rows: {})",
            result.elapsed, result.success, result.record_count
        );
        result
    }

    /// Runs the caller's SQL verbatim, then explains and suggests as for
    /// natural-language queries.
    pub async fn execute_sql(&self, sql: &str) -> QueryResult {
        let start_time = Instant::now();
        info!("Executing direct SQL query.");

        let mut result = match self.repository.execute_arbitrary(sql).await {
            Ok(rows) => {
                let context = ExecutionContext {
                    caption: format!("result of SQL query: {}", sql),
                    empty_message: NO_ROWS_RETURNED,
                    suggestion_seed: format!("SQL: {}", sql),
                };
                self.describe_rows(sql.to_string(), rows, context).await
            }
            Err(e) => {
                error!("Direct SQL failed to execute: {}", e);
                let explanation = self
                    .inference
                    .ask(&format!("Explain this SQL error: {} in query: {}", e, sql))
                    .await;
                QueryResult {
                    sql: sql.to_string(),
                    error: e.to_string(),
                    explanation,
                    ..QueryResult::default()
                }
            }
        };

        result.elapsed = start_time.elapsed();
        info!(
            "⏱️ SQL query finished in {:?} (success: {}, rows: {})",
            result.elapsed, result.success, result.record_count
        );
        result
    }

    /// Explains one of the ERP tables, the schema as a whole, or any other term.
    pub async fn explain_entity(&self, name: &str) -> String {
        let prompt = match name.trim().to_lowercase().as_str() {
            "receipts" | "receipt headers" | "receiptheader" | "cabeceraalbaran"
            | "cabeceraalbaranproveedor" => HEADER_TABLE_PROMPT.to_string(),
            "lines" | "receipt lines" | "receiptline" | "lineasalbaran"
            | "lineasalbaranproveedor" => LINE_TABLE_PROMPT.to_string(),
            "suppliers" | "supplier" | "proveedores" | "proveedor" => {
                SUPPLIER_TABLE_PROMPT.to_string()
            }
            "articles" | "article" | "products" | "articulos" | "articulo" => {
                ARTICLE_TABLE_PROMPT.to_string()
            }
            "schema" | "database" | "sage200" => SCHEMA_PROMPT.to_string(),
            _ => format!(
                "Explain what '{}' means in the context of a Sage 200 ERP database.",
                name
            ),
        };
        self.inference.ask(&prompt).await
    }

    /// Suggested questions for `context`, or for the database as a whole when
    /// `context` is empty.
    pub async fn query_suggestions(&self, context: &str) -> Vec<String> {
        let context = if context.is_empty() {
            match self.repository.statistics().await {
                Ok(stats) => statistics_context(&stats),
                Err(e) => {
                    error!("Failed to load statistics for suggestions: {}", e);
                    return fallback_suggestions();
                }
            }
        } else {
            context.to_string()
        };

        self.inference.suggest_related(&context).await
    }

    /// Statistics with a narrative analysis, key insights and recommended
    /// queries. Degrades field by field instead of failing.
    pub async fn database_summary(&self) -> DatabaseSummary {
        let statistics = match self.repository.statistics().await {
            Ok(stats) => stats,
            Err(e) => return degraded_summary(&e),
        };

        let stats_json = serde_json::to_string_pretty(&statistics).unwrap_or_default();

        let analysis = self
            .inference
            .explain(&stats_json, "General statistics of the Sage 200 business database")
            .await;

        let insights = self
            .inference
            .ask(&format!(
                "Based on these Sage 200 statistics: {}, give 3-5 key insights for business \
                 management. Reply only with the insights, one per line, without numbering.",
                stats_json
            ))
            .await;

        let recommended_queries = self.query_suggestions("").await;

        info!("Database summary generated.");
        DatabaseSummary {
            statistics,
            analysis,
            key_insights: response_lines(&insights, MAX_INSIGHTS),
            recommended_queries,
        }
    }

    /// Shared tail of both query paths once execution succeeded.
    async fn describe_rows(
        &self,
        sql: String,
        rows: Vec<DataRow>,
        context: ExecutionContext<'_>,
    ) -> QueryResult {
        let record_count = rows.len();

        let explanation = if rows.is_empty() {
            context.empty_message.to_string()
        } else {
            let sample = &rows[..record_count.min(EXPLANATION_SAMPLE_ROWS)];
            let sample_json = serde_json::to_string_pretty(sample).unwrap_or_default();
            self.inference.explain(&sample_json, &context.caption).await
        };

        let suggestions = self.inference.suggest_related(&context.suggestion_seed).await;

        QueryResult {
            success: true,
            error: String::new(),
            rows,
            sql,
            explanation,
            record_count,
            elapsed: Default::default(),
            suggestions,
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Splits a model response into at most `limit` trimmed, non-empty lines.
pub fn response_lines(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn statistics_context(stats: &DatabaseStatistics) -> String {
    format!(
        "Database with {} receipts, {} suppliers, {} articles",
        stats.total_headers, stats.active_suppliers, stats.active_articles
    )
}

fn fallback_suggestions() -> Vec<String> {
    FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

fn degraded_summary(cause: &PortError) -> DatabaseSummary {
    error!("Failed to generate database summary: {}", cause);
    DatabaseSummary {
        statistics: DatabaseStatistics::default(),
        analysis: ANALYSIS_UNAVAILABLE.to_string(),
        key_insights: vec![INSIGHTS_UNAVAILABLE.to_string()],
        recommended_queries: vec![RECOMMENDATIONS_UNAVAILABLE.to_string()],
    }
}
