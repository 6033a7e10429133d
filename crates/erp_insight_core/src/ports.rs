//! crates/erp_insight_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database driver and inference server.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use crate::domain::{
    Article, DataRow, DatabaseInfo, DatabaseStatistics, ModelInfo, ReceiptHeader, ReceiptLine,
    Supplier,
};

/// Prefix of the value `InferenceService::generate_sql` returns when no SQL
/// could be produced.
pub const SQL_ERROR_SENTINEL: &str = "-- Error";

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Database(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Reachability checks against the relational store.
///
/// Both operations swallow every failure into their return value.
#[async_trait]
pub trait ConnectionService: Send + Sync {
    async fn test_connection(&self) -> bool;

    async fn server_info(&self) -> DatabaseInfo;
}

/// Read access to the ERP tables. Every failure is propagated to the caller.
#[async_trait]
pub trait ErpRepository: Send + Sync {
    // --- Receipt headers ---
    async fn list_headers(&self) -> PortResult<Vec<ReceiptHeader>>;

    /// Returns the header with its lines populated in line-number order.
    async fn get_header(&self, id: i32) -> PortResult<Option<ReceiptHeader>>;

    async fn list_headers_by_supplier(&self, supplier_code: &str) -> PortResult<Vec<ReceiptHeader>>;

    /// Inclusive on both ends, newest first.
    async fn list_headers_by_date(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> PortResult<Vec<ReceiptHeader>>;

    // --- Receipt lines ---
    async fn list_lines(&self, header_id: i32) -> PortResult<Vec<ReceiptLine>>;

    async fn list_lines_by_article(&self, article_code: &str) -> PortResult<Vec<ReceiptLine>>;

    // --- Suppliers ---
    async fn list_suppliers(&self) -> PortResult<Vec<Supplier>>;

    async fn get_supplier(&self, code: &str) -> PortResult<Option<Supplier>>;

    async fn search_suppliers(&self, name: &str) -> PortResult<Vec<Supplier>>;

    // --- Articles ---
    async fn list_articles(&self) -> PortResult<Vec<Article>>;

    async fn get_article(&self, code: &str) -> PortResult<Option<Article>>;

    async fn search_articles(&self, description: &str) -> PortResult<Vec<Article>>;

    async fn list_articles_by_category(&self, category: &str) -> PortResult<Vec<Article>>;

    // --- Free-form ---
    /// Runs caller-supplied SQL verbatim.
    async fn execute_arbitrary(&self, sql: &str) -> PortResult<Vec<DataRow>>;

    async fn statistics(&self) -> PortResult<DatabaseStatistics>;
}

/// Text generation against the local model. Every operation applies its own
/// fallback and never fails.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Answers a general question about the ERP data.
    async fn ask(&self, question: &str) -> String;

    /// Produces SQL for a natural-language request, or a value starting with
    /// [`SQL_ERROR_SENTINEL`].
    async fn generate_sql(&self, request: &str) -> String;

    /// Analyses a block of data described by `context`.
    async fn explain(&self, data: &str, context: &str) -> String;

    /// Up to five follow-up queries related to `current_query`.
    async fn suggest_related(&self, current_query: &str) -> Vec<String>;

    async fn is_available(&self) -> bool;

    async fn model_info(&self) -> ModelInfo;
}
