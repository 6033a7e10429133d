//! crates/erp_insight_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! The ERP entities are read-only snapshots of rows owned by the external
//! database; the query types are transient and live for a single session.

use chrono::{DateTime, Local, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// ERP Entities
//=========================================================================================

/// One supplier delivery document (a purchase receipt header).
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptHeader {
    pub id: i32,
    pub document_number: String,
    pub supplier_code: String,
    pub supplier_name: String,
    pub document_date: NaiveDateTime,
    pub received_at: Option<NaiveDateTime>,
    pub total_amount: Decimal,
    pub status: String,
    pub external_reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    /// Only populated when the header is fetched by id.
    pub lines: Vec<ReceiptLine>,
}

/// One article entry within a receipt header.
///
/// `line_amount` is the stored value; it is not recomputed from
/// quantity, unit price and discount.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptLine {
    pub id: i32,
    pub header_id: i32,
    pub line_number: i32,
    pub article_code: String,
    pub article_description: String,
    pub quantity: Decimal,
    pub unit_of_measure: String,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub line_amount: Decimal,
    pub warehouse_code: Option<String>,
    pub warehouse_name: Option<String>,
    pub lot: Option<String>,
    pub expiry_date: Option<NaiveDateTime>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Supplier {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub legal_name: String,
    pub tax_id: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub province: String,
    pub country: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub contact_person: Option<String>,
    pub payment_terms: Option<String>,
    pub default_discount: Decimal,
    pub active: bool,
    pub onboarded_at: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i32,
    pub code: String,
    pub description: String,
    pub extended_description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub unit_of_measure: String,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    pub stock_current: Decimal,
    pub stock_min: Decimal,
    pub stock_max: Decimal,
    pub weight: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub barcode: Option<String>,
    pub location: Option<String>,
    pub active: bool,
    pub lot_controlled: bool,
    pub serial_controlled: bool,
    pub onboarded_at: NaiveDateTime,
    pub notes: Option<String>,
}

/// Aggregate counters over the four ERP tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatabaseStatistics {
    pub total_headers: i64,
    pub total_lines: i64,
    pub active_suppliers: i64,
    pub active_articles: i64,
    pub total_amount: Decimal,
    pub latest_header_date: Option<NaiveDateTime>,
    pub most_active_supplier: Option<String>,
    pub most_moved_article: Option<String>,
}

//=========================================================================================
// Backend Status Descriptors
//=========================================================================================

/// Reachability and identity of the relational store.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub connected: bool,
    pub server_name: String,
    pub database_name: String,
    pub server_version: String,
    pub checked_at: DateTime<Local>,
}

impl DatabaseInfo {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            server_name: String::new(),
            database_name: String::new(),
            server_version: String::new(),
            checked_at: Local::now(),
        }
    }
}

/// Best-effort description of the model served by the inference endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    /// Parameter size reported by the endpoint, empty when unknown.
    pub version: String,
    pub is_loaded: bool,
    pub last_used: DateTime<Local>,
    pub description: String,
}

//=========================================================================================
// Query Results
//=========================================================================================

/// One schema-less result row: column name to value, in select-list order.
pub type DataRow = serde_json::Map<String, serde_json::Value>;

/// How the user phrased a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryKind {
    NaturalLanguage,
    Sql,
}

/// The envelope produced by one orchestrated query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub success: bool,
    pub error: String,
    pub rows: Vec<DataRow>,
    pub sql: String,
    pub explanation: String,
    pub record_count: usize,
    pub elapsed: Duration,
    pub suggestions: Vec<String>,
}

/// Statistics plus the model's narrative about them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseSummary {
    pub statistics: DatabaseStatistics,
    pub analysis: String,
    pub key_insights: Vec<String>,
    pub recommended_queries: Vec<String>,
}

/// A past query kept in the session history.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHistoryItem {
    pub id: Uuid,
    pub query: String,
    pub kind: QueryKind,
    pub executed_at: DateTime<Local>,
    pub success: bool,
    pub record_count: usize,
    pub elapsed: Duration,
}

impl QueryHistoryItem {
    /// Builds a history entry from a finished query.
    pub fn from_result(query: &str, kind: QueryKind, result: &QueryResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.to_string(),
            kind,
            executed_at: Local::now(),
            success: result.success,
            record_count: result.record_count,
            elapsed: result.elapsed,
        }
    }

    /// The first 50 characters of the query followed by an ellipsis.
    pub fn display_text(&self) -> String {
        let head: String = self.query.chars().take(50).collect();
        format!("{}...", head)
    }
}
