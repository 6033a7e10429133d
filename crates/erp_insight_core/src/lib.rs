pub mod domain;
pub mod history;
pub mod ports;
pub mod query_service;
pub mod sql_text;

pub use domain::{
    Article, DataRow, DatabaseInfo, DatabaseStatistics, DatabaseSummary, ModelInfo, QueryHistoryItem,
    QueryKind, QueryResult, ReceiptHeader, ReceiptLine, Supplier,
};
pub use history::QueryHistory;
pub use ports::{
    ConnectionService, ErpRepository, InferenceService, PortError, PortResult, SQL_ERROR_SENTINEL,
};
pub use query_service::QueryService;
pub use sql_text::clean_sql_response;
