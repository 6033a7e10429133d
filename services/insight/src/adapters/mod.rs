pub mod connection;
pub mod db;
pub mod ollama;

pub use connection::PgConnectionProvider;
pub use db::ErpDbAdapter;
pub use ollama::OllamaInferenceAdapter;
