//! services/insight/src/adapters/ollama.rs
//!
//! This module contains the adapter for the local Ollama inference server.
//! It implements the `InferenceService` port from the `core` crate over the
//! server's HTTP API.

use crate::config::InferenceSettings;
use async_trait::async_trait;
use chrono::Local;
use erp_insight_core::domain::ModelInfo;
use erp_insight_core::ports::InferenceService;
use erp_insight_core::query_service::response_lines;
use erp_insight_core::sql_text::clean_sql_response;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

const ASK_TEMPLATE: &str = r#"You are an assistant specialised in Sage 200 databases.
Your job is to help users understand and analyse business information.

Context: we are working with a Sage 200 database that contains:
- Supplier delivery notes (CabeceraAlbaranProveedor)
- Delivery note lines (LineasAlbaranProveedor)
- Suppliers (Proveedor)
- Articles (Articulo)

User question: {question}

Give a clear, detailed and useful answer. If the question needs specific data,
explain what kind of query would be required."#;

const SQL_TEMPLATE: &str = r#"You are a SQL expert for Sage 200 databases.
Generate precise SQL queries from natural-language requests.

DATABASE SCHEMA:

CabeceraAlbaranProveedor:
- Id (int): unique identifier
- NumeroAlbaran (string): delivery note number
- CodigoProveedor (string): supplier code
- NombreProveedor (string): supplier name
- FechaAlbaran (datetime): delivery note date
- FechaRecepcion (datetime): reception date
- ImporteTotal (decimal): total amount
- Estado (string): delivery note status
- ReferenciaExterna (string): external reference
- Observaciones (string): notes
- UsuarioCreacion (string): user who created it
- FechaCreacion (datetime): creation date

LineasAlbaranProveedor:
- Id (int): unique identifier
- CabeceraAlbaranId (int): parent delivery note id
- NumeroLinea (int): line number
- CodigoArticulo (string): article code
- DescripcionArticulo (string): article description
- Cantidad (decimal): quantity
- UnidadMedida (string): unit of measure
- PrecioUnitario (decimal): unit price
- Descuento (decimal): discount applied
- ImporteLinea (decimal): line amount
- CodigoAlmacen (string): warehouse code
- NombreAlmacen (string): warehouse name
- Lote (string): product lot
- FechaCaducidad (datetime): expiry date
- NumeroSerie (string): serial number
- Observaciones (string): notes

Proveedor:
- Id, Codigo, Nombre, RazonSocial, NIF, Direccion, Ciudad, CodigoPostal, Provincia, Pais
- Telefono, Email, PersonaContacto, CondicionesPago, DescuentoHabitual, Activo, FechaAlta, Observaciones

Articulo:
- Id, Codigo, Descripcion, DescripcionExtendida, Categoria, Subcategoria, UnidadMedida
- PrecioCompra, PrecioVenta, StockActual, StockMinimo, StockMaximo, Peso, Volumen
- CodigoBarras, Ubicacion, Activo, ControlLotes, NumeroSerie, FechaAlta, Observaciones

SQL DIALECT: the database runs on PostgreSQL.
- Use LIMIT n, never TOP n.
- Use now() and CURRENT_DATE, never GETDATE(); use COALESCE, never ISNULL.
- Activo, ControlLotes and Articulo.NumeroSerie are BOOLEAN: compare with TRUE/FALSE, never 1/0.
- Write table and column names unquoted.

REQUEST: {request}

Generate ONLY the SQL query, with no additional explanation.
Make sure the query is safe and efficient."#;

const EXPLAIN_TEMPLATE: &str = r#"You are a data analyst specialised in business systems.
Your job is to explain complex data simply and clearly.

CONTEXT: {context}

DATA TO EXPLAIN:
{data}

Please:
1. Analyse the data provided
2. Identify important patterns or trends
3. Explain what it means in simple terms
4. Give useful insights for decision making
5. Use language that non-technical users understand"#;

const SUGGEST_TEMPLATE: &str = r#"Based on this query: "{query}"

Generate 5 related queries that could interest a user.
The queries must be specific and useful for business analysis.

Return only the queries, one per line, with no numbering or explanations."#;

pub const ASK_FALLBACK: &str =
    "Sorry, I could not process your question right now. Check that Ollama is running.";
pub const SQL_FALLBACK: &str = "-- Error: the SQL query could not be generated";
pub const EXPLAIN_FALLBACK: &str = "I could not analyse the data right now.";
pub const SUGGEST_FALLBACK: &str = "Suggestions could not be generated right now.";
const EMPTY_RESPONSE: &str = "No response was returned by the model.";

const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, thiserror::Error)]
enum OllamaError {
    #[error("request to the inference server failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("the inference server answered with status {0}")]
    Status(StatusCode),
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Deserialize)]
struct TagDetails {
    #[serde(default)]
    parameter_size: Option<String>,
}

impl TagEntry {
    /// Ollama lists models with their tag, so `llama2` matches `llama2:latest`.
    fn is_model(&self, model: &str) -> bool {
        self.name == model
            || self
                .name
                .strip_prefix(model)
                .is_some_and(|rest| rest.starts_with(':'))
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InferenceService` against an Ollama server.
#[derive(Clone)]
pub struct OllamaInferenceAdapter {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaInferenceAdapter {
    /// Creates a new `OllamaInferenceAdapter` with the configured request timeout.
    pub fn new(settings: &InferenceSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        info!(
            "Inference client initialised for model '{}' at {}",
            settings.model, settings.base_url
        );
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    /// Sends one non-streaming generation request and returns the answer text.
    async fn generate(&self, prompt: &str) -> Result<String, OllamaError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(OllamaError::Status(response.status()));
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed
            .response
            .unwrap_or_else(|| EMPTY_RESPONSE.to_string()))
    }

    /// Fetches the model listing. Any 2xx status counts as reachable.
    async fn fetch_tags(&self) -> Result<reqwest::Response, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(OllamaError::Status(response.status()));
        }
        Ok(response)
    }
}

//=========================================================================================
// `InferenceService` Trait Implementation
//=========================================================================================

#[async_trait]
impl InferenceService for OllamaInferenceAdapter {
    async fn ask(&self, question: &str) -> String {
        let prompt = fill_template(ASK_TEMPLATE, &[("question", question)]);
        match self.generate(&prompt).await {
            Ok(answer) => {
                info!("Question processed by the model.");
                answer
            }
            Err(e) => {
                error!("Failed to process question with the model: {}", e);
                ASK_FALLBACK.to_string()
            }
        }
    }

    async fn generate_sql(&self, request: &str) -> String {
        let prompt = fill_template(SQL_TEMPLATE, &[("request", request)]);
        match self.generate(&prompt).await {
            Ok(raw) => {
                let sql = clean_sql_response(&raw);
                info!("SQL query generated by the model.");
                debug!("Generated SQL: {}", sql);
                sql
            }
            Err(e) => {
                error!("Failed to generate SQL with the model: {}", e);
                SQL_FALLBACK.to_string()
            }
        }
    }

    async fn explain(&self, data: &str, context: &str) -> String {
        let prompt = fill_template(EXPLAIN_TEMPLATE, &[("context", context), ("data", data)]);
        match self.generate(&prompt).await {
            Ok(explanation) => {
                info!("Data explained by the model.");
                explanation
            }
            Err(e) => {
                error!("Failed to explain data with the model: {}", e);
                EXPLAIN_FALLBACK.to_string()
            }
        }
    }

    async fn suggest_related(&self, current_query: &str) -> Vec<String> {
        let prompt = fill_template(SUGGEST_TEMPLATE, &[("query", current_query)]);
        match self.generate(&prompt).await {
            Ok(text) => {
                let suggestions = response_lines(&text, MAX_SUGGESTIONS);
                info!("{} suggestions generated by the model.", suggestions.len());
                suggestions
            }
            Err(e) => {
                error!("Failed to generate suggestions with the model: {}", e);
                vec![SUGGEST_FALLBACK.to_string()]
            }
        }
    }

    async fn is_available(&self) -> bool {
        match self.fetch_tags().await {
            Ok(_) => {
                info!("Ollama status: available");
                true
            }
            Err(OllamaError::Status(status)) => {
                warn!("Ollama status: unavailable ({})", status);
                false
            }
            Err(e) => {
                warn!("Ollama is not reachable: {}", e);
                false
            }
        }
    }

    async fn model_info(&self) -> ModelInfo {
        let mut info = ModelInfo {
            name: self.model.clone(),
            version: String::new(),
            is_loaded: false,
            last_used: Local::now(),
            description: String::new(),
        };

        match self.fetch_tags().await {
            Ok(response) => {
                info.is_loaded = true;
                info.description = format!("Model {} loaded in Ollama", self.model);
                match response.json::<TagsResponse>().await {
                    Ok(tags) => {
                        if let Some(size) = tags
                            .models
                            .into_iter()
                            .find(|m| m.is_model(&self.model))
                            .and_then(|m| m.details)
                            .and_then(|d| d.parameter_size)
                        {
                            info.version = size;
                        }
                    }
                    Err(e) => debug!("Model listing could not be parsed: {}", e),
                }
            }
            Err(OllamaError::Status(status)) => {
                warn!("Model listing answered with status {}", status);
                info.description = "Model not available".to_string();
            }
            Err(e) => {
                error!("Failed to read model information: {}", e);
                info.description = "Error connecting to Ollama".to_string();
            }
        }

        info
    }
}

/// Substitutes each `{name}` placeholder in one pass, so placeholder-like
/// text inside a substituted value is left as it is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        filled.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let placeholder = values.iter().find(|(name, _)| {
            tail.starts_with(name) && tail[name.len()..].starts_with('}')
        });
        match placeholder {
            Some((name, value)) => {
                filled.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                filled.push('{');
                rest = tail;
            }
        }
    }

    filled.push_str(rest);
    filled
}
