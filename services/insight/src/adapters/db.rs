//! services/insight/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ErpRepository` port from the `core` crate. It reads the Sage 200
//! purchasing tables from PostgreSQL using `sqlx`.

use crate::adapters::connection::PgConnectionProvider;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use erp_insight_core::domain::{
    Article, DataRow, DatabaseStatistics, ReceiptHeader, ReceiptLine, Supplier,
};
use erp_insight_core::ports::{ErpRepository, PortError, PortResult};
use erp_insight_core::sql_text::like_pattern;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{Column, Connection, FromRow, Postgres, Row, TypeInfo, ValueRef};
use tracing::{error, info};
use uuid::Uuid;

const HEADER_COLUMNS: &str = "Id AS id, NumeroAlbaran AS document_number, \
    CodigoProveedor AS supplier_code, NombreProveedor AS supplier_name, \
    FechaAlbaran AS document_date, FechaRecepcion AS received_at, \
    ImporteTotal AS total_amount, Estado AS status, ReferenciaExterna AS external_reference, \
    Observaciones AS notes, UsuarioCreacion AS created_by, FechaCreacion AS created_at";

const LINE_COLUMNS: &str = "l.Id AS id, l.CabeceraAlbaranId AS header_id, \
    l.NumeroLinea AS line_number, l.CodigoArticulo AS article_code, \
    l.DescripcionArticulo AS article_description, l.Cantidad AS quantity, \
    l.UnidadMedida AS unit_of_measure, l.PrecioUnitario AS unit_price, \
    l.Descuento AS discount_percent, l.ImporteLinea AS line_amount, \
    l.CodigoAlmacen AS warehouse_code, l.NombreAlmacen AS warehouse_name, l.Lote AS lot, \
    l.FechaCaducidad AS expiry_date, l.NumeroSerie AS serial_number, l.Observaciones AS notes";

const SUPPLIER_COLUMNS: &str = "Id AS id, Codigo AS code, Nombre AS name, \
    RazonSocial AS legal_name, NIF AS tax_id, Direccion AS address, Ciudad AS city, \
    CodigoPostal AS postal_code, Provincia AS province, Pais AS country, Telefono AS phone, \
    Email AS email, PersonaContacto AS contact_person, CondicionesPago AS payment_terms, \
    DescuentoHabitual AS default_discount, Activo AS active, FechaAlta AS onboarded_at, \
    Observaciones AS notes";

const ARTICLE_COLUMNS: &str = "Id AS id, Codigo AS code, Descripcion AS description, \
    DescripcionExtendida AS extended_description, Categoria AS category, \
    Subcategoria AS subcategory, UnidadMedida AS unit_of_measure, \
    PrecioCompra AS purchase_price, PrecioVenta AS sale_price, StockActual AS stock_current, \
    StockMinimo AS stock_min, StockMaximo AS stock_max, Peso AS weight, Volumen AS volume, \
    CodigoBarras AS barcode, Ubicacion AS location, Activo AS active, \
    ControlLotes AS lot_controlled, NumeroSerie AS serial_controlled, \
    FechaAlta AS onboarded_at, Observaciones AS notes";

/// Ties on the busiest supplier or article resolve to the lowest code.
const STATISTICS_SQL: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM CabeceraAlbaranProveedor) AS total_headers,
        (SELECT COUNT(*) FROM LineasAlbaranProveedor) AS total_lines,
        (SELECT COUNT(*) FROM Proveedor WHERE Activo) AS active_suppliers,
        (SELECT COUNT(*) FROM Articulo WHERE Activo) AS active_articles,
        (SELECT COALESCE(SUM(ImporteTotal), 0) FROM CabeceraAlbaranProveedor) AS total_amount,
        (SELECT MAX(FechaAlbaran) FROM CabeceraAlbaranProveedor) AS latest_header_date,
        (SELECT NombreProveedor FROM CabeceraAlbaranProveedor
         GROUP BY CodigoProveedor, NombreProveedor
         ORDER BY COUNT(*) DESC, CodigoProveedor ASC, NombreProveedor ASC
         LIMIT 1) AS most_active_supplier,
        (SELECT DescripcionArticulo FROM LineasAlbaranProveedor
         GROUP BY CodigoArticulo, DescripcionArticulo
         ORDER BY SUM(Cantidad) DESC, CodigoArticulo ASC, DescripcionArticulo ASC
         LIMIT 1) AS most_moved_article
"#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ErpRepository` port.
#[derive(Clone)]
pub struct ErpDbAdapter {
    provider: PgConnectionProvider,
    read_only: bool,
}

impl ErpDbAdapter {
    /// Creates a new `ErpDbAdapter`.
    ///
    /// With `read_only` set, arbitrary SQL runs inside a read-only transaction
    /// that is always rolled back.
    pub fn new(provider: PgConnectionProvider, read_only: bool) -> Self {
        Self {
            provider,
            read_only,
        }
    }

    async fn fetch_all<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Vec<T>, sqlx::Error>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let mut conn = self.provider.open_connection().await?;
        query.fetch_all(&mut *conn).await
    }

    async fn fetch_optional<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Option<T>, sqlx::Error>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let mut conn = self.provider.open_connection().await?;
        query.fetch_optional(&mut *conn).await
    }

    async fn fetch_dynamic(&self, sql: &str) -> Result<Vec<PgRow>, sqlx::Error> {
        let mut conn = self.provider.open_connection().await?;
        if !self.read_only {
            return sqlx::query(sql).fetch_all(&mut *conn).await;
        }

        let mut tx = conn.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        let rows = sqlx::query(sql).fetch_all(&mut *tx).await;
        tx.rollback().await?;
        rows
    }
}

/// Logs a failed query and converts it for the port boundary.
fn db_failure(context: String, e: sqlx::Error) -> PortError {
    error!("{}: {}", context, e);
    PortError::Database(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct HeaderRecord {
    id: i32,
    document_number: String,
    supplier_code: String,
    supplier_name: String,
    document_date: NaiveDateTime,
    received_at: Option<NaiveDateTime>,
    total_amount: Decimal,
    status: String,
    external_reference: Option<String>,
    notes: Option<String>,
    created_by: String,
    created_at: NaiveDateTime,
}
impl HeaderRecord {
    fn to_domain(self) -> ReceiptHeader {
        ReceiptHeader {
            id: self.id,
            document_number: self.document_number,
            supplier_code: self.supplier_code,
            supplier_name: self.supplier_name,
            document_date: self.document_date,
            received_at: self.received_at,
            total_amount: self.total_amount,
            status: self.status,
            external_reference: self.external_reference,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            lines: Vec::new(),
        }
    }
}

#[derive(FromRow)]
struct LineRecord {
    id: i32,
    header_id: i32,
    line_number: i32,
    article_code: String,
    article_description: String,
    quantity: Decimal,
    unit_of_measure: String,
    unit_price: Decimal,
    discount_percent: Decimal,
    line_amount: Decimal,
    warehouse_code: Option<String>,
    warehouse_name: Option<String>,
    lot: Option<String>,
    expiry_date: Option<NaiveDateTime>,
    serial_number: Option<String>,
    notes: Option<String>,
}
impl LineRecord {
    fn to_domain(self) -> ReceiptLine {
        ReceiptLine {
            id: self.id,
            header_id: self.header_id,
            line_number: self.line_number,
            article_code: self.article_code,
            article_description: self.article_description,
            quantity: self.quantity,
            unit_of_measure: self.unit_of_measure,
            unit_price: self.unit_price,
            discount_percent: self.discount_percent,
            line_amount: self.line_amount,
            warehouse_code: self.warehouse_code,
            warehouse_name: self.warehouse_name,
            lot: self.lot,
            expiry_date: self.expiry_date,
            serial_number: self.serial_number,
            notes: self.notes,
        }
    }
}

#[derive(FromRow)]
struct SupplierRecord {
    id: i32,
    code: String,
    name: String,
    legal_name: String,
    tax_id: String,
    address: String,
    city: String,
    postal_code: String,
    province: String,
    country: String,
    phone: Option<String>,
    email: Option<String>,
    contact_person: Option<String>,
    payment_terms: Option<String>,
    default_discount: Decimal,
    active: bool,
    onboarded_at: NaiveDateTime,
    notes: Option<String>,
}
impl SupplierRecord {
    fn to_domain(self) -> Supplier {
        Supplier {
            id: self.id,
            code: self.code,
            name: self.name,
            legal_name: self.legal_name,
            tax_id: self.tax_id,
            address: self.address,
            city: self.city,
            postal_code: self.postal_code,
            province: self.province,
            country: self.country,
            phone: self.phone,
            email: self.email,
            contact_person: self.contact_person,
            payment_terms: self.payment_terms,
            default_discount: self.default_discount,
            active: self.active,
            onboarded_at: self.onboarded_at,
            notes: self.notes,
        }
    }
}

#[derive(FromRow)]
struct ArticleRecord {
    id: i32,
    code: String,
    description: String,
    extended_description: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    unit_of_measure: String,
    purchase_price: Decimal,
    sale_price: Decimal,
    stock_current: Decimal,
    stock_min: Decimal,
    stock_max: Decimal,
    weight: Option<Decimal>,
    volume: Option<Decimal>,
    barcode: Option<String>,
    location: Option<String>,
    active: bool,
    lot_controlled: bool,
    serial_controlled: bool,
    onboarded_at: NaiveDateTime,
    notes: Option<String>,
}
impl ArticleRecord {
    fn to_domain(self) -> Article {
        Article {
            id: self.id,
            code: self.code,
            description: self.description,
            extended_description: self.extended_description,
            category: self.category,
            subcategory: self.subcategory,
            unit_of_measure: self.unit_of_measure,
            purchase_price: self.purchase_price,
            sale_price: self.sale_price,
            stock_current: self.stock_current,
            stock_min: self.stock_min,
            stock_max: self.stock_max,
            weight: self.weight,
            volume: self.volume,
            barcode: self.barcode,
            location: self.location,
            active: self.active,
            lot_controlled: self.lot_controlled,
            serial_controlled: self.serial_controlled,
            onboarded_at: self.onboarded_at,
            notes: self.notes,
        }
    }
}

#[derive(FromRow)]
struct StatisticsRecord {
    total_headers: i64,
    total_lines: i64,
    active_suppliers: i64,
    active_articles: i64,
    total_amount: Decimal,
    latest_header_date: Option<NaiveDateTime>,
    most_active_supplier: Option<String>,
    most_moved_article: Option<String>,
}
impl StatisticsRecord {
    fn to_domain(self) -> DatabaseStatistics {
        DatabaseStatistics {
            total_headers: self.total_headers,
            total_lines: self.total_lines,
            active_suppliers: self.active_suppliers,
            active_articles: self.active_articles,
            total_amount: self.total_amount,
            latest_header_date: self.latest_header_date,
            most_active_supplier: self.most_active_supplier,
            most_moved_article: self.most_moved_article,
        }
    }
}

//=========================================================================================
// `ErpRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ErpRepository for ErpDbAdapter {
    async fn list_headers(&self) -> PortResult<Vec<ReceiptHeader>> {
        let sql = format!(
            "SELECT {} FROM CabeceraAlbaranProveedor ORDER BY FechaAlbaran DESC",
            HEADER_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, HeaderRecord>(&sql))
            .await
            .map_err(|e| db_failure("Failed to list receipt headers".to_string(), e))?;

        info!("Fetched {} receipt headers", records.len());
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_header(&self, id: i32) -> PortResult<Option<ReceiptHeader>> {
        let sql = format!(
            "SELECT {} FROM CabeceraAlbaranProveedor WHERE Id = $1",
            HEADER_COLUMNS
        );
        let record = self
            .fetch_optional(sqlx::query_as::<_, HeaderRecord>(&sql).bind(id))
            .await
            .map_err(|e| db_failure(format!("Failed to fetch receipt header {}", id), e))?;

        let Some(record) = record else {
            info!("Receipt header {} not found", id);
            return Ok(None);
        };

        let mut header = record.to_domain();
        header.lines = self.list_lines(id).await?;
        info!("Fetched receipt header {} with {} lines", id, header.lines.len());
        Ok(Some(header))
    }

    async fn list_headers_by_supplier(&self, supplier_code: &str) -> PortResult<Vec<ReceiptHeader>> {
        let sql = format!(
            "SELECT {} FROM CabeceraAlbaranProveedor WHERE CodigoProveedor = $1 \
             ORDER BY FechaAlbaran DESC",
            HEADER_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, HeaderRecord>(&sql).bind(supplier_code))
            .await
            .map_err(|e| {
                db_failure(
                    format!("Failed to list receipt headers for supplier {}", supplier_code),
                    e,
                )
            })?;

        info!(
            "Fetched {} receipt headers for supplier {}",
            records.len(),
            supplier_code
        );
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_headers_by_date(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> PortResult<Vec<ReceiptHeader>> {
        let sql = format!(
            "SELECT {} FROM CabeceraAlbaranProveedor WHERE FechaAlbaran BETWEEN $1 AND $2 \
             ORDER BY FechaAlbaran DESC",
            HEADER_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, HeaderRecord>(&sql).bind(from).bind(to))
            .await
            .map_err(|e| db_failure("Failed to list receipt headers by date".to_string(), e))?;

        info!(
            "Fetched {} receipt headers between {} and {}",
            records.len(),
            from.date(),
            to.date()
        );
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_lines(&self, header_id: i32) -> PortResult<Vec<ReceiptLine>> {
        let sql = format!(
            "SELECT {} FROM LineasAlbaranProveedor l WHERE l.CabeceraAlbaranId = $1 \
             ORDER BY l.NumeroLinea",
            LINE_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, LineRecord>(&sql).bind(header_id))
            .await
            .map_err(|e| {
                db_failure(format!("Failed to list lines of receipt {}", header_id), e)
            })?;

        info!("Fetched {} lines for receipt {}", records.len(), header_id);
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_lines_by_article(&self, article_code: &str) -> PortResult<Vec<ReceiptLine>> {
        let sql = format!(
            "SELECT {} FROM LineasAlbaranProveedor l \
             INNER JOIN CabeceraAlbaranProveedor c ON l.CabeceraAlbaranId = c.Id \
             WHERE l.CodigoArticulo = $1 \
             ORDER BY c.FechaAlbaran DESC, l.NumeroLinea",
            LINE_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, LineRecord>(&sql).bind(article_code))
            .await
            .map_err(|e| {
                db_failure(format!("Failed to list lines for article {}", article_code), e)
            })?;

        info!("Fetched {} lines for article {}", records.len(), article_code);
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_suppliers(&self) -> PortResult<Vec<Supplier>> {
        let sql = format!(
            "SELECT {} FROM Proveedor WHERE Activo ORDER BY Nombre",
            SUPPLIER_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, SupplierRecord>(&sql))
            .await
            .map_err(|e| db_failure("Failed to list suppliers".to_string(), e))?;

        info!("Fetched {} suppliers", records.len());
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_supplier(&self, code: &str) -> PortResult<Option<Supplier>> {
        let sql = format!("SELECT {} FROM Proveedor WHERE Codigo = $1", SUPPLIER_COLUMNS);
        let record = self
            .fetch_optional(sqlx::query_as::<_, SupplierRecord>(&sql).bind(code))
            .await
            .map_err(|e| db_failure(format!("Failed to fetch supplier {}", code), e))?;

        info!("Fetched supplier {}", code);
        Ok(record.map(|r| r.to_domain()))
    }

    async fn search_suppliers(&self, name: &str) -> PortResult<Vec<Supplier>> {
        let sql = format!(
            "SELECT {} FROM Proveedor WHERE Nombre ILIKE $1 AND Activo ORDER BY Nombre",
            SUPPLIER_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, SupplierRecord>(&sql).bind(like_pattern(name)))
            .await
            .map_err(|e| db_failure(format!("Failed to search suppliers for '{}'", name), e))?;

        info!("Found {} suppliers matching '{}'", records.len(), name);
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_articles(&self) -> PortResult<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM Articulo WHERE Activo ORDER BY Descripcion",
            ARTICLE_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, ArticleRecord>(&sql))
            .await
            .map_err(|e| db_failure("Failed to list articles".to_string(), e))?;

        info!("Fetched {} articles", records.len());
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_article(&self, code: &str) -> PortResult<Option<Article>> {
        let sql = format!("SELECT {} FROM Articulo WHERE Codigo = $1", ARTICLE_COLUMNS);
        let record = self
            .fetch_optional(sqlx::query_as::<_, ArticleRecord>(&sql).bind(code))
            .await
            .map_err(|e| db_failure(format!("Failed to fetch article {}", code), e))?;

        info!("Fetched article {}", code);
        Ok(record.map(|r| r.to_domain()))
    }

    async fn search_articles(&self, description: &str) -> PortResult<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM Articulo \
             WHERE (Descripcion ILIKE $1 OR DescripcionExtendida ILIKE $1) AND Activo \
             ORDER BY Descripcion",
            ARTICLE_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, ArticleRecord>(&sql).bind(like_pattern(description)))
            .await
            .map_err(|e| {
                db_failure(format!("Failed to search articles for '{}'", description), e)
            })?;

        info!("Found {} articles matching '{}'", records.len(), description);
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_articles_by_category(&self, category: &str) -> PortResult<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM Articulo WHERE Categoria = $1 AND Activo ORDER BY Descripcion",
            ARTICLE_COLUMNS
        );
        let records = self
            .fetch_all(sqlx::query_as::<_, ArticleRecord>(&sql).bind(category))
            .await
            .map_err(|e| {
                db_failure(format!("Failed to list articles in category '{}'", category), e)
            })?;

        info!("Fetched {} articles in category '{}'", records.len(), category);
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn execute_arbitrary(&self, sql: &str) -> PortResult<Vec<DataRow>> {
        let rows = self
            .fetch_dynamic(sql)
            .await
            .map_err(|e| db_failure(format!("Failed to execute custom query: {}", sql), e))?;

        info!("Custom query returned {} rows", rows.len());
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn statistics(&self) -> PortResult<DatabaseStatistics> {
        let record = self
            .fetch_optional(sqlx::query_as::<_, StatisticsRecord>(STATISTICS_SQL))
            .await
            .map_err(|e| db_failure("Failed to read database statistics".to_string(), e))?
            .ok_or_else(|| PortError::Unexpected("statistics query returned no row".to_string()))?;

        info!("Database statistics retrieved.");
        Ok(record.to_domain())
    }
}

//=========================================================================================
// Schema-less Row Decoding
//=========================================================================================

/// Converts a row of unknown shape into column/value pairs in select order.
fn decode_row(row: &PgRow) -> DataRow {
    let mut decoded = DataRow::new();
    for column in row.columns() {
        let value = decode_value(row, column.ordinal(), column.type_info().name());
        decoded.insert(column.name().to_string(), value);
    }
    decoded
}

fn decode_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    let value = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::from),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(index).map(Value::from),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::from),
        "NUMERIC" => row.try_get::<Decimal, _>(index).map(decimal_to_json),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|v| Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|v| Value::String(v.to_rfc3339())),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .map(|v| Value::String(v.to_string())),
        "UUID" => row
            .try_get::<Uuid, _>(index)
            .map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index),
        _ => row.try_get::<String, _>(index).map(Value::String),
    };

    value.unwrap_or_else(|_| Value::String(format!("<{}>", type_name)))
}

/// Numerics become JSON numbers when representable, strings otherwise.
fn decimal_to_json(value: Decimal) -> Value {
    let text = value.normalize().to_string();
    match text.parse::<serde_json::Number>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::String(text),
    }
}
