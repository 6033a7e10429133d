//! Repository tests against a live PostgreSQL database.
//!
//! They create the purchasing tables in the database named by `DATABASE_URL`
//! and truncate them between cases, so point it at a scratch database:
//!
//! ```text
//! DATABASE_URL=postgres://postgres@localhost/insight_test cargo test -- --ignored
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use erp_insight_core::ports::{ConnectionService, ErpRepository};
use insight_lib::adapters::{ErpDbAdapter, PgConnectionProvider};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::str::FromStr;
use tokio::sync::{Mutex, MutexGuard};

static DATABASE_LOCK: Mutex<()> = Mutex::const_new(());

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS Proveedor (
    Id SERIAL PRIMARY KEY,
    Codigo VARCHAR(20) NOT NULL,
    Nombre TEXT NOT NULL,
    RazonSocial TEXT NOT NULL DEFAULT '',
    NIF TEXT NOT NULL DEFAULT '',
    Direccion TEXT NOT NULL DEFAULT '',
    Ciudad TEXT NOT NULL DEFAULT '',
    CodigoPostal TEXT NOT NULL DEFAULT '',
    Provincia TEXT NOT NULL DEFAULT '',
    Pais TEXT NOT NULL DEFAULT 'España',
    Telefono TEXT,
    Email TEXT,
    PersonaContacto TEXT,
    CondicionesPago TEXT,
    DescuentoHabitual NUMERIC(5, 2) NOT NULL DEFAULT 0,
    Activo BOOLEAN NOT NULL DEFAULT TRUE,
    FechaAlta TIMESTAMP NOT NULL DEFAULT now(),
    Observaciones TEXT
);
CREATE TABLE IF NOT EXISTS Articulo (
    Id SERIAL PRIMARY KEY,
    Codigo VARCHAR(20) NOT NULL,
    Descripcion TEXT NOT NULL,
    DescripcionExtendida TEXT,
    Categoria TEXT,
    Subcategoria TEXT,
    UnidadMedida TEXT NOT NULL DEFAULT 'UD',
    PrecioCompra NUMERIC(18, 4) NOT NULL DEFAULT 0,
    PrecioVenta NUMERIC(18, 4) NOT NULL DEFAULT 0,
    StockActual NUMERIC(18, 4) NOT NULL DEFAULT 0,
    StockMinimo NUMERIC(18, 4) NOT NULL DEFAULT 0,
    StockMaximo NUMERIC(18, 4) NOT NULL DEFAULT 0,
    Peso NUMERIC(18, 4),
    Volumen NUMERIC(18, 4),
    CodigoBarras TEXT,
    Ubicacion TEXT,
    Activo BOOLEAN NOT NULL DEFAULT TRUE,
    ControlLotes BOOLEAN NOT NULL DEFAULT FALSE,
    NumeroSerie BOOLEAN NOT NULL DEFAULT FALSE,
    FechaAlta TIMESTAMP NOT NULL DEFAULT now(),
    Observaciones TEXT
);
CREATE TABLE IF NOT EXISTS CabeceraAlbaranProveedor (
    Id SERIAL PRIMARY KEY,
    NumeroAlbaran TEXT NOT NULL,
    CodigoProveedor TEXT NOT NULL,
    NombreProveedor TEXT NOT NULL,
    FechaAlbaran TIMESTAMP NOT NULL,
    FechaRecepcion TIMESTAMP,
    ImporteTotal NUMERIC(18, 2) NOT NULL DEFAULT 0,
    Estado TEXT NOT NULL DEFAULT 'Pendiente',
    ReferenciaExterna TEXT,
    Observaciones TEXT,
    UsuarioCreacion TEXT NOT NULL DEFAULT 'tests',
    FechaCreacion TIMESTAMP NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS LineasAlbaranProveedor (
    Id SERIAL PRIMARY KEY,
    CabeceraAlbaranId INTEGER NOT NULL,
    NumeroLinea INTEGER NOT NULL,
    CodigoArticulo TEXT NOT NULL,
    DescripcionArticulo TEXT NOT NULL,
    Cantidad NUMERIC(18, 4) NOT NULL,
    UnidadMedida TEXT NOT NULL DEFAULT 'UD',
    PrecioUnitario NUMERIC(18, 4) NOT NULL DEFAULT 0,
    Descuento NUMERIC(5, 2) NOT NULL DEFAULT 0,
    ImporteLinea NUMERIC(18, 2) NOT NULL DEFAULT 0,
    CodigoAlmacen TEXT,
    NombreAlmacen TEXT,
    Lote TEXT,
    FechaCaducidad TIMESTAMP,
    NumeroSerie TEXT,
    Observaciones TEXT
);
TRUNCATE Proveedor, Articulo, CabeceraAlbaranProveedor, LineasAlbaranProveedor RESTART IDENTITY
"#;

struct TestDatabase {
    pool: PgPool,
    repository: ErpDbAdapter,
    provider: PgConnectionProvider,
    _guard: MutexGuard<'static, ()>,
}

/// Takes the database lock, recreates the tables empty and builds the adapter.
async fn fresh_database(read_only: bool) -> TestDatabase {
    let guard = DATABASE_LOCK.lock().await;
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPool::connect(&url).await.unwrap();
    for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }

    let provider = PgConnectionProvider::new(&url).unwrap();
    TestDatabase {
        pool,
        repository: ErpDbAdapter::new(provider.clone(), read_only),
        provider,
        _guard: guard,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

async fn insert_header(pool: &PgPool, number: &str, supplier: (&str, &str), at: NaiveDateTime, total: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO CabeceraAlbaranProveedor \
         (NumeroAlbaran, CodigoProveedor, NombreProveedor, FechaAlbaran, ImporteTotal) \
         VALUES ($1, $2, $3, $4, $5) RETURNING Id",
    )
    .bind(number)
    .bind(supplier.0)
    .bind(supplier.1)
    .bind(at)
    .bind(Decimal::from_str(total).unwrap())
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn insert_line(pool: &PgPool, header_id: i32, number: i32, article: (&str, &str), quantity: i64) {
    sqlx::query(
        "INSERT INTO LineasAlbaranProveedor \
         (CabeceraAlbaranId, NumeroLinea, CodigoArticulo, DescripcionArticulo, Cantidad) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(header_id)
    .bind(number)
    .bind(article.0)
    .bind(article.1)
    .bind(Decimal::from(quantity))
    .execute(pool)
    .await
    .unwrap();
}

async fn insert_supplier(pool: &PgPool, code: &str, name: &str, active: bool) {
    sqlx::query("INSERT INTO Proveedor (Codigo, Nombre, Activo) VALUES ($1, $2, $3)")
        .bind(code)
        .bind(name)
        .bind(active)
        .execute(pool)
        .await
        .unwrap();
}

async fn insert_article(
    pool: &PgPool,
    code: &str,
    description: (&str, Option<&str>),
    category: Option<&str>,
    active: bool,
) {
    sqlx::query(
        "INSERT INTO Articulo (Codigo, Descripcion, DescripcionExtendida, Categoria, Activo) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(code)
    .bind(description.0)
    .bind(description.1)
    .bind(category)
    .bind(active)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn statistics_on_an_empty_database() {
    let db = fresh_database(false).await;

    let stats = db.repository.statistics().await.unwrap();

    assert_eq!(stats.total_headers, 0);
    assert_eq!(stats.total_lines, 0);
    assert_eq!(stats.active_suppliers, 0);
    assert_eq!(stats.active_articles, 0);
    assert_eq!(stats.total_amount, Decimal::ZERO);
    assert_eq!(stats.latest_header_date, None);
    assert_eq!(stats.most_active_supplier, None);
    assert_eq!(stats.most_moved_article, None);
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn statistics_break_ties_on_the_lowest_code() {
    let db = fresh_database(false).await;
    let first = insert_header(&db.pool, "A-1", ("P200", "Zeta Supplies"), date(2024, 3, 1), "100.00").await;
    let second = insert_header(&db.pool, "A-2", ("P100", "Alpha Metals"), date(2024, 3, 2), "50.50").await;
    insert_line(&db.pool, first, 1, ("ART-9", "Bolts"), 10).await;
    insert_line(&db.pool, second, 1, ("ART-1", "Nuts"), 10).await;
    insert_supplier(&db.pool, "P100", "Alpha Metals", true).await;
    insert_supplier(&db.pool, "P300", "Dormant", false).await;

    let stats = db.repository.statistics().await.unwrap();

    assert_eq!(stats.total_headers, 2);
    assert_eq!(stats.total_lines, 2);
    assert_eq!(stats.active_suppliers, 1);
    assert_eq!(stats.total_amount, Decimal::from_str("150.50").unwrap());
    assert_eq!(stats.latest_header_date, Some(date(2024, 3, 2)));
    assert_eq!(stats.most_active_supplier.as_deref(), Some("Alpha Metals"));
    assert_eq!(stats.most_moved_article.as_deref(), Some("Nuts"));
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn date_range_is_inclusive_and_newest_first() {
    let db = fresh_database(false).await;
    let supplier = ("P001", "Acme");
    insert_header(&db.pool, "JAN-05", supplier, date(2024, 1, 5), "1").await;
    insert_header(&db.pool, "JAN-31", supplier, date(2024, 1, 31), "1").await;
    insert_header(&db.pool, "FEB-01", supplier, date(2024, 2, 1), "1").await;
    insert_header(&db.pool, "JAN-01", supplier, date(2024, 1, 1), "1").await;

    let headers = db
        .repository
        .list_headers_by_date(date(2024, 1, 1), date(2024, 1, 31))
        .await
        .unwrap();

    let numbers: Vec<&str> = headers.iter().map(|h| h.document_number.as_str()).collect();
    assert_eq!(numbers, vec!["JAN-31", "JAN-05", "JAN-01"]);
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn header_lookup_populates_lines_in_order() {
    let db = fresh_database(false).await;
    let id = insert_header(&db.pool, "A-1", ("P001", "Acme"), date(2024, 5, 1), "10").await;
    insert_line(&db.pool, id, 2, ("ART-2", "Washers"), 5).await;
    insert_line(&db.pool, id, 1, ("ART-1", "Nuts"), 3).await;

    let header = db.repository.get_header(id).await.unwrap().unwrap();
    let lines: Vec<i32> = header.lines.iter().map(|l| l.line_number).collect();
    assert_eq!(lines, vec![1, 2]);

    assert!(db.repository.get_header(id + 100).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn supplier_code_lookup_is_exact_and_ignores_active_flag() {
    let db = fresh_database(false).await;
    insert_supplier(&db.pool, "P001", "Old Acme", false).await;
    insert_supplier(&db.pool, "P0010", "Acme Iberia", true).await;

    let supplier = db.repository.get_supplier("P001").await.unwrap().unwrap();
    assert_eq!(supplier.name, "Old Acme");
    assert!(!supplier.active);

    let found = db.repository.search_suppliers("acme").await.unwrap();
    let names: Vec<&str> = found.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Acme Iberia"]);

    assert!(db.repository.search_suppliers("100%").await.unwrap().is_empty());
    assert!(db.repository.search_suppliers("P001").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn arbitrary_queries_keep_column_order_and_nulls() {
    let db = fresh_database(false).await;
    insert_header(&db.pool, "A-1", ("P001", "Acme"), date(2024, 5, 1), "12.50").await;

    let rows = db
        .repository
        .execute_arbitrary(
            "SELECT NumeroAlbaran, ImporteTotal, FechaRecepcion, FechaAlbaran, 1 AS one \
             FROM CabeceraAlbaranProveedor",
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(
        columns,
        vec!["numeroalbaran", "importetotal", "fecharecepcion", "fechaalbaran", "one"]
    );
    assert_eq!(rows[0]["numeroalbaran"], json!("A-1"));
    assert_eq!(rows[0]["importetotal"], json!(12.5));
    assert_eq!(rows[0]["fecharecepcion"], Value::Null);
    assert_eq!(rows[0]["fechaalbaran"], json!("2024-05-01 00:00:00"));
    assert_eq!(rows[0]["one"], json!(1));

    let err = db
        .repository
        .execute_arbitrary("SELECT * FROM NoSuchTable")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nosuchtable"));
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn read_only_mode_rejects_writes() {
    let db = fresh_database(true).await;

    let result = db
        .repository
        .execute_arbitrary("INSERT INTO Proveedor (Codigo, Nombre) VALUES ('X', 'Y') RETURNING Id")
        .await;
    assert!(result.is_err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Proveedor")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);

    let rows = db.repository.execute_arbitrary("SELECT 1 AS ok").await.unwrap();
    assert_eq!(rows[0]["ok"], json!(1));
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn server_info_reports_the_database() {
    let db = fresh_database(false).await;

    assert!(db.provider.test_connection().await);
    let info = db.provider.server_info().await;
    assert!(info.connected);
    assert!(info.server_version.starts_with("PostgreSQL"));
    assert!(!info.database_name.is_empty());
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn header_listings_are_newest_first_and_filter_by_supplier() {
    let db = fresh_database(false).await;
    insert_header(&db.pool, "A-1", ("P001", "Acme"), date(2024, 1, 10), "1").await;
    insert_header(&db.pool, "B-1", ("P002", "Beta"), date(2024, 3, 1), "1").await;
    insert_header(&db.pool, "A-2", ("P001", "Acme"), date(2024, 2, 20), "1").await;

    let all = db.repository.list_headers().await.unwrap();
    let numbers: Vec<&str> = all.iter().map(|h| h.document_number.as_str()).collect();
    assert_eq!(numbers, vec!["B-1", "A-2", "A-1"]);
    assert!(all.iter().all(|h| h.lines.is_empty()));

    let acme = db.repository.list_headers_by_supplier("P001").await.unwrap();
    let numbers: Vec<&str> = acme.iter().map(|h| h.document_number.as_str()).collect();
    assert_eq!(numbers, vec!["A-2", "A-1"]);

    assert!(db.repository.list_headers_by_supplier("p001").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn article_lines_follow_newest_header_then_line_number() {
    let db = fresh_database(false).await;
    let older = insert_header(&db.pool, "OLD", ("P001", "Acme"), date(2024, 1, 1), "1").await;
    let newer = insert_header(&db.pool, "NEW", ("P001", "Acme"), date(2024, 6, 1), "1").await;
    insert_line(&db.pool, older, 1, ("ART-1", "Nuts"), 1).await;
    insert_line(&db.pool, newer, 3, ("ART-1", "Nuts"), 3).await;
    insert_line(&db.pool, newer, 2, ("ART-1", "Nuts"), 2).await;
    insert_line(&db.pool, newer, 1, ("ART-2", "Bolts"), 9).await;

    let lines = db.repository.list_lines_by_article("ART-1").await.unwrap();

    let order: Vec<(i32, i32)> = lines.iter().map(|l| (l.header_id, l.line_number)).collect();
    assert_eq!(order, vec![(newer, 2), (newer, 3), (older, 1)]);
    assert!(lines.iter().all(|l| l.article_code == "ART-1"));
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn supplier_listing_is_active_only_and_sorted_by_name() {
    let db = fresh_database(false).await;
    insert_supplier(&db.pool, "P003", "Zeta Supplies", true).await;
    insert_supplier(&db.pool, "P001", "Alpha Metals", true).await;
    insert_supplier(&db.pool, "P002", "Dormant", false).await;

    let suppliers = db.repository.list_suppliers().await.unwrap();
    let names: Vec<&str> = suppliers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha Metals", "Zeta Supplies"]);

    let exact = db.repository.get_supplier("P001").await.unwrap().unwrap();
    assert_eq!(exact.code, "P001");
    assert!(db.repository.get_supplier("p001").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL DATABASE_URL"]
async fn article_search_covers_both_descriptions_and_skips_inactive() {
    let db = fresh_database(false).await;
    insert_article(&db.pool, "ART-1", ("Hex bolt", None), Some("Fixings"), true).await;
    insert_article(&db.pool, "ART-2", ("Washer", Some("Steel washer for bolts")), Some("Fixings"), true).await;
    insert_article(&db.pool, "ART-3", ("Old bolt", None), Some("Fixings"), false).await;
    insert_article(&db.pool, "ART-4", ("Drill", None), Some("Tools"), true).await;

    let found = db.repository.search_articles("BOLT").await.unwrap();
    let codes: Vec<&str> = found.iter().map(|a| a.code.as_str()).collect();
    assert_eq!(codes, vec!["ART-1", "ART-2"]);

    let fixings = db.repository.list_articles_by_category("Fixings").await.unwrap();
    let codes: Vec<&str> = fixings.iter().map(|a| a.code.as_str()).collect();
    assert_eq!(codes, vec!["ART-1", "ART-2"]);

    let all = db.repository.list_articles().await.unwrap();
    assert_eq!(all.len(), 3);

    let inactive = db.repository.get_article("ART-3").await.unwrap().unwrap();
    assert!(!inactive.active);
}
