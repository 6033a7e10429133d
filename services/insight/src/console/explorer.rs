//! services/insight/src/console/explorer.rs
//!
//! The database explorer: paged listings of receipts, lines, suppliers and
//! articles read through the repository port, plus single-record views.

use crate::console::{
    command::BrowseTarget,
    render::{cell_text, render_table},
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use erp_insight_core::domain::{Article, DataRow, ReceiptHeader, ReceiptLine, Supplier};
use erp_insight_core::ports::{ErpRepository, PortError, PortResult};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Write;
use tracing::{debug, info};

/// Rows shown per explorer page.
pub const PAGE_SIZE: usize = 50;

/// What a browse command produced.
#[derive(Debug)]
pub enum Browsed {
    /// A listing that `:next` and `:prev` can page through.
    Listing(ExplorerPage),
    /// One record, already rendered.
    Record(String),
}

/// A listing held by the session together with the page being shown.
#[derive(Debug, Clone)]
pub struct ExplorerPage {
    title: String,
    rows: Vec<DataRow>,
    page: usize,
}

impl ExplorerPage {
    pub fn new(title: impl Into<String>, rows: Vec<DataRow>) -> Self {
        Self {
            title: title.into(),
            rows,
            page: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Zero-based index of the page being shown.
    pub fn page(&self) -> usize {
        self.page
    }

    /// An empty listing still has one (empty) page.
    pub fn total_pages(&self) -> usize {
        self.rows.len().div_ceil(PAGE_SIZE).max(1)
    }

    /// Moves forward one page. Returns false on the last page.
    pub fn next(&mut self) -> bool {
        if self.page + 1 < self.total_pages() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Moves back one page. Returns false on the first page.
    pub fn previous(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return format!("{}: no records found.\n", self.title);
        }

        let start = self.page * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(self.rows.len());

        let mut out = format!("{}\n", self.title);
        out.push_str(&render_table(&self.rows[start..end], PAGE_SIZE));
        let _ = writeln!(
            out,
            "Page {} of {} ({} row(s))",
            self.page + 1,
            self.total_pages(),
            self.rows.len()
        );
        out
    }
}

/// Reads what `target` names from the repository.
pub async fn browse(repository: &dyn ErpRepository, target: BrowseTarget) -> PortResult<Browsed> {
    debug!("Browsing {:?}", target);
    let browsed = match target {
        BrowseTarget::Headers => {
            let headers = repository.list_headers().await?;
            listing("Receipts", &headers, header_row)
        }
        BrowseTarget::HeadersBySupplier(code) => {
            let headers = repository.list_headers_by_supplier(&code).await?;
            listing(format!("Receipts from supplier {}", code), &headers, header_row)
        }
        BrowseTarget::HeadersByDate(from, to) => {
            let (start, end) = day_range(from, to)?;
            let headers = repository.list_headers_by_date(start, end).await?;
            listing(format!("Receipts from {} to {}", from, to), &headers, header_row)
        }
        BrowseTarget::Header(id) => match repository.get_header(id).await? {
            Some(header) => Browsed::Record(render_header(&header)?),
            None => Browsed::Record(format!("There is no receipt with id {}.\n", id)),
        },
        BrowseTarget::ArticleLines(code) => {
            let lines = repository.list_lines_by_article(&code).await?;
            listing(format!("Receipt lines for article {}", code), &lines, line_row)
        }
        BrowseTarget::Suppliers => {
            let suppliers = repository.list_suppliers().await?;
            listing("Active suppliers", &suppliers, supplier_row)
        }
        BrowseTarget::SupplierSearch(name) => {
            let suppliers = repository.search_suppliers(&name).await?;
            listing(format!("Suppliers matching '{}'", name), &suppliers, supplier_row)
        }
        BrowseTarget::Supplier(code) => match repository.get_supplier(&code).await? {
            Some(supplier) => Browsed::Record(render_record(
                &format!("Supplier {}", supplier.code),
                &supplier,
            )?),
            None => Browsed::Record(format!("There is no supplier with code {}.\n", code)),
        },
        BrowseTarget::Articles => {
            let articles = repository.list_articles().await?;
            listing("Active articles", &articles, article_row)
        }
        BrowseTarget::ArticleSearch(text) => {
            let articles = repository.search_articles(&text).await?;
            listing(format!("Articles matching '{}'", text), &articles, article_row)
        }
        BrowseTarget::Article(code) => match repository.get_article(&code).await? {
            Some(article) => Browsed::Record(render_record(
                &format!("Article {}", article.code),
                &article,
            )?),
            None => Browsed::Record(format!("There is no article with code {}.\n", code)),
        },
        BrowseTarget::Category(category) => {
            let articles = repository.list_articles_by_category(&category).await?;
            listing(format!("Articles in category {}", category), &articles, article_row)
        }
    };

    if let Browsed::Listing(page) = &browsed {
        info!("Explorer listing '{}' holds {} rows", page.title, page.len());
    }
    Ok(browsed)
}

fn listing<T>(title: impl Into<String>, items: &[T], project: fn(&T) -> DataRow) -> Browsed {
    Browsed::Listing(ExplorerPage::new(title, items.iter().map(project).collect()))
}

/// Widens two days to the first and last instant they cover.
fn day_range(from: NaiveDate, to: NaiveDate) -> PortResult<(NaiveDateTime, NaiveDateTime)> {
    let end_of_day = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
        .ok_or_else(|| PortError::Unexpected("invalid end-of-day time".to_string()))?;
    Ok((from.and_time(NaiveTime::MIN), to.and_time(end_of_day)))
}

//=========================================================================================
// Row Projections
//=========================================================================================

fn object(value: Value) -> DataRow {
    match value {
        Value::Object(map) => map,
        _ => DataRow::new(),
    }
}

fn header_row(header: &ReceiptHeader) -> DataRow {
    object(json!({
        "id": header.id,
        "number": header.document_number,
        "date": header.document_date.format("%Y-%m-%d").to_string(),
        "supplier": header.supplier_code,
        "supplier name": header.supplier_name,
        "total": header.total_amount.to_string(),
        "status": header.status,
    }))
}

fn line_row(line: &ReceiptLine) -> DataRow {
    object(json!({
        "receipt": line.header_id,
        "line": line.line_number,
        "article": line.article_code,
        "description": line.article_description,
        "quantity": line.quantity.to_string(),
        "unit": line.unit_of_measure,
        "price": line.unit_price.to_string(),
        "amount": line.line_amount.to_string(),
        "warehouse": line.warehouse_code,
        "lot": line.lot,
    }))
}

fn supplier_row(supplier: &Supplier) -> DataRow {
    object(json!({
        "code": supplier.code,
        "name": supplier.name,
        "city": supplier.city,
        "phone": supplier.phone,
        "email": supplier.email,
        "contact": supplier.contact_person,
    }))
}

fn article_row(article: &Article) -> DataRow {
    object(json!({
        "code": article.code,
        "description": article.description,
        "category": article.category,
        "unit": article.unit_of_measure,
        "purchase price": article.purchase_price.to_string(),
        "stock": article.stock_current.to_string(),
        "location": article.location,
    }))
}

//=========================================================================================
// Single Records
//=========================================================================================

/// Renders every scalar field of `record` as an aligned `name: value` list.
fn render_record<T: Serialize>(title: &str, record: &T) -> PortResult<String> {
    let fields = serde_json::to_value(record)
        .map(object)
        .map_err(|e| PortError::Unexpected(format!("could not render {}: {}", title, e)))?;

    let scalars: Vec<(&String, &Value)> = fields.iter().filter(|(_, v)| !v.is_array()).collect();
    let width = scalars.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);

    let mut out = format!("{}\n", title);
    for (name, value) in scalars {
        let _ = writeln!(out, "  {:<width$}  {}", name, cell_text(Some(value)), width = width);
    }
    Ok(out)
}

fn render_header(header: &ReceiptHeader) -> PortResult<String> {
    let mut out = render_record(&format!("Receipt {}", header.document_number), header)?;
    if header.lines.is_empty() {
        out.push_str("\nNo lines.\n");
    } else {
        let rows: Vec<DataRow> = header.lines.iter().map(line_row).collect();
        let _ = writeln!(out, "\nLines ({})", rows.len());
        out.push_str(&render_table(&rows, rows.len()));
    }
    Ok(out)
}
