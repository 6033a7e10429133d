//! services/insight/src/console/session.rs
//!
//! The control loop state for one interactive console. It dispatches parsed
//! commands to the orchestrator or the explorer and keeps the history of
//! executed queries along with the explorer listing being paged.

use crate::console::{
    command::{parse_command, BrowseTarget, Command, HELP_TEXT},
    explorer::{browse, Browsed, ExplorerPage},
    render::{render_history, render_list, render_result, render_status, render_summary},
    state::AppState,
};
use erp_insight_core::domain::{QueryHistoryItem, QueryKind};
use erp_insight_core::QueryHistory;
use std::sync::Arc;
use tracing::{info, warn};

/// What the console should do after a line has been handled.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Print the text and wait for the next line.
    Reply(String),
    Quit,
}

/// The state for a single console session.
pub struct ConsoleSession {
    state: Arc<AppState>,
    history: QueryHistory,
    page: Option<ExplorerPage>,
}

impl ConsoleSession {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            history: QueryHistory::default(),
            page: None,
        }
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    /// The explorer listing `:next` and `:prev` move through, if any.
    pub fn explorer_page(&self) -> Option<&ExplorerPage> {
        self.page.as_ref()
    }

    /// Parses and runs one line of input.
    pub async fn handle_line(&mut self, line: &str) -> Outcome {
        match parse_command(line) {
            Ok(command) => self.handle(command).await,
            Err(e) => Outcome::Reply(format!("{}\n", e)),
        }
    }

    pub async fn handle(&mut self, command: Command) -> Outcome {
        let reply = match command {
            Command::Empty => String::new(),
            Command::Quit => return Outcome::Quit,
            Command::Help => format!("{}\n", HELP_TEXT),
            Command::Ask(question) => self.run_query(question, QueryKind::NaturalLanguage).await,
            Command::Sql(sql) => self.run_query(sql, QueryKind::Sql).await,
            Command::Explain(entity) => {
                let explanation = self.state.queries.explain_entity(&entity).await;
                format!("{}\n", explanation.trim())
            }
            Command::Suggest(context) => {
                let suggestions = self.state.queries.query_suggestions(&context).await;
                render_list(&suggestions)
            }
            Command::Summary => {
                let summary = self.state.queries.database_summary().await;
                render_summary(&summary)
            }
            Command::Status => self.status().await,
            Command::History => render_history(&self.history),
            Command::Rerun(position) => match position
                .checked_sub(1)
                .and_then(|index| self.history.get(index))
                .cloned()
            {
                Some(item) => {
                    info!("Re-running history entry {}", position);
                    self.run_query(item.query, item.kind).await
                }
                None => {
                    warn!("History entry {} does not exist", position);
                    format!(
                        "There is no history entry {} ({} recorded).\n",
                        position,
                        self.history.len()
                    )
                }
            },
            Command::Browse(target) => self.browse(target).await,
            Command::NextPage => self.turn_page(ExplorerPage::next, "last"),
            Command::PreviousPage => self.turn_page(ExplorerPage::previous, "first"),
        };
        Outcome::Reply(reply)
    }

    /// Runs a query through the orchestrator and records it in the history.
    async fn run_query(&mut self, query: String, kind: QueryKind) -> String {
        let result = match kind {
            QueryKind::NaturalLanguage => self.state.queries.process_natural_language(&query).await,
            QueryKind::Sql => self.state.queries.execute_sql(&query).await,
        };
        self.history
            .record(QueryHistoryItem::from_result(&query, kind, &result));
        render_result(&result)
    }

    /// Runs an explorer command. A new listing replaces the one being paged.
    async fn browse(&mut self, target: BrowseTarget) -> String {
        match browse(self.state.repository.as_ref(), target).await {
            Ok(Browsed::Listing(page)) => {
                let text = page.render();
                self.page = Some(page);
                text
            }
            Ok(Browsed::Record(text)) => text,
            Err(e) => {
                warn!("Explorer read failed: {}", e);
                format!("Could not read the database: {}\n", e)
            }
        }
    }

    fn turn_page(&mut self, step: fn(&mut ExplorerPage) -> bool, edge: &str) -> String {
        let Some(page) = self.page.as_mut() else {
            return "Nothing to page through. List receipts, suppliers or articles first.\n"
                .to_string();
        };
        if step(page) {
            page.render()
        } else {
            format!("Already on the {} page.\n", edge)
        }
    }

    async fn status(&self) -> String {
        let (database, available, model) = tokio::join!(
            self.state.connection.server_info(),
            self.state.inference.is_available(),
            self.state.inference.model_info(),
        );
        let settings = &self.state.config;
        let mut text = render_status(&database, &model, available);
        text.push_str("Settings\n");
        text.push_str(&format!(
            "  read-only SQL: {}\n  model timeout: {}s\n",
            if settings.database.read_only { "yes" } else { "no" },
            settings.inference.timeout.as_secs()
        ));
        text
    }
}
