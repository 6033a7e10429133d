//! services/insight/src/console/state.rs
//!
//! Defines the application state shared by the console session.

use crate::config::Config;
use erp_insight_core::ports::{ConnectionService, ErpRepository, InferenceService};
use erp_insight_core::QueryService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across the Whole Process)
//=========================================================================================

/// The shared application state, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub connection: Arc<dyn ConnectionService>,
    pub repository: Arc<dyn ErpRepository>,
    pub inference: Arc<dyn InferenceService>,
    pub queries: QueryService,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the orchestrator over the given adapters.
    pub fn new(
        connection: Arc<dyn ConnectionService>,
        repository: Arc<dyn ErpRepository>,
        inference: Arc<dyn InferenceService>,
        config: Arc<Config>,
    ) -> Self {
        let queries = QueryService::new(repository.clone(), inference.clone());
        Self {
            connection,
            repository,
            inference,
            queries,
            config,
        }
    }
}
