pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use crate::config::EngineSettings;
use crate::services::attempt_service::AttemptService;
use crate::services::autosave_service::AutosaveService;
use crate::services::completion_service::CompletionSink;
use crate::services::grading_service::GradingService;
use crate::services::quiz_service::QuizCatalog;
use crate::services::violation_service::ViolationService;
use crate::store::AttemptStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AttemptStore>,
    pub catalog: Arc<dyn QuizCatalog>,
    pub attempt_service: AttemptService,
    pub autosave_service: AutosaveService,
    pub violation_service: ViolationService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn QuizCatalog>,
        completion: Arc<dyn CompletionSink>,
        settings: EngineSettings,
    ) -> Self {
        let grading = GradingService::new(settings.numeric_tolerance);
        let attempt_service = AttemptService::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            completion,
            grading,
            settings.cas_retry_limit,
        );
        let autosave_service = AutosaveService::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            attempt_service.clone(),
            settings.cas_retry_limit,
        );
        let violation_service = ViolationService::new(
            Arc::clone(&store),
            attempt_service.clone(),
            settings.violation_threshold,
            settings.cas_retry_limit,
        );

        Self {
            store,
            catalog,
            attempt_service,
            autosave_service,
            violation_service,
        }
    }
}
