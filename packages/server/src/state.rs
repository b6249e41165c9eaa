use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::scoring::ScoringEngine;
use crate::views::ViewPropagator;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub engine: Arc<ScoringEngine>,
    pub views: ViewPropagator,
}
