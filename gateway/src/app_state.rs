// =============================================================================
// Gateway application state — the shared handle every axum handler closes
// over (spec §4 process topology)
// =============================================================================

use std::sync::Arc;

use aurora_core::config::Timeouts;
use sqlx::PgPool;

use crate::client_manager::ClientManager;
use crate::data_processor::DataProcessor;
use crate::subscription_manager::SubscriptionManager;
use crate::task_router::TaskRouter;

pub struct AppState {
    pub pool: PgPool,
    pub clients: Arc<ClientManager>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub tasks: Arc<TaskRouter>,
    pub processor: DataProcessor,
    pub timeouts: Timeouts,
}

impl AppState {
    pub fn new(pool: PgPool, timeouts: Timeouts) -> Arc<Self> {
        let clients = Arc::new(ClientManager::new());
        let subscriptions = Arc::new(SubscriptionManager::new(pool.clone()));
        let tasks = Arc::new(TaskRouter::new(timeouts.task_deadline));
        let processor = DataProcessor::new(pool.clone(), clients.clone(), subscriptions.clone(), tasks.clone());

        Arc::new(Self {
            pool,
            clients,
            subscriptions,
            tasks,
            processor,
            timeouts,
        })
    }
}
