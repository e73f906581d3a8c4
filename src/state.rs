use sqlx::SqlitePool;

use crate::client::PaypalClient;
use crate::events::OrderEvents;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub client: PaypalClient,
    pub events: OrderEvents,
}
