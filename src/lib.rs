use std::sync::Arc;

use config::Config;
use store::LinkStore;
use twitch::TwitchClient;

pub mod config;
pub mod error;
pub mod link;
pub mod middleware;
pub mod routes;
pub mod store;
pub mod twitch;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LinkStore>,
    pub twitch: TwitchClient,
    pub config: Config,
}
