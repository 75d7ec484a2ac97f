mod handler;
mod model;

pub use handler::{auth_callback, connect, connection_status, disconnect, settings_redirect};
pub use model::{AuthCallbackQuery, ConnectionStatusResponse, DisconnectResponse};
