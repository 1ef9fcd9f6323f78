// Client for the cabinet API: HTTP calls, session lifecycle, cached catalog view

mod api;
mod catalog;
mod session;

pub use api::{ApiClient, ClientError};
pub use catalog::{Catalog, ALREADY_IN_CABINET, PASSWORD_MISMATCH};
pub use session::SessionManager;
