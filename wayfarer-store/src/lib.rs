pub mod app_config;
pub mod database;
pub mod request_repo;

pub use app_config::{AuthConfig, Config, DatabaseConfig, ServerConfig, WorkflowSettings};
pub use database::DbClient;
pub use request_repo::PgRequestStore;
