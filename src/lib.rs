pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod service;

pub use backend::{BackendClient, IngredientSource, MenuEntryStore};
pub use config::AppConfig;
pub use error::{BackendError, ChecklistError, MenuError};
pub use service::{ChecklistAggregator, ChecklistService, MenuRepository};
