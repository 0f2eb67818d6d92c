//! REST collaborators the checklist engine reads from and writes to.

pub mod client;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::BackendError;
use crate::models::{DayIngredients, MenuEntriesPayload, MenuSyncRequest};

pub use client::BackendClient;

/// Per-day recipe ingredient breakdown (`view=recipe`)
#[async_trait]
pub trait IngredientSource: Send + Sync {
    async fn recipe_rows(&self, site_id: &str, date: NaiveDate) -> Result<DayIngredients, BackendError>;
}

/// Server-side mirror of the planned menu entries
#[async_trait]
pub trait MenuEntryStore: Send + Sync {
    /// Effective entries for `date` (dated, permanent and weekly)
    async fn load_entries(&self, site_id: &str, date: NaiveDate) -> Result<MenuEntriesPayload, BackendError>;

    /// Replace the stored entries of `request.service_date` and the permanent set
    async fn sync_entries(&self, request: &MenuSyncRequest) -> Result<MenuEntriesPayload, BackendError>;
}
