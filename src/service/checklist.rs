use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::IngredientSource;
use crate::config::ChecklistConfig;
use crate::error::{BackendError, ChecklistError};
use crate::models::{ChecklistReport, ChecklistRequest, RecipeIngredientRow};
use crate::service::aggregator::ChecklistAggregator;
use crate::service::date_range::checked_date_range;
use crate::service::filter::RowFilter;
use crate::service::menu::MenuRepository;

/// Rows and warnings gathered from a whole date range
#[derive(Debug, Clone, Default)]
pub struct FetchedRange {
    /// Calendar order, each row stamped with its service date
    pub rows: Vec<RecipeIngredientRow>,
    /// Backend warnings prefixed with their date, in calendar order
    pub warnings: Vec<String>,
}

/// Checklist generation: range expansion, sequential per-day fetch, filter, aggregation.
pub struct ChecklistService {
    source: Arc<dyn IngredientSource>,
    menus: Arc<MenuRepository>,
    settings: ChecklistConfig,
    fetch_timeout: Duration,
    /// Latest generation started per site
    generations: DashMap<String, u64>,
}

impl ChecklistService {
    pub fn new(
        source: Arc<dyn IngredientSource>,
        menus: Arc<MenuRepository>,
        settings: ChecklistConfig,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            menus,
            settings,
            fetch_timeout,
            generations: DashMap::new(),
        }
    }

    pub fn menus(&self) -> &Arc<MenuRepository> {
        &self.menus
    }

    /// Generate a checklist. Any failure is terminal for this attempt and no
    /// partial rows are returned.
    pub async fn generate(&self, request: &ChecklistRequest) -> Result<ChecklistReport, ChecklistError> {
        let site_id = request.site_id.trim();
        if site_id.is_empty() {
            return Err(ChecklistError::Validation("site_id is required".to_string()));
        }
        let dates = checked_date_range(&request.start_date, &request.end_date, self.settings.max_range_days)?;
        let (Some(&start_date), Some(&end_date)) = (dates.first(), dates.last()) else {
            return Err(ChecklistError::Validation("date range is empty".to_string()));
        };

        let generation = self.begin(site_id);
        tracing::info!(
            "Checklist run {} for site {}: {}..{} ({} days), view={:?}, mode={:?}",
            generation,
            site_id,
            start_date,
            end_date,
            dates.len(),
            request.view,
            request.quantity_mode
        );

        if self.settings.require_synced_menu {
            self.menus.ensure_synced(site_id).await.map_err(|e| ChecklistError::StaleMenu {
                site_id: site_id.to_string(),
                detail: e.to_string(),
            })?;
        }

        let FetchedRange {
            rows: fetched_rows,
            warnings: mut warnings,
        } = self.fetch_range(site_id, &dates).await?;
        let fetched_count = fetched_rows.len();

        let filter = RowFilter::new(&request.spaces, &request.sections);
        let rows = if filter.is_pass_through() {
            fetched_rows
        } else {
            filter.apply(&fetched_rows)
        };
        let aggregation = ChecklistAggregator::aggregate(&rows, request.view, request.quantity_mode);

        self.ensure_latest(site_id, generation)?;

        warnings.extend(aggregation.warnings);

        tracing::info!(
            "Checklist run {} for site {} done: {} of {} recipe rows kept, {} output rows, {} warnings",
            generation,
            site_id,
            rows.len(),
            fetched_count,
            aggregation.rows.len(),
            warnings.len()
        );

        Ok(ChecklistReport {
            site_id: site_id.to_string(),
            start_date,
            end_date,
            generation,
            view: request.view,
            quantity_mode: request.quantity_mode,
            rows: aggregation.rows,
            warnings,
        })
    }

    /// Fetch every date one request at a time, in order. The first failing
    /// day aborts the range and everything gathered so far is dropped.
    pub async fn fetch_range(&self, site_id: &str, dates: &[NaiveDate]) -> Result<FetchedRange, ChecklistError> {
        let mut fetched = FetchedRange::default();

        for &date in dates {
            tracing::debug!("Fetching recipe ingredients for site {} on {}", site_id, date);
            let day = match tokio::time::timeout(self.fetch_timeout, self.source.recipe_rows(site_id, date)).await {
                Ok(Ok(day)) => day,
                Ok(Err(e)) => {
                    tracing::error!("Ingredient fetch for {} failed: {}", date, e);
                    return Err(ChecklistError::from_day_failure(date, e));
                }
                Err(_) => {
                    tracing::error!("Ingredient fetch for {} timed out", date);
                    return Err(ChecklistError::from_day_failure(
                        date,
                        BackendError::Timeout {
                            secs: self.fetch_timeout.as_secs(),
                        },
                    ));
                }
            };

            fetched
                .warnings
                .extend(day.warnings.into_iter().map(|w| format!("{}: {}", date, w)));
            fetched.rows.extend(day.rows.into_iter().map(|row| RecipeIngredientRow {
                service_date: Some(date),
                ..row
            }));
        }

        Ok(fetched)
    }

    /// Supersede any in-flight run for the site (e.g. the operator switched
    /// site) and drop its local menu snapshots. Returns the new generation.
    pub fn reset_site(&self, site_id: &str) -> u64 {
        self.menus.forget_site(site_id);
        self.begin(site_id)
    }

    pub fn current_generation(&self, site_id: &str) -> u64 {
        self.generations.get(site_id).map(|g| *g).unwrap_or(0)
    }

    fn begin(&self, site_id: &str) -> u64 {
        let mut generation = self.generations.entry(site_id.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn ensure_latest(&self, site_id: &str, generation: u64) -> Result<(), ChecklistError> {
        let latest = self.current_generation(site_id);
        if latest != generation {
            tracing::warn!(
                "Discarding checklist run {} for site {}: run {} started since",
                generation,
                site_id,
                latest
            );
            return Err(ChecklistError::Superseded { generation });
        }
        Ok(())
    }
}
