use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::recipe::{RecipeIngredientRow, SourceType};

/// Output shape of a checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistView {
    #[default]
    BySupplier,
    BySector,
    ByRecipe,
}

/// Whether quantities are summed or suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityMode {
    #[default]
    WithQty,
    IngredientsOnly,
}

impl QuantityMode {
    pub fn with_quantities(&self) -> bool {
        matches!(self, QuantityMode::WithQty)
    }
}

/// Supplier-aggregated checklist row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRow {
    pub supplier: String,
    pub supplier_code: Option<String>,
    pub ingredient: String,
    /// Empty in `ingredients_only` mode
    pub unit: String,
    /// Formatted sum, empty in `ingredients_only` mode
    pub quantity_total: String,
    pub source_type: SourceType,
    pub source_recipe_title: Option<String>,
}

/// Sector-aggregated checklist row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorRow {
    pub section: String,
    pub ingredient: String,
    pub supplier: String,
    pub supplier_code: Option<String>,
    pub unit: String,
    pub quantity_total: String,
}

/// Recipe rows sharing a display title, one per service date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeGroup {
    pub title: String,
    pub rows: Vec<RecipeIngredientRow>,
}

/// Aggregated rows in one of the three view shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AggregatedRows {
    BySupplier(Vec<SupplierRow>),
    BySector(Vec<SectorRow>),
    ByRecipe(Vec<RecipeGroup>),
}

impl AggregatedRows {
    pub fn view(&self) -> ChecklistView {
        match self {
            AggregatedRows::BySupplier(_) => ChecklistView::BySupplier,
            AggregatedRows::BySector(_) => ChecklistView::BySector,
            AggregatedRows::ByRecipe(_) => ChecklistView::ByRecipe,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AggregatedRows::BySupplier(rows) => rows.len(),
            AggregatedRows::BySector(rows) => rows.len(),
            AggregatedRows::ByRecipe(groups) => groups.iter().map(|g| g.rows.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Operator request for a checklist over a date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistRequest {
    pub site_id: String,
    /// YYYY-MM-DD
    pub start_date: String,
    /// YYYY-MM-DD, inclusive
    pub end_date: String,
    #[serde(default)]
    pub view: ChecklistView,
    #[serde(default)]
    pub quantity_mode: QuantityMode,
    /// Empty means every space
    #[serde(default)]
    pub spaces: Vec<String>,
    /// Empty means every section
    #[serde(default)]
    pub sections: Vec<String>,
}

/// Result of one completed checklist generation
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistReport {
    pub site_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub generation: u64,
    pub view: ChecklistView,
    pub quantity_mode: QuantityMode,
    pub rows: AggregatedRows,
    /// Date-prefixed backend warnings, then aggregation warnings
    pub warnings: Vec<String>,
}
