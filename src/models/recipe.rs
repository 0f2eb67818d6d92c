use chrono::NaiveDate;
use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize};

use super::wire::{de_opt_quantity, de_opt_string, de_quantity, de_string};

/// Grouping label for lines without a supplier
pub const NO_SUPPLIER: &str = "Senza fornitore";
/// Grouping label for rows/lines without a section or category
pub const NO_SECTION: &str = "Senza settore";

/// Where an ingredient requirement comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Purchased as-is from a supplier
    #[default]
    Direct,
    /// Required by an internal prep recipe used in the dish
    DerivedRecipe,
}

impl SourceType {
    /// Unknown or missing tags fall back to `Direct`.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("derived_recipe") => SourceType::DerivedRecipe,
            _ => SourceType::Direct,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Direct => "direct",
            SourceType::DerivedRecipe => "derived_recipe",
        }
    }
}

impl<'de> Deserialize<'de> for SourceType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(SourceType::from_wire(raw.as_deref()))
    }
}

/// One ingredient requirement attributable to a recipe row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientLine {
    #[serde(default, deserialize_with = "de_string")]
    pub ingredient: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub supplier: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub supplier_code: Option<String>,
    #[serde(default, deserialize_with = "de_string")]
    pub unit: String,
    #[serde(
        default,
        rename = "qty_total",
        alias = "quantity_total",
        deserialize_with = "de_quantity"
    )]
    pub quantity_total: String,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub source_recipe_title: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub source_recipe_category: Option<String>,
}

impl IngredientLine {
    /// Supplier name, or the "no supplier" sentinel
    pub fn supplier_label(&self) -> &str {
        self.supplier.as_deref().unwrap_or(NO_SUPPLIER)
    }
}

/// Ingredient requirement of one recipe or product on one service date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredientRow {
    /// Stamped from the requested date; the backend does not send it
    #[serde(default)]
    pub service_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_string")]
    pub title: String,
    #[serde(default, deserialize_with = "de_string")]
    pub space: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub section: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub recipe_category: Option<String>,
    #[serde(
        default,
        rename = "expected_qty",
        alias = "expected_quantity",
        deserialize_with = "de_quantity"
    )]
    pub expected_quantity: String,
    #[serde(default, deserialize_with = "de_opt_quantity")]
    pub recipe_portions: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientLine>,
}

impl RecipeIngredientRow {
    /// `recipe_category` overrides `section` when present.
    pub fn category(&self) -> Option<&str> {
        self.recipe_category
            .as_deref()
            .or(self.section.as_deref())
    }

    /// The row's own category plus every distinct prep category among its
    /// lines, in first-seen order.
    pub fn effective_sections(&self) -> IndexSet<&str> {
        let mut sections = IndexSet::new();
        if let Some(category) = self.category() {
            sections.insert(category);
        }
        for line in &self.ingredients {
            if let Some(category) = line.source_recipe_category.as_deref() {
                sections.insert(category);
            }
        }
        sections
    }
}

/// Backend answer for one `(site, date, view=recipe)` read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayIngredients {
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub rows: Vec<RecipeIngredientRow>,
    #[serde(default)]
    pub warnings: Vec<String>,
}
