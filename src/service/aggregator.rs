use bigdecimal::{BigDecimal, Zero};
use indexmap::{IndexMap, IndexSet};
use std::cmp::Ordering;

use crate::models::{
    AggregatedRows, ChecklistView, IngredientLine, QuantityMode, RecipeGroup, RecipeIngredientRow,
    SectorRow, SourceType, SupplierRow, NO_SECTION,
};
use crate::service::quantity::{format_quantity, QuantityReader};

/// Aggregated rows plus one warning per malformed quantity encountered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub rows: AggregatedRows,
    pub warnings: Vec<String>,
}

/// Folds filtered recipe rows into checklist views.
///
/// Stateless: every call starts from empty accumulators, so the same input
/// and mode always produce the same ordered output. Never fails; an empty
/// input yields empty rows.
pub struct ChecklistAggregator;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SupplierKey {
    supplier: String,
    supplier_code: Option<String>,
    ingredient: String,
    source_type: SourceType,
    source_recipe_title: Option<String>,
    /// Only part of the key in `with_qty` mode
    unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SectorKey {
    section: String,
    ingredient: String,
    supplier: String,
    supplier_code: Option<String>,
    unit: Option<String>,
}

/// Identity of an ingredient line inside one recipe row when quantities are suppressed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LineKey {
    ingredient: String,
    supplier: Option<String>,
    supplier_code: Option<String>,
    source_type: SourceType,
    source_recipe_title: Option<String>,
}

impl ChecklistAggregator {
    pub fn aggregate(rows: &[RecipeIngredientRow], view: ChecklistView, mode: QuantityMode) -> Aggregation {
        match view {
            ChecklistView::BySupplier => Self::by_supplier(rows, mode),
            ChecklistView::BySector => Self::by_sector(rows, mode),
            ChecklistView::ByRecipe => Self::by_recipe(rows, mode),
        }
    }

    /// Group by supplier identity, ingredient and origin; sorted by supplier.
    pub fn by_supplier(rows: &[RecipeIngredientRow], mode: QuantityMode) -> Aggregation {
        let mut reader = QuantityReader::new();
        let mut groups: IndexMap<SupplierKey, BigDecimal> = IndexMap::new();

        for row in rows {
            for line in &row.ingredients {
                let key = SupplierKey {
                    supplier: line.supplier_label().to_string(),
                    supplier_code: line.supplier_code.clone(),
                    ingredient: line.ingredient.clone(),
                    source_type: line.source_type,
                    source_recipe_title: line.source_recipe_title.clone(),
                    unit: mode.with_quantities().then(|| line.unit.clone()),
                };
                let total = groups.entry(key).or_insert_with(BigDecimal::zero);
                if mode.with_quantities() {
                    *total += reader.read(&line.quantity_total, || line_context(row, line));
                }
            }
        }

        let mut output: Vec<SupplierRow> = groups
            .into_iter()
            .map(|(key, total)| SupplierRow {
                supplier: key.supplier,
                supplier_code: key.supplier_code,
                ingredient: key.ingredient,
                unit: key.unit.unwrap_or_default(),
                quantity_total: quantity_cell(mode, &total),
                source_type: key.source_type,
                source_recipe_title: key.source_recipe_title,
            })
            .collect();

        output.sort_by(|a, b| {
            collate(&a.supplier, &b.supplier)
                .then_with(|| collate(&a.ingredient, &b.ingredient))
                .then_with(|| a.source_type.cmp(&b.source_type))
                .then_with(|| collate_opt(&a.source_recipe_title, &b.source_recipe_title))
                .then_with(|| a.unit.cmp(&b.unit))
                .then_with(|| a.supplier_code.cmp(&b.supplier_code))
        });

        Aggregation {
            rows: AggregatedRows::BySupplier(output),
            warnings: reader.into_warnings(),
        }
    }

    /// Group by effective sector: a prep ingredient lands under its prep
    /// recipe's category instead of the consuming row's section.
    pub fn by_sector(rows: &[RecipeIngredientRow], mode: QuantityMode) -> Aggregation {
        let mut reader = QuantityReader::new();
        let mut groups: IndexMap<SectorKey, BigDecimal> = IndexMap::new();

        for row in rows {
            let row_section = row.category().unwrap_or(NO_SECTION);
            for line in &row.ingredients {
                let section = line.source_recipe_category.as_deref().unwrap_or(row_section);
                let key = SectorKey {
                    section: section.to_string(),
                    ingredient: line.ingredient.clone(),
                    supplier: line.supplier_label().to_string(),
                    supplier_code: line.supplier_code.clone(),
                    unit: mode.with_quantities().then(|| line.unit.clone()),
                };
                let total = groups.entry(key).or_insert_with(BigDecimal::zero);
                if mode.with_quantities() {
                    *total += reader.read(&line.quantity_total, || line_context(row, line));
                }
            }
        }

        let mut output: Vec<SectorRow> = groups
            .into_iter()
            .map(|(key, total)| SectorRow {
                section: key.section,
                ingredient: key.ingredient,
                supplier: key.supplier,
                supplier_code: key.supplier_code,
                unit: key.unit.unwrap_or_default(),
                quantity_total: quantity_cell(mode, &total),
            })
            .collect();

        output.sort_by(|a, b| {
            collate(&a.section, &b.section)
                .then_with(|| collate(&a.ingredient, &b.ingredient))
                .then_with(|| collate(&a.supplier, &b.supplier))
                .then_with(|| a.unit.cmp(&b.unit))
                .then_with(|| a.supplier_code.cmp(&b.supplier_code))
        });

        Aggregation {
            rows: AggregatedRows::BySector(output),
            warnings: reader.into_warnings(),
        }
    }

    /// One group per title; each row keeps its own date and ingredient list.
    /// In `ingredients_only` mode duplicate lines inside a row collapse and
    /// lose unit and quantity.
    pub fn by_recipe(rows: &[RecipeIngredientRow], mode: QuantityMode) -> Aggregation {
        let mut reader = QuantityReader::new();
        let mut groups: IndexMap<String, Vec<RecipeIngredientRow>> = IndexMap::new();

        for row in rows {
            let projected = match mode {
                QuantityMode::WithQty => {
                    for line in &row.ingredients {
                        reader.read(&line.quantity_total, || line_context(row, line));
                    }
                    row.clone()
                }
                QuantityMode::IngredientsOnly => dedup_lines(row),
            };
            groups.entry(row.title.clone()).or_default().push(projected);
        }

        let mut output: Vec<RecipeGroup> = groups
            .into_iter()
            .map(|(title, mut rows)| {
                rows.sort_by_key(|row| row.service_date);
                RecipeGroup { title, rows }
            })
            .collect();
        output.sort_by(|a, b| collate(&a.title, &b.title));

        Aggregation {
            rows: AggregatedRows::ByRecipe(output),
            warnings: reader.into_warnings(),
        }
    }
}

fn dedup_lines(row: &RecipeIngredientRow) -> RecipeIngredientRow {
    let mut seen: IndexSet<LineKey> = IndexSet::new();
    let mut lines = Vec::with_capacity(row.ingredients.len());
    for line in &row.ingredients {
        let key = LineKey {
            ingredient: line.ingredient.clone(),
            supplier: line.supplier.clone(),
            supplier_code: line.supplier_code.clone(),
            source_type: line.source_type,
            source_recipe_title: line.source_recipe_title.clone(),
        };
        if seen.insert(key) {
            lines.push(IngredientLine {
                unit: String::new(),
                quantity_total: String::new(),
                ..line.clone()
            });
        }
    }
    RecipeIngredientRow {
        ingredients: lines,
        ..row.clone()
    }
}

fn quantity_cell(mode: QuantityMode, total: &BigDecimal) -> String {
    if mode.with_quantities() {
        format_quantity(total)
    } else {
        String::new()
    }
}

fn line_context(row: &RecipeIngredientRow, line: &IngredientLine) -> String {
    match row.service_date {
        Some(date) => format!("{} '{}': {}", date, row.title, line.ingredient),
        None => format!("'{}': {}", row.title, line.ingredient),
    }
}

/// Case- and accent-insensitive ordering, falling back to byte order so the
/// result stays total and deterministic.
pub fn collate(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn collate_opt(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => collate(a, b),
    }
}

fn collation_key(value: &str) -> String {
    value.trim().chars().flat_map(char::to_lowercase).map(fold_accent).collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}
