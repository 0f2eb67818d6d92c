use std::io::Write;

use indexmap::IndexMap;

use crate::models::{AggregatedRows, IngredientLine, QuantityMode, SectorRow, SourceType, SupplierRow};
use crate::service::quantity::{format_quantity, parse_quantity};

pub const REMAINING_HEADER: &str = "Remaining on hand";
pub const TO_ORDER_HEADER: &str = "To order";

/// One printable group (a supplier, a sector or a recipe title)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Project aggregated rows into printable tables, one per logical group.
///
/// Quantity columns only exist in `with_qty` mode. The two trailing
/// manual-entry columns are always present and always blank.
pub fn print_tables(rows: &AggregatedRows, mode: QuantityMode) -> Vec<PrintTable> {
    match rows {
        AggregatedRows::BySupplier(rows) => supplier_tables(rows, mode),
        AggregatedRows::BySector(rows) => sector_tables(rows, mode),
        AggregatedRows::ByRecipe(groups) => groups
            .iter()
            .map(|group| {
                let body = group
                    .rows
                    .iter()
                    .flat_map(|row| {
                        let date = row.service_date.map(|d| d.to_string()).unwrap_or_default();
                        row.ingredients
                            .iter()
                            .map(move |line| recipe_cells(&date, line, mode))
                    })
                    .collect();
                PrintTable {
                    title: group.title.clone(),
                    headers: headers(&["Date", "Ingredient", "Supplier"], mode),
                    rows: body,
                }
            })
            .collect(),
    }
}

fn supplier_tables(rows: &[SupplierRow], mode: QuantityMode) -> Vec<PrintTable> {
    let mut groups: IndexMap<String, Vec<Vec<String>>> = IndexMap::new();
    for row in rows {
        let title = match &row.supplier_code {
            Some(code) => format!("{} ({})", row.supplier, code),
            None => row.supplier.clone(),
        };
        let origin = match (row.source_type, &row.source_recipe_title) {
            (SourceType::DerivedRecipe, Some(prep)) => format!("Prep: {}", prep),
            (SourceType::DerivedRecipe, None) => "Prep".to_string(),
            (SourceType::Direct, _) => "Direct".to_string(),
        };
        let cells = with_trailing(
            vec![row.ingredient.clone(), origin],
            &row.unit,
            &row.quantity_total,
            mode,
        );
        groups.entry(title).or_default().push(cells);
    }
    into_tables(groups, headers(&["Ingredient", "Origin"], mode))
}

fn sector_tables(rows: &[SectorRow], mode: QuantityMode) -> Vec<PrintTable> {
    let mut groups: IndexMap<String, Vec<Vec<String>>> = IndexMap::new();
    for row in rows {
        let supplier = match &row.supplier_code {
            Some(code) => format!("{} ({})", row.supplier, code),
            None => row.supplier.clone(),
        };
        let cells = with_trailing(
            vec![row.ingredient.clone(), supplier],
            &row.unit,
            &row.quantity_total,
            mode,
        );
        groups.entry(row.section.clone()).or_default().push(cells);
    }
    into_tables(groups, headers(&["Ingredient", "Supplier"], mode))
}

fn recipe_cells(date: &str, line: &IngredientLine, mode: QuantityMode) -> Vec<String> {
    // raw backend text is shown as-is when it does not parse
    let quantity = parse_quantity(&line.quantity_total)
        .map(|q| format_quantity(&q))
        .unwrap_or_else(|| line.quantity_total.clone());
    with_trailing(
        vec![
            date.to_string(),
            line.ingredient.clone(),
            line.supplier_label().to_string(),
        ],
        &line.unit,
        &quantity,
        mode,
    )
}

fn headers(leading: &[&str], mode: QuantityMode) -> Vec<String> {
    let mut headers: Vec<String> = leading.iter().map(|h| h.to_string()).collect();
    if mode.with_quantities() {
        headers.push("Unit".to_string());
        headers.push("Quantity".to_string());
    }
    headers.push(REMAINING_HEADER.to_string());
    headers.push(TO_ORDER_HEADER.to_string());
    headers
}

fn with_trailing(mut cells: Vec<String>, unit: &str, quantity: &str, mode: QuantityMode) -> Vec<String> {
    if mode.with_quantities() {
        cells.push(unit.to_string());
        cells.push(quantity.to_string());
    }
    cells.push(String::new());
    cells.push(String::new());
    cells
}

fn into_tables(groups: IndexMap<String, Vec<Vec<String>>>, headers: Vec<String>) -> Vec<PrintTable> {
    groups
        .into_iter()
        .map(|(title, rows)| PrintTable {
            title,
            headers: headers.clone(),
            rows,
        })
        .collect()
}

/// Write tables as CSV: title row, header row, data rows, blank separator.
pub fn write_csv<W: Write>(tables: &[PrintTable], writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);

    for table in tables {
        writer.write_record([table.title.as_str()])?;
        writer.write_record(&table.headers)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.write_record([""])?;
    }

    writer.flush()?;
    Ok(())
}
