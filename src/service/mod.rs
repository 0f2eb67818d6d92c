pub mod aggregator;
pub mod checklist;
pub mod date_range;
pub mod export;
pub mod filter;
pub mod menu;
pub mod quantity;

pub use aggregator::{Aggregation, ChecklistAggregator};
pub use checklist::{ChecklistService, FetchedRange};
pub use export::{print_tables, write_csv, PrintTable};
pub use filter::RowFilter;
pub use menu::MenuRepository;
