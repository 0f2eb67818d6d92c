pub mod checklist;
pub mod menu;
pub mod recipe;
mod wire;

pub use checklist::{
    AggregatedRows, ChecklistReport, ChecklistRequest, ChecklistView, QuantityMode, RecipeGroup,
    SectorRow, SupplierRow,
};
pub use menu::{
    normalize_weekdays, permanent_service_date, EntryMove, MenuEntriesPayload, MenuEntry, MenuSyncRequest,
    ScheduleMode,
};
pub use recipe::{
    DayIngredients, IngredientLine, RecipeIngredientRow, SourceType, NO_SECTION, NO_SUPPLIER,
};
