use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::wire::{de_opt_string, de_quantity, non_blank};

/// Storage date the backend uses for permanent and weekly entries
pub fn permanent_service_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// How a menu entry is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Permanent,
    DateSpecific,
    RecurringWeekly,
}

impl ScheduleMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "permanent" => Some(ScheduleMode::Permanent),
            "date_specific" => Some(ScheduleMode::DateSpecific),
            "recurring_weekly" => Some(ScheduleMode::RecurringWeekly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleMode::Permanent => "permanent",
            ScheduleMode::DateSpecific => "date_specific",
            ScheduleMode::RecurringWeekly => "recurring_weekly",
        }
    }
}

/// One planned recipe/product inside a menu space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_date: Option<NaiveDate>,
    pub space_key: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub section: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiche_product_id: Option<String>,
    #[serde(default = "default_expected_qty", deserialize_with = "de_quantity")]
    pub expected_qty: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_expected_qty() -> String {
    "1".to_string()
}

fn default_active() -> bool {
    true
}

impl MenuEntry {
    pub fn new(space_key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            service_date: None,
            space_key: space_key.into(),
            section: None,
            title: title.into(),
            fiche_product_id: None,
            expected_qty: default_expected_qty(),
            sort_order: 0,
            is_active: true,
            metadata: Map::new(),
        }
    }

    /// Same logical entry: same space and same title, ignoring case.
    pub fn same_slot(&self, space_key: &str, title: &str) -> bool {
        self.space_key == space_key && self.title.trim().eq_ignore_ascii_case(title.trim())
    }

    /// Explicit `schedule_mode` metadata wins; otherwise entries stored on the
    /// permanent date or in a `carta*` space are permanent.
    pub fn schedule_mode(&self) -> ScheduleMode {
        if let Some(mode) = self
            .metadata
            .get("schedule_mode")
            .and_then(Value::as_str)
            .and_then(ScheduleMode::parse)
        {
            return mode;
        }
        if self.service_date == Some(permanent_service_date()) || self.space_key.starts_with("carta") {
            return ScheduleMode::Permanent;
        }
        ScheduleMode::DateSpecific
    }

    /// Permanent and weekly entries are stored once per site, not per date.
    pub fn is_site_wide(&self) -> bool {
        matches!(
            self.schedule_mode(),
            ScheduleMode::Permanent | ScheduleMode::RecurringWeekly
        )
    }

    /// Pin the resolved schedule into metadata. The sync endpoint only looks at
    /// `schedule_mode` and the space prefix, not at the stored date.
    pub fn with_explicit_schedule(mut self) -> Self {
        let mode = self.schedule_mode();
        self.metadata
            .insert("schedule_mode".to_string(), Value::String(mode.as_str().to_string()));
        self
    }

    pub fn valid_from(&self) -> Option<NaiveDate> {
        self.metadata_date("valid_from")
    }

    pub fn valid_to(&self) -> Option<NaiveDate> {
        self.metadata_date("valid_to")
    }

    /// Monday-based weekday numbers (0..=6) from `metadata.weekdays`
    pub fn weekdays(&self) -> Vec<u32> {
        self.metadata
            .get("weekdays")
            .map(normalize_weekdays)
            .unwrap_or_default()
    }

    /// Whether the entry is served on `date`.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if !self.is_active {
            return false;
        }
        if self.valid_from().is_some_and(|from| date < from) {
            return false;
        }
        if self.valid_to().is_some_and(|to| date > to) {
            return false;
        }
        match self.schedule_mode() {
            ScheduleMode::RecurringWeekly => {
                let weekdays = self.weekdays();
                weekdays.is_empty() || weekdays.contains(&date.weekday().num_days_from_monday())
            }
            ScheduleMode::Permanent => true,
            ScheduleMode::DateSpecific => self.service_date == Some(date),
        }
    }

    fn metadata_date(&self, key: &str) -> Option<NaiveDate> {
        let raw = non_blank(self.metadata.get(key).and_then(Value::as_str))?;
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()
    }
}

/// Accepts a single value or a list of: 0-6 (Monday = 0), 1-7, or English /
/// Italian day names and abbreviations. Result is sorted and deduplicated.
pub fn normalize_weekdays(value: &Value) -> Vec<u32> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Number(_) | Value::String(_) => vec![value],
        _ => return Vec::new(),
    };

    let mut days: Vec<u32> = items.into_iter().filter_map(weekday_of).collect();
    days.sort_unstable();
    days.dedup();
    days
}

fn weekday_of(item: &Value) -> Option<u32> {
    match item {
        Value::Number(n) => n.as_i64().and_then(weekday_from_number),
        Value::String(s) => {
            let raw = s.trim().to_lowercase();
            match raw.parse::<i64>() {
                Ok(n) => weekday_from_number(n),
                Err(_) => weekday_from_name(&raw),
            }
        }
        _ => None,
    }
}

fn weekday_from_number(n: i64) -> Option<u32> {
    match n {
        0..=6 => Some(n as u32),
        7 => Some(6),
        _ => None,
    }
}

fn weekday_from_name(name: &str) -> Option<u32> {
    let day = match name {
        "mon" | "monday" | "lun" | "lunedì" | "lunedi" => 0,
        "tue" | "tuesday" | "mar" | "martedì" | "martedi" => 1,
        "wed" | "wednesday" | "mer" | "mercoledì" | "mercoledi" => 2,
        "thu" | "thursday" | "gio" | "giovedì" | "giovedi" => 3,
        "fri" | "friday" | "ven" | "venerdì" | "venerdi" => 4,
        "sat" | "saturday" | "sab" | "sabato" => 5,
        "sun" | "sunday" | "dom" | "domenica" => 6,
        _ => return None,
    };
    Some(day)
}

/// Relocation of an entry to another space and/or section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMove {
    pub space_key: String,
    pub title: String,
    pub to_space: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub to_section: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

/// Body of the menu-entry sync write
#[derive(Debug, Clone, Serialize)]
pub struct MenuSyncRequest {
    pub site_id: String,
    pub service_date: NaiveDate,
    pub entries: Vec<MenuEntry>,
}

/// Effective entries as returned by both the read and the sync endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuEntriesPayload {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub entries: Vec<MenuEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekdays_accept_numbers_and_names() {
        assert_eq!(normalize_weekdays(&json!(["lun", "Friday", 7, "3"])), vec![0, 3, 4, 6]);
        assert_eq!(normalize_weekdays(&json!("domenica")), vec![6]);
        assert_eq!(normalize_weekdays(&json!([9, "nope"])), Vec::<u32>::new());
        assert_eq!(normalize_weekdays(&json!({"day": 1})), Vec::<u32>::new());
    }

    #[test]
    fn carta_spaces_default_to_permanent() {
        let entry = MenuEntry::new("carta-principale", "Pizza Margherita");
        assert_eq!(entry.schedule_mode(), ScheduleMode::Permanent);
        assert!(entry.applies_on(date(2026, 2, 27)));
    }

    #[test]
    fn date_specific_entry_matches_only_its_date() {
        let mut entry = MenuEntry::new("suggerimenti", "Risotto ai funghi");
        entry.service_date = Some(date(2026, 2, 27));
        assert_eq!(entry.schedule_mode(), ScheduleMode::DateSpecific);
        assert!(entry.applies_on(date(2026, 2, 27)));
        assert!(!entry.applies_on(date(2026, 2, 28)));
    }

    #[test]
    fn recurring_weekly_respects_weekdays_and_validity() {
        let mut entry = MenuEntry::new("suggerimenti", "Zuppa di pesce");
        entry.metadata.insert("schedule_mode".into(), json!("recurring_weekly"));
        entry.metadata.insert("weekdays".into(), json!(["ven"]));
        entry.metadata.insert("valid_to".into(), json!("2026-03-31"));

        // 2026-02-27 is a Friday
        assert!(entry.applies_on(date(2026, 2, 27)));
        assert!(!entry.applies_on(date(2026, 2, 28)));
        assert!(!entry.applies_on(date(2026, 4, 3)));
    }

    #[test]
    fn explicit_schedule_keeps_permanent_storage_date() {
        let mut entry = MenuEntry::new("dolci", "Tiramisu");
        entry.service_date = Some(permanent_service_date());
        let pinned = entry.with_explicit_schedule();
        assert_eq!(pinned.metadata.get("schedule_mode"), Some(&json!("permanent")));
        assert_eq!(pinned.schedule_mode(), ScheduleMode::Permanent);
    }

    #[test]
    fn inactive_entry_never_applies() {
        let mut entry = MenuEntry::new("carta-vini", "Prosecco");
        entry.is_active = false;
        assert!(!entry.applies_on(date(2026, 2, 27)));
    }

    #[test]
    fn decodes_numeric_expected_qty() {
        let entry: MenuEntry = serde_json::from_value(json!({
            "space_key": "carta-principale",
            "title": "Pizza Margherita",
            "expected_qty": 12,
            "section": ""
        }))
        .unwrap();
        assert_eq!(entry.expected_qty, "12");
        assert_eq!(entry.section, None);
        assert!(entry.is_active);
    }
}
