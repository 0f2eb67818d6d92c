use async_trait::async_trait;
use chrono::NaiveDate;
use cookops_checklist::models::{
    permanent_service_date, EntryMove, MenuEntriesPayload, MenuEntry, MenuSyncRequest,
};
use cookops_checklist::{BackendError, MenuEntryStore, MenuError, MenuRepository};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

/// Server-side rows: one permanent/weekly set per site, dated rows per date
#[derive(Default)]
struct Stored {
    permanent: Vec<MenuEntry>,
    dated: HashMap<NaiveDate, Vec<MenuEntry>>,
}

impl Stored {
    fn effective(&self, date: NaiveDate) -> Vec<MenuEntry> {
        self.permanent
            .iter()
            .chain(self.dated.get(&date).into_iter().flatten())
            .filter(|entry| entry.applies_on(date))
            .cloned()
            .collect()
    }
}

/// Backend double with the same replace-on-sync behaviour as the REST endpoint
#[derive(Default)]
struct FakeBackend {
    stored: Mutex<Stored>,
    sent: Mutex<Vec<MenuSyncRequest>>,
    failing: AtomicBool,
    /// When set, the next sync waits on `gate` after recording its request
    hold_next: AtomicBool,
    gate: Notify,
}

impl FakeBackend {
    fn with_permanent(entries: Vec<MenuEntry>) -> Self {
        let backend = Self::default();
        backend.stored.lock().unwrap().permanent = entries
            .into_iter()
            .map(|entry| MenuEntry {
                service_date: Some(permanent_service_date()),
                ..entry
            })
            .collect();
        backend
    }

    fn sent(&self) -> Vec<MenuSyncRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn permanent_titles(&self) -> Vec<String> {
        self.stored
            .lock()
            .unwrap()
            .permanent
            .iter()
            .map(|entry| entry.title.clone())
            .collect()
    }

    fn dated_titles(&self, date: NaiveDate) -> Vec<String> {
        self.stored
            .lock()
            .unwrap()
            .dated
            .get(&date)
            .map(|entries| entries.iter().map(|entry| entry.title.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MenuEntryStore for FakeBackend {
    async fn load_entries(&self, _site_id: &str, date: NaiveDate) -> Result<MenuEntriesPayload, BackendError> {
        let entries = self.stored.lock().unwrap().effective(date);
        Ok(MenuEntriesPayload {
            count: entries.len(),
            entries,
        })
    }

    async fn sync_entries(&self, request: &MenuSyncRequest) -> Result<MenuEntriesPayload, BackendError> {
        self.sent.lock().unwrap().push(request.clone());
        if self.hold_next.swap(false, Ordering::SeqCst) {
            self.gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Timeout { secs: 30 });
        }

        let mut stored = self.stored.lock().unwrap();
        let (permanent, dated): (Vec<MenuEntry>, Vec<MenuEntry>) =
            request.entries.iter().cloned().partition(MenuEntry::is_site_wide);
        stored.permanent = permanent
            .into_iter()
            .map(|entry| MenuEntry {
                service_date: Some(permanent_service_date()),
                ..entry
            })
            .collect();
        stored.dated.insert(
            request.service_date,
            dated
                .into_iter()
                .map(|entry| MenuEntry {
                    service_date: Some(request.service_date),
                    ..entry
                })
                .collect(),
        );
        let entries = stored.effective(request.service_date);
        Ok(MenuEntriesPayload {
            count: entries.len(),
            entries,
        })
    }
}

fn entry(space: &str, title: &str) -> MenuEntry {
    MenuEntry {
        section: Some("Primi".to_string()),
        ..MenuEntry::new(space, title)
    }
}

fn weekly(space: &str, title: &str, weekdays: Value) -> MenuEntry {
    let mut entry = entry(space, title);
    entry
        .metadata
        .insert("schedule_mode".to_string(), json!("recurring_weekly"));
    entry.metadata.insert("weekdays".to_string(), weekdays);
    entry
}

fn titles(entries: &[MenuEntry]) -> Vec<&str> {
    entries.iter().map(|entry| entry.title.as_str()).collect()
}

#[tokio::test]
async fn test_edits_require_loaded_date() {
    let backend = Arc::new(FakeBackend::with_permanent(vec![entry("carta-principale", "Tiramisu")]));
    let menus = MenuRepository::new(backend.clone());
    let day = date("2026-02-27");

    let err = menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Risotto"))
        .unwrap_err();
    assert!(matches!(err, MenuError::NotLoaded { .. }));
    assert!(matches!(
        menus.sync("site-1", day).await,
        Err(MenuError::NotLoaded { .. })
    ));

    menus.reload("site-1", date("2026-02-28")).await.unwrap();
    assert!(matches!(
        menus.remove_entry("site-1", day, "carta-principale", "Tiramisu"),
        Err(MenuError::NotLoaded { .. })
    ));

    assert!(backend.sent().is_empty());
    assert_eq!(backend.permanent_titles(), vec!["Tiramisu"]);
}

#[tokio::test]
async fn test_dated_edit_keeps_permanent_menu() {
    let backend = Arc::new(FakeBackend::with_permanent(vec![
        entry("carta-principale", "Pizza Margherita"),
        entry("carta-principale", "Tiramisu"),
    ]));
    let menus = MenuRepository::new(backend.clone());
    let day = date("2026-02-27");

    menus.reload("site-1", day).await.unwrap();
    menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Risotto"))
        .unwrap();
    menus.ensure_synced("site-1").await.unwrap();

    assert_eq!(backend.permanent_titles(), vec!["Pizza Margherita", "Tiramisu"]);
    assert_eq!(backend.dated_titles(day), vec!["Risotto"]);
    assert_eq!(
        titles(&menus.entries("site-1", day)),
        vec!["Pizza Margherita", "Tiramisu", "Risotto"]
    );
    assert!(!menus.is_dirty("site-1"));
}

#[tokio::test]
async fn test_permanent_edit_survives_later_dates() {
    let backend = Arc::new(FakeBackend::with_permanent(vec![entry("carta-principale", "Pizza Margherita")]));
    let menus = MenuRepository::new(backend.clone());
    let friday = date("2026-02-27");
    let saturday = date("2026-02-28");

    menus.reload("site-1", friday).await.unwrap();
    menus.reload("site-1", saturday).await.unwrap();
    menus
        .upsert_entry("site-1", friday, entry("carta-principale", "Tiramisu"))
        .unwrap();
    menus
        .upsert_entry("site-1", friday, entry("suggerimenti", "Risotto"))
        .unwrap();
    menus
        .upsert_entry("site-1", saturday, entry("suggerimenti", "Lasagna"))
        .unwrap();

    // the permanent edit is visible from every loaded date
    assert_eq!(
        titles(&menus.entries("site-1", saturday)),
        vec!["Pizza Margherita", "Tiramisu", "Lasagna"]
    );

    menus.ensure_synced("site-1").await.unwrap();

    let dates: Vec<NaiveDate> = backend.sent().iter().map(|r| r.service_date).collect();
    assert_eq!(dates, vec![friday, saturday]);
    assert_eq!(backend.permanent_titles(), vec!["Pizza Margherita", "Tiramisu"]);
    assert_eq!(backend.dated_titles(friday), vec!["Risotto"]);
    assert_eq!(backend.dated_titles(saturday), vec!["Lasagna"]);
}

#[tokio::test]
async fn test_permanent_edit_alone_is_synced() {
    let backend = Arc::new(FakeBackend::with_permanent(vec![entry("carta-principale", "Pizza Margherita")]));
    let menus = MenuRepository::new(backend.clone());
    let day = date("2026-02-27");
    menus.reload("site-1", day).await.unwrap();

    assert!(menus
        .remove_entry("site-1", day, "carta-principale", "Pizza Margherita")
        .unwrap());
    assert!(menus.is_dirty("site-1"));
    menus.ensure_synced("site-1").await.unwrap();

    assert_eq!(backend.sent().len(), 1);
    assert!(backend.permanent_titles().is_empty());
    assert!(!menus.is_dirty("site-1"));
}

#[tokio::test]
async fn test_weekly_entry_kept_when_not_served() {
    let backend = Arc::new(FakeBackend::with_permanent(vec![weekly(
        "suggerimenti",
        "Zuppa di pesce",
        json!(["ven"]),
    )]));
    let menus = MenuRepository::new(backend.clone());
    let friday = date("2026-02-27");
    let saturday = date("2026-02-28");

    menus.reload("site-1", friday).await.unwrap();
    let on_saturday = menus.reload("site-1", saturday).await.unwrap();

    // known locally, but not served on Saturday
    assert_eq!(titles(&on_saturday), vec!["Zuppa di pesce"]);
    assert!(menus.entries_served_on("site-1", saturday).is_empty());
    assert_eq!(menus.entries_served_on("site-1", friday).len(), 1);

    menus
        .upsert_entry("site-1", saturday, entry("suggerimenti", "Risotto"))
        .unwrap();
    menus.sync("site-1", saturday).await.unwrap();

    assert_eq!(backend.permanent_titles(), vec!["Zuppa di pesce"]);
    assert_eq!(titles(&menus.entries_served_on("site-1", saturday)), vec!["Risotto"]);
}

#[tokio::test]
async fn test_edit_during_sync_stays_pending() {
    let backend = Arc::new(FakeBackend::default());
    let menus = Arc::new(MenuRepository::new(backend.clone()));
    let day = date("2026-02-27");

    menus.reload("site-1", day).await.unwrap();
    menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Risotto"))
        .unwrap();

    backend.hold_next.store(true, Ordering::SeqCst);
    let in_flight = {
        let menus = menus.clone();
        tokio::spawn(async move { menus.sync("site-1", day).await })
    };
    while backend.sent().is_empty() {
        tokio::task::yield_now().await;
    }

    menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Lasagna"))
        .unwrap();
    backend.gate.notify_one();
    in_flight.await.unwrap().unwrap();

    assert_eq!(titles(&menus.entries("site-1", day)), vec!["Risotto", "Lasagna"]);
    assert!(menus.is_dirty("site-1"));
    assert_eq!(backend.dated_titles(day), vec!["Risotto"]);

    menus.ensure_synced("site-1").await.unwrap();
    assert!(!menus.is_dirty("site-1"));
    assert_eq!(backend.dated_titles(day), vec!["Risotto", "Lasagna"]);
}

#[tokio::test]
async fn test_reload_discards_dated_edits() {
    let backend = Arc::new(FakeBackend::default());
    let menus = MenuRepository::new(backend);
    let day = date("2026-02-27");

    menus.reload("site-1", day).await.unwrap();
    menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Lasagna"))
        .unwrap();
    assert!(menus.is_dirty("site-1"));

    let entries = menus.reload("site-1", day).await.unwrap();
    assert!(entries.is_empty());
    assert!(!menus.is_dirty("site-1"));
    assert!(menus.entries("site-1", day).is_empty());
}

#[tokio::test]
async fn test_upsert_replaces_same_slot() {
    let menus = MenuRepository::new(Arc::new(FakeBackend::default()));
    let day = date("2026-02-27");
    menus.reload("site-1", day).await.unwrap();

    menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Risotto"))
        .unwrap();
    let mut updated = entry("suggerimenti", "risotto ");
    updated.expected_qty = "12".to_string();
    menus.upsert_entry("site-1", day, updated).unwrap();
    menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Lasagna"))
        .unwrap();

    let entries = menus.entries("site-1", day);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].expected_qty, "12");
    assert_eq!(entries[0].service_date, Some(day));
    assert_eq!(entries[1].title, "Lasagna");
}

#[tokio::test]
async fn test_move_and_remove() {
    let menus = MenuRepository::new(Arc::new(FakeBackend::default()));
    let day = date("2026-02-27");
    let next_day = date("2026-02-28");
    menus.reload("site-1", day).await.unwrap();
    menus.reload("site-1", next_day).await.unwrap();
    menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Risotto"))
        .unwrap();
    assert!(menus.entries("site-1", next_day).is_empty());

    let moved = menus
        .move_entry(
            "site-1",
            day,
            &EntryMove {
                space_key: "suggerimenti".to_string(),
                title: "Risotto".to_string(),
                to_space: "carta-principale".to_string(),
                to_section: Some("Primi piatti".to_string()),
                sort_order: Some(3),
            },
        )
        .unwrap();
    assert!(moved);

    // now a permanent entry, shared by every loaded date
    let entries = menus.entries("site-1", next_day);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].space_key, "carta-principale");
    assert_eq!(entries[0].section.as_deref(), Some("Primi piatti"));
    assert_eq!(entries[0].sort_order, 3);

    assert!(!menus
        .remove_entry("site-1", day, "suggerimenti", "Risotto")
        .unwrap());
    assert!(menus
        .remove_entry("site-1", next_day, "carta-principale", "Risotto")
        .unwrap());
    assert!(menus.entries("site-1", day).is_empty());
}

#[tokio::test]
async fn test_sync_pins_schedule() {
    let backend = Arc::new(FakeBackend::default());
    let menus = MenuRepository::new(backend.clone());
    let day = date("2026-02-27");
    menus.reload("site-1", day).await.unwrap();
    menus
        .upsert_entry("site-1", day, entry("carta-principale", "Tiramisu"))
        .unwrap();
    menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Risotto"))
        .unwrap();

    let count = menus.sync("site-1", day).await.unwrap();

    assert_eq!(count, 2);
    assert!(!menus.is_dirty("site-1"));
    let sent = backend.sent();
    let modes: Vec<Option<&Value>> = sent[0]
        .entries
        .iter()
        .map(|e| e.metadata.get("schedule_mode"))
        .collect();
    assert_eq!(modes, vec![Some(&json!("permanent")), Some(&json!("date_specific"))]);
}

#[tokio::test]
async fn test_failed_sync_keeps_edits_pending() {
    let backend = Arc::new(FakeBackend::default());
    let menus = MenuRepository::new(backend.clone());
    let day = date("2026-02-27");
    menus.reload("site-1", day).await.unwrap();
    menus
        .upsert_entry("site-1", day, entry("suggerimenti", "Risotto"))
        .unwrap();
    backend.failing.store(true, Ordering::SeqCst);

    let err = menus.sync("site-1", day).await.unwrap_err();

    assert!(matches!(err, MenuError::Backend(BackendError::Timeout { secs: 30 })));
    assert!(menus.is_dirty("site-1"));
    assert!(menus.last_sync_error("site-1", day).is_some());
    assert_eq!(menus.entries("site-1", day).len(), 1);

    backend.failing.store(false, Ordering::SeqCst);
    menus.ensure_synced("site-1").await.unwrap();
    assert!(!menus.is_dirty("site-1"));
    assert!(menus.last_sync_error("site-1", day).is_none());
    assert_eq!(backend.dated_titles(day), vec!["Risotto"]);
}

#[tokio::test]
async fn test_ensure_synced_only_touches_site() {
    let backend = Arc::new(FakeBackend::default());
    let menus = MenuRepository::new(backend.clone());
    for (site, day) in [("site-1", "2026-03-02"), ("site-1", "2026-02-27"), ("site-2", "2026-02-25")] {
        menus.reload(site, date(day)).await.unwrap();
        menus
            .upsert_entry(site, date(day), entry("suggerimenti", "Gnocchi"))
            .unwrap();
    }

    menus.ensure_synced("site-1").await.unwrap();

    let dates: Vec<NaiveDate> = backend.sent().iter().map(|r| r.service_date).collect();
    assert_eq!(dates, vec![date("2026-02-27"), date("2026-03-02")]);
    assert!(!menus.is_dirty("site-1"));
    assert!(menus.is_dirty("site-2"));
}

#[tokio::test]
async fn test_forget_site_drops_only_that_site() {
    let menus = MenuRepository::new(Arc::new(FakeBackend::default()));
    let day = date("2026-02-27");
    for site in ["site-1", "site-2"] {
        menus.reload(site, day).await.unwrap();
        menus
            .upsert_entry(site, day, entry("suggerimenti", "Risotto"))
            .unwrap();
    }

    menus.forget_site("site-1");

    assert!(menus.entries("site-1", day).is_empty());
    assert!(!menus.is_dirty("site-1"));
    assert_eq!(menus.entries("site-2", day).len(), 1);
    assert!(matches!(
        menus.upsert_entry("site-1", day, entry("suggerimenti", "Lasagna")),
        Err(MenuError::NotLoaded { .. })
    ));
}
