use chrono::NaiveDate;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::MenuEntryStore;
use crate::error::MenuError;
use crate::models::{EntryMove, MenuEntry, MenuSyncRequest};

/// Date-specific entries of one loaded date
#[derive(Debug, Default)]
struct DatedSnapshot {
    entries: Vec<MenuEntry>,
    dirty: bool,
    /// Bumped on every local change
    revision: u64,
    last_sync_error: Option<String>,
}

impl DatedSnapshot {
    fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }
}

/// Local state of one site.
///
/// The backend keeps permanent and weekly entries once per site and rewrites
/// that whole set on every sync, whatever the date. They live in `shared`
/// so every date pushes the same, current set.
#[derive(Debug, Default)]
struct SiteMenu {
    dates: BTreeMap<NaiveDate, DatedSnapshot>,
    shared: Vec<MenuEntry>,
    shared_dirty: bool,
    shared_revision: u64,
}

impl SiteMenu {
    fn entries_on(&self, date: NaiveDate) -> Option<Vec<MenuEntry>> {
        let snapshot = self.dates.get(&date)?;
        Some(self.shared.iter().chain(snapshot.entries.iter()).cloned().collect())
    }

    fn touch_shared(&mut self) {
        self.shared_dirty = true;
        self.shared_revision += 1;
    }

    /// Merge the site-wide entries the server reports as effective on `date`.
    /// Known entries that apply on `date` but are missing from the answer are
    /// gone server-side; the others may simply not apply on that date.
    fn adopt_shared(&mut self, date: NaiveDate, server: Vec<MenuEntry>) {
        self.shared.retain(|local| {
            !local.applies_on(date) || server.iter().any(|s| s.same_slot(&local.space_key, &local.title))
        });
        for entry in server {
            upsert_slot(&mut self.shared, entry);
        }
    }

    /// Remove an entry from whichever set holds it.
    fn take(&mut self, date: NaiveDate, space_key: &str, title: &str) -> Option<MenuEntry> {
        if let Some(snapshot) = self.dates.get_mut(&date) {
            if let Some(entry) = remove_slot(&mut snapshot.entries, space_key, title) {
                snapshot.touch();
                return Some(entry);
            }
        }
        let entry = remove_slot(&mut self.shared, space_key, title)?;
        self.touch_shared();
        Some(entry)
    }

    /// Store an entry in the set its schedule belongs to, replacing the same
    /// slot there and dropping it from the other set.
    fn place(&mut self, date: NaiveDate, mut entry: MenuEntry) {
        if entry.is_site_wide() {
            if let Some(snapshot) = self.dates.get_mut(&date) {
                if remove_slot(&mut snapshot.entries, &entry.space_key, &entry.title).is_some() {
                    snapshot.touch();
                }
            }
            upsert_slot(&mut self.shared, entry);
            self.touch_shared();
            return;
        }

        if remove_slot(&mut self.shared, &entry.space_key, &entry.title).is_some() {
            self.touch_shared();
        }
        entry.service_date = Some(date);
        let snapshot = self.dates.entry(date).or_default();
        upsert_slot(&mut snapshot.entries, entry);
        snapshot.touch();
    }

    /// Apply a successful sync answer. Sets that changed while the push was
    /// in flight keep their local entries and stay dirty.
    fn settle(&mut self, date: NaiveDate, revision: u64, shared_revision: u64, server: Vec<MenuEntry>) {
        let (shared, dated) = split_entries(date, server);
        if self.shared_revision == shared_revision {
            self.adopt_shared(date, shared);
            self.shared_dirty = false;
        }
        if let Some(snapshot) = self.dates.get_mut(&date) {
            snapshot.last_sync_error = None;
            if snapshot.revision == revision {
                snapshot.entries = dated;
                snapshot.dirty = false;
            }
        }
    }
}

/// Split server entries into site-wide and date-specific ones, stamping the
/// latter with `date` when the server left it out.
fn split_entries(date: NaiveDate, entries: Vec<MenuEntry>) -> (Vec<MenuEntry>, Vec<MenuEntry>) {
    let (shared, mut dated): (Vec<MenuEntry>, Vec<MenuEntry>) =
        entries.into_iter().partition(MenuEntry::is_site_wide);
    for entry in &mut dated {
        entry.service_date.get_or_insert(date);
    }
    (shared, dated)
}

fn upsert_slot(entries: &mut Vec<MenuEntry>, entry: MenuEntry) {
    match entries
        .iter()
        .position(|existing| existing.same_slot(&entry.space_key, &entry.title))
    {
        Some(index) => entries[index] = entry,
        None => entries.push(entry),
    }
}

fn remove_slot(entries: &mut Vec<MenuEntry>, space_key: &str, title: &str) -> Option<MenuEntry> {
    let index = entries.iter().position(|entry| entry.same_slot(space_key, title))?;
    Some(entries.remove(index))
}

/// Local working copy of planned menu entries, mirrored to the server.
///
/// A date must be loaded with [`MenuRepository::reload`] before it can be
/// edited or synced, since a sync replaces the server's entries for that
/// date and the site's whole permanent set. Edits only touch local state and
/// mark it dirty; [`MenuRepository::sync`] pushes it and reports the outcome.
pub struct MenuRepository {
    store: Arc<dyn MenuEntryStore>,
    sites: DashMap<String, SiteMenu>,
}

impl MenuRepository {
    pub fn new(store: Arc<dyn MenuEntryStore>) -> Self {
        Self {
            store,
            sites: DashMap::new(),
        }
    }

    /// Replace the local entries of `date` with the server's effective ones.
    /// Unsynced date-specific edits for that date are discarded; pending
    /// permanent or weekly edits are kept.
    pub async fn reload(&self, site_id: &str, date: NaiveDate) -> Result<Vec<MenuEntry>, MenuError> {
        let payload = self.store.load_entries(site_id, date).await?;
        tracing::info!("Reloaded {} menu entries for site {} on {}", payload.entries.len(), site_id, date);

        let (shared, dated) = split_entries(date, payload.entries);
        let mut site = self.sites.entry(site_id.to_string()).or_default();
        if site.shared_dirty {
            tracing::debug!("Keeping pending permanent entries of site {}", site_id);
        } else {
            site.adopt_shared(date, shared);
        }

        let snapshot = site.dates.entry(date).or_default();
        snapshot.entries = dated;
        snapshot.dirty = false;
        snapshot.revision += 1;
        snapshot.last_sync_error = None;

        Ok(site.entries_on(date).unwrap_or_default())
    }

    /// Local entries for `date`, including site-wide ones that do not apply on it.
    pub fn entries(&self, site_id: &str, date: NaiveDate) -> Vec<MenuEntry> {
        self.sites
            .get(site_id)
            .and_then(|site| site.entries_on(date))
            .unwrap_or_default()
    }

    /// Local entries actually served on `date`.
    pub fn entries_served_on(&self, site_id: &str, date: NaiveDate) -> Vec<MenuEntry> {
        self.entries(site_id, date)
            .into_iter()
            .filter(|entry| entry.applies_on(date))
            .collect()
    }

    /// Add an entry, or replace the one in the same space with the same title.
    pub fn upsert_entry(&self, site_id: &str, date: NaiveDate, entry: MenuEntry) -> Result<(), MenuError> {
        let mut site = self.loaded_site(site_id, date)?;
        site.place(date, entry);
        Ok(())
    }

    /// Move an entry to another space/section. Returns `false` when no such entry exists.
    pub fn move_entry(&self, site_id: &str, date: NaiveDate, movement: &EntryMove) -> Result<bool, MenuError> {
        let mut site = self.loaded_site(site_id, date)?;
        let Some(mut entry) = site.take(date, &movement.space_key, &movement.title) else {
            return Ok(false);
        };
        entry.space_key = movement.to_space.clone();
        entry.section = movement.to_section.clone();
        if let Some(order) = movement.sort_order {
            entry.sort_order = order;
        }
        site.place(date, entry);
        Ok(true)
    }

    /// Returns `false` when no such entry exists.
    pub fn remove_entry(&self, site_id: &str, date: NaiveDate, space_key: &str, title: &str) -> Result<bool, MenuError> {
        let mut site = self.loaded_site(site_id, date)?;
        Ok(site.take(date, space_key, title).is_some())
    }

    /// Push the entries of `date` together with the site's permanent set;
    /// returns the number of effective entries the server reports afterwards.
    pub async fn sync(&self, site_id: &str, date: NaiveDate) -> Result<usize, MenuError> {
        let (request, revision, shared_revision) = {
            let site = self.loaded_site(site_id, date)?;
            let Some(snapshot) = site.dates.get(&date) else {
                return Err(not_loaded(site_id, date));
            };
            let request = MenuSyncRequest {
                site_id: site_id.to_string(),
                service_date: date,
                entries: site
                    .shared
                    .iter()
                    .chain(snapshot.entries.iter())
                    .cloned()
                    .map(MenuEntry::with_explicit_schedule)
                    .collect(),
            };
            (request, snapshot.revision, site.shared_revision)
        };

        match self.store.sync_entries(&request).await {
            Ok(payload) => {
                let count = payload.count.max(payload.entries.len());
                if let Some(mut site) = self.sites.get_mut(site_id) {
                    site.settle(date, revision, shared_revision, payload.entries);
                }
                tracing::info!("Synced menu for site {} on {}: {} effective entries", site_id, date, count);
                Ok(count)
            }
            Err(e) => {
                tracing::error!("Menu sync failed for site {} on {}: {}", site_id, date, e);
                if let Some(mut site) = self.sites.get_mut(site_id) {
                    if let Some(snapshot) = site.dates.get_mut(&date) {
                        snapshot.last_sync_error = Some(e.to_string());
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Sync every dirty date of the site, oldest first. Pending permanent
    /// edits with no dirty date go out with the earliest loaded date.
    pub async fn ensure_synced(&self, site_id: &str) -> Result<(), MenuError> {
        let pending: Vec<NaiveDate> = match self.sites.get(site_id) {
            Some(site) => {
                let mut dates: Vec<NaiveDate> = site
                    .dates
                    .iter()
                    .filter(|(_, snapshot)| snapshot.dirty)
                    .map(|(date, _)| *date)
                    .collect();
                if dates.is_empty() && site.shared_dirty {
                    dates.extend(site.dates.keys().next().copied());
                }
                dates
            }
            None => Vec::new(),
        };

        for date in pending {
            self.sync(site_id, date).await?;
        }
        Ok(())
    }

    pub fn is_dirty(&self, site_id: &str) -> bool {
        self.sites
            .get(site_id)
            .is_some_and(|site| site.shared_dirty || site.dates.values().any(|snapshot| snapshot.dirty))
    }

    pub fn last_sync_error(&self, site_id: &str, date: NaiveDate) -> Option<String> {
        self.sites
            .get(site_id)
            .and_then(|site| site.dates.get(&date).and_then(|snapshot| snapshot.last_sync_error.clone()))
    }

    /// Drop all local state of the site.
    pub fn forget_site(&self, site_id: &str) {
        self.sites.remove(site_id);
    }

    fn loaded_site(
        &self,
        site_id: &str,
        date: NaiveDate,
    ) -> Result<RefMut<'_, String, SiteMenu>, MenuError> {
        match self.sites.get_mut(site_id) {
            Some(site) if site.dates.contains_key(&date) => Ok(site),
            _ => Err(not_loaded(site_id, date)),
        }
    }
}

fn not_loaded(site_id: &str, date: NaiveDate) -> MenuError {
    MenuError::NotLoaded {
        site_id: site_id.to_string(),
        date,
    }
}
