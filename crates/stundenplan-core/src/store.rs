//! Persistence seam
//!
//! The core never owns a database. It reads one consistent [`DomainData`]
//! view and writes schedule entries back through [`ScheduleStore`], whose
//! write methods are each a single transaction. [`MemoryStore`] backs the
//! test suite and small deployments; the production adapter wraps the
//! relational store behind the same trait with serializable isolation.

use tracing::debug;

use crate::{
    ConflictDetector, DomainData, DomainSnapshot, EntryDraft, EntryId, ScheduleEntry,
    ScheduleError,
};

/// Narrow persistence interface used by the core.
pub trait ScheduleStore {
    /// Read-consistent view of the whole domain.
    fn load(&self) -> Result<DomainData, ScheduleError>;

    /// Delete every schedule entry and insert `drafts`, as one transaction.
    /// Returns the inserted entries with their assigned ids.
    fn replace_entries(&mut self, drafts: Vec<EntryDraft>) -> Result<Vec<ScheduleEntry>, ScheduleError>;

    /// Insert `drafts` without touching existing entries, as one
    /// transaction.
    fn append_entries(&mut self, drafts: Vec<EntryDraft>) -> Result<Vec<ScheduleEntry>, ScheduleError>;
}

/// In-memory store. Exclusive access through `&mut self` gives every write
/// the serializable-isolation guarantee the production adapter provides
/// transactionally.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    data: DomainData,
    next_entry_id: EntryId,
}

impl MemoryStore {
    pub fn new(data: DomainData) -> Self {
        let next_entry_id = data.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        Self { data, next_entry_id }
    }

    pub fn data(&self) -> &DomainData {
        &self.data
    }

    fn assign_ids(&mut self, drafts: Vec<EntryDraft>) -> Vec<ScheduleEntry> {
        drafts
            .into_iter()
            .map(|draft| {
                let id = self.next_entry_id;
                self.next_entry_id += 1;
                ScheduleEntry::from_draft(id, draft)
            })
            .collect()
    }
}

impl ScheduleStore for MemoryStore {
    fn load(&self) -> Result<DomainData, ScheduleError> {
        Ok(self.data.clone())
    }

    fn replace_entries(&mut self, drafts: Vec<EntryDraft>) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let inserted = self.assign_ids(drafts);
        debug!(
            cleared = self.data.entries.len(),
            inserted = inserted.len(),
            "replacing schedule entries"
        );
        self.data.entries = inserted.clone();
        Ok(inserted)
    }

    fn append_entries(&mut self, drafts: Vec<EntryDraft>) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let inserted = self.assign_ids(drafts);
        debug!(inserted = inserted.len(), "appending schedule entries");
        self.data.entries.extend(inserted.iter().cloned());
        Ok(inserted)
    }
}

/// Atomic bulk create: every candidate is validated against the persisted
/// entries and against the earlier candidates of the batch; on the first
/// conflict nothing is written.
pub fn create_entries_bulk(
    store: &mut dyn ScheduleStore,
    drafts: Vec<EntryDraft>,
    reference_date: chrono::NaiveDate,
) -> Result<Vec<ScheduleEntry>, ScheduleError> {
    let snapshot = DomainSnapshot::build(store.load()?, reference_date)?;
    let detector = ConflictDetector::new(&snapshot);

    let mut staged = snapshot.entries().to_vec();
    for (offset, draft) in drafts.iter().enumerate() {
        snapshot.check_draft_refs(draft)?;
        let conflicts = detector.validate_candidate(draft, &staged, None);
        if !conflicts.is_empty() {
            return Err(ScheduleError::Conflict(conflicts));
        }
        // Stage with a placeholder id so later candidates see this one
        let staged_id = -(offset as EntryId) - 1;
        staged.push(ScheduleEntry::from_draft(staged_id, draft.clone()));
    }

    store.append_entries(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::WeekType;

    #[test]
    fn append_assigns_increasing_ids() {
        let mut store = MemoryStore::new(small_domain());
        let first = store.append_entries(vec![EntryDraft::new(10, 1, 100, 1)]).unwrap();
        let second = store.append_entries(vec![EntryDraft::new(11, 2, 101, 1)]).unwrap();
        assert_eq!(first[0].id, 1);
        assert_eq!(second[0].id, 2);
        assert_eq!(store.data().entries.len(), 2);
    }

    #[test]
    fn replace_clears_previous_entries() {
        let mut store = MemoryStore::new(small_domain());
        store.append_entries(vec![EntryDraft::new(10, 1, 100, 1)]).unwrap();
        let replaced = store.replace_entries(vec![EntryDraft::new(11, 2, 101, 2)]).unwrap();
        assert_eq!(store.data().entries, replaced);
        assert_eq!(store.data().entries.len(), 1);
    }

    #[test]
    fn bulk_create_is_atomic() {
        let mut store = MemoryStore::new(small_domain());
        // Second draft double-books the first one's teacher
        let result = create_entries_bulk(
            &mut store,
            vec![EntryDraft::new(10, 1, 100, 1), EntryDraft::new(11, 1, 100, 1)],
            reference(),
        );
        match result {
            Err(ScheduleError::Conflict(conflicts)) => {
                assert_eq!(conflicts[0].kind(), "TEACHER_CONFLICT");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(store.data().entries.is_empty(), "nothing written on conflict");
    }

    #[test]
    fn bulk_create_accepts_disjoint_batch() {
        let mut store = MemoryStore::new(small_domain());
        let created = create_entries_bulk(
            &mut store,
            vec![
                EntryDraft::new(10, 1, 100, 1),
                EntryDraft::new(11, 2, 101, 1),
                EntryDraft::new(10, 2, 101, 2).week_type(WeekType::A),
                EntryDraft::new(10, 1, 100, 2).week_type(WeekType::B),
            ],
            reference(),
        )
        .unwrap();
        assert_eq!(created.len(), 4);
        assert_eq!(store.data().entries.len(), 4);
    }

    #[test]
    fn bulk_create_rejects_unknown_reference() {
        let mut store = MemoryStore::new(small_domain());
        let err = create_entries_bulk(&mut store, vec![EntryDraft::new(999, 1, 100, 1)], reference())
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert!(store.data().entries.is_empty());
    }
}
