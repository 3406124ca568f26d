//! Append-only audit log for the in-memory backend.
//!
//! Assigns history ids and write timestamps the way the database does:
//! ids increase by one, timestamps never go backwards even if the wall
//! clock does.

use chrono::{DateTime, Utc};

use warehouse_core::{HistoryId, ItemId};
use warehouse_inventory::{newest_first, History, PendingHistory};

#[derive(Debug, Default)]
pub struct AuditLog {
    rows: Vec<History>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row, stamped with `max(now, previous stamp)`.
    pub fn record(&mut self, pending: PendingHistory, now: DateTime<Utc>) -> &History {
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);

        let id = HistoryId::new(self.rows.len() as i64 + 1);
        self.rows.push(pending.into_recorded(id, timestamp));
        &self.rows[self.rows.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn newest_first(&self) -> Vec<History> {
        let mut rows = self.rows.clone();
        newest_first(&mut rows);
        rows
    }

    pub fn for_item(&self, item_id: ItemId) -> Vec<History> {
        let mut rows: Vec<History> = self
            .rows
            .iter()
            .filter(|h| h.item_id == item_id)
            .cloned()
            .collect();
        newest_first(&mut rows);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use warehouse_inventory::Item;

    fn item(id: i64) -> Item {
        Item {
            id: ItemId::new(id),
            name: format!("item-{id}"),
            count: 1,
        }
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut log = AuditLog::new();
        let t0 = Utc::now();
        log.record(PendingHistory::created(&item(1), "a"), t0);
        let second = log
            .record(PendingHistory::created(&item(2), "a"), t0 - Duration::seconds(30))
            .clone();

        assert_eq!(second.timestamp, t0);
        assert_eq!(second.id, HistoryId::new(2));
    }

    #[test]
    fn per_item_view_is_filtered_and_newest_first() {
        let mut log = AuditLog::new();
        let t0 = Utc::now();
        log.record(PendingHistory::created(&item(1), "a"), t0);
        log.record(PendingHistory::created(&item(2), "a"), t0 + Duration::seconds(1));
        log.record(
            PendingHistory::deleted(&item(1), "root"),
            t0 + Duration::seconds(2),
        );

        let trail = log.for_item(ItemId::new(1));
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].changed_by, "root");
        assert!(trail.iter().all(|h| h.item_id == ItemId::new(1)));
        assert_eq!(log.newest_first().len(), 3);
    }
}
