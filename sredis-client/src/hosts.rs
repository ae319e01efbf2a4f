//! # Host Table
//!
//! Purpose: Keep the candidate servers a handle may connect to, and rotate
//! through them when the current one fails.
//!
//! ## Design Principles
//! 1. **Descriptor-Table Slots**: New hosts take the lowest free slot, so a
//!    deleted slot is reused before the table grows into higher indices.
//! 2. **Stable Indices**: A slot index stays valid until that slot is deleted,
//!    which lets callers hold on to the value returned by `add`.
//! 3. **Bounded Rotation**: `advance` visits each slot at most once per cycle,
//!    so failover never loops forever over an empty or dead table.
//!
//! ## Structure Overview
//!
//! ```text
//! HostTable
//!   ├── slots: Vec<Option<HostEntry>>   (len == capacity)
//!   └── current: usize                  (slot in use, or next to try)
//! ```

use std::time::Duration;

use sredis_common::{ClientError, ClientResult};

/// Default number of host slots per handle.
pub const HOSTS_MAX: usize = 16;

/// Connection information for one candidate server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    host: String,
    port: u16,
    connect_timeout: Option<Duration>,
    op_timeout: Option<Duration>,
    success: u64,
    failure: u64,
}

impl HostEntry {
    /// Creates an entry with zeroed counters.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        connect_timeout: Option<Duration>,
        op_timeout: Option<Duration>,
    ) -> Self {
        HostEntry {
            host: host.into(),
            port,
            connect_timeout,
            op_timeout,
            success: 0,
            failure: 0,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Upper bound for establishing a connection, `None` blocks indefinitely.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Upper bound for each read/write once connected.
    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout
    }

    /// Number of successful connection attempts.
    pub fn success(&self) -> u64 {
        self.success
    }

    /// Number of failed connection attempts.
    pub fn failure(&self) -> u64 {
        self.failure
    }

    pub(crate) fn record_success(&mut self) {
        self.success = self.success.saturating_add(1);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failure = self.failure.saturating_add(1);
    }
}

/// Fixed-capacity registry of candidate hosts.
#[derive(Debug, Clone)]
pub struct HostTable {
    slots: Vec<Option<HostEntry>>,
    current: usize,
}

impl Default for HostTable {
    fn default() -> Self {
        HostTable::new()
    }
}

impl HostTable {
    /// Creates an empty table with `HOSTS_MAX` slots.
    pub fn new() -> Self {
        HostTable::with_capacity(HOSTS_MAX)
    }

    /// Creates an empty table with `capacity` slots (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        HostTable {
            slots: vec![None; capacity.max(1)],
            current: 0,
        }
    }

    /// Registers a host in the lowest free slot and returns its index.
    ///
    /// # Errors
    /// Returns `ClientError::HostTableFull` when every slot is occupied.
    pub fn add(&mut self, entry: HostEntry) -> ClientResult<usize> {
        let idx = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ClientError::HostTableFull {
                capacity: self.slots.len(),
            })?;
        self.slots[idx] = Some(entry);
        Ok(idx)
    }

    /// Removes the host in slot `idx`, leaving the slot empty.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidSlot` for an out-of-range or empty slot.
    pub fn delete(&mut self, idx: usize) -> ClientResult<HostEntry> {
        self.slots
            .get_mut(idx)
            .and_then(Option::take)
            .ok_or(ClientError::InvalidSlot(idx))
    }

    /// Returns the next occupied slot after `from`, wrapping once.
    ///
    /// The scan covers every slot including `from` itself (last), so a table
    /// with a single host always yields that host. `None` means the table is
    /// empty.
    pub fn advance(&self, from: usize) -> Option<usize> {
        let capacity = self.slots.len();
        let from = from % capacity;
        (1..=capacity)
            .map(|step| (from + step) % capacity)
            .find(|&idx| self.slots[idx].is_some())
    }

    /// Slot of the host in use, or the next one to try.
    pub fn current(&self) -> usize {
        self.current
    }

    pub(crate) fn set_current(&mut self, idx: usize) {
        self.current = idx % self.slots.len();
    }

    /// Returns the current slot if occupied, otherwise the next occupied one.
    pub fn current_or_next(&self) -> Option<usize> {
        if self.get(self.current).is_some() {
            Some(self.current)
        } else {
            self.advance(self.current)
        }
    }

    pub fn get(&self, idx: usize) -> Option<&HostEntry> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut HostEntry> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &HostEntry)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|entry| (idx, entry)))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drops every entry and rewinds the cursor.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(port: u16) -> HostEntry {
        HostEntry::new("127.0.0.1", port, None, None)
    }

    #[test]
    fn add_uses_lowest_free_slot() {
        let mut table = HostTable::new();
        assert_eq!(table.add(entry(1)).unwrap(), 0);
        assert_eq!(table.add(entry(2)).unwrap(), 1);
        assert_eq!(table.add(entry(3)).unwrap(), 2);

        table.delete(1).unwrap();
        assert_eq!(table.add(entry(4)).unwrap(), 1);
        assert_eq!(table.get(1).unwrap().port(), 4);
        assert_eq!(table.add(entry(5)).unwrap(), 3);
    }

    #[test]
    fn seventeenth_add_fails_without_overwriting() {
        let mut table = HostTable::new();
        for port in 0..HOSTS_MAX as u16 {
            table.add(entry(port)).unwrap();
        }
        let err = table.add(entry(999)).unwrap_err();
        assert!(matches!(err, ClientError::HostTableFull { capacity: HOSTS_MAX }));
        assert!(table.iter().all(|(idx, host)| host.port() == idx as u16));
    }

    #[test]
    fn delete_rejects_empty_or_out_of_range_slots() {
        let mut table = HostTable::new();
        table.add(entry(1)).unwrap();
        assert!(matches!(table.delete(5), Err(ClientError::InvalidSlot(5))));
        assert!(matches!(table.delete(HOSTS_MAX), Err(ClientError::InvalidSlot(_))));
        assert_eq!(table.delete(0).unwrap().port(), 1);
        assert!(matches!(table.delete(0), Err(ClientError::InvalidSlot(0))));
        assert!(table.is_empty());
    }

    #[test]
    fn advance_visits_each_occupied_slot_once_per_cycle() {
        let mut table = HostTable::new();
        for port in 0..6 {
            table.add(entry(port)).unwrap();
        }
        table.delete(0).unwrap();
        table.delete(3).unwrap();

        let mut seen = Vec::new();
        let mut idx = 4;
        for _ in 0..table.len() {
            idx = table.advance(idx).unwrap();
            seen.push(idx);
        }
        assert_eq!(seen, vec![5, 1, 2, 4]);
    }

    #[test]
    fn advance_wraps_to_self_and_reports_exhaustion() {
        let mut table = HostTable::new();
        assert_eq!(table.advance(0), None);
        assert_eq!(table.current_or_next(), None);

        table.add(entry(1)).unwrap();
        table.delete(0).unwrap();
        table.add(entry(2)).unwrap();
        assert_eq!(table.advance(0), Some(0));
        assert_eq!(table.advance(HOSTS_MAX - 1), Some(0));
    }

    #[test]
    fn advance_accepts_out_of_range_start() {
        let mut table = HostTable::with_capacity(4);
        table.add(entry(1)).unwrap();
        table.add(entry(2)).unwrap();
        // usize::MAX % 4 == 3, so the scan wraps to slot 0.
        assert_eq!(table.advance(usize::MAX), Some(0));
        assert_eq!(table.advance(5), Some(0));
        assert_eq!(table.advance(4), Some(1));
    }

    #[test]
    fn current_or_next_skips_deleted_current_slot() {
        let mut table = HostTable::with_capacity(4);
        table.add(entry(1)).unwrap();
        table.add(entry(2)).unwrap();
        table.set_current(0);
        table.delete(0).unwrap();
        assert_eq!(table.current_or_next(), Some(1));
    }

    #[test]
    fn clear_empties_table() {
        let mut table = HostTable::with_capacity(2);
        table.add(entry(1)).unwrap();
        table.add(entry(2)).unwrap();
        table.set_current(1);
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.current(), 0);
        assert_eq!(table.add(entry(3)).unwrap(), 0);
    }
}
