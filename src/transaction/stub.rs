use crate::core::Result;

/// Key/value access the contract code is allowed to use.
///
/// This is the whole store surface an operation sees: point reads, writes,
/// deletes and ordered range scans. The handle is passed explicitly into
/// every contract function; implementations decide how writes become
/// durable and how reads stay consistent.
pub trait WorldState {
    /// Bytes stored under `key`, or `None` when absent.
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Removing an absent key is not an error at this layer.
    fn del_state(&mut self, key: &str) -> Result<()>;

    /// Ordered entries with `start <= key < end`. An empty `end` scans to
    /// the last key.
    fn get_state_by_range(&mut self, start: &str, end: &str) -> Result<StateRange>;
}

/// Finite, ordered result of a range scan.
///
/// The scan is materialised from a snapshot, so later writes never change
/// what it yields. Dropping it releases the entries.
#[derive(Debug, Default)]
pub struct StateRange {
    entries: std::vec::IntoIter<(String, Vec<u8>)>,
}

impl StateRange {
    pub fn new(entries: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for StateRange {
    type Item = (String, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for StateRange {}
