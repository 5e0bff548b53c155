use getset::{Getters, Setters};

use crate::interface::{FetchMode, SqlParam};

/// A declared cursor: name, query text (a leading `@` names a prepared
/// statement instead), hold flag and the bindings captured at declare time.
#[derive(Debug, Clone, Getters, Setters)]
#[getset(get = "pub", set = "pub")]
pub struct Cursor {
    name: String,
    query: String,
    with_hold: bool,
    params: Vec<SqlParam>,
}

impl Cursor {
    pub fn new(name: impl Into<String>, query: impl Into<String>, with_hold: bool) -> Cursor {
        Cursor {
            name: name.into(),
            query: query.into(),
            with_hold,
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<SqlParam>) -> Cursor {
        self.params = params;
        self
    }

    /// The prepared-statement name when the query is an `@name` reference.
    pub fn prepared_ref(&self) -> Option<&str> {
        self.query.strip_prefix('@')
    }
}

/// Row index of an emulated cursor: -1 before the first fetch, advanced
/// locally over the materialised result set.
#[derive(Debug, Clone, Copy)]
pub struct RowPosition {
    current: i64,
}

impl Default for RowPosition {
    fn default() -> Self {
        RowPosition { current: -1 }
    }
}

impl RowPosition {
    pub fn new() -> RowPosition {
        RowPosition::default()
    }

    /// Position reached by the last successful fetch.
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.current).ok()
    }

    /// Move per `mode` over `nrows` rows. The position only changes on a
    /// successful move; out-of-range fetches leave it where it was.
    pub fn advance(&mut self, mode: FetchMode, nrows: usize) -> Option<usize> {
        let target = match mode {
            FetchMode::Next => self.current + 1,
            FetchMode::Prev => self.current - 1,
            FetchMode::Current => self.current,
        };
        if target >= 0 && (target as usize) < nrows {
            self.current = target;
            Some(target as usize)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepared_ref() {
        let c = Cursor::new("CUR1", "@stmt1", false);
        assert_eq!(c.prepared_ref(), Some("stmt1"));
        let c = Cursor::new("CUR1", "SELECT 1", false);
        assert_eq!(c.prepared_ref(), None);
    }

    #[test]
    fn test_two_row_next_sequence() {
        // two-row result: NEXT, NEXT succeed, the third finds nothing
        let mut pos = RowPosition::new();
        assert_eq!(pos.advance(FetchMode::Next, 2), Some(0));
        assert_eq!(pos.advance(FetchMode::Next, 2), Some(1));
        assert_eq!(pos.advance(FetchMode::Next, 2), None);
        // position is unchanged after the failed fetch
        assert_eq!(pos.index(), Some(1));
    }

    #[test]
    fn test_prev_and_current() {
        let mut pos = RowPosition::new();
        assert_eq!(pos.advance(FetchMode::Current, 3), None); // before first row
        assert_eq!(pos.advance(FetchMode::Prev, 3), None);
        assert_eq!(pos.advance(FetchMode::Next, 3), Some(0));
        assert_eq!(pos.advance(FetchMode::Current, 3), Some(0));
        assert_eq!(pos.advance(FetchMode::Next, 3), Some(1));
        assert_eq!(pos.advance(FetchMode::Prev, 3), Some(0));
    }

    #[test]
    fn test_empty_result_set() {
        let mut pos = RowPosition::new();
        assert_eq!(pos.advance(FetchMode::Next, 0), None);
        assert_eq!(pos.index(), None);
    }
}
