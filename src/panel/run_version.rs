//! Generation counters for stale-response suppression.
//!
//! Backend calls cannot be aborted, so each one captures a token when it is
//! issued and its response is applied only if no newer call of the same class
//! has started since.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryClass {
    Search,
    SearchCount,
    Filter,
    FilterCount,
}

impl QueryClass {
    pub const ALL: [QueryClass; 4] = [
        QueryClass::Search,
        QueryClass::SearchCount,
        QueryClass::Filter,
        QueryClass::FilterCount,
    ];

    fn slot(self) -> usize {
        match self {
            QueryClass::Search => 0,
            QueryClass::SearchCount => 1,
            QueryClass::Filter => 2,
            QueryClass::FilterCount => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunToken {
    class: QueryClass,
    version: u64,
}

#[derive(Debug, Default)]
pub struct RunVersions {
    counters: [u64; 4],
}

impl RunVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, class: QueryClass) -> RunToken {
        let counter = &mut self.counters[class.slot()];
        *counter = counter.wrapping_add(1);

        RunToken {
            class,
            version: *counter,
        }
    }

    pub fn is_current(&self, token: RunToken) -> bool {
        self.counters[token.class.slot()] == token.version
    }

    /// Invalidates every outstanding token of `class`.
    pub fn supersede(&mut self, class: QueryClass) {
        self.begin(class);
    }

    /// Invalidates every outstanding token of every class. Counters move
    /// forward rather than back to zero so an old token can never match again.
    pub fn supersede_all(&mut self) {
        for class in QueryClass::ALL {
            self.supersede(class);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_token_of_a_class_should_be_current() {
        let mut runs = RunVersions::new();
        let first = runs.begin(QueryClass::Search);
        let second = runs.begin(QueryClass::Search);

        assert!(!runs.is_current(first));
        assert!(runs.is_current(second));
    }

    #[test]
    fn classes_should_count_independently() {
        let mut runs = RunVersions::new();
        let search = runs.begin(QueryClass::Search);
        let filter = runs.begin(QueryClass::Filter);
        runs.begin(QueryClass::SearchCount);
        runs.begin(QueryClass::FilterCount);

        assert!(runs.is_current(search));
        assert!(runs.is_current(filter));
    }

    #[test]
    fn supersede_all_should_invalidate_in_flight_tokens_without_reuse() {
        let mut runs = RunVersions::new();
        let before = runs.begin(QueryClass::Filter);
        runs.supersede_all();
        assert!(!runs.is_current(before));

        let after = runs.begin(QueryClass::Filter);
        assert_ne!(before, after);
        assert!(runs.is_current(after));
    }
}
