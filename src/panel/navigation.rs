#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Forward,
    Backward,
}

impl StepDirection {
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            StepDirection::Backward
        } else {
            StepDirection::Forward
        }
    }

    pub fn is_reverse(self) -> bool {
        self == StepDirection::Backward
    }
}

/// `Idle` until a non-empty result set has been loaded for the current query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationState {
    #[default]
    Idle,
    Loaded { index: usize },
}

/// What a step needs the caller to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPlan {
    MoveTo(usize),
    WrapTo(usize),
    FetchMore,
    Nothing,
}

#[derive(Debug, Default)]
pub struct Navigator {
    state: NavigationState,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn current(&self) -> Option<usize> {
        match self.state {
            NavigationState::Idle => None,
            NavigationState::Loaded { index } => Some(index),
        }
    }

    pub fn reset(&mut self) {
        self.state = NavigationState::Idle;
    }

    /// Selects `index` if it falls inside a window of `len` items.
    pub fn select(&mut self, index: usize, len: usize) -> Option<usize> {
        if index < len {
            self.state = NavigationState::Loaded { index };
            Some(index)
        } else {
            self.state = NavigationState::Idle;
            None
        }
    }

    /// Pulls the current index back inside a window that shrank to `len`.
    pub fn clamp(&mut self, len: usize) -> Option<usize> {
        match self.current() {
            Some(_) if len == 0 => {
                self.reset();
                None
            }
            Some(index) => self.select(index.min(len - 1), len),
            None => None,
        }
    }

    pub fn plan_step(&self, len: usize, has_more: bool, direction: StepDirection) -> StepPlan {
        if len == 0 {
            return StepPlan::Nothing;
        }

        match (self.current(), direction) {
            (None, StepDirection::Forward) => StepPlan::MoveTo(0),
            (None, StepDirection::Backward) => StepPlan::MoveTo(len - 1),
            (Some(index), StepDirection::Forward) if index + 1 < len => StepPlan::MoveTo(index + 1),
            (Some(_), StepDirection::Forward) if has_more => StepPlan::FetchMore,
            (Some(_), StepDirection::Forward) => StepPlan::WrapTo(0),
            (Some(index), StepDirection::Backward) if index > 0 && index <= len => {
                StepPlan::MoveTo(index - 1)
            }
            (Some(_), StepDirection::Backward) => StepPlan::WrapTo(len - 1),
        }
    }

    /// Resolves a forward step that needed another chunk: the first newly
    /// loaded item, or a wrap to the start when the chunk came back empty.
    pub fn finish_fetch_step(&mut self, previous_len: usize, len: usize) -> Option<usize> {
        if len > previous_len {
            self.select(previous_len, len)
        } else {
            self.select(0, len)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(index: usize) -> Navigator {
        let mut navigator = Navigator::new();
        navigator.select(index, usize::MAX);
        navigator
    }

    #[test]
    fn forward_step_should_advance_inside_window() {
        assert_eq!(
            loaded(1).plan_step(5, false, StepDirection::Forward),
            StepPlan::MoveTo(2)
        );
    }

    #[test]
    fn forward_step_from_last_index_should_wrap_without_more_chunks() {
        assert_eq!(
            loaded(4).plan_step(5, false, StepDirection::Forward),
            StepPlan::WrapTo(0)
        );
    }

    #[test]
    fn forward_step_from_last_index_should_fetch_when_more_chunks_exist() {
        assert_eq!(
            loaded(4).plan_step(5, true, StepDirection::Forward),
            StepPlan::FetchMore
        );
    }

    #[test]
    fn backward_step_from_first_index_should_wrap_to_last() {
        assert_eq!(
            loaded(0).plan_step(5, true, StepDirection::Backward),
            StepPlan::WrapTo(4)
        );
        assert_eq!(
            loaded(3).plan_step(5, false, StepDirection::Backward),
            StepPlan::MoveTo(2)
        );
    }

    #[test]
    fn step_without_selection_should_enter_from_the_matching_end() {
        let navigator = Navigator::new();
        assert_eq!(navigator.plan_step(3, true, StepDirection::Forward), StepPlan::MoveTo(0));
        assert_eq!(navigator.plan_step(3, true, StepDirection::Backward), StepPlan::MoveTo(2));
        assert_eq!(navigator.plan_step(0, true, StepDirection::Forward), StepPlan::Nothing);
    }

    #[test]
    fn finish_fetch_step_should_pick_first_new_item_or_wrap() {
        let mut navigator = loaded(4);
        assert_eq!(navigator.finish_fetch_step(5, 8), Some(5));

        let mut navigator = loaded(4);
        assert_eq!(navigator.finish_fetch_step(5, 5), Some(0));
    }

    #[test]
    fn clamp_should_pull_index_into_shrunk_window_or_go_idle() {
        let mut navigator = loaded(7);
        assert_eq!(navigator.clamp(3), Some(2));
        assert_eq!(navigator.clamp(0), None);
        assert_eq!(navigator.state(), NavigationState::Idle);
    }
}
