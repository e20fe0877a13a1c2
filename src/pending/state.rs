use std::collections::HashSet;

use crate::models::PendingSkip;

/// Prompt timing, lifted out of `EngineConfig` so the state machine stays pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPolicy {
    pub lead_ms: u64,
    pub display_ms: u64,
    pub seek_jump_threshold_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptChange {
    /// Replaces whatever prompt was visible.
    Show(PendingSkip),
    Hide { group_id: u64 },
}

/// Vote prompt bookkeeping.
///
/// A prompt stays up for `display_ms` of *played* time. Once consumed it
/// does not come back during the same visit; a visit ends when playback
/// leaves every window or jumps by more than the seek threshold.
#[derive(Debug, Clone, Default)]
pub struct PendingState {
    pending: Vec<PendingSkip>,
    active_prompt: Option<u64>,
    shown_for_visit: bool,
    play_elapsed_ms: u64,
    last_checked_ms: Option<u64>,
    voted: HashSet<u64>,
}

impl PendingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[PendingSkip] {
        &self.pending
    }

    pub fn active_prompt(&self) -> Option<u64> {
        self.active_prompt
    }

    pub fn has_voted(&self, group_id: u64) -> bool {
        self.voted.contains(&group_id)
    }

    /// Replace the pending set. Groups voted on earlier in this page session
    /// are dropped.
    pub fn replace(&mut self, pending: Vec<PendingSkip>) -> Option<PromptChange> {
        let voted = &self.voted;
        self.pending = pending
            .into_iter()
            .filter(|skip| !voted.contains(&skip.group_id))
            .collect();
        self.reset_visit();
        self.last_checked_ms = None;
        self.take_prompt()
    }

    /// Forget the pending set. Voted groups are remembered.
    pub fn clear(&mut self) -> Option<PromptChange> {
        self.pending.clear();
        self.reset_visit();
        self.last_checked_ms = None;
        self.take_prompt()
    }

    /// Remove a voted group. Returns the removed entry, if it was pending.
    pub fn resolve(&mut self, group_id: u64) -> Option<PendingSkip> {
        self.voted.insert(group_id);
        if self.active_prompt == Some(group_id) {
            self.active_prompt = None;
        }

        let index = self.pending.iter().position(|skip| skip.group_id == group_id)?;
        Some(self.pending.remove(index))
    }

    pub fn hide_prompt(&mut self) -> Option<PromptChange> {
        self.take_prompt()
    }

    /// Advance by one poll tick of `tick_ms` at media position `position_ms`.
    pub fn step(
        &mut self,
        position_ms: u64,
        paused: bool,
        tick_ms: u64,
        policy: &PromptPolicy,
    ) -> Option<PromptChange> {
        if self.pending.is_empty() {
            return None;
        }

        if let Some(last) = self.last_checked_ms {
            if position_ms.abs_diff(last) > policy.seek_jump_threshold_ms {
                self.reset_visit();
            }
        }
        self.last_checked_ms = Some(position_ms);

        let current = self
            .pending
            .iter()
            .find(|skip| skip.prompt_window_contains(position_ms, policy.lead_ms))
            .cloned();

        let Some(skip) = current else {
            self.reset_visit();
            return self.take_prompt();
        };

        if self.active_prompt == Some(skip.group_id) {
            // Paused playback freezes the countdown.
            if !paused {
                self.play_elapsed_ms += tick_ms;
                if self.play_elapsed_ms >= policy.display_ms {
                    self.shown_for_visit = true;
                    return self.take_prompt();
                }
            }
            None
        } else if !self.shown_for_visit {
            self.active_prompt = Some(skip.group_id);
            self.play_elapsed_ms = 0;
            Some(PromptChange::Show(skip))
        } else {
            None
        }
    }

    fn reset_visit(&mut self) {
        self.shown_for_visit = false;
        self.play_elapsed_ms = 0;
    }

    fn take_prompt(&mut self) -> Option<PromptChange> {
        self.active_prompt
            .take()
            .map(|group_id| PromptChange::Hide { group_id })
    }
}
