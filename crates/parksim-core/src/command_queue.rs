//! Deferred maintenance commands.
//!
//! The maintenance panel may flip a flag at any moment, but a tick must never
//! observe a half-applied change. Commands wait here and the engine drains
//! them, in submission order, at the start of the next occupancy or traffic
//! tick.

use std::collections::VecDeque;

use crate::fixed::Millis;
use crate::maintenance::Toggle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set or clear a maintenance flag.
    Toggle(Toggle),
}

/// A command as it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCommand {
    /// Engine tick (occupancy and traffic combined) that applied it.
    pub tick: u64,
    /// Simulated clock when it was submitted.
    pub submitted_at: Millis,
    pub command: Command,
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<(Millis, Command)>,
    /// Most recent applied commands, oldest first.
    history: VecDeque<AppliedCommand>,
    /// 0 disables history.
    history_limit: usize,
}

impl CommandQueue {
    /// A queue that remembers up to `history_limit` applied commands.
    pub fn new(history_limit: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            history: VecDeque::with_capacity(history_limit),
            history_limit,
        }
    }

    pub fn push(&mut self, command: Command, now: Millis) {
        self.pending.push_back((now, command));
    }

    /// Take every pending command, recording each as applied at `tick`.
    pub fn drain(&mut self, tick: u64) -> Vec<Command> {
        let mut commands = Vec::with_capacity(self.pending.len());
        for (submitted_at, command) in self.pending.drain(..) {
            if self.history_limit > 0 {
                if self.history.len() == self.history_limit {
                    self.history.pop_front();
                }
                self.history.push_back(AppliedCommand {
                    tick,
                    submitted_at,
                    command: command.clone(),
                });
            }
            commands.push(command);
        }
        commands
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Commands still waiting, in submission order.
    pub fn pending(&self) -> impl ExactSizeIterator<Item = &Command> + '_ {
        self.pending.iter().map(|(_, command)| command)
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &AppliedCommand> + '_ {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
