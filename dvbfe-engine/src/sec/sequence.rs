//! SEC program with a movable cursor.

use super::command::SecCommand;

/// An ordered SEC program and the position of the next instruction.
///
/// The cursor equal to `len()` means the program is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecSequence {
    commands: Vec<SecCommand>,
    cursor: usize,
}

impl SecSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: SecCommand) {
        self.commands.push(command);
    }

    /// Append another program without moving the cursor.
    pub fn append(&mut self, other: SecSequence) {
        self.commands.extend(other.commands);
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.commands.len()
    }

    pub fn current(&self) -> Option<&SecCommand> {
        self.commands.get(self.cursor)
    }

    pub fn current_mut(&mut self) -> Option<&mut SecCommand> {
        self.commands.get_mut(self.cursor)
    }

    pub fn commands(&self) -> &[SecCommand] {
        &self.commands
    }

    pub fn advance(&mut self) {
        if self.cursor < self.commands.len() {
            self.cursor += 1;
        }
    }

    /// Move the cursor by `steps`.
    ///
    /// Returns `false` without moving for `steps == 0`. Forward jumps stop at
    /// the end; backward jumps stop at the start and never leave a completed
    /// program.
    pub fn jump(&mut self, steps: i32) -> bool {
        if steps == 0 {
            return false;
        }
        let end = self.commands.len();
        if steps > 0 {
            self.cursor = (self.cursor + steps as usize).min(end);
        } else if self.cursor != end {
            self.cursor = self.cursor.saturating_sub(steps.unsigned_abs() as usize);
        }
        true
    }

    /// Whether a `SendDiseqc` remains at or after the cursor.
    pub fn has_pending_diseqc(&self) -> bool {
        self.commands
            .iter()
            .skip(self.cursor)
            .any(|c| matches!(c, SecCommand::SendDiseqc(_)))
    }
}

impl From<Vec<SecCommand>> for SecSequence {
    fn from(commands: Vec<SecCommand>) -> Self {
        Self {
            commands,
            cursor: 0,
        }
    }
}

impl FromIterator<SecCommand> for SecSequence {
    fn from_iter<I: IntoIterator<Item = SecCommand>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}
