use std::collections::HashSet;

use super::observation::EntityKey;

/// Which entities already received a decision in the current turn.
#[derive(Debug, Clone, Default)]
pub struct TurnMemory {
    turn: Option<u64>,
    decided: HashSet<EntityKey>,
}

impl TurnMemory {
    /// Records the incoming turn. On a turn change the decided set is cleared and `true` is
    /// returned.
    pub fn observe_turn(&mut self, turn: u64) -> bool {
        if self.turn == Some(turn) {
            return false;
        }
        self.turn = Some(turn);
        self.decided.clear();
        true
    }

    pub fn turn(&self) -> Option<u64> {
        self.turn
    }

    pub fn is_decided(&self, key: &EntityKey) -> bool {
        self.decided.contains(key)
    }

    /// Returns `false` if the entity was already decided this turn.
    pub fn mark_decided(&mut self, key: EntityKey) -> bool {
        self.decided.insert(key)
    }

    pub fn decided_len(&self) -> usize {
        self.decided.len()
    }
}
