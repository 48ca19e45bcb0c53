use crate::model::LADDER_LENGTH;

/// Prize money per ladder level, with the checkpoint levels whose prize is
/// kept even if a later question is missed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrizeTable {
    prizes: [u64; LADDER_LENGTH],
    checkpoints: &'static [u8],
}

impl PrizeTable {
    pub const STANDARD: PrizeTable = PrizeTable {
        prizes: [
            100, 200, 300, 500, 1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 64_000, 125_000,
            250_000, 500_000, 1_000_000,
        ],
        checkpoints: &[4, 9, 14],
    };

    /// Prize for answering the question at `level` correctly.
    #[must_use]
    pub fn prize_at(&self, level: u8) -> Option<u64> {
        self.prizes.get(usize::from(level)).copied()
    }

    #[must_use]
    pub fn max_prize(&self) -> u64 {
        self.prizes[LADDER_LENGTH - 1]
    }

    #[must_use]
    pub fn is_checkpoint(&self, level: u8) -> bool {
        self.checkpoints.contains(&level)
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[u8] {
        self.checkpoints
    }

    /// Full prize for a player who cleared `levels_cleared` questions.
    #[must_use]
    pub fn cash_out_prize(&self, levels_cleared: u8) -> u64 {
        levels_cleared
            .checked_sub(1)
            .and_then(|level| self.prize_at(level))
            .unwrap_or(0)
    }

    /// Guaranteed prize after a miss: the highest checkpoint among the
    /// `levels_cleared` questions answered, or 0.
    #[must_use]
    pub fn checkpoint_prize(&self, levels_cleared: u8) -> u64 {
        let Some(last_cleared) = levels_cleared.checked_sub(1) else {
            return 0;
        };
        self.checkpoints
            .iter()
            .copied()
            .filter(|level| *level <= last_cleared)
            .max()
            .and_then(|level| self.prize_at(level))
            .unwrap_or(0)
    }
}

impl Default for PrizeTable {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prizes_increase_monotonically() {
        let table = PrizeTable::STANDARD;
        let prizes: Vec<u64> = (0..15).filter_map(|l| table.prize_at(l)).collect();
        assert_eq!(prizes.len(), 15);
        assert!(prizes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(table.prize_at(15), None);
        assert_eq!(table.max_prize(), 1_000_000);
    }

    #[test]
    fn cash_out_pays_last_cleared_level() {
        let table = PrizeTable::STANDARD;
        assert_eq!(table.cash_out_prize(0), 0);
        assert_eq!(table.cash_out_prize(2), 200);
        assert_eq!(table.cash_out_prize(15), 1_000_000);
    }

    #[test]
    fn checkpoint_prize_floors_to_last_checkpoint() {
        let table = PrizeTable::STANDARD;
        assert_eq!(table.checkpoint_prize(0), 0);
        assert_eq!(table.checkpoint_prize(4), 0);
        assert_eq!(table.checkpoint_prize(5), 1_000);
        assert_eq!(table.checkpoint_prize(9), 1_000);
        assert_eq!(table.checkpoint_prize(10), 32_000);
        assert_eq!(table.checkpoint_prize(14), 32_000);
        assert!(table.is_checkpoint(9));
        assert!(!table.is_checkpoint(8));
    }
}
