use std::fmt;

/// Percentage change column of the quote table.
///
/// The provider reports `"-"` for instruments that have not traded yet
/// (suspended, or before the first print of the day).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PercentChange {
    Traded(f64),
    NoTrade,
}

impl PercentChange {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Traded(v) => Some(*v),
            Self::NoTrade => None,
        }
    }
}

/// One row of the full real-time quote table.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRow {
    pub identifier: String,
    pub display_name: String,
    pub percent_change: PercentChange,
}

/// Quantity resting at bid levels 1..=5 (level 1 is the best bid).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BidLadder(pub [u64; 5]);

impl BidLadder {
    pub fn level(&self, level: usize) -> Option<u64> {
        level
            .checked_sub(1)
            .and_then(|idx| self.0.get(idx))
            .copied()
    }

    /// Iterates `(level, quantity)` with levels starting at 1.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.0.iter().enumerate().map(|(i, q)| (i + 1, *q))
    }
}

impl fmt::Display for BidLadder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, qty) in self.iter() {
            if level > 1 {
                writeln!(f)?;
            }
            write!(f, "bid {level}: {qty}")?;
        }
        Ok(())
    }
}

/// Detailed per-instrument snapshot: last price, session limits and the bid side
/// of the order book.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub current_price: f64,
    /// Limit-up price for the session.
    pub ceiling_price: f64,
    /// Limit-down price for the session.
    pub floor_price: f64,
    pub bid_quantities: BidLadder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_renders_one_line_per_level() {
        let ladder = BidLadder([1200, 30, 0, 5, 7]);
        assert_eq!(
            ladder.to_string(),
            "bid 1: 1200\nbid 2: 30\nbid 3: 0\nbid 4: 5\nbid 5: 7"
        );
    }

    #[test]
    fn ladder_levels_are_one_based() {
        let ladder = BidLadder([9, 8, 7, 6, 5]);
        assert_eq!(ladder.level(1), Some(9));
        assert_eq!(ladder.level(5), Some(5));
        assert_eq!(ladder.level(0), None);
        assert_eq!(ladder.level(6), None);
    }
}
