use serde::{Deserialize, Serialize};
use std::fmt;

/// Position identifier, allocated monotonically by the position manager.
///
/// Results and the trade log refer to positions only through this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_prefixed() {
        assert_eq!(PositionId(7).to_string(), "pos_7");
    }

    #[test]
    fn ids_order_numerically() {
        assert!(PositionId(2) < PositionId(10));
    }
}
