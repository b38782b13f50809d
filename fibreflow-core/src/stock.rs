//! Stock movement arithmetic and cable drum usage.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Inbound,
    Outbound,
    Transfer,
    Adjustment,
    Return,
}

impl MovementType {
    pub const ALL: [&'static str; 5] = ["inbound", "outbound", "transfer", "adjustment", "return"];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            "transfer" => Some(Self::Transfer),
            "adjustment" => Some(Self::Adjustment),
            "return" => Some(Self::Return),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
            Self::Return => "return",
        }
    }
}

/// Stock position classification stored in `stock_positions.stock_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
    Excess,
}

impl StockStatus {
    pub const ALL: [&'static str; 4] = ["in_stock", "low_stock", "out_of_stock", "excess"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
            Self::Excess => "excess",
        }
    }

    pub fn classify(available: Decimal, reorder_point: Option<Decimal>, max_level: Option<Decimal>) -> Self {
        if available <= Decimal::ZERO {
            Self::OutOfStock
        } else if reorder_point.is_some_and(|r| available <= r) {
            Self::LowStock
        } else if max_level.is_some_and(|m| m > Decimal::ZERO && available > m) {
            Self::Excess
        } else {
            Self::InStock
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StockError {
    #[error("Item {0} not found in stock")]
    UnknownItem(String),

    #[error("Insufficient stock for item {item_code}")]
    Insufficient { item_code: String },

    #[error("Quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("Requested {requested}m exceeds remaining {remaining}m on drum")]
    DrumExhausted { requested: Decimal, remaining: Decimal },
}

/// Quantities held for one item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub available: Decimal,
    pub reserved: Decimal,
    pub total: Decimal,
}

impl StockLevels {
    /// Levels after moving `quantity` of `item_code`.
    ///
    /// Outbound reserves stock, inbound receives it. Other movement types
    /// leave levels untouched.
    pub fn apply(
        self,
        item_code: &str,
        movement: MovementType,
        quantity: Decimal,
    ) -> Result<Self, StockError> {
        if quantity <= Decimal::ZERO {
            return Err(StockError::NonPositiveQuantity);
        }

        match movement {
            MovementType::Outbound => {
                if self.available < quantity {
                    return Err(StockError::Insufficient {
                        item_code: item_code.to_string(),
                    });
                }
                Ok(Self {
                    available: self.available - quantity,
                    reserved: self.reserved + quantity,
                    ..self
                })
            }
            MovementType::Inbound => Ok(Self {
                available: self.available + quantity,
                total: self.total + quantity,
                ..self
            }),
            _ => Ok(self),
        }
    }
}

/// Line cost, preferring the requested unit cost over the stocked one.
pub fn line_cost(quantity: Decimal, unit_cost: Option<Decimal>, stocked_unit_cost: Option<Decimal>) -> (Decimal, Decimal) {
    let unit = unit_cost.or(stocked_unit_cost).unwrap_or_default();
    (unit, quantity * unit)
}

/// Remaining drum length after cutting `used` metres.
pub fn deduct_drum_length(remaining: Decimal, used: Decimal) -> Result<Decimal, StockError> {
    if used <= Decimal::ZERO {
        return Err(StockError::NonPositiveQuantity);
    }
    if used > remaining {
        return Err(StockError::DrumExhausted {
            requested: used,
            remaining,
        });
    }
    Ok(remaining - used)
}

/// Drum status after a cut: drained drums are `completed`, touched ones `in_use`.
pub fn drum_status_after_use(original: Decimal, remaining: Decimal) -> &'static str {
    if remaining <= Decimal::ZERO {
        "completed"
    } else if remaining < original {
        "in_use"
    } else {
        "available"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(available: i64, reserved: i64, total: i64) -> StockLevels {
        StockLevels {
            available: available.into(),
            reserved: reserved.into(),
            total: total.into(),
        }
    }

    #[test]
    fn outbound_moves_available_to_reserved() {
        let after = levels(10, 0, 10)
            .apply("CBL-1", MovementType::Outbound, Decimal::from(4))
            .unwrap();
        assert_eq!(after, levels(6, 4, 10));
    }

    #[test]
    fn outbound_beyond_available_fails() {
        let err = levels(3, 0, 3)
            .apply("CBL-1", MovementType::Outbound, Decimal::from(4))
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient stock for item CBL-1");
    }

    #[test]
    fn inbound_adds_to_available_and_total() {
        let after = levels(2, 1, 3)
            .apply("X", MovementType::Inbound, Decimal::from(5))
            .unwrap();
        assert_eq!(after, levels(7, 1, 8));
    }

    #[test]
    fn transfer_leaves_levels() {
        let start = levels(2, 1, 3);
        assert_eq!(start.apply("X", MovementType::Transfer, Decimal::ONE).unwrap(), start);
        assert_eq!(
            start.apply("X", MovementType::Inbound, Decimal::ZERO).unwrap_err(),
            StockError::NonPositiveQuantity
        );
    }

    #[test]
    fn line_cost_prefers_request() {
        let (unit, total) = line_cost(Decimal::from(3), Some(Decimal::from(2)), Some(Decimal::from(9)));
        assert_eq!((unit, total), (Decimal::from(2), Decimal::from(6)));
        let (_, total) = line_cost(Decimal::from(3), None, None);
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn status_classification() {
        let d = |n: i64| Decimal::from(n);
        assert_eq!(StockStatus::classify(d(0), Some(d(5)), None), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(d(5), Some(d(5)), None), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(d(50), Some(d(5)), Some(d(20))), StockStatus::Excess);
        assert_eq!(StockStatus::classify(d(10), None, None), StockStatus::InStock);
    }

    #[test]
    fn drum_usage() {
        let d = |n: i64| Decimal::from(n);
        assert_eq!(deduct_drum_length(d(500), d(120)).unwrap(), d(380));
        assert!(matches!(
            deduct_drum_length(d(100), d(120)),
            Err(StockError::DrumExhausted { .. })
        ));
        assert_eq!(drum_status_after_use(d(500), d(0)), "completed");
        assert_eq!(drum_status_after_use(d(500), d(380)), "in_use");
    }
}
