use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Board {
    Deals,
    WorkOrders,
}

impl Board {
    pub const ALL: [Board; 2] = [Board::Deals, Board::WorkOrders];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deals => "deals",
            Self::WorkOrders => "work_orders",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Deals => "Deals",
            Self::WorkOrders => "Work Orders",
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Board {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deals" | "deal" => Ok(Self::Deals),
            "work_orders" | "work-orders" | "workorders" | "work orders" | "orders" => {
                Ok(Self::WorkOrders)
            }
            other => Err(DomainError::UnknownBoard(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Board;

    #[test]
    fn parses_board_aliases() {
        assert_eq!("Deals".parse::<Board>(), Ok(Board::Deals));
        assert_eq!("work-orders".parse::<Board>(), Ok(Board::WorkOrders));
        assert_eq!(" orders ".parse::<Board>(), Ok(Board::WorkOrders));
        assert!("invoices".parse::<Board>().is_err());
    }

    #[test]
    fn display_matches_config_key() {
        assert_eq!(Board::WorkOrders.to_string(), "work_orders");
        assert_eq!(Board::WorkOrders.display_name(), "Work Orders");
    }
}
