//! Small closed enumerations shared by the engine and its callers.

use serde::{Deserialize, Serialize};

/// The kinds of entities that can own an address.
///
/// Each kind has its own junction table in the relational store
/// (`customer_address`, `vendor_address`, `supplier_address`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Customer,
    Vendor,
    Supplier,
}

impl OwnerKind {
    /// All owner kinds, in the order reference probes visit them.
    pub const ALL: [Self; 3] = [Self::Customer, Self::Vendor, Self::Supplier];

    /// Name of the relational junction table for this owner kind.
    #[must_use]
    pub const fn junction_table(self) -> &'static str {
        match self {
            Self::Customer => "customer_address",
            Self::Vendor => "vendor_address",
            Self::Supplier => "supplier_address",
        }
    }
}

impl std::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Vendor => write!(f, "vendor"),
            Self::Supplier => write!(f, "supplier"),
        }
    }
}

impl std::str::FromStr for OwnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "supplier" => Ok(Self::Supplier),
            _ => Err(format!("invalid owner kind: {s}")),
        }
    }
}

/// Behavioral action a customer performed on a listing.
///
/// Stored on `CustomerAction` documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    View,
    AddToCart,
    RemoveFromCart,
    Purchase,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::View => write!(f, "view"),
            Self::AddToCart => write!(f, "add_to_cart"),
            Self::RemoveFromCart => write!(f, "remove_from_cart"),
            Self::Purchase => write!(f, "purchase"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_kind_round_trips_through_display() {
        for kind in OwnerKind::ALL {
            assert_eq!(kind.to_string().parse::<OwnerKind>().unwrap(), kind);
        }
        assert!("courier".parse::<OwnerKind>().is_err());
    }

    #[test]
    fn test_action_type_serde_matches_display() {
        let json = serde_json::to_string(&ActionType::AddToCart).unwrap();
        assert_eq!(json, format!("\"{}\"", ActionType::AddToCart));
    }
}
