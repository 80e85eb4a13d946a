//! Stock reconciliation for production leaf records
//!
//! A leaf record (one line, one day, one norm category) consumes garment
//! variant stock and the accessories linked to the variant's article, and it
//! feeds packaging stock with its graded output. Every write is reduced to a
//! [`LeafChange`] (old totals vs new totals) and then to a [`StockPlan`]: the
//! signed moves the backend applies atomically inside the write transaction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::OutputTotals;

/// Consumption ratio of one accessory per produced garment of an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryRatio {
    pub accessory_id: Uuid,
    /// Units of accessory per garment, up to three decimal places
    pub ratio: Decimal,
}

/// Old and new totals of one leaf record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafChange {
    pub old: OutputTotals,
    pub new: OutputTotals,
}

impl LeafChange {
    pub fn create(new: OutputTotals) -> Self {
        Self {
            old: OutputTotals::ZERO,
            new,
        }
    }

    pub fn update(old: OutputTotals, new: OutputTotals) -> Self {
        Self { old, new }
    }

    pub fn delete(old: OutputTotals) -> Self {
        Self {
            old,
            new: OutputTotals::ZERO,
        }
    }

    /// Additional garments consumed by this change (negative when released)
    pub fn consumption_delta(&self) -> i32 {
        self.new.consumed() - self.old.consumed()
    }

    /// Signed change applied to packaging stock, defects excluded
    pub fn packaging_delta(&self) -> PackagingDelta {
        PackagingDelta {
            sort_1: self.new.sort_1 - self.old.sort_1,
            sort_2: self.new.sort_2 - self.old.sort_2,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}

/// Signed packaging adjustment per grade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingDelta {
    pub sort_1: i32,
    pub sort_2: i32,
}

impl PackagingDelta {
    pub fn is_zero(&self) -> bool {
        self.sort_1 == 0 && self.sort_2 == 0
    }
}

/// Signed move on one accessory bucket of the leaf's warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryMove {
    pub accessory_id: Uuid,
    pub delta: Decimal,
}

/// Every stock move implied by a leaf change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPlan {
    /// Signed change to the variant bucket (negative consumes)
    pub variant_delta: i32,
    pub accessory_moves: Vec<AccessoryMove>,
    pub packaging: PackagingDelta,
}

impl StockPlan {
    pub fn is_empty(&self) -> bool {
        self.variant_delta == 0 && self.packaging.is_zero()
    }
}

/// Accessory units moved for a signed garment delta
pub fn scaled_accessory_delta(ratio: Decimal, garment_delta: i32) -> Decimal {
    ratio * Decimal::from(garment_delta)
}

/// Accessory moves for a signed garment delta, skipping zero ratios
pub fn accessory_moves(accessories: &[AccessoryRatio], garment_delta: i32) -> Vec<AccessoryMove> {
    if garment_delta == 0 {
        return Vec::new();
    }
    accessories
        .iter()
        .filter(|a| !a.ratio.is_zero())
        .map(|a| AccessoryMove {
            accessory_id: a.accessory_id,
            delta: scaled_accessory_delta(a.ratio, garment_delta),
        })
        .collect()
}

/// Reduce a leaf change to the stock moves that keep the ledger in lockstep
pub fn plan_stock_moves(change: &LeafChange, accessories: &[AccessoryRatio]) -> StockPlan {
    let variant_delta = -change.consumption_delta();
    StockPlan {
        variant_delta,
        accessory_moves: accessory_moves(accessories, variant_delta),
        packaging: change.packaging_delta(),
    }
}

/// A bucket could not cover a requested decrease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub available: Decimal,
    pub required: Decimal,
}

/// Advisory sufficiency check against a read quantity
pub fn check_available(available: Decimal, required: Decimal) -> Result<(), Shortfall> {
    if available < required {
        return Err(Shortfall {
            available,
            required,
        });
    }
    Ok(())
}

/// Apply a signed delta the way the ledger's conditional update does:
/// refuse any move that would leave the bucket negative.
pub fn apply_checked(quantity: Decimal, delta: Decimal) -> Result<Decimal, Shortfall> {
    let next = quantity + delta;
    if next < Decimal::ZERO {
        return Err(Shortfall {
            available: quantity,
            required: -delta,
        });
    }
    Ok(next)
}

/// Packaging buckets clamp at zero instead of failing
pub fn apply_clamped(quantity: i32, delta: i32) -> i32 {
    (quantity + delta).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ratio(s: &str) -> AccessoryRatio {
        AccessoryRatio {
            accessory_id: Uuid::new_v4(),
            ratio: Decimal::from_str(s).unwrap(),
        }
    }

    #[test]
    fn test_create_consumes_everything() {
        let change = LeafChange::create(OutputTotals::new(5, 2, 1));
        assert_eq!(change.consumption_delta(), 8);
        let plan = plan_stock_moves(&change, &[]);
        assert_eq!(plan.variant_delta, -8);
        assert_eq!(plan.packaging, PackagingDelta { sort_1: 5, sort_2: 2 });
    }

    #[test]
    fn test_update_only_moves_the_difference() {
        let change = LeafChange::update(OutputTotals::new(5, 0, 0), OutputTotals::new(8, 0, 0));
        let plan = plan_stock_moves(&change, &[]);
        assert_eq!(plan.variant_delta, -3);
        assert_eq!(plan.packaging.sort_1, 3);
    }

    #[test]
    fn test_decrease_releases_stock() {
        let change = LeafChange::update(OutputTotals::new(8, 1, 0), OutputTotals::new(2, 1, 0));
        let plan = plan_stock_moves(&change, &[]);
        assert_eq!(plan.variant_delta, 6);
        assert_eq!(plan.packaging.sort_1, -6);
    }

    #[test]
    fn test_defect_shift_moves_no_packaging() {
        let change = LeafChange::update(OutputTotals::new(4, 0, 0), OutputTotals::new(4, 0, 3));
        let plan = plan_stock_moves(&change, &[]);
        assert_eq!(plan.variant_delta, -3);
        assert!(plan.packaging.is_zero());
    }

    #[test]
    fn test_accessories_scale_by_ratio() {
        let accessories = vec![ratio("2"), ratio("0.5")];
        let plan = plan_stock_moves(&LeafChange::create(OutputTotals::new(3, 0, 0)), &accessories);
        assert_eq!(plan.accessory_moves.len(), 2);
        assert_eq!(plan.accessory_moves[0].delta, Decimal::from(-6));
        assert_eq!(plan.accessory_moves[1].delta, Decimal::from_str("-1.5").unwrap());
    }

    #[test]
    fn test_zero_ratio_is_skipped() {
        let plan = plan_stock_moves(&LeafChange::create(OutputTotals::new(3, 0, 0)), &[ratio("0")]);
        assert!(plan.accessory_moves.is_empty());
    }

    #[test]
    fn test_noop_change() {
        let totals = OutputTotals::new(1, 1, 1);
        let change = LeafChange::update(totals, totals);
        assert!(change.is_noop());
        assert!(plan_stock_moves(&change, &[ratio("1")]).is_empty());
    }

    #[test]
    fn test_largest_leaf_plans_without_overflow() {
        use crate::types::MAX_LEAF_QUANTITY;
        let totals = OutputTotals::new(MAX_LEAF_QUANTITY, MAX_LEAF_QUANTITY, MAX_LEAF_QUANTITY);
        let plan = plan_stock_moves(&LeafChange::create(totals), &[ratio("2.5")]);
        assert_eq!(plan.variant_delta, -3 * MAX_LEAF_QUANTITY);
        assert_eq!(plan.accessory_moves[0].delta, Decimal::from(-7_500_000));

        let back = plan_stock_moves(&LeafChange::delete(totals), &[]);
        assert_eq!(back.variant_delta, 3 * MAX_LEAF_QUANTITY);
    }

    #[test]
    fn test_apply_checked_refuses_negative() {
        let err = apply_checked(Decimal::from(2), Decimal::from(-5)).unwrap_err();
        assert_eq!(err.available, Decimal::from(2));
        assert_eq!(err.required, Decimal::from(5));
        assert_eq!(apply_checked(Decimal::from(5), Decimal::from(-5)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_packaging_clamps_at_zero() {
        assert_eq!(apply_clamped(3, -5), 0);
        assert_eq!(apply_clamped(3, 2), 5);
    }
}
