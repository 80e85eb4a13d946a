//! Stock reconciliation tests
//!
//! Tests for the inventory ledger including:
//! - Leaf create/update/delete moving variant stock by the consumption delta
//! - Accessory consumption scaled by the article ratio
//! - Buckets never going negative, with rejected writes leaving stock as it was
//! - Delete restoring every bucket to its pre-create level

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    apply_checked, apply_clamped, plan_stock_moves, AccessoryRatio, LeafChange, OutputTotals,
    Shortfall, StockPlan,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// In-memory model of the buckets one leaf record touches
#[derive(Debug, Clone, PartialEq)]
struct Buckets {
    variant: Decimal,
    accessories: BTreeMap<Uuid, Decimal>,
    packaging_sort_1: i32,
    packaging_sort_2: i32,
}

impl Buckets {
    fn new(variant: i32, accessories: &[(Uuid, Decimal)]) -> Self {
        Self {
            variant: Decimal::from(variant),
            accessories: accessories.iter().copied().collect(),
            packaging_sort_1: 0,
            packaging_sort_2: 0,
        }
    }

    /// All-or-nothing, like the write transaction
    fn apply(&mut self, plan: &StockPlan) -> Result<(), Shortfall> {
        let mut next = self.clone();
        next.variant = apply_checked(next.variant, Decimal::from(plan.variant_delta))?;
        for mv in &plan.accessory_moves {
            let quantity = next.accessories.entry(mv.accessory_id).or_insert(Decimal::ZERO);
            *quantity = apply_checked(*quantity, mv.delta)?;
        }
        next.packaging_sort_1 = apply_clamped(next.packaging_sort_1, plan.packaging.sort_1);
        next.packaging_sort_2 = apply_clamped(next.packaging_sort_2, plan.packaging.sort_2);
        *self = next;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Create, raise and delete one leaf against a stock of 20
    #[test]
    fn test_variant_stock_follows_leaf_lifecycle() {
        let mut buckets = Buckets::new(20, &[]);

        let created = OutputTotals::new(5, 0, 0);
        buckets.apply(&plan_stock_moves(&LeafChange::create(created), &[])).unwrap();
        assert_eq!(buckets.variant, Decimal::from(15));

        let updated = OutputTotals::new(8, 0, 0);
        buckets
            .apply(&plan_stock_moves(&LeafChange::update(created, updated), &[]))
            .unwrap();
        assert_eq!(buckets.variant, Decimal::from(12));
        assert_eq!(buckets.packaging_sort_1, 8);

        buckets.apply(&plan_stock_moves(&LeafChange::delete(updated), &[])).unwrap();
        assert_eq!(buckets.variant, Decimal::from(20));
        assert_eq!(buckets.packaging_sort_1, 0);
    }

    /// Three garments at two units each take 6 off the accessory bucket
    #[test]
    fn test_accessory_consumed_by_ratio() {
        let button = Uuid::new_v4();
        let accessories = [AccessoryRatio {
            accessory_id: button,
            ratio: Decimal::from(2),
        }];
        let mut buckets = Buckets::new(100, &[(button, Decimal::from(50))]);

        let plan = plan_stock_moves(&LeafChange::create(OutputTotals::new(3, 0, 0)), &accessories);
        buckets.apply(&plan).unwrap();

        assert_eq!(buckets.accessories[&button], Decimal::from(44));
        assert_eq!(buckets.variant, Decimal::from(97));
    }

    /// Fractional ratios keep three decimals
    #[test]
    fn test_fractional_ratio() {
        let thread = Uuid::new_v4();
        let accessories = [AccessoryRatio {
            accessory_id: thread,
            ratio: dec("0.125"),
        }];
        let mut buckets = Buckets::new(10, &[(thread, dec("1.000"))]);

        let plan = plan_stock_moves(&LeafChange::create(OutputTotals::new(2, 1, 1)), &accessories);
        buckets.apply(&plan).unwrap();

        assert_eq!(buckets.accessories[&thread], dec("0.5"));
    }

    /// Defects consume variant stock but never reach packaging
    #[test]
    fn test_defects_skip_packaging() {
        let mut buckets = Buckets::new(10, &[]);
        let plan = plan_stock_moves(&LeafChange::create(OutputTotals::new(2, 3, 4)), &[]);
        buckets.apply(&plan).unwrap();

        assert_eq!(buckets.variant, Decimal::from(1));
        assert_eq!(buckets.packaging_sort_1, 2);
        assert_eq!(buckets.packaging_sort_2, 3);
    }

    /// A write that would overdraw the variant bucket is rejected
    #[test]
    fn test_insufficient_variant_rejected() {
        let mut buckets = Buckets::new(4, &[]);
        let before = buckets.clone();

        let plan = plan_stock_moves(&LeafChange::create(OutputTotals::new(5, 0, 0)), &[]);
        let err = buckets.apply(&plan).unwrap_err();

        assert_eq!(err.available, Decimal::from(4));
        assert_eq!(err.required, Decimal::from(5));
        assert_eq!(buckets, before);
    }

    /// An accessory shortfall rolls back the variant move too
    #[test]
    fn test_insufficient_accessory_rolls_back_everything() {
        let zipper = Uuid::new_v4();
        let accessories = [AccessoryRatio {
            accessory_id: zipper,
            ratio: Decimal::ONE,
        }];
        let mut buckets = Buckets::new(50, &[(zipper, Decimal::from(2))]);
        let before = buckets.clone();

        let plan = plan_stock_moves(&LeafChange::create(OutputTotals::new(3, 0, 0)), &accessories);
        assert!(buckets.apply(&plan).is_err());
        assert_eq!(buckets, before);
    }

    /// Lowering a leaf needs no stock at all
    #[test]
    fn test_release_succeeds_on_empty_bucket() {
        let mut buckets = Buckets::new(0, &[]);
        let plan = plan_stock_moves(
            &LeafChange::update(OutputTotals::new(6, 0, 0), OutputTotals::new(1, 0, 0)),
            &[],
        );
        buckets.apply(&plan).unwrap();
        assert_eq!(buckets.variant, Decimal::from(5));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating leaf totals
    fn totals_strategy() -> impl Strategy<Value = OutputTotals> {
        (0i32..=50, 0i32..=50, 0i32..=20).prop_map(|(s1, s2, d)| OutputTotals::new(s1, s2, d))
    }

    /// Strategy for generating accessory ratios (0.000 to 5.000)
    fn ratio_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=5000i64).prop_map(|n| Decimal::new(n, 3))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any edit history followed by delete restores every bucket
        #[test]
        fn prop_delete_restores_all_buckets(
            history in prop::collection::vec(totals_strategy(), 1..10),
            ratios in prop::collection::vec(ratio_strategy(), 0..4)
        ) {
            let accessories: Vec<AccessoryRatio> = ratios
                .iter()
                .map(|ratio| AccessoryRatio { accessory_id: Uuid::new_v4(), ratio: *ratio })
                .collect();
            let initial: Vec<(Uuid, Decimal)> = accessories
                .iter()
                .map(|a| (a.accessory_id, Decimal::from(10_000)))
                .collect();
            let mut buckets = Buckets::new(10_000, &initial);
            let start = buckets.clone();

            let mut current = OutputTotals::ZERO;
            for next in &history {
                let plan = plan_stock_moves(&LeafChange::update(current, *next), &accessories);
                prop_assert!(buckets.apply(&plan).is_ok());
                current = *next;
            }
            prop_assert_eq!(
                buckets.variant,
                Decimal::from(10_000 - current.consumed())
            );

            let plan = plan_stock_moves(&LeafChange::delete(current), &accessories);
            prop_assert!(buckets.apply(&plan).is_ok());
            prop_assert_eq!(buckets, start);
        }

        /// Buckets stay non-negative whatever the edits, and refused edits change nothing
        #[test]
        fn prop_stock_never_negative(
            stock in 0i32..=40,
            history in prop::collection::vec(totals_strategy(), 1..10)
        ) {
            let mut buckets = Buckets::new(stock, &[]);
            let mut current = OutputTotals::ZERO;

            for next in &history {
                let before = buckets.clone();
                let plan = plan_stock_moves(&LeafChange::update(current, *next), &[]);
                match buckets.apply(&plan) {
                    Ok(()) => current = *next,
                    Err(shortfall) => {
                        prop_assert!(shortfall.required > shortfall.available);
                        prop_assert_eq!(&buckets, &before);
                    }
                }
                prop_assert!(buckets.variant >= Decimal::ZERO);
                prop_assert_eq!(buckets.variant, Decimal::from(stock - current.consumed()));
            }
        }

        /// Stepwise plans add up to the plan of the whole change
        #[test]
        fn prop_plans_compose(
            a in totals_strategy(),
            b in totals_strategy(),
            c in totals_strategy()
        ) {
            let first = plan_stock_moves(&LeafChange::update(a, b), &[]);
            let second = plan_stock_moves(&LeafChange::update(b, c), &[]);
            let whole = plan_stock_moves(&LeafChange::update(a, c), &[]);

            prop_assert_eq!(first.variant_delta + second.variant_delta, whole.variant_delta);
            prop_assert_eq!(
                first.packaging.sort_1 + second.packaging.sort_1,
                whole.packaging.sort_1
            );
            prop_assert_eq!(
                first.packaging.sort_2 + second.packaging.sort_2,
                whole.packaging.sort_2
            );
        }

        /// Accessory moves are exactly ratio times the variant move
        #[test]
        fn prop_accessory_move_scales_variant_move(
            old in totals_strategy(),
            new in totals_strategy(),
            ratio in ratio_strategy()
        ) {
            let accessories = [AccessoryRatio { accessory_id: Uuid::new_v4(), ratio }];
            let plan = plan_stock_moves(&LeafChange::update(old, new), &accessories);

            if plan.variant_delta == 0 || ratio.is_zero() {
                prop_assert!(plan.accessory_moves.is_empty());
            } else {
                prop_assert_eq!(plan.accessory_moves.len(), 1);
                prop_assert_eq!(
                    plan.accessory_moves[0].delta,
                    ratio * Decimal::from(plan.variant_delta)
                );
            }
        }
    }
}
