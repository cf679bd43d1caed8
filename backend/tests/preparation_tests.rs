//! Preparation task orchestration tests
//!
//! Task-level semantics over an in-memory model of lots and order lines:
//! create/cancel as exact inverses, restore-then-reapply updates, the
//! status state machine, and packer-level updates staying clear of the
//! stock ledger.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

use shared::models::TaskStatus;
use shared::validation::{
    check_reservable, validate_packed_quantity, validate_positive_quantity,
    validate_status_transition, ReservationIssue,
};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// One requested line of a task payload
#[derive(Debug, Clone)]
struct ItemSpec {
    order_item_id: u64,
    lot_id: u64,
    quantity: Decimal,
}

/// Why a task operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskError {
    InvalidQuantity,
    ExpiredLot,
    InsufficientStock,
    InsufficientOutstanding,
    InvalidState,
}

/// In-memory model of the orchestrator's world: lots, order lines, and one
/// task's reserved items. Every operation stages its changes and commits
/// only on success, mirroring the per-call transaction.
#[derive(Debug, Clone)]
struct World {
    lot_stock: BTreeMap<u64, Decimal>,
    lot_expiry: BTreeMap<u64, DateTime<Utc>>,
    outstanding: BTreeMap<u64, Decimal>,
    task_items: Vec<ItemSpec>,
    task_status: TaskStatus,
}

impl World {
    fn new() -> Self {
        Self {
            lot_stock: BTreeMap::new(),
            lot_expiry: BTreeMap::new(),
            outstanding: BTreeMap::new(),
            task_items: Vec::new(),
            task_status: TaskStatus::Pending,
        }
    }

    fn add_lot(&mut self, id: u64, quantity: Decimal, expiry_at: DateTime<Utc>) {
        self.lot_stock.insert(id, quantity);
        self.lot_expiry.insert(id, expiry_at);
    }

    fn add_order_line(&mut self, id: u64, remaining: Decimal) {
        self.outstanding.insert(id, remaining);
    }

    /// Reserve one item list into the staged state
    fn apply_items(
        lot_stock: &mut BTreeMap<u64, Decimal>,
        outstanding: &mut BTreeMap<u64, Decimal>,
        lot_expiry: &BTreeMap<u64, DateTime<Utc>>,
        now: DateTime<Utc>,
        items: &[ItemSpec],
    ) -> Result<(), TaskError> {
        for item in items {
            if validate_positive_quantity(item.quantity).is_err() {
                return Err(TaskError::InvalidQuantity);
            }
        }

        for item in items {
            let remaining = outstanding.get_mut(&item.order_item_id).expect("line exists");
            if *remaining < item.quantity {
                return Err(TaskError::InsufficientOutstanding);
            }
            *remaining -= item.quantity;
        }

        let mut ordered: Vec<&ItemSpec> = items.iter().collect();
        ordered.sort_by_key(|i| i.lot_id);
        for item in ordered {
            let stock = lot_stock.get_mut(&item.lot_id).expect("lot exists");
            match check_reservable(*stock, lot_expiry[&item.lot_id], item.quantity, now) {
                Ok(()) => *stock -= item.quantity,
                Err(ReservationIssue::Expired) => return Err(TaskError::ExpiredLot),
                Err(ReservationIssue::InsufficientStock) => {
                    return Err(TaskError::InsufficientStock)
                }
            }
        }

        Ok(())
    }

    /// Repay every reserved item into the staged state, order lines first
    /// and lots second, the same sequence the reserve path uses
    fn restore_items(
        lot_stock: &mut BTreeMap<u64, Decimal>,
        outstanding: &mut BTreeMap<u64, Decimal>,
        items: &[ItemSpec],
    ) {
        let mut by_line: Vec<&ItemSpec> = items.iter().collect();
        by_line.sort_by_key(|i| i.order_item_id);
        for item in by_line {
            *outstanding.get_mut(&item.order_item_id).expect("line exists") += item.quantity;
        }

        let mut by_lot: Vec<&ItemSpec> = items.iter().collect();
        by_lot.sort_by_key(|i| i.lot_id);
        for item in by_lot {
            *lot_stock.get_mut(&item.lot_id).expect("lot exists") += item.quantity;
        }
    }

    /// createTask: reserve everything or persist nothing
    fn create_task(&mut self, now: DateTime<Utc>, items: &[ItemSpec]) -> Result<(), TaskError> {
        let mut lot_stock = self.lot_stock.clone();
        let mut outstanding = self.outstanding.clone();

        Self::apply_items(&mut lot_stock, &mut outstanding, &self.lot_expiry, now, items)?;

        self.lot_stock = lot_stock;
        self.outstanding = outstanding;
        self.task_items = items.to_vec();
        self.task_status = TaskStatus::Pending;
        Ok(())
    }

    /// updateTask with a new item list: restore then reapply atomically
    fn update_task_items(
        &mut self,
        now: DateTime<Utc>,
        items: &[ItemSpec],
    ) -> Result<(), TaskError> {
        if self.task_status.is_terminal() {
            return Err(TaskError::InvalidState);
        }

        let mut lot_stock = self.lot_stock.clone();
        let mut outstanding = self.outstanding.clone();

        Self::restore_items(&mut lot_stock, &mut outstanding, &self.task_items);
        Self::apply_items(&mut lot_stock, &mut outstanding, &self.lot_expiry, now, items)?;

        self.lot_stock = lot_stock;
        self.outstanding = outstanding;
        self.task_items = items.to_vec();
        Ok(())
    }

    /// updateTask with a status change: the state machine applies, and the
    /// cancelled status is reserved for the cancel operation because only
    /// that path compensates the reservations
    fn update_task_status(&mut self, next: TaskStatus) -> Result<(), TaskError> {
        if self.task_status.is_terminal() {
            return Err(TaskError::InvalidState);
        }
        if next == TaskStatus::Cancelled {
            return Err(TaskError::InvalidState);
        }
        if validate_status_transition(self.task_status, next).is_err() {
            return Err(TaskError::InvalidState);
        }
        self.task_status = next;
        Ok(())
    }

    /// cancelTask: full compensation, items kept as history
    fn cancel_task(&mut self) -> Result<(), TaskError> {
        if !self.task_status.can_transition_to(TaskStatus::Cancelled) {
            return Err(TaskError::InvalidState);
        }

        Self::restore_items(&mut self.lot_stock, &mut self.outstanding, &self.task_items.clone());
        self.task_status = TaskStatus::Cancelled;
        Ok(())
    }
}

fn future() -> DateTime<Utc> {
    Utc::now() + Duration::days(30)
}

fn item(order_item_id: u64, lot_id: u64, quantity: &str) -> ItemSpec {
    ItemSpec {
        order_item_id,
        lot_id,
        quantity: dec(quantity),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn world_with_stock() -> World {
        let mut world = World::new();
        world.add_lot(1, dec("10"), future());
        world.add_lot(2, dec("20"), future());
        world.add_order_line(101, dec("15"));
        world.add_order_line(102, dec("8"));
        world
    }

    #[test]
    fn test_create_reserves_stock_and_outstanding() {
        let mut world = world_with_stock();
        world
            .create_task(Utc::now(), &[item(101, 1, "6"), item(102, 2, "8")])
            .unwrap();

        assert_eq!(world.lot_stock[&1], dec("4"));
        assert_eq!(world.lot_stock[&2], dec("12"));
        assert_eq!(world.outstanding[&101], dec("9"));
        assert_eq!(world.outstanding[&102], Decimal::ZERO);
    }

    #[test]
    fn test_create_fails_atomically_on_insufficient_stock() {
        let mut world = world_with_stock();
        let before = world.clone();

        // Second item over-draws lot 2
        let result = world.create_task(Utc::now(), &[item(101, 1, "6"), item(102, 2, "25")]);

        assert_eq!(result, Err(TaskError::InsufficientStock));
        assert_eq!(world.lot_stock, before.lot_stock);
        assert_eq!(world.outstanding, before.outstanding);
        assert!(world.task_items.is_empty());
    }

    #[test]
    fn test_create_fails_on_expired_lot() {
        let mut world = world_with_stock();
        world.add_lot(3, dec("50"), Utc::now() - Duration::days(1));
        let before = world.lot_stock.clone();

        let result = world.create_task(Utc::now(), &[item(101, 3, "5")]);

        assert_eq!(result, Err(TaskError::ExpiredLot));
        assert_eq!(world.lot_stock, before);
    }

    #[test]
    fn test_create_bounded_by_order_line_outstanding() {
        let mut world = world_with_stock();

        // Lot 2 has 20 on hand but line 102 only has 8 outstanding
        let result = world.create_task(Utc::now(), &[item(102, 2, "9")]);

        assert_eq!(result, Err(TaskError::InsufficientOutstanding));
        assert_eq!(world.lot_stock[&2], dec("20"));
    }

    #[test]
    fn test_create_rejects_non_positive_quantity() {
        let mut world = world_with_stock();
        assert_eq!(
            world.create_task(Utc::now(), &[item(101, 1, "0")]),
            Err(TaskError::InvalidQuantity)
        );
    }

    #[test]
    fn test_cancel_is_full_inverse_of_create() {
        let mut world = world_with_stock();
        let before = world.clone();

        world
            .create_task(Utc::now(), &[item(101, 1, "6"), item(102, 2, "8")])
            .unwrap();
        world.cancel_task().unwrap();

        assert_eq!(world.task_status, TaskStatus::Cancelled);
        assert_eq!(world.lot_stock, before.lot_stock);
        assert_eq!(world.outstanding, before.outstanding);
        // Items remain as a historical record
        assert_eq!(world.task_items.len(), 2);
    }

    #[test]
    fn test_cancel_twice_rejected() {
        let mut world = world_with_stock();
        world.create_task(Utc::now(), &[item(101, 1, "6")]).unwrap();

        world.cancel_task().unwrap();
        assert_eq!(world.cancel_task(), Err(TaskError::InvalidState));
        // Compensation happened exactly once
        assert_eq!(world.lot_stock[&1], dec("10"));
    }

    #[test]
    fn test_update_with_same_items_is_a_no_op_on_quantities() {
        let mut world = world_with_stock();
        let items = [item(101, 1, "6"), item(102, 2, "8")];
        world.create_task(Utc::now(), &items).unwrap();

        let stock_before = world.lot_stock.clone();
        let outstanding_before = world.outstanding.clone();

        world.update_task_items(Utc::now(), &items).unwrap();

        assert_eq!(world.lot_stock, stock_before);
        assert_eq!(world.outstanding, outstanding_before);
    }

    #[test]
    fn test_update_moves_reservation_between_lots() {
        let mut world = world_with_stock();
        world.create_task(Utc::now(), &[item(101, 1, "6")]).unwrap();

        world
            .update_task_items(Utc::now(), &[item(101, 2, "6")])
            .unwrap();

        assert_eq!(world.lot_stock[&1], dec("10"));
        assert_eq!(world.lot_stock[&2], dec("14"));
        assert_eq!(world.outstanding[&101], dec("9"));
    }

    #[test]
    fn test_update_can_grow_within_restored_outstanding() {
        let mut world = world_with_stock();
        world.create_task(Utc::now(), &[item(102, 2, "8")]).unwrap();
        assert_eq!(world.outstanding[&102], Decimal::ZERO);

        // The restore phase puts the 8 back, so re-requesting 8 succeeds
        // while 9 would still exceed the line.
        world
            .update_task_items(Utc::now(), &[item(102, 2, "8")])
            .unwrap();
        assert_eq!(
            world.update_task_items(Utc::now(), &[item(102, 2, "9")]),
            Err(TaskError::InsufficientOutstanding)
        );
        assert_eq!(world.lot_stock[&2], dec("12"));
    }

    #[test]
    fn test_failed_update_leaves_old_reservation_intact() {
        let mut world = world_with_stock();
        world.create_task(Utc::now(), &[item(101, 1, "6")]).unwrap();

        let result = world.update_task_items(Utc::now(), &[item(101, 1, "60")]);

        assert_eq!(result, Err(TaskError::InsufficientStock));
        assert_eq!(world.lot_stock[&1], dec("4"));
        assert_eq!(world.task_items.len(), 1);
        assert_eq!(world.task_items[0].quantity, dec("6"));
    }

    #[test]
    fn test_update_cannot_set_cancelled_status() {
        // A status-only update to cancelled would skip the compensation
        // that the cancel operation performs, stranding the reservation
        // debt; it must be rejected with the debt intact.
        let mut world = world_with_stock();
        world.create_task(Utc::now(), &[item(101, 1, "6")]).unwrap();

        assert_eq!(
            world.update_task_status(TaskStatus::Cancelled),
            Err(TaskError::InvalidState)
        );
        assert_eq!(world.task_status, TaskStatus::Pending);
        assert_eq!(world.lot_stock[&1], dec("4"));
        assert_eq!(world.outstanding[&101], dec("9"));

        // The cancel operation still works afterwards and repays in full
        world.cancel_task().unwrap();
        assert_eq!(world.lot_stock[&1], dec("10"));
        assert_eq!(world.outstanding[&101], dec("15"));
    }

    #[test]
    fn test_update_status_follows_state_machine() {
        let mut world = world_with_stock();
        world.create_task(Utc::now(), &[item(101, 1, "6")]).unwrap();

        world.update_task_status(TaskStatus::InProgress).unwrap();
        assert_eq!(
            world.update_task_status(TaskStatus::Pending),
            Err(TaskError::InvalidState)
        );

        world.update_task_status(TaskStatus::Completed).unwrap();
        assert_eq!(
            world.update_task_status(TaskStatus::InProgress),
            Err(TaskError::InvalidState)
        );
    }

    #[test]
    fn test_update_rejected_on_terminal_task() {
        let mut world = world_with_stock();
        world.create_task(Utc::now(), &[item(101, 1, "6")]).unwrap();
        world.cancel_task().unwrap();

        assert_eq!(
            world.update_task_items(Utc::now(), &[item(101, 1, "1")]),
            Err(TaskError::InvalidState)
        );
    }

    #[test]
    fn test_packed_quantity_validation_is_independent_of_stock() {
        // Packer updates only validate their own field; zero is fine
        assert!(validate_packed_quantity(Decimal::ZERO).is_ok());
        assert!(validate_packed_quantity(dec("3.5")).is_ok());
        assert!(validate_packed_quantity(dec("-1")).is_err());
    }

    #[test]
    fn test_status_lifecycle() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Cancelled));
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating valid quantities (positive decimals)
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=1000i64).prop_map(|n| Decimal::new(n, 1)) // 0.1 to 100.0
    }

    /// Strategy for an item list over small pools of lines and lots
    fn items_strategy() -> impl Strategy<Value = Vec<ItemSpec>> {
        prop::collection::vec(
            (1u64..=3, 1u64..=3, quantity_strategy()).prop_map(|(line, lot, quantity)| ItemSpec {
                order_item_id: line,
                lot_id: lot,
                quantity,
            }),
            1..6,
        )
    }

    fn seeded_world() -> World {
        let mut world = World::new();
        for id in 1..=3 {
            world.add_lot(id, dec("1000"), future());
            world.add_order_line(id, dec("1000"));
        }
        world
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Cancel is a full inverse of create for any item list.
        #[test]
        fn prop_cancel_inverts_create(items in items_strategy()) {
            let mut world = seeded_world();
            let before = world.clone();

            world.create_task(Utc::now(), &items).unwrap();
            world.cancel_task().unwrap();

            prop_assert_eq!(world.lot_stock, before.lot_stock);
            prop_assert_eq!(world.outstanding, before.outstanding);
        }

        /// Restore-then-reapply with the same items nets to zero change.
        #[test]
        fn prop_noop_update_is_idempotent(items in items_strategy()) {
            let mut world = seeded_world();
            world.create_task(Utc::now(), &items).unwrap();
            let snapshot = world.clone();

            world.update_task_items(Utc::now(), &items).unwrap();

            prop_assert_eq!(world.lot_stock, snapshot.lot_stock);
            prop_assert_eq!(world.outstanding, snapshot.outstanding);
        }

        /// Conservation across create/update/cancel sequences: stock debits
        /// always equal the task's recorded reservations.
        #[test]
        fn prop_conservation_through_update(
            first in items_strategy(),
            second in items_strategy()
        ) {
            let mut world = seeded_world();
            let initial = world.clone();

            world.create_task(Utc::now(), &first).unwrap();
            world.update_task_items(Utc::now(), &second).unwrap();

            for lot in 1..=3u64 {
                let reserved: Decimal = world
                    .task_items
                    .iter()
                    .filter(|i| i.lot_id == lot)
                    .map(|i| i.quantity)
                    .sum();
                prop_assert_eq!(
                    world.lot_stock[&lot] + reserved,
                    initial.lot_stock[&lot]
                );
            }

            world.cancel_task().unwrap();
            prop_assert_eq!(world.lot_stock, initial.lot_stock);
            prop_assert_eq!(world.outstanding, initial.outstanding);
        }

        /// A failed operation never changes observable state.
        #[test]
        fn prop_failures_have_no_side_effects(items in items_strategy()) {
            let mut world = World::new();
            for id in 1..=3 {
                // Tight stock so most generated lists fail
                world.add_lot(id, dec("5"), future());
                world.add_order_line(id, dec("5"));
            }
            let before = world.clone();

            if world.create_task(Utc::now(), &items).is_err() {
                prop_assert_eq!(world.lot_stock, before.lot_stock);
                prop_assert_eq!(world.outstanding, before.outstanding);
                prop_assert!(world.task_items.is_empty());
            }
        }
    }
}
