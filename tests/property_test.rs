use marketplace_payments::domain::money::{CommissionRate, MoneyAmount};
use marketplace_payments::domain::order::OrderItem;
use marketplace_payments::domain::payment::PaymentStatus;
use marketplace_payments::domain::split::{calculate_transfers, transfers_total};
use proptest::prelude::*;
use uuid::Uuid;

fn arb_status() -> impl Strategy<Value = PaymentStatus> {
    prop::sample::select(PaymentStatus::ALL.to_vec())
}

fn rank(status: PaymentStatus) -> u8 {
    match status {
        PaymentStatus::Created => 0,
        PaymentStatus::Authorized => 1,
        PaymentStatus::Captured => 2,
        PaymentStatus::Succeeded => 3,
        PaymentStatus::Canceled | PaymentStatus::Refunded => 4,
    }
}

fn arb_items() -> impl Strategy<Value = Vec<OrderItem>> {
    prop::collection::vec((1u128..=5, 0i64..=1_000_000, 1u32..=20), 1..12).prop_map(|rows| {
        rows.into_iter()
            .map(|(vendor, price, quantity)| OrderItem {
                id: Uuid::now_v7(),
                vendor_id: Uuid::from_u128(vendor),
                vendor_account_id: None,
                unit_price: MoneyAmount::new(price).unwrap(),
                quantity,
            })
            .collect()
    })
}

proptest! {
    /// Payout plus fee reconstructs the order total for every rate.
    #[test]
    fn split_sums_to_order_total(items in arb_items(), bps in 0u32..=10_000) {
        let rate = CommissionRate::from_bps(bps).unwrap();
        let transfers = calculate_transfers(&items, rate).unwrap();

        let expected: i64 = items
            .iter()
            .map(|i| i.unit_price.minor() * i64::from(i.quantity))
            .sum();
        let reconstructed: i64 = transfers
            .iter()
            .map(|t| t.vendor_payout.minor() + t.platform_fee.minor())
            .sum();
        prop_assert_eq!(reconstructed, expected);
        prop_assert_eq!(transfers_total(&transfers).unwrap().minor(), expected);

        for t in &transfers {
            prop_assert!(t.platform_fee <= t.gross);
            prop_assert_eq!(t.vendor_payout.minor() + t.platform_fee.minor(), t.gross.minor());
        }
    }

    /// One transfer per vendor, ordered by vendor id.
    #[test]
    fn split_is_grouped_and_sorted(items in arb_items(), bps in 0u32..=10_000) {
        let rate = CommissionRate::from_bps(bps).unwrap();
        let transfers = calculate_transfers(&items, rate).unwrap();

        let mut vendors: Vec<Uuid> = items.iter().map(|i| i.vendor_id).collect();
        vendors.sort();
        vendors.dedup();
        let got: Vec<Uuid> = transfers.iter().map(|t| t.vendor_id).collect();
        prop_assert_eq!(got, vendors);
    }

    /// Fee is within half a minor unit of the exact product.
    #[test]
    fn fee_rounds_half_up(minor in 0i64..=1_000_000_000, bps in 0u32..=10_000) {
        let fee = CommissionRate::from_bps(bps).unwrap().fee_for(MoneyAmount::new(minor).unwrap());
        let exact = i128::from(minor) * i128::from(bps);
        let fee_scaled = i128::from(fee.minor()) * 10_000;
        prop_assert!(fee_scaled - exact <= 5_000);
        prop_assert!(exact - fee_scaled < 5_000);
    }

    /// Terminal statuses accept nothing.
    #[test]
    fn terminal_states_reject_all_transitions(target in arb_status()) {
        for terminal in [PaymentStatus::Canceled, PaymentStatus::Refunded] {
            prop_assert!(!terminal.can_transition_to(&target));
        }
    }

    /// A random walk only ever moves forward and stops at a terminal status.
    #[test]
    fn random_walk_never_moves_backwards(
        steps in prop::collection::vec(arb_status(), 1..30)
    ) {
        let mut current = PaymentStatus::Created;
        for next in &steps {
            if current.can_transition_to(next) {
                prop_assert!(!current.is_terminal(), "left terminal {current}");
                prop_assert!(rank(*next) > rank(current), "{current} -> {next}");
                current = *next;
            }
        }
    }

    /// Reachability only points forward and covers every direct transition.
    #[test]
    fn reachable_statuses_lie_ahead(from in arb_status(), to in arb_status()) {
        if from.can_transition_to(&to) {
            prop_assert!(from.can_reach(&to));
        }
        if from.can_reach(&to) {
            prop_assert!(rank(to) > rank(from), "{from} reaches {to}");
            prop_assert!(!to.can_reach(&from));
        }
    }

    /// as_str → try_from roundtrip is identity for any status.
    #[test]
    fn status_roundtrip(status in arb_status()) {
        let roundtripped = PaymentStatus::try_from(status.as_str()).unwrap();
        prop_assert_eq!(roundtripped, status);
    }

    /// Provider decimal strings parse back to the same minor amount.
    #[test]
    fn decimal_string_roundtrip(minor in 0i64..=i64::MAX / 100) {
        let amount = MoneyAmount::new(minor).unwrap();
        let parsed = MoneyAmount::from_decimal_str(&amount.to_decimal_string()).unwrap();
        prop_assert_eq!(parsed, amount);
    }

    /// checked_add matches i64::checked_add and never silently overflows.
    #[test]
    fn money_add_never_silently_overflows(a in 0i64..=i64::MAX, b in 0i64..=i64::MAX) {
        let result = MoneyAmount::new(a).unwrap().checked_add(MoneyAmount::new(b).unwrap());
        match a.checked_add(b) {
            Some(expected) => prop_assert_eq!(result.unwrap().minor(), expected),
            None => prop_assert!(result.is_none()),
        }
    }
}
