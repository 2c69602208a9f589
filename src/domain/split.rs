use {
    super::{
        error::PipelineError,
        money::{CommissionRate, MoneyAmount},
        order::OrderItem,
    },
    serde::Serialize,
    std::collections::BTreeMap,
    uuid::Uuid,
};

/// One vendor's share of an order: `gross = vendor_payout + platform_fee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitTransfer {
    pub vendor_id: Uuid,
    pub vendor_account_id: Option<String>,
    pub gross: MoneyAmount,
    pub platform_fee: MoneyAmount,
    pub vendor_payout: MoneyAmount,
}

/// Group line items by vendor and split each vendor subtotal into payout and fee.
///
/// The fee is rounded half-up to the minor unit and the payout takes the
/// remainder, so `payout + fee` always reconstructs the subtotal exactly.
/// Output is ordered by vendor id. Zero-priced vendors still get a transfer.
pub fn calculate_transfers(
    items: &[OrderItem],
    rate: CommissionRate,
) -> Result<Vec<SplitTransfer>, PipelineError> {
    let mut by_vendor: BTreeMap<Uuid, (MoneyAmount, Option<String>)> = BTreeMap::new();

    for item in items {
        let line = item.unit_price.checked_mul(item.quantity).ok_or_else(|| {
            PipelineError::Validation(format!("line total overflows for item {}", item.id))
        })?;
        let entry = by_vendor
            .entry(item.vendor_id)
            .or_insert((MoneyAmount::ZERO, None));
        entry.0 = entry.0.checked_add(line).ok_or_else(|| {
            PipelineError::Validation(format!(
                "vendor subtotal overflows for vendor {}",
                item.vendor_id
            ))
        })?;
        if entry.1.is_none() {
            entry.1 = item.vendor_account_id.clone();
        }
    }

    Ok(by_vendor
        .into_iter()
        .map(|(vendor_id, (subtotal, vendor_account_id))| {
            let platform_fee = rate.fee_for(subtotal);
            SplitTransfer {
                vendor_id,
                vendor_account_id,
                gross: subtotal,
                platform_fee,
                vendor_payout: subtotal - platform_fee,
            }
        })
        .collect())
}

/// Sum of `gross` over all transfers.
pub fn transfers_total(transfers: &[SplitTransfer]) -> Result<MoneyAmount, PipelineError> {
    transfers
        .iter()
        .try_fold(MoneyAmount::ZERO, |acc, t| acc.checked_add(t.gross))
        .ok_or_else(|| PipelineError::Validation("order total overflows".into()))
}
