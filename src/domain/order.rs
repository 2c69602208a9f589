use {
    super::{
        id::TenantId,
        money::{CommissionRate, MoneyAmount},
    },
    uuid::Uuid,
};

/// Order as loaded for checkout, with the owning tenant's commission rate.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub order_number: String,
    pub total_amount: MoneyAmount,
    pub commission_rate: Option<CommissionRate>,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: Uuid,
    pub vendor_id: Uuid,
    /// Vendor's account at the payment provider, target of its split transfer.
    pub vendor_account_id: Option<String>,
    pub unit_price: MoneyAmount,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPaymentStatus {
    Pending,
    Authorized,
    Paid,
    Failed,
    Refunded,
}

impl OrderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Processing,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

/// Order columns written in the same transaction as a payment transition.
/// `status: None` leaves the fulfillment status untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderUpdate {
    pub payment_status: OrderPaymentStatus,
    pub status: Option<OrderStatus>,
}

impl OrderUpdate {
    pub const AUTHORIZED: OrderUpdate = OrderUpdate {
        payment_status: OrderPaymentStatus::Authorized,
        status: None,
    };

    pub const PAID: OrderUpdate = OrderUpdate {
        payment_status: OrderPaymentStatus::Paid,
        status: Some(OrderStatus::Processing),
    };

    pub const CANCELLED: OrderUpdate = OrderUpdate {
        payment_status: OrderPaymentStatus::Failed,
        status: Some(OrderStatus::Cancelled),
    };

    pub const REFUNDED: OrderUpdate = OrderUpdate {
        payment_status: OrderPaymentStatus::Refunded,
        status: Some(OrderStatus::Refunded),
    };
}
