pub mod ledger;
pub mod order_repo;
pub mod payment_repo;
pub mod webhook_repo;
