pub mod error;
pub mod events;
pub mod id;
pub mod money;
pub mod order;
pub mod payment;
pub mod provider;
pub mod split;
pub mod store;
pub mod webhook;
