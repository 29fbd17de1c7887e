pub mod audit;
pub mod bulk_actions;
pub mod dlq;
pub mod health;
pub mod metrics;
