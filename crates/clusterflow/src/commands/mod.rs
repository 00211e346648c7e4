pub mod delete;
pub mod reconcile;
