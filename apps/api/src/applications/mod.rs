// Applications API: manual application records, dashboard metrics and the
// discovered-jobs search. All reads and writes go through store::ApplicationStore.

pub mod discovery;
pub mod handlers;
pub mod metrics;
pub mod store;
