pub mod config;
pub mod csv_upload;
pub mod http;
pub mod metrics_server;
pub mod observability;
pub mod reconcile;
pub mod store;

pub use reconcile::ReadingReconciler;
