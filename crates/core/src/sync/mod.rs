//! Sync domain: models, storage/transport seams, coordinator, notifier.

mod coordinator;
mod model;
mod notifier;
mod store;
mod transport;

pub use coordinator::*;
pub use model::*;
pub use notifier::*;
pub use store::*;
pub use transport::*;
