//! Domain model (ids, envelopes, queue identity, derived state).

pub mod envelope;
pub mod ids;
pub mod queue;
pub mod state;

pub use envelope::JobEnvelope;
pub use ids::{JobId, LeaseToken};
pub use queue::{KeyLayout, QueueIdentity};
pub use state::QueueState;
