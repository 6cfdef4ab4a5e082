pub mod backoff;
pub mod bracket;
pub mod combinators;
pub mod effect;
pub mod error;

pub use backoff::{BackoffKind, RetryPolicy};
pub use bracket::bracket;
pub use combinators::{parallel, race};
pub use effect::{ap, Effect};
pub use error::EffectError;
