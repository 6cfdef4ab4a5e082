pub mod breaker;
pub mod client;
pub mod descriptor;
pub mod error;
pub mod events;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use client::{HttpClient, HttpResponse, Interceptor};
pub use descriptor::RequestDescriptor;
pub use error::HttpError;
pub use events::HttpEvent;
