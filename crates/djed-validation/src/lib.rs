pub mod branded;
pub mod error;
pub mod primitives;
pub mod validator;

pub use branded::{EmailAddress, Hostname, NonEmptyString};
pub use error::{violation, ValidationError};
pub use validator::{fail, FieldAccumulator, Validator};
