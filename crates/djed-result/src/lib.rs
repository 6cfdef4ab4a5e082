pub mod core_error;
pub mod error;
pub mod field_error;
pub mod result_ext;

pub use core_error::{CoreError, ErrorKind};
pub use error::{NonEmptyErrors, Semigroup};
pub use field_error::FieldError;
pub use result_ext::{ResultExt, from_throwable};
