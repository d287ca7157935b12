//! Attendance workflows built on the pure utilities in `util` and the
//! entities in `db`.

pub mod analytics;
pub mod check_in;
pub mod course;
pub mod error;
pub mod history;
pub mod rotation;
pub mod session;
mod validation;

pub use error::ServiceError;
