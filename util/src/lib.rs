//! Pure attendance utilities: distance checks, code and device identifiers,
//! input validation, class-name defaults, schedule expansion and the
//! returning-student prefill store.

pub mod code;
pub mod device;
pub mod geo;
pub mod prefill;
pub mod schedule;
pub mod smart_default;
pub mod validators;
