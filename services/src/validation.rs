use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::ServiceError;

pub(crate) fn error_with(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Runs the derived validators, turning failures into `ServiceError::Validation`.
pub(crate) fn validate_form<T: Validate>(form: &T) -> Result<(), ServiceError> {
    form.validate()
        .map_err(|errors| ServiceError::Validation(common::validation_messages(&errors)))
}
