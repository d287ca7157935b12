pub mod config;
pub mod logger;

use validator::ValidationErrors;

/// Collects every validation message, ordered by field name so the output is stable.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(m) => m.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect()
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    validation_messages(errors).join("; ")
}
