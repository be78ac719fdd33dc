use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::usecase::ports::remote::RemoteError;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const NOT_STRING: &str = "Not a valid string.";
const BAD_DATE: &str = "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";

/// Collects per-field messages while reading a write payload, so one bad
/// request reports every problem at once.
pub struct FieldValidator<'a> {
    fields: &'a Map<String, Value>,
    errors: BTreeMap<String, Vec<String>>,
}

impl<'a> FieldValidator<'a> {
    pub fn new(payload: &'a Value) -> Result<Self, RemoteError> {
        let fields = payload.as_object().ok_or_else(|| {
            RemoteError::new(400, "Invalid data. Expected a dictionary.")
        })?;
        Ok(FieldValidator {
            fields,
            errors: BTreeMap::new(),
        })
    }

    pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn required_text(&mut self, field: &str, max_len: usize) -> Option<String> {
        let fields = self.fields;
        match fields.get(field) {
            None => {
                self.add_error(field, REQUIRED);
                None
            }
            Some(Value::Null) => {
                self.add_error(field, NOT_NULL);
                None
            }
            Some(value) => {
                let text = self.text(field, value, max_len)?;
                if text.is_empty() {
                    self.add_error(field, NOT_BLANK);
                    return None;
                }
                Some(text)
            }
        }
    }

    pub fn optional_text(&mut self, field: &str, max_len: usize) -> Option<String> {
        let fields = self.fields;
        match fields.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => self.text(field, value, max_len),
        }
    }

    /// Normalized `YYYY-MM-DD`.
    pub fn required_date(&mut self, field: &str) -> Option<String> {
        let fields = self.fields;
        match fields.get(field) {
            None => {
                self.add_error(field, REQUIRED);
                None
            }
            Some(Value::Null) => {
                self.add_error(field, NOT_NULL);
                None
            }
            Some(value) => self.date(field, value),
        }
    }

    pub fn optional_date(&mut self, field: &str) -> Option<String> {
        let fields = self.fields;
        match fields.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) if text.trim().is_empty() => None,
            Some(value) => self.date(field, value),
        }
    }

    /// A nullable foreign key; existence is checked by the caller.
    pub fn optional_pk(&mut self, field: &str) -> Option<i64> {
        let fields = self.fields;
        match fields.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::Number(number)) => match number.as_i64() {
                Some(id) => Some(id),
                None => {
                    self.add_error(field, "Incorrect type. Expected pk value, received float.");
                    None
                }
            },
            Some(Value::String(text)) => match text.trim().parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    self.add_error(field, "Incorrect type. Expected pk value, received str.");
                    None
                }
            },
            Some(_) => {
                self.add_error(field, "Incorrect type. Expected pk value.");
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), RemoteError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(RemoteError::validation(self.errors))
        }
    }

    fn text(&mut self, field: &str, value: &Value, max_len: usize) -> Option<String> {
        let text = match value {
            Value::String(text) => text.trim().to_string(),
            Value::Number(number) => number.to_string(),
            _ => {
                self.add_error(field, NOT_STRING);
                return None;
            }
        };
        if text.chars().count() > max_len {
            self.add_error(
                field,
                format!("Ensure this field has no more than {max_len} characters."),
            );
            return None;
        }
        Some(text)
    }

    fn date(&mut self, field: &str, value: &Value) -> Option<String> {
        let parsed = value
            .as_str()
            .and_then(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok());
        match parsed {
            Some(date) => Some(date.format("%Y-%m-%d").to_string()),
            None => {
                self.add_error(field, BAD_DATE);
                None
            }
        }
    }
}

/// Loose shape check in the spirit of an email field: one `@`, something on
/// both sides, a dot in the domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_every_bad_field_at_once() {
        let payload = json!({
            "first_name": "  ",
            "last_name": null,
            "hire_date": "15/06/2021",
            "position": "x".repeat(101),
        });
        let mut validator = FieldValidator::new(&payload).expect("payload is an object");

        assert_eq!(validator.required_text("first_name", 100), None);
        assert_eq!(validator.required_text("last_name", 100), None);
        assert_eq!(validator.required_text("email", 254), None);
        assert_eq!(validator.required_date("hire_date"), None);
        assert_eq!(validator.required_text("position", 100), None);

        let err = validator.finish().expect_err("validation should fail");
        assert_eq!(err.status, 400);
        assert_eq!(err.field_errors["first_name"], vec![NOT_BLANK]);
        assert_eq!(err.field_errors["last_name"], vec![NOT_NULL]);
        assert_eq!(err.field_errors["email"], vec![REQUIRED]);
        assert_eq!(err.field_errors["hire_date"], vec![BAD_DATE]);
        assert_eq!(
            err.field_errors["position"],
            vec!["Ensure this field has no more than 100 characters."]
        );
    }

    #[test]
    fn optional_fields_accept_null_and_coerce_pk_strings() {
        let payload = json!({ "due_date": "", "status": "3", "assigned_to": null });
        let mut validator = FieldValidator::new(&payload).expect("payload is an object");

        assert_eq!(validator.optional_date("due_date"), None);
        assert_eq!(validator.optional_pk("status"), Some(3));
        assert_eq!(validator.optional_pk("assigned_to"), None);
        assert_eq!(validator.optional_text("description", 10), None);
        assert!(validator.finish().is_ok());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = FieldValidator::new(&json!([1, 2])).err().expect("array should be rejected");
        assert_eq!(err.status, 400);
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada.example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("a da@example.com"));
        assert!(!is_valid_email("@example.com"));
    }
}
