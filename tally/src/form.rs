//! Form decoding and validation.
//!
//! Each form has an explicit `validate` function returning a tagged
//! [`Validated`] result: either the parsed data or an ordered map of
//! per-field messages rendered inline next to the originating inputs.
//! Nothing here is tied to a rendering framework or a schema library.

use chrono::{NaiveDate, Utc};
use indexmap::IndexMap;

use crate::client::RecordPayload;

/// Decoded `application/x-www-form-urlencoded` fields, in submission order.
pub type FormFields = IndexMap<String, String>;

/// Per-field validation messages, in field order.
pub type FieldErrors = IndexMap<&'static str, String>;

/// The outcome of validating a form.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated<T> {
    /// The form parsed cleanly into `T`.
    Valid(T),
    /// One or more fields were rejected.
    Invalid(FieldErrors),
}

/// Decodes a form-urlencoded request body.
///
/// # Examples
///
/// ```
/// use tally::form::decode_form;
///
/// let fields = decode_form(b"title=Rent&amount=1200");
/// assert_eq!(fields["title"], "Rent");
/// assert_eq!(fields["amount"], "1200");
/// ```
#[must_use]
pub fn decode_form(body: &[u8]) -> FormFields {
    form_urlencoded::parse(body)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn field<'a>(fields: &'a FormFields, name: &str) -> &'a str {
    fields.get(name).map_or("", |value| value.trim())
}

/// The login form.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    /// Validates the submitted fields.
    #[must_use]
    pub fn validate(fields: &FormFields) -> Validated<Self> {
        let email = field(fields, "email");
        let password = field(fields, "password");

        let mut errors = FieldErrors::new();
        if email.is_empty() || !email.contains('@') {
            errors.insert("email", "Please enter a valid email address.".to_owned());
        }
        if password.is_empty() {
            errors.insert("password", "Password is required.".to_owned());
        }

        if errors.is_empty() {
            Validated::Valid(Self {
                email: email.to_owned(),
                password: password.to_owned(),
            })
        } else {
            Validated::Invalid(errors)
        }
    }

    /// The field errors shown when the backend rejects the credentials.
    /// Both fields get the same message so the response does not reveal
    /// which one was wrong.
    #[must_use]
    pub fn bad_credentials() -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.insert("email", "Wrong email or password".to_owned());
        errors.insert("password", "Wrong email or password".to_owned());
        errors
    }
}

/// The signup form.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    /// Validates the submitted fields.
    #[must_use]
    pub fn validate(fields: &FormFields) -> Validated<Self> {
        let email = field(fields, "email");
        let password = field(fields, "password");
        let confirm = field(fields, "password_confirm");

        let mut errors = FieldErrors::new();
        if email.is_empty() || !email.contains('@') {
            errors.insert("email", "Please enter a valid email address.".to_owned());
        }
        if password.chars().count() < 8 {
            errors.insert(
                "password",
                "Password must be at least 8 characters long.".to_owned(),
            );
        } else if password != confirm {
            errors.insert("password_confirm", "Passwords must match.".to_owned());
        }

        if errors.is_empty() {
            Validated::Valid(Self {
                email: email.to_owned(),
                password: password.to_owned(),
            })
        } else {
            Validated::Invalid(errors)
        }
    }
}

/// The expense/invoice form; the two resources share a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordForm {
    pub title: String,
    pub description: String,
    pub amount: f64,
    pub date: Option<NaiveDate>,
    pub attachment: Option<String>,
}

impl RecordForm {
    /// Validates the submitted fields.
    ///
    /// The title must be non-empty and at most 30 characters, the amount a
    /// number greater than zero, and the date (when submitted) a parseable
    /// date not in the future.
    #[must_use]
    pub fn validate(fields: &FormFields) -> Validated<Self> {
        let title = field(fields, "title");
        let description = field(fields, "description");
        let amount = field(fields, "amount");
        let date = field(fields, "date");
        let attachment = field(fields, "attachment");

        let mut errors = FieldErrors::new();
        if title.is_empty() || title.chars().count() > 30 {
            errors.insert(
                "title",
                "Invalid title. Must be at most 30 characters long.".to_owned(),
            );
        }

        let amount_number = amount.parse::<f64>().ok();
        match amount_number {
            Some(value) if value > 0.0 && value.is_finite() => {}
            _ => {
                errors.insert(
                    "amount",
                    "Invalid amount. Must be a number greater than zero.".to_owned(),
                );
            }
        }

        let mut parsed_date = None;
        if !date.is_empty() {
            match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                Ok(value) if value <= Utc::now().date_naive() => parsed_date = Some(value),
                _ => {
                    errors.insert(
                        "date",
                        "Invalid date. Must be a date before today.".to_owned(),
                    );
                }
            }
        }

        if !errors.is_empty() {
            return Validated::Invalid(errors);
        }
        Validated::Valid(Self {
            title: title.to_owned(),
            description: description.to_owned(),
            amount: amount_number.unwrap_or_default(),
            date: parsed_date,
            attachment: (!attachment.is_empty()).then(|| attachment.to_owned()),
        })
    }

    /// Converts the form into the payload sent to the backend.
    #[must_use]
    pub fn into_payload(self) -> RecordPayload {
        RecordPayload {
            title: self.title,
            description: self.description,
            amount: self.amount,
            attachment: self.attachment,
        }
    }
}
