use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Invalid email address.";
pub const USERNAME_TAKEN: &str = "That username is taken. Please choose a different one.";
pub const EMAIL_TAKEN: &str = "That email is taken. Please choose a different one.";
pub const NO_ACCOUNT_FOR_EMAIL: &str = "There is no account with that email. You must register first.";

/// Picture extensions accepted by the upload fields
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Per-field validation messages, keyed by form field name
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0.entry(field.to_string()).or_default().push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for `field`, empty if it passed
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Appends every message of `other`
    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Failed to compile email regex")
    })
}

fn check_required(errors: &mut FormErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        false
    } else {
        true
    }
}

fn check_length(errors: &mut FormErrors, field: &str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.add(field, &format!("Field must be between {} and {} characters long.", min, max));
    }
}

fn check_username(errors: &mut FormErrors, username: &str) {
    if check_required(errors, "username", username) {
        check_length(errors, "username", username, 2, 20);
    }
}

fn check_email(errors: &mut FormErrors, email: &str) {
    if check_required(errors, "email", email) {
        if email.chars().count() > 120 || !email_regex().is_match(email) {
            errors.add("email", INVALID_EMAIL);
        }
    }
}

fn check_password_pair(errors: &mut FormErrors, password: &str, confirm_password: &str) {
    check_required(errors, "password", password);
    if check_required(errors, "confirm_password", confirm_password) && password != confirm_password {
        errors.add("confirm_password", "Field must be equal to password.");
    }
}

/// Sign-up form
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    /// Field-level checks; uniqueness is checked against the database by the handler
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_username(&mut errors, &self.username);
        check_email(&mut errors, &self.email);
        check_password_pair(&mut errors, &self.password, &self.confirm_password);
        errors.into_result()
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// Checkbox value; browsers omit the field when unchecked
    pub remember: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_email(&mut errors, &self.email);
        check_required(&mut errors, "password", &self.password);
        errors.into_result()
    }

    /// Whether the "remember me" box was ticked
    pub fn remember(&self) -> bool {
        match self.remember.as_deref() {
            None => false,
            Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "false" | "off" | "0"),
        }
    }
}

/// Account details form; the optional picture travels alongside as an [`Upload`]
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct AccountForm {
    pub username: String,
    pub email: String,
}

impl AccountForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_username(&mut errors, &self.username);
        check_email(&mut errors, &self.email);
        errors.into_result()
    }
}

/// Create/update form for items
///
/// `value` is kept as text so a malformed number becomes a field error
/// rather than a rejected request.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct ItemForm {
    pub title: String,
    pub description: String,
    pub value: String,
}

impl ItemForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if check_required(&mut errors, "title", &self.title) {
            check_length(&mut errors, "title", &self.title, 1, 100);
        }
        check_required(&mut errors, "description", &self.description);
        if check_required(&mut errors, "value", &self.value) {
            match self.parsed_value() {
                None => errors.add("value", "Not a valid float value."),
                Some(v) if v < 0.0 => errors.add("value", "Number must be at least 0."),
                Some(_) => {}
            }
        }
        errors.into_result()
    }

    /// The value as a finite number, if it parses
    pub fn parsed_value(&self) -> Option<f64> {
        self.value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct RequestResetForm {
    pub email: String,
}

impl RequestResetForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_email(&mut errors, &self.email);
        errors.into_result()
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct ResetPasswordForm {
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_password_pair(&mut errors, &self.password, &self.confirm_password);
        errors.into_result()
    }
}

/// A file received from a multipart form
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Lower-cased extension of the client-side filename
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Checks the extension against [`ALLOWED_IMAGE_EXTENSIONS`]
    pub fn validate_image(&self, field: &str) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        let allowed = self
            .extension()
            .is_some_and(|ext| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()));
        if !allowed {
            errors.add(field, "File does not have an approved extension: jpg, jpeg, png");
        }
        errors.into_result()
    }
}

/// `?page=` query parameter of the listings
///
/// Anything that isn't an integer falls back to the first page.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
    }
}

/// `?next=` query parameter of the login page
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct NextQuery {
    pub next: Option<String>,
}

impl NextQuery {
    /// The redirect target, only if it stays on this site
    ///
    /// Only visible ASCII is accepted: browsers drop tabs and newlines when
    /// they parse a `Location`, which can turn `/\t/host` into `//host`.
    pub fn local_target(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| {
            next.starts_with('/')
                && !next.starts_with("//")
                && next.chars().all(|c| c.is_ascii_graphic() && c != '\\')
        })
    }
}
