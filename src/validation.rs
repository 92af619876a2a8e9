//! Client-side form validation, applied before any request leaves the process.
//! Each field reports only its first failing rule.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::resources::{CandidateInput, ChangePasswordRequest, NewVoter};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static CNIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{13}$").expect("cnic regex"));

pub const PASSWORD_MIN_LEN: usize = 8;
pub const NAME_MIN_LEN: usize = 3;
const PASSWORD_SPECIALS: &str = "@$!%*?&";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn get(&self, field: &str) -> Option<&str> { self.fields.get(field).map(String::as_str) }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn add(&mut self, field: &'static str, msg: &str) {
        self.fields.entry(field).or_insert_with(|| msg.to_string());
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn check_email(errs: &mut ValidationErrors, email: &str) {
    if email.trim().is_empty() {
        errs.add("email", "Email is required");
    } else if !EMAIL_RE.is_match(email.trim()) {
        errs.add("email", "Invalid email address");
    }
}

fn check_password_len(errs: &mut ValidationErrors, field: &'static str, value: &str, required: &str) {
    if value.is_empty() {
        errs.add(field, required);
    } else if value.chars().count() < PASSWORD_MIN_LEN {
        errs.add(field, "Password must be at least 8 characters");
    }
}

fn is_strong_password(p: &str) -> bool {
    p.chars().any(|c| c.is_ascii_lowercase())
        && p.chars().any(|c| c.is_ascii_uppercase())
        && p.chars().any(|c| c.is_ascii_digit())
        && p.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

pub fn validate_sign_in(email: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    check_email(&mut errs, email);
    check_password_len(&mut errs, "password", password, "Password is required");
    errs.into_result()
}

pub fn validate_forgot_password(email: &str) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    check_email(&mut errs, email);
    errs.into_result()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub full_name: String,
    pub cnic: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

pub fn validate_sign_up(form: &SignUpForm) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    let name = form.full_name.trim();
    if name.is_empty() {
        errs.add("fullName", "Full name is required");
    } else if name.chars().count() < NAME_MIN_LEN {
        errs.add("fullName", "Name must be at least 3 characters");
    }
    if form.cnic.is_empty() {
        errs.add("cnic", "CNIC is required");
    } else if !CNIC_RE.is_match(&form.cnic) {
        errs.add("cnic", "CNIC must be exactly 13 digits and no characters.");
    }
    check_email(&mut errs, &form.email);
    check_password_len(&mut errs, "password", &form.password, "Password is required");
    if form.confirm_password.is_empty() {
        errs.add("confirmPassword", "Confirm password is required");
    } else if form.confirm_password != form.password {
        errs.add("confirmPassword", "Passwords must match");
    }
    errs.into_result()
}

pub fn validate_change_password(req: &ChangePasswordRequest) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    check_password_len(&mut errs, "currentPassword", &req.current_password, "Current password is required");
    check_password_len(&mut errs, "newPassword", &req.new_password, "New password is required");
    if !req.new_password.is_empty() && !is_strong_password(&req.new_password) {
        errs.add(
            "newPassword",
            "Password must contain at least one uppercase letter, one lowercase letter, one number and one special character",
        );
    }
    if !req.new_password.is_empty() && req.new_password == req.current_password {
        errs.add("newPassword", "New password must be different from current password");
    }
    if req.confirm_password.is_empty() {
        errs.add("confirmPassword", "Please confirm your password");
    } else if req.confirm_password != req.new_password {
        errs.add("confirmPassword", "Passwords must match");
    }
    errs.into_result()
}

pub fn validate_candidate(input: &CandidateInput) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    if input.name.trim().is_empty() { errs.add("name", "Name is required"); }
    if input.party.trim().is_empty() { errs.add("party", "Party is required"); }
    if input.image.trim().is_empty() { errs.add("image", "Image URL is required"); }
    errs.into_result()
}

pub fn validate_new_voter(voter: &NewVoter) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();
    if voter.name.trim().is_empty() { errs.add("name", "Name is required"); }
    check_email(&mut errs, &voter.email);
    if voter.cnic.is_empty() {
        errs.add("cnic", "CNIC is required");
    } else if !CNIC_RE.is_match(&voter.cnic) {
        errs.add("cnic", "CNIC must be exactly 13 digits and no characters.");
    }
    if voter.election_id.trim().is_empty() { errs.add("electionId", "Election is required"); }
    errs.into_result()
}
