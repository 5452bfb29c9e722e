//! Field-level request validation.
//!
//! Failures are collected per field (first failure wins) and returned as a
//! map from field name to message, separate from domain errors.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Required string with a character-count window.
    pub fn check_text(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let label = display_name(field);
        let length = value.trim().chars().count();
        if length == 0 {
            self.add(field, format!("please enter your {label}"));
        } else if length < min {
            self.add(field, format!("{label} must be at least {min} characters long"));
        } else if length > max {
            self.add(field, format!("{label} cannot be longer than {max} characters"));
        }
    }

    pub fn check_email(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, format!("please enter your {}", display_name(field)));
        } else if !looks_like_email(value) {
            self.add(field, "please enter a valid email address");
        } else if value.chars().count() > 100 {
            self.add(field, format!("{} cannot be longer than 100 characters", display_name(field)));
        }
    }

    pub fn check_range(&mut self, field: &str, value: i64, min: i64, max: i64) {
        let label = display_name(field);
        if value < min {
            self.add(field, format!("{label} must be at least {min}"));
        } else if value > max {
            self.add(field, format!("{label} cannot be more than {max}"));
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;
}

fn display_name(field: &str) -> String {
    let leaf = field.rsplit('.').next().unwrap_or(field);
    leaf.replace('_', " ")
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !value.chars().any(char::is_whitespace)
}
