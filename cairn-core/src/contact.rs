//! Contact point validation
//!
//! Channel-specific syntax checks for the contact points a profile carries.
//! A malformed contact point is a recoverable data error: the dispatch path
//! records it as a failed delivery, it must never abort a worker.

use crate::error::CatalogError;
use crate::Channel;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

// E.164-style: optional +, 7..15 digits, first digit nonzero.
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9][0-9]{6,14}$").expect("valid phone regex"));

/// A validated contact point on a profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactPoint {
    Email(String),
    Phone(String),
}

impl ContactPoint {
    /// Validate and normalize an email address (lowercased).
    pub fn email(value: &str) -> Result<Self, CatalogError> {
        let normalized = value.trim().to_lowercase();
        if !EMAIL_RE.is_match(&normalized) {
            return Err(CatalogError::MalformedContactPoint {
                channel: "email".to_string(),
                value: value.to_string(),
                reason: "not a valid email address".to_string(),
            });
        }
        Ok(ContactPoint::Email(normalized))
    }

    /// Validate and normalize a phone number (separators stripped).
    pub fn phone(value: &str) -> Result<Self, CatalogError> {
        let normalized: String = value
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
            .collect();
        if !PHONE_RE.is_match(&normalized) {
            return Err(CatalogError::MalformedContactPoint {
                channel: "phone".to_string(),
                value: value.to_string(),
                reason: "not a valid phone number".to_string(),
            });
        }
        Ok(ContactPoint::Phone(normalized))
    }

    /// The normalized value.
    pub fn value(&self) -> &str {
        match self {
            ContactPoint::Email(v) | ContactPoint::Phone(v) => v,
        }
    }

    /// Whether this contact point can carry messages for the given channel.
    /// Push and page channels address profiles by platform identity, not by
    /// a stored contact point, so they match nothing here.
    pub fn serves(&self, channel: Channel) -> bool {
        match (self, channel) {
            (ContactPoint::Email(_), Channel::Email) => true,
            (ContactPoint::Phone(_), Channel::ZaloOa) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ContactPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactPoint::Email(v) => write!(f, "email:{}", v),
            ContactPoint::Phone(v) => write!(f, "phone:{}", v),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
