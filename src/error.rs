use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid home price")]
    InvalidHomePrice,
    #[error("Please enter a valid down payment")]
    InvalidDownPayment,
    #[error("Down payment cannot exceed the home price")]
    DownPaymentExceedsPrice,
    #[error("Please enter an interest rate between 0 and 100%")]
    InvalidInterestRate,
    #[error("Amount cannot be negative")]
    NegativeAmount,
    #[error("This field is required")]
    Required,
    #[error("Please enter a whole number greater than zero")]
    InvalidSquareFootage,
}

/// Field-scoped validation failures, keyed by whatever field enum the form uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors<F: Ord> {
    errors: BTreeMap<F, ValidationError>,
}

impl<F: Ord> Default for ValidationErrors<F> {
    fn default() -> Self {
        Self {
            errors: BTreeMap::new(),
        }
    }
}

impl<F: Ord + Copy> ValidationErrors<F> {
    pub fn insert(&mut self, field: F, error: ValidationError) {
        self.errors.insert(field, error);
    }

    pub fn remove(&mut self, field: F) {
        self.errors.remove(&field);
    }

    pub fn get(&self, field: F) -> Option<&ValidationError> {
        self.errors.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (F, &ValidationError)> {
        self.errors.iter().map(|(field, error)| (*field, error))
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl<F: Ord + Copy + fmt::Debug> fmt::Display for ValidationErrors<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in self.iter() {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{:?}: {}", field, error)?;
            first = false;
        }
        Ok(())
    }
}

impl<F: Ord + Copy + fmt::Debug> std::error::Error for ValidationErrors<F> {}

/// Rejected value for a listing draft field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("`{0}` is not a number")]
    NotANumber(String),
    #[error("price must be greater than zero")]
    NonPositivePrice,
    #[error("bedrooms must be between 1 and 8")]
    BedroomsOutOfRange,
    #[error("bathrooms must be between 1 and 6 in half steps")]
    BathroomsOutOfRange,
    #[error("unknown property type `{0}`")]
    UnknownPropertyType(String),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to read image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a regular file")]
    NotAFile(String),
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("failed to write listing: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode listing: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("listing rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("step {0} is not complete")]
    IncompleteStep(u8),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("submission result arrived for a listing that is no longer open")]
    StaleTicket,
    #[error("listing #{sequence} was sent, but the draft changed while it was in flight")]
    DraftChanged { sequence: u64 },
}
