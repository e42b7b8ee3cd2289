use serde::Serialize;
use tracing::info;

use crate::error::{ValidationError, ValidationErrors};

const BASE_PRICE_PER_SQFT: f64 = 150.0;
const PREMIUM_SUBURB: &str = "borrowdale";
const PREMIUM_SUBURB_MULTIPLIER: f64 = 1.3;

pub const BEDROOM_OPTIONS: [&str; 5] = ["1", "2", "3", "4", "5+"];
pub const BATHROOM_OPTIONS: [&str; 7] = ["1", "1.5", "2", "2.5", "3", "3.5", "4+"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HomeKind {
    #[default]
    House,
    Apartment,
    Townhouse,
    Condo,
}

impl HomeKind {
    pub fn label(self) -> &'static str {
        match self {
            HomeKind::House => "House",
            HomeKind::Apartment => "Apartment",
            HomeKind::Townhouse => "Townhouse",
            HomeKind::Condo => "Condo",
        }
    }

    pub fn next(self) -> Self {
        match self {
            HomeKind::House => HomeKind::Apartment,
            HomeKind::Apartment => HomeKind::Townhouse,
            HomeKind::Townhouse => HomeKind::Condo,
            HomeKind::Condo => HomeKind::House,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub fn label(self) -> &'static str {
        match self {
            Condition::Excellent => "Excellent",
            Condition::Good => "Good",
            Condition::Fair => "Fair",
            Condition::Poor => "Poor",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Condition::Excellent => Condition::Good,
            Condition::Good => Condition::Fair,
            Condition::Fair => Condition::Poor,
            Condition::Poor => Condition::Excellent,
        }
    }

    fn multiplier(self) -> f64 {
        match self {
            Condition::Excellent => 1.1,
            Condition::Poor => 0.85,
            Condition::Good | Condition::Fair => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValuationField {
    PropertyType,
    Location,
    Bedrooms,
    Bathrooms,
    SquareFootage,
    YearBuilt,
    Condition,
    ContactName,
    ContactPhone,
    ContactEmail,
}

impl ValuationField {
    pub const ALL: [ValuationField; 10] = [
        ValuationField::PropertyType,
        ValuationField::Location,
        ValuationField::Bedrooms,
        ValuationField::Bathrooms,
        ValuationField::SquareFootage,
        ValuationField::YearBuilt,
        ValuationField::Condition,
        ValuationField::ContactName,
        ValuationField::ContactPhone,
        ValuationField::ContactEmail,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ValuationField::PropertyType => "Property Type",
            ValuationField::Location => "Location *",
            ValuationField::Bedrooms => "Bedrooms *",
            ValuationField::Bathrooms => "Bathrooms *",
            ValuationField::SquareFootage => "Square Footage *",
            ValuationField::YearBuilt => "Year Built",
            ValuationField::Condition => "Condition",
            ValuationField::ContactName => "Full Name *",
            ValuationField::ContactPhone => "Phone Number *",
            ValuationField::ContactEmail => "Email Address *",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValuationForm {
    pub property_type: HomeKind,
    pub location: String,
    pub bedrooms: Option<&'static str>,
    pub bathrooms: Option<&'static str>,
    pub square_footage: String,
    pub year_built: String,
    pub condition: Condition,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
}

impl ValuationForm {
    pub fn text_mut(&mut self, field: ValuationField) -> Option<&mut String> {
        match field {
            ValuationField::Location => Some(&mut self.location),
            ValuationField::SquareFootage => Some(&mut self.square_footage),
            ValuationField::YearBuilt => Some(&mut self.year_built),
            ValuationField::ContactName => Some(&mut self.contact_name),
            ValuationField::ContactPhone => Some(&mut self.contact_phone),
            ValuationField::ContactEmail => Some(&mut self.contact_email),
            _ => None,
        }
    }

    pub fn display(&self, field: ValuationField) -> String {
        match field {
            ValuationField::PropertyType => self.property_type.label().to_string(),
            ValuationField::Location => self.location.clone(),
            ValuationField::Bedrooms => self.bedrooms.unwrap_or("").to_string(),
            ValuationField::Bathrooms => self.bathrooms.unwrap_or("").to_string(),
            ValuationField::SquareFootage => self.square_footage.clone(),
            ValuationField::YearBuilt => self.year_built.clone(),
            ValuationField::Condition => self.condition.label().to_string(),
            ValuationField::ContactName => self.contact_name.clone(),
            ValuationField::ContactPhone => self.contact_phone.clone(),
            ValuationField::ContactEmail => self.contact_email.clone(),
        }
    }

    /// Steps a choice field to its next option.
    pub fn cycle(&mut self, field: ValuationField) {
        fn next_option(options: &[&'static str], current: Option<&'static str>) -> Option<&'static str> {
            let idx = current
                .and_then(|c| options.iter().position(|o| *o == c))
                .map(|i| (i + 1) % options.len())
                .unwrap_or(0);
            options.get(idx).copied()
        }

        match field {
            ValuationField::PropertyType => self.property_type = self.property_type.next(),
            ValuationField::Condition => self.condition = self.condition.next(),
            ValuationField::Bedrooms => self.bedrooms = next_option(&BEDROOM_OPTIONS, self.bedrooms),
            ValuationField::Bathrooms => {
                self.bathrooms = next_option(&BATHROOM_OPTIONS, self.bathrooms)
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationRequest {
    pub property_type: HomeKind,
    pub location: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub square_footage: u32,
    pub year_built: Option<u16>,
    pub condition: Condition,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
}

pub fn validate(form: &ValuationForm) -> Result<ValuationRequest, ValidationErrors<ValuationField>> {
    let mut errors = ValidationErrors::default();

    let mut required = |field: ValuationField, text: &str| -> String {
        let text = text.trim();
        if text.is_empty() {
            errors.insert(field, ValidationError::Required);
        }
        text.to_string()
    };

    let location = required(ValuationField::Location, &form.location);
    let bedrooms = required(ValuationField::Bedrooms, form.bedrooms.unwrap_or(""));
    let bathrooms = required(ValuationField::Bathrooms, form.bathrooms.unwrap_or(""));
    let contact_name = required(ValuationField::ContactName, &form.contact_name);
    let contact_phone = required(ValuationField::ContactPhone, &form.contact_phone);
    let contact_email = required(ValuationField::ContactEmail, &form.contact_email);

    let sqft_text = form.square_footage.trim().replace(',', "");
    let square_footage = if sqft_text.is_empty() {
        errors.insert(ValuationField::SquareFootage, ValidationError::Required);
        0
    } else {
        match sqft_text.parse::<u32>() {
            Ok(v) if v > 0 => v,
            _ => {
                errors.insert(ValuationField::SquareFootage, ValidationError::InvalidSquareFootage);
                0
            }
        }
    };

    // Optional; anything unreadable is dropped rather than rejected.
    let year_built = form.year_built.trim().parse::<u16>().ok();

    errors.into_result(ValuationRequest {
        property_type: form.property_type,
        location,
        bedrooms,
        bathrooms,
        square_footage,
        year_built,
        condition: form.condition,
        contact_name,
        contact_phone,
        contact_email,
    })
}

/// Rough market value: a flat rate per square foot, scaled for the premium
/// suburb and for condition.
pub fn estimate(request: &ValuationRequest) -> f64 {
    let base = request.square_footage as f64 * BASE_PRICE_PER_SQFT;
    let location = if request.location.to_lowercase().contains(PREMIUM_SUBURB) {
        PREMIUM_SUBURB_MULTIPLIER
    } else {
        1.0
    };
    let value = base * location * request.condition.multiplier();
    info!(sqft = request.square_footage, value, "valuation estimated");
    value
}
