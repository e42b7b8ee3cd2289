use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::{
    error::{FieldError, MediaError, SubmissionError, WizardError},
    media::{ImageRef, ImageSource, PreviewProvider, UploadProgress},
    mortgage::parse_amount,
    submission::{SubmissionReceipt, SubmissionSink},
};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

pub fn is_valid_email(text: &str) -> bool {
    EMAIL.is_match(text.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Details,
    Specs,
    Media,
    Contact,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Details, Step::Specs, Step::Media, Step::Contact];

    pub fn number(self) -> u8 {
        match self {
            Step::Details => 1,
            Step::Specs => 2,
            Step::Media => 3,
            Step::Contact => 4,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Details => "Property Details",
            Step::Specs => "Specifications",
            Step::Media => "Photos",
            Step::Contact => "Contact Information",
        }
    }

    pub fn next(self) -> Option<Step> {
        match self {
            Step::Details => Some(Step::Specs),
            Step::Specs => Some(Step::Media),
            Step::Media => Some(Step::Contact),
            Step::Contact => None,
        }
    }

    pub fn prev(self) -> Option<Step> {
        match self {
            Step::Details => None,
            Step::Specs => Some(Step::Details),
            Step::Media => Some(Step::Specs),
            Step::Contact => Some(Step::Media),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    House,
    Apartment,
    Villa,
    Townhouse,
    Commercial,
    Land,
}

impl PropertyType {
    pub const ALL: [PropertyType; 6] = [
        PropertyType::House,
        PropertyType::Apartment,
        PropertyType::Villa,
        PropertyType::Townhouse,
        PropertyType::Commercial,
        PropertyType::Land,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PropertyType::House => "House",
            PropertyType::Apartment => "Apartment",
            PropertyType::Villa => "Villa",
            PropertyType::Townhouse => "Townhouse",
            PropertyType::Commercial => "Commercial",
            PropertyType::Land => "Land",
        }
    }

    pub fn parse(text: &str) -> Result<Self, FieldError> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(text))
            .ok_or_else(|| FieldError::UnknownPropertyType(text.to_string()))
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    SwimmingPool,
    Garage,
    Garden,
    Security,
    Wifi,
    AirConditioning,
    Fireplace,
    Balcony,
    Gym,
    TennisCourt,
    SolarPanels,
    Generator,
}

impl Amenity {
    pub const CATALOG: [Amenity; 12] = [
        Amenity::SwimmingPool,
        Amenity::Garage,
        Amenity::Garden,
        Amenity::Security,
        Amenity::Wifi,
        Amenity::AirConditioning,
        Amenity::Fireplace,
        Amenity::Balcony,
        Amenity::Gym,
        Amenity::TennisCourt,
        Amenity::SolarPanels,
        Amenity::Generator,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Amenity::SwimmingPool => "Swimming Pool",
            Amenity::Garage => "Garage",
            Amenity::Garden => "Garden",
            Amenity::Security => "Security",
            Amenity::Wifi => "WiFi",
            Amenity::AirConditioning => "Air Conditioning",
            Amenity::Fireplace => "Fireplace",
            Amenity::Balcony => "Balcony",
            Amenity::Gym => "Gym",
            Amenity::TennisCourt => "Tennis Court",
            Amenity::SolarPanels => "Solar Panels",
            Amenity::Generator => "Generator",
        }
    }
}

/// Bathroom count in half steps, stored as halves (1.5 baths == 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bathrooms(u8);

impl Bathrooms {
    const MIN_HALVES: u8 = 2;
    const MAX_HALVES: u8 = 12;

    pub fn parse(text: &str) -> Result<Self, FieldError> {
        let value = parse_amount(text).ok_or_else(|| FieldError::NotANumber(text.to_string()))?;
        let halves = value * 2.0;
        if halves.fract() != 0.0 || !(1.0..=6.0).contains(&value) {
            return Err(FieldError::BathroomsOutOfRange);
        }
        Ok(Self(halves as u8))
    }

    pub fn value(self) -> f32 {
        self.0 as f32 / 2.0
    }

    /// Cycles 1, 1.5, ... 6 and wraps.
    pub fn next(this: Option<Self>) -> Self {
        match this {
            Some(Self(h)) if h < Self::MAX_HALVES => Self(h + 1),
            _ => Self(Self::MIN_HALVES),
        }
    }
}

impl Serialize for Bathrooms {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingField {
    Title,
    Description,
    Location,
    PropertyType,
    Price,
    Bedrooms,
    Bathrooms,
    SquareFootage,
    ContactName,
    ContactPhone,
    ContactEmail,
}

impl ListingField {
    pub fn for_step(step: Step) -> &'static [ListingField] {
        match step {
            Step::Details => &[
                ListingField::Title,
                ListingField::Description,
                ListingField::Location,
                ListingField::PropertyType,
            ],
            Step::Specs => &[
                ListingField::Price,
                ListingField::Bedrooms,
                ListingField::Bathrooms,
                ListingField::SquareFootage,
            ],
            Step::Media => &[],
            Step::Contact => &[
                ListingField::ContactName,
                ListingField::ContactPhone,
                ListingField::ContactEmail,
            ],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ListingField::Title => "Property Title *",
            ListingField::Description => "Description *",
            ListingField::Location => "Location *",
            ListingField::PropertyType => "Property Type *",
            ListingField::Price => "Price ($) *",
            ListingField::Bedrooms => "Bedrooms *",
            ListingField::Bathrooms => "Bathrooms *",
            ListingField::SquareFootage => "Square Footage",
            ListingField::ContactName => "Full Name *",
            ListingField::ContactPhone => "Phone Number *",
            ListingField::ContactEmail => "Email Address *",
        }
    }

    /// Fields picked from a fixed list rather than typed.
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            ListingField::PropertyType | ListingField::Bedrooms | ListingField::Bathrooms
        )
    }
}

/// The listing being assembled across the four steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    pub property_type: Option<PropertyType>,
    pub price: Option<f64>,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<Bathrooms>,
    pub square_footage: Option<u32>,
    pub amenities: BTreeSet<Amenity>,
    pub images: Vec<ImageRef>,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
}

impl Default for ListingDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            location: String::new(),
            property_type: Some(PropertyType::House),
            price: None,
            bedrooms: None,
            bathrooms: None,
            square_footage: None,
            amenities: BTreeSet::new(),
            images: Vec::new(),
            contact_name: String::new(),
            contact_phone: String::new(),
            contact_email: String::new(),
        }
    }
}

fn filled(text: &str) -> bool {
    !text.trim().is_empty()
}

impl ListingDraft {
    pub fn is_complete(&self, step: Step) -> bool {
        match step {
            Step::Details => {
                filled(&self.title)
                    && filled(&self.description)
                    && filled(&self.location)
                    && self.property_type.is_some()
            }
            Step::Specs => {
                self.price.is_some_and(|p| p > 0.0)
                    && self.bedrooms.is_some()
                    && self.bathrooms.is_some()
            }
            Step::Media => !self.images.is_empty(),
            Step::Contact => {
                filled(&self.contact_name)
                    && filled(&self.contact_phone)
                    && is_valid_email(&self.contact_email)
            }
        }
    }

    /// Display text for a field, empty when unset.
    pub fn field_text(&self, field: ListingField) -> String {
        match field {
            ListingField::Title => self.title.clone(),
            ListingField::Description => self.description.clone(),
            ListingField::Location => self.location.clone(),
            ListingField::PropertyType => self
                .property_type
                .map(|k| k.label().to_string())
                .unwrap_or_default(),
            ListingField::Price => self.price.map(|p| p.to_string()).unwrap_or_default(),
            ListingField::Bedrooms => self.bedrooms.map(|b| b.to_string()).unwrap_or_default(),
            ListingField::Bathrooms => self
                .bathrooms
                .map(|b| b.value().to_string())
                .unwrap_or_default(),
            ListingField::SquareFootage => self
                .square_footage
                .map(|s| s.to_string())
                .unwrap_or_default(),
            ListingField::ContactName => self.contact_name.clone(),
            ListingField::ContactPhone => self.contact_phone.clone(),
            ListingField::ContactEmail => self.contact_email.clone(),
        }
    }

    fn text_mut(&mut self, field: ListingField) -> Option<&mut String> {
        match field {
            ListingField::Title => Some(&mut self.title),
            ListingField::Description => Some(&mut self.description),
            ListingField::Location => Some(&mut self.location),
            ListingField::ContactName => Some(&mut self.contact_name),
            ListingField::ContactPhone => Some(&mut self.contact_phone),
            ListingField::ContactEmail => Some(&mut self.contact_email),
            _ => None,
        }
    }

    fn clear(&mut self, field: ListingField) {
        match field {
            ListingField::PropertyType => self.property_type = None,
            ListingField::Price => self.price = None,
            ListingField::Bedrooms => self.bedrooms = None,
            ListingField::Bathrooms => self.bathrooms = None,
            ListingField::SquareFootage => self.square_footage = None,
            other => {
                if let Some(text) = self.text_mut(other) {
                    text.clear();
                }
            }
        }
    }

    fn set(&mut self, field: ListingField, value: &str) -> Result<(), FieldError> {
        let not_a_number = || FieldError::NotANumber(value.to_string());
        match field {
            ListingField::PropertyType => self.property_type = Some(PropertyType::parse(value)?),
            ListingField::Price => {
                let price = parse_amount(value).ok_or_else(not_a_number)?;
                if price <= 0.0 {
                    return Err(FieldError::NonPositivePrice);
                }
                self.price = Some(price);
            }
            ListingField::Bedrooms => {
                let beds: u8 = value.trim().parse().map_err(|_| not_a_number())?;
                if !(1..=8).contains(&beds) {
                    return Err(FieldError::BedroomsOutOfRange);
                }
                self.bedrooms = Some(beds);
            }
            ListingField::Bathrooms => self.bathrooms = Some(Bathrooms::parse(value)?),
            ListingField::SquareFootage => {
                let sqft = value
                    .trim()
                    .replace(',', "")
                    .parse::<u32>()
                    .map_err(|_| not_a_number())?;
                self.square_footage = Some(sqft);
            }
            ListingField::ContactName | ListingField::ContactPhone | ListingField::ContactEmail => {
                if let Some(text) = self.text_mut(field) {
                    *text = value.trim().to_string();
                }
            }
            other => {
                if let Some(text) = self.text_mut(other) {
                    *text = value.to_string();
                }
            }
        }
        Ok(())
    }
}

/// Result of a submission started with [`ListingWizard::begin_submission`].
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    generation: u64,
    draft: ListingDraft,
}

impl SubmissionTicket {
    pub fn draft(&self) -> &ListingDraft {
        &self.draft
    }
}

/// Four-step listing intake. Advancing requires the current step to be
/// complete; retreating never does.
pub struct ListingWizard<P: PreviewProvider> {
    current: Step,
    draft: ListingDraft,
    upload: UploadProgress,
    previews: P,
    generation: u64,
}

impl<P: PreviewProvider> ListingWizard<P> {
    pub fn new(previews: P) -> Self {
        Self {
            current: Step::Details,
            draft: ListingDraft::default(),
            upload: UploadProgress::default(),
            previews,
            generation: 0,
        }
    }

    pub fn current(&self) -> Step {
        self.current
    }

    pub fn draft(&self) -> &ListingDraft {
        &self.draft
    }

    pub fn previews(&self) -> &P {
        &self.previews
    }

    pub fn is_complete(&self, step: Step) -> bool {
        self.draft.is_complete(step)
    }

    pub fn advance(&mut self) -> bool {
        let Some(next) = self.current.next() else {
            return false;
        };
        if !self.is_complete(self.current) {
            debug!(step = self.current.number(), "advance blocked, step incomplete");
            return false;
        }
        info!(from = self.current.number(), to = next.number(), "listing step advanced");
        self.current = next;
        true
    }

    pub fn retreat(&mut self) -> bool {
        match self.current.prev() {
            Some(prev) => {
                self.current = prev;
                true
            }
            None => false,
        }
    }

    /// Empty text clears the field. Text that does not fit the field also
    /// clears it and reports why.
    pub fn update_field(&mut self, field: ListingField, value: &str) -> Result<(), FieldError> {
        if value.trim().is_empty() {
            self.draft.clear(field);
            return Ok(());
        }
        if let Err(err) = self.draft.set(field, value) {
            debug!(?field, %err, "listing field rejected");
            self.draft.clear(field);
            return Err(err);
        }
        Ok(())
    }

    pub fn toggle_amenity(&mut self, amenity: Amenity) {
        if !self.draft.amenities.remove(&amenity) {
            self.draft.amenities.insert(amenity);
        }
    }

    /// Attaches a batch of images and restarts the upload indicator.
    /// Either every image in the batch gets a preview or none is added.
    pub fn add_images(&mut self, sources: Vec<ImageSource>) -> Result<usize, MediaError> {
        if sources.is_empty() {
            return Ok(0);
        }

        let mut batch = Vec::with_capacity(sources.len());
        for source in sources {
            match self.previews.create_preview(&source) {
                Ok(preview_url) => batch.push(ImageRef {
                    source,
                    preview_url,
                }),
                Err(err) => {
                    for image in &batch {
                        self.previews.release_preview(&image.preview_url);
                    }
                    return Err(err);
                }
            }
        }

        let added = batch.len();
        self.draft.images.extend(batch);
        self.upload.cancel();
        self.upload = UploadProgress::start();
        info!(added, total = self.draft.images.len(), "images attached");
        Ok(added)
    }

    pub fn remove_image(&mut self, index: usize) -> Option<ImageRef> {
        if index >= self.draft.images.len() {
            return None;
        }
        let image = self.draft.images.remove(index);
        self.previews.release_preview(&image.preview_url);
        Some(image)
    }

    pub fn upload_progress(&self) -> UploadProgress {
        self.upload
    }

    pub fn tick_upload(&mut self) -> u8 {
        self.upload.tick()
    }

    pub fn cancel_upload(&mut self) {
        self.upload.cancel();
    }

    /// First step whose required fields are not all filled in.
    pub fn first_incomplete_step(&self) -> Option<Step> {
        Step::ALL.into_iter().find(|step| !self.is_complete(*step))
    }

    pub fn begin_submission(&self) -> Result<SubmissionTicket, WizardError> {
        if let Some(step) = self.first_incomplete_step() {
            return Err(WizardError::IncompleteStep(step.number()));
        }
        Ok(SubmissionTicket {
            generation: self.generation,
            draft: self.draft.clone(),
        })
    }

    /// Applies the sink's answer. A ticket from before the last reset or
    /// abandon is ignored. A failure, or a success for a draft that has
    /// since been edited, leaves the draft untouched.
    pub fn finish_submission(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<SubmissionReceipt, SubmissionError>,
    ) -> Result<SubmissionReceipt, WizardError> {
        if ticket.generation != self.generation {
            debug!(ticket = ticket.generation, current = self.generation, "stale submission ignored");
            return Err(WizardError::StaleTicket);
        }
        match result {
            Ok(receipt) if ticket.draft != self.draft => {
                warn!(sequence = receipt.sequence, "draft edited during submission, edits kept");
                Err(WizardError::DraftChanged {
                    sequence: receipt.sequence,
                })
            }
            Ok(receipt) => {
                info!(sequence = receipt.sequence, title = %ticket.draft.title, "listing submitted");
                self.reset();
                Ok(receipt)
            }
            Err(err) => {
                warn!(%err, "listing submission failed, draft kept");
                Err(WizardError::Submission(err))
            }
        }
    }

    pub fn submit(&mut self, sink: &mut dyn SubmissionSink) -> Result<SubmissionReceipt, WizardError> {
        let ticket = self.begin_submission()?;
        let result = sink.submit_listing(ticket.draft());
        self.finish_submission(ticket, result)
    }

    /// Drops the draft without submitting it.
    pub fn abandon(&mut self) {
        if self.draft != ListingDraft::default() {
            info!("listing draft abandoned");
        }
        self.reset();
    }

    fn release_all(&mut self) {
        for image in self.draft.images.drain(..) {
            self.previews.release_preview(&image.preview_url);
        }
    }

    fn reset(&mut self) {
        self.release_all();
        self.upload.cancel();
        self.draft = ListingDraft::default();
        self.current = Step::Details;
        self.generation += 1;
    }
}

impl<P: PreviewProvider> Drop for ListingWizard<P> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PreviewRegistry;
    use proptest::prelude::*;
    use std::path::PathBuf;

    struct FailingSink;

    impl SubmissionSink for FailingSink {
        fn submit_listing(&mut self, _draft: &ListingDraft) -> Result<SubmissionReceipt, SubmissionError> {
            Err(SubmissionError::Rejected("offline".to_string()))
        }
    }

    struct AcceptingSink(u64);

    impl SubmissionSink for AcceptingSink {
        fn submit_listing(&mut self, _draft: &ListingDraft) -> Result<SubmissionReceipt, SubmissionError> {
            self.0 += 1;
            Ok(SubmissionReceipt { sequence: self.0 })
        }
    }

    fn image(name: &str) -> ImageSource {
        ImageSource {
            path: PathBuf::from(name),
            bytes: 1024,
        }
    }

    fn filled_wizard() -> ListingWizard<PreviewRegistry> {
        let mut wizard = ListingWizard::new(PreviewRegistry::new());
        wizard.update_field(ListingField::Title, "Garden cottage").unwrap();
        wizard.update_field(ListingField::Description, "Quiet street").unwrap();
        wizard.update_field(ListingField::Location, "Borrowdale").unwrap();
        wizard.update_field(ListingField::Price, "250000").unwrap();
        wizard.update_field(ListingField::Bedrooms, "3").unwrap();
        wizard.update_field(ListingField::Bathrooms, "1.5").unwrap();
        wizard.add_images(vec![image("front.jpg")]).unwrap();
        wizard.update_field(ListingField::ContactName, "Sam Moyo").unwrap();
        wizard.update_field(ListingField::ContactPhone, "+263 77 000 0000").unwrap();
        wizard.update_field(ListingField::ContactEmail, "sam@example.com").unwrap();
        wizard
    }

    #[test]
    fn advance_blocked_until_step_complete() {
        let mut wizard = ListingWizard::new(PreviewRegistry::new());
        assert!(!wizard.advance());
        assert_eq!(wizard.current(), Step::Details);

        wizard.update_field(ListingField::Title, "Loft").unwrap();
        wizard.update_field(ListingField::Description, "Open plan").unwrap();
        wizard.update_field(ListingField::Location, "Avondale").unwrap();
        assert!(wizard.is_complete(Step::Details));
        assert!(!wizard.is_complete(Step::Specs));

        assert!(wizard.advance());
        assert_eq!(wizard.current(), Step::Specs);
        assert!(!wizard.advance());
        assert_eq!(wizard.current(), Step::Specs);
    }

    #[test]
    fn retreat_stops_at_first_step() {
        let mut wizard = filled_wizard();
        assert!(!wizard.retreat());
        assert_eq!(wizard.current(), Step::Details);

        assert!(wizard.advance());
        assert!(wizard.advance());
        assert!(wizard.retreat());
        assert_eq!(wizard.current(), Step::Specs);
        assert!(wizard.is_complete(Step::Media));
    }

    #[test]
    fn advance_is_noop_on_last_step() {
        let mut wizard = filled_wizard();
        for _ in 0..3 {
            assert!(wizard.advance());
        }
        assert_eq!(wizard.current(), Step::Contact);
        assert!(!wizard.advance());
        assert_eq!(wizard.current(), Step::Contact);
    }

    #[test]
    fn rejected_values_clear_the_field() {
        let mut wizard = ListingWizard::new(PreviewRegistry::new());
        wizard.update_field(ListingField::Bedrooms, "4").unwrap();
        assert_eq!(
            wizard.update_field(ListingField::Bedrooms, "9"),
            Err(FieldError::BedroomsOutOfRange)
        );
        assert_eq!(wizard.draft().bedrooms, None);

        assert_eq!(
            wizard.update_field(ListingField::Bathrooms, "2.25"),
            Err(FieldError::BathroomsOutOfRange)
        );
        assert!(wizard.update_field(ListingField::Bathrooms, "6").is_ok());
        assert_eq!(wizard.draft().bathrooms.map(Bathrooms::value), Some(6.0));

        assert_eq!(
            wizard.update_field(ListingField::Price, "0"),
            Err(FieldError::NonPositivePrice)
        );
        wizard.update_field(ListingField::SquareFootage, "1,800").unwrap();
        assert_eq!(wizard.draft().square_footage, Some(1800));
        wizard.update_field(ListingField::SquareFootage, "").unwrap();
        assert_eq!(wizard.draft().square_footage, None);
    }

    #[test]
    fn property_type_parses_labels() {
        let mut wizard = ListingWizard::new(PreviewRegistry::new());
        wizard.update_field(ListingField::PropertyType, "villa").unwrap();
        assert_eq!(wizard.draft().property_type, Some(PropertyType::Villa));
        assert!(wizard.update_field(ListingField::PropertyType, "castle").is_err());
        assert!(!wizard.is_complete(Step::Details));
    }

    #[test]
    fn contact_step_needs_a_plausible_email() {
        let mut wizard = filled_wizard();
        wizard.update_field(ListingField::ContactEmail, "sam at example").unwrap();
        assert!(!wizard.is_complete(Step::Contact));
        wizard.update_field(ListingField::ContactEmail, " sam@example.co.zw ").unwrap();
        assert!(wizard.is_complete(Step::Contact));
        assert_eq!(wizard.draft().contact_email, "sam@example.co.zw");
    }

    #[test]
    fn contact_details_are_stored_trimmed() {
        let mut wizard = filled_wizard();
        wizard.update_field(ListingField::ContactName, "  Sam Moyo ").unwrap();
        wizard.update_field(ListingField::ContactPhone, "+263 77 000 0000 ").unwrap();

        let json = serde_json::to_value(wizard.draft()).unwrap();
        assert_eq!(json["contact_name"], "Sam Moyo");
        assert_eq!(json["contact_phone"], "+263 77 000 0000");
    }

    #[test]
    fn removing_image_releases_preview() {
        let mut wizard = ListingWizard::new(PreviewRegistry::new());
        wizard.add_images(vec![image("a.jpg"), image("b.jpg")]).unwrap();
        assert_eq!(wizard.previews().live_count(), 2);

        let removed = wizard.remove_image(0).unwrap();
        assert_eq!(removed.source.path, PathBuf::from("a.jpg"));
        assert!(!wizard.previews().is_live(&removed.preview_url));
        assert_eq!(wizard.draft().images.len(), 1);
        assert_eq!(wizard.draft().images[0].source.path, PathBuf::from("b.jpg"));

        assert!(wizard.remove_image(5).is_none());
        assert_eq!(wizard.draft().images.len(), 1);
    }

    #[test]
    fn new_batch_restarts_progress() {
        let mut wizard = ListingWizard::new(PreviewRegistry::new());
        wizard.add_images(vec![image("a.jpg")]).unwrap();
        wizard.tick_upload();
        wizard.tick_upload();
        assert_eq!(wizard.upload_progress().percent(), 20);

        wizard.add_images(vec![image("b.jpg")]).unwrap();
        assert_eq!(wizard.upload_progress().percent(), 0);
        assert!(wizard.upload_progress().is_active());
        assert_eq!(wizard.draft().images.len(), 2);
    }

    #[test]
    fn failed_submission_keeps_draft() {
        let mut wizard = filled_wizard();
        let before = wizard.draft().clone();
        let err = wizard.submit(&mut FailingSink).unwrap_err();
        assert!(matches!(err, WizardError::Submission(SubmissionError::Rejected(_))));
        assert_eq!(wizard.draft(), &before);

        let receipt = wizard.submit(&mut AcceptingSink(0)).unwrap();
        assert_eq!(receipt.sequence, 1);
        assert_eq!(wizard.draft(), &ListingDraft::default());
        assert_eq!(wizard.current(), Step::Details);
        assert_eq!(wizard.previews().live_count(), 0);
    }

    #[test]
    fn submit_requires_every_step() {
        let mut wizard = filled_wizard();
        wizard.remove_image(0);
        let err = wizard.submit(&mut AcceptingSink(0)).unwrap_err();
        assert!(matches!(err, WizardError::IncompleteStep(3)));
    }

    #[test]
    fn stale_ticket_is_ignored_after_abandon() {
        let mut wizard = filled_wizard();
        let ticket = wizard.begin_submission().unwrap();
        wizard.abandon();
        assert_eq!(wizard.previews().live_count(), 0);

        let late = wizard.finish_submission(ticket, Ok(SubmissionReceipt { sequence: 7 }));
        assert!(matches!(late, Err(WizardError::StaleTicket)));
        assert_eq!(wizard.draft(), &ListingDraft::default());
    }

    #[test]
    fn edits_made_while_submitting_are_kept() {
        let mut wizard = filled_wizard();
        let ticket = wizard.begin_submission().unwrap();
        wizard.update_field(ListingField::Title, "Garden cottage, new roof").unwrap();

        let outcome = wizard.finish_submission(ticket, Ok(SubmissionReceipt { sequence: 3 }));
        assert!(matches!(outcome, Err(WizardError::DraftChanged { sequence: 3 })));
        assert_eq!(wizard.draft().title, "Garden cottage, new roof");
        assert_eq!(wizard.previews().live_count(), 1);

        let mut sink = AcceptingSink(3);
        assert_eq!(wizard.submit(&mut sink).unwrap().sequence, 4);
        assert_eq!(wizard.draft(), &ListingDraft::default());
    }

    #[test]
    fn draft_serializes_for_the_outbox() {
        let wizard = filled_wizard();
        let json = serde_json::to_value(wizard.draft()).unwrap();
        assert_eq!(json["property_type"], "house");
        assert_eq!(json["bathrooms"], 1.5);
        assert_eq!(json["images"][0]["source"]["path"], "front.jpg");
    }

    proptest! {
        #[test]
        fn toggling_twice_restores_amenities(
            start in proptest::collection::btree_set(0usize..12, 0..12),
            pick in 0usize..12,
        ) {
            let mut wizard = ListingWizard::new(PreviewRegistry::new());
            for idx in &start {
                wizard.toggle_amenity(Amenity::CATALOG[*idx]);
            }
            let before = wizard.draft().amenities.clone();
            wizard.toggle_amenity(Amenity::CATALOG[pick]);
            wizard.toggle_amenity(Amenity::CATALOG[pick]);
            prop_assert_eq!(&wizard.draft().amenities, &before);
        }
    }
}
