use realty_desk::{
    listing::{Amenity, ListingField, ListingWizard, Step},
    media::{ImageSource, PreviewRegistry},
    mortgage::{compute_monthly_payment, validate, MortgageEstimator, MortgageField, MortgageForm},
    submission::{OutboxSink, SubmissionSink},
};
use std::fs;

fn loan_form(price: &str, down: &str, rate: &str) -> MortgageForm {
    MortgageForm {
        home_price: price.to_string(),
        down_payment: down.to_string(),
        interest_rate: rate.to_string(),
        ..MortgageForm::default()
    }
}

#[test]
fn thirty_year_loan_at_three_and_a_half_percent() {
    let input = validate(&loan_form("500000", "100000", "3.5")).unwrap();
    assert_eq!(input.loan_term.years(), 30);

    let result = compute_monthly_payment(&input);
    assert_eq!(result.loan_amount, 400_000.0);
    assert!((result.monthly_principal_and_interest - 1796.18).abs() < 0.01);
    assert!((result.total_interest_over_term - 246_625.0).abs() < 5.0);
    assert_eq!(result.total_monthly_payment, result.monthly_principal_and_interest);
}

#[test]
fn fully_paid_home_has_no_payment() {
    let input = validate(&loan_form("100000", "100000", "5")).unwrap();
    let result = compute_monthly_payment(&input);
    assert_eq!(result.loan_amount, 0.0);
    assert_eq!(result.total_monthly_payment, 0.0);
    assert_eq!(result.total_interest_over_term, 0.0);
}

#[test]
fn estimator_recomputes_explicitly_after_updates() {
    let mut estimator = MortgageEstimator::new();
    estimator.update_field(MortgageField::HomePrice, "500000");
    estimator.update_field(MortgageField::DownPayment, "100000");
    estimator.update_field(MortgageField::InterestRate, "3.5");
    assert!(estimator.result().is_none());

    let monthly = estimator.recompute().unwrap().total_monthly_payment;
    estimator.update_field(MortgageField::PropertyTax, "2400");
    let with_tax = estimator.recompute().unwrap().total_monthly_payment;
    assert!((with_tax - monthly - 200.0).abs() < 1e-9);
}

#[test]
fn only_details_filled_advances_once() {
    let mut wizard = ListingWizard::new(PreviewRegistry::new());
    wizard.update_field(ListingField::Title, "Family home").unwrap();
    wizard.update_field(ListingField::Description, "Four bedrooms, big yard").unwrap();
    wizard.update_field(ListingField::Location, "Highlands").unwrap();

    assert!(wizard.is_complete(Step::Details));
    assert!(!wizard.is_complete(Step::Specs));
    assert!(wizard.advance());
    assert_eq!(wizard.current(), Step::Specs);
    assert!(!wizard.advance());
    assert_eq!(wizard.current(), Step::Specs);
}

#[test]
fn removing_first_of_two_images_keeps_second() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("kitchen.jpg");
    let second = dir.path().join("lounge.jpg");
    fs::write(&first, b"one").unwrap();
    fs::write(&second, b"two").unwrap();

    let mut wizard = ListingWizard::new(PreviewRegistry::new());
    let sources = vec![
        ImageSource::from_path(&first).unwrap(),
        ImageSource::from_path(&second).unwrap(),
    ];
    assert_eq!(wizard.add_images(sources).unwrap(), 2);

    wizard.remove_image(0).unwrap();
    let images = &wizard.draft().images;
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].source.path, second);
    assert_eq!(wizard.previews().live_count(), 1);
}

#[test]
fn complete_listing_lands_in_outbox() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("front.png");
    fs::write(&photo, b"png").unwrap();
    let outbox = dir.path().join("listings.jsonl");

    let mut wizard = ListingWizard::new(PreviewRegistry::new());
    for (field, value) in [
        (ListingField::Title, "Hillside villa"),
        (ListingField::Description, "Views over the valley"),
        (ListingField::Location, "Borrowdale Brooke"),
        (ListingField::PropertyType, "Villa"),
        (ListingField::Price, "450,000"),
        (ListingField::Bedrooms, "5"),
        (ListingField::Bathrooms, "3.5"),
        (ListingField::ContactName, "Tendai"),
        (ListingField::ContactPhone, "0242 000 000"),
        (ListingField::ContactEmail, "tendai@example.org"),
    ] {
        wizard.update_field(field, value).unwrap();
    }
    wizard.toggle_amenity(Amenity::SwimmingPool);
    wizard.toggle_amenity(Amenity::SolarPanels);
    wizard
        .add_images(vec![ImageSource::from_path(&photo).unwrap()])
        .unwrap();

    while wizard.advance() {}
    assert_eq!(wizard.current(), Step::Contact);

    let mut sink = OutboxSink::open(&outbox).unwrap();
    let receipt = wizard.submit(&mut sink as &mut dyn SubmissionSink).unwrap();
    assert_eq!(receipt.sequence, 1);
    assert_eq!(wizard.current(), Step::Details);
    assert_eq!(wizard.previews().live_count(), 0);

    let line = fs::read_to_string(&outbox).unwrap();
    let record: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(record["listing"]["property_type"], "villa");
    assert_eq!(record["listing"]["price"], 450_000.0);
    assert_eq!(record["listing"]["amenities"][0], "swimming_pool");
    assert_eq!(record["listing"]["images"].as_array().unwrap().len(), 1);
}
