use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::TableState;
use std::fs;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::{ValidationErrors, WizardError},
    listing::{Amenity, Bathrooms, ListingField, ListingWizard, PropertyType, Step},
    media::{ImageSource, PreviewRegistry},
    mortgage::{self, AmortizationRow, MortgageEstimator, MortgageField},
    submission::{SubmissionSink, SUCCESS_MESSAGE},
    valuation::{self, ValuationField, ValuationForm, ValuationRequest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Mortgage,
    Schedule,
    Listing,
    Valuation,
    ValuationResult,
}

pub const MENU_ITEMS: [&str; 4] = [
    "Mortgage Calculator",
    "List Your Property",
    "Property Valuation",
    "Quit",
];

/// What has keyboard focus on the current listing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFocus {
    Field(ListingField),
    Amenities,
    ImagePath,
    Images,
}

impl ListingFocus {
    pub fn for_step(step: Step) -> Vec<ListingFocus> {
        match step {
            Step::Media => vec![ListingFocus::ImagePath, ListingFocus::Images],
            other => {
                let mut focus: Vec<ListingFocus> = ListingField::for_step(other)
                    .iter()
                    .map(|f| ListingFocus::Field(*f))
                    .collect();
                if other == Step::Specs {
                    focus.push(ListingFocus::Amenities);
                }
                focus
            }
        }
    }
}

pub struct App {
    pub screen: Screen,
    pub config: AppConfig,
    pub status: Option<String>,
    pub menu_index: usize,

    pub mortgage: MortgageEstimator,
    pub mortgage_focus: MortgageField,
    pub schedule: Vec<AmortizationRow>,
    pub table_state: TableState,

    pub wizard: ListingWizard<PreviewRegistry>,
    pub listing_focus: usize,
    /// Text of the focused listing field while it is being typed.
    pub listing_buffer: String,
    pub amenity_cursor: usize,
    pub image_path: String,
    pub image_cursor: usize,
    sink: Box<dyn SubmissionSink>,

    pub valuation: ValuationForm,
    pub valuation_focus: ValuationField,
    pub valuation_errors: ValidationErrors<ValuationField>,
    pub valuation_result: Option<(ValuationRequest, f64)>,
}

impl App {
    pub fn new(config: AppConfig, sink: Box<dyn SubmissionSink>) -> Self {
        Self {
            screen: Screen::Menu,
            config,
            status: None,
            menu_index: 0,
            mortgage: MortgageEstimator::new(),
            mortgage_focus: MortgageField::HomePrice,
            schedule: Vec::new(),
            table_state: TableState::default(),
            wizard: ListingWizard::new(PreviewRegistry::new()),
            listing_focus: 0,
            listing_buffer: String::new(),
            amenity_cursor: 0,
            image_path: String::new(),
            image_cursor: 0,
            sink,
            valuation: ValuationForm::default(),
            valuation_focus: ValuationField::PropertyType,
            valuation_errors: ValidationErrors::default(),
            valuation_result: None,
        }
    }

    pub fn listing_focus(&self) -> ListingFocus {
        let focus = ListingFocus::for_step(self.wizard.current());
        focus[self.listing_focus.min(focus.len() - 1)]
    }

    /// Timer callback; drives the upload indicator while the listing is open.
    pub fn on_tick(&mut self) {
        if self.screen == Screen::Listing && self.wizard.upload_progress().is_active() {
            self.wizard.tick_upload();
        }
    }

    fn open_listing(&mut self) {
        self.screen = Screen::Listing;
        self.listing_focus = 0;
        self.sync_listing_buffer();
    }

    fn leave_listing(&mut self) {
        self.wizard.cancel_upload();
        self.screen = Screen::Menu;
    }

    fn sync_listing_buffer(&mut self) {
        self.listing_buffer = match self.listing_focus() {
            ListingFocus::Field(field) => self.wizard.draft().field_text(field),
            _ => String::new(),
        };
    }

    fn move_listing_focus(&mut self, forward: bool) {
        let len = ListingFocus::for_step(self.wizard.current()).len();
        self.listing_focus = if forward {
            (self.listing_focus + 1) % len
        } else {
            (self.listing_focus + len - 1) % len
        };
        self.sync_listing_buffer();
    }

    fn apply_listing_buffer(&mut self, field: ListingField) {
        match self.wizard.update_field(field, &self.listing_buffer) {
            Ok(()) => self.status = None,
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn cycle_listing_choice(&mut self, field: ListingField) {
        let draft = self.wizard.draft();
        let value = match field {
            ListingField::PropertyType => draft
                .property_type
                .map(PropertyType::next)
                .unwrap_or(PropertyType::House)
                .label()
                .to_string(),
            ListingField::Bedrooms => (draft.bedrooms.unwrap_or(0) % 8 + 1).to_string(),
            ListingField::Bathrooms => Bathrooms::next(draft.bathrooms).value().to_string(),
            _ => return,
        };
        self.listing_buffer = value;
        self.apply_listing_buffer(field);
    }

    fn attach_images(&mut self) {
        let mut sources = Vec::new();
        for part in self.image_path.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match ImageSource::from_path(part) {
                Ok(source) => sources.push(source),
                Err(err) => {
                    warn!(%err, "image rejected");
                    self.status = Some(err.to_string());
                    return;
                }
            }
        }

        match self.wizard.add_images(sources) {
            Ok(added) => {
                self.status = Some(format!("Added {added} image(s)"));
                self.image_path.clear();
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn submit_listing(&mut self) {
        match self.wizard.submit(&mut *self.sink) {
            Ok(receipt) => {
                self.status = Some(format!("{SUCCESS_MESSAGE} (reference #{})", receipt.sequence));
                self.listing_focus = 0;
                self.image_cursor = 0;
                self.amenity_cursor = 0;
                self.leave_listing();
            }
            Err(WizardError::IncompleteStep(step)) => {
                self.status = Some(format!("Step {step} still has required fields"));
            }
            Err(WizardError::DraftChanged { sequence }) => {
                self.status = Some(format!(
                    "Listing #{sequence} was sent before your latest edits. Press Enter to send the update."
                ));
            }
            Err(err) => {
                self.status = Some(format!("{err}. Your listing was kept, press Enter to retry."));
            }
        }
    }

    fn open_schedule(&mut self) {
        if let Some(input) = self.mortgage.input() {
            self.schedule = mortgage::amortization_schedule(input);
            self.table_state.select(Some(0));
            self.screen = Screen::Schedule;
        } else {
            self.status = Some("Enter home price, down payment and rate first".to_string());
        }
    }

    fn export_schedule(&mut self) {
        let (Some(input), Some(result)) = (self.mortgage.input(), self.mortgage.result()) else {
            self.status = Some("Nothing to export yet".to_string());
            return;
        };
        let path = self.config.schedule_export_path();
        let outcome = fs::create_dir_all(&self.config.export_dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| mortgage::export_schedule_csv(&path, input, result));
        self.status = Some(match outcome {
            Ok(()) => format!("Exported to {}", path.display()),
            Err(err) => {
                warn!(error = %err, "schedule export failed");
                format!("Error exporting to CSV: {err}")
            }
        });
    }
}

/// Routes a key press to the current screen. Returns `true` to quit.
pub fn handle_key(app: &mut App, key: KeyEvent) -> Result<bool> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(true);
    }
    match app.screen {
        Screen::Menu => handle_menu_input(app, key),
        Screen::Mortgage => handle_mortgage_input(app, key),
        Screen::Schedule => handle_schedule_input(app, key),
        Screen::Listing => handle_listing_input(app, key),
        Screen::Valuation => handle_valuation_input(app, key),
        Screen::ValuationResult => handle_valuation_result_input(app, key),
    }
}

fn handle_menu_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => {
            app.menu_index = (app.menu_index + 1) % MENU_ITEMS.len();
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.menu_index = (app.menu_index + MENU_ITEMS.len() - 1) % MENU_ITEMS.len();
        }
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
            app.status = None;
            match app.menu_index {
                0 => app.screen = Screen::Mortgage,
                1 => app.open_listing(),
                2 => app.screen = Screen::Valuation,
                _ => return Ok(true),
            }
        }
        KeyCode::Esc | KeyCode::Char('q') => return Ok(true),
        _ => {}
    }
    Ok(false)
}

fn handle_mortgage_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    let field = app.mortgage_focus;
    match key.code {
        KeyCode::Char(c) if field != MortgageField::LoanTerm && (c.is_ascii_digit() || c == '.') => {
            app.mortgage.push_char(field, c);
            app.mortgage.recompute();
        }
        KeyCode::Backspace => {
            app.mortgage.pop_char(field);
            app.mortgage.recompute();
        }
        KeyCode::Tab if field == MortgageField::LoanTerm => {
            app.mortgage.cycle_loan_term();
            app.mortgage.recompute();
        }
        KeyCode::Down | KeyCode::Tab => app.mortgage_focus = field.next(),
        KeyCode::Up | KeyCode::BackTab => app.mortgage_focus = field.prev(),
        KeyCode::Enter | KeyCode::Char('s') => {
            app.mortgage.recompute();
            app.open_schedule();
        }
        KeyCode::Char('e') => app.export_schedule(),
        KeyCode::Esc => app.screen = Screen::Menu,
        _ => {}
    }
    Ok(false)
}

fn handle_schedule_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    let last = app.schedule.len().saturating_sub(1);
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(true),
        KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => app.screen = Screen::Mortgage,
        KeyCode::Char('e') | KeyCode::Char('E') => app.export_schedule(),
        KeyCode::Down | KeyCode::Char('j') => {
            let current = app.table_state.selected().unwrap_or(0);
            app.table_state.select(Some((current + 1).min(last)));
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let current = app.table_state.selected().unwrap_or(0);
            app.table_state.select(Some(current.saturating_sub(1)));
        }
        KeyCode::PageDown => {
            let current = app.table_state.selected().unwrap_or(0);
            app.table_state.select(Some((current + 12).min(last)));
        }
        KeyCode::PageUp => {
            let current = app.table_state.selected().unwrap_or(0);
            app.table_state.select(Some(current.saturating_sub(12)));
        }
        KeyCode::Char('g') => app.table_state.select(Some(0)),
        KeyCode::Char('G') => app.table_state.select(Some(last)),
        _ => {}
    }
    Ok(false)
}

fn handle_listing_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    let step = app.wizard.current();
    let focus = app.listing_focus();

    match (key.code, focus) {
        (KeyCode::Esc, _) => {
            if !app.wizard.retreat() {
                app.wizard.abandon();
                app.leave_listing();
                return Ok(false);
            }
            app.listing_focus = 0;
            app.sync_listing_buffer();
        }
        (KeyCode::Down, _) => app.move_listing_focus(true),
        (KeyCode::Up | KeyCode::BackTab, _) => app.move_listing_focus(false),

        (KeyCode::Enter, ListingFocus::ImagePath) if !app.image_path.trim().is_empty() => {
            app.attach_images();
        }
        (KeyCode::Enter, _) if step == Step::Contact => app.submit_listing(),
        (KeyCode::Enter, _) => {
            if app.wizard.advance() {
                app.status = None;
                app.listing_focus = 0;
                app.sync_listing_buffer();
            } else {
                app.status = Some(format!("Complete \"{}\" to continue", step.title()));
            }
        }

        (KeyCode::Tab, ListingFocus::Field(field)) if field.is_choice() => {
            app.cycle_listing_choice(field);
        }
        (KeyCode::Tab, ListingFocus::Amenities) => {
            app.amenity_cursor = (app.amenity_cursor + 1) % Amenity::CATALOG.len();
        }
        (KeyCode::Char(' '), ListingFocus::Amenities) => {
            app.wizard.toggle_amenity(Amenity::CATALOG[app.amenity_cursor]);
        }
        (KeyCode::Tab, ListingFocus::Images) => {
            let count = app.wizard.draft().images.len();
            if count > 0 {
                app.image_cursor = (app.image_cursor + 1) % count;
            }
        }
        (KeyCode::Delete | KeyCode::Backspace, ListingFocus::Images) => {
            if let Some(image) = app.wizard.remove_image(app.image_cursor) {
                info!(file = %image.source.file_name(), "image removed");
                let count = app.wizard.draft().images.len();
                app.image_cursor = app.image_cursor.min(count.saturating_sub(1));
            }
        }
        (KeyCode::Tab, _) => app.move_listing_focus(true),

        (KeyCode::Char(c), ListingFocus::Field(field)) if !field.is_choice() => {
            app.listing_buffer.push(c);
            app.apply_listing_buffer(field);
        }
        (KeyCode::Backspace, ListingFocus::Field(field)) if !field.is_choice() => {
            app.listing_buffer.pop();
            app.apply_listing_buffer(field);
        }
        (KeyCode::Char(c), ListingFocus::ImagePath) => app.image_path.push(c),
        (KeyCode::Backspace, ListingFocus::ImagePath) => {
            app.image_path.pop();
        }
        _ => {}
    }
    Ok(false)
}

fn handle_valuation_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    let field = app.valuation_focus;
    match key.code {
        KeyCode::Esc => app.screen = Screen::Menu,
        KeyCode::Down => app.valuation_focus = field.next(),
        KeyCode::Up | KeyCode::BackTab => app.valuation_focus = field.prev(),
        KeyCode::Tab => {
            if app.valuation.text_mut(field).is_some() {
                app.valuation_focus = field.next();
            } else {
                app.valuation.cycle(field);
            }
        }
        KeyCode::Char(c) => {
            if let Some(text) = app.valuation.text_mut(field) {
                text.push(c);
                app.valuation_errors.remove(field);
            }
        }
        KeyCode::Backspace => {
            if let Some(text) = app.valuation.text_mut(field) {
                text.pop();
                app.valuation_errors.remove(field);
            }
        }
        KeyCode::Enter => match valuation::validate(&app.valuation) {
            Ok(request) => {
                let value = valuation::estimate(&request);
                info!(location = %request.location, "valuation request: {:?}", request);
                app.valuation_errors = ValidationErrors::default();
                app.valuation_result = Some((request, value));
                app.screen = Screen::ValuationResult;
            }
            Err(errors) => {
                app.status = Some(format!("{} field(s) need attention", errors.len()));
                app.valuation_errors = errors;
            }
        },
        _ => {}
    }
    Ok(false)
}

fn handle_valuation_result_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Char('n') => {
            app.valuation = ValuationForm::default();
            app.valuation_result = None;
            app.valuation_focus = ValuationField::PropertyType;
            app.status = None;
            app.screen = Screen::Valuation;
        }
        KeyCode::Char('l') => {
            app.status = None;
            app.open_listing();
        }
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('h') | KeyCode::Left => {
            app.screen = Screen::Menu;
        }
        _ => {}
    }
    Ok(false)
}
