//! Onboarding wizard controllers.
//!
//! A [`Wizard`] walks a fixed sequence of steps over one shared
//! [`FormData`]. Each step declares the fields that must be answered
//! before the applicant can move past it. Two flows exist:
//!
//! - [`IntakeFlow`]: the nine-step applicant intake, submitted through a
//!   [`ProfileService`] and followed by best-effort recommendation
//!   generation.
//! - [`AgentFlow`]: the three-step travel agent onboarding, submitted
//!   through an [`AgentProfileService`].
//!
//! Every field write is mirrored into an optional [`SnapshotStore`].

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::agent::{agent_form_defaults, AgentOnboardingData, AgentProfileRecord};
use crate::error::CoreError;
use crate::fields::{FieldGroup, FieldSpec, INTAKE_FIELDS};
use crate::form::FormData;
use crate::profile::{IntakeProfile, ProfileRecord};
use crate::recommendation::RecommendationResponse;
use crate::services::{AgentProfileService, ProfileService, RecommendationService, ServiceError};
use crate::snapshot::{OnboardingSnapshot, SnapshotStore};
use crate::transform::{to_backend_format, to_form_format};
use crate::types::DbId;
use crate::validation::{check_required, FieldErrors, RequiredField};

/// Minimum step number (1-based).
pub const MIN_STEP: u8 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Step {step} has {} missing field(s)", .errors.len())]
    StepIncomplete { step: u8, errors: FieldErrors },

    #[error("Cannot jump from step {current} to step {requested}")]
    StepOutOfReach { current: u8, requested: u8 },

    #[error("Cannot submit from step {current}; the final step is {total}")]
    NotOnFinalStep { current: u8, total: u8 },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Field '{0}' is not a list")]
    NotAList(String),

    #[error(transparent)]
    Transform(#[from] CoreError),

    #[error("Failed to save profile: {0}")]
    Save(#[source] ServiceError),
}

// ---------------------------------------------------------------------------
// Intake steps
// ---------------------------------------------------------------------------

/// The nine screens of the applicant intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeStep {
    Personal,
    Destination,
    Education,
    Work,
    SkillsAndLanguages,
    ImmigrationHistory,
    Finances,
    SpecialCircumstances,
    DocumentsAndPreferences,
}

const PERSONAL_REQUIRED: &[RequiredField] =
    &[RequiredField::new("nationality", "Nationality is required")];

const DESTINATION_REQUIRED: &[RequiredField] = &[
    RequiredField::new(
        "preferred_destinations",
        "At least one destination is required",
    ),
    RequiredField::new("target_timeline", "Timeline is required"),
];

const EDUCATION_REQUIRED: &[RequiredField] =
    &[RequiredField::new("education_level", "Education level is required")];

impl IntakeStep {
    pub const ALL: [IntakeStep; 9] = [
        Self::Personal,
        Self::Destination,
        Self::Education,
        Self::Work,
        Self::SkillsAndLanguages,
        Self::ImmigrationHistory,
        Self::Finances,
        Self::SpecialCircumstances,
        Self::DocumentsAndPreferences,
    ];

    /// Convert a 1-based step number.
    pub fn from_number(n: u8) -> Result<Self, CoreError> {
        Self::ALL
            .get(usize::from(n).wrapping_sub(1))
            .copied()
            .ok_or_else(|| {
                CoreError::Validation(format!("Invalid step number {n}. Must be between 1 and 9"))
            })
    }

    pub fn to_number(self) -> u8 {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0) as u8 + 1
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Personal => "Personal Details",
            Self::Destination => "Destination & Timeline",
            Self::Education => "Education",
            Self::Work => "Work Experience",
            Self::SkillsAndLanguages => "Skills & Languages",
            Self::ImmigrationHistory => "Immigration History",
            Self::Finances => "Financial Information",
            Self::SpecialCircumstances => "Special Circumstances",
            Self::DocumentsAndPreferences => "Documents & Preferences",
        }
    }

    /// Sub-heading shown above the step's fields.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Personal => "Let's start by getting to know you better",
            Self::Destination => "Tell us about your destination goals",
            Self::Education => "Share your educational background",
            Self::Work => "Help us understand your work experience",
            Self::SkillsAndLanguages => "What skills and languages do you have?",
            Self::ImmigrationHistory => "Any previous immigration history?",
            Self::Finances => "Financial information for visa planning",
            Self::SpecialCircumstances => "Special achievements and support needs",
            Self::DocumentsAndPreferences => "Final details and document preferences",
        }
    }

    pub fn required_fields(self) -> &'static [RequiredField] {
        match self {
            Self::Personal => PERSONAL_REQUIRED,
            Self::Destination => DESTINATION_REQUIRED,
            Self::Education => EDUCATION_REQUIRED,
            _ => &[],
        }
    }

    fn groups(self) -> &'static [FieldGroup] {
        match self {
            Self::Personal => &[FieldGroup::Identity],
            Self::Destination => &[FieldGroup::Destination],
            Self::Education => &[FieldGroup::Education],
            Self::Work => &[FieldGroup::Work],
            Self::SkillsAndLanguages => &[FieldGroup::Language],
            Self::ImmigrationHistory => &[FieldGroup::Immigration],
            Self::Finances => &[FieldGroup::Finances],
            Self::SpecialCircumstances => &[FieldGroup::Special],
            Self::DocumentsAndPreferences => &[FieldGroup::Documents, FieldGroup::Preferences],
        }
    }

    /// Catalog entries rendered on this step.
    pub fn fields(self) -> impl Iterator<Item = &'static FieldSpec> {
        let groups = self.groups();
        INTAKE_FIELDS
            .iter()
            .filter(move |spec| groups.contains(&spec.group))
    }
}

// ---------------------------------------------------------------------------
// Agent steps
// ---------------------------------------------------------------------------

/// The three screens of travel agent onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStep {
    Business,
    Expertise,
    Contact,
}

/// Every field the agent wizard accepts.
pub const AGENT_FIELDS: &[&str] = &[
    "full_name",
    "business_name",
    "country_of_operation",
    "cities_covered",
    "years_of_experience",
    "specializations",
    "supported_destination_countries",
    "preferred_contact_method",
    "contact_details",
    "languages_spoken",
    "bio",
    "availability_status",
];

const BUSINESS_REQUIRED: &[RequiredField] = &[
    RequiredField::new("full_name", "Full name is required"),
    RequiredField::new("country_of_operation", "Country of operation is required"),
    RequiredField::new("cities_covered", "At least one city is required"),
];

const EXPERTISE_REQUIRED: &[RequiredField] = &[
    RequiredField::new("years_of_experience", "Years of experience is required"),
    RequiredField::new("specializations", "At least one specialization is required"),
    RequiredField::new(
        "supported_destination_countries",
        "At least one destination country is required",
    ),
];

const CONTACT_REQUIRED: &[RequiredField] = &[
    RequiredField::new(
        "preferred_contact_method",
        "Preferred contact method is required",
    ),
    RequiredField::new("languages_spoken", "At least one language is required"),
    RequiredField::new("bio", "Bio is required"),
];

impl AgentStep {
    pub const ALL: [AgentStep; 3] = [Self::Business, Self::Expertise, Self::Contact];

    pub fn from_number(n: u8) -> Result<Self, CoreError> {
        Self::ALL
            .get(usize::from(n).wrapping_sub(1))
            .copied()
            .ok_or_else(|| {
                CoreError::Validation(format!("Invalid step number {n}. Must be between 1 and 3"))
            })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Business => "Business Details",
            Self::Expertise => "Expertise",
            Self::Contact => "Contact & Bio",
        }
    }

    pub fn required_fields(self) -> &'static [RequiredField] {
        match self {
            Self::Business => BUSINESS_REQUIRED,
            Self::Expertise => EXPERTISE_REQUIRED,
            Self::Contact => CONTACT_REQUIRED,
        }
    }
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

/// Static description of a wizard: its length, its per-step rules, and
/// the fields it accepts.
pub trait WizardFlow {
    const TOTAL_STEPS: u8;

    fn step_label(step: u8) -> &'static str;

    fn required_fields(step: u8) -> &'static [RequiredField];

    fn accepts_field(name: &str) -> bool;

    fn initial_form() -> FormData;
}

/// Applicant intake flow.
#[derive(Debug, Clone, Copy)]
pub struct IntakeFlow;

impl WizardFlow for IntakeFlow {
    const TOTAL_STEPS: u8 = 9;

    fn step_label(step: u8) -> &'static str {
        IntakeStep::from_number(step).map_or("", IntakeStep::label)
    }

    fn required_fields(step: u8) -> &'static [RequiredField] {
        IntakeStep::from_number(step).map_or(&[], IntakeStep::required_fields)
    }

    fn accepts_field(name: &str) -> bool {
        FieldSpec::lookup(name).is_some()
    }

    fn initial_form() -> FormData {
        FormData::new()
    }
}

/// Travel agent onboarding flow.
#[derive(Debug, Clone, Copy)]
pub struct AgentFlow;

impl WizardFlow for AgentFlow {
    const TOTAL_STEPS: u8 = 3;

    fn step_label(step: u8) -> &'static str {
        AgentStep::from_number(step).map_or("", AgentStep::label)
    }

    fn required_fields(step: u8) -> &'static [RequiredField] {
        AgentStep::from_number(step).map_or(&[], AgentStep::required_fields)
    }

    fn accepts_field(name: &str) -> bool {
        AGENT_FIELDS.contains(&name)
    }

    fn initial_form() -> FormData {
        agent_form_defaults()
    }
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

/// Outcome of a successful intake submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub profile: ProfileRecord,
    /// `None` when recommendation generation failed or produced nothing.
    pub recommendations: Option<RecommendationResponse>,
}

/// Step controller over one shared form.
pub struct Wizard<F: WizardFlow> {
    owner_id: DbId,
    current_step: u8,
    form: FormData,
    errors: FieldErrors,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    _flow: PhantomData<F>,
}

impl<F: WizardFlow> std::fmt::Debug for Wizard<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wizard")
            .field("owner_id", &self.owner_id)
            .field("current_step", &self.current_step)
            .field("form", &self.form)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<F: WizardFlow> Wizard<F> {
    /// Start a fresh wizard on step 1 with the flow's default form.
    pub fn new(owner_id: DbId) -> Self {
        Self {
            owner_id,
            current_step: MIN_STEP,
            form: F::initial_form(),
            errors: FieldErrors::new(),
            snapshots: None,
            _flow: PhantomData,
        }
    }

    /// Mirror every field write into `store`.
    pub fn with_snapshots(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Start a wizard that picks up the owner's saved snapshot, if any.
    pub fn resume(owner_id: DbId, store: Arc<dyn SnapshotStore>) -> Self {
        let mut wizard = Self::new(owner_id).with_snapshots(Arc::clone(&store));
        match store.load(owner_id) {
            Ok(Some(snapshot)) => {
                tracing::debug!(owner_id, "Resuming onboarding from snapshot");
                for (name, value) in snapshot.form_data.iter() {
                    wizard.form.set(name.clone(), value.clone());
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(owner_id, error = %e, "Failed to load onboarding snapshot"),
        }
        wizard
    }

    pub fn owner_id(&self) -> DbId {
        self.owner_id
    }

    pub fn current_step(&self) -> u8 {
        self.current_step
    }

    pub fn total_steps(&self) -> u8 {
        F::TOTAL_STEPS
    }

    pub fn step_label(&self) -> &'static str {
        F::step_label(self.current_step)
    }

    pub fn is_final_step(&self) -> bool {
        self.current_step == F::TOTAL_STEPS
    }

    pub fn form(&self) -> &FormData {
        &self.form
    }

    /// Errors for the current step only.
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Write a field value. Empty strings are stored as `null`, any
    /// error shown for the field is cleared, and a snapshot is saved.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), WizardError> {
        if !F::accepts_field(name) {
            return Err(WizardError::UnknownField(name.to_string()));
        }
        self.form.set(name, value);
        self.errors.shift_remove(name);
        self.persist();
        Ok(())
    }

    /// Validate the current step and advance when it is complete.
    ///
    /// On the last step a successful validation leaves the step
    /// unchanged. Returns the (possibly new) current step.
    pub fn go_next(&mut self) -> Result<u8, WizardError> {
        self.validate_current()?;
        if self.current_step < F::TOTAL_STEPS {
            self.current_step += 1;
        }
        Ok(self.current_step)
    }

    /// Step back; always allowed, never below step 1.
    pub fn go_previous(&mut self) -> u8 {
        if self.current_step > MIN_STEP {
            self.current_step -= 1;
        }
        self.errors.clear();
        self.current_step
    }

    /// Jump to any visited step, or to the immediate next one.
    ///
    /// Jumping forward validates the current step exactly like
    /// [`go_next`](Self::go_next).
    pub fn jump_to_step(&mut self, step: u8) -> Result<u8, WizardError> {
        let reachable = (MIN_STEP..=F::TOTAL_STEPS).contains(&step)
            && step <= self.current_step.saturating_add(1);
        if !reachable {
            return Err(WizardError::StepOutOfReach {
                current: self.current_step,
                requested: step,
            });
        }
        if step > self.current_step {
            return self.go_next();
        }
        self.current_step = step;
        self.errors.clear();
        Ok(step)
    }

    /// Run the current step's required-field checks, replacing `errors`.
    pub fn validate_current(&mut self) -> Result<(), WizardError> {
        self.errors = check_required(&self.form, F::required_fields(self.current_step));
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(WizardError::StepIncomplete {
                step: self.current_step,
                errors: self.errors.clone(),
            })
        }
    }

    fn ensure_final_and_valid(&mut self) -> Result<(), WizardError> {
        if !self.is_final_step() {
            return Err(WizardError::NotOnFinalStep {
                current: self.current_step,
                total: F::TOTAL_STEPS,
            });
        }
        self.validate_current()
    }

    fn persist(&self) {
        let Some(store) = &self.snapshots else {
            return;
        };
        let snapshot = OnboardingSnapshot {
            owner_id: self.owner_id,
            form_data: self.form.clone(),
            updated_at: chrono::Utc::now(),
        };
        if let Err(e) = store.save(&snapshot) {
            tracing::warn!(owner_id = self.owner_id, error = %e, "Failed to save onboarding snapshot");
        }
    }

    fn clear_snapshot(&self) {
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.clear(self.owner_id) {
                tracing::warn!(owner_id = self.owner_id, error = %e, "Failed to clear onboarding snapshot");
            }
        }
    }
}

impl Wizard<IntakeFlow> {
    /// Seed the form from a saved backend profile.
    pub fn load_existing(&mut self, record: &ProfileRecord) {
        if let Some(form) = to_form_format(record.onboarding_data.as_ref()) {
            self.form = form;
        }
    }

    /// The form converted to backend shape.
    pub fn backend_profile(&self) -> Result<IntakeProfile, WizardError> {
        Ok(to_backend_format(&self.form)?)
    }

    /// Validate the final step, save the profile, then ask for
    /// recommendations.
    ///
    /// A failed save is returned to the caller with the form untouched
    /// so the action can be retried. Recommendation generation is best
    /// effort: its failure is logged and reported as `None`.
    pub async fn submit(
        &mut self,
        profiles: &dyn ProfileService,
        recommender: &dyn RecommendationService,
    ) -> Result<SubmitOutcome, WizardError> {
        self.ensure_final_and_valid()?;
        let profile = self.backend_profile()?;

        let record = profiles
            .update_profile(&profile)
            .await
            .map_err(WizardError::Save)?;
        tracing::info!(owner_id = self.owner_id, "Onboarding profile saved");
        self.clear_snapshot();

        let saved = record.onboarding_data.clone().unwrap_or(profile);
        let recommendations = match recommender.generate_recommendations(&saved).await {
            Ok(response) if response.options.is_empty() => {
                tracing::warn!(owner_id = self.owner_id, "Recommendation generation returned no options");
                None
            }
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(owner_id = self.owner_id, error = %e, "Recommendation generation failed");
                None
            }
        };

        Ok(SubmitOutcome {
            profile: record,
            recommendations,
        })
    }
}

impl Wizard<AgentFlow> {
    /// Seed the form from the agent's saved onboarding answers, keeping
    /// defaults for anything the saved data lacks.
    pub fn load_existing(&mut self, record: &AgentProfileRecord) {
        if let Some(Value::Object(saved)) = &record.onboarding_data {
            for (name, value) in saved {
                if AgentFlow::accepts_field(name) {
                    self.form.set(name.clone(), value.clone());
                }
            }
        }
    }

    /// Append a trimmed item to a list field. Blank items and duplicates
    /// are ignored; returns whether the list changed.
    pub fn add_to_list(&mut self, name: &str, item: &str) -> Result<bool, WizardError> {
        let item = item.trim();
        let mut items = self.list(name)?;
        if item.is_empty() || items.iter().any(|existing| existing == item) {
            return Ok(false);
        }
        items.push(item.to_string());
        self.set_list(name, items)?;
        Ok(true)
    }

    /// Remove every occurrence of `item`; returns whether the list changed.
    pub fn remove_from_list(&mut self, name: &str, item: &str) -> Result<bool, WizardError> {
        let mut items = self.list(name)?;
        let before = items.len();
        items.retain(|existing| existing != item);
        if items.len() == before {
            return Ok(false);
        }
        self.set_list(name, items)?;
        Ok(true)
    }

    /// Add `item` if absent, remove it if present.
    pub fn toggle_in_list(&mut self, name: &str, item: &str) -> Result<(), WizardError> {
        if !self.remove_from_list(name, item)? {
            self.add_to_list(name, item)?;
        }
        Ok(())
    }

    /// Validate the final step and save the agent profile.
    pub async fn submit(
        &mut self,
        agents: &dyn AgentProfileService,
    ) -> Result<AgentProfileRecord, WizardError> {
        self.ensure_final_and_valid()?;
        let data = AgentOnboardingData::from_form(&self.form)?;
        let record = agents
            .update_agent_profile(&data)
            .await
            .map_err(WizardError::Save)?;
        tracing::info!(owner_id = self.owner_id, "Agent profile saved");
        self.clear_snapshot();
        Ok(record)
    }

    fn list(&self, name: &str) -> Result<Vec<String>, WizardError> {
        if !AgentFlow::accepts_field(name) {
            return Err(WizardError::UnknownField(name.to_string()));
        }
        match self.form.get(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()),
            Some(_) => Err(WizardError::NotAList(name.to_string())),
        }
    }

    fn set_list(&mut self, name: &str, items: Vec<String>) -> Result<(), WizardError> {
        self.set_field(
            name,
            Value::Array(items.into_iter().map(Value::String).collect()),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
