// LogDeck - core/wizard.rs
//
// Multi-step project wizard: basic info -> collection path -> parsing
// rules -> review. Each forward step is gated by that step's validation;
// going back is never gated.
//
// Also converts a finished session into the phase-1 provisioning request,
// and parses wizard definition files (TOML) for non-interactive use.
// Core layer: accepts TOML strings, never touches the filesystem.

use crate::core::fields::{FieldEditor, FilterUpdate};
use crate::core::model::{
    FilterOperator, FilterSpec, JsonFieldMapping, LogFormat, Platform, Step1Request,
};
use crate::util::constants::{
    DEFAULT_LEVEL_JSON_PATH, DEFAULT_MULTILINE_PATTERN, DEFAULT_TIMESTAMP_JSON_PATH,
    LEVEL_FIELD, MAX_PATTERN_LENGTH, MAX_PROJECT_DESCRIPTION_CHARS, MAX_PROJECT_NAME_CHARS,
    MIN_PROJECT_NAME_CHARS, TIMESTAMP_FIELD,
};
use crate::util::error::WizardError;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

// =============================================================================
// Steps
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    BasicInfo,
    CollectionPath,
    ParsingRules,
    Review,
}

impl WizardStep {
    /// 1-based position shown in the step indicator.
    pub fn number(self) -> u8 {
        match self {
            Self::BasicInfo => 1,
            Self::CollectionPath => 2,
            Self::ParsingRules => 3,
            Self::Review => 4,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::BasicInfo => "Basic info",
            Self::CollectionPath => "Collection path",
            Self::ParsingRules => "Parsing rules",
            Self::Review => "Review",
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::BasicInfo => Some(Self::CollectionPath),
            Self::CollectionPath => Some(Self::ParsingRules),
            Self::ParsingRules => Some(Self::Review),
            Self::Review => None,
        }
    }

    fn prev(self) -> Option<Self> {
        match self {
            Self::BasicInfo => None,
            Self::CollectionPath => Some(Self::BasicInfo),
            Self::ParsingRules => Some(Self::CollectionPath),
            Self::Review => Some(Self::ParsingRules),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// State of one wizard invocation. Created fresh, dropped on cancel,
/// converted into a `Step1Request` on submission.
#[derive(Debug, Clone)]
pub struct WizardSession {
    step: WizardStep,
    log_format: LogFormat,
    pub name: String,
    pub description: String,
    pub collection_path: String,
    pub multiline_enabled: bool,
    pub multiline_pattern: String,
    pub editor: FieldEditor,
    pub platform: Platform,
}

impl WizardSession {
    pub fn new() -> Self {
        let log_format = LogFormat::default();
        Self {
            step: WizardStep::BasicInfo,
            log_format,
            name: String::new(),
            description: String::new(),
            collection_path: String::new(),
            multiline_enabled: true,
            multiline_pattern: DEFAULT_MULTILINE_PATTERN.to_string(),
            editor: FieldEditor::new(log_format),
            platform: Platform::default(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Change format and reset the field list to that format's defaults.
    pub fn set_log_format(&mut self, format: LogFormat) {
        self.log_format = format;
        self.editor.set_log_format(format);
    }

    /// Advance one step if the current step validates.
    pub fn next_step(&mut self) -> Result<WizardStep, WizardError> {
        self.validate_step(self.step)?;
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Ok(self.step)
    }

    pub fn prev_step(&mut self) -> WizardStep {
        if let Some(prev) = self.step.prev() {
            self.step = prev;
        }
        self.step
    }

    /// Jump straight to the review step (used when returning from the
    /// install guide). Entered data is untouched.
    pub fn return_to_review(&mut self) {
        self.step = WizardStep::Review;
    }

    /// Validate the inputs that belong to `step`.
    pub fn validate_step(&self, step: WizardStep) -> Result<(), WizardError> {
        match step {
            WizardStep::BasicInfo => self.validate_basic_info(),
            WizardStep::CollectionPath => {
                if self.collection_path.trim().is_empty() {
                    return Err(WizardError::MissingRequired {
                        field: "collection path",
                    });
                }
                Ok(())
            }
            WizardStep::ParsingRules => self.validate_parsing_rules(),
            WizardStep::Review => {
                self.validate_basic_info()?;
                self.validate_step(WizardStep::CollectionPath)?;
                self.validate_parsing_rules()
            }
        }
    }

    /// Cheap pre-submission guard: collection path, name, and at least one
    /// field must be present. The server performs authoritative validation.
    pub fn validate_for_submit(&self) -> Result<(), WizardError> {
        if self.collection_path.trim().is_empty() {
            return Err(WizardError::MissingRequired {
                field: "collection path",
            });
        }
        if self.name.trim().is_empty() {
            return Err(WizardError::MissingRequired {
                field: "project name",
            });
        }
        if self.editor.fields().is_empty() {
            return Err(WizardError::MissingRequired { field: "field" });
        }
        Ok(())
    }

    fn validate_basic_info(&self) -> Result<(), WizardError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(WizardError::MissingRequired {
                field: "project name",
            });
        }
        let chars = name.chars().count();
        if !(MIN_PROJECT_NAME_CHARS..=MAX_PROJECT_NAME_CHARS).contains(&chars) {
            return Err(WizardError::InvalidValue {
                field: "project name",
                reason: format!(
                    "must be {MIN_PROJECT_NAME_CHARS}-{MAX_PROJECT_NAME_CHARS} characters, got {chars}"
                ),
            });
        }
        let desc_chars = self.description.chars().count();
        if desc_chars > MAX_PROJECT_DESCRIPTION_CHARS {
            return Err(WizardError::InvalidValue {
                field: "description",
                reason: format!(
                    "must be at most {MAX_PROJECT_DESCRIPTION_CHARS} characters, got {desc_chars}"
                ),
            });
        }
        Ok(())
    }

    fn validate_parsing_rules(&self) -> Result<(), WizardError> {
        if self.editor.fields().is_empty() {
            return Err(WizardError::MissingRequired { field: "field" });
        }
        if self.log_format != LogFormat::PlainText {
            return Ok(());
        }
        if self.multiline_enabled {
            if self.multiline_pattern.is_empty() {
                return Err(WizardError::MissingRequired {
                    field: "multiline pattern",
                });
            }
            compile_pattern("multiline", &self.multiline_pattern)?;
        }
        for field in self.editor.fields() {
            if !field.path.is_empty() {
                compile_pattern(&field.name, &field.path)?;
            }
        }
        Ok(())
    }

    /// Build the phase-1 request from the current state.
    ///
    /// - multiline pattern only for plain text with multiline enabled
    /// - timestamp/level slots only for JSON
    /// - JSON custom fields exclude the slotted names and need a name and path
    /// - filters need both a field and a value
    pub fn build_step1_request(&self) -> Step1Request {
        let fields = self.editor.fields();
        let is_json = self.log_format == LogFormat::Json;
        let is_plain = self.log_format == LogFormat::PlainText;

        let json_path_of = |name: &str, fallback: &str| {
            fields
                .iter()
                .find(|f| f.name == name && !f.path.is_empty())
                .map(|f| f.path.clone())
                .unwrap_or_else(|| fallback.to_string())
        };

        let (timestamp_field, timestamp_json_path, log_level, log_level_json_path) = if is_json {
            (
                TIMESTAMP_FIELD.to_string(),
                json_path_of(TIMESTAMP_FIELD, DEFAULT_TIMESTAMP_JSON_PATH),
                LEVEL_FIELD.to_string(),
                json_path_of(LEVEL_FIELD, DEFAULT_LEVEL_JSON_PATH),
            )
        } else {
            Default::default()
        };

        let custom_json_fields = if is_json {
            fields
                .iter()
                .filter(|f| f.name != TIMESTAMP_FIELD && f.name != LEVEL_FIELD)
                .filter(|f| !f.name.is_empty() && !f.path.is_empty())
                .map(|f| JsonFieldMapping {
                    name: f.name.clone(),
                    json_path: f.path.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let custom_plain_fields = if is_plain {
            fields
                .iter()
                .filter(|f| !f.name.is_empty())
                .map(|f| f.name.clone())
                .collect()
        } else {
            Vec::new()
        };

        let filters = self
            .editor
            .filters()
            .iter()
            .filter(|c| !c.field.is_empty() && !c.value.is_empty())
            .map(|c| FilterSpec {
                field: c.field.clone(),
                operator: c.operator,
                value: c.value.clone(),
            })
            .collect();

        Step1Request {
            log_paths: vec![self.collection_path.trim().to_string()],
            project_name: self.name.trim().to_string(),
            project_description: self.description.clone(),
            multiline_pattern: if is_plain && self.multiline_enabled {
                self.multiline_pattern.clone()
            } else {
                String::new()
            },
            timestamp_field,
            timestamp_json_path,
            log_level,
            log_level_json_path,
            custom_json_fields,
            custom_plain_fields,
            filters,
            platform: self.platform,
        }
    }
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_pattern(field: &str, pattern: &str) -> Result<Regex, WizardError> {
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(WizardError::PatternTooLong {
            field: field.to_string(),
            length: pattern.len(),
            max_length: MAX_PATTERN_LENGTH,
        });
    }
    Regex::new(pattern).map_err(|e| WizardError::InvalidPattern {
        field: field.to_string(),
        pattern: pattern.to_string(),
        source: e,
    })
}

// =============================================================================
// Definition files
// =============================================================================

/// Wizard inputs as written in a TOML definition file.
#[derive(Debug, Deserialize)]
pub struct WizardDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub collection_path: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub multiline: Option<MultilineDef>,
    /// Default fields listed here override their paths; other names are
    /// appended as custom fields in file order.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
}

#[derive(Debug, Deserialize)]
pub struct MultilineDef {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub pattern: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct FilterDef {
    pub field: String,
    #[serde(default)]
    pub operator: FilterOperator,
    pub value: String,
}

/// Parse a TOML wizard definition. `source_path` is used for messages only.
pub fn parse_definition(content: &str, source_path: &Path) -> Result<WizardDefinition, WizardError> {
    toml::from_str(content).map_err(|e| WizardError::Definition {
        path: source_path.to_path_buf(),
        reason: e.to_string(),
    })
}

impl WizardDefinition {
    /// Replay the definition through a fresh session, applying the same
    /// editor operations an interactive user would.
    pub fn into_session(self) -> Result<WizardSession, WizardError> {
        let mut session = WizardSession::new();
        session.name = self.name;
        session.description = self.description;
        session.collection_path = self.collection_path;
        session.platform = self.platform;
        session.set_log_format(self.format);

        if let Some(multiline) = self.multiline {
            session.multiline_enabled = multiline.enabled;
            if let Some(pattern) = multiline.pattern {
                session.multiline_pattern = pattern;
            }
        }

        for def in self.fields {
            let existing = session
                .editor
                .fields()
                .iter()
                .find(|f| f.name == def.name)
                .map(|f| f.id.clone());
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = session.editor.add_field();
                    session.editor.rename_field(&id, &def.name)?;
                    id
                }
            };
            session.editor.set_field_path(&id, &def.path)?;
        }

        for def in self.filters {
            let id = session.editor.add_filter_condition();
            session
                .editor
                .update_filter_condition(&id, FilterUpdate::Field(def.field))?;
            session
                .editor
                .update_filter_condition(&id, FilterUpdate::Operator(def.operator))?;
            session
                .editor
                .update_filter_condition(&id, FilterUpdate::Value(def.value))?;
        }

        Ok(session)
    }
}

// =============================================================================
// Unit tests
// =============================================================================
