// LogDeck - core/fields.rs
//
// Field/filter configuration state machine.
//
// Holds the ordered extraction-field list and the dependent filter-condition
// list. Every mutation keeps one invariant: no filter condition references a
// field name that is absent from the field list. Renames and removals
// cascade into the filters in the same update rather than being validated
// after the fact.
//
// The cascades are pure functions over slices so they can be tested without
// an editor; `FieldEditor` applies their results as a single assignment.
// Core layer: pure logic, no I/O.

use crate::core::model::{Field, FilterCondition, FilterOperator, LogFormat};
use crate::util::constants::DEFAULT_FIELD_NAMES;
use crate::util::error::FieldError;

/// True if `name` is one of the protected default field names.
pub fn is_default_field(name: &str) -> bool {
    DEFAULT_FIELD_NAMES.contains(&name)
}

/// Placeholder paths for the default fields, in `DEFAULT_FIELD_NAMES` order.
pub fn default_paths(format: LogFormat) -> [&'static str; 3] {
    match format {
        LogFormat::Json => ["data.timestamp", "data.level", "data.msg_detail"],
        LogFormat::PlainText => [r"^\d{4}-\d{2}-\d{2}", "(DEBUG|INFO|WARN|ERROR)", ".*$"],
        LogFormat::Csv | LogFormat::Xml => ["", "", ""],
    }
}

// =============================================================================
// Pure cascades
// =============================================================================

/// Rename field `id` to `new_name`, cascading into filter conditions.
///
/// Rejected when the field currently carries a default name (default fields
/// keep their names), or when `new_name` is a default name already used by
/// a different field. Every filter whose `field` equals the old name is
/// rewritten.
pub fn apply_rename(
    fields: &[Field],
    filters: &[FilterCondition],
    id: &str,
    new_name: &str,
) -> Result<(Vec<Field>, Vec<FilterCondition>), FieldError> {
    let target = fields
        .iter()
        .find(|f| f.id == id)
        .ok_or_else(|| FieldError::UnknownField { id: id.to_string() })?;

    if is_default_field(&target.name) && target.name != new_name {
        return Err(FieldError::ProtectedField {
            name: target.name.clone(),
        });
    }
    if is_default_field(new_name) && fields.iter().any(|f| f.name == new_name && f.id != id) {
        return Err(FieldError::DuplicateDefaultName {
            name: new_name.to_string(),
        });
    }

    let old_name = target.name.as_str();
    let new_fields = fields
        .iter()
        .map(|f| {
            if f.id == id {
                Field {
                    name: new_name.to_string(),
                    ..f.clone()
                }
            } else {
                f.clone()
            }
        })
        .collect();
    let new_filters = filters
        .iter()
        .map(|c| {
            if c.field == old_name {
                FilterCondition {
                    field: new_name.to_string(),
                    ..c.clone()
                }
            } else {
                c.clone()
            }
        })
        .collect();

    Ok((new_fields, new_filters))
}

/// Remove field `id`, cascading removal to filter conditions on its name.
///
/// Rejected for default fields. Filters are only dropped when no remaining
/// field still carries the removed name.
pub fn apply_remove(
    fields: &[Field],
    filters: &[FilterCondition],
    id: &str,
) -> Result<(Vec<Field>, Vec<FilterCondition>), FieldError> {
    let target = fields
        .iter()
        .find(|f| f.id == id)
        .ok_or_else(|| FieldError::UnknownField { id: id.to_string() })?;

    if is_default_field(&target.name) {
        return Err(FieldError::ProtectedField {
            name: target.name.clone(),
        });
    }

    let removed_name = target.name.as_str();
    let new_fields: Vec<Field> = fields.iter().filter(|f| f.id != id).cloned().collect();
    let name_still_used = new_fields.iter().any(|f| f.name == removed_name);
    let new_filters = filters
        .iter()
        .filter(|c| name_still_used || c.field != removed_name)
        .cloned()
        .collect();

    Ok((new_fields, new_filters))
}

/// Move the element at `from` to `to`, shifting the elements in between.
///
/// A pure permutation: ids and contents are untouched.
pub fn reorder<T: Clone>(items: &[T], from: usize, to: usize) -> Result<Vec<T>, FieldError> {
    let len = items.len();
    for index in [from, to] {
        if index >= len {
            return Err(FieldError::IndexOutOfRange { index, len });
        }
    }
    let mut out = items.to_vec();
    let moved = out.remove(from);
    out.insert(to, moved);
    Ok(out)
}

// =============================================================================
// Drag-and-drop seam
// =============================================================================

/// Receiver of a completed drag gesture. Gesture libraries translate their
/// own events into index pairs; the editor never sees the gesture.
pub trait Reorder {
    fn on_reorder(&mut self, from: usize, to: usize) -> Result<(), FieldError>;
}

// =============================================================================
// Editor
// =============================================================================

/// A single edit to a filter condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterUpdate {
    /// Must name a field present in the current field list.
    Field(String),
    Operator(FilterOperator),
    Value(String),
}

/// Ordered fields plus dependent filter conditions.
#[derive(Debug, Clone)]
pub struct FieldEditor {
    fields: Vec<Field>,
    filters: Vec<FilterCondition>,
    next_id: u64,
}

impl FieldEditor {
    /// Editor seeded with the default fields for `format`.
    pub fn new(format: LogFormat) -> Self {
        let mut editor = Self {
            fields: Vec::new(),
            filters: Vec::new(),
            next_id: 1,
        };
        editor.set_log_format(format);
        editor
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn filters(&self) -> &[FilterCondition] {
        &self.filters
    }

    fn fresh_id(&mut self) -> String {
        let id = self.next_id.to_string();
        self.next_id += 1;
        id
    }

    /// Replace the whole field list with `format`'s defaults.
    ///
    /// Destructive: custom fields from the previous format are discarded,
    /// and filters referencing names that no longer exist go with them.
    pub fn set_log_format(&mut self, format: LogFormat) {
        let paths = default_paths(format);
        let fields: Vec<Field> = DEFAULT_FIELD_NAMES
            .iter()
            .zip(paths)
            .map(|(name, path)| Field {
                id: self.fresh_id(),
                name: (*name).to_string(),
                path: path.to_string(),
            })
            .collect();
        self.filters
            .retain(|c| fields.iter().any(|f| f.name == c.field));
        self.fields = fields;
        tracing::debug!(format = format.label(), "Field list reset to defaults");
    }

    /// Append an empty field; returns its id.
    pub fn add_field(&mut self) -> String {
        let id = self.fresh_id();
        self.fields.push(Field {
            id: id.clone(),
            name: String::new(),
            path: String::new(),
        });
        id
    }

    pub fn remove_field(&mut self, id: &str) -> Result<(), FieldError> {
        let (fields, filters) = apply_remove(&self.fields, &self.filters, id)?;
        self.fields = fields;
        self.filters = filters;
        Ok(())
    }

    pub fn rename_field(&mut self, id: &str, new_name: &str) -> Result<(), FieldError> {
        let (fields, filters) = apply_rename(&self.fields, &self.filters, id, new_name)?;
        self.fields = fields;
        self.filters = filters;
        Ok(())
    }

    pub fn set_field_path(&mut self, id: &str, path: &str) -> Result<(), FieldError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| FieldError::UnknownField { id: id.to_string() })?;
        field.path = path.to_string();
        Ok(())
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), FieldError> {
        self.fields = reorder(&self.fields, from, to)?;
        Ok(())
    }

    /// Move the field `active_id` to the position of `over_id`, the way a
    /// sortable list reports a drop. Dropping onto itself is a no-op.
    pub fn move_field_onto(&mut self, active_id: &str, over_id: &str) -> Result<(), FieldError> {
        if active_id == over_id {
            return Ok(());
        }
        let position = |id: &str| {
            self.fields
                .iter()
                .position(|f| f.id == id)
                .ok_or_else(|| FieldError::UnknownField { id: id.to_string() })
        };
        let from = position(active_id)?;
        let to = position(over_id)?;
        self.reorder(from, to)
    }

    /// Append a filter on the first field with EQUALS and an empty value;
    /// returns its id.
    pub fn add_filter_condition(&mut self) -> String {
        let id = self.fresh_id();
        let field = self
            .fields
            .first()
            .map(|f| f.name.clone())
            .unwrap_or_default();
        self.filters.push(FilterCondition {
            id: id.clone(),
            field,
            operator: FilterOperator::Equals,
            value: String::new(),
        });
        id
    }

    pub fn remove_filter_condition(&mut self, id: &str) -> Result<(), FieldError> {
        let before = self.filters.len();
        self.filters.retain(|c| c.id != id);
        if self.filters.len() == before {
            return Err(FieldError::UnknownFilter { id: id.to_string() });
        }
        Ok(())
    }

    pub fn update_filter_condition(
        &mut self,
        id: &str,
        update: FilterUpdate,
    ) -> Result<(), FieldError> {
        if let FilterUpdate::Field(ref name) = update {
            if !self.fields.iter().any(|f| &f.name == name) {
                return Err(FieldError::UnknownFieldName { name: name.clone() });
            }
        }
        let condition = self
            .filters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| FieldError::UnknownFilter { id: id.to_string() })?;
        match update {
            FilterUpdate::Field(name) => condition.field = name,
            FilterUpdate::Operator(op) => condition.operator = op,
            FilterUpdate::Value(value) => condition.value = value,
        }
        Ok(())
    }
}

impl Default for FieldEditor {
    fn default() -> Self {
        Self::new(LogFormat::default())
    }
}

impl Reorder for FieldEditor {
    fn on_reorder(&mut self, from: usize, to: usize) -> Result<(), FieldError> {
        self.reorder(from, to)
    }
}

// =============================================================================
// Unit tests
// =============================================================================
