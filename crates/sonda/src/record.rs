//! Record kinds, their application bindings and test fixtures.
//!
//! The element identifiers and route fragments below are the contract between
//! the harness and the application under test. Renaming any of them on the
//! application side breaks the matching scenario.

use crate::locator::{Locator, Selector};
use crate::result::SondaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tokens any of which marks a successful creation (case-insensitive)
pub const SUCCESS_TOKENS: [&str; 2] = ["sucesso", "cadastrado"];

/// Class shared by the home page's navigation buttons
pub const NAV_BUTTON_CLASS: &str = "btn";

/// Submit control, relative to its form
pub const SUBMIT_CSS: &str = "button[type='submit']";

/// Default application root
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5500/frontend/index.html";

// =============================================================================
// RECORD KIND
// =============================================================================

/// Kind of record a scenario exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Aluno
    Student,
    /// Autor
    Author,
}

impl RecordKind {
    /// Every kind, in suite order
    pub const ALL: [Self; 2] = [Self::Student, Self::Author];

    /// Lowercase name used on the command line
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Author => "author",
        }
    }

    /// Element and route bindings
    #[must_use]
    pub const fn bindings(&self) -> &'static Bindings {
        match self {
            Self::Student => &STUDENT_BINDINGS,
            Self::Author => &AUTHOR_BINDINGS,
        }
    }

    /// Ordered field schema
    #[must_use]
    pub const fn schema(&self) -> &'static [FieldSpec] {
        match self {
            Self::Student => &STUDENT_SCHEMA,
            Self::Author => &AUTHOR_SCHEMA,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Student => write!(f, "Student"),
            Self::Author => write!(f, "Author"),
        }
    }
}

impl FromStr for RecordKind {
    type Err = SondaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" | "aluno" => Ok(Self::Student),
            "author" | "autor" => Ok(Self::Author),
            other => Err(SondaError::config(format!(
                "unknown record kind `{other}` (expected student or author)"
            ))),
        }
    }
}

// =============================================================================
// SCHEMA
// =============================================================================

/// How a field receives input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    /// Single-line text
    Text,
    /// Date input; always typed in one go
    Date,
    /// Multi-line text
    LongText,
}

impl InputKind {
    /// Name used in listings
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::LongText => "long-text",
        }
    }
}

/// One field of a record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Field name
    pub name: &'static str,
    /// Identifier of the input in the create form
    pub element_id: &'static str,
    /// Input kind
    pub input: InputKind,
    /// Value written at creation
    pub value: &'static str,
    /// Whether the value identifies the record in the list
    pub identifying: bool,
    /// Edit-form input and value written during the update step
    pub update: Option<FieldUpdate>,
}

/// Mutation applied to a field during the update step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldUpdate {
    /// Identifier of the input in the edit form
    pub element_id: &'static str,
    /// New value
    pub value: &'static str,
}

const STUDENT_SCHEMA: [FieldSpec; 5] = [
    FieldSpec {
        name: "nome",
        element_id: "nome",
        input: InputKind::Text,
        value: "João Teste Selenium",
        identifying: true,
        update: Some(FieldUpdate {
            element_id: "edit-nome",
            value: "João Atualizado Selenium",
        }),
    },
    FieldSpec {
        name: "matricula",
        element_id: "matricula",
        input: InputKind::Text,
        value: "9998",
        identifying: true,
        update: None,
    },
    FieldSpec {
        name: "email",
        element_id: "email",
        input: InputKind::Text,
        value: "joao.teste@atlas.com.br",
        identifying: false,
        update: None,
    },
    FieldSpec {
        name: "telefone",
        element_id: "telefone",
        input: InputKind::Text,
        value: "11988887777",
        identifying: false,
        update: None,
    },
    FieldSpec {
        name: "dataNascimento",
        element_id: "dataNascimento",
        input: InputKind::Date,
        value: "2000-01-15",
        identifying: false,
        update: None,
    },
];

const AUTHOR_SCHEMA: [FieldSpec; 4] = [
    FieldSpec {
        name: "autorNome",
        element_id: "autorNome",
        input: InputKind::Text,
        value: "Machado de Selenium",
        identifying: true,
        update: Some(FieldUpdate {
            element_id: "edit-autor-nome",
            value: "Machado de Selenium Atualizado",
        }),
    },
    FieldSpec {
        name: "autorNacionalidade",
        element_id: "autorNacionalidade",
        input: InputKind::Text,
        value: "Brasileira",
        identifying: false,
        update: None,
    },
    FieldSpec {
        name: "autorNascimento",
        element_id: "autorNascimento",
        input: InputKind::Date,
        value: "1839-06-21",
        identifying: false,
        update: None,
    },
    FieldSpec {
        name: "autorBiografia",
        element_id: "autorBiografia",
        input: InputKind::LongText,
        value: "Autor de testes automatizados e literatura técnica.",
        identifying: false,
        update: None,
    },
];

// =============================================================================
// BINDINGS
// =============================================================================

/// Element identifiers and routes for one record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bindings {
    /// Summary statistic proving the home page loaded
    pub ready_marker: &'static str,
    /// Route fragment of the create view
    pub create_route: &'static str,
    /// Route fragment of the list view
    pub list_route: &'static str,
    /// Create form
    pub create_form: &'static str,
    /// Feedback region under the create form
    pub message_region: &'static str,
    /// Table body holding one row per record
    pub list_container: &'static str,
    /// Table around the list container
    pub list_table: &'static str,
    /// Name input inside the edit modal
    pub edit_field: &'static str,
    /// Edit form
    pub edit_form: &'static str,
    /// Overlay wrapping the edit form
    pub edit_modal: &'static str,
    /// Label of the per-row edit control
    pub edit_label: &'static str,
    /// Label of the per-row delete control
    pub delete_label: &'static str,
}

const STUDENT_BINDINGS: Bindings = Bindings {
    ready_marker: "stat-total-alunos",
    create_route: "#/aluno/cadastro",
    list_route: "#/aluno/consulta",
    create_form: "form-cadastro",
    message_region: "cadastro-messages",
    list_container: "tbody-alunos",
    list_table: "tabela-alunos",
    edit_field: "edit-nome",
    edit_form: "form-edicao",
    edit_modal: "modal-overlay",
    edit_label: "Editar",
    delete_label: "Excluir",
};

const AUTHOR_BINDINGS: Bindings = Bindings {
    ready_marker: "stat-total-autores",
    create_route: "#/autor/cadastro",
    list_route: "#/autor/consulta",
    create_form: "form-autor-cadastro",
    message_region: "autor-cadastro-messages",
    list_container: "tbody-autores",
    list_table: "tabela-autores",
    edit_field: "edit-autor-nome",
    edit_form: "form-autor-edicao",
    edit_modal: "modal-autor-overlay",
    edit_label: "Editar",
    delete_label: "Excluir",
};

impl Bindings {
    /// Page-ready marker on the home page
    #[must_use]
    pub fn ready_marker(&self) -> Locator {
        Locator::new(Selector::id(self.ready_marker))
    }

    /// Home page button leading to the create view
    #[must_use]
    pub fn create_link(&self) -> Locator {
        Locator::new(Selector::link(self.create_route, NAV_BUTTON_CLASS))
    }

    /// Home page button leading to the list view
    #[must_use]
    pub fn list_link(&self) -> Locator {
        Locator::new(Selector::link(self.list_route, NAV_BUTTON_CLASS))
    }

    /// Create form
    #[must_use]
    pub fn create_form(&self) -> Locator {
        Locator::new(Selector::id(self.create_form))
    }

    /// Submit control of the create form
    #[must_use]
    pub fn create_submit(&self) -> Locator {
        Locator::new(Selector::id(self.create_form).within(Selector::css(SUBMIT_CSS)))
    }

    /// Feedback region of the create form
    #[must_use]
    pub fn message_region(&self) -> Locator {
        Locator::new(Selector::id(self.message_region))
    }

    /// Rendered list; falls back to the whole table
    #[must_use]
    pub fn list(&self) -> Locator {
        Locator::new(Selector::id(self.list_container)).or(Selector::id(self.list_table))
    }

    /// Edit control in the row showing any of `identity`, else the first in the list
    #[must_use]
    pub fn edit_control(&self, identity: &[String]) -> Locator {
        let container = Selector::id(self.list_container);
        Locator::new(
            container
                .clone()
                .within(Selector::row(identity.iter().cloned()))
                .within(Selector::button(self.edit_label)),
        )
        .or(container.within(Selector::button(self.edit_label)))
    }

    /// Delete control in the row showing any of `identity`
    ///
    /// The list-wide fallback only resolves when the list holds a single
    /// delete control, so it can never pick another record's row.
    #[must_use]
    pub fn delete_control(&self, identity: &[String]) -> Locator {
        let container = Selector::id(self.list_container);
        Locator::new(
            container
                .clone()
                .within(Selector::row(identity.iter().cloned()))
                .within(Selector::button(self.delete_label)),
        )
        .or_unique(container.within(Selector::button(self.delete_label)))
    }

    /// Edit form
    #[must_use]
    pub fn edit_form(&self) -> Locator {
        Locator::new(Selector::id(self.edit_form))
    }

    /// Submit control of the edit form
    #[must_use]
    pub fn edit_submit(&self) -> Locator {
        Locator::new(Selector::id(self.edit_form).within(Selector::css(SUBMIT_CSS)))
    }

    /// Edit modal overlay
    #[must_use]
    pub fn edit_modal(&self) -> Locator {
        Locator::new(Selector::id(self.edit_modal))
    }
}

// =============================================================================
// TEST RECORD
// =============================================================================

/// Field values of the record a scenario creates, edits and deletes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRecord {
    kind: RecordKind,
    original: Vec<(&'static str, String)>,
    current: Vec<(&'static str, String)>,
    updated: bool,
}

impl TestRecord {
    /// Fixture values for a kind
    #[must_use]
    pub fn fixture(kind: RecordKind) -> Self {
        let values: Vec<_> = kind
            .schema()
            .iter()
            .map(|f| (f.name, f.value.to_string()))
            .collect();
        Self {
            kind,
            original: values.clone(),
            current: values,
            updated: false,
        }
    }

    /// Override one field's value before the record is created
    #[must_use]
    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        for set in [&mut self.original, &mut self.current] {
            if let Some(slot) = set.iter_mut().find(|(n, _)| *n == name) {
                slot.1 = value.clone();
            }
        }
        self
    }

    /// Record kind
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Current value of a field
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        lookup(&self.current, name)
    }

    /// Value of a field before the update step
    #[must_use]
    pub fn original_value(&self, name: &str) -> Option<&str> {
        lookup(&self.original, name)
    }

    /// Whether the update step has been applied
    #[must_use]
    pub const fn is_updated(&self) -> bool {
        self.updated
    }

    /// Current field values in schema order, paired with their specs
    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldSpec, &str)> + '_ {
        self.kind
            .schema()
            .iter()
            .filter_map(|spec| self.value(spec.name).map(|v| (spec, v)))
    }

    /// Current identifying values
    #[must_use]
    pub fn identity(&self) -> Vec<String> {
        self.identity_in(&self.current)
    }

    /// Identifying values before the update step
    #[must_use]
    pub fn original_identity(&self) -> Vec<String> {
        self.identity_in(&self.original)
    }

    /// Values whose presence in the list proves the record was created
    ///
    /// A student shows up under its name or its enrolment number; an author
    /// only under its name.
    #[must_use]
    pub fn presence_proof(&self) -> Vec<String> {
        match self.kind {
            RecordKind::Student => self.identity(),
            RecordKind::Author => self
                .identity()
                .into_iter()
                .take(1)
                .collect(),
        }
    }

    fn identity_in(&self, values: &[(&'static str, String)]) -> Vec<String> {
        self.kind
            .schema()
            .iter()
            .filter(|f| f.identifying)
            .filter_map(|f| lookup(values, f.name).map(str::to_string))
            .collect()
    }

    /// Mutable fields with their edit-form input and new value
    pub fn updates(&self) -> impl Iterator<Item = (&'static FieldSpec, &'static FieldUpdate)> {
        self.kind
            .schema()
            .iter()
            .filter_map(|spec| spec.update.as_ref().map(|u| (spec, u)))
    }

    /// Switch current values to their updated forms; applying twice is an error
    pub fn apply_update(&mut self) -> Result<(), SondaError> {
        if self.updated {
            return Err(SondaError::invalid_state(format!(
                "{} record already updated",
                self.kind
            )));
        }
        for (spec, update) in self.kind.schema().iter().filter_map(|s| s.update.map(|u| (s, u))) {
            if let Some(slot) = self.current.iter_mut().find(|(n, _)| *n == spec.name) {
                slot.1 = update.value.to_string();
            }
        }
        self.updated = true;
        Ok(())
    }

    /// Updated values of mutated fields
    #[must_use]
    pub fn updated_values(&self) -> Vec<String> {
        self.updates()
            .filter_map(|(spec, _)| self.value(spec.name).map(str::to_string))
            .collect()
    }

    /// Mutated fields as `(before, after)` pairs
    ///
    /// After the edit `before` may only appear inside occurrences of
    /// `after`, never on its own.
    #[must_use]
    pub fn superseded_values(&self) -> Vec<(String, String)> {
        self.updates()
            .filter_map(|(spec, _)| {
                let before = self.original_value(spec.name)?;
                let after = self.value(spec.name)?;
                (before != after).then(|| (before.to_string(), after.to_string()))
            })
            .collect()
    }

    /// Every identifying value the record ever had
    #[must_use]
    pub fn all_identities(&self) -> Vec<String> {
        let mut out = self.original_identity();
        for value in self.identity() {
            if !out.contains(&value) {
                out.push(value);
            }
        }
        out
    }
}

fn lookup<'a>(values: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
    values
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.as_str())
}
