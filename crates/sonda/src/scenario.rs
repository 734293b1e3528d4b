//! Scenario Orchestrator
//!
//! One [`Scenario`] walks a record through its whole lifecycle:
//!
//! ```text
//! Start → Listing → CreateForm → Submitted → VerifiedCreated → ListingCreated
//!       → EditOpen → EditSubmitted → VerifiedUpdated
//!       → DeleteConfirming → VerifiedDeleted → End
//! ```
//!
//! Every advance is checked against [`Stage::successor`]. Failures are
//! wrapped with the [`Phase`] they happened in (create, edit or delete) and
//! keep their cause attached.

use crate::assertion::{
    assert_text_absent, assert_text_contains, assert_text_superseded, Assertion, CaseMode,
    MatchMode,
};
use crate::driver::PageDriver;
use crate::locator::{Locator, Selector};
use crate::record::{FieldSpec, RecordKind, TestRecord, SUCCESS_TOKENS};
use crate::result::{SondaError, SondaResult};
use crate::session::{Session, SessionTask};
use crate::wait::Predicate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use tracing::info;

// =============================================================================
// STAGES
// =============================================================================

/// Sub-scenario a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Navigate, fill, submit, verify message and listing
    Create,
    /// Open the edit modal, retype, verify the list
    Edit,
    /// Delete, confirm, verify absence
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Edit => write!(f, "edit"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Lifecycle position of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Nothing done yet
    Start,
    /// Home page loaded
    Listing,
    /// Create view open
    CreateForm,
    /// Create form submitted
    Submitted,
    /// Success message seen
    VerifiedCreated,
    /// Record seen in the list
    ListingCreated,
    /// Edit modal open
    EditOpen,
    /// Edit modal closed after submit
    EditSubmitted,
    /// Updated values seen in the list
    VerifiedUpdated,
    /// Delete confirmed
    DeleteConfirming,
    /// Record gone from the list
    VerifiedDeleted,
    /// Finished
    End,
}

impl Stage {
    /// The only stage that may follow this one
    #[must_use]
    pub const fn successor(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::Listing),
            Self::Listing => Some(Self::CreateForm),
            Self::CreateForm => Some(Self::Submitted),
            Self::Submitted => Some(Self::VerifiedCreated),
            Self::VerifiedCreated => Some(Self::ListingCreated),
            Self::ListingCreated => Some(Self::EditOpen),
            Self::EditOpen => Some(Self::EditSubmitted),
            Self::EditSubmitted => Some(Self::VerifiedUpdated),
            Self::VerifiedUpdated => Some(Self::DeleteConfirming),
            Self::DeleteConfirming => Some(Self::VerifiedDeleted),
            Self::VerifiedDeleted => Some(Self::End),
            Self::End => None,
        }
    }

    /// Phase of the step that leads out of this stage
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Start
            | Self::Listing
            | Self::CreateForm
            | Self::Submitted
            | Self::VerifiedCreated => Phase::Create,
            Self::ListingCreated | Self::EditOpen | Self::EditSubmitted => Phase::Edit,
            Self::VerifiedUpdated
            | Self::DeleteConfirming
            | Self::VerifiedDeleted
            | Self::End => Phase::Delete,
        }
    }

    /// Name used in logs and reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Listing => "listing",
            Self::CreateForm => "create-form",
            Self::Submitted => "submitted",
            Self::VerifiedCreated => "verified-created",
            Self::ListingCreated => "listing-created",
            Self::EditOpen => "edit-open",
            Self::EditSubmitted => "edit-submitted",
            Self::VerifiedUpdated => "verified-updated",
            Self::DeleteConfirming => "delete-confirming",
            Self::VerifiedDeleted => "verified-deleted",
            Self::End => "end",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded advance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Stage left
    pub from: Stage,
    /// Stage entered
    pub to: Stage,
    /// Milliseconds since the scenario started
    pub at_ms: u64,
    /// What was verified
    pub note: String,
}

// =============================================================================
// SCENARIO
// =============================================================================

/// Full create/edit/delete lifecycle for one record kind
#[derive(Debug, Clone)]
pub struct Scenario {
    kind: RecordKind,
    record: TestRecord,
    stage: Stage,
    transcript: Vec<Transition>,
    started: Option<Instant>,
}

impl Scenario {
    /// Scenario over the kind's fixture record
    #[must_use]
    pub fn new(kind: RecordKind) -> Self {
        Self::with_record(TestRecord::fixture(kind))
    }

    /// Scenario over a custom record
    #[must_use]
    pub fn with_record(record: TestRecord) -> Self {
        Self {
            kind: record.kind(),
            record,
            stage: Stage::Start,
            transcript: Vec::new(),
            started: None,
        }
    }

    /// Record kind
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Record under test
    #[must_use]
    pub const fn record(&self) -> &TestRecord {
        &self.record
    }

    /// Last stage reached
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Advances so far
    #[must_use]
    pub fn transcript(&self) -> &[Transition] {
        &self.transcript
    }

    /// Move to `to`; anything but the successor is an invalid transition
    pub fn advance(&mut self, to: Stage, note: impl Into<String>) -> SondaResult<()> {
        if self.stage.successor() != Some(to) {
            return Err(SondaError::invalid_state(format!(
                "{} scenario cannot move from {} to {to}",
                self.kind, self.stage
            )));
        }
        let at_ms = self
            .started
            .map_or(0, |s| u64::try_from(s.elapsed().as_millis()).unwrap_or(u64::MAX));
        let note = note.into();
        info!(kind = %self.kind, from = %self.stage, to = %to, at_ms, note = note.as_str(), "transition");
        self.transcript.push(Transition {
            from: self.stage,
            to,
            at_ms,
            note,
        });
        self.stage = to;
        Ok(())
    }

    /// Steps 1 to 6: create the record and find it in the list
    #[tracing::instrument(name = "create", skip_all, fields(kind = %self.kind))]
    pub async fn create<D: PageDriver>(&mut self, session: &mut Session<D>) -> SondaResult<()> {
        let bindings = self.kind.bindings();
        let base_url = session.config().base_url.clone();

        session.navigate(&base_url, &bindings.ready_marker()).await?;
        self.advance(Stage::Listing, format!("#{} present", bindings.ready_marker))?;
        session.pause().await;

        session.click(&bindings.create_link()).await?;
        self.advance(Stage::CreateForm, format!("opened {}", bindings.create_route))?;
        session.pause().await;

        session
            .wait_for(&bindings.create_form(), Predicate::Present)
            .await?;
        let fields: Vec<(&'static FieldSpec, String)> = self
            .record
            .fields()
            .map(|(spec, value)| (spec, value.to_string()))
            .collect();
        for (spec, value) in &fields {
            let input = Locator::new(Selector::id(spec.element_id));
            session.type_field(&input, value, spec.input).await?;
            session.pause().await;
        }
        session.click(&bindings.create_submit()).await?;
        self.advance(
            Stage::Submitted,
            format!("filled {} fields and submitted", fields.len()),
        )?;
        session.pause().await;

        let messages = bindings.message_region();
        session.wait_for(&messages, Predicate::Visible).await?;
        let feedback = session.text_of(&messages).await?;
        let verdict = Assertion::text_contains(
            &feedback,
            &SUCCESS_TOKENS,
            MatchMode::Any,
            CaseMode::Insensitive,
        )
        .into_result()?;
        self.advance(Stage::VerifiedCreated, verdict.message)?;
        session.pause().await;

        session.navigate(&base_url, &bindings.ready_marker()).await?;
        session.pause().await;
        session.click(&bindings.list_link()).await?;
        session.pause().await;

        let list = bindings.list();
        session.wait_for(&list, Predicate::Present).await?;
        let verdict = assert_text_contains(
            session,
            &list,
            &self.record.presence_proof(),
            MatchMode::Any,
            CaseMode::Sensitive,
        )
        .await?
        .into_result()?;
        self.advance(Stage::ListingCreated, verdict.message)?;
        session.pause().await;
        Ok(())
    }

    /// Steps 7 to 9: rename through the edit modal
    #[tracing::instrument(name = "edit", skip_all, fields(kind = %self.kind))]
    pub async fn edit<D: PageDriver>(&mut self, session: &mut Session<D>) -> SondaResult<()> {
        let bindings = self.kind.bindings();

        session
            .click(&bindings.edit_control(&self.record.identity()))
            .await?;
        session
            .wait_for(&bindings.edit_form(), Predicate::Visible)
            .await?;
        self.advance(Stage::EditOpen, format!("#{} visible", bindings.edit_form))?;
        session.pause().await;

        let updates: Vec<_> = self.record.updates().collect();
        for (spec, update) in updates {
            let input = Locator::new(Selector::id(update.element_id));
            session.clear(&input).await?;
            session.type_field(&input, update.value, spec.input).await?;
            session.pause().await;
        }
        session.click(&bindings.edit_submit()).await?;
        session.wait_gone(&bindings.edit_modal()).await?;
        self.record.apply_update()?;
        self.advance(
            Stage::EditSubmitted,
            format!("#{} closed", bindings.edit_modal),
        )?;
        session.pause().await;

        let list = bindings.list();
        session.wait_for(&list, Predicate::Present).await?;
        let present = assert_text_contains(
            session,
            &list,
            &self.record.updated_values(),
            MatchMode::All,
            CaseMode::Sensitive,
        )
        .await?
        .into_result()?;
        let replaced = assert_text_superseded(
            session,
            &list,
            &self.record.superseded_values(),
            CaseMode::Sensitive,
        )
        .await?
        .into_result()?;
        let note = format!("{}; {}", present.message, replaced.message);
        self.advance(Stage::VerifiedUpdated, note)?;
        session.pause().await;
        Ok(())
    }

    /// Steps 10 and 11: delete, confirm, verify absence
    #[tracing::instrument(name = "delete", skip_all, fields(kind = %self.kind))]
    pub async fn delete<D: PageDriver>(&mut self, session: &mut Session<D>) -> SondaResult<()> {
        let bindings = self.kind.bindings();

        session
            .click(&bindings.delete_control(&self.record.identity()))
            .await?;
        let dialog = session.accept_dialog().await?;
        self.advance(
            Stage::DeleteConfirming,
            format!("accepted {} {:?}", dialog.dialog_type(), dialog.message()),
        )?;
        session.pause().await;

        let list = bindings.list();
        let verdict = assert_text_absent(
            session,
            &list,
            &self.record.all_identities(),
            CaseMode::Sensitive,
        )
        .await?
        .into_result()?;
        self.advance(Stage::VerifiedDeleted, verdict.message)?;
        self.advance(Stage::End, "lifecycle complete")?;
        Ok(())
    }
}

#[async_trait]
impl SessionTask for Scenario {
    type Output = ();

    fn name(&self) -> String {
        format!("{} scenario", self.kind)
    }

    async fn run<D: PageDriver>(&mut self, session: &mut Session<D>) -> SondaResult<()> {
        if self.stage != Stage::Start {
            return Err(SondaError::invalid_state(format!(
                "{} scenario already ran (at {})",
                self.kind, self.stage
            )));
        }
        self.started = Some(Instant::now());
        let kind = self.kind;
        info!(%kind, "scenario started");

        self.create(session)
            .await
            .map_err(|e| e.in_phase(kind, Phase::Create))?;
        self.edit(session)
            .await
            .map_err(|e| e.in_phase(kind, Phase::Edit))?;
        self.delete(session)
            .await
            .map_err(|e| e.in_phase(kind, Phase::Delete))?;

        info!(%kind, transitions = self.transcript.len(), "scenario passed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod stage_tests {
        use super::*;

        #[test]
        fn test_eleven_transitions_to_end() {
            let mut stage = Stage::Start;
            let mut steps = 0;
            while let Some(next) = stage.successor() {
                stage = next;
                steps += 1;
            }
            assert_eq!(stage, Stage::End);
            assert_eq!(steps, 11);
        }

        #[test]
        fn test_phases() {
            assert_eq!(Stage::Start.phase(), Phase::Create);
            assert_eq!(Stage::ListingCreated.phase(), Phase::Edit);
            assert_eq!(Stage::VerifiedUpdated.phase(), Phase::Delete);
        }

        #[test]
        fn test_names() {
            assert_eq!(Stage::DeleteConfirming.to_string(), "delete-confirming");
            assert_eq!(Phase::Edit.to_string(), "edit");
            assert_eq!(
                serde_json::to_string(&Stage::VerifiedCreated).unwrap(),
                "\"verified-created\""
            );
        }
    }

    mod advance_tests {
        use super::*;

        #[test]
        fn test_advance_in_order() {
            let mut scenario = Scenario::new(RecordKind::Student);
            scenario.advance(Stage::Listing, "home").unwrap();
            scenario.advance(Stage::CreateForm, "form").unwrap();
            assert_eq!(scenario.stage(), Stage::CreateForm);
            assert_eq!(scenario.transcript().len(), 2);
            assert_eq!(scenario.transcript()[1].from, Stage::Listing);
        }

        #[test]
        fn test_skipping_is_invalid() {
            let mut scenario = Scenario::new(RecordKind::Author);
            let err = scenario.advance(Stage::EditOpen, "jump").unwrap_err();
            assert!(matches!(err, SondaError::InvalidState { .. }));
            assert_eq!(scenario.stage(), Stage::Start);
            assert!(scenario.transcript().is_empty());
        }

        #[test]
        fn test_no_advance_past_end() {
            let mut scenario = Scenario::new(RecordKind::Author);
            let mut stage = Stage::Start;
            while let Some(next) = stage.successor() {
                scenario.advance(next, "").unwrap();
                stage = next;
            }
            assert!(scenario.advance(Stage::Start, "again").is_err());
        }
    }
}
