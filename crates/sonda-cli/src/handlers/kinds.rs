//! Kinds command handler

use crate::commands::{selected_kinds, KindsArgs};
use crate::error::CliResult;
use crate::output::OutputFormat;
use serde::Serialize;
use sonda::{Bindings, FieldSpec, RecordKind};
use std::fmt::Write as _;

/// What one record kind's scenario relies on in the page
#[derive(Debug, Clone, Serialize)]
pub struct KindSummary {
    /// Record kind
    pub kind: RecordKind,
    /// Element ids and routes
    pub bindings: &'static Bindings,
    /// Fixture fields in form order
    pub fields: &'static [FieldSpec],
}

impl KindSummary {
    /// Summary for one kind
    #[must_use]
    pub fn of(kind: RecordKind) -> Self {
        Self {
            kind,
            bindings: kind.bindings(),
            fields: kind.schema(),
        }
    }
}

/// Execute the kinds command
pub fn execute_kinds(args: &KindsArgs) -> CliResult<()> {
    let summaries: Vec<KindSummary> = selected_kinds(&args.kinds)
        .into_iter()
        .map(KindSummary::of)
        .collect();
    let format = OutputFormat::from(args.format);
    let text = match format.render(&summaries)? {
        Some(structured) => structured,
        None => render_text(&summaries),
    };
    print!("{text}");
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Plain listing of bindings and fixture fields
#[must_use]
pub fn render_text(summaries: &[KindSummary]) -> String {
    let mut out = String::new();
    for summary in summaries {
        let b = summary.bindings;
        let _ = writeln!(out, "{} ({})", summary.kind, summary.kind.as_str());
        let _ = writeln!(out, "  ready marker:  #{}", b.ready_marker);
        let _ = writeln!(out, "  create route:  {}", b.create_route);
        let _ = writeln!(out, "  list route:    {}", b.list_route);
        let _ = writeln!(out, "  create form:   #{}", b.create_form);
        let _ = writeln!(out, "  messages:      #{}", b.message_region);
        let _ = writeln!(out, "  list:          #{} (in #{})", b.list_container, b.list_table);
        let _ = writeln!(out, "  edit form:     #{} (in #{})", b.edit_form, b.edit_modal);
        let _ = writeln!(out, "  row controls:  {} / {}", b.edit_label, b.delete_label);
        let _ = writeln!(out, "  fields:");
        for field in summary.fields {
            let marker = if field.identifying { "*" } else { " " };
            let update = field
                .update
                .map(|u| format!(" -> #{} = {:?}", u.element_id, u.value))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "   {marker}#{:<22} {:<9} {:?}{update}",
                field.element_id,
                field.input.as_str(),
                field.value,
            );
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_lists_bindings_and_fields() {
        let text = render_text(&[KindSummary::of(RecordKind::Student)]);
        assert!(text.starts_with("Student (student)\n"));
        assert!(text.contains("#stat-total-alunos"));
        assert!(text.contains("#/aluno/consulta"));
        assert!(text.contains("*#nome"));
        assert!(text.contains("#edit-nome = \"João Atualizado Selenium\""));
    }

    #[test]
    fn test_json_shape() {
        let summaries = vec![KindSummary::of(RecordKind::Author)];
        let json = OutputFormat::Json.render(&summaries).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["kind"], "author");
        assert_eq!(value[0]["bindings"]["list_route"], "#/autor/consulta");
        assert!(value[0]["fields"].as_array().unwrap().len() >= 2);
    }
}
