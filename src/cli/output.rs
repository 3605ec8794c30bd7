//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::framework::{Attribute, Diagnostics, Nesting, Schema, Severity};
use crate::planner::{ActionStatus, ActionType, DeploymentPlan, ExecutionResult};
use crate::reconciler::{DriftReport, DriftStatus};
use crate::state::{ResourceState, StateDocument};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// State entry row for table display.
#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Config hash")]
    config_hash: String,
    #[tabled(rename = "Updated")]
    updated_at: String,
}

/// Action result row for table display.
#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Schema attribute row for table display.
#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    name: String,
    #[tabled(rename = "Type")]
    attr_type: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Serializes `value` for the machine formats, or calls `text`.
    fn render<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce() -> String) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value).unwrap_or_default(),
            OutputFormat::Yaml => serde_yaml::to_string(value).unwrap_or_default(),
            OutputFormat::Text => text(),
        }
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan) -> String {
        self.render(&plan.to_json(), || Self::format_plan_text(plan))
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &DeploymentPlan) -> String {
        let mut output = String::new();
        for entry in &plan.diagnostics {
            output.push_str(&Self::diagnostics_text(&entry.diagnostics, Some(&entry.address.to_string())));
        }

        if !plan.has_changes() {
            let _ = writeln!(
                output,
                "{} No changes. The platform matches the configuration.",
                "✓".green()
            );
            return output;
        }

        output.push_str("\nExecution plan:\n\n");
        for change in plan.changes.iter().filter(|c| c.action != ActionType::NoOp) {
            let _ = writeln!(
                output,
                "  {} {} ({})",
                Self::format_action_symbol(change.action),
                change.address.to_string().bold(),
                change.action
            );
            for path in &change.replace_paths {
                let _ = writeln!(output, "      {} {path}", "# forces replacement:".dimmed());
            }
            for attribute in change.changes() {
                let _ = writeln!(output, "      {attribute}");
            }
        }
        for read in plan.reads.iter().filter(|r| r.state.is_none()) {
            let _ = writeln!(
                output,
                "  {} {} (read during apply)",
                Self::format_action_symbol(ActionType::Read),
                read.address
            );
        }

        let _ = writeln!(
            output,
            "\nPlan: {} to add, {} to change, {} to replace, {} to destroy.",
            plan.count(ActionType::Create).to_string().green(),
            plan.count(ActionType::Update).to_string().yellow(),
            plan.count(ActionType::Replace).to_string().yellow(),
            plan.count(ActionType::Delete).to_string().red()
        );
        output
    }

    /// Formats the result of an apply or destroy.
    #[must_use]
    pub fn format_execution(&self, result: &ExecutionResult) -> String {
        self.render(result, || {
            let mut output = String::new();
            for action in &result.results {
                output.push_str(&Self::diagnostics_text(&action.diagnostics, Some(&action.address.to_string())));
            }

            let rows: Vec<ActionRow> = result
                .results
                .iter()
                .map(|r| ActionRow {
                    action: r.action.to_string(),
                    resource: r.address.to_string(),
                    status: match r.status {
                        ActionStatus::Succeeded => "done".green().to_string(),
                        ActionStatus::Failed => "failed".red().to_string(),
                        ActionStatus::Skipped => r.reason.clone().unwrap_or_default().dimmed().to_string(),
                    },
                })
                .collect();
            if !rows.is_empty() {
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
            }

            let status = if result.success {
                format!("{} Apply complete", "✓".green())
            } else {
                format!("{} Apply failed", "✗".red())
            };
            let _ = writeln!(
                output,
                "\n{status}: {} succeeded, {} failed, {} skipped.",
                result.successful, result.failed, result.skipped
            );
            output
        })
    }

    /// Formats a drift report.
    #[must_use]
    pub fn format_drift(&self, report: &DriftReport) -> String {
        self.render(report, || {
            let mut output = String::new();
            for entry in &report.entries {
                output.push_str(&Self::diagnostics_text(&entry.diagnostics, Some(&entry.address)));
            }
            if report.is_converged() {
                let _ = writeln!(output, "{} No drift detected - state is converged.", "✓".green());
                return output;
            }

            let _ = write!(output, "{} Drift detected:\n\n", "⚠".yellow());
            for entry in report.entries.iter().filter(|e| e.status != DriftStatus::InSync) {
                let status = match entry.status {
                    DriftStatus::Removed | DriftStatus::Failed => entry.status.to_string().red(),
                    _ => entry.status.to_string().yellow(),
                };
                let _ = writeln!(output, "   {} ({status})", entry.address);
                for change in &entry.changes {
                    let _ = writeln!(output, "       {change}");
                }
            }
            let drifted = report
                .entries
                .iter()
                .filter(|e| matches!(e.status, DriftStatus::Changed | DriftStatus::Removed))
                .count();
            let _ = write!(
                output,
                "\n{drifted}/{} resources have drifted.\n",
                report.entries.len()
            );
            output
        })
    }

    /// Formats the addresses in state.
    #[must_use]
    pub fn format_state_list(&self, state: &StateDocument) -> String {
        let addresses = state.addresses();
        self.render(&addresses, || {
            if state.resources.is_empty() {
                return String::from("No resources in state.\n");
            }
            let rows: Vec<StateRow> = state
                .resources
                .iter()
                .map(|(address, entry)| StateRow {
                    address: address.clone(),
                    id: entry.attributes["id"].as_str().unwrap_or("").to_string(),
                    config_hash: Self::truncate(&entry.config_hash, 8),
                    updated_at: entry.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                })
                .collect();
            let mut output = format!(
                "State serial {} (lineage {})\n",
                state.serial,
                Self::truncate(&state.lineage, 8)
            );
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
            output
        })
    }

    /// Formats one stored resource.
    #[must_use]
    pub fn format_state_entry(&self, address: &str, entry: &ResourceState) -> String {
        self.render(entry, || {
            let mut output = format!("# {}\n", address.bold());
            if let Some(attributes) = entry.attributes.as_object() {
                let width = attributes.keys().map(String::len).max().unwrap_or(0);
                for (name, value) in attributes {
                    let _ = writeln!(output, "{name:<width$} = {value}");
                }
            }
            output
        })
    }

    /// Formats the list of served types.
    #[must_use]
    pub fn format_type_list<'a>(
        &self,
        resources: impl IntoIterator<Item = &'a str>,
        data_sources: impl IntoIterator<Item = &'a str>,
    ) -> String {
        let listing = serde_json::json!({
            "resources": resources.into_iter().collect::<Vec<_>>(),
            "data_sources": data_sources.into_iter().collect::<Vec<_>>(),
        });
        self.render(&listing, || {
            let mut output = String::new();
            for (heading, key) in [("Resources", "resources"), ("Data sources", "data_sources")] {
                let _ = writeln!(output, "{}:", heading.bold());
                for name in listing[key].as_array().into_iter().flatten() {
                    let _ = writeln!(output, "  {}", name.as_str().unwrap_or_default());
                }
            }
            output
        })
    }

    /// Formats a schema as a table of attributes.
    #[must_use]
    pub fn format_schema(&self, type_name: &str, schema: &Schema) -> String {
        let mut rows = Vec::new();
        Self::attribute_rows("", &schema.attributes, &mut rows);
        let listing: Vec<serde_json::Value> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "attribute": r.name,
                    "type": r.attr_type,
                    "mode": r.mode,
                    "description": r.description,
                })
            })
            .collect();
        let document = serde_json::json!({
            "type": type_name,
            "description": schema.description.description,
            "attributes": listing,
        });
        self.render(&document, move || {
            let mut output = format!("{}\n{}\n\n", type_name.bold(), schema.description.description);
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
            output
        })
    }

    fn attribute_rows(
        prefix: &str,
        attributes: &std::collections::BTreeMap<String, Attribute>,
        rows: &mut Vec<AttributeRow>,
    ) {
        for (name, attribute) in attributes {
            let name = format!("{prefix}{name}");
            rows.push(AttributeRow {
                name: name.clone(),
                attr_type: attribute.attr_type.to_string(),
                mode: format!("{:?}", attribute.mode),
                description: Self::truncate(&attribute.description.description, 60),
            });
            if let Some((nesting, children)) = &attribute.nested {
                let child_prefix = match nesting {
                    Nesting::Single => format!("{name}."),
                    Nesting::Set | Nesting::List => format!("{name}[*]."),
                };
                Self::attribute_rows(&child_prefix, children, rows);
            }
        }
    }

    /// Formats diagnostics, optionally tagged with the block they came from.
    #[must_use]
    pub fn format_diagnostics(&self, diagnostics: &Diagnostics, address: Option<&str>) -> String {
        self.render(diagnostics, || Self::diagnostics_text(diagnostics, address))
    }

    fn diagnostics_text(diagnostics: &Diagnostics, address: Option<&str>) -> String {
        let mut output = String::new();
        for diagnostic in diagnostics.iter() {
            let label = match diagnostic.severity {
                Severity::Error => format!("{}:", diagnostic.severity).red().bold(),
                Severity::Warning => format!("{}:", diagnostic.severity).yellow().bold(),
            };
            let _ = writeln!(output, "{label} {}", diagnostic.summary);
            match (address, &diagnostic.attribute) {
                (Some(address), Some(path)) => {
                    let _ = writeln!(output, "  with {address}, on {path}");
                }
                (Some(address), None) => {
                    let _ = writeln!(output, "  with {address}");
                }
                (None, Some(path)) => {
                    let _ = writeln!(output, "  on {path}");
                }
                (None, None) => {}
            }
            if !diagnostic.detail.is_empty() {
                output.push('\n');
                for line in diagnostic.detail.lines() {
                    let _ = writeln!(output, "  {line}");
                }
            }
            output.push('\n');
        }
        output
    }

    /// Formats an action symbol with color.
    fn format_action_symbol(action: ActionType) -> String {
        match action {
            ActionType::Create => action.symbol().green().to_string(),
            ActionType::Update => action.symbol().yellow().to_string(),
            ActionType::Replace => action.symbol().magenta().to_string(),
            ActionType::Delete => action.symbol().red().to_string(),
            ActionType::Read => action.symbol().cyan().to_string(),
            ActionType::NoOp => action.symbol().dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", message, || format!("{} {message}", "✓".green()))
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", message, || format!("{} {message}", "Error:".red().bold()))
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", message, || format!("{} {message}", "⚠".yellow()))
    }

    fn message(&self, status: &str, message: &str, text: impl FnOnce() -> String) -> String {
        let json = serde_json::json!({ "status": status, "message": message });
        self.render(&json, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Address;
    use crate::framework::{AttributeMode, AttributePath};
    use crate::planner::PlannedChange;
    use crate::reconciler::DriftEntry;

    fn plain() -> OutputFormatter {
        colored::control::set_override(false);
        OutputFormatter::new(OutputFormat::Text)
    }

    #[test]
    fn test_diagnostics_layout() {
        let mut diags = Diagnostics::new();
        diags.add_attribute_error(
            &AttributePath::root("display_name"),
            "Invalid Attribute Value Length",
            "Attribute display_name string length must be at least 1, got: 0",
        );
        diags.add_warning("Requested resource not found", "The resource has been removed.");

        let text = plain().format_diagnostics(&diags, Some("pingone_verify_voice_phrase.main"));
        assert!(text.contains("Error: Invalid Attribute Value Length\n  with pingone_verify_voice_phrase.main, on display_name\n"));
        assert!(text.contains("\n  Attribute display_name string length must be at least 1, got: 0\n"));
        assert!(text.contains("Warning: Requested resource not found\n  with pingone_verify_voice_phrase.main\n"));
    }

    #[test]
    fn test_plan_text_summary() {
        let mut plan = DeploymentPlan::new(Vec::new());
        plan.changes.push(PlannedChange {
            address: Address::resource("pingone_risk_predictor", "main"),
            action: ActionType::Create,
            prior: None,
            planned: None,
            replace_paths: Vec::new(),
            config_hash: None,
        });
        let text = plain().format_plan(&plan);
        assert!(text.contains("+ pingone_risk_predictor.main (create)"));
        assert!(text.contains("Plan: 1 to add, 0 to change, 0 to replace, 0 to destroy."));
    }

    #[test]
    fn test_plan_without_changes() {
        let plan = DeploymentPlan::new(Vec::new());
        assert!(plain().format_plan(&plan).contains("No changes."));
    }

    #[test]
    fn test_drift_json_is_machine_readable() {
        let report = DriftReport {
            entries: vec![DriftEntry {
                address: String::from("pingone_verify_voice_phrase.main"),
                status: DriftStatus::Removed,
                changes: Vec::new(),
                diagnostics: Diagnostics::new(),
            }],
        };
        let json = OutputFormatter::new(OutputFormat::Json).format_drift(&report);
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["entries"][0]["status"], "removed");
    }

    #[test]
    fn test_schema_rows_flatten_nested_attributes() {
        let schema = Schema::new("Test schema.").with_attribute(
            "default",
            Attribute::single_nested(
                AttributeMode::Required,
                vec![("result", Attribute::string(AttributeMode::Required))],
            ),
        );
        let mut rows = Vec::new();
        OutputFormatter::attribute_rows("", &schema.attributes, &mut rows);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["default", "default.result"]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("abcdef", 10), "abcdef");
        assert_eq!(OutputFormatter::truncate("abcdefghijkl", 8), "abcde...");
    }
}
