use std::fmt::Write as _;

use colored::Colorize;
use serde_json::Value;

use crate::executor::engine::{
    ApplySummary, PlanSummary, PlannedChange, RefreshSummary, ResourceAction,
};
use crate::resource::launch_configuration::LaunchConfigurationState;
use crate::state::models::ResourceState;

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg.red());
}

/// Print an execution plan in a Terraform-like format.
pub fn print_resource_plan(plan: &PlanSummary) {
    print!("{}", render_plan(plan));
}

pub fn render_plan(plan: &PlanSummary) -> String {
    let mut out = String::new();
    out.push('\n');

    let actionable: Vec<&PlannedChange> = plan
        .changes
        .iter()
        .filter(|c| c.action != ResourceAction::NoOp)
        .collect();

    if actionable.is_empty() {
        let _ = writeln!(out, "{}", "No changes. Infrastructure is up-to-date.".green());
        return out;
    }

    let _ = writeln!(out, "Resource actions are indicated with the following symbols:");
    if actionable.iter().any(|c| c.action == ResourceAction::Create) {
        let _ = writeln!(out, "  {} create", "+".green().bold());
    }
    if actionable.iter().any(|c| c.action == ResourceAction::Replace) {
        let _ = writeln!(
            out,
            "  {} destroy and then create replacement",
            "-/+".magenta().bold()
        );
    }
    if actionable.iter().any(|c| c.action == ResourceAction::Delete) {
        let _ = writeln!(out, "  {} destroy", "-".red().bold());
    }
    out.push('\n');

    for change in &actionable {
        render_resource_change(&mut out, change);
    }

    let _ = writeln!(out, "{}", plan);
    out
}

fn render_resource_change(out: &mut String, change: &PlannedChange) {
    let (icon, color_fn): (&str, fn(&str) -> colored::ColoredString) = match change.action {
        ResourceAction::Create => ("+", |s: &str| s.green()),
        ResourceAction::Delete => ("-", |s: &str| s.red()),
        ResourceAction::Replace => ("-/+", |s: &str| s.magenta()),
        ResourceAction::NoOp => return,
    };

    let action_desc = match change.action {
        ResourceAction::Create => "will be created",
        ResourceAction::Delete => "will be destroyed",
        ResourceAction::Replace if change.tainted => "is tainted, so must be replaced",
        ResourceAction::Replace => "must be replaced",
        ResourceAction::NoOp => return,
    };

    let _ = writeln!(
        out,
        "  {} {} {}",
        "#".dimmed(),
        change.address.bold(),
        action_desc.dimmed()
    );
    let header = format!(
        "  {} resource \"{}\" \"{}\" {{",
        icon, change.resource_type, change.resource_name
    );
    let _ = writeln!(out, "{}", color_fn(&header));

    match change.action {
        ResourceAction::Create => {
            if let Some(config) = &change.config {
                let planned = LaunchConfigurationState::from_config(config).to_json();
                render_attributes(out, "+", &planned, color_fn);
            }
        }
        ResourceAction::Delete => {
            if let Some(prior) = &change.prior {
                render_attributes(out, "-", &prior.state.to_json(), color_fn);
            }
        }
        ResourceAction::Replace => {
            let width = change
                .changes
                .iter()
                .map(|c| c.name.len())
                .max()
                .unwrap_or(0);
            for attr in &change.changes {
                let old = attr.old.as_ref().map(format_value_short).unwrap_or_else(|| "null".into());
                let new = attr.new.as_ref().map(format_value_short).unwrap_or_else(|| "null".into());
                let marker = if attr.forces_new {
                    " # forces replacement".dimmed().to_string()
                } else {
                    String::new()
                };
                let line = format!(
                    "      ~ {:<width$} = {} -> {}",
                    attr.name,
                    old,
                    new,
                    width = width
                );
                let _ = writeln!(out, "{}{}", color_fn(&line), marker);
            }
        }
        ResourceAction::NoOp => {}
    }

    let _ = writeln!(out, "{}", color_fn("    }"));
    out.push('\n');
}

fn render_attributes(
    out: &mut String,
    icon: &str,
    attrs: &Value,
    color_fn: fn(&str) -> colored::ColoredString,
) {
    let Some(obj) = attrs.as_object() else {
        return;
    };
    let width = obj.keys().map(|k| k.len()).max().unwrap_or(0).min(35);
    for (key, value) in obj {
        let line = format!(
            "      {} {:<width$} = {}",
            icon,
            key,
            format_value_short(value),
            width = width
        );
        let _ = writeln!(out, "{}", color_fn(&line));
    }
}

/// Print the outcome of an apply or destroy.
pub fn print_apply_summary(summary: &ApplySummary) {
    println!();
    for result in &summary.results {
        match &result.error {
            Some(error) => println!("  {} {}: {}", "✗".red().bold(), result.address.bold(), error.red()),
            None => println!("  {} {} ({})", "✓".green(), result.address, result.action),
        }
    }
    println!();
    if summary.failed == 0 {
        println!("{}", summary.to_string().green().bold());
    } else {
        println!("{}", summary.to_string().yellow().bold());
    }
}

pub fn print_refresh_summary(summary: &RefreshSummary) {
    for address in &summary.removed {
        println!(
            "  {} {} no longer exists, removed from state",
            "-".red(),
            address.bold()
        );
    }
    print_success(&format!(
        "Refresh complete. {} refreshed, {} removed.",
        summary.refreshed,
        summary.removed.len()
    ));
}

/// Print a list of resources from state.
pub fn print_resource_list(resources: &[ResourceState]) {
    if resources.is_empty() {
        println!("{}", "No resources in state.".dimmed());
        return;
    }

    println!();
    println!("{}", "Resources".bold().cyan());
    println!("{}", "─".repeat(80));
    println!(
        "  {:<40} {:<12} {}",
        "ADDRESS".bold(),
        "STATUS".bold(),
        "ID".bold()
    );
    println!("{}", "─".repeat(80));

    for resource in resources {
        println!(
            "  {:<40} {:<12} {}",
            resource.address,
            colored_status(&resource.status),
            resource.provider_id.as_deref().unwrap_or("-").dimmed()
        );
    }

    println!();
    println!("  {} resource(s) total.", resources.len());
    println!();
}

/// Print detailed resource state.
pub fn print_resource_detail(resource: &ResourceState) {
    println!();
    println!("{} {}", "Resource:".bold().cyan(), resource.address.bold());
    println!("{}", "─".repeat(60));
    println!("  {:<18} {}", "Type:".bold(), resource.resource_type);
    println!("  {:<18} {}", "Name:".bold(), resource.resource_name);
    println!(
        "  {:<18} {}",
        "ID:".bold(),
        resource.provider_id.as_deref().unwrap_or("-")
    );
    println!("  {:<18} {}", "Status:".bold(), colored_status(&resource.status));
    println!(
        "  {:<18} {}",
        "Schema Version:".bold(),
        resource.schema_version
    );
    println!("  {:<18} {}", "Created:".bold(), resource.created_at);
    println!("  {:<18} {}", "Updated:".bold(), resource.updated_at);

    if let Ok(attrs) = serde_json::from_str::<Value>(&resource.attributes_json) {
        if let Some(obj) = attrs.as_object().filter(|o| !o.is_empty()) {
            println!();
            println!("  {}:", "Attributes".bold());
            for (key, value) in obj {
                println!("    {:<28} = {}", key, format_value_short(value));
            }
        }
    }

    println!("{}", "─".repeat(60));
    println!();
}

fn colored_status(status: &str) -> String {
    match status {
        "created" => status.green().to_string(),
        "tainted" => status.yellow().to_string(),
        _ => status.to_string(),
    }
}

/// Format a JSON value for short inline display.
pub fn format_value_short(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(arr) => {
            if arr.is_empty() {
                "[]".to_string()
            } else if arr.len() <= 4 && arr.iter().all(|v| !v.is_array()) {
                let items: Vec<String> = arr.iter().map(format_value_short).collect();
                format!("[{}]", items.join(", "))
            } else {
                format!("[...{} items]", arr.len())
            }
        }
        Value::Object(obj) => {
            if obj.is_empty() {
                "{}".to_string()
            } else if obj.len() <= 6 {
                let items: Vec<String> = obj
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, format_value_short(v)))
                    .collect();
                format!("{{ {} }}", items.join(", "))
            } else {
                format!("{{...{} keys}}", obj.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::diff::AttributeChange;
    use crate::resource::launch_configuration::LaunchConfigurationConfig;
    use serde_json::json;

    fn change(action: ResourceAction) -> PlannedChange {
        let config = LaunchConfigurationConfig::from_attributes(&json!({
            "name": "web-lc",
            "image_id": "ami-1234",
            "instance_type": "t2.micro",
            "user_data": "#!/bin/sh"
        }))
        .unwrap();
        PlannedChange {
            address: "aws_launch_configuration.web".into(),
            resource_type: "aws_launch_configuration".into(),
            resource_name: "web".into(),
            action,
            config: Some(config),
            prior: None,
            changes: Vec::new(),
            requires_replace: Vec::new(),
            tainted: false,
        }
    }

    fn plan_of(changes: Vec<PlannedChange>) -> PlanSummary {
        let mut plan = PlanSummary::default();
        for c in changes {
            match c.action {
                ResourceAction::Create => plan.creates += 1,
                ResourceAction::Replace => plan.replaces += 1,
                ResourceAction::Delete => plan.deletes += 1,
                ResourceAction::NoOp => plan.no_ops += 1,
            }
            plan.changes.push(c);
        }
        plan
    }

    #[test]
    fn noop_plan_reports_up_to_date() {
        colored::control::set_override(false);
        let out = render_plan(&plan_of(vec![change(ResourceAction::NoOp)]));
        assert!(out.contains("No changes. Infrastructure is up-to-date."));
    }

    #[test]
    fn create_shows_user_data_digest_not_payload() {
        colored::control::set_override(false);
        let out = render_plan(&plan_of(vec![change(ResourceAction::Create)]));
        assert!(out.contains("aws_launch_configuration.web will be created"));
        assert!(out.contains("resource \"aws_launch_configuration\" \"web\""));
        assert!(!out.contains("#!/bin/sh"));
        assert!(out.contains("Plan: 1 to add."));
    }

    #[test]
    fn replace_marks_forcing_attributes() {
        colored::control::set_override(false);
        let mut c = change(ResourceAction::Replace);
        c.changes = vec![AttributeChange {
            name: "instance_type".into(),
            old: Some(json!("t2.micro")),
            new: Some(json!("m5.large")),
            forces_new: true,
        }];
        let out = render_plan(&plan_of(vec![c]));
        assert!(out.contains("must be replaced"));
        assert!(out.contains("instance_type = \"t2.micro\" -> \"m5.large\" # forces replacement"));
        assert!(out.contains("Plan: 1 to replace."));
    }

    #[test]
    fn short_values() {
        assert_eq!(format_value_short(&json!(["a", "b"])), "[\"a\", \"b\"]");
        assert_eq!(format_value_short(&json!([])), "[]");
        assert_eq!(format_value_short(&json!({ "x": 1 })), "{ x = 1 }");
        assert_eq!(format_value_short(&json!([1, 2, 3, 4, 5])), "[...5 items]");
    }
}
