//! Output formatting - ASCII-only terminal output

use owo_colors::OwoColorize;
use tweak_common::{CategoryDefinition, RiskLevel, SystemInfo};
use tweak_engine::{BatchSummary, OperationOutcome, TweakWithStatus};

fn risk_tag(risk: RiskLevel) -> String {
    let text = format!("[{}]", risk.to_string().to_uppercase());
    match risk {
        RiskLevel::Low => text.dimmed().to_string(),
        RiskLevel::Medium => text.yellow().to_string(),
        RiskLevel::High | RiskLevel::Critical => text.bright_red().to_string(),
    }
}

fn state_tag(tweak: &TweakWithStatus) -> String {
    if tweak.status.error.is_some() {
        "[UNKNOWN]".red().to_string()
    } else if tweak.status.is_applied {
        "[APPLIED]".bright_green().to_string()
    } else {
        "[DEFAULT]".dimmed().to_string()
    }
}

/// One row of `tweakctl list`
pub fn tweak_line(tweak: &TweakWithStatus) -> String {
    let mut line = format!(
        "{} {:<24} {}",
        state_tag(tweak),
        tweak.id().bold(),
        tweak.current_label()
    );
    if let Some(pending) = tweak.pending_option {
        let label = tweak.definition.option_label(Some(pending));
        line.push_str(&format!("  -> {}", label.cyan()));
    }
    if tweak.needs_reboot {
        line.push_str(&format!("  {}", "[REBOOT]".yellow()));
    }
    if let Some(error) = &tweak.error {
        line.push_str(&format!("  {}", error.red()));
    }
    line
}

/// Full view for `tweakctl show`
pub fn tweak_detail(tweak: &TweakWithStatus) -> Vec<String> {
    let def = &tweak.definition;
    let mut lines = vec![
        format!("{} {}", def.name.bold(), risk_tag(def.risk_level)),
        format!("  id:        {}", def.id),
        format!("  category:  {}", def.category_id),
        format!("  state:     {} ({})", state_tag(tweak), tweak.current_label()),
        format!(
            "  backup:    {}",
            if tweak.status.has_backup { "yes" } else { "no" }
        ),
    ];
    if !def.description.is_empty() {
        lines.push(format!("  {}", def.description.dimmed()));
    }
    lines.push("  options:".to_string());
    for (index, option) in def.options.iter().enumerate() {
        let marker = if tweak.status.current_option_index == Some(index) {
            "*"
        } else if tweak.pending_option == Some(index) {
            ">"
        } else {
            " "
        };
        lines.push(format!("   {} {}: {}", marker, index, option.label));
    }
    if def.requires_reboot {
        lines.push(format!("  {}", "Changes take effect after a reboot".yellow()));
    }
    if let Some(error) = tweak.status.error.as_ref().or(tweak.error.as_ref()) {
        lines.push(format!("  {} {}", "[ERROR]".red(), error));
    }
    lines
}

pub fn category_line(category: &CategoryDefinition, tweak_count: usize) -> String {
    format!(
        "{:<16} {:<24} {} tweak(s)",
        category.id.bold(),
        category.name,
        tweak_count
    )
}

pub fn outcome_line(outcome: &OperationOutcome) -> String {
    let tag = if outcome.success {
        "[OK]".bright_green().to_string()
    } else {
        "[FAILED]".bright_red().to_string()
    };
    format!("{} {} {}: {}", tag, outcome.kind, outcome.tweak_id, outcome.message)
}

pub fn summary_lines(summary: &BatchSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.all_succeeded() {
        lines.push(format!("{} {}", "[OK]".bright_green(), summary.message()));
    } else {
        lines.push(format!("{} {}", "[PARTIAL]".yellow(), summary.message()));
    }
    for (id, message) in &summary.failed {
        lines.push(format!("  {} {}: {}", "x".red(), id, message));
    }
    lines
}

pub fn system_info_lines(info: &SystemInfo) -> Vec<String> {
    vec![
        format!("  host:    {}", info.hostname),
        match &info.build {
            Some(build) => format!("  os:      {} {} ({})", info.os_name, info.os_version, build),
            None => format!("  os:      {} {}", info.os_name, info.os_version),
        },
        format!(
            "  admin:   {}",
            if info.is_admin { "yes" } else { "no" }
        ),
    ]
}

pub fn reboot_notice(count: usize) -> String {
    format!(
        "{} {} tweak(s) need a reboot to take effect",
        "[NOTE]".yellow(),
        count
    )
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red(), message);
}
