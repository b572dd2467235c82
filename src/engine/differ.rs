//! Diff display

use colored::Colorize;
use declarative::{DiffSummary, ResourceDiff, ResourceKind, ResourceState, group_by_kind};

fn kind_title(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Package => "Packages",
        ResourceKind::Group => "Groups",
        ResourceKind::User => "Users",
        ResourceKind::Exec => "Commands",
        ResourceKind::Service => "Services",
    }
}

/// One-line description of the change a diff represents
pub fn describe(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Unknown, _) => match &diff.probe_error {
            Some(err) => format!("(unknown: {err}) will apply"),
            None => "(unknown) will apply".to_string(),
        },
        (ResourceState::Absent, ResourceState::Present { details: Some(d) }) => {
            format!("(absent) → {d}")
        }
        (ResourceState::Absent, _) => "(absent) → present".to_string(),
        (ResourceState::Modified { from, to }, _) => format!("{from} → {to}"),
        (current, desired) => format!("{current} → {desired}"),
    }
}

/// Display a list of diffs grouped by resource kind
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Provisioning Diff".bold()
    );
    println!("│");

    for (kind, kind_diffs) in group_by_kind(diffs) {
        println!("│ {}", kind_title(kind).bold());
        for diff in kind_diffs {
            let symbol = if diff.is_unknown() {
                "?".yellow()
            } else if diff.is_addition() {
                "+".green()
            } else {
                "~".yellow()
            };
            println!(
                "│   {} {:<32} {}",
                symbol,
                diff.key.to_string(),
                describe(diff).dimmed()
            );
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to create, {} to modify, {} unknown)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.unknown.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::ResourceKey;

    fn diff(current: ResourceState, desired: ResourceState) -> ResourceDiff {
        ResourceDiff {
            key: ResourceKey::exec("untar openresty"),
            description: String::new(),
            current,
            desired,
            probe_error: None,
        }
    }

    #[test]
    fn test_describe_addition_shows_guard() {
        let d = diff(
            ResourceState::Absent,
            ResourceState::Present {
                details: Some("/tmp/ngx_openresty-1.7.0.1/configure".into()),
            },
        );
        assert_eq!(describe(&d), "(absent) → /tmp/ngx_openresty-1.7.0.1/configure");
    }

    #[test]
    fn test_describe_modification_and_unknown() {
        let d = diff(
            ResourceState::Modified {
                from: "stopped, disabled".into(),
                to: "running, enabled".into(),
            },
            ResourceState::Present { details: None },
        );
        assert_eq!(describe(&d), "stopped, disabled → running, enabled");

        let mut d = diff(ResourceState::Unknown, ResourceState::Present { details: None });
        d.probe_error = Some("rpm: command not found".into());
        assert_eq!(describe(&d), "(unknown: rpm: command not found) will apply");
    }
}
