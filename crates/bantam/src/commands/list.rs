use colored::{ColoredString, Colorize};
use derive_more::{Display, Error, From};
use time::OffsetDateTime;

use crate::{
    api::{ApiError, BantamApi, Project},
    commands::List,
    config::{AuthRequired, Context},
    deploy::poller::DeploymentPhase,
    display,
};

/// Number of project identifier characters shown in the table view.
const SHORT_ID_LENGTH: usize = 8;

/// `list` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ListError {
    /// No stored authentication token.
    Auth(AuthRequired),

    /// Unable to fetch projects.
    #[display(fmt = "Failed to fetch projects: {}", _0)]
    Api(ApiError),
}

/// `list` flow entrypoint.
pub(crate) async fn list(List { long, all }: List, context: &Context) -> Result<(), ListError> {
    context.require_auth()?;

    let projects = context.api().projects().await?;

    if projects.is_empty() {
        display::info("No projects found. Deploy your first project with \"bantam deploy\"");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    let visible = visible_projects(&projects, all, now);

    if visible.is_empty() {
        display::info("No active projects found. Use --all to see expired projects.");
        return Ok(());
    }

    println!(
        "{}",
        format!("\nFound {}:\n", plural(visible.len(), "project", "projects")).cyan()
    );

    if long {
        for (index, project) in visible.iter().enumerate() {
            if index > 0 {
                println!("{}", "─".repeat(50).dimmed());
            }

            print_details(project, now);
        }
    } else {
        let rows: Vec<_> = visible
            .iter()
            .map(|project| table_row(project, now))
            .collect();

        println!(
            "{}",
            display::render_table(&["Name", "URL", "Type", "Status", "Expires", "ID"], &rows)
        );
    }

    let (active, expired) = count_by_expiry(&visible, now);

    println!();

    if expired > 0 {
        display::warning(if expired == 1 {
            String::from("1 project has expired")
        } else {
            format!("{expired} projects have expired")
        });
    }

    display::info(format!(
        "{} active",
        plural(active, "project", "projects")
    ));

    println!();
    println!(
        "{}",
        "Tip: Use --long flag to see full project IDs for delete/manage commands".dimmed()
    );

    Ok(())
}

/// Format a counted noun (`1 project`, `2 projects`).
fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}

/// Check if the project expired before `now`.
fn is_expired(project: &Project, now: OffsetDateTime) -> bool {
    project
        .expires_at
        .as_deref()
        .is_some_and(|expires_at| display::is_expired(expires_at, now))
}

/// Projects to display, hiding expired ones unless `all` is set.
fn visible_projects(projects: &[Project], all: bool, now: OffsetDateTime) -> Vec<&Project> {
    projects
        .iter()
        .filter(|project| all || !is_expired(project, now))
        .collect()
}

/// Count active and expired projects.
fn count_by_expiry(projects: &[&Project], now: OffsetDateTime) -> (usize, usize) {
    let expired = projects
        .iter()
        .filter(|project| is_expired(project, now))
        .count();

    (projects.len() - expired, expired)
}

/// Human-readable summary of the deployment pipeline state.
fn deploy_summary(project: &Project) -> Option<ColoredString> {
    let raw = project.r2_status.as_deref()?;
    let phase = DeploymentPhase::from(raw);

    let summary = if phase.is_success() {
        "deployed".green()
    } else if phase.is_failure() {
        match &project.cdn_error {
            Some(reason) => format!("{}: {reason}", phase.as_str()).red(),
            None => phase.as_str().red(),
        }
    } else if matches!(
        phase,
        DeploymentPhase::Processing | DeploymentPhase::SyncingToCdn
    ) {
        "deploying...".blue()
    } else {
        raw.yellow()
    };

    Some(summary)
}

/// Table view row of a single project.
fn table_row(project: &Project, now: OffsetDateTime) -> Vec<String> {
    let expires = match &project.expires_at {
        Some(_) if is_expired(project, now) => "EXPIRED".red().to_string(),
        Some(expires_at) => display::format_date(expires_at),
        None => "Never".green().to_string(),
    };

    let short_id: String = project.id.chars().take(SHORT_ID_LENGTH).collect();

    vec![
        project.name.clone(),
        project.url.clone(),
        project.kind.clone().unwrap_or_default(),
        project.status.clone(),
        expires,
        format!("{short_id}...").dimmed().to_string(),
    ]
}

/// Print the long view of a single project.
fn print_details(project: &Project, now: OffsetDateTime) {
    println!("{} {}", "Name:".bold(), project.name);
    println!(
        "{} {}",
        "URL:".bold(),
        display::primary(&format!("https://{}", project.url)).underline()
    );
    println!(
        "{} {}",
        "Type:".bold(),
        project.kind.as_deref().unwrap_or("-")
    );

    let status = if project.status == "active" {
        project.status.green()
    } else {
        project.status.yellow()
    };
    println!("{} {status}", "Status:".bold());

    if let Some(summary) = deploy_summary(project) {
        println!("{} {summary}", "Deploy:".bold());
    }

    if let Some(created_at) = &project.created_at {
        println!("{} {}", "Created:".bold(), display::format_date(created_at));
    }

    match &project.expires_at {
        Some(expires_at) if is_expired(project, now) => println!(
            "{} {}",
            "Expires:".bold(),
            format!("{} (EXPIRED)", display::format_date(expires_at)).red()
        ),
        Some(expires_at) => println!(
            "{} {}",
            "Expires:".bold(),
            display::format_date(expires_at).yellow()
        ),
        None => println!("{} {}", "Expires:".bold(), "Never (Permanent)".green()),
    }

    if let Some(file_count) = project.file_count {
        println!("{} {file_count}", "Files:".bold());
    }

    if let Some(storage_size) = project.storage_size {
        println!("{} {}", "Size:".bold(), display::format_bytes(storage_size));
    }

    println!("{} {}", "ID:".bold(), project.id.dimmed());
    println!();
}
