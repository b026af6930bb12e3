use std::io;

use colored::Colorize;
use derive_more::{Display, Error, From};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    api::{ApiError, BantamApi, Project},
    commands::Delete,
    config::{AuthRequired, Context},
    display,
    prompt::Prompter,
};

/// Textual UUID representation, any version.
static PROJECT_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("invalid regex string")
});

/// `delete` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum DeleteError {
    /// No stored authentication token.
    Auth(AuthRequired),

    /// Project identifier is not a UUID.
    #[display(fmt = "Invalid project ID format. Use \"bantam list --long\" to see project IDs.")]
    InvalidProjectId,

    /// Unable to fetch projects.
    #[display(fmt = "Failed to fetch projects: {}", _0)]
    #[from(ignore)]
    Fetch(ApiError),

    /// Project is not owned by the current user.
    #[display(fmt = "Project not found: {}", project_id)]
    NotFound {
        /// Requested project identifier.
        project_id: String,
    },

    /// Unable to read the confirmation.
    #[display(fmt = "unable to read confirmation: {}", _0)]
    Prompt(io::Error),

    /// Deletion request failed.
    #[display(fmt = "Failed to delete project: {}", _0)]
    #[from(ignore)]
    Delete(ApiError),

    /// Deletion was declined or the project name was mistyped.
    #[display(fmt = "Deletion cancelled")]
    Cancelled,
}

/// `delete` flow entrypoint.
pub(crate) async fn delete(
    Delete { project_id, yes }: Delete,
    context: &Context,
    prompter: &dyn Prompter,
) -> Result<(), DeleteError> {
    context.require_auth()?;

    if !remove_project(&context.api(), prompter, &project_id, yes).await? {
        return Err(DeleteError::Cancelled);
    }

    Ok(())
}

/// Check if the value is a textual UUID.
fn is_project_id(value: &str) -> bool {
    PROJECT_ID_REGEX.is_match(value)
}

/// Validate, confirm and soft-delete a project.
///
/// Returns `false` if the user cancelled the deletion.
async fn remove_project<A: BantamApi + ?Sized>(
    api: &A,
    prompter: &dyn Prompter,
    project_id: &str,
    yes: bool,
) -> Result<bool, DeleteError> {
    if !is_project_id(project_id) {
        return Err(DeleteError::InvalidProjectId);
    }

    let project = find_project(api, project_id).await?;

    println!("{}", "\nProject to delete:".cyan());
    println!("  Name: {}", project.name.bold());
    println!("  URL: {}", project.url.bold());

    if let Some(created_at) = &project.created_at {
        println!("  Created: {}", display::format_date(created_at));
    }

    if !yes {
        println!();
        display::warning("This action cannot be undone!");

        if !confirm_deletion(prompter, &project)? {
            return Ok(false);
        }
    }

    let progress = display::spinner("Deleting project...");

    if let Err(error) = api.delete_project(&project.id).await {
        display::fail(&progress, "Failed to delete project");
        return Err(DeleteError::Delete(error));
    }

    display::succeed(&progress, "Project deleted successfully");
    display::success(format!("Project \"{}\" has been deleted", project.name));

    Ok(true)
}

/// Find the project among projects of the current user.
async fn find_project<A: BantamApi + ?Sized>(
    api: &A,
    project_id: &str,
) -> Result<Project, DeleteError> {
    api.projects()
        .await
        .map_err(DeleteError::Fetch)?
        .into_iter()
        .find(|project| project.id == project_id)
        .ok_or_else(|| DeleteError::NotFound {
            project_id: project_id.to_owned(),
        })
}

/// Ask for a confirmation, then for the exact project name.
fn confirm_deletion(prompter: &dyn Prompter, project: &Project) -> io::Result<bool> {
    let message = format!("Are you sure you want to delete \"{}\"?", project.name);

    if !prompter.confirm(&message, false)? {
        return Ok(false);
    }

    let message = format!("Type the project name \"{}\" to confirm", project.name);
    let typed = prompter.input(&message)?;

    Ok(typed == project.name)
}
