use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use colored::Colorize;
use derive_more::{Display, Error, From};
use indicatif::ProgressBar;
use tracing::debug;

use crate::{
    api::{BantamApi, CreatedProject},
    archiver::{self, ArchiverError},
    commands::Deploy,
    config::Context,
    deploy::{
        poller::{DeploymentOutcome, StatusPoller},
        project_name,
        resolver::{self, ResolveError},
        upload::{self, ProgressObserver, Reservation, UploadError, UploadStage},
        DeployTarget, UploadArtifact, DEFAULT_SITE_DOMAIN,
    },
    display,
    prompt::Prompter,
};

/// `deploy` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum DeployError {
    /// Deployed path doesn't exist.
    #[display(fmt = "Path does not exist: {}", "path.display()")]
    PathNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// Permanent projects are only available to authenticated users.
    #[display(
        fmt = "Authentication required for permanent projects. Run \"bantam login\" first."
    )]
    PermanentRequiresAuth,

    /// Custom domains are only available to authenticated users.
    #[display(fmt = "Authentication required for custom domains. Run \"bantam login\" first.")]
    DomainRequiresAuth,

    /// Deployment destination resolution error.
    Resolve(ResolveError),

    /// Zip archiver error.
    #[display(fmt = "unable to create zip archive: {}", _0)]
    Archiver(ArchiverError),

    /// IO-related error.
    Io(io::Error),

    /// Upload process error.
    Upload(UploadError),

    /// Deployment pipeline reported a failure.
    #[display(fmt = "Deployment failed: {}", reason)]
    DeploymentFailed {
        /// Failure reason reported by the server.
        reason: String,
    },

    /// Deployment pipeline was cancelled on the server.
    #[display(fmt = "Deployment was cancelled")]
    DeploymentCancelled,
}

/// Result of the local pre-flight checks.
struct Preflight {
    /// Canonical path of the deployed file or directory.
    path: PathBuf,

    /// Whether the path is a directory.
    is_dir: bool,
}

/// Deploy flow entrypoint.
pub(crate) async fn deploy(
    args: Deploy,
    context: &Context,
    prompter: &dyn Prompter,
) -> Result<(), DeployError> {
    let preflight = preflight(&args, context.is_authenticated())?;

    publish(
        &context.api(),
        prompter,
        &args,
        preflight,
        StatusPoller::default(),
    )
    .await
}

/// Validate arguments before any file is archived or any request is sent.
fn preflight(args: &Deploy, authenticated: bool) -> Result<Preflight, DeployError> {
    if !args.path.exists() {
        return Err(DeployError::PathNotFound {
            path: args.path.clone(),
        });
    }

    resolver::check_flags(args.subdomain.as_deref(), args.domain.as_deref())?;

    if args.permanent && !authenticated {
        return Err(DeployError::PermanentRequiresAuth);
    }

    if args.domain.is_some() && !authenticated {
        return Err(DeployError::DomainRequiresAuth);
    }

    let path = fs::canonicalize(&args.path)?;
    let is_dir = path.is_dir();

    Ok(Preflight { path, is_dir })
}

/// Package, upload and monitor the deployment.
async fn publish<A: BantamApi + ?Sized>(
    api: &A,
    prompter: &dyn Prompter,
    args: &Deploy,
    Preflight { path, is_dir }: Preflight,
    poller: StatusPoller,
) -> Result<(), DeployError> {
    let Some(artifact) = prepare_artifact(&path, is_dir, args.yes, prompter)? else {
        display::info("Deployment cancelled.");
        return Ok(());
    };

    let name = project_name(&path, is_dir);

    let (created, target) = match deliver(api, prompter, args, &artifact, &name).await {
        Ok(Some(delivered)) => delivered,
        Ok(None) => return Ok(()),
        Err(error) => {
            if let Some(notice) = kept_archive_notice(&artifact) {
                display::info(notice);
            }

            return Err(error);
        }
    };

    let outcome = monitor(api, &created.project.id, poller).await;
    print_report(&created, target.permanent, &outcome);

    match outcome {
        DeploymentOutcome::Failed(reason) => Err(DeployError::DeploymentFailed { reason }),
        DeploymentOutcome::Cancelled => Err(DeployError::DeploymentCancelled),
        _ => Ok(()),
    }
}

/// Resolve the destination, confirm and upload the artifact.
///
/// Returns [`None`] if the user declined the deployment summary.
async fn deliver<A: BantamApi + ?Sized>(
    api: &A,
    prompter: &dyn Prompter,
    args: &Deploy,
    artifact: &UploadArtifact,
    name: &str,
) -> Result<Option<(CreatedProject, DeployTarget)>, DeployError> {
    let mut target = resolver::resolve_target(api, args.subdomain.as_deref(), args.domain.as_deref())
        .await?
        .with_lifetime(args.permanent, args.expiry_days);

    if let (Some(domain), Some(_)) = (&args.domain, &target.subdomain) {
        display::info(format!("Deploying to: {}", domain.bold()));
    }

    reserve_subdomain(api, &mut target).await?;

    if !args.yes {
        print_summary(artifact, name, args.domain.as_deref(), &target);

        if !prompter.confirm(&display::primary("Deploy to Bantam?").to_string(), true)? {
            artifact.discard();
            display::info("Deployment cancelled.");
            return Ok(None);
        }
    }

    let created = transfer(api, artifact, name, &target).await?;

    Ok(Some((created, target)))
}

/// Location of the archive left on disk after an aborted deployment.
fn kept_archive_notice(artifact: &UploadArtifact) -> Option<String> {
    if !artifact.synthesized || !artifact.path.exists() {
        return None;
    }

    Some(format!("Archive kept at: {}", artifact.path.display()))
}

/// Describe the deployed file, archiving directories first.
///
/// Returns [`None`] if the user declined to deploy a directory without an index file.
fn prepare_artifact(
    path: &Path,
    is_dir: bool,
    yes: bool,
    prompter: &dyn Prompter,
) -> Result<Option<UploadArtifact>, DeployError> {
    if !is_dir {
        return Ok(Some(UploadArtifact::from_file(path)?));
    }

    if archiver::find_index_file(path).is_none()
        && !yes
        && !prompter.confirm("No index.html found. Deploy anyway?", true)?
    {
        return Ok(None);
    }

    let size = archiver::directory_size(path)?;
    display::info(format!("Directory size: {}", display::format_bytes(size)));

    let progress = display::spinner("Creating archive...");

    match UploadArtifact::from_directory(path) {
        Ok(artifact) => {
            display::succeed(&progress, "Archive created");
            debug!(archive = %artifact.path.display(), size = artifact.size, "archive created");
            Ok(Some(artifact))
        }
        Err(error) => {
            display::fail(&progress, "Unable to create archive");
            Err(error.into())
        }
    }
}

/// Reserve the requested subdomain, reporting the outcome.
async fn reserve_subdomain<A: BantamApi + ?Sized>(
    api: &A,
    target: &mut DeployTarget,
) -> Result<(), UploadError> {
    if target.subdomain.is_none() {
        return Ok(());
    }

    let progress = display::spinner("Checking subdomain availability...");

    match upload::reserve_subdomain(api, target).await {
        Ok(Reservation::Generated { .. }) => {
            display::fail(&progress, "Subdomain not available");

            if let Some(subdomain) = &target.subdomain {
                display::info(format!("Generated subdomain: {}", subdomain.bold()));
            }
        }
        Ok(_) => display::succeed(&progress, "Subdomain available"),
        Err(error) => {
            display::fail(&progress, "Subdomain not available");
            return Err(error);
        }
    }

    Ok(())
}

/// Print the deployment summary shown before the confirmation.
fn print_summary(
    artifact: &UploadArtifact,
    name: &str,
    domain: Option<&str>,
    target: &DeployTarget,
) {
    println!("\n{}", "Deployment Summary:".cyan());
    println!("  File: {}", artifact.name.bold());
    println!("  Size: {}", display::format_bytes(artifact.size).bold());
    println!("  Project: {}", name.bold());

    match (domain, &target.subdomain) {
        (Some(domain), _) => println!("  URL: {}", format!("https://{domain}").bold()),
        (None, Some(subdomain)) => println!(
            "  URL: {}",
            format!("https://{subdomain}.{DEFAULT_SITE_DOMAIN}").bold()
        ),
        (None, None) => println!(
            "  URL: {} (generated after upload)",
            format!("[random].{DEFAULT_SITE_DOMAIN}").bold()
        ),
    }

    let kind = if target.permanent {
        "Permanent"
    } else {
        "Temporary"
    };
    println!("  Type: {}", kind.bold());

    if let (false, Some(days)) = (target.permanent, target.expiry_days) {
        println!("  Expires in: {}", format!("{days} days").bold());
    }

    println!();
}

/// Upload the artifact, switching spinners between stages.
async fn transfer<A: BantamApi + ?Sized>(
    api: &A,
    artifact: &UploadArtifact,
    name: &str,
    target: &DeployTarget,
) -> Result<CreatedProject, UploadError> {
    let bar = display::upload_bar(artifact.size);
    let observer: Arc<dyn ProgressObserver> = Arc::new(bar.clone());
    let mut current: Option<ProgressBar> = None;

    let result = upload::transfer(api, artifact, name, target, observer, |stage| {
        match stage {
            UploadStage::Presigning => {}
            UploadStage::Uploading => {
                if let Some(progress) = current.take() {
                    display::succeed(&progress, "Upload URL obtained");
                }
                println!();
                return;
            }
            UploadStage::Completing => {
                bar.finish();
            }
            UploadStage::CreatingProject => {
                if let Some(progress) = current.take() {
                    display::succeed(&progress, "Upload finalized");
                }
            }
        }

        current = Some(display::spinner(stage.message()));
    })
    .await;

    match (&result, current) {
        (Ok(_), Some(progress)) => display::succeed(&progress, "Project created successfully!"),
        (Err(_), Some(progress)) => progress.finish_and_clear(),
        (_, None) => {}
    }

    if result.is_err() && !bar.is_finished() {
        bar.abandon();
    }

    result
}

/// Poll the deployment status until the site is live or polling stops.
async fn monitor<A: BantamApi + ?Sized>(
    api: &A,
    project_id: &str,
    poller: StatusPoller,
) -> DeploymentOutcome {
    let progress = display::spinner("Processing deployment...");

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let outcome = poller
        .poll(api, project_id, interrupted, |phase| {
            progress.set_message(phase.message())
        })
        .await;

    match &outcome {
        DeploymentOutcome::Succeeded => display::succeed(&progress, "Deployment complete!"),
        DeploymentOutcome::Failed(_) | DeploymentOutcome::Cancelled => {
            progress.finish_and_clear()
        }
        DeploymentOutcome::TimedOut => display::warn(
            &progress,
            "Deployment monitoring timed out. Check your project status online.",
        ),
        DeploymentOutcome::MonitoringUnavailable => {
            display::warn(&progress, "Unable to monitor deployment status")
        }
        DeploymentOutcome::Interrupted => {
            display::warn(&progress, "Stopped monitoring deployment status")
        }
    }

    outcome
}

/// Print project details once the upload has finished.
fn print_report(created: &CreatedProject, permanent: bool, outcome: &DeploymentOutcome) {
    if outcome.is_failure() {
        return;
    }

    let project = &created.project;

    println!();
    println!("{}", display::primary("✓ Deployment complete! 🎉"));
    println!();
    println!("{}", "Project Details:".cyan());
    println!(
        "  URL: {}",
        display::primary(&format!("https://{}", project.url))
            .bold()
            .underline()
    );
    println!("  Project ID: {}", project.id.dimmed());

    if let Some(expires_at) = &project.expires_at {
        println!("  Expires: {}", display::format_date(expires_at).yellow());
    } else if permanent {
        println!("  Type: {}", "Permanent".green());
    }

    println!();

    if *outcome == DeploymentOutcome::Succeeded {
        display::info("Your site is now live!");
    } else {
        display::info("Your site will be live shortly. Check status with: bantam list");
    }
}
