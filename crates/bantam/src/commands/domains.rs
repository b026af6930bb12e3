use colored::Colorize;
use derive_more::{Display, Error, From};

use crate::{
    api::{ApiError, BantamApi, Domain},
    commands::Domains,
    config::{AuthRequired, Context},
    display,
};

/// Custom domain management page.
const DOMAINS_PAGE: &str = "https://bantam.host/domains";

/// `domains` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum DomainsError {
    /// No stored authentication token.
    Auth(AuthRequired),

    /// Unable to fetch domains.
    #[display(fmt = "Failed to fetch domains: {}", _0)]
    Api(ApiError),
}

/// `domains` flow entrypoint.
pub(crate) async fn domains(
    Domains { verbose }: Domains,
    context: &Context,
) -> Result<(), DomainsError> {
    context.require_auth()?;

    let domains = context.api().domains().await?;

    if domains.is_empty() {
        display::info("No custom domains found.");
        println!();
        println!("To add a custom domain:");
        println!("  1. Visit {DOMAINS_PAGE}");
        println!("  2. Add and verify your domain");
        println!("  3. Deploy with: bantam deploy --domain yourdomain.com");
        println!();
        println!("Pro tip: Enable wildcard support to deploy to any subdomain!");
        return Ok(());
    }

    let noun = if domains.len() == 1 { "domain" } else { "domains" };
    println!("{}", format!("\nFound {} {noun}:\n", domains.len()).cyan());

    if verbose {
        for (index, domain) in domains.iter().enumerate() {
            if index > 0 {
                println!("{}", "─".repeat(50).dimmed());
            }

            print_details(domain);
        }
    } else {
        let rows: Vec<_> = domains.iter().map(table_row).collect();
        println!(
            "{}",
            display::render_table(&["Domain", "Status", "Active", "Wildcard"], &rows)
        );
    }

    let (verified, pending) = count_by_verification(&domains);

    println!();
    display::success(format!(
        "{verified} verified domain{}",
        if verified == 1 { "" } else { "s" }
    ));

    if pending > 0 {
        display::warning(format!(
            "{pending} domain{} pending verification",
            if pending == 1 { "" } else { "s" }
        ));
    }

    println!();
    println!(
        "{}",
        "Deploy to a custom domain with: bantam deploy --domain yourdomain.com".dimmed()
    );

    if has_wildcard_domains(&domains) {
        println!(
            "{}",
            "Deploy to a subdomain with: bantam deploy --domain subdomain.yourdomain.com".dimmed()
        );
    }

    println!();
    println!("{}", format!("Manage domains at: {DOMAINS_PAGE}").dimmed());

    Ok(())
}

/// Count verified and pending domains.
fn count_by_verification(domains: &[Domain]) -> (usize, usize) {
    let verified = domains.iter().filter(|domain| domain.is_verified()).count();
    (verified, domains.len() - verified)
}

/// Check if any domain accepts deployments to arbitrary subdomains.
fn has_wildcard_domains(domains: &[Domain]) -> bool {
    domains
        .iter()
        .any(|domain| domain.wildcard_enabled && domain.is_wildcard_verified())
}

/// Table view row of a single domain.
fn table_row(domain: &Domain) -> Vec<String> {
    let status = if domain.is_verified() {
        "Verified".green()
    } else {
        "Pending".yellow()
    };

    let active = if domain.is_active() {
        "Yes".green()
    } else {
        "No".red()
    };

    let wildcard = if domain.wildcard_enabled {
        "Enabled".green()
    } else {
        "Disabled".dimmed()
    };

    vec![
        domain.domain.clone(),
        status.to_string(),
        active.to_string(),
        wildcard.to_string(),
    ]
}

/// Print the verbose view of a single domain.
fn print_details(domain: &Domain) {
    println!("{} {}", "Domain:".bold(), domain.domain);

    let status = if domain.is_verified() {
        "Verified ✓".green()
    } else {
        "Pending verification".yellow()
    };
    println!("{} {status}", "Status:".bold());

    let active = if domain.is_active() {
        "Yes".green()
    } else {
        "No".red()
    };
    println!("{} {active}", "Active:".bold());

    let wildcard = if domain.wildcard_enabled {
        "Enabled".green()
    } else {
        "Disabled".dimmed()
    };
    println!("{} {wildcard}", "Wildcard:".bold());

    if domain.wildcard_enabled && domain.wildcard_verification_status.is_some() {
        let wildcard_status = if domain.is_wildcard_verified() {
            "Verified ✓".green()
        } else {
            "Pending".yellow()
        };
        println!("{} {wildcard_status}", "Wildcard Status:".bold());
    }

    if !domain.is_verified() {
        println!();
        display::warning(format!(
            "This domain needs verification. Visit {DOMAINS_PAGE} to complete setup."
        ));
    }

    if domain.wildcard_enabled && !domain.is_wildcard_verified() {
        println!();
        display::warning(format!(
            "Wildcard subdomain needs verification. Visit {DOMAINS_PAGE} to complete setup."
        ));
    }

    println!(
        "{} {}",
        "Verification Method:".bold(),
        domain.verification_method.to_uppercase()
    );

    if let Some(created_at) = &domain.created_at {
        println!("{} {}", "Created:".bold(), display::format_date(created_at));
    }

    println!("{} {}", "ID:".bold(), domain.id.dimmed());
    println!();
}
