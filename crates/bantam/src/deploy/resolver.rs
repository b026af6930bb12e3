use derive_more::{Display, Error};

use crate::{
    api::{ApiError, BantamApi, Domain},
    deploy::DeployTarget,
};

/// Deployment destination resolution errors.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum ResolveError {
    /// Both subdomain and custom domain flags were supplied.
    #[display(fmt = "Cannot use both -s (subdomain) and -d (domain) together")]
    ConflictingFlags,

    /// Unable to fetch the list of custom domains.
    #[display(fmt = "Failed to fetch domains: {}", _0)]
    Domains(ApiError),

    /// Custom domain is not owned by the current user.
    #[display(fmt = "Domain {} not found or not verified", domain)]
    DomainNotFound {
        /// Requested hostname.
        domain: String,
    },

    /// Subdomain deployment requested for a domain without wildcard support.
    #[display(fmt = "Domain {} does not have wildcard support enabled", domain)]
    WildcardNotEnabled {
        /// Matched custom domain.
        domain: String,
    },

    /// Subdomain deployment requested before the wildcard DNS record was verified.
    #[display(fmt = "Wildcard support for {} is not verified", domain)]
    WildcardNotVerified {
        /// Matched custom domain.
        domain: String,
    },
}

/// Reject mutually exclusive subdomain and domain flags.
pub(crate) fn check_flags(subdomain: Option<&str>, domain: Option<&str>) -> Result<(), ResolveError> {
    match (subdomain, domain) {
        (Some(_), Some(_)) => Err(ResolveError::ConflictingFlags),
        _ => Ok(()),
    }
}

/// Resolve user-supplied flags against the list of known custom domains.
///
/// A subdomain flag is passed through as is, its availability is checked
/// later by the upload process.
pub(crate) fn resolve(
    subdomain: Option<&str>,
    domain: Option<&str>,
    known_domains: &[Domain],
) -> Result<DeployTarget, ResolveError> {
    check_flags(subdomain, domain)?;

    let Some(hostname) = domain else {
        return Ok(DeployTarget {
            subdomain: subdomain.map(ToOwned::to_owned),
            ..Default::default()
        });
    };

    if let Some(apex) = known_domains.iter().find(|known| known.domain == hostname) {
        return Ok(DeployTarget {
            domain_id: Some(apex.id.clone()),
            ..Default::default()
        });
    }

    // Only multi-label hostnames are considered subdomains of a known domain.
    let wildcard_match = hostname
        .split_once('.')
        .filter(|(label, parent)| !label.is_empty() && parent.contains('.'))
        .and_then(|(label, parent)| {
            known_domains
                .iter()
                .find(|known| known.domain == parent)
                .map(|known| (label, known))
        });

    let Some((label, parent)) = wildcard_match else {
        return Err(ResolveError::DomainNotFound {
            domain: hostname.to_owned(),
        });
    };

    if !parent.wildcard_enabled {
        return Err(ResolveError::WildcardNotEnabled {
            domain: parent.domain.clone(),
        });
    }

    if !parent.is_wildcard_verified() {
        return Err(ResolveError::WildcardNotVerified {
            domain: parent.domain.clone(),
        });
    }

    Ok(DeployTarget {
        subdomain: Some(label.to_owned()),
        domain_id: Some(parent.id.clone()),
        ..Default::default()
    })
}

/// Resolve the deployment destination, fetching custom domains when needed.
///
/// Conflicting flags are rejected before any remote call is made.
pub(crate) async fn resolve_target<A: BantamApi + ?Sized>(
    api: &A,
    subdomain: Option<&str>,
    domain: Option<&str>,
) -> Result<DeployTarget, ResolveError> {
    check_flags(subdomain, domain)?;

    let known_domains = match domain {
        Some(_) => api.domains().await.map_err(ResolveError::Domains)?,
        None => Vec::new(),
    };

    resolve(subdomain, domain, &known_domains)
}
