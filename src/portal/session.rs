// src/portal/session.rs
// =============================================================================
// Logging in and reading the course dashboard.
//
// A run without a session cannot crawl anything, so a login that doesn't
// land on the dashboard is the one error that stops the whole program.
// =============================================================================

use super::parse;
use crate::config::{Credentials, PortalConfig};
use crate::crawl::Subject;
use crate::http::{HttpClient, Response};
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Posts the login form and returns the dashboard page.
pub async fn login(
    client: &dyn HttpClient,
    portal: &PortalConfig,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<Response> {
    let login_url = portal.url(&portal.login_path);
    let form = [
        ("anchor", ""),
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
    ];

    client
        .post(&login_url, &form)
        .await
        .with_context(|| format!("posting login form to {login_url}"))?;

    let dashboard_url = portal.url(&portal.dashboard_path);
    let dashboard = client
        .get(&dashboard_url, Some(timeout))
        .await
        .with_context(|| format!("loading dashboard {dashboard_url}"))?;

    debug!(status = dashboard.status, "dashboard response");

    let logged_in = dashboard.text().contains(&portal.login_marker);
    debug!(logged_in, "checked login marker");
    if !logged_in {
        bail!(
            "login not correct for user {:?}: dashboard does not contain {:?}",
            credentials.username,
            portal.login_marker
        );
    }

    info!(user = %credentials.username, "logged in");
    Ok(dashboard)
}

/// Subjects listed on the dashboard, sorted by name, minus the skipped ones.
pub fn find_subjects(dashboard: &Response, portal: &PortalConfig) -> Vec<Subject> {
    let courses = parse::course_listing(&dashboard.text(), &dashboard.url);
    debug!(found = courses.len(), "found potential subjects");

    let mut subjects: Vec<Subject> = courses
        .into_iter()
        .filter(|course| {
            let lower = course.name.to_lowercase();
            let skip = portal
                .skip_subjects_containing
                .iter()
                .any(|word| lower.contains(&word.to_lowercase()));
            if skip {
                debug!(subject = %course.name, "skipping subject");
            }
            !skip
        })
        .map(|course| Subject::new(course.name, course.url))
        .collect();

    subjects.sort_by(|a, b| a.name.cmp(&b.name));
    subjects
}
