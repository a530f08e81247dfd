//! Preflight Check System
//!
//! Verifies the data directories, the store and the completion endpoint settings before
//! the server starts accepting requests.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use url::Url;

use crate::config::AppConfig;
use crate::fs_manager::DataPaths;
use crate::storage;

const PROBE_KEY: &str = "preflight:probe";

/// Result of a single check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete preflight check report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub all_passed: bool,
    pub checks: Vec<CheckResult>,
    pub ready_to_start: bool,
    pub summary: String,
}

/// Runs every check and logs the outcome.
pub async fn run_preflight_checks(config: &AppConfig, paths: &DataPaths, pool: &SqlitePool) -> PreflightReport {
    info!("Running preflight checks");

    let checks = vec![
        check_directories(paths),
        check_database(pool).await,
        check_api_base(&config.api_base),
        check_api_key(config.api_key.as_deref()),
    ];

    let all_passed = checks.iter().all(|c| c.passed);
    let critical_passed = checks
        .iter()
        .filter(|c| is_critical_check(&c.name))
        .all(|c| c.passed);

    let summary = if all_passed {
        "All checks passed. System ready.".to_string()
    } else if critical_passed {
        "Some non-critical checks failed. System can start with warnings.".to_string()
    } else {
        "Critical checks failed. System cannot start.".to_string()
    };

    for check in &checks {
        if check.passed {
            info!("  ✅ {}: {}", check.name, check.message);
        } else {
            warn!("  ❌ {}: {}", check.name, check.message);
            if let Some(details) = &check.details {
                warn!("      Details: {}", details);
            }
        }
    }

    info!("Summary: {}", summary);

    PreflightReport {
        all_passed,
        checks,
        ready_to_start: critical_passed,
        summary,
    }
}

/// A missing API key is survivable: local OpenAI-compatible servers accept anonymous calls.
fn is_critical_check(name: &str) -> bool {
    matches!(name, "directories" | "database" | "api_base")
}

// --- Individual Checks ---

fn check_directories(paths: &DataPaths) -> CheckResult {
    match paths.init() {
        Ok(()) => CheckResult::pass(
            "directories",
            &format!("Data directories ready under {:?}", paths.root()),
        ),
        Err(e) => CheckResult::fail(
            "directories",
            "Failed to create data directories",
            Some(e.to_string()),
        ),
    }
}

/// Writes, reads back and removes a probe record.
async fn check_database(pool: &SqlitePool) -> CheckResult {
    let probe = chrono::Utc::now().timestamp();

    if let Err(e) = storage::set_item(pool, PROBE_KEY, &probe).await {
        return CheckResult::fail("database", "Cannot write to the store", Some(e.to_string()));
    }

    let result = match storage::get_item::<i64>(pool, PROBE_KEY).await {
        Ok(Some(value)) if value == probe => CheckResult::pass("database", "Store read/write OK"),
        Ok(other) => CheckResult::fail(
            "database",
            "Store returned unexpected data",
            Some(format!("Expected {}, got {:?}", probe, other)),
        ),
        Err(e) => CheckResult::fail("database", "Cannot read from the store", Some(e.to_string())),
    };

    if let Err(e) = storage::remove_item(pool, PROBE_KEY).await {
        warn!("Failed to remove preflight probe: {}", e);
    }

    result
}

fn check_api_base(api_base: &str) -> CheckResult {
    match Url::parse(api_base) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            CheckResult::pass("api_base", &format!("Completion endpoint: {}", api_base))
        }
        Ok(url) => CheckResult::fail(
            "api_base",
            "Unsupported URL scheme",
            Some(format!("Got '{}', expected http or https", url.scheme())),
        ),
        Err(e) => CheckResult::fail("api_base", "Invalid completion endpoint URL", Some(e.to_string())),
    }
}

fn check_api_key(api_key: Option<&str>) -> CheckResult {
    match api_key {
        Some(_) => CheckResult::pass("api_key", "API key configured"),
        None => CheckResult::fail(
            "api_key",
            "OPENAI_API_KEY is not set",
            Some("Requests will be sent without authorization".to_string()),
        ),
    }
}
