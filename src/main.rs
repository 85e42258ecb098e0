//! FaceSearch-RS: command-line runner
//!
//! Without arguments prints the account balance; with an image path runs one
//! search and prints the matches.

use anyhow::{Context, Result};
use async_trait::async_trait;
use facesearch_rs::{
    config,
    network::HttpClient,
    search::{resolve_image, AccountInfo, ProgressSink},
    store::{OwnerId, ReminderNotifier},
    FaceSearch, ResultStore, SearchRequest, Settings,
};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

/// Owner id used for searches started from the command line
const LOCAL_OWNER: OwnerId = 0;

struct ProgressPrinter;

#[async_trait]
impl ProgressSink for ProgressPrinter {
    async fn on_progress(&self, percent: u8) {
        println!("Searching... {}%", percent);
    }
}

struct LogNotifier;

#[async_trait]
impl ReminderNotifier for LogNotifier {
    async fn remind(&self, owner_id: OwnerId, search_id: &str) -> Result<()> {
        info!("Results of search {} for {} expire soon", search_id, owner_id);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("-h") | Some("--help") => {
            print_usage();
            return Ok(());
        }
        Some("-V") | Some("--version") => {
            println!("facesearch-rs {}", facesearch_rs::VERSION);
            return Ok(());
        }
        _ => {}
    }

    info!("Starting FaceSearch-RS v{}", facesearch_rs::VERSION);

    // Load configuration
    let settings = config::load()?;
    info!("Search service: {}", settings.service.base_url);

    let search = FaceSearch::from_settings(&settings)?;

    match args.first() {
        Some(path) => {
            run_search(&settings, &search, Path::new(path)).await?;
            match search.account_info().await {
                Ok(info) => {
                    warn_if_low(&settings, &info);
                }
                Err(e) => warn!("Balance check error: {}", e),
            }
        }
        None => {
            report_balance(&settings, &search).await?;
        }
    }

    Ok(())
}

/// Print the remaining credits, warning when they are low
async fn report_balance(settings: &Settings, search: &FaceSearch) -> Result<AccountInfo> {
    let info = search.account_info().await?;
    println!("Remaining credits: {}", info.remaining_credits);
    warn_if_low(settings, &info);
    Ok(info)
}

async fn run_search(settings: &Settings, search: &FaceSearch, path: &Path) -> Result<()> {
    let image = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo.jpg".to_string());
    let request = SearchRequest::new(image)
        .with_content_type(content_type_for(path))
        .with_file_name(file_name);

    let report = search.orchestrate(request, &ProgressPrinter).await?;

    let scanned = report
        .scanned_count
        .map(|n| n.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    println!("Search complete");
    println!("Faces scanned: {}", scanned);
    println!("Time: {:.1}s", report.elapsed_seconds);
    println!("Results: {}", report.displayed_count(settings.store.max_results));

    if report.is_empty() {
        println!("No matches found.");
        return Ok(());
    }

    // Keep the result for the lifetime of this run
    let store = ResultStore::new(&settings.store, Arc::new(LogNotifier));
    let sweeper = store.spawn_sweeper(settings.store.sweep_interval());
    let now = Instant::now();
    let search_id = report.store_key(&Uuid::new_v4().to_string());
    store.put_unlocked(search_id.clone(), LOCAL_OWNER, report, now).await;

    let client = HttpClient::with_settings(&settings.service)?;
    if let Some(view) = store.view(&search_id, now) {
        println!("Stored at {}", view.stored_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let images = join_all(view.matches.iter().map(|face| resolve_image(&client, face))).await;
        for (i, (face, image)) in view.matches.iter().zip(images).enumerate() {
            let image = match image {
                Some(bytes) => format!("image, {} bytes", bytes.len()),
                None => "text only".to_string(),
            };
            println!("#{} - Match: {}% ({})\n{}", i + 1, face.score, image, face.url);
        }
    }

    sweeper.abort();
    Ok(())
}

/// Warn when the service balance is at or below the configured threshold
fn warn_if_low(settings: &Settings, info: &AccountInfo) -> bool {
    let low = info.is_low(settings.alerts.balance_alert_threshold);
    if low {
        warn!("Low API balance: {} credits remaining", info.remaining_credits);
    }
    low
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
FaceSearch-RS v{}
Paced client for an asynchronous face-search API

USAGE:
    facesearch-rs [IMAGE]

    Without IMAGE, prints the remaining API credits.

OPTIONS:
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    FACESEARCH_SETTINGS_PATH  Path to settings.yml
    FACESEARCH_API_KEY        API key sent to the search service
    FACESEARCH_BASE_URL       Search service base URL
    FACESEARCH_DEMO           Run searches in demo mode (true/false)
    RUST_LOG                  Log filter (default: info)
"#,
        facesearch_rs::VERSION
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> Settings {
        let mut settings = Settings::default();
        settings.service.base_url = format!("{}/api", server.uri());
        settings.pacing.min_request_interval = 0.0;
        settings
    }

    #[tokio::test]
    async fn test_balance_is_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/info"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"remaining_credits": 12})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let settings = settings_for(&server);
        let search = FaceSearch::from_settings(&settings).unwrap();

        let info = report_balance(&settings, &search).await.unwrap();
        assert_eq!(info.remaining_credits, 12);
        server.verify().await;
    }

    #[test]
    fn test_low_balance_threshold() {
        let settings = Settings::default();
        assert!(warn_if_low(&settings, &AccountInfo { remaining_credits: 50 }));
        assert!(!warn_if_low(&settings, &AccountInfo { remaining_credits: 51 }));
    }
}
