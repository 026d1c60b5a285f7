use async_trait::async_trait;
use reqwest::Url;

use crate::error::AppError;
use crate::notifier::UrlOpener;

/// Hands URLs to the platform's default browser.
pub struct SystemOpener;

#[async_trait]
impl UrlOpener for SystemOpener {
    async fn open(&self, url: &str) -> Result<(), AppError> {
        let url = checked_url(url)?;
        let (program, args) = opener_command(&url);

        let status = tokio::process::Command::new(program)
            .args(&args)
            .status()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to run {program}: {e}")))?;

        if !status.success() {
            return Err(AppError::Internal(format!("{program} exited with {status}")));
        }
        tracing::info!("Opened {url}");
        Ok(())
    }
}

/// Only web links are handed to the shell.
fn checked_url(raw: &str) -> Result<String, AppError> {
    let url = Url::parse(raw).map_err(|e| AppError::BadRequest(format!("Invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        scheme => Err(AppError::BadRequest(format!(
            "Refusing to open '{scheme}' URL"
        ))),
    }
}

fn opener_command(url: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "macos") {
        ("open", vec![url.to_string()])
    } else if cfg!(target_os = "windows") {
        (
            "cmd",
            vec!["/C".into(), "start".into(), String::new(), url.to_string()],
        )
    } else {
        ("xdg-open", vec![url.to_string()])
    }
}
