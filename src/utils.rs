use crate::{PilotError, Result};
use std::path::PathBuf;

/// Locates a Chrome or Chromium binary: well-known install locations first,
/// then `PATH`.
pub fn find_chrome_executable() -> Result<PathBuf> {
    install_locations()
        .into_iter()
        .find(|p| p.exists())
        .or_else(find_in_path)
        .ok_or_else(|| {
            PilotError::LaunchFailed(
                "Could not find Chrome/Chromium executable. Set CHROME_PATH or browser.chrome_path"
                    .into(),
            )
        })
}

#[cfg(target_os = "macos")]
fn install_locations() -> Vec<PathBuf> {
    [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(target_os = "linux")]
fn install_locations() -> Vec<PathBuf> {
    [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(target_os = "windows")]
fn install_locations() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = [
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files\Chromium\Application\chrome.exe",
        r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Ok(local_app_data) = std::env::var("LOCALAPPDATA") {
        paths.push(
            PathBuf::from(local_app_data)
                .join("Google")
                .join("Chrome")
                .join("Application")
                .join("chrome.exe"),
        );
    }

    paths
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn install_locations() -> Vec<PathBuf> {
    Vec::new()
}

fn find_in_path() -> Option<PathBuf> {
    let binaries: &[&str] = if cfg!(windows) {
        &["chrome.exe", "chromium.exe"]
    } else {
        &["google-chrome", "chromium", "chromium-browser", "chrome"]
    };

    binaries.iter().find_map(|binary| which::which(binary).ok())
}
