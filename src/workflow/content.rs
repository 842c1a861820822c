use super::{Action, Gate, Workflow};
use crate::config::{SiteConfig, TimingConfig};
use crate::driver::RemoteDriver;
use crate::proxy::{ElementProxy, WriteOptions};
use crate::{PilotError, Result};
use std::path::Path;

pub const MEDIA_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".mp4", ".mov"];

/// Checks that `path` exists and carries an allowed extension (case-insensitive).
pub fn validate_media(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PilotError::MediaNotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    if !MEDIA_EXTENSIONS.contains(&extension.as_str()) {
        return Err(PilotError::UnsupportedMedia { extension });
    }

    Ok(())
}

fn within(dialog: &str, candidates: &str) -> String {
    format!("{} {}", dialog, candidates)
}

/// The composer sequence from the "New post" icon to the closed dialog.
pub fn post_workflow(
    site: &SiteConfig,
    timing: &TimingConfig,
    media: &Path,
    caption: &str,
) -> Workflow {
    Workflow::new("post")
        .step("open-composer", Action::Click(site.new_post_button.clone()))
        .step("select-new-post", Action::Click(site.new_post_menu_entry.clone()))
        .step(
            "upload",
            Action::AttachFile {
                selector: site.file_input.clone(),
                path: media.to_path_buf(),
            },
        )
        .step(
            "await-crop",
            Action::AwaitPresent(Gate::new(
                &site.crop_dialog,
                timing.dialog_attempts,
                "Waiting for crop dialog",
                "crop dialog not found",
            )),
        )
        .step(
            "confirm-crop",
            Action::ClickLabeled {
                candidates: within(&site.crop_dialog, &site.dialog_button),
                label: site.next_label.clone(),
            },
        )
        .step(
            "await-edit",
            Action::AwaitPresent(Gate::new(
                &site.edit_dialog,
                timing.dialog_attempts,
                "Waiting for edit dialog",
                "edit dialog not found",
            )),
        )
        .step(
            "confirm-edit",
            Action::ClickLabeled {
                candidates: within(&site.edit_dialog, &site.dialog_button),
                label: site.next_label.clone(),
            },
        )
        .step(
            "await-compose",
            Action::AwaitPresent(Gate::new(
                &site.compose_dialog,
                timing.dialog_attempts,
                "Waiting for create new post dialog",
                "compose dialog not found",
            )),
        )
        .step(
            "write-caption",
            Action::Write {
                selector: site.caption_box.clone(),
                text: caption.to_string(),
                options: WriteOptions::default(),
            },
        )
        .step(
            "submit",
            Action::ClickLabeled {
                candidates: within(&site.compose_dialog, &site.dialog_button),
                label: site.share_label.clone(),
            },
        )
        .step(
            "await-completion",
            Action::AwaitAbsent(Gate::new(
                &site.any_dialog,
                timing.publish_attempts,
                "Waiting for confirmation",
                "publish not confirmed",
            )),
        )
}

/// Validates the media, then publishes it with `caption`.
pub async fn post_content<D: RemoteDriver>(
    proxy: &ElementProxy<D>,
    site: &SiteConfig,
    timing: &TimingConfig,
    media: &Path,
    caption: &str,
) -> Result<()> {
    validate_media(media)?;

    tracing::info!(
        media = %media.display(),
        caption_chars = caption.chars().count(),
        "Posting content"
    );
    post_workflow(site, timing, media, caption)
        .run(proxy, timing)
        .await
}
