use std::path::PathBuf;

use axel_common::RepoList;
use tracing::info;

use crate::error::{CaptureError, SoftFailure};
use crate::gather::{gather_context, resolve_target};
use crate::model::{Capture, ChatMessage};
use crate::platform::{AttachmentDownloader, ChatHistory};
use crate::store::CaptureStore;

#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub path: PathBuf,
    pub message_id: String,
    pub context_len: usize,
    pub attachments_saved: usize,
    pub soft_failures: Vec<SoftFailure>,
}

/// Captures the message a mention points at.
///
/// Only storage failures are returned as errors; history, reply lookup and
/// attachment problems are collected in `soft_failures`.
pub fn capture_message<P>(
    store: &CaptureStore,
    platform: &P,
    repos: &RepoList,
    trigger: &ChatMessage,
) -> Result<CaptureOutcome, CaptureError>
where
    P: ChatHistory + AttachmentDownloader + ?Sized,
{
    let mut soft_failures = Vec::new();

    let (target, lookup_failure) = resolve_target(platform, trigger);
    soft_failures.extend(lookup_failure);

    let window = gather_context(platform, trigger, &target);
    soft_failures.extend(window.soft_failures);

    let (attachments, attachment_failures) = store.save_attachments(platform, &target);
    soft_failures.extend(attachment_failures);
    let attachments_saved = attachments.len();

    let capture = Capture::build(&target, &window.messages, attachments, repos);
    let path = store.save(&capture)?;

    info!(
        message_id = %target.id,
        context = window.messages.len(),
        attachments = attachments_saved,
        soft_failures = soft_failures.len(),
        "message captured"
    );
    Ok(CaptureOutcome {
        path,
        message_id: target.id,
        context_len: window.messages.len(),
        attachments_saved,
        soft_failures,
    })
}
