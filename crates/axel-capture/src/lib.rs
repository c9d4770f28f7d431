//! Capture of chat messages into local, optionally encrypted, markdown notes.
//!
//! The pipeline is synchronous: a trigger message is resolved to the message
//! worth keeping, bounded context is gathered from channel history, the
//! attachments are downloaded and the rendered document is written under
//! `<root>/<channel>/<message_id>.md`.

pub mod error;
pub mod gather;
pub mod markdown;
pub mod model;
pub mod pipeline;
pub mod platform;
pub mod resolver;
pub mod search;
pub mod store;

pub use error::{CaptureError, SoftFailure};
pub use gather::{CONTEXT_LIMIT, ContextWindow, gather_context, resolve_target};
pub use model::{
    AttachmentRef, Author, Capture, ChannelRef, ChatMessage, ContextEntry, MessageReference,
    SavedAttachment, ThreadParent,
};
pub use pipeline::{CaptureOutcome, capture_message};
pub use platform::{AttachmentDownloader, ChatHistory};
pub use resolver::{CaptureConfig, resolve_capture_dir};
pub use search::{SearchHit, Summary, extract_body, search, summarize};
pub use store::{CaptureStore, Decoded, decode_bytes};
