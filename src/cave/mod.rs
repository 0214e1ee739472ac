//! Cave export tooling
//!
//! Keeps the attachment filenames of a cave export document in step with
//! the media directory: extension repair, canonical renaming, and legacy
//! schema conversion.

pub mod convert;
pub mod detect;
pub mod index;
pub mod mapping;
pub mod naming;
pub mod reindex;
pub mod run;
pub mod schema;
pub mod storage;

pub use detect::{ContentDetector, MagicDetector};
pub use mapping::{ChannelMapping, ChannelResolver, PromptResolver, ResolveError, StrictResolver};
pub use reindex::{ExtensionSource, Mode, Outcome, ReconcileReport, Reindexer};
pub use schema::{Attachment, AttachmentKind, Record};
pub use storage::MediaDir;
