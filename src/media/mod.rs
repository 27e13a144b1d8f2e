//! Media catalog collaborators and the value types handlers exchange with
//! them.

pub mod cdn;
pub mod commands;
pub mod in_memory;
pub mod service;
pub mod types;

pub use cdn::{CdnService, PlayUrl, PrefixCdn};
pub use commands::{
    Asset, SegmentInfo, StreamInfo, TechnicalMetadata, UpdateVideoMetadataCommand,
    UpsertVideoCommand, Video,
};
pub use in_memory::InMemoryMediaCatalog;
pub use service::MediaCommandService;
pub use types::{StorageLocation, TranscodeFormat, VideoFormat, VideoStatus};
pub(crate) use types::base_name;
