pub mod cli;
pub mod convert;
pub mod date;
pub mod decode;
pub mod error;
pub mod media;
pub mod metadata;
pub mod naming;
pub mod phash;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod scan;

pub use cli::Cli;
pub use convert::{ConversionService, ConvertedCopy, HeifConverter};
pub use date::{DateResolver, ResolvedDate};
pub use decode::{DecodeService, DecodedFrame, MediaDecoder};
pub use error::{MediaSortError, Result};
pub use media::{FrameSource, MediaItem, MediaKind, Stage};
pub use metadata::{ExifToolProvider, MetadataMapping, MetadataProvider, exiftool_available};
pub use naming::{NameBuilder, PlaceError, place};
pub use phash::{PerceptualHash, average_hash};
pub use pipeline::{MediaPipeline, PipelineConfig, RunStats};
pub use registry::{Classification, DuplicateRegistry, RegistryEntry};
