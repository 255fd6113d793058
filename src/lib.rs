pub mod aggregate;
pub mod attributes;
pub mod classifier;
pub mod config;
pub mod error;
pub mod geometry;
pub mod model;
pub mod parser;
pub mod scale;
pub mod schema;
pub mod style;
pub mod symbol;
pub mod task;
pub mod type_mapping;
pub mod writer;
pub mod zip_handler;

pub use config::{Config, IngestOptions, ZeroDiscriminantPolicy};
pub use error::{JvfError, Result};
pub use model::{Feature, FieldDescriptor, GeometryKind, GeometryRecord, GroupPath, LayerDescriptor};
pub use parser::{Catalogs, IngestOutcome, IngestStats, IngestStatus, StreamingIngestor};
pub use task::{finalize, CancellationToken, LayerSink, Parser, ParserTask, TaskResult};
pub use writer::{GeoJsonSink, DEFAULT_CRS};
pub use zip_handler::ZipHandler;
