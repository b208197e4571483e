//! Certify Core - Certificate Batch Generator
//!
//! # Flow
//! 1. CSV intake produces validated participants (and, for all-in-one
//!    files, the event and its signatories)
//! 2. Events live as folders in the event store
//! 3. The layout engine places every string and signature deterministically
//! 4. One PDF per participant, grouped into timestamped batches
//! 5. Every batch is mirrored into the backup store and verified

pub mod config;
pub mod dates;
pub mod error;
pub mod hashing;
pub mod importer;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod print;
pub mod render;
pub mod sanitize;
pub mod store;
pub mod templates;
pub mod validation;

pub use config::WorkspaceConfig;
pub use dates::{format_date_range, parse_date_ymd};
pub use error::{CertError, CertResult};
pub use importer::{import_participants, parse_all_in_one, BootstrapPayload};
pub use layout::CertificateLayout;
pub use model::{EventHandle, EventMetadata, MetadataUpdate, Participant, Signatory, SignatorySet};
pub use pipeline::{BatchGenerator, BatchRequest, BatchSummary, CertificationPipeline, EventDetails};
pub use print::{PrintAuthority, PrintSpec};
pub use render::{CertificateJob, CertificateRenderer, Renderer};
pub use sanitize::{sanitize, sanitize_file_name, sanitize_folder_name};
pub use store::{CollisionPolicy, EventStore, FsEventStore};
pub use templates::{TemplateImage, TemplateStore};
pub use validation::{ValidationError, ValidationViolation};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
