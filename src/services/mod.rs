pub mod artifact_store;
pub mod encoding_service;
pub mod pdf_extractor;

pub use artifact_store::{artifact_name_for, manifest_name_for, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use encoding_service::{EncodingService, SubmissionResult};
pub use pdf_extractor::{DocumentExtractor, DocumentInfo, ExtractedContent, LopdfExtractor};
