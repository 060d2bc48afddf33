//! # Ingestion Logic
//!
//! This module imports engagement data exported by the textbook server into the
//! local store.

pub mod payload;

pub mod textbook;

pub use payload::{
    AttemptDetailRecord, AttemptRecord, EngagementPayload, PageRecord, QuestionRecord,
    SectionRecord, SlideReadRecord, SlideRecord, SlideSessionRecord, WritingRecord,
};
pub use textbook::{
    fetch_and_import, import_payload, ImportSummary, IngestError, SessionCredentials,
    TextbookClient, DEFAULT_DATA_API_URL, DEFAULT_TIMEOUT,
};
