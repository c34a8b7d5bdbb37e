pub mod domain;
pub mod ports;
pub mod research;

pub use domain::{
    ledger_key, Citation, CitationKind, Completion, DataFreshness, FreshnessStatus, NewFile,
    NewReport, Report, UploadedFile, UsageDelta, UsageRecord, DEFAULT_CREDITS_AVAILABLE,
    DEFAULT_USER_ID,
};
pub use ports::{PortError, PortResult, ReportGenerationService, ResearchStore, UsageLedger};
