pub mod db;
pub mod memory;
pub mod report_llm;

pub use db::DbAdapter;
pub use memory::MemoryStore;
pub use report_llm::OpenAiReportAdapter;
