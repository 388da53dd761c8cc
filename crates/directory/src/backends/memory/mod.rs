//! In-memory backends.
//!
//! Always compiled. Used by the test suites and by embedders that keep the
//! directory in process, for example behind a single-node service.

mod document_store;
mod user_directory;

pub use document_store::MemoryDocumentStore;
pub use user_directory::MemoryUserDirectory;
