pub mod chunk;
pub mod config;
pub mod convert;
pub mod error;
pub mod links;
pub mod migrate;
pub mod origin;
pub mod remote;
pub mod resource;
pub mod types;
pub mod wire;

pub mod state;

pub use config::{Limits, MigrationConfig, NotebookSelector};
pub use convert::{html_to_document, html_to_document_with_resources};
pub use error::{MigrateError, Result};
pub use links::{LinkReport, LinkResolver};
pub use migrate::{Migrator, PageOutcome, RunSummary};
pub use remote::{ContentFetch, Fetched, Sink};
pub use types::{Block, ConvertedDocument, RichText, RichTextSpan};
