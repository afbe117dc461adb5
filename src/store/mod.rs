//! Read-only access to the document store.
//!
//! The aggregator only ever talks to [`DocumentStore`]. [`MongoStore`] is the
//! production backend; [`MemoryStore`] evaluates the same queries in-process
//! for tests.

mod filter;
pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::error::Result;
use async_trait::async_trait;
use mongodb::bson::Document;
use std::fmt;

/// Collections the exporter reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Messages,
    Banners,
    Files,
    Agents,
    Users,
    Sessions,
    PromptGroups,
    Prompts,
    ToolCalls,
    Conversations,
    Transactions,
    Actions,
}

impl Collection {
    /// Collection name as created by the application's schema layer.
    pub fn name(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Banners => "banners",
            Self::Files => "files",
            Self::Agents => "agents",
            Self::Users => "users",
            Self::Sessions => "sessions",
            Self::PromptGroups => "promptgroups",
            Self::Prompts => "prompts",
            Self::ToolCalls => "toolcalls",
            Self::Conversations => "conversations",
            Self::Transactions => "transactions",
            Self::Actions => "actions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Query surface consumed by the aggregator.
///
/// Pipelines and filters use MongoDB query syntax expressed as BSON documents.
/// Implementations must be read-only and should bound each call in time; a
/// call that cannot complete returns an error rather than hanging the cycle.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run an aggregation pipeline and collect every output row.
    async fn aggregate(&self, collection: Collection, pipeline: Vec<Document>)
    -> Result<Vec<Document>>;

    /// Count documents matching `filter`.
    async fn count_documents(&self, collection: Collection, filter: Document) -> Result<u64>;

    /// Fetch every document matching `filter`.
    async fn find(&self, collection: Collection, filter: Document) -> Result<Vec<Document>>;
}
