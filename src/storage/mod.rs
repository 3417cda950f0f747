pub mod dual;
pub mod elastic;
pub mod error;
pub mod memory;
pub mod mongo;
pub mod traits;

// Re-export commonly used types
pub use dual::{Acknowledged, DualSinkWriter};
pub use elastic::ElasticsearchSink;
pub use error::{SinkError, WriteError};
pub use memory::InMemorySink;
pub use mongo::MongoSink;
pub use traits::{BulkSink, QueryTarget};
