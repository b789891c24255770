pub mod checkpoint;
pub mod error;
pub mod http;
pub mod memory;
pub mod traits;

pub use checkpoint::{FileCheckpointStore, InMemoryCheckpointStore};
pub use error::{ClientError, Result};
pub use http::HttpResourceClient;
pub use memory::InMemoryResourceClient;
pub use traits::{CheckpointStore, ResourceClient};
