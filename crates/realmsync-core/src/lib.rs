pub mod checkpoint;
pub mod digest;
pub mod error;
pub mod kind;
pub mod operation;
pub mod realm;

pub use checkpoint::Checkpoint;
pub use digest::digest;
pub use error::{CoreError, Result};
pub use kind::{KindDescriptor, KindRegistry, ListSemantics, REALM_KIND};
pub use operation::{Operation, OperationKind};
pub use realm::{LiveRealm, LiveResource, RealmConfig, ResourceConfig};
