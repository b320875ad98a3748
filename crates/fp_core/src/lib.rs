pub mod envelope;
pub mod error;
pub mod source;
pub mod storage;
pub mod sync;
pub mod types;
pub mod version;

pub use error::{Error, Result};
pub use source::ContentSource;
pub use storage::{ContentRepository, ListStorage};
pub use sync::{EditorSession, ListSync, SyncState};
pub use types::*;
pub use version::VersionGate;
