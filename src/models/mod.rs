//! Core data types.

mod chunk;
mod doc;
mod session;
mod tool;

pub use chunk::{Chunk, ChunkHit, IndexedFileRecord, MatchKind};
pub use doc::{CuratedDoc, DocHit};
pub use session::{RetrievalMode, SearchOutput, Session, SessionHit};
pub use tool::{Recommendation, ToolKind, ToolRecord};
