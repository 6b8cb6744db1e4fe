//! panes core - shared domain types
//!
//! This crate provides the domain types shared between the orchestration
//! engine, the wire protocol, and the terminal front-end: session slots and
//! their lifecycle, attention flags, layout topology, and the output
//! signature heuristics.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod attention;
pub mod error;
pub mod layout;
pub mod notice;
pub mod session;
pub mod signature;
pub mod snapshot;

// Re-exports for convenience
pub use attention::{is_meaningful_input, AttentionFlags};
pub use error::{DomainError, DomainResult};
pub use layout::{
    compute_topology, Arrangement, LayoutMode, LayoutSnapshot, MoveDirection, Placement, Region,
    ResizeHandleSpec, SplitAxis, SplitHandle, SplitRatio, Topology,
};
pub use notice::{NoticeLevel, RemovalReason};
pub use session::{
    project_color_index, project_initials, project_name_of, LifecycleState, Session, SessionId,
    SessionMode, SessionView, MAX_SESSIONS, PROJECT_PALETTE_SIZE,
};
pub use signature::{SignatureScanner, ATTENTION_SIGNATURES, READY_SIGNATURES};
pub use snapshot::{EngineSnapshot, SessionAttention};
