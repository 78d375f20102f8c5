//! **whence** - answers "whence came this line?" for AI-assisted codebases
//!
//! Attributes surviving lines of a git working tree to the recorded edits
//! that wrote them, cross-checked against per-line blame, and prunes edits
//! that were overwritten or deleted.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Store lifecycle commands (enable/disable)
pub mod lifecycle;

/// Query frontend: filtering, resolution, human/JSON output
pub mod query;

/// Attribution engine - the part that has to be right
pub mod core {
    /// Sorted-unique 1-based line sets with a compact textual form
    pub mod lineset;
    pub use self::lineset::{LineSet, LineSpecError};

    /// Immutable edit records, tools, hunks, and content hashing
    pub mod record;
    pub use self::record::{EditRecord, Hunk, Tool};

    /// Forward simulation of line positions through later hunks
    pub mod simulate;
    pub use self::simulate::{SimOutcome, simulate};

    /// Hash confirmation with bounded outward search
    pub mod verify;
    pub use self::verify::{MAX_SEARCH, VerifyOutcome, verify};

    /// Cross-checking simulator output against git blame
    pub mod reconcile;
    pub use self::reconcile::reconcile;

    /// Checkpoint replay for pending edits
    pub mod checkpoint;

    /// Top-level attribution policy
    pub mod resolve;
    pub use self::resolve::{FileRecord, LineAdjustment, MatchKind, Resolver};

    /// Error taxonomy and exit-code mapping
    pub mod errors;
    pub use self::errors::{WhenceError, exit_code_for};
}

/// Flat rebuildable query index over the record store
pub mod index;

/// Infrastructure - store, git facade, config, I/O
pub mod infra {
    /// Layered configuration with TOML files and env overrides
    pub mod config;
    pub use self::config::{Config, load_config};

    /// Read-only git facade: blame, show, HEAD, repo detection
    pub mod git;
    pub use self::git::{BlameEntry, BlameMap, RepoMeta};

    /// Smart file reading and line-addressed text access
    pub mod io;
    pub use self::io::{FileContent, FileText, read_file_smart};

    /// LF/CRLF-robust newline indexing
    pub mod line_index;
    pub use self::line_index::NewlineIndex;

    /// Append-only record store: manifests, pending records, blobs
    pub mod store;
    pub use self::store::{Manifest, PendingRecord, RecordStore};
}

// Strategic re-exports for clean CLI interface
pub use crate::cli::{AppContext, Cli, Commands};
pub use crate::core::{EditRecord, LineAdjustment, LineSet, Resolver, WhenceError};
pub use crate::index::{IndexRow, QueryIndex, RowFilter};
pub use crate::infra::{RecordStore, load_config};
