//! Error taxonomy surfaced to the CLI, with exit-code mapping.
//!
//! Only the first four kinds are fatal; the rest degrade a single file or
//! are swallowed by an unconditional index rebuild.

use camino::Utf8PathBuf;

use crate::core::lineset::LineSpecError;

#[derive(Debug, thiserror::Error)]
pub enum WhenceError {
    /// Record store missing or corrupt.
    #[error("provenance store unreadable: {0}")]
    StoreUnavailable(String),

    /// No provenance store in this project.
    #[error("no provenance store in this repository; run `whn enable` to start recording")]
    NotInitialized,

    /// Not inside a VCS repository.
    #[error("not a git repository: {0}")]
    VcsUnavailable(String),

    /// Blame failed for one file (deleted, binary); the query continues.
    #[error("blame unavailable for {0}")]
    BlameUnavailable(Utf8PathBuf),

    /// Bad `-L` argument.
    #[error("invalid line spec `{spec}`: {detail}")]
    InvalidLineSpec { spec: String, detail: String },

    /// A recorded file no longer exists or cannot be read.
    #[error("file unreadable: {0}")]
    FileUnreadable(Utf8PathBuf),

    /// Index rows or meta failed to parse; cured by rebuilding.
    #[error("query index corrupt: {0}")]
    IndexCorrupt(String),
}

impl From<LineSpecError> for WhenceError {
    fn from(e: LineSpecError) -> Self {
        WhenceError::InvalidLineSpec {
            spec: e.spec,
            detail: e.detail,
        }
    }
}

/// Exit codes for hard errors. Successful queries always exit 0, even
/// when nothing matched.
/// 2=not initialized, 3=invalid input, 4=no repository, 5=store broken
pub fn exit_code_for(e: &WhenceError) -> i32 {
    match e {
        WhenceError::NotInitialized => 2,
        WhenceError::InvalidLineSpec { .. } => 3,
        WhenceError::VcsUnavailable(_) => 4,
        WhenceError::StoreUnavailable(_) => 5,
        // Non-fatal kinds; generic failure if one ever escapes.
        WhenceError::BlameUnavailable(_)
        | WhenceError::FileUnreadable(_)
        | WhenceError::IndexCorrupt(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds_map_to_distinct_codes() {
        assert_eq!(exit_code_for(&WhenceError::NotInitialized), 2);
        assert_eq!(
            exit_code_for(&WhenceError::InvalidLineSpec {
                spec: "x".into(),
                detail: "bad".into()
            }),
            3
        );
        assert_eq!(exit_code_for(&WhenceError::VcsUnavailable("/tmp".into())), 4);
        assert_eq!(
            exit_code_for(&WhenceError::StoreUnavailable("gone".into())),
            5
        );
    }

    #[test]
    fn line_spec_errors_convert() {
        let err: WhenceError = "9-2".parse::<crate::core::lineset::LineSet>().unwrap_err().into();
        assert!(matches!(err, WhenceError::InvalidLineSpec { .. }));
        assert_eq!(exit_code_for(&err), 3);
    }
}
