// The patch sink capability and the crate error type.
//
// Everything above the on-disk container format speaks `PatchWriter`: the
// diff encoder drives one, terminal format writers implement one, and
// `SplitPatchWriter` does both, fanning a single logical patch out into
// several sub-patches.

use thiserror::Error;

use crate::control::ControlEntry;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Which of the two payload streams an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Diff,
    Extra,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diff => write!(f, "diff"),
            Self::Extra => write!(f, "extra"),
        }
    }
}

/// Errors surfaced by patch writers and the diff encoder.
///
/// Every failure is detected at the narrowest call and returned immediately.
/// A writer that has returned an error is defined-but-unusable; callers must
/// treat the first failure as terminal for that patch.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("init called twice")]
    AlreadyInitialized,

    #[error("writer used before init")]
    NotInitialized,

    #[error("writer used after close")]
    AlreadyClosed,

    #[error("chunk size must be nonzero")]
    ZeroChunkSize,

    #[error("expected {expected} sub-patches for this new size, got {actual}")]
    SubPatchCountMismatch { expected: usize, actual: usize },

    #[error("copy of {diff_size} bytes at old-file offset {old_pos} is out of bounds (old size {old_size})")]
    CopyOutOfBounds {
        old_pos: i64,
        diff_size: u64,
        old_size: u64,
    },

    #[error("entry produces {entry_output} bytes at new-file offset {written_output}, past the declared size {new_size}")]
    NewFileOverrun {
        written_output: u64,
        entry_output: u64,
        new_size: u64,
    },

    #[error("{excess} {stream}-stream bytes have no declared control entry to receive them")]
    UndeclaredStreamBytes { stream: StreamKind, excess: usize },

    #[error("{stream} stream is {actual} bytes but control entries declared {declared}")]
    StreamSizeMismatch {
        stream: StreamKind,
        declared: u64,
        actual: u64,
    },

    #[error("sub-patch {patch_index} still owes {diff} diff and {extra} extra bytes")]
    OutstandingDebt {
        patch_index: usize,
        diff: u64,
        extra: u64,
    },

    #[error("control entry does not fit in the {count} supplied sub-patches")]
    SubPatchesExhausted { count: usize },

    #[error("only {opened} of {count} sub-patches were opened")]
    UnopenedSubPatches { opened: usize, count: usize },

    #[error("control entries cover {written_output} of {new_size} new-file bytes")]
    IncompletePatch { written_output: u64, new_size: u64 },
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Sink for one patch: a declared new-file size, an ordered sequence of
/// control entries, and the diff/extra payload streams.
///
/// Lifecycle: [`init`](Self::init) exactly once, then any interleaving of
/// [`add_control_entry`](Self::add_control_entry),
/// [`write_diff_stream`](Self::write_diff_stream) and
/// [`write_extra_stream`](Self::write_extra_stream), then
/// [`close`](Self::close) exactly once. Stream bytes may lag behind the
/// entries that declared them; the totals are reconciled at `close`.
pub trait PatchWriter {
    /// Declare the total new-file length this patch describes.
    fn init(&mut self, new_size: u64) -> Result<(), PatchError>;

    /// Append one control entry.
    fn add_control_entry(&mut self, entry: &ControlEntry) -> Result<(), PatchError>;

    /// Append raw bytes to the diff stream. No declared-size check is made
    /// at call time.
    fn write_diff_stream(&mut self, data: &[u8]) -> Result<(), PatchError>;

    /// Append raw bytes to the extra stream. No declared-size check is made
    /// at call time.
    fn write_extra_stream(&mut self, data: &[u8]) -> Result<(), PatchError>;

    /// Finalize the patch.
    fn close(&mut self) -> Result<(), PatchError>;
}
