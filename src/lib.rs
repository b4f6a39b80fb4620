//! Oxipatch: the payload engine for bsdiff-style binary patches.
//!
//! The crate provides:
//! - The control-entry patch model (`control`)
//! - The patch sink capability and error type (`writer`)
//! - A validating encoder from old/new buffers to any sink (`encoder`)
//! - A writer that splits one patch into bounded sub-patches (`split`)
//! - A recording sink used as golden reference in tests (`fake`)
//!
//! The match search that decides where diff copies and extra inserts go is
//! an upstream concern, as is the on-disk patch container; this crate turns
//! its output into validated, correctly chunked patch writer calls.
//!
//! # Quick Start
//!
//! ```
//! use oxipatch::{ControlEntry, FakePatchWriter, PatchWriter, SplitPatchWriter, encode_patch};
//!
//! let old = b"hello old world";
//! let new = b"hello new world";
//!
//! // Two sub-patches of up to 8 new-file bytes each.
//! let mut subs = [FakePatchWriter::new(), FakePatchWriter::new()];
//! let children: Vec<&mut dyn PatchWriter> =
//!     subs.iter_mut().map(|s| s as &mut dyn PatchWriter).collect();
//! let mut split = SplitPatchWriter::new(8, children);
//!
//! // Entry sequence as an upstream match search would produce it.
//! encode_patch(old, new, &[ControlEntry::new(15, 0, 0)], &mut split).unwrap();
//!
//! assert!(subs.iter().all(FakePatchWriter::is_closed));
//! assert_eq!(subs[0].diff_stream().len(), 8);
//! assert_eq!(subs[1].diff_stream().len(), 7);
//! ```

pub mod control;
pub mod encoder;
pub mod fake;
pub mod split;
pub mod writer;

// Re-export key types for convenience.
pub use control::ControlEntry;
pub use encoder::{DiffEncoder, encode_patch};
pub use fake::FakePatchWriter;
pub use split::SplitPatchWriter;
pub use writer::{PatchError, PatchWriter, StreamKind};
