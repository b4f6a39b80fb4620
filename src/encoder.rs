// Diff encoder: turns control entries plus whole-file buffers into a
// validated sequence of patch writer calls.
//
// The match search that produces the entries lives upstream; this module is
// concerned only with replayability. Every copy is bounds-checked against
// the old file, every produced byte is accounted against the new file, and
// the diff/extra payload for each accepted entry is derived from the buffers
// and forwarded to the writer.

use log::{debug, trace};

use crate::control::ControlEntry;
use crate::writer::{PatchError, PatchWriter};

/// Drives a [`PatchWriter`] from the old/new file buffers and the caller's
/// control entry sequence.
///
/// The encoder does not own the buffers. Entries are validated before any
/// call reaches the writer; an entry that fails validation changes no state.
pub struct DiffEncoder<'a, W: PatchWriter> {
    old: &'a [u8],
    new: &'a [u8],
    writer: &'a mut W,

    /// Old-file cursor as positioned by the entries accepted so far.
    old_pos: i64,
    /// New-file bytes produced by the entries accepted so far.
    written_output: u64,
    /// Scratch for the residual of one diff copy.
    diff_buf: Vec<u8>,
}

impl<'a, W: PatchWriter> DiffEncoder<'a, W> {
    pub fn new(old: &'a [u8], new: &'a [u8], writer: &'a mut W) -> Self {
        Self {
            old,
            new,
            writer,
            old_pos: 0,
            written_output: 0,
            diff_buf: Vec::new(),
        }
    }

    /// Declare the new-file size to the underlying writer.
    pub fn init(&mut self) -> Result<(), PatchError> {
        debug!(
            "diff encoder init: old {} bytes, new {} bytes",
            self.old.len(),
            self.new.len()
        );
        self.writer.init(self.new.len() as u64)
    }

    /// Validate one entry, forward it, and stream its diff/extra payload.
    pub fn add_control_entry(&mut self, entry: &ControlEntry) -> Result<(), PatchError> {
        let old_size = self.old.len() as u64;
        let new_size = self.new.len() as u64;

        // The cursor must be usable before this entry runs, and the diff
        // copy must stay inside the old file.
        if self.old_pos < 0 {
            return Err(PatchError::CopyOutOfBounds {
                old_pos: self.old_pos,
                diff_size: entry.diff_size,
                old_size,
            });
        }
        let copy_end = (self.old_pos as u64).checked_add(entry.diff_size);
        if entry.diff_size > 0 && copy_end.is_none_or(|end| end > old_size) {
            return Err(PatchError::CopyOutOfBounds {
                old_pos: self.old_pos,
                diff_size: entry.diff_size,
                old_size,
            });
        }

        // The entry's output must fit in the not-yet-covered new-file tail.
        let produced = entry
            .diff_size
            .checked_add(entry.extra_size)
            .and_then(|n| n.checked_add(self.written_output));
        if produced.is_none_or(|end| end > new_size) {
            return Err(PatchError::NewFileOverrun {
                written_output: self.written_output,
                entry_output: entry.diff_size.saturating_add(entry.extra_size),
                new_size,
            });
        }

        // diff_size fits in i64 here: it is bounded by the old file length.
        let next_old_pos = self
            .old_pos
            .checked_add(entry.diff_size as i64)
            .and_then(|p| p.checked_add(entry.offset_increment))
            .ok_or(PatchError::CopyOutOfBounds {
                old_pos: self.old_pos,
                diff_size: entry.diff_size,
                old_size,
            })?;

        self.writer.add_control_entry(entry)?;

        let w = self.written_output as usize;
        let p = self.old_pos as usize;
        let d = entry.diff_size as usize;
        if d > 0 {
            self.diff_buf.clear();
            self.diff_buf.extend(
                self.new[w..w + d]
                    .iter()
                    .zip(&self.old[p..p + d])
                    .map(|(&n, &o)| n.wrapping_sub(o)),
            );
            self.writer.write_diff_stream(&self.diff_buf)?;
        }
        let e = entry.extra_size as usize;
        if e > 0 {
            self.writer.write_extra_stream(&self.new[w + d..w + d + e])?;
        }

        trace!(
            "entry diff={} extra={} offset={}: old_pos {} -> {}",
            entry.diff_size, entry.extra_size, entry.offset_increment, self.old_pos, next_old_pos
        );
        self.old_pos = next_old_pos;
        self.written_output += entry.output_size();
        Ok(())
    }

    /// Finalize the patch. Fails unless the accepted entries covered the
    /// whole new file.
    pub fn close(&mut self) -> Result<(), PatchError> {
        let new_size = self.new.len() as u64;
        if self.written_output != new_size {
            return Err(PatchError::IncompletePatch {
                written_output: self.written_output,
                new_size,
            });
        }
        self.writer.close()
    }
}

/// Encode a whole patch in one call: `init`, every entry, `close`.
pub fn encode_patch<W: PatchWriter>(
    old: &[u8],
    new: &[u8],
    entries: &[ControlEntry],
    writer: &mut W,
) -> Result<(), PatchError> {
    let mut encoder = DiffEncoder::new(old, new, writer);
    encoder.init()?;
    for entry in entries {
        encoder.add_control_entry(entry)?;
    }
    encoder.close()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
