// Split patch writer: fans one logical patch out into fixed-size sub-patches.
//
// Each sub-patch covers `new_chunk_size` bytes of new-file output (the last
// one may be shorter) and must be independently decodable, so its old-file
// cursor restarts at zero. Control entries that straddle a chunk boundary
// are split into fragments; stream bytes are routed by per-sub-patch debt
// counters rather than buffered.
//
// Sub-patches move through Unopened -> Open -> Closed in index order. Only
// the range [closed_patches, current_patch] is open at any time.

use log::{debug, trace};

use crate::control::ControlEntry;
use crate::writer::{PatchError, PatchWriter, StreamKind};

/// A [`PatchWriter`] that splits a patch across N child writers, each
/// responsible for a bounded span of new-file bytes.
///
/// The children are exclusively borrowed, never owned; the caller supplies
/// exactly `ceil(new_size / new_chunk_size)` of them (minimum one), which
/// `init` validates.
pub struct SplitPatchWriter<'a> {
    new_chunk_size: u64,
    patches: Vec<&'a mut dyn PatchWriter>,

    new_size: u64,
    initialized: bool,
    /// Sub-patch currently accepting control entries.
    current_patch: usize,
    /// Sub-patches already finalized, always <= current_patch.
    closed_patches: usize,
    /// Old-file cursor as seen by the next entry to be routed.
    old_pos: i64,
    /// New-file bytes routed so far.
    written_output: u64,
    /// Diff-stream bytes declared but not yet written, per sub-patch.
    diff_sizes: Vec<u64>,
    /// Extra-stream bytes declared but not yet written, per sub-patch.
    extra_sizes: Vec<u64>,
}

impl<'a> SplitPatchWriter<'a> {
    /// `new_chunk_size` is the new-file byte budget of every sub-patch but
    /// the last. Construction never fails; `init` reports a zero chunk size
    /// or a mis-sized `patches` list.
    pub fn new(new_chunk_size: u64, patches: Vec<&'a mut dyn PatchWriter>) -> Self {
        let count = patches.len();
        Self {
            new_chunk_size,
            patches,
            new_size: 0,
            initialized: false,
            current_patch: 0,
            closed_patches: 0,
            old_pos: 0,
            written_output: 0,
            diff_sizes: vec![0; count],
            extra_sizes: vec![0; count],
        }
    }

    /// Index of the sub-patch currently accepting control entries.
    pub fn current_patch(&self) -> usize {
        self.current_patch
    }

    /// Number of sub-patches already closed.
    pub fn closed_patches(&self) -> usize {
        self.closed_patches
    }

    /// New-file bytes routed so far.
    pub fn written_output(&self) -> u64 {
        self.written_output
    }

    /// Exclusive upper bound of sub-patch `index`'s new-file span.
    /// Wide arithmetic: the product can exceed u64 near the end of a
    /// maximal patch.
    fn chunk_limit(&self, index: usize) -> u128 {
        (index as u128 + 1) * u128::from(self.new_chunk_size)
    }

    /// Route one entry into the currently open sub-patch, updating the
    /// cursor, the output count and the debt counters. Trivial entries are
    /// dropped without touching anything.
    fn add_to_current(&mut self, entry: &ControlEntry) -> Result<(), PatchError> {
        if entry.is_trivial() {
            return Ok(());
        }
        if self.current_patch >= self.patches.len() {
            return Err(PatchError::SubPatchesExhausted {
                count: self.patches.len(),
            });
        }
        self.old_pos = self
            .old_pos
            .wrapping_add(entry.diff_size as i64)
            .wrapping_add(entry.offset_increment);
        self.written_output = self.written_output.saturating_add(entry.output_size());
        self.diff_sizes[self.current_patch] += entry.diff_size;
        self.extra_sizes[self.current_patch] += entry.extra_size;
        trace!(
            "sub-patch {}: entry diff={} extra={} offset={}",
            self.current_patch, entry.diff_size, entry.extra_size, entry.offset_increment
        );
        self.patches[self.current_patch].add_control_entry(entry)
    }

    /// Advance to the next sub-patch and open it.
    fn open_next_patch(&mut self) -> Result<(), PatchError> {
        self.current_patch += 1;
        if self.current_patch >= self.patches.len() {
            return Err(PatchError::SubPatchesExhausted {
                count: self.patches.len(),
            });
        }
        let offset = self.new_chunk_size * self.current_patch as u64;
        let size = (self.new_size - offset).min(self.new_chunk_size);
        debug!("opening sub-patch {} ({size} bytes)", self.current_patch);
        self.patches[self.current_patch].init(size)
    }

    /// Pay `data` into the outstanding debts of the open sub-patches, oldest
    /// first, then close every leading sub-patch whose debts both reached
    /// zero.
    fn write_to_stream(&mut self, stream: StreamKind, data: &[u8]) -> Result<(), PatchError> {
        let mut data = data;
        let end = self.patches.len().min(self.current_patch + 1);
        for i in self.closed_patches..end {
            if data.is_empty() {
                break;
            }
            let debt = match stream {
                StreamKind::Diff => self.diff_sizes[i],
                StreamKind::Extra => self.extra_sizes[i],
            };
            if debt == 0 {
                continue;
            }
            let take = usize::try_from(debt).unwrap_or(usize::MAX).min(data.len());
            let (chunk, rest) = data.split_at(take);
            match stream {
                StreamKind::Diff => {
                    self.patches[i].write_diff_stream(chunk)?;
                    self.diff_sizes[i] -= take as u64;
                }
                StreamKind::Extra => {
                    self.patches[i].write_extra_stream(chunk)?;
                    self.extra_sizes[i] -= take as u64;
                }
            }
            data = rest;
        }
        if !data.is_empty() {
            return Err(PatchError::UndeclaredStreamBytes {
                stream,
                excess: data.len(),
            });
        }

        // A sub-patch behind the cursor with both debts at zero is done;
        // close in index order.
        while self.closed_patches < self.current_patch.min(self.patches.len())
            && self.diff_sizes[self.closed_patches] == 0
            && self.extra_sizes[self.closed_patches] == 0
        {
            debug!("closing sub-patch {}", self.closed_patches);
            self.patches[self.closed_patches].close()?;
            self.closed_patches += 1;
        }
        Ok(())
    }

    fn check_accepting(&self) -> Result<(), PatchError> {
        if !self.initialized {
            return Err(PatchError::NotInitialized);
        }
        if self.closed_patches == self.patches.len() {
            return Err(PatchError::AlreadyClosed);
        }
        Ok(())
    }
}

impl PatchWriter for SplitPatchWriter<'_> {
    fn init(&mut self, new_size: u64) -> Result<(), PatchError> {
        if self.initialized {
            return Err(PatchError::AlreadyInitialized);
        }
        if self.new_chunk_size == 0 {
            return Err(PatchError::ZeroChunkSize);
        }
        // A zero-size patch still needs one (empty) sub-patch.
        let expected = usize::try_from(new_size.div_ceil(self.new_chunk_size))
            .unwrap_or(usize::MAX)
            .max(1);
        if expected != self.patches.len() {
            return Err(PatchError::SubPatchCountMismatch {
                expected,
                actual: self.patches.len(),
            });
        }
        self.new_size = new_size;
        self.initialized = true;
        let size = new_size.min(self.new_chunk_size);
        debug!("opening sub-patch 0 ({size} bytes)");
        self.patches[0].init(size)
    }

    fn add_control_entry(&mut self, entry: &ControlEntry) -> Result<(), PatchError> {
        self.check_accepting()?;
        let mut remaining = *entry;

        // Split off fragments while the remaining output would overflow the
        // current sub-patch's byte budget.
        while u128::from(self.written_output)
            + u128::from(remaining.diff_size)
            + u128::from(remaining.extra_size)
            >= self.chunk_limit(self.current_patch)
        {
            // written_output never passes the current limit, so the room
            // left fits in u64.
            let mut room =
                (self.chunk_limit(self.current_patch) - u128::from(self.written_output)) as u64;

            // Diff bytes go first, matching decode order within an entry.
            // A fragment never repositions the cursor; the real
            // offset_increment is applied once the whole entry is placed.
            let frag_diff = remaining.diff_size.min(room);
            room -= frag_diff;
            let frag_extra = remaining.extra_size.min(room);
            remaining.diff_size -= frag_diff;
            remaining.extra_size -= frag_extra;
            self.add_to_current(&ControlEntry::new(frag_diff, frag_extra, 0))?;

            if remaining.diff_size > 0 || remaining.extra_size > 0 {
                self.open_next_patch()?;
                // The new sub-patch decodes with its old-file cursor at
                // zero; the tail of this entry still expects it at
                // old_pos.
                if remaining.diff_size > 0 {
                    // The continued diff copy reads immediately: reposition
                    // up front with a seek-only entry. Routing drops it
                    // when the cursor is already at zero.
                    let seek = self.old_pos;
                    self.old_pos = 0;
                    self.add_to_current(&ControlEntry::new(0, 0, seek))?;
                } else {
                    // Extra-only tail: no old-file read happens until after
                    // it, so defer the seek into the entry's last fragment.
                    remaining.offset_increment =
                        remaining.offset_increment.wrapping_add(self.old_pos);
                    self.old_pos = 0;
                }
            } else {
                // Entry fully placed; only its cursor adjustment is left.
                self.old_pos = self.old_pos.wrapping_add(remaining.offset_increment);
                return Ok(());
            }
        }

        self.add_to_current(&remaining)
    }

    fn write_diff_stream(&mut self, data: &[u8]) -> Result<(), PatchError> {
        self.write_to_stream(StreamKind::Diff, data)
    }

    fn write_extra_stream(&mut self, data: &[u8]) -> Result<(), PatchError> {
        self.write_to_stream(StreamKind::Extra, data)
    }

    fn close(&mut self) -> Result<(), PatchError> {
        if !self.initialized {
            return Err(PatchError::NotInitialized);
        }
        if self.closed_patches == self.patches.len() {
            return Err(PatchError::AlreadyClosed);
        }
        for (i, (&diff, &extra)) in self.diff_sizes.iter().zip(&self.extra_sizes).enumerate() {
            if diff != 0 || extra != 0 {
                return Err(PatchError::OutstandingDebt {
                    patch_index: i,
                    diff,
                    extra,
                });
            }
        }
        if self.current_patch + 1 != self.patches.len() {
            return Err(PatchError::UnopenedSubPatches {
                opened: self.current_patch + 1,
                count: self.patches.len(),
            });
        }
        for i in self.closed_patches..self.patches.len() {
            debug!("closing sub-patch {i}");
            self.patches[i].close()?;
        }
        self.closed_patches = self.patches.len();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
