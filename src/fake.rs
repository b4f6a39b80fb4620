// Recording patch writer.
//
// Terminal sink that accumulates everything it is handed and enforces the
// `PatchWriter` lifecycle. Tests and benches use it as the golden reference:
// the concatenated streams and entry lists recorded here define what any
// other writer arrangement must reproduce.

use crate::control::ControlEntry;
use crate::writer::{PatchError, PatchWriter, StreamKind};

/// In-memory `PatchWriter` that records entries and both streams.
///
/// `close` reconciles the recorded stream lengths against the sizes declared
/// by the recorded control entries and fails on any mismatch.
#[derive(Debug, Default)]
pub struct FakePatchWriter {
    new_size: Option<u64>,
    entries: Vec<ControlEntry>,
    diff_stream: Vec<u8>,
    extra_stream: Vec<u8>,
    closed: bool,
}

impl FakePatchWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The size declared at `init`, if `init` has run.
    pub fn new_size(&self) -> Option<u64> {
        self.new_size
    }

    pub fn entries(&self) -> &[ControlEntry] {
        &self.entries
    }

    pub fn diff_stream(&self) -> &[u8] {
        &self.diff_stream
    }

    pub fn extra_stream(&self) -> &[u8] {
        &self.extra_stream
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> Result<(), PatchError> {
        if self.new_size.is_none() {
            return Err(PatchError::NotInitialized);
        }
        if self.closed {
            return Err(PatchError::AlreadyClosed);
        }
        Ok(())
    }
}

impl PatchWriter for FakePatchWriter {
    fn init(&mut self, new_size: u64) -> Result<(), PatchError> {
        if self.new_size.is_some() {
            return Err(PatchError::AlreadyInitialized);
        }
        self.new_size = Some(new_size);
        Ok(())
    }

    fn add_control_entry(&mut self, entry: &ControlEntry) -> Result<(), PatchError> {
        self.check_open()?;
        self.entries.push(*entry);
        Ok(())
    }

    fn write_diff_stream(&mut self, data: &[u8]) -> Result<(), PatchError> {
        self.check_open()?;
        self.diff_stream.extend_from_slice(data);
        Ok(())
    }

    fn write_extra_stream(&mut self, data: &[u8]) -> Result<(), PatchError> {
        self.check_open()?;
        self.extra_stream.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> Result<(), PatchError> {
        self.check_open()?;

        let declared_diff: u64 = self.entries.iter().map(|e| e.diff_size).sum();
        if declared_diff != self.diff_stream.len() as u64 {
            return Err(PatchError::StreamSizeMismatch {
                stream: StreamKind::Diff,
                declared: declared_diff,
                actual: self.diff_stream.len() as u64,
            });
        }
        let declared_extra: u64 = self.entries.iter().map(|e| e.extra_size).sum();
        if declared_extra != self.extra_stream.len() as u64 {
            return Err(PatchError::StreamSizeMismatch {
                stream: StreamKind::Extra,
                declared: declared_extra,
                actual: self.extra_stream.len() as u64,
            });
        }

        self.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
