#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::{ControlEntry, FakePatchWriter, PatchWriter, SplitPatchWriter};

// Drive a SplitPatchWriter with an arbitrary interleaving of control
// entries and stream writes. Any failure must surface as an error, never a
// panic, and the open/closed counters must stay ordered throughout.

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let chunk = u64::from(data[0] % 63) + 1;
    let script = &data[1..];

    // First pass: the output the entry ops will declare, so the sub-patch
    // list can be sized the way a real caller sizes it.
    let mut new_size: u64 = 0;
    for op in script.chunks_exact(4) {
        if op[0] % 4 == 0 {
            new_size += u64::from(op[1] % 32) + u64::from(op[2] % 32);
        }
    }
    let count = usize::try_from(new_size.div_ceil(chunk).max(1)).unwrap();
    if count > 1024 {
        return;
    }

    let mut fakes: Vec<FakePatchWriter> = (0..count).map(|_| FakePatchWriter::new()).collect();
    let children: Vec<&mut dyn PatchWriter> =
        fakes.iter_mut().map(|f| f as &mut dyn PatchWriter).collect();
    let mut split = SplitPatchWriter::new(chunk, children);
    if split.init(new_size).is_err() {
        return;
    }

    let payload = [0x5Au8; 64];
    let mut failed = false;
    for op in script.chunks_exact(4) {
        let result = match op[0] % 4 {
            0 => split.add_control_entry(&ControlEntry::new(
                u64::from(op[1] % 32),
                u64::from(op[2] % 32),
                i64::from(op[3] as i8),
            )),
            1 => split.write_diff_stream(&payload[..usize::from(op[1] % 64)]),
            2 => split.write_extra_stream(&payload[..usize::from(op[1] % 64)]),
            _ => split.add_control_entry(&ControlEntry::new(0, 0, i64::from(op[3] as i8))),
        };

        assert!(split.closed_patches() <= split.current_patch());
        assert!(split.current_patch() <= count);

        if result.is_err() {
            // First failure is terminal for the patch.
            failed = true;
            break;
        }
    }

    if !failed {
        // Entries were all declared and in budget; close succeeds exactly
        // when every declared byte arrived.
        let _ = split.close();
    }
});
