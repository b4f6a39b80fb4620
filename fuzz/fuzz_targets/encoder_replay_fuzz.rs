#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::{ControlEntry, FakePatchWriter, encode_patch};

// Feed the encoder arbitrary buffers and entry scripts. Invalid scripts
// must be rejected with an error; accepted patches must replay to the new
// file byte-for-byte.

fn apply(old: &[u8], patch: &FakePatchWriter) -> Vec<u8> {
    let mut out = Vec::new();
    let mut diff = patch.diff_stream();
    let mut extra = patch.extra_stream();
    let mut old_pos: i64 = 0;
    for entry in patch.entries() {
        let d = entry.diff_size as usize;
        let (residual, rest) = diff.split_at(d);
        for (i, &r) in residual.iter().enumerate() {
            out.push(old[old_pos as usize + i].wrapping_add(r));
        }
        diff = rest;
        let x = entry.extra_size as usize;
        let (verbatim, rest) = extra.split_at(x);
        out.extend_from_slice(verbatim);
        extra = rest;
        old_pos += entry.diff_size as i64 + entry.offset_increment;
    }
    out
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let old_len = usize::from(data[0]) % 64;
    let new_len = usize::from(data[1]) % 64;
    let rest = &data[2..];
    if rest.len() < old_len + new_len {
        return;
    }
    let (old, rest) = rest.split_at(old_len);
    let (new, script) = rest.split_at(new_len);

    let entries: Vec<ControlEntry> = script
        .chunks_exact(3)
        .map(|op| {
            ControlEntry::new(
                u64::from(op[0] % 48),
                u64::from(op[1] % 48),
                i64::from(op[2] as i8),
            )
        })
        .collect();

    let mut writer = FakePatchWriter::new();
    if encode_patch(old, new, &entries, &mut writer).is_ok() {
        // Everything the encoder accepted must replay exactly.
        assert_eq!(apply(old, &writer), new);
    }
});
