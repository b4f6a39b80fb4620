// Property tests for the accounting invariants of patch splitting.
//
// The strategies build entry sequences that are valid for a given pair of
// old/new sizes (copies in bounds, output covering the new file exactly),
// then check that splitting preserves everything a single writer records.

use oxipatch::{ControlEntry, FakePatchWriter, PatchWriter, SplitPatchWriter, encode_patch};
use proptest::prelude::*;

/// Turn raw seed triples into a valid covering entry sequence for an old
/// file of `old_size` bytes and a new file of `new_size` bytes.
fn build_entries(old_size: u64, new_size: u64, seeds: &[(u8, u8, u8)]) -> Vec<ControlEntry> {
    let mut entries = Vec::new();
    let mut old_pos: u64 = 0;
    let mut remaining = new_size;

    for &(d, x, o) in seeds {
        if remaining == 0 {
            break;
        }
        let diff = u64::from(d) % ((old_size - old_pos).min(remaining) + 1);
        let extra = u64::from(x) % (remaining - diff + 1);

        // Choose an offset that keeps the cursor inside [0, old_size].
        let after = old_pos + diff;
        let span = old_size + 1;
        let target = u64::from(o) % span;
        let offset = target as i64 - after as i64;

        entries.push(ControlEntry::new(diff, extra, offset));
        old_pos = target;
        remaining -= diff + extra;
    }
    if remaining > 0 {
        entries.push(ControlEntry::new(0, remaining, 0));
    }
    entries
}

fn arb_patch() -> impl Strategy<Value = (Vec<u8>, Vec<u8>, Vec<ControlEntry>)> {
    (
        proptest::collection::vec(any::<u8>(), 1..64),
        proptest::collection::vec(any::<u8>(), 0..256),
        proptest::collection::vec(any::<(u8, u8, u8)>(), 0..32),
    )
        .prop_map(|(old, new, seeds)| {
            let entries = build_entries(old.len() as u64, new.len() as u64, &seeds);
            (old, new, entries)
        })
}

fn encode_split(
    old: &[u8],
    new: &[u8],
    entries: &[ControlEntry],
    chunk: u64,
) -> Vec<FakePatchWriter> {
    let count = usize::try_from((new.len() as u64).div_ceil(chunk).max(1)).unwrap();
    let mut fakes: Vec<FakePatchWriter> = (0..count).map(|_| FakePatchWriter::new()).collect();
    {
        let children: Vec<&mut dyn PatchWriter> =
            fakes.iter_mut().map(|f| f as &mut dyn PatchWriter).collect();
        let mut split = SplitPatchWriter::new(chunk, children);
        encode_patch(old, new, entries, &mut split).unwrap();
    }
    fakes
}

proptest! {
    // The concatenated streams of a split patch equal the streams of the
    // unsplit patch, chunk size notwithstanding.
    #[test]
    fn prop_split_streams_match_unsplit(
        (old, new, entries) in arb_patch(),
        chunk in 1u64..48,
    ) {
        let mut single = FakePatchWriter::new();
        encode_patch(&old, &new, &entries, &mut single).unwrap();

        let fakes = encode_split(&old, &new, &entries, chunk);

        let diff: Vec<u8> = fakes.iter().flat_map(|f| f.diff_stream().to_vec()).collect();
        let extra: Vec<u8> = fakes.iter().flat_map(|f| f.extra_stream().to_vec()).collect();
        prop_assert_eq!(diff, single.diff_stream());
        prop_assert_eq!(extra, single.extra_stream());
    }

    // Routed output is conserved exactly, per sub-patch and in total, and
    // every sub-patch was sized and closed correctly.
    #[test]
    fn prop_output_is_conserved(
        (old, new, entries) in arb_patch(),
        chunk in 1u64..48,
    ) {
        let fakes = encode_split(&old, &new, &entries, chunk);

        let mut total: u64 = 0;
        for (i, fake) in fakes.iter().enumerate() {
            prop_assert!(fake.is_closed());
            let sub_output: u64 = fake.entries().iter().map(ControlEntry::output_size).sum();
            let declared = fake.new_size().unwrap();
            prop_assert_eq!(sub_output, declared, "sub-patch {} output", i);
            prop_assert_eq!(fake.diff_stream().len() as u64,
                fake.entries().iter().map(|e| e.diff_size).sum::<u64>());
            prop_assert_eq!(fake.extra_stream().len() as u64,
                fake.entries().iter().map(|e| e.extra_size).sum::<u64>());
            total += sub_output;
        }
        prop_assert_eq!(total, new.len() as u64);
    }

    // An entry whose output spans k chunk boundaries lands as k+1 payload
    // fragments in k+1 consecutive sub-patches; injected rebase entries
    // never carry payload.
    #[test]
    fn prop_boundary_fidelity(
        diff in 0u64..200,
        extra in 0u64..200,
        chunk in 1u64..32,
    ) {
        let new_size = diff + extra;
        prop_assume!(new_size > 0);
        let count = usize::try_from(new_size.div_ceil(chunk)).unwrap();
        let mut fakes: Vec<FakePatchWriter> = (0..count).map(|_| FakePatchWriter::new()).collect();
        {
            let children: Vec<&mut dyn PatchWriter> =
                fakes.iter_mut().map(|f| f as &mut dyn PatchWriter).collect();
            let mut split = SplitPatchWriter::new(chunk, children);
            split.init(new_size).unwrap();
            split.add_control_entry(&ControlEntry::new(diff, extra, 0)).unwrap();
            split.write_diff_stream(&vec![0xAB; diff as usize]).unwrap();
            split.write_extra_stream(&vec![0xCD; extra as usize]).unwrap();
            split.close().unwrap();
        }

        let mut fragments = 0u64;
        let mut diff_sum = 0u64;
        let mut extra_sum = 0u64;
        for fake in &fakes {
            for entry in fake.entries() {
                if entry.output_size() == 0 {
                    // Rebase entry: pure seek, no payload.
                    prop_assert_eq!(entry.diff_size, 0);
                    prop_assert_eq!(entry.extra_size, 0);
                } else {
                    fragments += 1;
                }
                diff_sum += entry.diff_size;
                extra_sum += entry.extra_size;
            }
        }
        // The entry fills every sub-patch: one payload fragment each.
        prop_assert_eq!(fragments, count as u64);
        prop_assert_eq!(diff_sum, diff);
        prop_assert_eq!(extra_sum, extra);
    }

    // Trivial entries are invisible: injecting them anywhere changes no
    // routed entry and no stream byte.
    #[test]
    fn prop_trivial_entries_are_invisible(
        (old, new, entries) in arb_patch(),
        chunk in 1u64..48,
        every in 1usize..4,
    ) {
        let plain = encode_split(&old, &new, &entries, chunk);

        let mut noisy = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            if i % every == 0 {
                noisy.push(ControlEntry::new(0, 0, 0));
            }
            noisy.push(*entry);
        }
        noisy.push(ControlEntry::new(0, 0, 0));
        let with_trivials = encode_split(&old, &new, &noisy, chunk);

        prop_assert_eq!(plain.len(), with_trivials.len());
        for (a, b) in plain.iter().zip(&with_trivials) {
            prop_assert_eq!(a.entries(), b.entries());
            prop_assert_eq!(a.diff_stream(), b.diff_stream());
            prop_assert_eq!(a.extra_stream(), b.extra_stream());
        }
    }

    // Sub-patches close monotonically, never ahead of the routing cursor,
    // at every step of the patch.
    #[test]
    fn prop_monotonic_closing(
        (_old, new, entries) in arb_patch(),
        chunk in 1u64..48,
    ) {
        let count = usize::try_from((new.len() as u64).div_ceil(chunk).max(1)).unwrap();
        let mut fakes: Vec<FakePatchWriter> = (0..count).map(|_| FakePatchWriter::new()).collect();
        let children: Vec<&mut dyn PatchWriter> =
            fakes.iter_mut().map(|f| f as &mut dyn PatchWriter).collect();
        let mut split = SplitPatchWriter::new(chunk, children);

        split.init(new.len() as u64).unwrap();
        for entry in &entries {
            split.add_control_entry(entry).unwrap();
            prop_assert!(split.closed_patches() <= split.current_patch());
            prop_assert!(split.current_patch() < count);
            split.write_diff_stream(&vec![0u8; entry.diff_size as usize]).unwrap();
            split.write_extra_stream(&vec![1u8; entry.extra_size as usize]).unwrap();
            prop_assert!(split.closed_patches() <= split.current_patch());
        }
        split.close().unwrap();
        prop_assert_eq!(split.closed_patches(), count);
        prop_assert_eq!(split.current_patch(), count - 1);
    }
}

#[test]
fn build_entries_covers_new_file() {
    // Sanity-check the generator itself on a fixed seed.
    let entries = build_entries(16, 40, &[(200, 13, 7), (5, 250, 0), (90, 90, 15)]);
    let output: u64 = entries.iter().map(ControlEntry::output_size).sum();
    assert_eq!(output, 40);
}
