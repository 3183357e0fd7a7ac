#![no_main]
use libfuzzer_sys::fuzz_target;
use arbitrary::Arbitrary;
use std::collections::BTreeSet;

use not_in::NotIn;

/// Fuzz the NOT_IN row processor against a direct model of the group result.
///
/// Tests:
/// - References: every distinct non-null reference
/// - Values: every distinct non-null value never seen as a reference
/// - Same result for forward, reversed and rotated row order
/// - Values and references stay disjoint after every row

/// Small alphabet so collisions between values and references are common.
/// Includes the empty string and a length-only variant (`ab` / `ab\0`).
const ALPHABET: [&[u8]; 8] = [b"", b"a", b"b", b"c", b"ab", b"ab\0", b"\xff", b"\x00"];

#[derive(Arbitrary, Debug)]
struct RowsInput {
    /// Each cell picks from ALPHABET; `None` is SQL NULL
    rows: Vec<(Option<u8>, Option<u8>)>,
    rotate_by: u8,
}

type Rows = Vec<(Option<&'static [u8]>, Option<&'static [u8]>)>;

fn pick(cell: Option<u8>) -> Option<&'static [u8]> {
    cell.map(|i| ALPHABET[i as usize % ALPHABET.len()])
}

fn run(rows: &Rows) -> (BTreeSet<Vec<u8>>, BTreeSet<Vec<u8>>) {
    let mut state = NotIn::new();
    for (v, r) in rows {
        state.add_row(*v, *r).expect("allocation failed");
        for value in state.values().iter() {
            assert!(!state.contains_reference(value), "value also stored as reference");
        }
    }
    (
        state.values().iter().map(|b| b.to_vec()).collect(),
        state.references().iter().map(|b| b.to_vec()).collect(),
    )
}

fuzz_target!(|input: RowsInput| {
    if input.rows.len() > 256 {
        return;
    }

    let rows: Rows = input.rows.iter().map(|(v, r)| (pick(*v), pick(*r))).collect();

    let references: BTreeSet<Vec<u8>> = rows.iter().filter_map(|(_, r)| r.map(|b| b.to_vec())).collect();
    let values: BTreeSet<Vec<u8>> = rows
        .iter()
        .filter_map(|(v, _)| v.map(|b| b.to_vec()))
        .filter(|v| !references.contains(v))
        .collect();

    let forward = run(&rows);
    assert_eq!(forward.0, values);
    assert_eq!(forward.1, references);

    let mut reversed = rows.clone();
    reversed.reverse();
    assert_eq!(run(&reversed), forward);

    if !rows.is_empty() {
        let mut rotated = rows.clone();
        let k = input.rotate_by as usize % rotated.len();
        rotated.rotate_left(k);
        assert_eq!(run(&rotated), forward);
    }
});
