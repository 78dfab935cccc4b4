//! Property tests: random allocation/mutation/collection interleavings
//! never lose a rooted cell and never corrupt the graph.

use proptest::prelude::*;
use rye_gc::{GcConfig, Heap, Kind, Value};

/// One scripted step: indexes pick existing cells, `op` the action.
#[derive(Clone, Debug)]
struct Step {
    op: u8,
    a: u8,
    b: u8,
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        (0u8..6, any::<u8>(), any::<u8>()).prop_map(|(op, a, b)| Step { op, a, b }),
        1..200,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn scripted_mutation_survives_collections(script in steps()) {
        let mut heap = Heap::new(GcConfig::default()).expect("heap init");
        let mset = heap.new_precious_mset(64).unwrap();
        let seed = heap.alloc_cons(Value::NIL, Value::NIL).unwrap();
        heap.preserve_in_mset(mset, seed).unwrap();
        let mut cells: Vec<Value> = vec![seed];

        for step in &script {
            let a = cells[step.a as usize % cells.len()];
            let b = cells[step.b as usize % cells.len()];
            match step.op {
                // grow the graph
                0 | 1 => {
                    let fresh = heap.alloc_cons(a, b).unwrap();
                    heap.preserve_in_mset(mset, fresh).unwrap();
                    cells.push(fresh);
                }
                // rewire (the write barrier must cover both slots)
                2 => heap.set_car(a, b),
                3 => heap.set_cdr(a, b),
                // collect at both depths
                4 => {
                    heap.gc_lite();
                }
                _ => {
                    heap.gc();
                }
            }
        }
        heap.gc();

        // every scripted cell is still a live pair and its slots still
        // point at live pairs or Nil
        for &c in &cells {
            prop_assert_eq!(heap.kind(c), Kind::Cons);
            for slot in [heap.car(c), heap.cdr(c)] {
                if !slot.is_nil() {
                    prop_assert_eq!(heap.kind(slot), Kind::Cons);
                }
            }
        }
        heap.release_mset(mset);
    }

    #[test]
    fn vectors_keep_their_payload_across_collections(lens in prop::collection::vec(0usize..512, 1..24)) {
        let mut heap = Heap::new(GcConfig::default()).expect("heap init");
        let mset = heap.new_precious_mset(64).unwrap();
        let mut vectors = Vec::new();
        for (i, &len) in lens.iter().enumerate() {
            let v = heap.alloc_vector(Kind::Real, len).unwrap();
            for (j, slot) in heap.real_data_mut(v).iter_mut().enumerate() {
                *slot = (i * 1000 + j) as f64;
            }
            heap.preserve_in_mset(mset, v).unwrap();
            vectors.push((v, len));
            if i % 5 == 0 {
                heap.gc_lite();
            }
        }
        heap.gc();
        for (i, &(v, len)) in vectors.iter().enumerate() {
            prop_assert_eq!(heap.length(v), len);
            let data = heap.real_data(v);
            for (j, &x) in data.iter().enumerate() {
                prop_assert_eq!(x, (i * 1000 + j) as f64);
            }
        }
        heap.release_mset(mset);
    }
}
