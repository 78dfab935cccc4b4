//! Write-barrier and reference-count tests.

use rye_gc::{GcConfig, Heap, Kind, Value};

fn heap() -> Heap {
    Heap::new(GcConfig::default()).expect("heap init")
}

/// Promote a cell into the old space by surviving a full collection.
fn make_old(heap: &mut Heap, v: Value) {
    heap.protect(v).expect("protect");
    heap.gc();
    heap.unprotect(1).expect("unprotect");
}

/// **Bug this finds:** missing old-to-new registration on slot stores.
#[test]
fn test_old_cell_keeps_young_child_across_young_collection() {
    let mut heap = heap();
    let parent = heap.alloc_cons(Value::NIL, Value::NIL).unwrap();
    heap.protect(parent).unwrap();
    heap.gc(); // parent is old now

    let child = heap.mk_string("young").unwrap();
    heap.set_car(parent, child);
    // the only strong reference to `child` is the slot in the old parent
    heap.gc_lite();

    let car = heap.car(parent);
    assert_eq!(heap.kind(car), Kind::Str);
    assert_eq!(heap.char_bytes(heap.str_elt(car, 0)), b"young");
    heap.unprotect(1).unwrap();
}

/// **Bug this finds:** old-to-new entries dropped by deeper collections.
#[test]
fn test_old_cell_keeps_young_child_across_full_collection() {
    let mut heap = heap();
    let parent = heap.alloc_cons(Value::NIL, Value::NIL).unwrap();
    heap.protect(parent).unwrap();
    heap.gc();
    heap.gc(); // push the parent deeper

    let child = heap.mk_string("younger").unwrap();
    heap.set_cdr(parent, child);
    heap.gc();

    let cdr = heap.cdr(parent);
    assert_eq!(heap.kind(cdr), Kind::Str);
    heap.unprotect(1).unwrap();
}

/// **Bug this finds:** barrier bypass on the non-pair setter families.
#[test]
fn test_barrier_covers_environment_and_vector_slots() {
    let mut heap = heap();
    let env = heap.alloc_env(Value::NIL, Value::NIL).unwrap();
    make_old(&mut heap, env);
    heap.protect(env).unwrap();

    let list = heap.alloc_vector(Kind::List, 4).unwrap();
    make_old(&mut heap, list);
    heap.protect(list).unwrap();

    let frame_val = heap.mk_string("frame").unwrap();
    heap.set_frame(env, frame_val);
    let elt_val = heap.mk_string("elt").unwrap();
    heap.set_elt(list, 2, elt_val);

    heap.gc_lite();

    assert_eq!(heap.char_bytes(heap.str_elt(heap.env_frame(env), 0)), b"frame");
    assert_eq!(heap.char_bytes(heap.str_elt(heap.elt(list, 2), 0)), b"elt");
    heap.unprotect(2).unwrap();
}

/// **Bug this finds:** attribute stores skipping the barrier.
#[test]
fn test_barrier_covers_attributes() {
    let mut heap = heap();
    let v = heap.alloc_vector(Kind::Real, 3).unwrap();
    make_old(&mut heap, v);
    heap.protect(v).unwrap();

    let names_sym = heap.install("names").unwrap();
    let names = heap.mk_string("a").unwrap();
    heap.protect(names).unwrap();
    heap.set_attrib(v, names_sym, names).unwrap();
    heap.unprotect(1).unwrap();

    heap.gc_lite();

    let got = heap.get_attrib(v, names_sym);
    assert_eq!(heap.kind(got), Kind::Str);
    heap.unprotect(1).unwrap();
}

// === Reference counting ===

#[test]
fn test_fresh_cells_are_unshared() {
    let mut heap = heap();
    let v = heap.alloc_vector(Kind::Real, 2).unwrap();
    assert!(heap.no_references(v));
    assert!(!heap.maybe_shared(v));
}

#[test]
fn test_stores_update_reference_counts() {
    let mut heap = heap();
    let child = heap.alloc_vector(Kind::Real, 2).unwrap();
    heap.protect(child).unwrap();
    let a = heap.alloc_cons(Value::NIL, Value::NIL).unwrap();
    heap.protect(a).unwrap();
    let b = heap.alloc_cons(Value::NIL, Value::NIL).unwrap();
    heap.protect(b).unwrap();

    heap.set_car(a, child);
    assert!(!heap.no_references(child));

    heap.set_car(b, child);
    assert!(heap.maybe_shared(child));

    // dropping one holder makes it unshared again, but not unreferenced
    heap.set_car(b, Value::NIL);
    assert!(!heap.maybe_shared(child));
    assert!(!heap.no_references(child));

    heap.set_car(a, Value::NIL);
    assert!(heap.no_references(child));
    heap.unprotect(3).unwrap();
}

#[test]
fn test_disabled_cells_stay_shared() {
    let mut heap = heap();
    let v = heap.alloc_vector(Kind::Real, 1).unwrap();
    heap.disable_refcnt(v);
    assert!(!heap.no_references(v));
    assert!(heap.maybe_shared(v));
    // stores through a disabled cell do not panic or drift
    heap.protect(v).unwrap();
    let cell = heap.alloc_cons(v, Value::NIL).unwrap();
    heap.set_car(cell, Value::NIL);
    assert!(heap.maybe_shared(v));
    heap.unprotect(1).unwrap();
}

#[test]
fn test_refcounts_can_be_disabled_globally() {
    let mut heap = Heap::new(GcConfig {
        track_refcounts: false,
        ..Default::default()
    })
    .unwrap();
    let v = heap.alloc_vector(Kind::Real, 1).unwrap();
    // without tracking the predicate must stay conservative
    assert!(!heap.no_references(v));
    assert!(heap.maybe_shared(v));
}
