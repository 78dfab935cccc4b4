//! The generational mark-sweep collector.
//!
//! A collection of level `k` collects the young space plus the `k` oldest..
//! youngest old generations (`k` = 0 is a young-only pass, `k` = 2 a full
//! collection). The cycle:
//!
//! 1. drain `OldToNew` for the collected generations, aging referenced
//!    cells up to the referring generation;
//! 2. merge the collected `Old` lists into `New`, bumping generations;
//! 3. pre-mark the uncollected old generations (they are live by fiat);
//! 4. treat `OldToNew` cells of uncollected generations as roots for their
//!    children;
//! 5. forward the real roots (permanent cells, symbol table, protect
//!    stack, preserve list) and process the forward queue;
//! 6. run the weak-reference pass;
//! 7. sweep the interned-character cache;
//! 8. sweep: small cells left on `New` go back to their page free lists,
//!    large and custom cells hand their pages back;
//! 9. clear every transient mark.
//!
//! Afterwards the budgets are adjusted (full collections only), empty
//! pages are released and the free lists optionally re-sorted for
//! allocation locality.

use rustc_hash::FxHashSet;

use crate::config::{EARLY_GROWTH_GCS, GROW_FRAC, LEVEL_FREQ, MAX_KEEP_FRAC, MIN_FREE_FRAC, SHRINK_FRAC};
use crate::error::{GcError, Result};
use crate::heap::page::{
    nodes_per_page, CUSTOM_CLASS, LARGE_CLASS, NUM_NODE_CLASSES, NUM_OLD_GENERATIONS,
    NUM_SMALL_CLASSES,
};
use crate::heap::Heap;
use crate::object::header::gp;
use crate::object::{Kind, NodeData, Value};

/// Collector bookkeeping carried by the heap.
pub(crate) struct GcState {
    pub gc_count: u64,
    pub full_count: u64,
    pub collect_counts: [u32; NUM_OLD_GENERATIONS],
    pub in_gc: bool,
    pub torture_gap: usize,
    pub torture_wait: usize,
    pub torture_counter: usize,
    pub last_node_count: usize,
    pub last_vec_units: usize,
}

impl GcState {
    pub fn new() -> Self {
        Self {
            gc_count: 0,
            full_count: 0,
            collect_counts: LEVEL_FREQ,
            in_gc: false,
            torture_gap: 0,
            torture_wait: 0,
            torture_counter: 0,
            last_node_count: 0,
            last_vec_units: 0,
        }
    }
}

/// Snapshot reported by [`Heap::gc`].
#[derive(Debug, Clone, Copy)]
pub struct GcSummary {
    /// Nodes in use after the collection.
    pub node_count: usize,
    /// Current node budget.
    pub node_budget: usize,
    /// Vector units in use after the collection.
    pub vec_units: usize,
    /// Current vector budget.
    pub vec_budget: usize,
    /// Collections run so far.
    pub gc_count: u64,
    /// Deepest level this collection reached.
    pub level: usize,
}

impl Heap {
    // === Public collection API =============================================

    /// Run a full collection and report the resulting heap occupancy.
    pub fn gc(&mut self) -> GcSummary {
        let level = self.collect_with_retry(NUM_OLD_GENERATIONS, 0);
        if self.config.immediate_finalizers {
            self.run_pending_finalizers();
        }
        self.summary(level)
    }

    /// Run a young-space collection only (may still escalate when free
    /// space stays inadequate).
    pub fn gc_lite(&mut self) -> GcSummary {
        let level = self.collect_with_retry(0, 0);
        if self.config.immediate_finalizers {
            self.run_pending_finalizers();
        }
        self.summary(level)
    }

    /// Configure torture mode: collect every `gap` allocations once `wait`
    /// allocations have passed; optionally keep empty pages mapped.
    pub fn set_gc_torture(&mut self, gap: usize, wait: usize, inhibit_release: bool) {
        self.gc.torture_gap = gap;
        self.gc.torture_wait = wait;
        self.gc.torture_counter = 0;
        self.config.inhibit_page_release = inhibit_release;
    }

    /// Collections run so far.
    pub fn gc_count(&self) -> u64 {
        self.gc.gc_count
    }

    /// Nodes currently in use.
    pub fn nodes_in_use(&self) -> usize {
        self.node_count
    }

    /// Vector units currently in use.
    pub fn vec_units_in_use(&self) -> usize {
        self.vec_units_in_use
    }

    fn summary(&self, level: usize) -> GcSummary {
        GcSummary {
            node_count: self.node_count,
            node_budget: self.n_size,
            vec_units: self.vec_units_in_use,
            vec_budget: self.v_size,
            gc_count: self.gc.gc_count,
            level,
        }
    }

    // === Allocation-triggered collection ===================================

    /// Collect because an allocation needs room for `size_needed` more
    /// vector units (0 for a pure node allocation).
    ///
    /// # Errors
    /// `HeapExhausted` / `OutOfMemory` when even a full collection with
    /// grown budgets cannot satisfy the request.
    pub(crate) fn run_gc(&mut self, size_needed: usize) -> Result<()> {
        // level selection: the per-generation counters decide how deep
        let mut level = 0;
        self.gc.collect_counts[0] = self.gc.collect_counts[0].saturating_sub(1);
        if self.gc.collect_counts[0] == 0 {
            self.gc.collect_counts[0] = LEVEL_FREQ[0];
            level = 1;
            self.gc.collect_counts[1] = self.gc.collect_counts[1].saturating_sub(1);
            if self.gc.collect_counts[1] == 0 {
                self.gc.collect_counts[1] = LEVEL_FREQ[1];
                level = 2;
            }
        }
        // inadequate vector space forces full depth up front
        if size_needed > 0 && self.vec_units_in_use + size_needed > self.v_size {
            level = NUM_OLD_GENERATIONS;
        }
        self.collect_with_retry(level, size_needed);

        if self.node_count >= self.n_size {
            return Err(GcError::HeapExhausted {
                in_use: self.node_count,
                limit: self.n_size,
            });
        }
        if self.vec_units_in_use + size_needed > self.v_size {
            return Err(GcError::OutOfMemory {
                units: size_needed,
                in_use: self.vec_units_in_use,
                limit: self.v_size,
            });
        }
        if self.config.immediate_finalizers {
            self.run_pending_finalizers();
        }
        Ok(())
    }

    /// Run a collection at `level`, escalating while the post-collection
    /// free fraction stays under `MIN_FREE_FRAC`, then do the post-cycle
    /// housekeeping (budget adjustment, page release, free-list sort).
    fn collect_with_retry(&mut self, mut level: usize, size_needed: usize) -> usize {
        loop {
            self.gen_collect(level);
            let node_free = self.n_size.saturating_sub(self.node_count);
            let vec_free = self.v_size.saturating_sub(self.vec_units_in_use);
            let node_ok = node_free as f64 >= MIN_FREE_FRAC * self.n_size as f64;
            let vec_ok = vec_free >= size_needed
                && vec_free as f64 >= MIN_FREE_FRAC * self.v_size as f64;
            if (!node_ok || !vec_ok) && level < NUM_OLD_GENERATIONS {
                level += 1;
                continue;
            }
            break;
        }
        self.gc.gc_count += 1;
        if level == NUM_OLD_GENERATIONS {
            self.gc.full_count += 1;
            self.adjust_heap_size(size_needed);
            if self.config.sort_free_lists {
                self.sort_free_lists();
            }
        }
        if level >= 1 && !self.config.inhibit_page_release {
            self.release_pages();
        }
        level
    }

    // === The collection cycle ==============================================

    fn gen_collect(&mut self, num_old_to_collect: usize) {
        if self.gc.in_gc {
            panic!("recursive collector invocation");
        }
        self.gc.in_gc = true;
        let num = num_old_to_collect;
        log::debug!(
            "gc level {}: {} nodes, {} vector units in use",
            num,
            self.node_count,
            self.vec_units_in_use
        );

        // 1. old-to-new of the collected generations
        for gen in 0..num {
            for class in 0..NUM_NODE_CLASSES {
                let ring = self.lists.old_to_new[class][gen];
                for s in self.collect_list(ring) {
                    self.age_children_of(s, gen);
                    let old_ring = self.lists.old[class][gen];
                    self.unsnap(s);
                    self.snap(s, old_ring);
                }
            }
        }

        // 2. merge the collected old generations into New
        for gen in 0..num {
            for class in 0..NUM_NODE_CLASSES {
                self.old_count[class][gen] = 0;
                let ring = self.lists.old[class][gen];
                let mut s = self.next_node(ring);
                while s != ring {
                    let next = self.next_node(s);
                    let h = &mut self.node_mut(s).header;
                    if gen < NUM_OLD_GENERATIONS - 1 {
                        h.set_generation(gen + 1);
                    }
                    h.set_old(false);
                    h.set_mark(false);
                    s = next;
                }
                let to = self.lists.new_list[class];
                self.bulk_move(ring, to);
            }
        }

        // 3. pre-mark the uncollected old generations
        for gen in num..NUM_OLD_GENERATIONS {
            for class in 0..NUM_NODE_CLASSES {
                for ring in [
                    self.lists.old[class][gen],
                    self.lists.old_to_new[class][gen],
                ] {
                    let mut s = self.next_node(ring);
                    while s != ring {
                        self.node_mut(s).header.set_mark(true);
                        s = self.next_node(s);
                    }
                }
            }
        }

        let mut queue: Vec<Value> = Vec::new();

        // 4. children of uncollected old-to-new cells are roots
        for gen in num..NUM_OLD_GENERATIONS {
            for class in 0..NUM_NODE_CLASSES {
                let ring = self.lists.old_to_new[class][gen];
                for s in self.collect_list(ring) {
                    self.forward_children(s, &mut queue);
                }
            }
        }

        // 5. the root set
        let permanents = self.permanents.clone();
        for v in permanents {
            self.forward_node(v, &mut queue);
        }
        let symbols: Vec<Value> = self.symbols.values().copied().collect();
        for v in symbols {
            self.forward_node(v, &mut queue);
        }
        let protected = self.protect.clone();
        for v in protected {
            self.forward_node(v, &mut queue);
        }
        for v in self.preserve.roots() {
            self.forward_node(v, &mut queue);
        }
        self.process_queue(&mut queue);

        // 6. weak references
        self.weak_pass(&mut queue);

        // 7. interned-character cache: drop entries that did not survive
        let cache = std::mem::take(&mut self.char_cache);
        let kept = cache
            .into_iter()
            .filter(|(_, v)| self.node(*v).header.is_marked())
            .collect();
        self.char_cache = kept;

        // 8. sweep
        self.sweep();

        // 9. transient marks go back to zero
        for gen in 0..NUM_OLD_GENERATIONS {
            for class in 0..NUM_NODE_CLASSES {
                for ring in [
                    self.lists.old[class][gen],
                    self.lists.old_to_new[class][gen],
                ] {
                    let mut s = self.next_node(ring);
                    while s != ring {
                        self.node_mut(s).header.set_mark(false);
                        s = self.next_node(s);
                    }
                }
            }
        }

        self.gc.in_gc = false;
        log::debug!(
            "gc done: {} nodes, {} vector units in use",
            self.node_count,
            self.vec_units_in_use
        );
    }

    // === Forwarding ========================================================

    /// Direct children of a cell for the collector's walks. Weak-ref slots
    /// are omitted; the weak pass owns them.
    pub(crate) fn children_of(&self, s: Value) -> Vec<Value> {
        let mut kids = Vec::new();
        let attrib = self.node(s).header.attrib;
        if !attrib.is_nil() {
            kids.push(attrib);
        }
        match &self.node(s).data {
            NodeData::Cons { car, cdr, tag } => kids.extend([*car, *cdr, *tag]),
            NodeData::Symbol {
                pname,
                value,
                internal,
            } => kids.extend([*pname, *value, *internal]),
            NodeData::Env {
                frame,
                enclos,
                hashtab,
            } => kids.extend([*frame, *enclos, *hashtab]),
            NodeData::Promise { code, env, value } => kids.extend([*code, *env, *value]),
            NodeData::Closure { formals, body, env } => kids.extend([*formals, *body, *env]),
            NodeData::Bytecode { code, consts } => kids.extend([*code, *consts]),
            NodeData::ExtPtr { prot, tag, .. } => kids.extend([*prot, *tag]),
            NodeData::Weak { .. } => {}
            NodeData::Vector(p) => kids.extend_from_slice(p.data.value_elements()),
            NodeData::Free | NodeData::Empty | NodeData::Builtin { .. } => {}
        }
        kids
    }

    fn forward_children(&mut self, s: Value, queue: &mut Vec<Value>) {
        for c in self.children_of(s) {
            self.forward_node(c, queue);
        }
    }

    /// Mark a reachable cell and move it onto its old list.
    fn forward_node(&mut self, v: Value, queue: &mut Vec<Value>) {
        if v.is_nil() {
            return;
        }
        let (marked, kind) = {
            let h = &self.node(v).header;
            (h.is_marked(), h.kind())
        };
        if marked {
            return;
        }
        if kind == Kind::Free {
            self.gc_invariant_failure("reference to a free cell during forwarding");
            return;
        }
        {
            let h = &mut self.node_mut(v).header;
            h.set_mark(true);
            h.set_old(true);
        }
        let (class, gen) = {
            let h = &self.node(v).header;
            (h.class(), h.generation())
        };
        let list = self.lists.old[class][gen];
        self.unsnap(v);
        self.snap(v, list);
        self.old_count[class][gen] += 1;
        queue.push(v);
    }

    fn process_queue(&mut self, queue: &mut Vec<Value>) {
        while let Some(s) = queue.pop() {
            self.forward_children(s, queue);
        }
    }

    // === Aging (old-to-new drain) ==========================================

    fn age_children_of(&mut self, s: Value, gen: usize) {
        let mut pending = self.children_of(s);
        while let Some(c) = pending.pop() {
            if self.age_node(c, gen) {
                pending.extend(self.children_of(c));
            }
        }
    }

    /// Promote `v` to at least `gen`; true when it moved (children must
    /// then be aged too).
    fn age_node(&mut self, v: Value, gen: usize) -> bool {
        if v.is_nil() {
            return false;
        }
        let (kind, old, vgen, class) = {
            let h = &self.node(v).header;
            (h.kind(), h.is_old(), h.generation(), h.class())
        };
        if kind == Kind::Free {
            self.gc_invariant_failure("reference to a free cell during aging");
            return false;
        }
        if old && vgen >= gen {
            return false;
        }
        if old {
            self.old_count[class][vgen] -= 1;
        }
        {
            let h = &mut self.node_mut(v).header;
            h.set_old(true);
            h.set_generation(gen);
        }
        let list = self.lists.old[class][gen];
        self.unsnap(v);
        self.snap(v, list);
        self.old_count[class][gen] += 1;
        true
    }

    // === Weak-reference pass ===============================================

    fn weak_pass(&mut self, queue: &mut Vec<Value>) {
        // values and finalizers of refs with live keys are live; finding
        // one may mark further keys, so re-check until a fixpoint
        loop {
            let mut changed = false;
            let mut w = self.weak_refs;
            while !w.is_nil() {
                let (key, value, finalizer, next) = self.weak_fields(w);
                if !key.is_nil() && self.node(key).header.is_marked() {
                    if !value.is_nil() && !self.node(value).header.is_marked() {
                        changed = true;
                        self.forward_node(value, queue);
                    }
                    if !finalizer.is_nil() && !self.node(finalizer).header.is_marked() {
                        changed = true;
                        self.forward_node(finalizer, queue);
                    }
                }
                w = next;
            }
            self.process_queue(queue);
            if !changed {
                break;
            }
        }

        // refs whose key died become ready to finalize
        let mut w = self.weak_refs;
        while !w.is_nil() {
            let (key, _, _, next) = self.weak_fields(w);
            if !key.is_nil() && !self.node(key).header.is_marked() {
                let h = &mut self.node_mut(w).header;
                if !h.gp_is_set(gp::READY_TO_FINALIZE) {
                    h.gp_set(gp::READY_TO_FINALIZE);
                }
            }
            w = next;
        }

        // every registered ref and its slots survive the cycle; pending
        // finalizers still need the key, and finalization is what unlinks
        // a ref from the chain
        let mut w = self.weak_refs;
        while !w.is_nil() {
            let (key, value, finalizer, next) = self.weak_fields(w);
            self.forward_node(w, queue);
            self.forward_node(key, queue);
            self.forward_node(value, queue);
            self.forward_node(finalizer, queue);
            w = next;
        }
        self.process_queue(queue);
    }

    // === Sweep =============================================================

    fn sweep(&mut self) {
        for class in 0..NUM_SMALL_CLASSES {
            let ring = self.lists.new_list[class];
            for s in self.collect_list(ring) {
                self.free_small_node(s, class);
            }
        }
        for class in [CUSTOM_CLASS, LARGE_CLASS] {
            let ring = self.lists.new_list[class];
            for s in self.collect_list(ring) {
                let kids = if self.config.track_refcounts {
                    self.children_of(s)
                } else {
                    Vec::new()
                };
                let units = match &self.node(s).data {
                    NodeData::Vector(p) => p.units,
                    _ => 0,
                };
                self.vec_units_in_use -= units;
                self.unsnap(s);
                self.release_solo_page(s);
                self.node_count -= 1;
                for k in kids {
                    self.decr_refcnt_swept(k);
                }
            }
        }
    }

    fn free_small_node(&mut self, s: Value, class: usize) {
        let kids = if self.config.track_refcounts {
            self.children_of(s)
        } else {
            Vec::new()
        };
        let units = match &self.node(s).data {
            NodeData::Vector(p) => p.units,
            _ => 0,
        };
        {
            let node = self.node_mut(s);
            node.header.set_kind(Kind::Free);
            node.header.set_mark(false);
            node.header.set_old(false);
            node.header.set_generation(0);
            node.header.gp = 0;
            node.header.refcnt = 0;
            node.header.attrib = Value::NIL;
            node.data = NodeData::Free;
        }
        self.vec_units_in_use -= units;
        self.unsnap(s);
        self.free[class].push(s);
        self.node_count -= 1;
        for k in kids {
            self.decr_refcnt_swept(k);
        }
    }

    /// Refcount decrement that tolerates cells freed earlier in this sweep.
    fn decr_refcnt_swept(&mut self, v: Value) {
        if v.is_nil() || self.pages[v.page()].is_none() {
            return;
        }
        self.decr_refcnt(v);
    }

    fn gc_invariant_failure(&self, message: &str) {
        if self.config.fail_on_error {
            panic!("gc invariant violated: {}", message);
        }
        log::error!("gc invariant violated: {}", message);
    }

    // === Post-cycle housekeeping ===========================================

    fn adjust_heap_size(&mut self, size_needed: usize) {
        // nodes
        let in_use = self.node_count as f64;
        let mut n_size = self.n_size as f64;
        let grow = in_use > GROW_FRAC * n_size;
        let early = self.gc.full_count <= EARLY_GROWTH_GCS && {
            let delta = self.node_count.saturating_sub(self.gc.last_node_count) as f64;
            in_use + delta > GROW_FRAC * n_size
        };
        if grow || early {
            n_size += self.config.node_grow_incr_min as f64
                + self.config.node_grow_incr_frac * n_size;
            if in_use >= n_size {
                n_size = in_use + self.config.node_grow_incr_min as f64;
            }
        } else if in_use < SHRINK_FRAC * n_size {
            n_size -= self.config.node_grow_incr_frac * n_size;
        }
        self.n_size = (n_size as usize)
            .clamp(self.config.node_budget, self.config.max_node_budget);

        // vector units
        let needed = (self.vec_units_in_use + size_needed) as f64;
        let mut v_size = self.v_size as f64;
        let early_v = self.gc.full_count <= EARLY_GROWTH_GCS && {
            let delta = self
                .vec_units_in_use
                .saturating_sub(self.gc.last_vec_units) as f64;
            needed + delta > GROW_FRAC * v_size
        };
        if needed > GROW_FRAC * v_size || early_v {
            v_size += self.config.vector_grow_incr_min as f64
                + self.config.vector_grow_incr_frac * v_size;
            if needed >= v_size {
                v_size = needed + self.config.vector_grow_incr_min as f64;
            }
        } else if needed < SHRINK_FRAC * v_size {
            v_size -= self.config.vector_grow_incr_frac * v_size;
        }
        self.v_size = (v_size as usize)
            .clamp(self.config.vector_budget, self.config.max_vector_budget);

        self.gc.last_node_count = self.node_count;
        self.gc.last_vec_units = self.vec_units_in_use;
    }

    /// Release pages whose nodes are all free, keeping `MAX_KEEP_FRAC`
    /// slack over the old-node population of each class.
    fn release_pages(&mut self) {
        for class in 0..NUM_SMALL_CLASSES {
            let class_old: usize = self.old_count[class].iter().sum();
            let keep = ((1.0 + MAX_KEEP_FRAC) * class_old as f64).ceil() as usize;
            let max_nodes = self.alloc_count[class].saturating_sub(keep);
            let per_page = nodes_per_page(class);
            let mut budget = max_nodes / per_page;
            if budget == 0 {
                continue;
            }
            let ids = self.pages_by_class[class].clone();
            let mut released: FxHashSet<usize> = FxHashSet::default();
            for id in ids {
                if budget == 0 {
                    break;
                }
                let empty = self.pages[id].as_ref().is_some_and(|p| p.is_empty());
                if empty {
                    self.pages[id] = None;
                    self.free_pages.push(id);
                    self.alloc_count[class] -= per_page;
                    budget -= 1;
                    released.insert(id);
                }
            }
            if !released.is_empty() {
                self.pages_by_class[class].retain(|id| !released.contains(id));
                self.free[class].retain(|v| !released.contains(&v.page()));
                log::debug!("released {} pages of class {}", released.len(), class);
            }
        }
    }

    /// Rebuild the free lists in address order so subsequent allocations
    /// favor intra-page locality.
    fn sort_free_lists(&mut self) {
        for class in 0..NUM_SMALL_CLASSES {
            self.free[class]
                .sort_unstable_by_key(|v| std::cmp::Reverse((v.page(), v.slot())));
        }
    }
}
