//! Heap - the owner of every cell.
//!
//! The `Heap` owns the page table, the per-(class, generation) lists, the
//! allocation budgets, the protect stack, the preserve list, the symbol
//! table, the interned-character cache and the weak-reference chain. It is
//! single-threaded by design: the runtime's main thread holds it `&mut`
//! and every other thread must marshal work back to it.
//!
//! Allocation is the only implicit suspension point: any `alloc_*` call may
//! run the collector, so arguments passed to an allocator must already be
//! rooted (protect stack, precious multi-set, preserve list or a global).

pub mod lists;
pub mod page;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::gc::GcState;
use crate::intern::CharKey;
use crate::object::header::{gp, Header, REFCNT_DISABLED, REFCNT_MAX};
use crate::object::{Complex, Kind, Node, NodeData, Value, VectorData, VectorPayload};
use crate::protect::PreserveList;
use page::{
    class_for_units, vec_units, Page, LARGE_CLASS, NUM_NODE_CLASSES, NUM_OLD_GENERATIONS,
    NUM_SMALL_CLASSES,
};

/// Native finalizer invoked with the heap and the weak ref's key.
pub type NativeFinalizer = Box<dyn FnMut(&mut Heap, Value)>;

/// Hook for running language-level finalizers (function, key) in a fresh
/// top-level context supplied by the embedder.
pub type FinalizerHook = Box<dyn FnMut(&mut Heap, Value, Value)>;

/// Sentinels of the generational rings, allocated once on the permanent page.
pub(crate) struct ListSentinels {
    pub new_list: [Value; NUM_NODE_CLASSES],
    pub old: [[Value; NUM_OLD_GENERATIONS]; NUM_NODE_CLASSES],
    pub old_to_new: [[Value; NUM_OLD_GENERATIONS]; NUM_NODE_CLASSES],
}

impl ListSentinels {
    /// Fixed layout on page 0: slot 0 is Nil, then New, Old, OldToNew.
    fn layout() -> (Self, usize) {
        let mut new_list = [Value::NIL; NUM_NODE_CLASSES];
        let mut old = [[Value::NIL; NUM_OLD_GENERATIONS]; NUM_NODE_CLASSES];
        let mut old_to_new = [[Value::NIL; NUM_OLD_GENERATIONS]; NUM_NODE_CLASSES];
        let mut slot = 1;
        for class in 0..NUM_NODE_CLASSES {
            new_list[class] = Value::new(0, slot);
            slot += 1;
        }
        for gens in old.iter_mut() {
            for g in gens.iter_mut() {
                *g = Value::new(0, slot);
                slot += 1;
            }
        }
        for gens in old_to_new.iter_mut() {
            for g in gens.iter_mut() {
                *g = Value::new(0, slot);
                slot += 1;
            }
        }
        (
            Self {
                new_list,
                old,
                old_to_new,
            },
            slot,
        )
    }
}

/// Values allocated at init and never reclaimed.
#[derive(Clone, Copy)]
pub struct Globals {
    /// The unbound-value marker installed as every fresh symbol's value.
    pub unbound_value: Value,
    /// The missing-argument marker.
    pub missing_arg: Value,
    /// The pipe placeholder symbol `_`.
    pub placeholder: Value,
    /// The pipe-bind symbol `=>`.
    pub pipe_bind: Value,
    /// Shared logical `TRUE`.
    pub true_value: Value,
    /// Shared logical `FALSE`.
    pub false_value: Value,
    /// Shared logical `NA`.
    pub logical_na: Value,
    /// The NA character cell (never cached).
    pub na_string: Value,
    /// The interned empty character cell.
    pub blank_string: Value,
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            unbound_value: Value::NIL,
            missing_arg: Value::NIL,
            placeholder: Value::NIL,
            pipe_bind: Value::NIL,
            true_value: Value::NIL,
            false_value: Value::NIL,
            logical_na: Value::NIL,
            na_string: Value::NIL,
            blank_string: Value::NIL,
        }
    }
}

/// The managed heap.
pub struct Heap {
    pub(crate) pages: Vec<Option<Page>>,
    pub(crate) free_pages: Vec<usize>,
    pub(crate) free: [Vec<Value>; NUM_SMALL_CLASSES],
    pub(crate) pages_by_class: [Vec<usize>; NUM_SMALL_CLASSES],
    pub(crate) alloc_count: [usize; NUM_SMALL_CLASSES],

    pub(crate) lists: ListSentinels,
    pub(crate) old_count: [[usize; NUM_OLD_GENERATIONS]; NUM_NODE_CLASSES],

    pub(crate) node_count: usize,
    pub(crate) vec_units_in_use: usize,
    pub(crate) n_size: usize,
    pub(crate) v_size: usize,

    pub(crate) protect: Vec<Value>,
    pub(crate) protect_limit: usize,
    pub(crate) preserve: PreserveList,
    pub(crate) weak_refs: Value,
    pub(crate) symbols: IndexMap<Box<str>, Value>,
    pub(crate) char_cache: FxHashMap<CharKey, Value>,
    pub(crate) permanents: Vec<Value>,
    pub(crate) globals: Globals,

    pub(crate) native_finalizers: FxHashMap<Value, NativeFinalizer>,
    pub(crate) finalizer_hook: Option<FinalizerHook>,
    pub(crate) finalizing: bool,

    pub(crate) config: GcConfig,
    pub(crate) gc: GcState,

    warnings: Vec<String>,
}

impl Heap {
    /// Create a heap with the given configuration.
    ///
    /// Builds the permanent page (Nil and the list sentinels) and the
    /// never-collected globals, then returns the heap ready for use.
    ///
    /// # Errors
    /// `Configuration` when the config fails validation.
    pub fn new(config: GcConfig) -> Result<Self> {
        config.validate()?;

        let (lists, perm_slots) = ListSentinels::layout();
        let mut nodes = Vec::with_capacity(perm_slots);
        for slot in 0..perm_slots {
            let this = Value::new(0, slot);
            let kind = if slot == 0 { Kind::Nil } else { Kind::New };
            let mut header = Header::new(kind, 0);
            header.set_old(true);
            header.set_generation(NUM_OLD_GENERATIONS - 1);
            header.refcnt = REFCNT_DISABLED;
            header.prev = this;
            header.next = this;
            nodes.push(Node {
                header,
                data: NodeData::Empty,
            });
        }
        let permanent_page = Page {
            class: 0,
            nodes: nodes.into_boxed_slice(),
        };

        let n_size = config.node_budget;
        let v_size = config.vector_budget;
        let protect_limit = crate::protect::PROTECT_STACK_SIZE;
        let hash_precious = config.hash_precious;
        let mut heap = Self {
            pages: vec![Some(permanent_page)],
            free_pages: Vec::new(),
            free: Default::default(),
            pages_by_class: Default::default(),
            alloc_count: [0; NUM_SMALL_CLASSES],
            lists,
            old_count: [[0; NUM_OLD_GENERATIONS]; NUM_NODE_CLASSES],
            node_count: 0,
            vec_units_in_use: 0,
            n_size,
            v_size,
            protect: Vec::with_capacity(256),
            protect_limit,
            preserve: PreserveList::new(hash_precious),
            weak_refs: Value::NIL,
            symbols: IndexMap::new(),
            char_cache: FxHashMap::default(),
            permanents: Vec::new(),
            globals: Globals::default(),
            native_finalizers: FxHashMap::default(),
            finalizer_hook: None,
            finalizing: false,
            config,
            gc: GcState::new(),
            warnings: Vec::new(),
        };
        heap.init_globals()?;
        Ok(heap)
    }

    /// Create a heap configured from the process environment.
    pub fn from_env() -> Result<Self> {
        let mut heap = Self::new(GcConfig::from_env())?;
        if let Some((gap, wait)) = GcConfig::torture_from_env() {
            let inhibit = heap.config.inhibit_page_release;
            heap.set_gc_torture(gap, wait, inhibit);
        }
        Ok(heap)
    }

    fn init_globals(&mut self) -> Result<()> {
        let na = self.alloc_char_uncached(b"NA", gp::NA_STRING | gp::ASCII)?;
        self.make_permanent(na);
        self.globals.na_string = na;

        let blank = self.mk_char("")?;
        self.make_permanent(blank);
        self.globals.blank_string = blank;

        // The unbound marker is its own value; it must exist before any
        // ordinary symbol can be installed.
        let unbound = self.alloc_raw_symbol(blank)?;
        self.set_sym_value_raw(unbound, unbound);
        self.make_permanent(unbound);
        self.globals.unbound_value = unbound;

        let missing = self.alloc_raw_symbol(blank)?;
        self.set_sym_value_raw(missing, missing);
        self.make_permanent(missing);
        self.globals.missing_arg = missing;

        self.globals.placeholder = self.install("_")?;
        self.globals.pipe_bind = self.install("=>")?;

        let t = self.scalar_logical(1)?;
        self.make_permanent(t);
        self.globals.true_value = t;
        let f = self.scalar_logical(0)?;
        self.make_permanent(f);
        self.globals.false_value = f;
        let na = self.scalar_logical(crate::object::NA_LOGICAL)?;
        self.make_permanent(na);
        self.globals.logical_na = na;
        Ok(())
    }

    fn make_permanent(&mut self, v: Value) {
        self.node_mut(v).header.refcnt = REFCNT_DISABLED;
        self.permanents.push(v);
    }

    /// The never-collected globals.
    #[inline]
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Active configuration.
    #[inline]
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    // === Node access =======================================================

    #[inline]
    pub(crate) fn node(&self, v: Value) -> &Node {
        match &self.pages[v.page()] {
            Some(p) => &p.nodes[v.slot()],
            None => panic!("heap handle {:?} addresses a released page", v),
        }
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, v: Value) -> &mut Node {
        match &mut self.pages[v.page()] {
            Some(p) => &mut p.nodes[v.slot()],
            None => panic!("heap handle {:?} addresses a released page", v),
        }
    }

    /// Kind tag of a cell.
    #[inline]
    pub fn kind(&self, v: Value) -> Kind {
        self.node(v).header.kind()
    }

    /// Vector length (0 for non-vectors, per the original's LENGTH).
    pub fn length(&self, v: Value) -> usize {
        match &self.node(v).data {
            NodeData::Vector(p) => p.data.len(),
            _ => 0,
        }
    }

    /// Allocated ("true") length of a vector.
    pub fn true_length(&self, v: Value) -> usize {
        match &self.node(v).data {
            NodeData::Vector(p) => p.true_length,
            _ => 0,
        }
    }

    fn kind_panic(&self, v: Value, op: &str) -> ! {
        panic!("{} applied to a {} cell", op, self.kind(v).name())
    }

    // === Budget checks and node acquisition ================================

    /// Run the collector if the budgets (or torture mode) demand it before
    /// an allocation of `units` vector units.
    pub(crate) fn maybe_gc(&mut self, units: usize) -> Result<()> {
        let mut force = false;
        if self.gc.torture_gap > 0 && !self.gc.in_gc && !self.finalizing {
            if self.gc.torture_wait > 0 {
                self.gc.torture_wait -= 1;
            } else {
                self.gc.torture_counter += 1;
                if self.gc.torture_counter >= self.gc.torture_gap {
                    self.gc.torture_counter = 0;
                    force = true;
                }
            }
        }
        let node_short = self.node_count >= self.n_size;
        let vec_short = units > 0 && self.vec_units_in_use + units > self.v_size;
        if force || node_short || vec_short {
            self.run_gc(units)?;
        }
        Ok(())
    }

    fn next_page_index(&mut self) -> usize {
        if let Some(id) = self.free_pages.pop() {
            id
        } else {
            self.pages.push(None);
            self.pages.len() - 1
        }
    }

    /// Pop a free node of `class`, requesting a new page only when the
    /// class's free list is empty.
    pub(crate) fn acquire_node(&mut self, class: usize) -> Value {
        if let Some(v) = self.free[class].pop() {
            return v;
        }
        let id = self.next_page_index();
        let page = Page::new(class, id);
        let count = page.nodes.len();
        self.pages[id] = Some(page);
        self.pages_by_class[class].push(id);
        self.alloc_count[class] += count;
        for slot in (0..count).rev() {
            self.free[class].push(Value::new(id, slot));
        }
        self.free[class]
            .pop()
            .expect("freshly carved page has free slots")
    }

    /// A large or custom cell gets a page of its own so the sweep can hand
    /// the memory straight back.
    pub(crate) fn acquire_solo_node(&mut self, class: usize) -> Value {
        let id = self.next_page_index();
        self.pages[id] = Some(Page::new(class, id));
        Value::new(id, 0)
    }

    pub(crate) fn release_solo_page(&mut self, v: Value) {
        debug_assert_eq!(v.slot(), 0);
        let id = v.page();
        self.pages[id] = None;
        self.free_pages.push(id);
    }

    pub(crate) fn init_node(&mut self, v: Value, kind: Kind, data: NodeData) -> Value {
        let class = self.node(v).header.class();
        {
            let node = self.node_mut(v);
            let mut header = Header::new(kind, class);
            header.prev = v;
            header.next = v;
            node.header = header;
            node.data = data;
        }
        let list = self.lists.new_list[class];
        self.snap(v, list);
        self.node_count += 1;
        v
    }

    // === Allocation entry points ===========================================

    /// Allocate a cons cell with Nil tag.
    ///
    /// May trigger a collection: `car` and `cdr` must be rooted by the
    /// caller before the call.
    pub fn alloc_cons(&mut self, car: Value, cdr: Value) -> Result<Value> {
        self.maybe_gc(0)?;
        let v = self.acquire_node(0);
        self.init_node(v, Kind::Cons, NodeData::Cons {
            car,
            cdr,
            tag: Value::NIL,
        });
        if self.config.track_refcounts {
            self.incr_refcnt(car);
            self.incr_refcnt(cdr);
        }
        Ok(v)
    }

    /// Allocate a call (language) cell; layout is a cons with a `Lang` tag.
    pub fn alloc_lang(&mut self, car: Value, cdr: Value) -> Result<Value> {
        let v = self.alloc_cons(car, cdr)?;
        self.node_mut(v).header.set_kind(Kind::Lang);
        Ok(v)
    }

    /// Allocate a pairlist of `n` cons cells, cars and tags Nil.
    pub fn alloc_pairlist(&mut self, n: usize) -> Result<Value> {
        let mut result = Value::NIL;
        for _ in 0..n {
            // the list built so far is reachable through the free chain only
            // via `result`, so protect it across the allocation
            self.protect(result)?;
            let cell = self.alloc_cons(Value::NIL, result);
            self.unprotect(1)?;
            result = cell?;
        }
        Ok(result)
    }

    /// Allocate an environment cell.
    pub fn alloc_env(&mut self, frame: Value, enclos: Value) -> Result<Value> {
        self.maybe_gc(0)?;
        let v = self.acquire_node(0);
        self.init_node(v, Kind::Env, NodeData::Env {
            frame,
            enclos,
            hashtab: Value::NIL,
        });
        if self.config.track_refcounts {
            self.incr_refcnt(frame);
            self.incr_refcnt(enclos);
        }
        Ok(v)
    }

    /// Allocate an unforced promise.
    pub fn alloc_promise(&mut self, code: Value, env: Value) -> Result<Value> {
        self.maybe_gc(0)?;
        let unbound = self.globals.unbound_value;
        let v = self.acquire_node(0);
        self.init_node(v, Kind::Promise, NodeData::Promise {
            code,
            env,
            value: unbound,
        });
        if self.config.track_refcounts {
            self.incr_refcnt(code);
            self.incr_refcnt(env);
        }
        Ok(v)
    }

    /// Allocate a closure.
    pub fn alloc_closure(&mut self, formals: Value, body: Value, env: Value) -> Result<Value> {
        self.maybe_gc(0)?;
        let v = self.acquire_node(0);
        self.init_node(v, Kind::Closure, NodeData::Closure { formals, body, env });
        if self.config.track_refcounts {
            self.incr_refcnt(formals);
            self.incr_refcnt(body);
            self.incr_refcnt(env);
        }
        Ok(v)
    }

    /// Allocate an external pointer.
    pub fn alloc_ext_ptr(&mut self, addr: usize, prot: Value, tag: Value) -> Result<Value> {
        self.maybe_gc(0)?;
        let v = self.acquire_node(0);
        self.init_node(v, Kind::ExtPtr, NodeData::ExtPtr { addr, prot, tag });
        if self.config.track_refcounts {
            self.incr_refcnt(prot);
            self.incr_refcnt(tag);
        }
        Ok(v)
    }

    /// Allocate a reference to a native primitive by table offset.
    pub fn alloc_builtin(&mut self, offset: u32, special: bool) -> Result<Value> {
        self.maybe_gc(0)?;
        let kind = if special { Kind::Special } else { Kind::Builtin };
        let v = self.acquire_node(0);
        self.init_node(v, kind, NodeData::Builtin { offset });
        Ok(v)
    }

    pub(crate) fn alloc_raw_symbol(&mut self, pname: Value) -> Result<Value> {
        self.maybe_gc(0)?;
        let value = self.globals.unbound_value;
        let v = self.acquire_node(0);
        self.init_node(v, Kind::Symbol, NodeData::Symbol {
            pname,
            value,
            internal: Value::NIL,
        });
        Ok(v)
    }

    fn vector_fill(&self, kind: Kind, length: usize) -> VectorData {
        match kind {
            Kind::Logical => VectorData::Logical(vec![0; length]),
            Kind::Int => VectorData::Int(vec![0; length]),
            Kind::Real => VectorData::Real(vec![0.0; length]),
            Kind::Cplx => VectorData::Cplx(vec![Complex::default(); length]),
            Kind::Raw => VectorData::Raw(vec![0; length]),
            Kind::Str => VectorData::Str(vec![self.globals.blank_string; length]),
            Kind::List => VectorData::List(vec![Value::NIL; length]),
            Kind::Expr => VectorData::Expr(vec![Value::NIL; length]),
            _ => unreachable!("vector_fill on non-vector kind"),
        }
    }

    /// Allocate a vector of `kind` and `length`.
    ///
    /// Selects the smallest size class covering the payload, or the large
    /// class. Zero-length list and expression vectors are Nil. `Char` cells
    /// cannot be allocated directly; use [`Heap::mk_char`].
    ///
    /// # Errors
    /// - `SizeExceedsLimit` when `length` exceeds the configured maximum
    /// - `OutOfMemory` / `HeapExhausted` when a full collection cannot free
    ///   enough budget
    pub fn alloc_vector(&mut self, kind: Kind, length: usize) -> Result<Value> {
        if !kind.is_vector() || kind == Kind::Char {
            return Err(GcError::InvalidArgument(format!(
                "cannot allocate a vector of kind {}",
                kind.name()
            )));
        }
        if matches!(kind, Kind::List | Kind::Expr) && length == 0 {
            return Ok(Value::NIL);
        }
        if length > self.config.max_vector_length {
            return Err(GcError::SizeExceedsLimit {
                length,
                limit: self.config.max_vector_length,
            });
        }
        let units = vec_units(kind, length);
        let class = class_for_units(units);
        self.maybe_gc(units)?;
        let v = if class < NUM_SMALL_CLASSES {
            self.acquire_node(class)
        } else {
            self.acquire_solo_node(LARGE_CLASS)
        };
        let data = self.vector_fill(kind, length);
        self.vec_units_in_use += units;
        self.init_node(v, kind, NodeData::Vector(VectorPayload {
            true_length: length,
            units,
            data,
        }));
        Ok(v)
    }

    pub(crate) fn alloc_char_uncached(&mut self, bytes: &[u8], gp_bits: u16) -> Result<Value> {
        let units = vec_units(Kind::Char, bytes.len());
        let class = class_for_units(units);
        self.maybe_gc(units)?;
        let v = if class < NUM_SMALL_CLASSES {
            self.acquire_node(class)
        } else {
            self.acquire_solo_node(LARGE_CLASS)
        };
        self.vec_units_in_use += units;
        self.init_node(v, Kind::Char, NodeData::Vector(VectorPayload {
            true_length: bytes.len(),
            units,
            data: VectorData::Char(bytes.to_vec()),
        }));
        self.node_mut(v).header.gp_set(gp_bits);
        Ok(v)
    }

    /// Grow or shrink a vector in place.
    ///
    /// Growth zero-fills (Nil/blank for pointer payloads); shrinking keeps
    /// the allocated length as `true_length`.
    pub fn set_vector_length(&mut self, v: Value, length: usize) -> Result<()> {
        if length > self.config.max_vector_length {
            return Err(GcError::SizeExceedsLimit {
                length,
                limit: self.config.max_vector_length,
            });
        }
        let kind = self.kind(v);
        if !kind.is_vector() || kind == Kind::Char {
            return Err(GcError::InvalidArgument(format!(
                "cannot resize a {} cell",
                kind.name()
            )));
        }
        let new_units = vec_units(kind, length);
        let blank = self.globals.blank_string;
        let node = self.node_mut(v);
        let payload = match &mut node.data {
            NodeData::Vector(p) => p,
            _ => unreachable!("vector kind without vector payload"),
        };
        let old_units = payload.units;
        match &mut payload.data {
            VectorData::Logical(d) | VectorData::Int(d) => d.resize(length, 0),
            VectorData::Real(d) => d.resize(length, 0.0),
            VectorData::Cplx(d) => d.resize(length, Complex::default()),
            VectorData::Raw(d) | VectorData::Char(d) => d.resize(length, 0),
            VectorData::Str(d) => d.resize(length, blank),
            VectorData::List(d) | VectorData::Expr(d) => d.resize(length, Value::NIL),
        }
        payload.true_length = payload.true_length.max(length);
        payload.units = new_units;
        self.vec_units_in_use = self.vec_units_in_use + new_units - old_units;
        Ok(())
    }

    // === Scalar helpers ====================================================

    /// One-element logical vector.
    pub fn scalar_logical(&mut self, x: i32) -> Result<Value> {
        let v = self.alloc_vector(Kind::Logical, 1)?;
        self.logical_data_mut(v)[0] = x;
        Ok(v)
    }

    /// One-element integer vector.
    pub fn scalar_int(&mut self, x: i32) -> Result<Value> {
        let v = self.alloc_vector(Kind::Int, 1)?;
        self.int_data_mut(v)[0] = x;
        Ok(v)
    }

    /// One-element double vector.
    pub fn scalar_real(&mut self, x: f64) -> Result<Value> {
        let v = self.alloc_vector(Kind::Real, 1)?;
        self.real_data_mut(v)[0] = x;
        Ok(v)
    }

    /// One-element complex vector.
    pub fn scalar_cplx(&mut self, x: Complex) -> Result<Value> {
        let v = self.alloc_vector(Kind::Cplx, 1)?;
        self.cplx_data_mut(v)[0] = x;
        Ok(v)
    }

    // === List-like accessors ===============================================

    /// Head of a cons/call cell (Nil for Nil, as the original's CAR(NULL)).
    pub fn car(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Cons { car, .. } => *car,
            NodeData::Empty => Value::NIL,
            _ => self.kind_panic(v, "car"),
        }
    }

    /// Tail of a cons/call cell.
    pub fn cdr(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Cons { cdr, .. } => *cdr,
            NodeData::Empty => Value::NIL,
            _ => self.kind_panic(v, "cdr"),
        }
    }

    /// Tag of a cons/call cell.
    pub fn tag(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Cons { tag, .. } => *tag,
            NodeData::Empty => Value::NIL,
            _ => self.kind_panic(v, "tag"),
        }
    }

    /// nth cdr convenience.
    pub fn nth_cdr(&self, mut v: Value, n: usize) -> Value {
        for _ in 0..n {
            v = self.cdr(v);
        }
        v
    }

    /// Pairlist length.
    pub fn list_length(&self, mut v: Value) -> usize {
        let mut n = 0;
        while !v.is_nil() {
            n += 1;
            v = self.cdr(v);
        }
        n
    }

    // === Symbol accessors ==================================================

    /// Print-name (a Char cell) of a symbol.
    pub fn sym_pname(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Symbol { pname, .. } => *pname,
            _ => self.kind_panic(v, "sym_pname"),
        }
    }

    /// Global value slot of a symbol.
    pub fn sym_value(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Symbol { value, .. } => *value,
            _ => self.kind_panic(v, "sym_value"),
        }
    }

    /// Internal slot of a symbol.
    pub fn sym_internal(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Symbol { internal, .. } => *internal,
            _ => self.kind_panic(v, "sym_internal"),
        }
    }

    // === Environment / promise / closure accessors =========================

    pub fn env_frame(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Env { frame, .. } => *frame,
            _ => self.kind_panic(v, "env_frame"),
        }
    }

    pub fn env_enclos(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Env { enclos, .. } => *enclos,
            _ => self.kind_panic(v, "env_enclos"),
        }
    }

    pub fn env_hashtab(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Env { hashtab, .. } => *hashtab,
            _ => self.kind_panic(v, "env_hashtab"),
        }
    }

    pub fn promise_code(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Promise { code, .. } => *code,
            _ => self.kind_panic(v, "promise_code"),
        }
    }

    pub fn promise_env(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Promise { env, .. } => *env,
            _ => self.kind_panic(v, "promise_env"),
        }
    }

    pub fn promise_value(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Promise { value, .. } => *value,
            _ => self.kind_panic(v, "promise_value"),
        }
    }

    pub fn closure_formals(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Closure { formals, .. } => *formals,
            _ => self.kind_panic(v, "closure_formals"),
        }
    }

    pub fn closure_body(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Closure { body, .. } => *body,
            _ => self.kind_panic(v, "closure_body"),
        }
    }

    pub fn closure_env(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::Closure { env, .. } => *env,
            _ => self.kind_panic(v, "closure_env"),
        }
    }

    pub fn ext_ptr_addr(&self, v: Value) -> usize {
        match &self.node(v).data {
            NodeData::ExtPtr { addr, .. } => *addr,
            _ => self.kind_panic(v, "ext_ptr_addr"),
        }
    }

    pub fn ext_ptr_prot(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::ExtPtr { prot, .. } => *prot,
            _ => self.kind_panic(v, "ext_ptr_prot"),
        }
    }

    pub fn ext_ptr_tag(&self, v: Value) -> Value {
        match &self.node(v).data {
            NodeData::ExtPtr { tag, .. } => *tag,
            _ => self.kind_panic(v, "ext_ptr_tag"),
        }
    }

    // === Vector accessors ==================================================

    /// Element of a list/expression vector.
    pub fn elt(&self, v: Value, i: usize) -> Value {
        match &self.node(v).data {
            NodeData::Vector(p) => match &p.data {
                VectorData::List(d) | VectorData::Expr(d) => d[i],
                _ => self.kind_panic(v, "elt"),
            },
            _ => self.kind_panic(v, "elt"),
        }
    }

    /// Element (a Char cell) of a string vector.
    pub fn str_elt(&self, v: Value, i: usize) -> Value {
        match &self.node(v).data {
            NodeData::Vector(p) => match &p.data {
                VectorData::Str(d) => d[i],
                _ => self.kind_panic(v, "str_elt"),
            },
            _ => self.kind_panic(v, "str_elt"),
        }
    }

    /// Bytes of a Char cell.
    pub fn char_bytes(&self, v: Value) -> &[u8] {
        match &self.node(v).data {
            NodeData::Vector(p) => match &p.data {
                VectorData::Char(d) => d,
                _ => self.kind_panic(v, "char_bytes"),
            },
            _ => self.kind_panic(v, "char_bytes"),
        }
    }

    /// Text of a Char cell (the heap only stores valid UTF-8 or declared
    /// byte strings; lossy conversion covers the latter in diagnostics).
    pub fn char_text(&self, v: Value) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.char_bytes(v))
    }

    /// Print-name text of a symbol.
    pub fn symbol_name(&self, v: Value) -> std::borrow::Cow<'_, str> {
        self.char_text(self.sym_pname(v))
    }

    // === Attribute plumbing ================================================

    /// The whole attribute pairlist.
    pub fn attrib(&self, v: Value) -> Value {
        self.node(v).header.attrib
    }

    /// True when the cell carries a class attribute.
    pub fn is_object(&self, v: Value) -> bool {
        self.node(v).header.is_object()
    }

    /// Look up one attribute by tag symbol.
    pub fn get_attrib(&self, v: Value, name: Value) -> Value {
        let mut a = self.attrib(v);
        while !a.is_nil() {
            if self.tag(a) == name {
                return self.car(a);
            }
            a = self.cdr(a);
        }
        Value::NIL
    }

    /// Set (or with Nil, remove) one attribute by tag symbol.
    ///
    /// Maintains the object bit when the `class` attribute changes. The
    /// value and `v` must be rooted: attribute surgery allocates.
    pub fn set_attrib(&mut self, v: Value, name: Value, value: Value) -> Result<()> {
        if v.is_nil() {
            return Err(GcError::InvalidArgument(
                "attempt to set an attribute on Nil".to_string(),
            ));
        }
        let class_sym = self.install("class")?;
        if value.is_nil() {
            // remove
            let mut prev = Value::NIL;
            let mut a = self.attrib(v);
            while !a.is_nil() {
                let next = self.cdr(a);
                if self.tag(a) == name {
                    if prev.is_nil() {
                        self.set_attrib_list(v, next);
                    } else {
                        self.set_cdr(prev, next);
                    }
                } else {
                    prev = a;
                }
                a = next;
            }
            if name == class_sym {
                self.node_mut(v).header.set_object(false);
            }
            return Ok(());
        }
        let mut a = self.attrib(v);
        while !a.is_nil() {
            if self.tag(a) == name {
                self.set_car(a, value);
                return Ok(());
            }
            a = self.cdr(a);
        }
        let old = self.attrib(v);
        let cell = self.alloc_cons(value, old)?;
        self.set_tag(cell, name);
        self.set_attrib_list(v, cell);
        if name == class_sym {
            self.node_mut(v).header.set_object(true);
        }
        Ok(())
    }

    /// Convenience: set the `names` attribute.
    pub fn set_names(&mut self, v: Value, names: Value) -> Result<()> {
        let sym = self.install("names")?;
        self.set_attrib(v, sym, names)
    }

    // === Setters (write barrier + refcount) ================================

    pub(crate) fn fix_refcnt(&mut self, old: Value, new: Value) {
        if !self.config.track_refcounts || old == new {
            return;
        }
        self.incr_refcnt(new);
        self.decr_refcnt(old);
    }

    pub(crate) fn incr_refcnt(&mut self, v: Value) {
        if v.is_nil() {
            return;
        }
        let h = &mut self.node_mut(v).header;
        if h.refcnt < REFCNT_MAX {
            h.refcnt += 1;
        }
    }

    pub(crate) fn decr_refcnt(&mut self, v: Value) {
        if v.is_nil() {
            return;
        }
        let h = &mut self.node_mut(v).header;
        if h.refcnt > 0 && h.refcnt < REFCNT_MAX {
            h.refcnt -= 1;
        }
    }

    /// Opt a cell out of reference counting permanently.
    pub fn disable_refcnt(&mut self, v: Value) {
        if !v.is_nil() {
            self.node_mut(v).header.refcnt = REFCNT_DISABLED;
        }
    }

    /// Sound one-sided uniqueness predicate: true only when the cell is
    /// provably unshared.
    pub fn no_references(&self, v: Value) -> bool {
        if v.is_nil() {
            return false;
        }
        let r = self.node(v).header.refcnt;
        self.config.track_refcounts && r == 0
    }

    /// True when the value may be referenced from more than one place.
    pub fn maybe_shared(&self, v: Value) -> bool {
        if v.is_nil() {
            return true;
        }
        let r = self.node(v).header.refcnt;
        !self.config.track_refcounts || r > 1
    }

    #[inline]
    pub(crate) fn is_older(&self, a: Value, b: Value) -> bool {
        if a.is_nil() {
            return false;
        }
        let ha = &self.node(a).header;
        if !ha.is_old() {
            return false;
        }
        if b.is_nil() {
            return false;
        }
        let hb = &self.node(b).header;
        !hb.is_old() || ha.generation() > hb.generation()
    }

    /// Old-to-new registration: every store of `child` into a slot of
    /// `parent` goes through here before the next collection can run.
    pub(crate) fn write_barrier(&mut self, parent: Value, child: Value) {
        if self.is_older(parent, child) {
            let (class, gen) = {
                let h = &self.node(parent).header;
                (h.class(), h.generation())
            };
            let list = self.lists.old_to_new[class][gen];
            self.unsnap(parent);
            self.snap(parent, list);
        }
    }

    pub fn set_car(&mut self, cell: Value, v: Value) {
        let old = match &mut self.node_mut(cell).data {
            NodeData::Cons { car, .. } => std::mem::replace(car, v),
            _ => panic!("set_car applied to a non-pair cell"),
        };
        self.write_barrier(cell, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_cdr(&mut self, cell: Value, v: Value) {
        let old = match &mut self.node_mut(cell).data {
            NodeData::Cons { cdr, .. } => std::mem::replace(cdr, v),
            _ => panic!("set_cdr applied to a non-pair cell"),
        };
        self.write_barrier(cell, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_tag(&mut self, cell: Value, v: Value) {
        let old = match &mut self.node_mut(cell).data {
            NodeData::Cons { tag, .. } => std::mem::replace(tag, v),
            _ => panic!("set_tag applied to a non-pair cell"),
        };
        self.write_barrier(cell, v);
        self.fix_refcnt(old, v);
    }

    /// Replace the whole attribute list (low-level; prefer
    /// [`Heap::set_attrib`]).
    pub fn set_attrib_list(&mut self, cell: Value, attrs: Value) {
        let old = std::mem::replace(&mut self.node_mut(cell).header.attrib, attrs);
        self.write_barrier(cell, attrs);
        self.fix_refcnt(old, attrs);
    }

    pub fn set_sym_value(&mut self, sym: Value, v: Value) {
        let old = match &mut self.node_mut(sym).data {
            NodeData::Symbol { value, .. } => std::mem::replace(value, v),
            _ => panic!("set_sym_value applied to the wrong cell kind"),
        };
        self.write_barrier(sym, v);
        self.fix_refcnt(old, v);
    }

    fn set_sym_value_raw(&mut self, sym: Value, v: Value) {
        match &mut self.node_mut(sym).data {
            NodeData::Symbol { value, .. } => *value = v,
            _ => panic!("set_sym_value applied to a non-symbol cell"),
        }
    }

    pub fn set_sym_internal(&mut self, sym: Value, v: Value) {
        let old = match &mut self.node_mut(sym).data {
            NodeData::Symbol { internal, .. } => std::mem::replace(internal, v),
            _ => panic!("set_sym_internal applied to the wrong cell kind"),
        };
        self.write_barrier(sym, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_frame(&mut self, env: Value, v: Value) {
        let old = match &mut self.node_mut(env).data {
            NodeData::Env { frame, .. } => std::mem::replace(frame, v),
            _ => panic!("set_frame applied to the wrong cell kind"),
        };
        self.write_barrier(env, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_enclos(&mut self, env: Value, v: Value) {
        let old = match &mut self.node_mut(env).data {
            NodeData::Env { enclos, .. } => std::mem::replace(enclos, v),
            _ => panic!("set_enclos applied to the wrong cell kind"),
        };
        self.write_barrier(env, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_hashtab(&mut self, env: Value, v: Value) {
        let old = match &mut self.node_mut(env).data {
            NodeData::Env { hashtab, .. } => std::mem::replace(hashtab, v),
            _ => panic!("set_hashtab applied to the wrong cell kind"),
        };
        self.write_barrier(env, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_prvalue(&mut self, prom: Value, v: Value) {
        let old = match &mut self.node_mut(prom).data {
            NodeData::Promise { value, .. } => std::mem::replace(value, v),
            _ => panic!("set_prvalue applied to the wrong cell kind"),
        };
        self.write_barrier(prom, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_prcode(&mut self, prom: Value, v: Value) {
        let old = match &mut self.node_mut(prom).data {
            NodeData::Promise { code, .. } => std::mem::replace(code, v),
            _ => panic!("set_prcode applied to the wrong cell kind"),
        };
        self.write_barrier(prom, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_prenv(&mut self, prom: Value, v: Value) {
        let old = match &mut self.node_mut(prom).data {
            NodeData::Promise { env, .. } => std::mem::replace(env, v),
            _ => panic!("set_prenv applied to the wrong cell kind"),
        };
        self.write_barrier(prom, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_formals(&mut self, clo: Value, v: Value) {
        let old = match &mut self.node_mut(clo).data {
            NodeData::Closure { formals, .. } => std::mem::replace(formals, v),
            _ => panic!("set_formals applied to the wrong cell kind"),
        };
        self.write_barrier(clo, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_body(&mut self, clo: Value, v: Value) {
        let old = match &mut self.node_mut(clo).data {
            NodeData::Closure { body, .. } => std::mem::replace(body, v),
            _ => panic!("set_body applied to the wrong cell kind"),
        };
        self.write_barrier(clo, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_cloenv(&mut self, clo: Value, v: Value) {
        let old = match &mut self.node_mut(clo).data {
            NodeData::Closure { env, .. } => std::mem::replace(env, v),
            _ => panic!("set_cloenv applied to the wrong cell kind"),
        };
        self.write_barrier(clo, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_ext_ptr_prot(&mut self, p: Value, v: Value) {
        let old = match &mut self.node_mut(p).data {
            NodeData::ExtPtr { prot, .. } => std::mem::replace(prot, v),
            _ => panic!("set_ext_ptr_prot applied to the wrong cell kind"),
        };
        self.write_barrier(p, v);
        self.fix_refcnt(old, v);
    }

    pub fn set_ext_ptr_tag(&mut self, p: Value, v: Value) {
        let old = match &mut self.node_mut(p).data {
            NodeData::ExtPtr { tag, .. } => std::mem::replace(tag, v),
            _ => panic!("set_ext_ptr_tag applied to the wrong cell kind"),
        };
        self.write_barrier(p, v);
        self.fix_refcnt(old, v);
    }

    /// Store into a list/expression vector slot.
    pub fn set_elt(&mut self, vec: Value, i: usize, v: Value) {
        let old = match &mut self.node_mut(vec).data {
            NodeData::Vector(p) => match &mut p.data {
                VectorData::List(d) | VectorData::Expr(d) => std::mem::replace(&mut d[i], v),
                _ => panic!("set_elt applied to the wrong vector kind"),
            },
            _ => panic!("set_elt applied to a non-vector cell"),
        };
        self.write_barrier(vec, v);
        self.fix_refcnt(old, v);
    }

    /// Store a Char cell into a string vector slot.
    pub fn set_str_elt(&mut self, vec: Value, i: usize, v: Value) {
        debug_assert!(v.is_nil() || self.kind(v) == Kind::Char);
        let old = match &mut self.node_mut(vec).data {
            NodeData::Vector(p) => match &mut p.data {
                VectorData::Str(d) => std::mem::replace(&mut d[i], v),
                _ => panic!("set_str_elt applied to the wrong vector kind"),
            },
            _ => panic!("set_str_elt applied to a non-string vector"),
        };
        self.write_barrier(vec, v);
        self.fix_refcnt(old, v);
    }

    // === Warnings buffer ===================================================

    /// Queue a warning for delivery at the next safe point.
    pub fn defer_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Drain the deferred warnings.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

// Slice accessors share a shape; a macro keeps them honest.
macro_rules! slice_accessors {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        impl Heap {
            /// Read-only payload slice.
            pub fn $get(&self, v: Value) -> &[$ty] {
                match &self.node(v).data {
                    NodeData::Vector(p) => match &p.data {
                        VectorData::$variant(d) => d,
                        _ => self.kind_panic(v, stringify!($get)),
                    },
                    _ => self.kind_panic(v, stringify!($get)),
                }
            }

            /// Mutable payload slice (no heap handles inside, so no barrier).
            pub fn $get_mut(&mut self, v: Value) -> &mut [$ty] {
                match &mut self.pages[v.page()]
                    .as_mut()
                    .expect("heap handle addresses a released page")
                    .nodes[v.slot()]
                    .data
                {
                    NodeData::Vector(p) => match &mut p.data {
                        VectorData::$variant(d) => d,
                        _ => panic!(concat!(stringify!($get_mut), " applied to wrong vector kind")),
                    },
                    _ => panic!(concat!(stringify!($get_mut), " applied to a non-vector")),
                }
            }
        }
    };
}

slice_accessors!(logical_data, logical_data_mut, Logical, i32);
slice_accessors!(int_data, int_data_mut, Int, i32);
slice_accessors!(real_data, real_data_mut, Real, f64);
slice_accessors!(cplx_data, cplx_data_mut, Cplx, Complex);
slice_accessors!(raw_data, raw_data_mut, Raw, u8);
