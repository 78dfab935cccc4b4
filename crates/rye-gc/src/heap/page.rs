//! Page management - size classes and node pages.
//!
//! Small cells are carved out of fixed-size pages, one size class per page.
//! A class's payload capacity is measured in 8-byte vector units; class 0
//! holds the non-vector kinds, classes 1..=5 hold small vectors, class 6 is
//! custom-allocated and class 7 ("large") gives each vector its own page so
//! the sweep can return its memory directly.

use crate::object::{Header, Kind, Node, NodeData, Value, MAX_NODES_PER_PAGE};

/// Bytes per page before the page header is subtracted.
pub const BASE_PAGE_SIZE: usize = 8000;

/// Nominal page-header footprint subtracted from [`BASE_PAGE_SIZE`].
pub const PAGE_HEADER_BYTES: usize = 48;

/// Bytes per vector unit.
pub const VEC_UNIT_BYTES: usize = 8;

/// Nominal per-node footprint (header plus non-vector payload) used when
/// carving a page into slots.
pub const NODE_BASE_BYTES: usize = 56;

/// Total node classes: 0 non-vector, 1..=5 small vector, 6 custom, 7 large.
pub const NUM_NODE_CLASSES: usize = 8;

/// Classes allocated from shared pages.
pub const NUM_SMALL_CLASSES: usize = 6;

/// Class served by a caller-provided allocator.
pub const CUSTOM_CLASS: usize = 6;

/// Class for vectors too big for any small class.
pub const LARGE_CLASS: usize = 7;

/// Number of old generations.
pub const NUM_OLD_GENERATIONS: usize = 2;

/// Payload capacity of each small class, in vector units.
pub const CLASS_UNITS: [usize; NUM_SMALL_CLASSES] = [0, 8, 16, 32, 64, 128];

/// Number of node slots a page of the given class holds.
pub fn nodes_per_page(class: usize) -> usize {
    if class >= NUM_SMALL_CLASSES {
        return 1;
    }
    let node_bytes = NODE_BASE_BYTES + CLASS_UNITS[class] * VEC_UNIT_BYTES;
    ((BASE_PAGE_SIZE - PAGE_HEADER_BYTES) / node_bytes).clamp(1, MAX_NODES_PER_PAGE)
}

/// Smallest class whose capacity covers `units`, or [`LARGE_CLASS`].
pub fn class_for_units(units: usize) -> usize {
    for class in 1..NUM_SMALL_CLASSES {
        if units <= CLASS_UNITS[class] {
            return class;
        }
    }
    LARGE_CLASS
}

/// Payload size of a vector in vector units.
pub fn vec_units(kind: Kind, length: usize) -> usize {
    let bytes = match kind {
        Kind::Logical | Kind::Int => length * 4,
        Kind::Real | Kind::Str | Kind::List | Kind::Expr => length * 8,
        Kind::Cplx => length * 16,
        Kind::Raw | Kind::Char => length,
        _ => 0,
    };
    bytes.div_ceil(VEC_UNIT_BYTES)
}

/// One page: a run of node slots of a single class.
pub(crate) struct Page {
    pub class: usize,
    pub nodes: Box<[Node]>,
}

impl Page {
    /// Create a page of `class` at page-table index `page_index`, all slots
    /// free and self-linked.
    pub fn new(class: usize, page_index: usize) -> Self {
        let count = nodes_per_page(class);
        let nodes = (0..count)
            .map(|slot| {
                let mut header = Header::new(Kind::Free, class);
                let this = Value::new(page_index, slot);
                header.prev = this;
                header.next = this;
                Node {
                    header,
                    data: NodeData::Free,
                }
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { class, nodes }
    }

    /// True when every slot is on a free list, i.e. the page can be released.
    pub fn is_empty(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| matches!(n.data, NodeData::Free))
    }
}
