//! Memory statistics and reporting.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::heap::page::VEC_UNIT_BYTES;
use crate::heap::Heap;
use crate::object::{Kind, NodeData, KIND_COUNT};

impl Heap {
    /// Count live cells by kind.
    ///
    /// The vector is indexed by the kind discriminant and always
    /// [`KIND_COUNT`] wide; free slots and list sentinels are excluded.
    pub fn memory_profile(&self) -> [usize; KIND_COUNT] {
        let mut counts = [0usize; KIND_COUNT];
        for page in self.pages.iter().flatten() {
            for node in page.nodes.iter() {
                let kind = node.header.kind();
                if matches!(kind, Kind::Free | Kind::New) {
                    continue;
                }
                counts[kind as usize] += 1;
            }
        }
        counts
    }

    /// Number of mapped pages (the permanent page included).
    pub fn page_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_some()).count()
    }

    /// Write a snapshot report of live allocations to `path`.
    ///
    /// Lists every live vector whose payload is at least `threshold_bytes`
    /// (one `bytes kind length` line each) followed by the per-kind cell
    /// counts.
    pub fn mem_report(
        &self,
        path: impl AsRef<Path>,
        append: bool,
        threshold_bytes: usize,
    ) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        writeln!(
            file,
            "# heap snapshot: {} nodes, {} vector units ({} collections)",
            self.node_count,
            self.vec_units_in_use,
            self.gc.gc_count
        )?;
        for page in self.pages.iter().flatten() {
            for node in page.nodes.iter() {
                if let NodeData::Vector(p) = &node.data {
                    let bytes = p.units * VEC_UNIT_BYTES;
                    if bytes >= threshold_bytes {
                        writeln!(
                            file,
                            "{} {} {}",
                            bytes,
                            node.header.kind().name(),
                            p.data.len()
                        )?;
                    }
                }
            }
        }
        let counts = self.memory_profile();
        for kind in Kind::ALL {
            if counts[kind as usize] > 0 {
                writeln!(file, "# {:12} {}", kind.name(), counts[kind as usize])?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{GcConfig, Heap, Kind, Value};

    fn heap() -> Heap {
        Heap::new(GcConfig::default()).expect("heap init")
    }

    #[test]
    fn test_memory_profile_counts_kinds() {
        let mut heap = heap();
        let before = heap.memory_profile();
        let _a = heap.alloc_cons(Value::NIL, Value::NIL).unwrap();
        let _b = heap.alloc_vector(Kind::Real, 10).unwrap();
        let after = heap.memory_profile();
        assert_eq!(after[Kind::Cons as usize], before[Kind::Cons as usize] + 1);
        assert_eq!(after[Kind::Real as usize], before[Kind::Real as usize] + 1);
        // the unique Nil is always visible
        assert_eq!(after[Kind::Nil as usize], 1);
    }

    #[test]
    fn test_mem_report_writes_large_vectors() {
        let mut heap = heap();
        let v = heap.alloc_vector(Kind::Real, 4096).unwrap();
        heap.protect(v).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.out");
        heap.mem_report(&path, false, 16 * 1024).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("double 4096"), "report was: {}", text);
        heap.unprotect(1).unwrap();
    }
}
