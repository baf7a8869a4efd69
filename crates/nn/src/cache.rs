//! Least-recently-used cache of NN outputs, keyed by descriptor.
//!
//! Descriptors are bit-stable by construction (integer encoders, quantized
//! sparsity), so keys compare element-wise on the f32 bit patterns and hash
//! with a fast content hash. The cache is not thread-safe on its own; the
//! cost model serializes access around it.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;

const NIL: usize = usize::MAX;

/// Content key: the descriptor's f32 bit patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorKey(Vec<u32>);

impl DescriptorKey {
    pub fn from_floats(descriptor: &[f32]) -> Self {
        DescriptorKey(descriptor.iter().map(|v| v.to_bits()).collect())
    }
}

impl Hash for DescriptorKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for v in &self.0 {
            state.write_u32(*v);
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    key: DescriptorKey,
    value: f32,
    prev: usize,
    next: usize,
}

/// Bounded LRU map from descriptor to post-NN scalar.
///
/// A capacity of zero disables caching entirely.
#[derive(Debug, Clone)]
pub struct LruCache {
    capacity: usize,
    map: FxHashMap<DescriptorKey, usize>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        LruCache {
            capacity,
            map: FxHashMap::default(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Look a key up; a hit promotes it to most-recently-used.
    pub fn get(&mut self, key: &DescriptorKey) -> Option<f32> {
        let idx = *self.map.get(key)?;
        self.detach(idx);
        self.push_front(idx);
        Some(self.nodes[idx].value)
    }

    /// Insert or refresh an entry, evicting the least-recently-used one
    /// when full.
    pub fn add(&mut self, key: DescriptorKey, value: f32) {
        if self.capacity == 0 {
            return;
        }
        if let Some(&idx) = self.map.get(&key) {
            self.nodes[idx].value = value;
            self.detach(idx);
            self.push_front(idx);
            return;
        }
        if self.map.len() == self.capacity {
            let lru = self.tail;
            debug_assert_ne!(lru, NIL);
            self.detach(lru);
            self.map.remove(&self.nodes[lru].key);
            self.free.push(lru);
        }
        let idx = match self.free.pop() {
            Some(i) => {
                self.nodes[i] = Node {
                    key: key.clone(),
                    value,
                    prev: NIL,
                    next: NIL,
                };
                i
            }
            None => {
                self.nodes.push(Node {
                    key: key.clone(),
                    value,
                    prev: NIL,
                    next: NIL,
                });
                self.nodes.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    /// Drop every entry. Observable results do not change; they are
    /// recomputed on the next miss.
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else if self.head == idx {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else if self.tail == idx {
            self.tail = prev;
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }
}
