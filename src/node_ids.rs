// ===========================================================================
// Node ID Allocator for boundary nodes created during overlay
// ===========================================================================

/// Network-wide sequence behind synthetic node ids (`<parent>:<seq>`).
///
/// The allocator is a plain value so an overlay can work on a copy and only
/// write it back once every split has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdAllocator {
    next_id: u64,
}

impl Default for NodeIdAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl NodeIdAllocator {
    pub fn new(start: u64) -> Self {
        Self { next_id: start }
    }

    /// Allocate the next id under `parent_id`.
    pub fn allocate(&mut self, parent_id: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("{}:{}", parent_id, id)
    }

    /// Get the current next_id value
    pub fn current(&self) -> u64 {
        self.next_id
    }
}
