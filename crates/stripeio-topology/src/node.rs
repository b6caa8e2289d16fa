//! Node grouping and the registry's total shard ordering

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::disk::Disk;

/// One host grouping an ordered set of disks
///
/// The position of a disk in the vector is its stable `disk_order`.
#[derive(Clone)]
pub struct Node {
    id: String,
    disks: Vec<Arc<dyn Disk>>,
}

impl Node {
    /// Create a node from its ordered disks
    pub fn new(id: impl Into<String>, disks: Vec<Arc<dyn Disk>>) -> Self {
        Self {
            id: id.into(),
            disks,
        }
    }

    /// Node identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Disks in `disk_order`
    #[must_use]
    pub fn disks(&self) -> &[Arc<dyn Disk>] {
        &self.disks
    }
}

/// One shard-bearing slot in `(node_slice, disk_order)` total order
///
/// The slot's position in the registry enumeration is the shard index the
/// placement planner assigns to its disk.
#[derive(Clone)]
pub struct ShardSlot {
    /// Sequential index of the node within the registry's ordering
    pub node_slice: usize,
    /// Stable index of the disk within its node
    pub disk_order: usize,
    /// The disk itself
    pub disk: Arc<dyn Disk>,
}

/// Ordered mapping from node id to node
///
/// Iteration order over node ids is lexicographic and gives each node its
/// `node_slice`. The map is read-only once a bucket has been built over it.
#[derive(Clone, Default)]
pub struct NodeMap {
    nodes: BTreeMap<String, Node>,
}

impl NodeMap {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node
    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id().to_string(), node);
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the registry holds no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total disk count across all nodes
    #[must_use]
    pub fn total_disks(&self) -> usize {
        self.nodes.values().map(|n| n.disks().len()).sum()
    }

    /// Enumerate every disk as a `ShardSlot`, in total
    /// `(node_slice, disk_order)` order
    #[must_use]
    pub fn shard_slots(&self) -> Vec<ShardSlot> {
        let mut slots = Vec::with_capacity(self.total_disks());
        for (node_slice, node) in self.nodes.values().enumerate() {
            for (disk_order, disk) in node.disks().iter().enumerate() {
                slots.push(ShardSlot {
                    node_slice,
                    disk_order,
                    disk: Arc::clone(disk),
                });
            }
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemDisk;

    fn node(id: &str, disks: usize) -> Node {
        let disks: Vec<Arc<dyn Disk>> = (0..disks)
            .map(|i| Arc::new(MemDisk::new(format!("{id}-{i}"))) as Arc<dyn Disk>)
            .collect();
        Node::new(id, disks)
    }

    #[test]
    fn test_slot_ordering_is_total_and_stable() {
        let mut nodes = NodeMap::new();
        nodes.insert(node("node-b", 2));
        nodes.insert(node("node-a", 3));

        assert_eq!(nodes.total_disks(), 5);
        let slots = nodes.shard_slots();
        let order: Vec<(usize, usize)> =
            slots.iter().map(|s| (s.node_slice, s.disk_order)).collect();
        // node-a sorts first regardless of insertion order
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1)]);
        assert_eq!(slots[0].disk.id(), "node-a-0");
        assert_eq!(slots[3].disk.id(), "node-b-0");
    }

    #[test]
    fn test_empty_registry() {
        let nodes = NodeMap::new();
        assert!(nodes.is_empty());
        assert_eq!(nodes.total_disks(), 0);
        assert!(nodes.shard_slots().is_empty());
    }
}
