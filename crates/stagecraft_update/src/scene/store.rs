//! Pooled node storage addressed by [`NodeId`].

use std::collections::HashMap;

use stagecraft_core::{FixedSizePool, PoolConfig, PoolKey};

use super::{Node, NodeId};

/// Nodes live in a [`FixedSizePool`]; ids map to pool keys.
pub struct NodeStore {
    pool: FixedSizePool<Node>,
    keys: HashMap<NodeId, PoolKey>,
}

impl NodeStore {
    /// An empty store.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            pool: FixedSizePool::new(config),
            keys: HashMap::new(),
        }
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Returns `true` if there are no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Adds a node, replacing any node with the same id.
    pub fn insert(&mut self, node: Node) -> PoolKey {
        let id = node.id();
        let key = self.pool.allocate(node);
        if let Some(previous) = self.keys.insert(id, key) {
            tracing::warn!(node = id.0, "node id reused, previous node dropped");
            self.pool.free(previous);
        }
        key
    }

    /// Removes a node.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let key = self.keys.remove(&id)?;
        self.pool.free(key)
    }

    /// Pool key of a node.
    #[must_use]
    pub fn key(&self, id: NodeId) -> Option<PoolKey> {
        self.keys.get(&id).copied()
    }

    /// Returns `true` if the node exists.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.keys.contains_key(&id)
    }

    /// Node by id.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.pool.get(*self.keys.get(&id)?)
    }

    /// Mutable node by id.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let key = *self.keys.get(&id)?;
        self.pool.get_mut(key)
    }

    /// Node by pool key.
    #[must_use]
    pub fn get_by_key(&self, key: PoolKey) -> Option<&Node> {
        self.pool.get(key)
    }

    /// Every node, in pool order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.pool.iter().map(|(_, node)| node)
    }

    /// Applies `f` to every node.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Node)) {
        for key in self.keys.values() {
            if let Some(node) = self.pool.get_mut(*key) {
                f(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeDesc;

    #[test]
    fn test_insert_get_remove() {
        let mut store = NodeStore::new(PoolConfig::default());
        let key = store.insert(Node::new(NodeId(4), NodeDesc::new()));
        assert_eq!(store.key(NodeId(4)), Some(key));
        assert_eq!(store.get(NodeId(4)).map(Node::id), Some(NodeId(4)));
        assert!(store.get_by_key(key).is_some());

        assert!(store.remove(NodeId(4)).is_some());
        assert!(store.get(NodeId(4)).is_none());
        assert!(store.get_by_key(key).is_none());
        assert!(store.remove(NodeId(4)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_reused_id_replaces_node() {
        let mut store = NodeStore::new(PoolConfig::default());
        store.insert(Node::new(NodeId(1), NodeDesc::new()));
        store.insert(Node::new(NodeId(1), NodeDesc::new()));
        assert_eq!(store.len(), 1);
    }
}
