use std::collections::HashMap;
use std::sync::Arc;

/// One immutable trie node. The value slot is the "has value" tag: interior
/// nodes created only as path filler carry None.
struct TrieNode<V> {
    children: HashMap<u8, Arc<TrieNode<V>>>,
    value: Option<Arc<V>>,
}

/// A persistent copy-on-write trie keyed by strings.
///
/// Every node is immutable once built. `put` and `remove` return a new trie
/// that shares all nodes except the root-to-target path, so clones are O(1)
/// and old versions stay valid and readable forever. Values only need to be
/// owned once - they are never cloned, so non-`Clone` value types work.
pub struct Trie<V> {
    root: Option<Arc<TrieNode<V>>>,
}

impl<V> Trie<V> {
    /// An empty trie.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Looks up a key. The empty key addresses the root.
    pub fn get(&self, key: &str) -> Option<&V> {
        let mut node = self.root.as_ref()?;
        for byte in key.bytes() {
            node = node.children.get(&byte)?;
        }
        node.value.as_deref()
    }

    /// Returns a new trie with `key` bound to `value`, replacing any
    /// previous binding. Only the nodes along the key's path are rebuilt.
    pub fn put(&self, key: &str, value: V) -> Trie<V> {
        let root = Self::put_into(self.root.as_deref(), key.as_bytes(), Arc::new(value));
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    fn put_into(node: Option<&TrieNode<V>>, key: &[u8], value: Arc<V>) -> TrieNode<V> {
        let children = node.map(|n| n.children.clone()).unwrap_or_default();

        if key.is_empty() {
            return TrieNode {
                children,
                value: Some(value),
            };
        }

        let mut children = children;
        let child = node.and_then(|n| n.children.get(&key[0])).map(|child| &**child);
        let new_child = Self::put_into(child, &key[1..], value);
        children.insert(key[0], Arc::new(new_child));

        TrieNode {
            children,
            value: node.and_then(|n| n.value.clone()),
        }
    }

    /// Returns a new trie without `key`. Nodes left with no value and no
    /// children are pruned bottom-up. Removing an absent key yields a trie
    /// sharing every node with this one.
    pub fn remove(&self, key: &str) -> Trie<V> {
        let Some(root) = self.root.as_ref() else {
            return Trie::new();
        };

        match Self::remove_from(root, key.as_bytes()) {
            None => self.clone(),
            Some(Some(root)) => Trie {
                root: Some(Arc::new(root)),
            },
            Some(None) => Trie::new(),
        }
    }

    /// Outer None: the key is not bound (nothing to change). Inner None:
    /// the rebuilt node became dead and was pruned.
    fn remove_from(node: &TrieNode<V>, key: &[u8]) -> Option<Option<TrieNode<V>>> {
        if key.is_empty() {
            node.value.as_ref()?;
            if node.children.is_empty() {
                return Some(None);
            }
            return Some(Some(TrieNode {
                children: node.children.clone(),
                value: None,
            }));
        }

        let child = node.children.get(&key[0])?;
        match Self::remove_from(child, &key[1..])? {
            Some(new_child) => {
                let mut children = node.children.clone();
                children.insert(key[0], Arc::new(new_child));
                Some(Some(TrieNode {
                    children,
                    value: node.value.clone(),
                }))
            }
            None => {
                let mut children = node.children.clone();
                children.remove(&key[0]);
                if children.is_empty() && node.value.is_none() {
                    Some(None)
                } else {
                    Some(Some(TrieNode {
                        children,
                        value: node.value.clone(),
                    }))
                }
            }
        }
    }
}

impl<V> Clone for Trie<V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<V> Default for Trie<V> {
    fn default() -> Self {
        Self::new()
    }
}
