//! The tree type with search, insertion, deletion and rebalancing.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::error::{TreeError, TreeResult};
use crate::node::{Link, Node, NodeKind, NodePtr, NodeRef, Side};

mod join;

pub use join::Split;

/// An ordered dictionary implemented with an AVL tree.
///
/// Besides the usual lookups it supports finger search and insertion starting
/// at the greatest key, and joining and splitting whole trees.
///
/// ```
/// use avl_finger::AvlTree;
/// let mut tree = AvlTree::new();
/// tree.insert(1, "one").unwrap();
/// tree.insert(2, "two").unwrap();
/// tree.finger_insert(3, "three").unwrap();
/// assert_eq!(tree.get(&2), Some(&"two"));
/// assert_eq!(tree.max_node().map(|node| *node.key()), Some(3));
/// let (_, value) = tree.delete(&2).unwrap();
/// assert_eq!(value, "two");
/// ```
pub struct AvlTree<K, V> {
    root: Link<K, V>,
    max_node: Link<K, V>,
    num_nodes: usize,
    marker: PhantomData<Box<Node<K, V>>>,
}

/// Outcome of an insertion.
#[derive(Debug)]
pub struct Inserted<'a, K, V> {
    /// The freshly inserted node.
    pub node: NodeRef<'a, K, V>,
    /// Edges walked from the starting node down to the new node, before rebalancing.
    pub edges: usize,
    /// Number of nodes whose height changed while rebalancing.
    pub promotions: usize,
}

/// An iterator over the entries of a tree in ascending key order.
pub struct Iter<'a, K, V> {
    next: Link<K, V>,
    remaining: usize,
    marker: PhantomData<&'a Node<K, V>>,
}

enum Direction {
    FromParent,
    FromLeft,
    FromRight,
}

impl<K, V> AvlTree<K, V> {
    /// Creates an empty tree.
    /// No memory is allocated until the first entry is inserted.
    pub fn new() -> Self {
        Self {
            root: None,
            max_node: None,
            num_nodes: 0,
            marker: PhantomData,
        }
    }

    /// Returns true if the tree contains no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of entries in the tree.
    pub fn len(&self) -> usize {
        self.num_nodes
    }

    /// Returns the height of the tree, -1 if it is empty.
    pub fn height(&self) -> isize {
        Node::height(self.root)
    }

    /// Returns the root node.
    pub fn root(&self) -> Option<NodeRef<'_, K, V>> {
        self.root.map(NodeRef::new)
    }

    /// Returns the node holding the greatest key. Takes constant time.
    pub fn max_node(&self) -> Option<NodeRef<'_, K, V>> {
        self.max_node.map(NodeRef::new)
    }

    /// Returns the node holding the smallest key.
    pub fn min_node(&self) -> Option<NodeRef<'_, K, V>> {
        self.root.map(|root_ptr| NodeRef::new(Node::leftmost(root_ptr)))
    }

    /// Clears the tree, deallocating all memory.
    pub fn clear(&mut self) {
        self.postorder(|node_ptr| unsafe {
            Node::destroy(node_ptr);
        });
        self.root = None;
        self.max_node = None;
        self.num_nodes = 0;
    }

    /// Gets an iterator over the entries of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            next: self.root.map(Node::leftmost),
            remaining: self.num_nodes,
            marker: PhantomData,
        }
    }

    /// Collects all entries in ascending key order.
    pub fn to_vec(&self) -> Vec<(&K, &V)> {
        self.iter().collect()
    }

    /// Wraps a detached subtree into a tree of its own.
    fn from_root(root: Link<K, V>) -> Self {
        if let Some(root_ptr) = root {
            Node::set_parent(root_ptr, None);
        }
        Self {
            root,
            max_node: root.map(Node::rightmost),
            num_nodes: Node::weight(root),
            marker: PhantomData,
        }
    }

    /// Puts `new` into the slot of `parent` that held `old`, or makes it the root.
    fn replace_child(&mut self, parent: Link<K, V>, old: NodePtr<K, V>, new: Link<K, V>) {
        match parent {
            None => {
                if let Some(new_ptr) = new {
                    Node::set_parent(new_ptr, None);
                }
                self.root = new;
            }
            Some(parent_ptr) => {
                let side = Node::side_of(parent_ptr, old);
                Node::attach(parent_ptr, side, new);
            }
        }
    }

    /// Rotates the subtree at `node_ptr` towards `dir`.
    /// The child on the opposite side takes over the position of `node_ptr`.
    fn rotate(&mut self, node_ptr: NodePtr<K, V>, dir: Side) {
        let Some(pivot_ptr) = Node::child(node_ptr, dir.opposite()) else {
            return;
        };
        trace!(?dir, "rotate");
        let parent = Node::parent(node_ptr);
        Node::attach(node_ptr, dir.opposite(), Node::child(pivot_ptr, dir));
        Node::attach(pivot_ptr, dir, Some(node_ptr));
        self.replace_child(parent, node_ptr, Some(pivot_ptr));
    }

    /// Restores the AVL condition at `node_ptr` if its balance factor is +2 or -2.
    /// An inner child balance factor of 0 takes the single rotation.
    /// Returns whether a rotation took place.
    fn rebalance_node(&mut self, node_ptr: NodePtr<K, V>) -> bool {
        let balance = Node::balance_factor(Some(node_ptr));
        let heavy = if balance > 1 {
            Side::Left
        } else if balance < -1 {
            Side::Right
        } else {
            return false;
        };
        debug_assert!(balance.abs() == 2);
        if let Some(child_ptr) = Node::child(node_ptr, heavy) {
            if Node::leans(child_ptr) == Some(heavy.opposite()) {
                self.rotate(child_ptr, heavy);
            }
        }
        self.rotate(node_ptr, heavy.opposite());
        true
    }

    /// Walks from `start_from` up to the root, rotating where needed and
    /// refreshing cached heights on the way.
    /// Returns the number of nodes whose height changed outside of rotations.
    fn rebalance(&mut self, start_from: Link<K, V>) -> usize {
        let mut promotions = 0;
        let mut current = start_from;
        while let Some(node_ptr) = current {
            if !self.rebalance_node(node_ptr) && Node::update_height(node_ptr) {
                promotions += 1;
            }
            current = Node::parent(node_ptr);
        }
        promotions
    }

    /// Unlinks `node_ptr` from the tree without freeing it.
    /// Returns the lowest node whose subtree changed.
    fn unlink_node(&mut self, node_ptr: NodePtr<K, V>) -> Link<K, V> {
        let parent = Node::parent(node_ptr);
        match Node::classify(Some(node_ptr)) {
            NodeKind::Absent => None,
            NodeKind::Leaf => {
                self.replace_child(parent, node_ptr, None);
                parent
            }
            NodeKind::UnaryLeft => {
                self.replace_child(parent, node_ptr, Node::child(node_ptr, Side::Left));
                parent
            }
            NodeKind::UnaryRight => {
                self.replace_child(parent, node_ptr, Node::child(node_ptr, Side::Right));
                parent
            }
            NodeKind::Root | NodeKind::Internal => {
                // Two children, so the successor is the leftmost node of the right subtree
                let Some(successor_ptr) = Node::successor(node_ptr) else {
                    return parent;
                };
                let successor_parent_ptr = Node::parent(successor_ptr).unwrap_or(node_ptr);

                // Successor has no left child, its right child takes its place
                let side = Node::side_of(successor_parent_ptr, successor_ptr);
                Node::attach(
                    successor_parent_ptr,
                    side,
                    Node::child(successor_ptr, Side::Right),
                );

                // Successor takes over both children of the unlinked node
                Node::attach(successor_ptr, Side::Left, Node::child(node_ptr, Side::Left));
                Node::attach(successor_ptr, Side::Right, Node::child(node_ptr, Side::Right));
                self.replace_child(parent, node_ptr, Some(successor_ptr));

                if successor_parent_ptr == node_ptr {
                    Some(successor_ptr)
                } else {
                    Some(successor_parent_ptr)
                }
            }
        }
    }

    fn postorder<F: FnMut(NodePtr<K, V>)>(&self, f: F) {
        self.traverse(|_| {}, f);
    }

    fn traverse<Pre, Post>(&self, mut preorder: Pre, mut postorder: Post)
    where
        Pre: FnMut(NodePtr<K, V>),
        Post: FnMut(NodePtr<K, V>),
    {
        if let Some(mut node_ptr) = self.root {
            let mut dir = Direction::FromParent;
            loop {
                match dir {
                    Direction::FromParent => {
                        preorder(node_ptr);
                        if let Some(left_ptr) = Node::child(node_ptr, Side::Left) {
                            node_ptr = left_ptr;
                        } else {
                            dir = Direction::FromLeft;
                        }
                    }
                    Direction::FromLeft => {
                        if let Some(right_ptr) = Node::child(node_ptr, Side::Right) {
                            node_ptr = right_ptr;
                            dir = Direction::FromParent;
                        } else {
                            dir = Direction::FromRight;
                        }
                    }
                    Direction::FromRight => {
                        // Post order traversal is used for node deletion,
                        // so make sure not to use node pointer after postorder call.
                        if let Some(parent_ptr) = Node::parent(node_ptr) {
                            if Node::child(parent_ptr, Side::Left) == Some(node_ptr) {
                                dir = Direction::FromLeft;
                            } else {
                                dir = Direction::FromRight;
                            }
                            postorder(node_ptr);
                            node_ptr = parent_ptr;
                        } else {
                            postorder(node_ptr);
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Searches for `key` starting at the root.
    ///
    /// Returns the node, if found, and the number of edges walked
    /// (plus one when the key was found).
    ///
    /// The key may be any borrowed form of the tree's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    pub fn search<Q>(&self, key: &Q) -> (Option<NodeRef<'_, K, V>>, usize)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (found, edges) = Self::search_from(self.root, key);
        (found.map(NodeRef::new), edges)
    }

    /// Searches for `key` starting at the node with the greatest key.
    ///
    /// Climbs from the maximum to the nearest ancestor whose key is not smaller
    /// than `key`, then descends from there. The edge count includes the climb.
    /// Cheap when `key` ranks close to the maximum.
    pub fn finger_search<Q>(&self, key: &Q) -> (Option<NodeRef<'_, K, V>>, usize)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some((finger_ptr, climbed)) = self.climb_from_max(key) else {
            return (None, 0);
        };
        let (found, edges) = Self::search_from(Some(finger_ptr), key);
        (found.map(NodeRef::new), edges + climbed)
    }

    /// Returns a reference to the value corresponding to the key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Self::search_from(self.root, key)
            .0
            .map(|node_ptr| &unsafe { &*node_ptr.as_ptr() }.value)
    }

    /// Returns true if the tree contains the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Self::search_from(self.root, key).0.is_some()
    }

    /// Inserts a key-value pair, searching for its position from the root.
    ///
    /// Fails with [`TreeError::KeyAlreadyExists`] if the key is present,
    /// leaving the tree unchanged.
    pub fn insert(&mut self, key: K, value: V) -> TreeResult<Inserted<'_, K, V>> {
        self.insert_below(self.root, 0, key, value)
    }

    /// Inserts a key-value pair, searching for its position from the node with the greatest key.
    ///
    /// The reported edge count includes the climb from the maximum.
    pub fn finger_insert(&mut self, key: K, value: V) -> TreeResult<Inserted<'_, K, V>> {
        let finger = self.climb_from_max(&key);
        match finger {
            None => self.insert_below(self.root, 0, key, value),
            Some((finger_ptr, climbed)) => self.insert_below(Some(finger_ptr), climbed, key, value),
        }
    }

    /// Removes the node holding `key` and returns its entry.
    ///
    /// Fails with [`TreeError::NodeNotInTree`] if the key is absent.
    pub fn delete<Q>(&mut self, key: &Q) -> TreeResult<(K, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node_ptr = Self::search_from(self.root, key)
            .0
            .ok_or(TreeError::NodeNotInTree)?;
        debug_assert!(self.num_nodes >= 1);
        let rebalance_from = self.unlink_node(node_ptr);
        self.rebalance(rebalance_from);
        self.num_nodes -= 1;
        if self.max_node == Some(node_ptr) {
            self.max_node = self.root.map(Node::rightmost);
        }
        Ok(unsafe { Node::destroy(node_ptr) })
    }

    /// Asserts that the internal tree structure is consistent.
    #[cfg(any(test, feature = "consistency_check"))]
    pub fn check_consistency(&self) {
        // Check root link
        if let Some(root_ptr) = self.root {
            assert!(Node::parent(root_ptr).is_none());
        }

        // Check tree nodes
        let mut num_nodes = 0;
        self.traverse(
            |node_ptr| {
                let key = &unsafe { node_ptr.as_ref() }.key;
                let left = Node::child(node_ptr, Side::Left);
                let right = Node::child(node_ptr, Side::Right);

                // Check link for left child node
                if let Some(left_ptr) = left {
                    assert!(Node::parent(left_ptr) == Some(node_ptr));
                    assert!(unsafe { &left_ptr.as_ref().key } < key);
                }

                // Check link for right child node
                if let Some(right_ptr) = right {
                    assert!(Node::parent(right_ptr) == Some(node_ptr));
                    assert!(unsafe { &right_ptr.as_ref().key } > key);
                }

                // Check cached height and weight
                let left_height = Node::height(left);
                let right_height = Node::height(right);
                assert_eq!(
                    Node::height(Some(node_ptr)),
                    left_height.max(right_height) + 1
                );
                assert_eq!(
                    Node::weight(Some(node_ptr)),
                    Node::weight(left) + Node::weight(right) + 1
                );

                // Check AVL condition (nearly balance)
                assert!((left_height - right_height).abs() <= 1);

                num_nodes += 1;
            },
            |_| {},
        );

        // Check number of nodes
        assert_eq!(num_nodes, self.num_nodes);
        assert_eq!(Node::weight(self.root), self.num_nodes);

        // Check cached maximum
        assert!(self.max_node == self.root.map(Node::rightmost));

        // Check in-order sequence
        let mut iter = self.iter();
        if let Some(mut prev) = iter.next() {
            for curr in iter {
                assert!(prev.0 < curr.0);
                prev = curr;
            }
        }
    }

    fn search_from<Q>(start_from: Link<K, V>, key: &Q) -> (Link<K, V>, usize)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = start_from;
        let mut edges = 0;
        while let Some(node_ptr) = current {
            current = match key.cmp(unsafe { node_ptr.as_ref() }.key.borrow()) {
                Ordering::Equal => return (current, edges + 1),
                Ordering::Less => Node::child(node_ptr, Side::Left),
                Ordering::Greater => Node::child(node_ptr, Side::Right),
            };
            edges += 1;
        }
        (None, edges)
    }

    /// Climbs from the maximum while `key` is not greater than the parent key.
    /// Returns the node to start descending from and the number of edges climbed.
    fn climb_from_max<Q>(&self, key: &Q) -> Option<(NodePtr<K, V>, usize)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut finger_ptr = self.max_node?;
        let mut climbed = 0;
        while let Some(parent_ptr) = Node::parent(finger_ptr) {
            let parent_key: &Q = unsafe { parent_ptr.as_ref() }.key.borrow();
            if key > parent_key {
                break;
            }
            finger_ptr = parent_ptr;
            climbed += 1;
        }
        Some((finger_ptr, climbed))
    }

    /// Inserts a new leaf into the subtree rooted at `start_from` and rebalances up to the root.
    fn insert_below(
        &mut self,
        start_from: Link<K, V>,
        edges_before: usize,
        key: K,
        value: V,
    ) -> TreeResult<Inserted<'_, K, V>> {
        let mut parent: Option<(NodePtr<K, V>, Side)> = None;
        let mut current = start_from;
        let mut edges = edges_before;
        while let Some(node_ptr) = current {
            let side = match key.cmp(&unsafe { node_ptr.as_ref() }.key) {
                Ordering::Equal => return Err(TreeError::KeyAlreadyExists),
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
            };
            parent = Some((node_ptr, side));
            current = Node::child(node_ptr, side);
            edges += 1;
        }

        let node_ptr = Node::create(key, value);
        let promotions = match parent {
            None => {
                debug_assert!(self.root.is_none());
                self.root = Some(node_ptr);
                0
            }
            Some((parent_ptr, side)) => {
                let parent_height = Node::height(Some(parent_ptr));
                Node::attach(parent_ptr, side, Some(node_ptr));
                let promoted = Node::height(Some(parent_ptr)) != parent_height;
                usize::from(promoted) + self.rebalance(Node::parent(parent_ptr))
            }
        };

        let is_new_max = match self.max_node {
            None => true,
            Some(max_ptr) => unsafe { node_ptr.as_ref().key > max_ptr.as_ref().key },
        };
        if is_new_max {
            self.max_node = Some(node_ptr);
        }
        self.num_nodes += 1;

        Ok(Inserted {
            node: NodeRef::new(node_ptr),
            edges,
            promotions,
        })
    }
}

impl<K, V> Drop for AvlTree<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V> Default for AvlTree<K, V> {
    /// Creates an empty tree.
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTree<K, V> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> IntoIterator for &'a AvlTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// Shared access only reads; every mutation takes `&mut self`.
unsafe impl<K: Send, V: Send> Send for AvlTree<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for AvlTree<K, V> {}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node_ptr = self.next?;
        self.next = Node::successor(node_ptr);
        self.remaining -= 1;
        let node = unsafe { &*node_ptr.as_ptr() };
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
