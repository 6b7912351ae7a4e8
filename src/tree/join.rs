//! Joining two trees around a separator and splitting a tree at a key.

use std::borrow::Borrow;
use std::mem;

use tracing::debug;

use super::AvlTree;
use crate::error::{TreeError, TreeResult};
use crate::node::{Link, Node, NodePtr, Side};

/// The two halves of a split tree together with the separating entry.
#[derive(Debug)]
pub struct Split<K, V> {
    /// All entries with keys less than the separator.
    pub left: AvlTree<K, V>,
    /// The entry the tree was split at.
    pub separator: (K, V),
    /// All entries with keys greater than the separator.
    pub right: AvlTree<K, V>,
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Merges `other` into `self` around a new separator entry.
    ///
    /// All keys of one tree must be less than `key` and all keys of the other
    /// greater; either tree may hold the smaller keys. Afterwards `self` holds
    /// every entry of both trees plus the separator, and `other` is empty.
    /// Runs in time proportional to the height difference of the trees. The
    /// key order is checked against the cached maxima, and then against the
    /// minimum of the tree holding the greater keys, which walks down its left
    /// spine and adds that tree's height to the cost.
    ///
    /// If one of the trees is empty this is an insert of `key` into the other
    /// one, which does nothing if the key is already present.
    ///
    /// Fails with [`TreeError::InvalidJoinPrecondition`] if the keys are not
    /// ordered that way, leaving both trees untouched.
    ///
    /// ```
    /// use avl_finger::AvlTree;
    /// let mut low = AvlTree::new();
    /// low.insert(1, ()).unwrap();
    /// let mut high = AvlTree::new();
    /// high.insert(3, ()).unwrap();
    /// low.join(&mut high, 2, ()).unwrap();
    /// assert_eq!(low.len(), 3);
    /// assert!(high.is_empty());
    /// ```
    pub fn join(&mut self, other: &mut Self, key: K, value: V) -> TreeResult<()> {
        if self.is_empty() {
            mem::swap(self, other);
        }
        if other.is_empty() {
            return match self.insert(key, value) {
                Ok(_) | Err(TreeError::KeyAlreadyExists) => Ok(()),
                Err(err) => Err(err),
            };
        }

        let other_side = self.join_side(other, &key)?;
        let num_nodes = self.num_nodes + other.num_nodes + 1;
        let (left, right) = match other_side {
            Side::Left => (other.root, self.root),
            Side::Right => (self.root, other.root),
        };
        let max_node = match other_side {
            Side::Left => self.max_node,
            Side::Right => other.max_node,
        };
        let (left_height, right_height) = (Node::height(left), Node::height(right));

        other.root = None;
        other.max_node = None;
        other.num_nodes = 0;

        self.root = None;
        self.join_links(left, Node::create(key, value), right);
        self.max_node = max_node;
        self.num_nodes = num_nodes;

        debug!(
            left_height,
            right_height,
            height = self.height(),
            len = self.num_nodes,
            "joined trees"
        );
        Ok(())
    }

    /// Splits the tree at the node holding `key`.
    ///
    /// The node itself becomes the separator of the result, all smaller keys
    /// go to the left tree and all greater keys to the right one. `self` is
    /// left empty. Every ancestor of the node is joined into one of the halves,
    /// which adds up to logarithmic time.
    ///
    /// Fails with [`TreeError::NodeNotInTree`] if the key is absent, leaving
    /// the tree untouched.
    pub fn split<Q>(&mut self, key: &Q) -> TreeResult<Split<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node_ptr = Self::search_from(self.root, key)
            .0
            .ok_or(TreeError::NodeNotInTree)?;

        let mut left = Self::from_root(Node::child(node_ptr, Side::Left));
        let mut right = Self::from_root(Node::child(node_ptr, Side::Right));

        let mut current = node_ptr;
        let mut parent = Node::parent(node_ptr);
        while let Some(parent_ptr) = parent {
            parent = Node::parent(parent_ptr);
            let came_from = Node::side_of(parent_ptr, current);
            let sibling = Node::child(parent_ptr, came_from.opposite());
            if let Some(sibling_ptr) = sibling {
                Node::set_parent(sibling_ptr, None);
            }
            Node::reset(parent_ptr);
            match came_from {
                // Ancestor key is less than the split key
                Side::Right => {
                    let root = left.root.take();
                    left.join_links(sibling, parent_ptr, root);
                }
                Side::Left => {
                    let root = right.root.take();
                    right.join_links(root, parent_ptr, sibling);
                }
            }
            current = parent_ptr;
        }

        let left = Self::from_root(left.root.take());
        let right = Self::from_root(right.root.take());
        self.root = None;
        self.max_node = None;
        self.num_nodes = 0;

        debug!(
            left_len = left.len(),
            right_len = right.len(),
            "split tree"
        );
        let separator = unsafe { Node::destroy(node_ptr) };
        Ok(Split {
            left,
            separator,
            right,
        })
    }

    /// Returns on which side of the separator `other` belongs.
    /// Both trees must be non-empty.
    fn join_side(&self, other: &Self, key: &K) -> TreeResult<Side> {
        let (Some(self_max), Some(other_max)) = (self.max_node, other.max_node) else {
            return Err(TreeError::InvalidJoinPrecondition);
        };
        let self_max_key = unsafe { &self_max.as_ref().key };
        let other_max_key = unsafe { &other_max.as_ref().key };

        // The tree with the smaller maximum holds the smaller keys
        let (side, upper) = if self_max_key < key && key < other_max_key {
            (Side::Right, other)
        } else if other_max_key < key && key < self_max_key {
            (Side::Left, self)
        } else {
            return Err(TreeError::InvalidJoinPrecondition);
        };

        let upper_min_key = upper
            .root
            .map(|root_ptr| unsafe { &Node::leftmost(root_ptr).as_ref().key });
        match upper_min_key {
            Some(min_key) if min_key > key => Ok(side),
            _ => Err(TreeError::InvalidJoinPrecondition),
        }
    }
}

impl<K, V> AvlTree<K, V> {
    /// Makes `x_ptr` the separator between two subtrees and stores the
    /// rebalanced result as the root of `self`.
    ///
    /// Every key under `left` must be less than the key of `x_ptr` and every
    /// key under `right` greater. Both subtree roots and `x_ptr` must be
    /// detached, and `x_ptr` must have no children. Only the root link of
    /// `self` is written; the caller fixes up the cached maximum and size.
    fn join_links(&mut self, left: Link<K, V>, x_ptr: NodePtr<K, V>, right: Link<K, V>) {
        let (left_height, right_height) = (Node::height(left), Node::height(right));
        if (left_height - right_height).abs() <= 1 {
            Node::attach(x_ptr, Side::Left, left);
            Node::attach(x_ptr, Side::Right, right);
            self.root = Some(x_ptr);
            return;
        }

        // Descend the taller tree along the edge facing the shorter one
        let (taller, shorter, inner) = if left_height > right_height {
            (left, right, Side::Right)
        } else {
            (right, left, Side::Left)
        };
        let shorter_height = Node::height(shorter);
        self.root = taller;

        let mut parent = None;
        let mut current = taller;
        while Node::height(current) > shorter_height {
            let Some(node_ptr) = current else {
                break;
            };
            parent = current;
            current = Node::child(node_ptr, inner);
        }

        Node::attach(x_ptr, inner.opposite(), current);
        Node::attach(x_ptr, inner, shorter);
        if let Some(parent_ptr) = parent {
            Node::attach(parent_ptr, inner, Some(x_ptr));
        }
        self.rebalance(parent);
    }
}
