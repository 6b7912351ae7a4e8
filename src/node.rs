use std::cmp;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

pub(crate) type NodePtr<K, V> = NonNull<Node<K, V>>;

/// A child or parent slot. `None` is the absent node: height -1, no parent, no key.
pub(crate) type Link<K, V> = Option<NodePtr<K, V>>;

pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    parent: Link<K, V>,
    left: Link<K, V>,
    right: Link<K, V>,
    height: isize,
    weight: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

impl Side {
    pub(crate) fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Structural category of a node, used to pick the unlink strategy on deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The absent node standing in for an empty slot.
    Absent,
    /// A node without children.
    Leaf,
    /// A node with only a left child.
    UnaryLeft,
    /// A node with only a right child.
    UnaryRight,
    /// The root, having two children.
    Root,
    /// Any other node having two children.
    Internal,
}

impl<K, V> Node<K, V> {
    pub(crate) fn create(key: K, value: V) -> NodePtr<K, V> {
        let boxed = Box::new(Node {
            key,
            value,
            parent: None,
            left: None,
            right: None,
            height: 0,
            weight: 1,
        });
        unsafe { NodePtr::new_unchecked(Box::into_raw(boxed)) }
    }

    /// Frees the node and hands back its entry.
    ///
    /// # Safety
    /// The node must be unreachable from any tree and never used again.
    pub(crate) unsafe fn destroy(node_ptr: NodePtr<K, V>) -> (K, V) {
        let boxed = Box::from_raw(node_ptr.as_ptr());
        (boxed.key, boxed.value)
    }

    /// Turns a detached node back into a fresh leaf so it can serve as a join separator.
    pub(crate) fn reset(mut node_ptr: NodePtr<K, V>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.parent = None;
            node.left = None;
            node.right = None;
            node.height = 0;
            node.weight = 1;
        }
    }

    pub(crate) fn height(link: Link<K, V>) -> isize {
        match link {
            None => -1,
            Some(node_ptr) => unsafe { node_ptr.as_ref().height },
        }
    }

    pub(crate) fn weight(link: Link<K, V>) -> usize {
        match link {
            None => 0,
            Some(node_ptr) => unsafe { node_ptr.as_ref().weight },
        }
    }

    pub(crate) fn parent(node_ptr: NodePtr<K, V>) -> Link<K, V> {
        unsafe { node_ptr.as_ref().parent }
    }

    pub(crate) fn set_parent(mut node_ptr: NodePtr<K, V>, parent: Link<K, V>) {
        unsafe { node_ptr.as_mut().parent = parent };
    }

    pub(crate) fn child(node_ptr: NodePtr<K, V>, side: Side) -> Link<K, V> {
        unsafe {
            match side {
                Side::Left => node_ptr.as_ref().left,
                Side::Right => node_ptr.as_ref().right,
            }
        }
    }

    /// Returns on which side of `parent_ptr` the given child hangs.
    pub(crate) fn side_of(parent_ptr: NodePtr<K, V>, child_ptr: NodePtr<K, V>) -> Side {
        if Self::child(parent_ptr, Side::Left) == Some(child_ptr) {
            Side::Left
        } else {
            debug_assert!(Self::child(parent_ptr, Side::Right) == Some(child_ptr));
            Side::Right
        }
    }

    /// Recomputes cached height and weight from the children.
    /// Returns whether the height changed.
    pub(crate) fn update_height(mut node_ptr: NodePtr<K, V>) -> bool {
        unsafe {
            let node = node_ptr.as_mut();
            let height = cmp::max(Self::height(node.left), Self::height(node.right)) + 1;
            node.weight = Self::weight(node.left) + Self::weight(node.right) + 1;
            let changed = node.height != height;
            node.height = height;
            changed
        }
    }

    pub(crate) fn balance_factor(link: Link<K, V>) -> isize {
        match link {
            None => 0,
            Some(node_ptr) => {
                Self::height(Self::child(node_ptr, Side::Left))
                    - Self::height(Self::child(node_ptr, Side::Right))
            }
        }
    }

    /// Returns the side whose subtree is taller, if any.
    pub(crate) fn leans(node_ptr: NodePtr<K, V>) -> Option<Side> {
        match Self::balance_factor(Some(node_ptr)) {
            0 => None,
            balance if balance > 0 => Some(Side::Left),
            _ => Some(Side::Right),
        }
    }

    /// Hangs `child` into the given slot, fixes its back link and refreshes the cached height.
    /// All structural changes go through here.
    pub(crate) fn attach(mut node_ptr: NodePtr<K, V>, side: Side, child: Link<K, V>) {
        unsafe {
            match side {
                Side::Left => node_ptr.as_mut().left = child,
                Side::Right => node_ptr.as_mut().right = child,
            }
        }
        if let Some(child_ptr) = child {
            Self::set_parent(child_ptr, Some(node_ptr));
        }
        Self::update_height(node_ptr);
    }

    pub(crate) fn leftmost(mut node_ptr: NodePtr<K, V>) -> NodePtr<K, V> {
        while let Some(left_ptr) = Self::child(node_ptr, Side::Left) {
            node_ptr = left_ptr;
        }
        node_ptr
    }

    pub(crate) fn rightmost(mut node_ptr: NodePtr<K, V>) -> NodePtr<K, V> {
        while let Some(right_ptr) = Self::child(node_ptr, Side::Right) {
            node_ptr = right_ptr;
        }
        node_ptr
    }

    /// In-order successor, or the absent node if `node_ptr` holds the greatest key.
    pub(crate) fn successor(node_ptr: NodePtr<K, V>) -> Link<K, V> {
        if let Some(right_ptr) = Self::child(node_ptr, Side::Right) {
            return Some(Self::leftmost(right_ptr));
        }
        let mut current = node_ptr;
        while let Some(parent_ptr) = Self::parent(current) {
            if Self::child(parent_ptr, Side::Left) == Some(current) {
                return Some(parent_ptr);
            }
            current = parent_ptr;
        }
        None
    }

    pub(crate) fn classify(link: Link<K, V>) -> NodeKind {
        let Some(node_ptr) = link else {
            return NodeKind::Absent;
        };
        match (
            Self::child(node_ptr, Side::Left),
            Self::child(node_ptr, Side::Right),
        ) {
            (None, None) => NodeKind::Leaf,
            (Some(_), None) => NodeKind::UnaryLeft,
            (None, Some(_)) => NodeKind::UnaryRight,
            _ if Self::parent(node_ptr).is_none() => NodeKind::Root,
            _ => NodeKind::Internal,
        }
    }
}

/// A shared view of one node of an [`AvlTree`](crate::AvlTree).
///
/// Two views are equal when they denote the same node.
pub struct NodeRef<'a, K, V> {
    node_ptr: NodePtr<K, V>,
    marker: PhantomData<&'a Node<K, V>>,
}

impl<'a, K, V> NodeRef<'a, K, V> {
    pub(crate) fn new(node_ptr: NodePtr<K, V>) -> Self {
        Self {
            node_ptr,
            marker: PhantomData,
        }
    }

    fn wrap(link: Link<K, V>) -> Option<Self> {
        link.map(Self::new)
    }

    /// Key stored in this node.
    pub fn key(&self) -> &'a K {
        &unsafe { &*self.node_ptr.as_ptr() }.key
    }

    /// Value stored in this node.
    pub fn value(&self) -> &'a V {
        &unsafe { &*self.node_ptr.as_ptr() }.value
    }

    /// Height of the subtree rooted here; 0 for a leaf.
    pub fn height(&self) -> isize {
        Node::height(Some(self.node_ptr))
    }

    /// Height of the left subtree minus height of the right subtree.
    pub fn balance_factor(&self) -> isize {
        Node::balance_factor(Some(self.node_ptr))
    }

    /// Structural kind of this node, see [`NodeKind`].
    pub fn kind(&self) -> NodeKind {
        Node::classify(Some(self.node_ptr))
    }

    /// Parent node, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        Self::wrap(Node::parent(self.node_ptr))
    }

    /// Root of the left subtree.
    pub fn left(&self) -> Option<Self> {
        Self::wrap(Node::child(self.node_ptr, Side::Left))
    }

    /// Root of the right subtree.
    pub fn right(&self) -> Option<Self> {
        Self::wrap(Node::child(self.node_ptr, Side::Right))
    }

    /// Returns the node holding the next greater key.
    pub fn successor(&self) -> Option<Self> {
        Self::wrap(Node::successor(self.node_ptr))
    }
}

impl<K, V> Clone for NodeRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NodeRef<'_, K, V> {}

impl<K, V> PartialEq for NodeRef<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.node_ptr == other.node_ptr
    }
}

impl<K, V> Eq for NodeRef<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for NodeRef<'_, K, V> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("NodeRef")
            .field("key", self.key())
            .field("value", self.value())
            .field("height", &self.height())
            .finish()
    }
}
