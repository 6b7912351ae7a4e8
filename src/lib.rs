//! An ordered dictionary implemented with an AVL tree.
//!
//! Besides search, insertion and deletion the tree offers
//! - finger search and finger insertion, which start at the node with the
//!   greatest key instead of the root and are cheap for keys ranking close
//!   to the maximum,
//! - join, which merges two key-disjoint trees around a separator entry in
//!   time proportional to their height difference,
//! - split, which partitions a tree around one of its keys in logarithmic time.
//!
//! Search and insertion report the number of edges walked, and insertion
//! also reports how many nodes changed height while rebalancing.
//!
//! ```
//! use avl_finger::AvlTree;
//! let mut tree = AvlTree::new();
//! for key in [5, 3, 8, 1, 4, 7, 9] {
//!     tree.insert(key, key * 10).unwrap();
//! }
//! let (node, edges) = tree.search(&4);
//! assert_eq!(node.map(|node| *node.value()), Some(40));
//! assert_eq!(edges, 3);
//!
//! let split = tree.split(&5).unwrap();
//! assert_eq!(split.left.len(), 3);
//! assert_eq!(split.separator, (5, 50));
//! assert_eq!(split.right.len(), 3);
//! ```

mod error;
mod node;
mod tree;

pub use error::{TreeError, TreeResult};
pub use node::{NodeKind, NodeRef};
pub use tree::{AvlTree, Inserted, Iter, Split};
