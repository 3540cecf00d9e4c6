//! Node representation for [`crate::BTree`].
//!
//! A node owns its keys and, if internal, its children directly (`Box<Node<T>>`).
//! There are no parent pointers: every algorithm that needs parent context carries
//! it on the call stack instead, which is what lets destruction, search, insert and
//! delete all stay ordinary recursive functions over owned data.

/// A single B-tree node.
///
/// `keys.len()` is always `children.len() - 1` for an internal node, and `children`
/// is empty for a leaf. Both invariants are upheld by [`crate::BTree`]'s algorithms;
/// `Node` itself is a dumb container and does not check them.
#[derive(Debug)]
pub(crate) struct Node<T> {
    pub(crate) keys: Vec<T>,
    pub(crate) children: Vec<Box<Node<T>>>,
    leaf: bool,
}

impl<T> Node<T> {
    pub(crate) fn new_leaf() -> Self {
        Node {
            keys: Vec::new(),
            children: Vec::new(),
            leaf: true,
        }
    }

    pub(crate) fn new_internal() -> Self {
        Node {
            keys: Vec::new(),
            children: Vec::new(),
            leaf: false,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.leaf
    }
}

impl<T: Ord> Node<T> {
    /// First index `i` with `keys[i] >= key` ("lower bound").
    pub(crate) fn lower_bound(&self, key: &T) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// First index `i` with `keys[i] > key` ("upper bound"); used for leaf insertion
    /// and child-descent during insert so that a newly inserted key lands to the
    /// right of any existing occurrences of the same key.
    pub(crate) fn upper_bound(&self, key: &T) -> usize {
        self.keys.partition_point(|k| k <= key)
    }
}

impl<T> Node<T> {
    /// Leftmost key in the subtree rooted at `self`.
    pub(crate) fn min_key(&self) -> &T {
        let mut node = self;
        while let Some(child) = node.children.first() {
            node = child;
        }
        node.keys.first().expect("non-empty node on the min spine")
    }

    /// Rightmost key in the subtree rooted at `self`.
    pub(crate) fn max_key(&self) -> &T {
        let mut node = self;
        while let Some(child) = node.children.last() {
            node = child;
        }
        node.keys.last().expect("non-empty node on the max spine")
    }

    /// Number of nodes on any root-to-leaf path below and including `self`.
    pub(crate) fn height(&self) -> usize {
        let mut node = self;
        let mut height = 1;
        while let Some(child) = node.children.first() {
            node = child;
            height += 1;
        }
        height
    }

    /// In-order traversal, appending every key to `out`.
    pub(crate) fn collect_into(&self, out: &mut Vec<T>)
    where
        T: Clone,
    {
        if self.is_leaf() {
            out.extend(self.keys.iter().cloned());
        } else {
            for (i, key) in self.keys.iter().enumerate() {
                self.children[i].collect_into(out);
                out.push(key.clone());
            }
            self.children[self.keys.len()].collect_into(out);
        }
    }

    /// In-order traversal, calling `visit` on every key; stops and propagates the
    /// first error `visit` returns.
    pub(crate) fn for_each_inorder<F, E>(&self, visit: &mut F) -> Result<(), E>
    where
        F: FnMut(&T) -> Result<(), E>,
    {
        if self.is_leaf() {
            for key in &self.keys {
                visit(key)?;
            }
        } else {
            for (i, key) in self.keys.iter().enumerate() {
                self.children[i].for_each_inorder(visit)?;
                visit(key)?;
            }
            self.children[self.keys.len()].for_each_inorder(visit)?;
        }
        Ok(())
    }

    /// Recursively clones `self` and every descendant.
    pub(crate) fn deep_clone(&self) -> Self
    where
        T: Clone,
    {
        Node {
            keys: self.keys.clone(),
            children: self
                .children
                .iter()
                .map(|child| Box::new(child.deep_clone()))
                .collect(),
            leaf: self.leaf,
        }
    }
}
