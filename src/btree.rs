use crate::error::BTreeError;
use crate::iter::Iter;
use crate::node::Node;

/// A generic, const-fan-out B-tree with multiset semantics.
///
/// `ORDER` fixes the maximum fan-out of an internal node at compile time: every
/// node holds at most `ORDER - 1` keys (`MAX_KEYS`) and, except for the root,
/// at least `(ORDER - 1) / 2` keys (`MIN_KEYS`). `ORDER` must be at least 3;
/// `ORDER = 3` is supported (see [`Self::merge`]'s handling of the triple-merge
/// corner case) but gives the worst fan-out.
///
/// Duplicate keys are permitted: inserting a key already present adds another
/// occurrence rather than replacing it, and `size` tracks the total number of
/// occurrences across the whole tree, not the number of distinct keys.
#[derive(Debug)]
pub struct BTree<T, const ORDER: usize> {
    root: Option<Box<Node<T>>>,
    size: usize,
}

impl<T, const ORDER: usize> BTree<T, ORDER> {
    const MAX_KEYS: usize = ORDER - 1;
    const MIN_KEYS: usize = (ORDER - 1) / 2;

    /// Creates an empty tree.
    ///
    /// # Panics
    ///
    /// Panics if `ORDER < 3`, since a node with `MAX_KEYS < 2` cannot hold the
    /// promoted key produced by a split.
    #[must_use]
    pub fn new() -> Self {
        assert!(ORDER >= 3, "BTree ORDER must be at least 3");
        BTree {
            root: None,
            size: 0,
        }
    }

    /// Number of keys currently stored (counting duplicate occurrences).
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Idiomatic alias for [`Self::size`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    /// `true` iff the tree holds no keys.
    #[must_use]
    pub fn empty(&self) -> bool {
        self.root.is_none()
    }

    /// Idiomatic alias for [`Self::empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.empty()
    }

    /// Number of nodes on any root-to-leaf path; 0 for an empty tree, 1 for a
    /// single-node tree. All root-to-leaf paths have equal length, so any path
    /// gives the same answer.
    #[must_use]
    pub fn height(&self) -> usize {
        self.root.as_deref().map_or(0, Node::height)
    }

    /// Deallocates the entire tree and resets it to empty.
    pub fn clear(&mut self) {
        self.root = None;
        self.size = 0;
    }
}

impl<T, const ORDER: usize> Default for BTree<T, ORDER> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord, const ORDER: usize> BTree<T, ORDER> {
    /// `true` iff `key` is present.
    #[must_use]
    pub fn search(&self, key: &T) -> bool {
        let mut node = match &self.root {
            Some(root) => root.as_ref(),
            None => return false,
        };
        loop {
            let i = node.lower_bound(key);
            if i < node.keys.len() && &node.keys[i] == key {
                return true;
            }
            if node.is_leaf() {
                return false;
            }
            node = &node.children[i];
        }
    }

    /// Alias of [`Self::search`].
    #[must_use]
    pub fn contains(&self, key: &T) -> bool {
        self.search(key)
    }

    /// An iterator positioned at some occurrence of `key`, or the end position
    /// if `key` is absent. With duplicates, which occurrence is returned is
    /// unspecified; forward iteration from it still visits the remaining keys
    /// in sorted order.
    #[must_use]
    pub fn find(&self, key: &T) -> Iter<'_, T> {
        let mut stack = Vec::new();
        let mut node = match &self.root {
            Some(root) => root.as_ref(),
            None => return Iter::at(stack),
        };
        loop {
            let i = node.lower_bound(key);
            if i < node.keys.len() && &node.keys[i] == key {
                stack.push((node, i));
                return Iter::at(stack);
            }
            if node.is_leaf() {
                return Iter::at(Vec::new());
            }
            stack.push((node, i));
            node = &node.children[i];
        }
    }

    /// A forward, in-order cursor over every key in the tree. Borrows `self`
    /// immutably, so the tree cannot be mutated while the iterator is alive.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.root.as_deref())
    }

    /// Inserts `key`. Never fails; a key already present is kept alongside the
    /// new occurrence (multiset semantics).
    ///
    /// Splitting happens bottom-up, after the key actually lands, rather than
    /// preemptively on the way down: a node is let to hold `MAX_KEYS + 1` keys
    /// for the instant between the recursive call returning and this function
    /// resplitting it. Splitting a node that only ever reaches exactly
    /// `MAX_KEYS` keys before the split (the classic top-down scheme) needs
    /// `2 * MIN_KEYS <= MAX_KEYS - 1` to leave both halves non-empty, which
    /// fails whenever `MAX_KEYS` is even (`ORDER` odd, e.g. 3 or 5) — splitting
    /// the `MAX_KEYS + 1` - key overflowed node instead always has one more key
    /// to distribute and satisfies `MIN_KEYS` on both sides for every `ORDER`.
    pub fn insert(&mut self, key: T) {
        let mut root = self
            .root
            .take()
            .unwrap_or_else(|| Box::new(Node::new_leaf()));

        if let Some((promoted, sibling)) = Self::insert_into(&mut root, key) {
            let mut new_root = Box::new(Node::new_internal());
            new_root.keys.push(promoted);
            new_root.children.push(root);
            new_root.children.push(sibling);
            root = new_root;
        }

        self.root = Some(root);
        self.size += 1;
    }

    /// Inserts `key` into the subtree rooted at `node`. If that leaves `node`
    /// overflowed (`MAX_KEYS + 1` keys), splits it and returns the promoted
    /// middle key together with the new right sibling for the caller to graft
    /// in at the caller's own index; returns `None` when no split is needed.
    fn insert_into(node: &mut Node<T>, key: T) -> Option<(T, Box<Node<T>>)> {
        if node.is_leaf() {
            let i = node.upper_bound(&key);
            node.keys.insert(i, key);
        } else {
            let i = node.upper_bound(&key);
            if let Some((promoted, sibling)) = Self::insert_into(&mut node.children[i], key) {
                node.keys.insert(i, promoted);
                node.children.insert(i + 1, sibling);
            }
        }

        if node.keys.len() > Self::MAX_KEYS {
            Some(Self::split_overflowed(node))
        } else {
            None
        }
    }

    /// Splits `node`, which holds `MAX_KEYS + 1` keys, in place: `node` keeps
    /// the left half and the new sibling holds the right half, with the
    /// middle key extracted for the caller to promote. `mid = len / 2` always
    /// leaves both halves at least `MIN_KEYS` keys, for every `ORDER`, because
    /// there are `MAX_KEYS` keys left to distribute after the promotion and
    /// `MIN_KEYS` is `MAX_KEYS / 2` rounded down on both sides of that split.
    fn split_overflowed(node: &mut Node<T>) -> (T, Box<Node<T>>) {
        let mid = node.keys.len() / 2;

        let mut sibling = if node.is_leaf() {
            Node::new_leaf()
        } else {
            Node::new_internal()
        };
        sibling.keys = node.keys.split_off(mid + 1);
        if !node.is_leaf() {
            sibling.children = node.children.split_off(mid + 1);
        }
        let middle_key = node.keys.pop().expect("overflowed node has a middle key");

        (middle_key, Box::new(sibling))
    }

    /// Removes one occurrence of `key`, returning whether a matching key was
    /// found. Never fails; an absent key simply yields `false`.
    pub fn remove(&mut self, key: &T) -> bool {
        let Some(mut root) = self.root.take() else {
            return false;
        };

        let removed = Self::remove_from_node(&mut root, key);

        if root.keys.is_empty() {
            if root.is_leaf() {
                self.root = None;
            } else {
                self.root = Some(
                    root.children
                        .into_iter()
                        .next()
                        .expect("internal root retains its single child"),
                );
            }
        } else {
            self.root = Some(root);
        }

        if removed {
            self.size -= 1;
        }
        removed
    }

    /// Removes one occurrence of `key` from the subtree rooted at `node`,
    /// which the caller guarantees is either the root or has strictly more
    /// than `MIN_KEYS` keys.
    fn remove_from_node(node: &mut Node<T>, key: &T) -> bool {
        let idx = node.lower_bound(key);
        let found = idx < node.keys.len() && &node.keys[idx] == key;

        if found {
            if node.is_leaf() {
                node.keys.remove(idx);
                return true;
            }
            return Self::remove_from_internal(node, idx, key);
        }

        if node.is_leaf() {
            return false;
        }

        Self::ensure_min(node, idx);
        // `ensure_min` may have borrowed or merged, shifting where `key`'s
        // subtree now lives; re-locate it rather than reuse the stale `idx`.
        let idx = node.lower_bound(key);
        Self::remove_from_node(&mut node.children[idx], key)
    }

    /// Case 2: `node.keys[idx]` matches `key` and `node` is internal.
    fn remove_from_internal(node: &mut Node<T>, idx: usize, key: &T) -> bool {
        if node.children[idx].keys.len() > Self::MIN_KEYS {
            let predecessor = Self::extract_predecessor(node, idx);
            node.keys[idx] = predecessor;
            return true;
        }

        if node.children[idx + 1].keys.len() > Self::MIN_KEYS {
            let successor = Self::extract_successor(node, idx + 1);
            node.keys[idx] = successor;
            return true;
        }

        // Both adjacent children sit at MIN_KEYS: merge them and the
        // separator into one node, then resolve `key` again from `node`.
        // Ordinarily the merged key now lives one level down; at ORDER = 3
        // the merge can itself overflow and get split again (see `merge`),
        // which can push a copy of `key` back up into `node.keys` — re-
        // locating from `node` handles both outcomes uniformly.
        Self::merge(node, idx);
        Self::remove_from_node(node, key)
    }

    /// Removes and returns the rightmost key of the subtree rooted at
    /// `node.children[idx]`, refilling any child it descends through that
    /// sits at `MIN_KEYS`.
    fn extract_predecessor(node: &mut Node<T>, idx: usize) -> T {
        let child = &mut node.children[idx];
        if child.is_leaf() {
            return child.keys.pop().expect("non-empty child");
        }
        let last = child.children.len() - 1;
        if child.children[last].keys.len() == Self::MIN_KEYS {
            Self::ensure_min(child, last);
        }
        let last = child.children.len() - 1;
        Self::extract_predecessor(child, last)
    }

    /// Removes and returns the leftmost key of the subtree rooted at
    /// `node.children[idx]`, refilling any child it descends through that
    /// sits at `MIN_KEYS`.
    fn extract_successor(node: &mut Node<T>, idx: usize) -> T {
        let child = &mut node.children[idx];
        if child.is_leaf() {
            return child.keys.remove(0);
        }
        if child.children[0].keys.len() == Self::MIN_KEYS {
            Self::ensure_min(child, 0);
        }
        Self::extract_successor(child, 0)
    }

    /// Ensures `node.children[idx]` has strictly more than `MIN_KEYS` keys,
    /// borrowing from a sibling or merging with one (Case 3's `fill`).
    fn ensure_min(node: &mut Node<T>, idx: usize) {
        if node.children[idx].keys.len() > Self::MIN_KEYS {
            return;
        }

        if idx > 0 && node.children[idx - 1].keys.len() > Self::MIN_KEYS {
            Self::borrow_from_left(node, idx);
            return;
        }

        if idx + 1 < node.children.len() && node.children[idx + 1].keys.len() > Self::MIN_KEYS {
            Self::borrow_from_right(node, idx);
            return;
        }

        let merge_idx = if idx + 1 < node.children.len() {
            idx
        } else {
            idx - 1
        };
        Self::merge(node, merge_idx);
    }

    /// Rotates the separator at `idx - 1` down into `children[idx]`'s front,
    /// and the left sibling's last key up to replace it.
    fn borrow_from_left(node: &mut Node<T>, idx: usize) {
        let left = &mut node.children[idx - 1];
        let borrowed_key = left.keys.pop().expect("left sibling has spare keys");
        let borrowed_child = if left.is_leaf() {
            None
        } else {
            left.children.pop()
        };

        let separator = std::mem::replace(&mut node.keys[idx - 1], borrowed_key);

        let child = &mut node.children[idx];
        child.keys.insert(0, separator);
        if let Some(borrowed_child) = borrowed_child {
            child.children.insert(0, borrowed_child);
        }
    }

    /// Rotates the separator at `idx` down into `children[idx]`'s back, and
    /// the right sibling's first key up to replace it.
    fn borrow_from_right(node: &mut Node<T>, idx: usize) {
        let right = &mut node.children[idx + 1];
        let borrowed_key = right.keys.remove(0);
        let borrowed_child = if right.is_leaf() {
            None
        } else {
            Some(right.children.remove(0))
        };

        let separator = std::mem::replace(&mut node.keys[idx], borrowed_key);

        let child = &mut node.children[idx];
        child.keys.push(separator);
        if let Some(borrowed_child) = borrowed_child {
            child.children.push(borrowed_child);
        }
    }

    /// Merges `children[idx]`, `keys[idx]` and `children[idx + 1]` into one
    /// node stored back at `children[idx]`, removing the separator and the
    /// right child from `node`.
    ///
    /// At `ORDER = 3`, `MIN_KEYS + 1 + MIN_KEYS` can exceed `MAX_KEYS`; when it
    /// does, the merged node is immediately split again via
    /// [`Self::split_overflowed`], exactly as an overflowed insert would,
    /// promoting its middle key back into `node`. Every caller re-locates
    /// whatever key it cares about from `node` afterward rather than assuming
    /// the merged child still holds it, which is what makes this safe to call
    /// unconditionally.
    fn merge(node: &mut Node<T>, idx: usize) {
        let right = node.children.remove(idx + 1);
        let separator = node.keys.remove(idx);

        let left = &mut node.children[idx];
        left.keys.push(separator);
        left.keys.extend(right.keys);
        if !left.is_leaf() {
            left.children.extend(right.children);
        }

        if node.children[idx].keys.len() > Self::MAX_KEYS {
            let (promoted, sibling) = Self::split_overflowed(&mut node.children[idx]);
            node.keys.insert(idx, promoted);
            node.children.insert(idx + 1, sibling);
        }
    }

    /// Leftmost key. Fails with [`BTreeError::EmptyTree`] on an empty tree.
    pub fn min(&self) -> Result<&T, BTreeError> {
        self.root
            .as_deref()
            .map(Node::min_key)
            .ok_or(BTreeError::EmptyTree)
    }

    /// Rightmost key. Fails with [`BTreeError::EmptyTree`] on an empty tree.
    pub fn max(&self) -> Result<&T, BTreeError> {
        self.root
            .as_deref()
            .map(Node::max_key)
            .ok_or(BTreeError::EmptyTree)
    }

    /// Applies `visitor` to every key in sorted order, propagating the first
    /// error it returns. The tree is never modified.
    pub fn for_each<F, E>(&self, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&T) -> Result<(), E>,
    {
        match &self.root {
            Some(root) => root.for_each_inorder(&mut visitor),
            None => Ok(()),
        }
    }

    /// Writes every key to `sink` in sorted order, space-separated, with a
    /// trailing newline.
    pub fn traverse<W: std::io::Write>(&self, mut sink: W) -> std::io::Result<()>
    where
        T: std::fmt::Display,
    {
        let mut first = true;
        self.for_each(|key| {
            if !first {
                write!(sink, " ")?;
            }
            first = false;
            write!(sink, "{key}")
        })?;
        writeln!(sink)
    }
}

impl<T: Ord + Clone, const ORDER: usize> BTree<T, ORDER> {
    /// Materializes every key into a `Vec<T>` in sorted order.
    #[must_use]
    pub fn to_sequence(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.size);
        if let Some(root) = &self.root {
            root.collect_into(&mut out);
        }
        out
    }

    /// A deep copy of the tree. Not exposed as `Clone` so an accidental
    /// `.clone()` call site cannot silently duplicate a whole tree.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        BTree {
            root: self.root.as_deref().map(|root| Box::new(root.deep_clone())),
            size: self.size,
        }
    }
}

impl<'a, T: Ord, const ORDER: usize> IntoIterator for &'a BTree<T, ORDER> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T: Ord, const ORDER: usize> FromIterator<T> for BTree<T, ORDER> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<T: Ord, const ORDER: usize> Extend<T> for BTree<T, ORDER> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}
