//! Red-black tree augmented with subtree sizes (CLRS chapter 14).
//!
//! Nodes live in an arena. Index 0 is the shared black sentinel `NIL` with
//! size 0; freed slots are reused. Every node stores the number of keys in
//! its subtree, which makes [`OsTree::select`] and [`OsTree::rank`]
//! logarithmic.

use std::cmp::Ordering;
use std::fmt;

const NIL: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Clone)]
struct Node<K> {
    key: Option<K>,
    color: Color,
    left: usize,
    right: usize,
    parent: usize,
    size: usize,
}

impl<K> Node<K> {
    fn sentinel() -> Self {
        Self {
            key: None,
            color: Color::Black,
            left: NIL,
            right: NIL,
            parent: NIL,
            size: 0,
        }
    }
}

/// An ordered set of keys with logarithmic rank and select.
#[derive(Clone)]
pub struct OsTree<K> {
    nodes: Vec<Node<K>>,
    root: usize,
    free: Vec<usize>,
}

impl<K: Ord + fmt::Debug> fmt::Debug for OsTree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Ord> Default for OsTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> OsTree<K> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::sentinel()],
            root: NIL,
            free: Vec::new(),
        }
    }

    /// Number of keys in the tree.
    pub fn len(&self) -> usize {
        self.nodes[self.root].size
    }

    /// Returns `true` if the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    /// Remove every key. Arena capacity is kept.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[NIL] = Node::sentinel();
        self.root = NIL;
        self.free.clear();
    }

    /// Returns `true` if `key` is in the tree.
    pub fn contains(&self, key: &K) -> bool {
        self.find(key) != NIL
    }

    /// Insert `key`. Returns `false` if an equal key was already present.
    pub fn insert(&mut self, key: K) -> bool {
        if self.find(&key) != NIL {
            return false;
        }
        let mut parent = NIL;
        let mut x = self.root;
        while x != NIL {
            parent = x;
            self.nodes[x].size += 1;
            x = if key < *self.key(x) {
                self.nodes[x].left
            } else {
                self.nodes[x].right
            };
        }
        let z = self.alloc(key);
        self.nodes[z].parent = parent;
        if parent == NIL {
            self.root = z;
        } else {
            let goes_left = self.key(z) < self.key(parent);
            if goes_left {
                self.nodes[parent].left = z;
            } else {
                self.nodes[parent].right = z;
            }
        }
        self.insert_fixup(z);
        true
    }

    /// Remove `key`. Returns `false` if it was not present.
    pub fn remove(&mut self, key: &K) -> bool {
        let z = self.find(key);
        if z == NIL {
            return false;
        }

        // The node physically unlinked loses one descendant on every ancestor.
        let spliced = if self.nodes[z].left == NIL || self.nodes[z].right == NIL {
            z
        } else {
            self.minimum(self.nodes[z].right)
        };
        let mut p = self.nodes[spliced].parent;
        while p != NIL {
            self.nodes[p].size -= 1;
            p = self.nodes[p].parent;
        }

        let mut removed_color = self.nodes[z].color;
        let x;
        if self.nodes[z].left == NIL {
            x = self.nodes[z].right;
            self.transplant(z, x);
        } else if self.nodes[z].right == NIL {
            x = self.nodes[z].left;
            self.transplant(z, x);
        } else {
            let y = spliced;
            removed_color = self.nodes[y].color;
            x = self.nodes[y].right;
            if self.nodes[y].parent == z {
                self.nodes[x].parent = y;
            } else {
                self.transplant(y, x);
                let zr = self.nodes[z].right;
                self.nodes[y].right = zr;
                self.nodes[zr].parent = y;
            }
            self.transplant(z, y);
            let zl = self.nodes[z].left;
            self.nodes[y].left = zl;
            self.nodes[zl].parent = y;
            self.nodes[y].color = self.nodes[z].color;
            self.nodes[y].size = self.nodes[z].size;
        }
        if removed_color == Color::Black {
            self.delete_fixup(x);
        }
        self.release(z);
        true
    }

    /// The key at zero-based position `index` in ascending order.
    pub fn select(&self, index: usize) -> Option<&K> {
        if index >= self.len() {
            return None;
        }
        let mut i = index;
        let mut x = self.root;
        loop {
            let r = self.nodes[self.nodes[x].left].size;
            match i.cmp(&r) {
                Ordering::Equal => return Some(self.key(x)),
                Ordering::Less => x = self.nodes[x].left,
                Ordering::Greater => {
                    i -= r + 1;
                    x = self.nodes[x].right;
                }
            }
        }
    }

    /// Zero-based position of `key` in ascending order.
    pub fn rank(&self, key: &K) -> Option<usize> {
        let x = self.find(key);
        if x == NIL {
            return None;
        }
        let mut r = self.nodes[self.nodes[x].left].size;
        let mut y = x;
        while y != self.root {
            let p = self.nodes[y].parent;
            if y == self.nodes[p].right {
                r += self.nodes[self.nodes[p].left].size + 1;
            }
            y = p;
        }
        Some(r)
    }

    /// The smallest key.
    pub fn first(&self) -> Option<&K> {
        if self.root == NIL {
            None
        } else {
            Some(self.key(self.minimum(self.root)))
        }
    }

    /// Iterate keys in ascending order.
    pub fn iter(&self) -> Iter<'_, K> {
        let next = if self.root == NIL {
            NIL
        } else {
            self.minimum(self.root)
        };
        Iter {
            tree: self,
            next,
            remaining: self.len(),
        }
    }

    fn key(&self, x: usize) -> &K {
        match &self.nodes[x].key {
            Some(k) => k,
            None => unreachable!("order-statistics tree reached a vacant node"),
        }
    }

    fn find(&self, key: &K) -> usize {
        let mut x = self.root;
        while x != NIL {
            match key.cmp(self.key(x)) {
                Ordering::Equal => return x,
                Ordering::Less => x = self.nodes[x].left,
                Ordering::Greater => x = self.nodes[x].right,
            }
        }
        NIL
    }

    fn minimum(&self, mut x: usize) -> usize {
        while self.nodes[x].left != NIL {
            x = self.nodes[x].left;
        }
        x
    }

    fn successor(&self, mut x: usize) -> usize {
        if self.nodes[x].right != NIL {
            return self.minimum(self.nodes[x].right);
        }
        let mut y = self.nodes[x].parent;
        while y != NIL && x == self.nodes[y].right {
            x = y;
            y = self.nodes[y].parent;
        }
        y
    }

    fn alloc(&mut self, key: K) -> usize {
        let node = Node {
            key: Some(key),
            color: Color::Red,
            left: NIL,
            right: NIL,
            parent: NIL,
            size: 1,
        };
        match self.free.pop() {
            Some(i) => {
                self.nodes[i] = node;
                i
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, x: usize) {
        self.nodes[x] = Node::sentinel();
        self.free.push(x);
    }

    fn transplant(&mut self, u: usize, v: usize) {
        let up = self.nodes[u].parent;
        if up == NIL {
            self.root = v;
        } else if u == self.nodes[up].left {
            self.nodes[up].left = v;
        } else {
            self.nodes[up].right = v;
        }
        self.nodes[v].parent = up;
    }

    fn left_rotate(&mut self, x: usize) {
        let y = self.nodes[x].right;
        let yl = self.nodes[y].left;
        self.nodes[x].right = yl;
        if yl != NIL {
            self.nodes[yl].parent = x;
        }
        self.transplant(x, y);
        self.nodes[y].left = x;
        self.nodes[x].parent = y;
        self.nodes[y].size = self.nodes[x].size;
        self.nodes[x].size = self.subtree_size(x);
    }

    fn right_rotate(&mut self, x: usize) {
        let y = self.nodes[x].left;
        let yr = self.nodes[y].right;
        self.nodes[x].left = yr;
        if yr != NIL {
            self.nodes[yr].parent = x;
        }
        self.transplant(x, y);
        self.nodes[y].right = x;
        self.nodes[x].parent = y;
        self.nodes[y].size = self.nodes[x].size;
        self.nodes[x].size = self.subtree_size(x);
    }

    fn subtree_size(&self, x: usize) -> usize {
        self.nodes[self.nodes[x].left].size + self.nodes[self.nodes[x].right].size + 1
    }

    fn insert_fixup(&mut self, mut z: usize) {
        while self.nodes[self.nodes[z].parent].color == Color::Red {
            let p = self.nodes[z].parent;
            let g = self.nodes[p].parent;
            if p == self.nodes[g].left {
                let uncle = self.nodes[g].right;
                if self.nodes[uncle].color == Color::Red {
                    self.nodes[p].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[g].color = Color::Red;
                    z = g;
                } else {
                    if z == self.nodes[p].right {
                        z = p;
                        self.left_rotate(z);
                    }
                    let p = self.nodes[z].parent;
                    let g = self.nodes[p].parent;
                    self.nodes[p].color = Color::Black;
                    self.nodes[g].color = Color::Red;
                    self.right_rotate(g);
                }
            } else {
                let uncle = self.nodes[g].left;
                if self.nodes[uncle].color == Color::Red {
                    self.nodes[p].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[g].color = Color::Red;
                    z = g;
                } else {
                    if z == self.nodes[p].left {
                        z = p;
                        self.right_rotate(z);
                    }
                    let p = self.nodes[z].parent;
                    let g = self.nodes[p].parent;
                    self.nodes[p].color = Color::Black;
                    self.nodes[g].color = Color::Red;
                    self.left_rotate(g);
                }
            }
        }
        let root = self.root;
        self.nodes[root].color = Color::Black;
    }

    fn delete_fixup(&mut self, mut x: usize) {
        while x != self.root && self.nodes[x].color == Color::Black {
            let p = self.nodes[x].parent;
            if x == self.nodes[p].left {
                let mut w = self.nodes[p].right;
                if self.nodes[w].color == Color::Red {
                    self.nodes[w].color = Color::Black;
                    self.nodes[p].color = Color::Red;
                    self.left_rotate(p);
                    w = self.nodes[self.nodes[x].parent].right;
                }
                let wl = self.nodes[w].left;
                let wr = self.nodes[w].right;
                if self.nodes[wl].color == Color::Black && self.nodes[wr].color == Color::Black {
                    self.nodes[w].color = Color::Red;
                    x = self.nodes[x].parent;
                } else {
                    if self.nodes[wr].color == Color::Black {
                        self.nodes[wl].color = Color::Black;
                        self.nodes[w].color = Color::Red;
                        self.right_rotate(w);
                        w = self.nodes[self.nodes[x].parent].right;
                    }
                    let p = self.nodes[x].parent;
                    self.nodes[w].color = self.nodes[p].color;
                    self.nodes[p].color = Color::Black;
                    let wr = self.nodes[w].right;
                    self.nodes[wr].color = Color::Black;
                    self.left_rotate(p);
                    x = self.root;
                }
            } else {
                let mut w = self.nodes[p].left;
                if self.nodes[w].color == Color::Red {
                    self.nodes[w].color = Color::Black;
                    self.nodes[p].color = Color::Red;
                    self.right_rotate(p);
                    w = self.nodes[self.nodes[x].parent].left;
                }
                let wl = self.nodes[w].left;
                let wr = self.nodes[w].right;
                if self.nodes[wl].color == Color::Black && self.nodes[wr].color == Color::Black {
                    self.nodes[w].color = Color::Red;
                    x = self.nodes[x].parent;
                } else {
                    if self.nodes[wl].color == Color::Black {
                        self.nodes[wr].color = Color::Black;
                        self.nodes[w].color = Color::Red;
                        self.left_rotate(w);
                        w = self.nodes[self.nodes[x].parent].left;
                    }
                    let p = self.nodes[x].parent;
                    self.nodes[w].color = self.nodes[p].color;
                    self.nodes[p].color = Color::Black;
                    let wl = self.nodes[w].left;
                    self.nodes[wl].color = Color::Black;
                    self.right_rotate(p);
                    x = self.root;
                }
            }
        }
        self.nodes[x].color = Color::Black;
    }
}

/// Ascending iterator over the keys of an [`OsTree`].
pub struct Iter<'a, K> {
    tree: &'a OsTree<K>,
    next: usize,
    remaining: usize,
}

impl<'a, K: Ord> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NIL {
            return None;
        }
        let x = self.next;
        self.next = self.tree.successor(x);
        self.remaining -= 1;
        Some(self.tree.key(x))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    impl<K: Ord> OsTree<K> {
        /// Checks the red-black and size invariants, returning the black height.
        fn check(&self) -> usize {
            assert_eq!(self.nodes[NIL].size, 0);
            assert_eq!(self.nodes[NIL].color, Color::Black);
            assert_eq!(self.nodes[self.root].color, Color::Black);
            self.check_node(self.root)
        }

        fn check_node(&self, x: usize) -> usize {
            if x == NIL {
                return 1;
            }
            let n = &self.nodes[x];
            assert_eq!(n.size, self.subtree_size(x), "size of node {x}");
            if n.color == Color::Red {
                assert_eq!(self.nodes[n.left].color, Color::Black);
                assert_eq!(self.nodes[n.right].color, Color::Black);
            }
            if n.left != NIL {
                assert_eq!(self.nodes[n.left].parent, x);
                assert!(self.key(n.left) < self.key(x));
            }
            if n.right != NIL {
                assert_eq!(self.nodes[n.right].parent, x);
                assert!(self.key(n.right) > self.key(x));
            }
            let lh = self.check_node(n.left);
            let rh = self.check_node(n.right);
            assert_eq!(lh, rh, "black height at node {x}");
            lh + usize::from(n.color == Color::Black)
        }
    }

    #[test]
    fn empty_tree() {
        let tree: OsTree<i32> = OsTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.select(0), None);
        assert_eq!(tree.rank(&3), None);
        assert_eq!(tree.first(), None);
        assert_eq!(tree.iter().count(), 0);
    }

    #[test]
    fn insert_select_rank() {
        let mut tree = OsTree::new();
        for k in [50, 20, 80, 10, 30, 70, 90, 25] {
            assert!(tree.insert(k));
            tree.check();
        }
        assert!(!tree.insert(30));
        assert_eq!(tree.len(), 8);
        let sorted: Vec<_> = tree.iter().copied().collect();
        assert_eq!(sorted, vec![10, 20, 25, 30, 50, 70, 80, 90]);
        for (i, k) in sorted.iter().enumerate() {
            assert_eq!(tree.select(i), Some(k));
            assert_eq!(tree.rank(k), Some(i));
        }
        assert_eq!(tree.select(8), None);
        assert_eq!(tree.first(), Some(&10));
    }

    #[test]
    fn remove_keeps_invariants() {
        let mut tree = OsTree::new();
        for k in 0..64 {
            tree.insert(k);
        }
        for k in (0..64).step_by(3) {
            assert!(tree.remove(&k));
            tree.check();
        }
        assert!(!tree.remove(&0));
        assert_eq!(tree.len(), 64 - 22);
        assert_eq!(tree.rank(&1), Some(0));
        assert_eq!(tree.rank(&2), Some(1));
        assert_eq!(tree.rank(&4), Some(2));
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut tree = OsTree::new();
        for k in 0..10 {
            tree.insert(k);
        }
        let arena = tree.nodes.len();
        for k in 0..5 {
            tree.remove(&k);
        }
        for k in 100..105 {
            tree.insert(k);
        }
        assert_eq!(tree.nodes.len(), arena);
        tree.check();
    }

    #[test]
    fn clear_resets() {
        let mut tree = OsTree::new();
        tree.insert("b");
        tree.insert("a");
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.insert("c"));
        assert_eq!(tree.select(0), Some(&"c"));
    }

    proptest! {
        #[test]
        fn matches_sorted_vec(ops in prop::collection::vec((any::<bool>(), 0u16..200), 1..300)) {
            let mut tree = OsTree::new();
            let mut model: Vec<u16> = Vec::new();
            for (insert, k) in ops {
                if insert {
                    let fresh = !model.contains(&k);
                    prop_assert_eq!(tree.insert(k), fresh);
                    if fresh {
                        model.push(k);
                        model.sort_unstable();
                    }
                } else {
                    let present = model.contains(&k);
                    prop_assert_eq!(tree.remove(&k), present);
                    model.retain(|m| *m != k);
                }
                tree.check();
                prop_assert_eq!(tree.len(), model.len());
            }
            for (i, k) in model.iter().enumerate() {
                prop_assert_eq!(tree.select(i), Some(k));
                prop_assert_eq!(tree.rank(k), Some(i));
            }
        }
    }
}
