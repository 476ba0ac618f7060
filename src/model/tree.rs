//! Ordered N-ary tree stored in a slot map.
//!
//! Structure lives in [`NodeMap`]; anything a user of the tree wants to attach
//! to nodes lives in an [`Observer`] that is told about every structural
//! change, so side tables can never outlive the nodes they describe.

use std::ops::{Deref, Index};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

#[derive(Serialize, Deserialize)]
pub struct Tree<O> {
    pub map: NodeMap,
    pub data: O,
}

impl Tree<()> {
    pub fn new() -> Self { Self::with_observer(()) }
}

impl<O: Observer> Tree<O> {
    pub fn with_observer(data: O) -> Self { Tree { map: NodeMap::default(), data } }

    pub fn mk_node(&mut self) -> UnattachedNode<'_, O> {
        let id = self.map.map.insert(Node::default());
        self.data.added_to_forest(&self.map, id);
        UnattachedNode { id, tree: self }
    }
}

#[derive(Serialize, Deserialize, Default)]
pub struct NodeMap {
    map: SlotMap<NodeId, Node>,
}

impl NodeMap {
    pub fn contains(&self, id: NodeId) -> bool { self.map.contains_key(id) }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }
}

impl Index<NodeId> for NodeMap {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output { &self.map[index] }
}

/// Ownership of a root node.
///
/// Removing a root needs the tree, so it cannot happen in `Drop`. Dropping an
/// `OwnedNode` that was never removed panics in debug builds; the name is used
/// in the message.
#[must_use]
#[derive(Debug, Serialize, Deserialize)]
pub struct OwnedNode(Option<NodeId>, String);

impl OwnedNode {
    pub fn new_root_in(tree: &mut Tree<impl Observer>, name: &'static str) -> Self {
        tree.mk_node().make_root(name)
    }

    #[track_caller]
    pub fn id(&self) -> NodeId { self.0.expect("OwnedNode used after removal") }

    pub fn is_removed(&self) -> bool { self.0.is_none() }

    pub fn remove(&mut self, tree: &mut Tree<impl Observer>) {
        if let Some(id) = self.0.take() {
            UnattachedNode { id, tree }.remove()
        }
    }
}

impl Deref for OwnedNode {
    type Target = NodeId;

    #[track_caller]
    fn deref(&self) -> &Self::Target { self.0.as_ref().expect("OwnedNode used after removal") }
}

impl Drop for OwnedNode {
    fn drop(&mut self) {
        if cfg!(debug_assertions) {
            if let Some(node) = self.0 {
                panic!("root {:?} ({node:?}) dropped without OwnedNode::remove", self.1);
            }
        }
    }
}

slotmap::new_key_type! {
    pub struct NodeId;
}

impl NodeId {
    pub fn detach<O: Observer>(self, tree: &mut Tree<O>) -> DetachedNode<'_, O> {
        DetachedNode { id: self, tree }
    }

    pub fn parent(self, map: &NodeMap) -> Option<NodeId> { map.map.get(self)?.parent }

    pub fn next_sibling(self, map: &NodeMap) -> Option<NodeId> { map.map.get(self)?.next_sibling }

    pub fn prev_sibling(self, map: &NodeMap) -> Option<NodeId> { map.map.get(self)?.prev_sibling }

    pub fn first_child(self, map: &NodeMap) -> Option<NodeId> { map.map.get(self)?.first_child }

    pub fn last_child(self, map: &NodeMap) -> Option<NodeId> { map.map.get(self)?.last_child }

    pub fn is_empty(self, map: &NodeMap) -> bool { self.first_child(map).is_none() }

    pub fn children(self, map: &NodeMap) -> Siblings<'_> {
        Siblings {
            cur: self.first_child(map),
            map,
            forward: true,
        }
    }

    pub fn children_rev(self, map: &NodeMap) -> Siblings<'_> {
        Siblings {
            cur: self.last_child(map),
            map,
            forward: false,
        }
    }

    /// Siblings after this node, nearest first.
    pub fn following_siblings(self, map: &NodeMap) -> Siblings<'_> {
        Siblings {
            cur: self.next_sibling(map),
            map,
            forward: true,
        }
    }

    /// Siblings before this node, nearest first.
    pub fn preceding_siblings(self, map: &NodeMap) -> Siblings<'_> {
        Siblings {
            cur: self.prev_sibling(map),
            map,
            forward: false,
        }
    }

    /// This node followed by its parent, grandparent and so on.
    pub fn ancestors(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(self), move |n| n.parent(map))
    }

    pub fn traverse_preorder(self, map: &NodeMap) -> Preorder<'_> {
        Preorder { top: self, cur: Some(self), map }
    }

    /// Position among the parent's children; `None` for roots.
    pub fn index_in_parent(self, map: &NodeMap) -> Option<usize> {
        let parent = self.parent(map)?;
        parent.children(map).position(|c| c == self)
    }
}

pub trait Observer: Sized {
    fn added_to_forest(&mut self, map: &NodeMap, node: NodeId);
    fn added_to_parent(&mut self, map: &NodeMap, node: NodeId);
    fn removing_from_parent(&mut self, map: &NodeMap, node: NodeId);
    fn removed_from_forest(&mut self, map: &NodeMap, node: NodeId);
}

impl Observer for () {
    fn added_to_forest(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn added_to_parent(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn removing_from_parent(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn removed_from_forest(&mut self, _map: &NodeMap, _node: NodeId) {}
}

/// A freshly created node that has no place in the tree yet.
#[must_use = "attach the node, make it a root, or remove it"]
pub struct UnattachedNode<'a, O> {
    id: NodeId,
    tree: &'a mut Tree<O>,
}

impl<'a, O: Observer> UnattachedNode<'a, O> {
    pub fn id(&self) -> NodeId { self.id }

    pub fn make_root(self, name: &'static str) -> OwnedNode { OwnedNode(Some(self.id), name.to_owned()) }

    pub fn push_back(self, parent: NodeId) -> NodeId {
        let prev = parent.last_child(&self.tree.map);
        self.attach(parent, prev, None)
    }

    #[track_caller]
    pub fn insert_before(self, sibling: NodeId) -> NodeId {
        let parent = sibling.parent(&self.tree.map).expect("insert_before a root node");
        let prev = sibling.prev_sibling(&self.tree.map);
        self.attach(parent, prev, Some(sibling))
    }

    #[track_caller]
    pub fn insert_after(self, sibling: NodeId) -> NodeId {
        let parent = sibling.parent(&self.tree.map).expect("insert_after a root node");
        let next = sibling.next_sibling(&self.tree.map);
        self.attach(parent, Some(sibling), next)
    }

    pub(crate) fn remove(self) {
        debug_assert!(self.id.parent(&self.tree.map).is_none());
        delete_subtree(self.tree, self.id);
    }

    fn attach(self, parent: NodeId, prev: Option<NodeId>, next: Option<NodeId>) -> NodeId {
        self.tree.map.splice(self.id, parent, prev, next);
        self.tree.data.added_to_parent(&self.tree.map, self.id);
        self.id
    }
}

/// A node that is being moved or deleted.
///
/// Moving a node within the same parent does not notify the observer.
#[must_use = "reattach the node or remove it"]
pub struct DetachedNode<'a, O> {
    id: NodeId,
    tree: &'a mut Tree<O>,
}

impl<'a, O: Observer> DetachedNode<'a, O> {
    pub fn push_back(self, parent: NodeId) -> NodeId {
        self.reattach(parent, |map, _| (parent.last_child(map), None))
    }

    #[track_caller]
    pub fn insert_before(self, sibling: NodeId) -> NodeId {
        if sibling == self.id {
            return self.id;
        }
        let parent = sibling.parent(&self.tree.map).expect("insert_before a root node");
        self.reattach(parent, move |map, _| (sibling.prev_sibling(map), Some(sibling)))
    }

    #[track_caller]
    pub fn insert_after(self, sibling: NodeId) -> NodeId {
        if sibling == self.id {
            return self.id;
        }
        let parent = sibling.parent(&self.tree.map).expect("insert_after a root node");
        self.reattach(parent, move |map, _| (Some(sibling), sibling.next_sibling(map)))
    }

    /// Unlinks the node and deletes it together with its subtree.
    pub fn remove(self) {
        if self.id.parent(&self.tree.map).is_some() {
            self.tree.data.removing_from_parent(&self.tree.map, self.id);
            self.tree.map.unlink(self.id);
        }
        delete_subtree(self.tree, self.id);
    }

    fn reattach(
        self,
        parent: NodeId,
        neighbours: impl FnOnce(&NodeMap, NodeId) -> (Option<NodeId>, Option<NodeId>),
    ) -> NodeId {
        let map = &self.tree.map;
        // A node can't become its own descendant.
        if parent.ancestors(map).any(|a| a == self.id) {
            return self.id;
        }
        let old_parent = self.id.parent(map);
        let moved = old_parent != Some(parent);
        if moved && old_parent.is_some() {
            self.tree.data.removing_from_parent(&self.tree.map, self.id);
        }
        self.tree.map.unlink(self.id);
        let (prev, next) = neighbours(&self.tree.map, parent);
        self.tree.map.splice(self.id, parent, prev, next);
        if moved {
            self.tree.data.added_to_parent(&self.tree.map, self.id);
        }
        self.id
    }
}

#[derive(Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct Node {
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

impl NodeMap {
    /// Links an unlinked `id` under `parent` between the adjacent siblings
    /// `prev` and `next` (either may be `None` at the ends).
    fn splice(&mut self, id: NodeId, parent: NodeId, prev: Option<NodeId>, next: Option<NodeId>) {
        let node = &mut self.map[id];
        debug_assert!(node.parent.is_none(), "splice of a linked node");
        node.parent = Some(parent);
        node.prev_sibling = prev;
        node.next_sibling = next;
        match prev {
            Some(p) => self.map[p].next_sibling = Some(id),
            None => self.map[parent].first_child = Some(id),
        }
        match next {
            Some(n) => self.map[n].prev_sibling = Some(id),
            None => self.map[parent].last_child = Some(id),
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(node) = self.map.get_mut(id) else { return };
        let parent = node.parent.take();
        let prev = node.prev_sibling.take();
        let next = node.next_sibling.take();
        let Some(parent) = parent else { return };
        match prev {
            Some(p) => self.map[p].next_sibling = next,
            None => self.map[parent].first_child = next,
        }
        match next {
            Some(n) => self.map[n].prev_sibling = prev,
            None => self.map[parent].last_child = prev,
        }
    }
}

fn delete_subtree<O: Observer>(tree: &mut Tree<O>, top: NodeId) {
    let doomed: Vec<NodeId> = top.traverse_preorder(&tree.map).collect();
    for id in doomed {
        tree.data.removed_from_forest(&tree.map, id);
        tree.map.map.remove(id);
    }
}

pub struct Siblings<'a> {
    cur: Option<NodeId>,
    map: &'a NodeMap,
    forward: bool,
}

impl Iterator for Siblings<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = if self.forward {
            id.next_sibling(self.map)
        } else {
            id.prev_sibling(self.map)
        };
        Some(id)
    }
}

pub struct Preorder<'a> {
    top: NodeId,
    cur: Option<NodeId>,
    map: &'a NodeMap,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur?;
        self.cur = node.first_child(self.map).or_else(|| {
            node.ancestors(self.map)
                .take_while(|&a| a != self.top)
                .find_map(|a| a.next_sibling(self.map))
        });
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    enum Ev {
        Forest(NodeId),
        Parent(NodeId),
        Leaving(NodeId, NodeId),
        Gone(NodeId),
    }

    #[derive(Default)]
    struct Log(Vec<Ev>);

    impl Observer for Log {
        fn added_to_forest(&mut self, _map: &NodeMap, node: NodeId) { self.0.push(Ev::Forest(node)) }

        fn added_to_parent(&mut self, _map: &NodeMap, node: NodeId) { self.0.push(Ev::Parent(node)) }

        fn removing_from_parent(&mut self, map: &NodeMap, node: NodeId) {
            let parent = node.parent(map).expect("removing a root from its parent");
            self.0.push(Ev::Leaving(node, parent))
        }

        fn removed_from_forest(&mut self, _map: &NodeMap, node: NodeId) { self.0.push(Ev::Gone(node)) }
    }

    /// ```text
    ///        root
    ///      /  |   \
    ///     a   b    c
    ///         |
    ///         b1
    /// ```
    struct Fixture {
        tree: Tree<Log>,
        root_node: OwnedNode,
        root: NodeId,
        a: NodeId,
        b: NodeId,
        c: NodeId,
        b1: NodeId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut tree = Tree::with_observer(Log::default());
            let root_node = OwnedNode::new_root_in(&mut tree, "fixture");
            let root = root_node.id();
            let a = tree.mk_node().push_back(root);
            let b = tree.mk_node().push_back(root);
            let c = tree.mk_node().push_back(root);
            let b1 = tree.mk_node().push_back(b);
            tree.data.0.clear();
            Fixture { tree, root_node, root, a, b, c, b1 }
        }

        fn kids(&self, n: NodeId) -> Vec<NodeId> { n.children(&self.tree.map).collect() }

        #[track_caller]
        fn assert_kids(&self, n: NodeId, expected: &[NodeId]) {
            assert_eq!(self.kids(n), expected);
            let mut rev: Vec<_> = n.children_rev(&self.tree.map).collect();
            rev.reverse();
            assert_eq!(rev, expected, "reverse links disagree");
            for &k in expected {
                assert_eq!(k.parent(&self.tree.map), Some(n));
            }
        }

        fn events(&mut self) -> Vec<Ev> { std::mem::take(&mut self.tree.data.0) }
    }

    impl Drop for Fixture {
        fn drop(&mut self) { self.root_node.remove(&mut self.tree) }
    }

    #[test]
    fn children_and_ancestors() {
        let f = Fixture::new();
        f.assert_kids(f.root, &[f.a, f.b, f.c]);
        f.assert_kids(f.b, &[f.b1]);
        assert!(f.a.is_empty(&f.tree.map));
        assert_eq!(
            f.b1.ancestors(&f.tree.map).collect::<Vec<_>>(),
            vec![f.b1, f.b, f.root]
        );
        assert_eq!(f.c.index_in_parent(&f.tree.map), Some(2));
        assert_eq!(f.root.index_in_parent(&f.tree.map), None);
    }

    #[test]
    fn sibling_walks_start_next_to_the_node() {
        let f = Fixture::new();
        assert_eq!(f.a.following_siblings(&f.tree.map).collect::<Vec<_>>(), vec![f.b, f.c]);
        assert_eq!(f.c.preceding_siblings(&f.tree.map).collect::<Vec<_>>(), vec![f.b, f.a]);
        assert_eq!(f.a.preceding_siblings(&f.tree.map).count(), 0);
    }

    #[test]
    fn preorder_stays_inside_the_subtree() {
        let f = Fixture::new();
        assert_eq!(
            f.root.traverse_preorder(&f.tree.map).collect::<Vec<_>>(),
            vec![f.root, f.a, f.b, f.b1, f.c]
        );
        assert_eq!(f.b.traverse_preorder(&f.tree.map).collect::<Vec<_>>(), vec![f.b, f.b1]);
        assert_eq!(f.a.traverse_preorder(&f.tree.map).collect::<Vec<_>>(), vec![f.a]);
    }

    #[test]
    fn insertion_positions() {
        let mut f = Fixture::new();
        let first = f.tree.mk_node().insert_before(f.a);
        let mid = f.tree.mk_node().insert_after(f.b);
        let last = f.tree.mk_node().insert_after(f.c);
        assert_eq!(
            f.events(),
            vec![
                Ev::Forest(first),
                Ev::Parent(first),
                Ev::Forest(mid),
                Ev::Parent(mid),
                Ev::Forest(last),
                Ev::Parent(last),
            ]
        );
        f.assert_kids(f.root, &[first, f.a, f.b, mid, f.c, last]);
    }

    #[test]
    fn moving_within_a_parent_is_silent() {
        let mut f = Fixture::new();
        f.a.detach(&mut f.tree).insert_after(f.c);
        f.assert_kids(f.root, &[f.b, f.c, f.a]);
        f.a.detach(&mut f.tree).insert_before(f.b);
        f.assert_kids(f.root, &[f.a, f.b, f.c]);
        assert_eq!(f.events(), vec![]);
    }

    #[test]
    fn moving_between_parents_notifies() {
        let mut f = Fixture::new();
        f.c.detach(&mut f.tree).push_back(f.b);
        f.assert_kids(f.root, &[f.a, f.b]);
        f.assert_kids(f.b, &[f.b1, f.c]);
        assert_eq!(f.events(), vec![Ev::Leaving(f.c, f.root), Ev::Parent(f.c)]);

        f.c.detach(&mut f.tree).insert_after(f.b);
        f.assert_kids(f.root, &[f.a, f.b, f.c]);
        f.assert_kids(f.b, &[f.b1]);
    }

    #[test]
    fn remove_takes_the_subtree() {
        let mut f = Fixture::new();
        f.b.detach(&mut f.tree).remove();
        f.assert_kids(f.root, &[f.a, f.c]);
        assert!(!f.tree.map.contains(f.b));
        assert!(!f.tree.map.contains(f.b1));
        assert_eq!(f.events(), vec![Ev::Leaving(f.b, f.root), Ev::Gone(f.b), Ev::Gone(f.b1)]);
    }

    #[test]
    fn cannot_attach_under_own_descendant() {
        let mut f = Fixture::new();
        f.b.detach(&mut f.tree).push_back(f.b1);
        f.assert_kids(f.root, &[f.a, f.b, f.c]);
        f.assert_kids(f.b, &[f.b1]);
        f.root.detach(&mut f.tree).push_back(f.root);
        f.assert_kids(f.root, &[f.a, f.b, f.c]);
    }

    #[test]
    fn removing_the_root_clears_the_forest() {
        let mut f = Fixture::new();
        f.root_node.remove(&mut f.tree);
        assert!(f.tree.map.is_empty());
        assert_eq!(f.events().len(), 5);
        assert!(f.root_node.is_removed());
    }
}
