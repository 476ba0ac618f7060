//! The section/window hierarchy behind the tree-tab layout.
//!
//! The root's children are sections in display order. Sections contain window
//! nodes, and a window node may have window children of its own. Node payloads
//! and the window index live in [`Components`], which the tree keeps in sync
//! as nodes are deleted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotmap::SecondaryMap;

use crate::common::collections::BTreeMap;
use crate::layout_engine::LayoutError;
use crate::model::tree::{NodeId, NodeMap, Observer, OwnedNode, Tree};
use crate::model::window::{Window, WindowId, WindowSet};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Section { title: String },
    Window(WindowId),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct TabNode {
    kind: NodeKind,
    expanded: bool,
}

#[derive(Serialize, Deserialize, Default)]
struct Components {
    nodes: SecondaryMap<NodeId, TabNode>,
    windows: BTreeMap<WindowId, NodeId>,
}

impl Observer for Components {
    fn added_to_forest(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn added_to_parent(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn removing_from_parent(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn removed_from_forest(&mut self, _map: &NodeMap, node: NodeId) {
        if let Some(TabNode { kind: NodeKind::Window(wid), .. }) = self.nodes.remove(node) {
            if self.windows.get(&wid) == Some(&node) {
                self.windows.remove(&wid);
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct TabTree {
    tree: Tree<Components>,
    root: OwnedNode,
    sections: BTreeMap<String, NodeId>,
    default_section: NodeId,
}

impl Drop for TabTree {
    fn drop(&mut self) { self.root.remove(&mut self.tree) }
}

const SUPERSCRIPT_DIGITS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];

pub fn superscript(n: usize) -> String {
    n.to_string()
        .chars()
        .map(|c| c.to_digit(10).map_or(c, |d| SUPERSCRIPT_DIGITS[d as usize]))
        .collect()
}

impl TabTree {
    pub fn new(titles: &[String], default: Option<&str>) -> Result<Self, LayoutError> {
        if titles.is_empty() {
            return Err(LayoutError::NoSections);
        }
        let mut tree = Tree::with_observer(Components::default());
        let root = OwnedNode::new_root_in(&mut tree, "tree_tab");
        let root_id = root.id();
        tree.data.nodes.insert(root_id, TabNode { kind: NodeKind::Root, expanded: true });
        let mut this = TabTree {
            tree,
            root,
            sections: BTreeMap::new(),
            default_section: root_id,
        };
        for title in titles {
            this.add_section(title)?;
        }
        this.default_section = match default {
            Some(name) => *this
                .sections
                .get(name)
                .ok_or_else(|| LayoutError::SectionNotFound(name.to_owned()))?,
            None => root_id.first_child(this.map()).ok_or(LayoutError::NoSections)?,
        };
        Ok(this)
    }

    fn map(&self) -> &NodeMap { &self.tree.map }

    pub fn root_id(&self) -> NodeId { self.root.id() }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.tree.data.nodes.get(node).map(|n| &n.kind)
    }

    pub fn is_expanded(&self, node: NodeId) -> bool {
        self.tree.data.nodes.get(node).is_some_and(|n| n.expanded)
    }

    pub fn window_at(&self, node: NodeId) -> Option<WindowId> {
        match self.kind(node)? {
            NodeKind::Window(wid) => Some(*wid),
            _ => None,
        }
    }

    fn is_section(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Section { .. }))
    }

    pub fn node_of(&self, wid: WindowId) -> Option<NodeId> {
        self.tree.data.windows.get(&wid).copied()
    }

    pub fn contains(&self, wid: WindowId) -> bool { self.tree.data.windows.contains_key(&wid) }

    pub fn window_count(&self) -> usize { self.tree.data.windows.len() }

    pub fn window_ids(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.tree.data.windows.keys().copied()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> { node.children(self.map()).collect() }

    pub fn section_ids(&self) -> Vec<NodeId> { self.children(self.root_id()) }

    pub fn section_titles(&self) -> Vec<String> {
        self.section_ids()
            .into_iter()
            .filter_map(|s| match self.kind(s) {
                Some(NodeKind::Section { title }) => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn default_section_title(&self) -> Option<&str> {
        match self.kind(self.default_section)? {
            NodeKind::Section { title } => Some(title),
            _ => None,
        }
    }

    /// Inserts a node for `window`. With a `hint` the node goes right after
    /// the hint's node; otherwise it is appended to the window's preferred
    /// section, or to the default section.
    pub fn add_window(&mut self, window: &Window, hint: Option<WindowId>) -> NodeId {
        if let Some(existing) = self.node_of(window.id) {
            return existing;
        }
        let node = match hint.and_then(|h| self.node_of(h)) {
            Some(after) => self.tree.mk_node().insert_after(after),
            None => {
                let parent = window
                    .tree_section
                    .as_deref()
                    .and_then(|s| self.sections.get(s).copied())
                    .unwrap_or(self.default_section);
                self.tree.mk_node().push_back(parent)
            }
        };
        self.tree.data.nodes.insert(node, TabNode {
            kind: NodeKind::Window(window.id),
            expanded: true,
        });
        self.tree.data.windows.insert(window.id, node);
        node
    }

    /// Removes the window's node. Its first child takes over the vacated slot
    /// and adopts the remaining children.
    pub fn remove_window(&mut self, wid: WindowId) -> bool {
        let Some(node) = self.node_of(wid) else {
            return false;
        };
        let children = self.children(node);
        if let Some((&head, rest)) = children.split_first() {
            head.detach(&mut self.tree).insert_after(node);
            for &child in rest {
                child.detach(&mut self.tree).push_back(head);
            }
        }
        node.detach(&mut self.tree).remove();
        true
    }

    pub fn add_section(&mut self, title: &str) -> Result<(), LayoutError> {
        if self.sections.contains_key(title) {
            return Err(LayoutError::DuplicateSection(title.to_owned()));
        }
        let root = self.root_id();
        let node = self.tree.mk_node().push_back(root);
        self.tree.data.nodes.insert(node, TabNode {
            kind: NodeKind::Section { title: title.to_owned() },
            expanded: true,
        });
        self.sections.insert(title.to_owned(), node);
        Ok(())
    }

    /// Deletes a section, handing its windows to the section before it (or
    /// the one after it when deleting the first section).
    pub fn del_section(&mut self, title: &str) -> Result<(), LayoutError> {
        let section = *self
            .sections
            .get(title)
            .ok_or_else(|| LayoutError::SectionNotFound(title.to_owned()))?;
        let all = self.section_ids();
        if all.len() == 1 {
            return Err(LayoutError::LastSection);
        }
        let idx = all.iter().position(|&s| s == section).unwrap_or_default();
        let heir = if idx == 0 { all[1] } else { all[idx - 1] };
        for child in self.children(section) {
            child.detach(&mut self.tree).push_back(heir);
        }
        section.detach(&mut self.tree).remove();
        self.sections.remove(title);
        if self.default_section == section {
            self.default_section = heir;
        }
        Ok(())
    }

    fn first_window_under(&self, node: NodeId) -> Option<NodeId> {
        if self.window_at(node).is_some() {
            return Some(node);
        }
        if !self.is_expanded(node) {
            return None;
        }
        node.children(self.map()).find_map(|c| self.first_window_under(c))
    }

    fn last_window_under(&self, node: NodeId) -> Option<NodeId> {
        if self.is_expanded(node) {
            if let Some(found) = node.children_rev(self.map()).find_map(|c| self.last_window_under(c))
            {
                return Some(found);
            }
        }
        self.window_at(node).map(|_| node)
    }

    pub fn first_window(&self) -> Option<WindowId> {
        self.first_window_under(self.root_id()).and_then(|n| self.window_at(n))
    }

    pub fn last_window(&self) -> Option<WindowId> {
        self.last_window_under(self.root_id()).and_then(|n| self.window_at(n))
    }

    /// The window shown below `wid` in the panel, skipping collapsed
    /// branches. `None` past the last window.
    pub fn next_window(&self, wid: WindowId) -> Option<WindowId> {
        let node = self.node_of(wid)?;
        let map = self.map();
        if self.is_expanded(node) {
            if let Some(child) = node.first_child(map) {
                return self.window_at(child);
            }
        }
        let root = self.root_id();
        for cur in node.ancestors(map).take_while(|&n| n != root) {
            if let Some(found) =
                cur.following_siblings(map).find_map(|s| self.first_window_under(s))
            {
                return self.window_at(found);
            }
        }
        None
    }

    /// The window shown above `wid` in the panel. `None` before the first
    /// window.
    pub fn prev_window(&self, wid: WindowId) -> Option<WindowId> {
        let node = self.node_of(wid)?;
        let map = self.map();
        let root = self.root_id();
        for cur in node.ancestors(map).take_while(|&n| n != root) {
            let parent = cur.parent(map)?;
            if cur.prev_sibling(map).is_none() && self.window_at(parent).is_some() {
                return self.window_at(parent);
            }
            if let Some(found) =
                cur.preceding_siblings(map).find_map(|s| self.last_window_under(s))
            {
                return self.window_at(found);
            }
        }
        None
    }

    fn section_of(&self, node: NodeId) -> Option<NodeId> {
        node.ancestors(self.map()).find(|&n| self.is_section(n))
    }

    pub fn section_title_of(&self, wid: WindowId) -> Option<&str> {
        let section = self.section_of(self.node_of(wid)?)?;
        match self.kind(section)? {
            NodeKind::Section { title } => Some(title),
            _ => None,
        }
    }

    pub fn move_up(&mut self, wid: WindowId) -> bool {
        let Some(node) = self.node_of(wid) else { return false };
        let Some(prev) = node.prev_sibling(self.map()) else { return false };
        node.detach(&mut self.tree).insert_before(prev);
        true
    }

    pub fn move_down(&mut self, wid: WindowId) -> bool {
        let Some(node) = self.node_of(wid) else { return false };
        let Some(next) = node.next_sibling(self.map()) else { return false };
        node.detach(&mut self.tree).insert_after(next);
        true
    }

    /// Outdents the node to the end of its grandparent's children. Nodes at
    /// the top level of a section stay put.
    pub fn move_left(&mut self, wid: WindowId) -> bool {
        let Some(node) = self.node_of(wid) else { return false };
        let Some(parent) = node.parent(self.map()) else { return false };
        if self.is_section(parent) {
            return false;
        }
        let Some(grandparent) = parent.parent(self.map()) else { return false };
        node.detach(&mut self.tree).push_back(grandparent);
        true
    }

    /// Indents the node under its previous sibling.
    pub fn move_right(&mut self, wid: WindowId) -> bool {
        let Some(node) = self.node_of(wid) else { return false };
        let Some(prev) = node.prev_sibling(self.map()) else { return false };
        node.detach(&mut self.tree).push_back(prev);
        true
    }

    fn move_to_adjacent_section(&mut self, wid: WindowId, up: bool) -> bool {
        let Some(node) = self.node_of(wid) else { return false };
        let Some(section) = self.section_of(node) else { return false };
        let target = if up {
            section.prev_sibling(self.map())
        } else {
            section.next_sibling(self.map())
        };
        let Some(target) = target else { return false };
        node.detach(&mut self.tree).push_back(target);
        true
    }

    pub fn section_up(&mut self, wid: WindowId) -> bool { self.move_to_adjacent_section(wid, true) }

    pub fn section_down(&mut self, wid: WindowId) -> bool {
        self.move_to_adjacent_section(wid, false)
    }

    pub fn set_expanded(&mut self, wid: WindowId, expanded: bool) -> bool {
        let Some(node) = self.node_of(wid) else { return false };
        match self.tree.data.nodes.get_mut(node) {
            Some(n) if n.expanded != expanded => {
                n.expanded = expanded;
                true
            }
            _ => false,
        }
    }

    /// Re-files every top-level window of every section into the section
    /// named by `classify`. Unknown sections are created when `create` is
    /// set and otherwise leave the window where it is.
    pub fn sort(
        &mut self,
        mut classify: impl FnMut(WindowId) -> Option<String>,
        create: bool,
    ) -> Result<bool, LayoutError> {
        let mut changed = false;
        for section in self.section_ids() {
            let Some(NodeKind::Section { title }) = self.kind(section).cloned() else {
                continue;
            };
            for child in self.children(section) {
                let Some(wid) = self.window_at(child) else { continue };
                let Some(target) = classify(wid) else { continue };
                if target == title {
                    continue;
                }
                let dest = match self.sections.get(&target) {
                    Some(&dest) => dest,
                    None if create => {
                        self.add_section(&target)?;
                        self.sections[&target]
                    }
                    None => continue,
                };
                child.detach(&mut self.tree).push_back(dest);
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Panel label for `node`; collapsed nodes with children are prefixed
    /// with their child count in superscript digits.
    pub fn label(&self, node: NodeId, windows: &WindowSet) -> String {
        let base = match self.kind(node) {
            Some(NodeKind::Section { title }) => title.as_str(),
            Some(NodeKind::Window(wid)) => windows.name_of(*wid),
            _ => "",
        };
        if !self.is_expanded(node) && !node.is_empty(self.map()) {
            let count = node.children(self.map()).count();
            format!("{}{base}", superscript(count))
        } else {
            base.to_owned()
        }
    }

    /// Nested name lists per section: every window becomes
    /// `[name, subtree, subtree, ..]`, and collapsed branches are cut off.
    pub fn client_trees(&self, windows: &WindowSet) -> serde_json::Map<String, Value> {
        self.section_ids()
            .into_iter()
            .filter_map(|s| match self.kind(s) {
                Some(NodeKind::Section { title }) => {
                    Some((title.clone(), self.subtree_names(s, windows)))
                }
                _ => None,
            })
            .collect()
    }

    fn subtree_names(&self, node: NodeId, windows: &WindowSet) -> Value {
        let mut out = Vec::new();
        if let Some(wid) = self.window_at(node) {
            out.push(Value::String(windows.name_of(wid).to_owned()));
        }
        if self.is_expanded(node) {
            out.extend(node.children(self.map()).map(|c| self.subtree_names(c, windows)));
        }
        Value::Array(out)
    }

    pub fn ascii_tree(&self, windows: &WindowSet) -> ascii_tree::Tree {
        self.ascii_node(self.root_id(), windows)
    }

    fn ascii_node(&self, node: NodeId, windows: &WindowSet) -> ascii_tree::Tree {
        let desc = match self.kind(node) {
            Some(NodeKind::Root) => "root".to_owned(),
            Some(NodeKind::Section { title }) => format!("[{title}]"),
            Some(NodeKind::Window(wid)) => format!("{} {wid}", self.label(node, windows)),
            None => format!("{node:?}"),
        };
        let children: Vec<_> =
            node.children(self.map()).map(|c| self.ascii_node(c, windows)).collect();
        if children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            ascii_tree::Tree::Node(desc, children)
        }
    }

    /// Checks the structural invariants; used by tests and debug assertions.
    pub fn check_invariants(&self) -> Result<(), String> {
        let map = self.map();
        let root = self.root_id();
        let sections = self.section_ids();
        if sections.is_empty() {
            return Err("tree has no sections".into());
        }
        if sections.len() != self.sections.len() {
            return Err("section index out of sync".into());
        }
        for &s in &sections {
            if !self.is_section(s) {
                return Err(format!("non-section {s:?} directly under root"));
            }
        }
        for (&wid, &node) in &self.tree.data.windows {
            if self.window_at(node) != Some(wid) {
                return Err(format!("window index for {wid} points at the wrong node"));
            }
            if !node.ancestors(map).any(|a| a == root) {
                return Err(format!("window {wid} is detached from the tree"));
            }
        }
        let in_tree = root
            .traverse_preorder(map)
            .filter(|&n| self.window_at(n).is_some())
            .count();
        if in_tree != self.window_count() {
            return Err("window nodes and window index disagree".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_log::test;

    use super::*;

    fn w(n: u32) -> WindowId { WindowId(n) }

    fn names() -> WindowSet {
        let mut set = WindowSet::new();
        for (id, name) in [(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")] {
            set.insert(Window::new(w(id), name));
        }
        set
    }

    fn tree(sections: &[&str]) -> TabTree {
        let titles: Vec<String> = sections.iter().map(|s| s.to_string()).collect();
        TabTree::new(&titles, None).unwrap()
    }

    fn add(t: &mut TabTree, id: u32, hint: Option<u32>) {
        t.add_window(&Window::new(w(id), ""), hint.map(w));
    }

    fn trees(t: &TabTree) -> Value { Value::Object(t.client_trees(&names())) }

    #[test]
    fn windows_land_after_the_hint() {
        let mut t = tree(&["Default"]);
        add(&mut t, 1, None);
        add(&mut t, 2, None);
        add(&mut t, 3, Some(1));
        assert_eq!(trees(&t), json!({"Default": [["a"], ["c"], ["b"]]}));
        t.check_invariants().unwrap();
    }

    #[test]
    fn preferred_section_is_used_without_hint() {
        let mut t = tree(&["One", "Two"]);
        t.add_window(&Window::new(w(1), "a").with_section("Two"), None);
        t.add_window(&Window::new(w(2), "b").with_section("Missing"), None);
        assert_eq!(trees(&t), json!({"One": [["b"]], "Two": [["a"]]}));
    }

    #[test]
    fn client_trees_follow_section_order() {
        let mut t = tree(&["Zeta", "Alpha"]);
        t.add_section("Mid").unwrap();
        let trees = t.client_trees(&names());
        assert_eq!(trees.keys().collect::<Vec<_>>(), vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn removal_promotes_first_child_into_the_same_slot() {
        let mut t = tree(&["Default"]);
        for id in 1..=3 {
            add(&mut t, id, None);
        }
        t.move_right(w(2));
        t.move_right(w(3));
        t.move_right(w(3));
        assert_eq!(trees(&t), json!({"Default": [["a", ["b", ["c"]]]]}));

        assert!(t.remove_window(w(1)));
        assert_eq!(trees(&t), json!({"Default": [["b", ["c"]]]}));
        assert_eq!(t.window_count(), 2);
        t.check_invariants().unwrap();
    }

    #[test]
    fn removal_reparents_remaining_children_under_the_head() {
        let mut t = tree(&["Default"]);
        for id in 1..=5 {
            add(&mut t, id, None);
        }
        // a, [b, c, d] as children of a, then e at top level.
        for id in 2..=4 {
            t.move_right(w(id));
        }
        t.move_down(w(1));
        t.move_up(w(1));
        assert_eq!(trees(&t), json!({"Default": [["a", ["b"], ["c"], ["d"]], ["e"]]}));

        t.remove_window(w(1));
        assert_eq!(trees(&t), json!({"Default": [["b", ["c"], ["d"]], ["e"]]}));
        t.check_invariants().unwrap();
    }

    #[test]
    fn navigation_skips_collapsed_branches() {
        let mut t = tree(&["One", "Two"]);
        add(&mut t, 1, None);
        add(&mut t, 2, None);
        add(&mut t, 3, None);
        t.move_right(w(2));
        t.add_window(&Window::new(w(4), "d").with_section("Two"), None);

        let walk = |t: &TabTree| {
            let mut out = vec![];
            let mut cur = t.first_window();
            while let Some(wid) = cur {
                out.push(wid.0);
                cur = t.next_window(wid);
            }
            out
        };
        assert_eq!(walk(&t), vec![1, 2, 3, 4]);
        assert_eq!(t.prev_window(w(2)), Some(w(1)));
        assert_eq!(t.prev_window(w(4)), Some(w(3)));
        assert_eq!(t.prev_window(w(1)), None);
        assert_eq!(t.last_window(), Some(w(4)));

        t.set_expanded(w(1), false);
        assert_eq!(walk(&t), vec![1, 3, 4]);
        assert_eq!(t.prev_window(w(3)), Some(w(1)));
        assert_eq!(t.label(t.node_of(w(1)).unwrap(), &names()), "¹a");
    }

    #[test]
    fn section_management() {
        let mut t = tree(&["One", "Two", "Three"]);
        add(&mut t, 1, None);
        t.add_window(&Window::new(w(2), "b").with_section("Two"), None);
        t.add_window(&Window::new(w(3), "c").with_section("Three"), None);

        assert_eq!(t.add_section("Two"), Err(LayoutError::DuplicateSection("Two".into())));
        assert_eq!(t.del_section("Nope"), Err(LayoutError::SectionNotFound("Nope".into())));

        t.del_section("Two").unwrap();
        assert_eq!(trees(&t), json!({"One": [["a"], ["b"]], "Three": [["c"]]}));

        // Deleting the first section hands its windows to the next one and
        // makes that one the default.
        t.del_section("One").unwrap();
        assert_eq!(trees(&t), json!({"Three": [["c"], ["a"], ["b"]]}));
        assert_eq!(t.default_section_title(), Some("Three"));

        assert_eq!(t.del_section("Three"), Err(LayoutError::LastSection));
        assert_eq!(t.section_titles(), vec!["Three".to_owned()]);
        t.check_invariants().unwrap();
    }

    #[test]
    fn moves_between_sections_and_levels() {
        let mut t = tree(&["One", "Two"]);
        add(&mut t, 1, None);
        add(&mut t, 2, None);
        t.move_right(w(2));
        assert!(!t.move_left(w(1)));
        assert!(t.move_left(w(2)));
        assert_eq!(trees(&t), json!({"One": [["a"], ["b"]], "Two": []}));

        assert!(t.section_down(w(1)));
        assert!(!t.section_down(w(1)));
        assert_eq!(t.section_title_of(w(1)), Some("Two"));
        assert!(t.section_up(w(1)));
        assert_eq!(trees(&t), json!({"One": [["b"], ["a"]], "Two": []}));
        assert!(!t.move_down(w(1)));
        assert!(t.move_up(w(1)));
        assert!(!t.move_up(w(1)));
    }

    #[test]
    fn sort_creates_sections_on_demand() {
        let mut t = tree(&["Default"]);
        for id in 1..=3 {
            add(&mut t, id, None);
        }
        let classify = |wid: WindowId| match wid.0 {
            1 => Some("Web".to_owned()),
            2 => Some("Default".to_owned()),
            _ => None,
        };
        assert!(!t.sort(classify, false).unwrap());
        assert!(t.sort(classify, true).unwrap());
        assert_eq!(trees(&t), json!({"Default": [["b"], ["c"]], "Web": [["a"]]}));
    }

    #[test]
    fn empty_section_list_is_rejected() {
        assert!(matches!(TabTree::new(&[], None), Err(LayoutError::NoSections)));
        assert!(matches!(
            TabTree::new(&["a".into()], Some("b")),
            Err(LayoutError::SectionNotFound(_))
        ));
    }

    #[test]
    fn superscript_digits() {
        assert_eq!(superscript(0), "⁰");
        assert_eq!(superscript(12), "¹²");
    }
}
