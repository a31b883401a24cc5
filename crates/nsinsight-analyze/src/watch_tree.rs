//! Prefix tree over watched directory paths.
//!
//! Used to find a small set of common ancestors so that the full file
//! collection is filtered once per ancestor, and each watched directory is
//! then re-filtered from its ancestor's (much smaller) subset.

use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
    terminal: bool,
}

/// Prefix tree of path segments.
#[derive(Debug, Default)]
pub struct WatchTree {
    root: TreeNode,
}

impl WatchTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a set of paths.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.insert(path.as_ref());
        }
        tree
    }

    /// Insert a path.
    pub fn insert(&mut self, path: &str) {
        let mut node = &mut self.root;
        for segment in segments(path) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.terminal = true;
    }

    /// Check if the tree holds no paths.
    pub fn is_empty(&self) -> bool {
        !self.root.terminal && self.root.children.is_empty()
    }

    /// Minimal set of ancestors covering every inserted path.
    ///
    /// Paths are grouped by their first segment and each group collapses to
    /// its longest common prefix. No returned ancestor lies beneath another,
    /// and every inserted path lies beneath (or equals) exactly one of them.
    /// Output is sorted.
    pub fn common_ancestors(&self) -> Vec<String> {
        if self.root.terminal {
            return vec!["/".to_string()];
        }

        let mut ancestors = Vec::with_capacity(self.root.children.len());
        for (first, child) in &self.root.children {
            let mut path = format!("/{first}");
            let mut node = child;
            while !node.terminal && node.children.len() == 1 {
                let Some((segment, next)) = node.children.iter().next() else {
                    break;
                };
                path.push('/');
                path.push_str(segment);
                node = next;
            }
            ancestors.push(path);
        }
        ancestors
    }
}

/// Canonical form of a directory path: one separator between segments, no
/// trailing separator, and `/` for the root.
///
/// Ancestors returned by [`WatchTree::common_ancestors`] are in this form, so
/// watched paths must be too for segment-wise containment checks to hold.
pub fn canonical_path(path: &str) -> String {
    let mut canonical = String::with_capacity(path.len());
    for segment in segments(path) {
        canonical.push('/');
        canonical.push_str(segment);
    }
    if canonical.is_empty() {
        canonical.push('/');
    }
    canonical
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
