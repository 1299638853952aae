//! Explicit tree-walk over the archive's variable hierarchy.
//!
//! Nodes are addressed by *cleaned* names so that paths can be typed on a
//! command line: a leading digit gets a `_` prefix, and spaces, `;`, `<`, `>`
//! and `_` all become `_`.

use crate::archive::{ArchiveClient, ArchiveError};
use crate::domain::{HierarchyNode, NodeId, VariableId};
use std::collections::BTreeMap;

/// Command-line friendly form of a hierarchy name.
pub fn clean_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.push('_');
    }
    out.extend(name.chars().map(|c| match c {
        ' ' | '_' | ';' | '>' | '<' => '_',
        other => other,
    }));
    out
}

/// Contents of one hierarchy level.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// `None` at the top of the tree.
    pub node: Option<HierarchyNode>,
    /// Children keyed by cleaned name, sorted.
    pub children: BTreeMap<String, HierarchyNode>,
    /// Variables attached to this node; always empty at the top.
    pub variables: Vec<VariableId>,
}

pub struct HierarchyWalker<'a> {
    archive: &'a dyn ArchiveClient,
}

impl<'a> HierarchyWalker<'a> {
    pub fn new(archive: &'a dyn ArchiveClient) -> Self {
        Self { archive }
    }

    pub fn roots(&self) -> Result<Vec<HierarchyNode>, ArchiveError> {
        self.archive.hierarchy_roots()
    }

    pub fn children(&self, node: &NodeId) -> Result<Vec<HierarchyNode>, ArchiveError> {
        self.archive.hierarchy_children(node)
    }

    pub fn attached_variables(&self, node: &NodeId) -> Result<Vec<VariableId>, ArchiveError> {
        self.archive.attached_variables(node)
    }

    fn child_map(&self, node: Option<&NodeId>) -> Result<BTreeMap<String, HierarchyNode>, ArchiveError> {
        let nodes = match node {
            None => self.roots()?,
            Some(id) => self.children(id)?,
        };
        Ok(nodes
            .into_iter()
            .map(|n| (clean_name(&n.name), n))
            .collect())
    }

    /// Descend from the top by cleaned names. An empty path is the top
    /// itself (`Ok(None)`); a segment that does not exist is rejected.
    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Result<Option<HierarchyNode>, ArchiveError> {
        let mut current: Option<HierarchyNode> = None;
        for segment in path {
            let segment = segment.as_ref();
            let mut level = self.child_map(current.as_ref().map(|n| &n.id))?;
            let next = level.remove(segment).ok_or_else(|| {
                let parent = current
                    .as_ref()
                    .map_or_else(|| "top".to_string(), |n| n.name.clone());
                ArchiveError::Rejected(format!("no hierarchy node '{segment}' under '{parent}'"))
            })?;
            current = Some(next);
        }
        Ok(current)
    }

    /// Children and attached variables of the node at `path`.
    pub fn list<S: AsRef<str>>(&self, path: &[S]) -> Result<Listing, ArchiveError> {
        let node = self.find(path)?;
        let children = self.child_map(node.as_ref().map(|n| &n.id))?;
        let variables = match &node {
            Some(n) => self.attached_variables(&n.id)?,
            None => Vec::new(),
        };
        Ok(Listing {
            node,
            children,
            variables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;

    fn node(id: &str, name: &str) -> HierarchyNode {
        HierarchyNode {
            id: NodeId::new(id),
            name: name.into(),
            description: String::new(),
        }
    }

    fn archive() -> MemoryArchive {
        MemoryArchive::new()
            .with_node(node("1", "LHC"), None, vec![])
            .with_node(node("2", "Beam Instrumentation"), Some(NodeId::new("1")), vec![])
            .with_node(
                node("3", "BCT<DC>"),
                Some(NodeId::new("2")),
                vec!["LHC.BCTDC.A6R4.B1:BEAM_INTENSITY".into()],
            )
            .with_node(node("4", "2018 MD"), Some(NodeId::new("1")), vec![])
    }

    #[test]
    fn cleaning_rules() {
        assert_eq!(clean_name("Beam Instrumentation"), "Beam_Instrumentation");
        assert_eq!(clean_name("BCT<DC>"), "BCT_DC_");
        assert_eq!(clean_name("2018 MD"), "_2018_MD");
        assert_eq!(clean_name("a;b"), "a_b");
        assert_eq!(clean_name(""), "");
    }

    #[test]
    fn walk_by_cleaned_path() {
        let a = archive();
        let walker = HierarchyWalker::new(&a);
        let found = walker
            .find(&["LHC", "Beam_Instrumentation", "BCT_DC_"])
            .unwrap()
            .unwrap();
        assert_eq!(found.id, NodeId::new("3"));
        assert_eq!(
            walker.attached_variables(&found.id).unwrap(),
            vec![VariableId::from("LHC.BCTDC.A6R4.B1:BEAM_INTENSITY")]
        );
    }

    #[test]
    fn top_listing_has_roots_and_no_variables() {
        let a = archive();
        let listing = HierarchyWalker::new(&a).list::<&str>(&[]).unwrap();
        assert!(listing.node.is_none());
        assert_eq!(listing.children.keys().collect::<Vec<_>>(), vec!["LHC"]);
        assert!(listing.variables.is_empty());
    }

    #[test]
    fn children_are_sorted_by_cleaned_name() {
        let a = archive();
        let listing = HierarchyWalker::new(&a).list(&["LHC"]).unwrap();
        assert_eq!(
            listing.children.keys().collect::<Vec<_>>(),
            vec!["Beam_Instrumentation", "_2018_MD"]
        );
    }

    #[test]
    fn unknown_segment_is_rejected() {
        let a = archive();
        let err = HierarchyWalker::new(&a).find(&["LHC", "RF"]).unwrap_err();
        assert_eq!(
            err,
            ArchiveError::Rejected("no hierarchy node 'RF' under 'LHC'".into())
        );
    }
}
