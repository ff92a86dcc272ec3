//! Whole-store statistics, mostly useful to decide what a loader could
//! afford to drop (untagged nodes nobody references, for instance).

use serde::Serialize;

use crate::data::osm::{EltKind, OsmId, Tagged};
use crate::data::OsmStore;

/// Buckets of the node reference histogram; the last one is "this many or more".
pub const REF_BUCKETS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaggedCount {
    pub tagged: u64,
    pub untagged: u64,
}

impl TaggedCount {
    fn count<'a, T: Tagged + 'a>(elements: impl Iterator<Item = &'a T>) -> Self {
        let mut out = TaggedCount::default();
        for element in elements {
            if element.has_tags() {
                out.tagged += 1;
            } else {
                out.untagged += 1;
            }
        }
        out
    }

    pub fn total(&self) -> u64 {
        self.tagged + self.untagged
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Census {
    pub nodes: TaggedCount,
    pub ways: TaggedCount,
    pub relations: TaggedCount,
    /// Nodes no way and no relation points to.
    pub unreferenced_nodes: u64,
    /// Nodes referenced by something that still carry their own tags.
    pub referenced_tagged_nodes: u64,
    /// Nodes a relation points to directly while having no tags.
    pub relation_nodes_without_tags: u64,
    /// Ways whose last node is their first.
    pub loops: u64,
    /// `node_refs[k]`: nodes referenced exactly `k` times by ways and relations.
    pub node_refs: [u64; REF_BUCKETS],
}

impl<I: OsmId> OsmStore<I> {
    /// Walk every table once and count.
    pub fn census(&self) -> Census {
        let nodes = self.nodes();
        let mut refs = vec![0u32; nodes.len()];
        let mut relation_refs = vec![false; nodes.len()];

        for way in self.ways() {
            for &ix in &way.nodes_ix {
                refs[ix as usize] += 1;
            }
        }
        for relation in self.relations() {
            for member in relation.members.iter().filter(|m| m.kind == EltKind::Node) {
                refs[member.ix as usize] += 1;
                relation_refs[member.ix as usize] = true;
            }
        }

        let mut census = Census {
            nodes: TaggedCount::count(nodes.iter()),
            ways: TaggedCount::count(self.ways().iter()),
            relations: TaggedCount::count(self.relations().iter()),
            loops: self.ways().iter().filter(|w| w.is_loop()).count() as u64,
            ..Census::default()
        };
        for (ix, node) in nodes.iter().enumerate() {
            let count = refs[ix];
            census.node_refs[(count as usize).min(REF_BUCKETS - 1)] += 1;
            match (count, node.has_tags()) {
                (0, _) => census.unreferenced_nodes += 1,
                (_, true) => census.referenced_tagged_nodes += 1,
                (_, false) if relation_refs[ix] => census.relation_nodes_without_tags += 1,
                _ => {}
            }
        }
        census
    }
}
