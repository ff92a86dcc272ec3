use std::collections::HashMap;

use self::interner::Interner;
use self::osm::{EltKind, LatLon, LatLonBox, Member, Node, OsmId, Relation, Tagged, Way};
use crate::errors::Result;
use crate::loader::{LoadOptions, LoadStats};

pub mod interner;
pub mod osm;

/// Map data loaded from one or more OSM files.
///
/// Each element kind has a table (in file order) and a map from OSM id to
/// table index. Only elements present in a table have a map entry, so every
/// indexed lookup is in range. Indices are never reused or invalidated;
/// successive loads append.
#[derive(Debug)]
pub struct OsmStore<I: OsmId = u64> {
    pub(crate) options: LoadOptions,

    nodes: Vec<Node<I>>,
    node_ids: HashMap<I, u32>,
    ways: Vec<Way<I>>,
    way_ids: HashMap<I, u32>,
    relations: Vec<Relation<I>>,
    relation_ids: HashMap<I, u32>,

    interner: Interner,

    pub(crate) stats: LoadStats,
    pub(crate) file_bound: LatLonBox,
    pub(crate) load_bound: LatLonBox,
}

impl<I: OsmId> Default for OsmStore<I> {
    fn default() -> Self {
        OsmStore::new(LoadOptions::default())
    }
}

impl<I: OsmId> OsmStore<I> {
    pub fn new(options: LoadOptions) -> Self {
        OsmStore::with_interner(options, Interner::new())
    }

    /// Start from an existing string table, e.g. one taken from another store.
    pub fn with_interner(options: LoadOptions, interner: Interner) -> Self {
        OsmStore {
            options,
            // Small files are not what this is tuned for.
            nodes: Vec::with_capacity(10_000),
            node_ids: HashMap::with_capacity(10_000),
            ways: Vec::with_capacity(2_000),
            way_ids: HashMap::with_capacity(2_000),
            relations: Vec::with_capacity(1_000),
            relation_ids: HashMap::with_capacity(1_000),
            interner,
            stats: LoadStats::default(),
            file_bound: LatLonBox::closed(),
            load_bound: LatLonBox::closed(),
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn nodes(&self) -> &[Node<I>] {
        &self.nodes
    }

    pub fn ways(&self) -> &[Way<I>] {
        &self.ways
    }

    pub fn relations(&self) -> &[Relation<I>] {
        &self.relations
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn into_interner(self) -> Interner {
        self.interner
    }

    /// Statistics of the last load.
    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    /// Bounds announced by the last `<bounds>` element read. Closed if none.
    pub fn file_bound(&self) -> &LatLonBox {
        &self.file_bound
    }

    /// Extent of the nodes read by the last load.
    pub fn load_bound(&self) -> &LatLonBox {
        &self.load_bound
    }

    pub fn find_node_ix(&self, id: I) -> Option<u32> {
        self.node_ids.get(&id).copied()
    }

    pub fn find_way_ix(&self, id: I) -> Option<u32> {
        self.way_ids.get(&id).copied()
    }

    pub fn find_relation_ix(&self, id: I) -> Option<u32> {
        self.relation_ids.get(&id).copied()
    }

    pub fn find_ix(&self, kind: EltKind, id: I) -> Option<u32> {
        match kind {
            EltKind::Node => self.find_node_ix(id),
            EltKind::Way => self.find_way_ix(id),
            EltKind::Relation => self.find_relation_ix(id),
        }
    }

    pub fn node(&self, id: I) -> Option<&Node<I>> {
        self.find_node_ix(id).map(|ix| &self.nodes[ix as usize])
    }

    pub fn way(&self, id: I) -> Option<&Way<I>> {
        self.find_way_ix(id).map(|ix| &self.ways[ix as usize])
    }

    pub fn relation(&self, id: I) -> Option<&Relation<I>> {
        self.find_relation_ix(id).map(|ix| &self.relations[ix as usize])
    }

    /// Append a node. `None` when the id is already known: the first one wins.
    pub(crate) fn push_node(&mut self, id: I, pos: LatLon) -> Result<Option<u32>> {
        if self.node_ids.contains_key(&id) {
            return Ok(None);
        }
        let ix = u32::try_from(self.nodes.len())?;
        self.nodes.push(Node::new(id, pos));
        self.node_ids.insert(id, ix);
        Ok(Some(ix))
    }

    pub(crate) fn push_way(&mut self, id: I) -> Result<Option<u32>> {
        if self.way_ids.contains_key(&id) {
            return Ok(None);
        }
        let ix = u32::try_from(self.ways.len())?;
        self.ways.push(Way::new(id));
        self.way_ids.insert(id, ix);
        Ok(Some(ix))
    }

    pub(crate) fn push_relation(&mut self, id: I) -> Result<Option<u32>> {
        if self.relation_ids.contains_key(&id) {
            return Ok(None);
        }
        let ix = u32::try_from(self.relations.len())?;
        self.relations.push(Relation::new(id));
        self.relation_ids.insert(id, ix);
        Ok(Some(ix))
    }

    /// Append a node reference to a way. Returns false for an unknown node.
    pub(crate) fn push_way_node(&mut self, way_ix: u32, node_id: I) -> bool {
        match self.find_node_ix(node_id) {
            Some(node_ix) => {
                self.ways[way_ix as usize].nodes_ix.push(node_ix);
                true
            }
            None => false,
        }
    }

    /// Append a member to a relation. Returns false for an unknown target.
    pub(crate) fn push_member(&mut self, rel_ix: u32, kind: EltKind, id: I, role: &str) -> bool {
        let Some(ix) = self.find_ix(kind, id) else {
            return false;
        };
        let role = self.interner.intern(role);
        self.relations[rel_ix as usize]
            .members
            .push(Member { kind, ix, role });
        true
    }

    pub(crate) fn add_tag(&mut self, kind: EltKind, ix: u32, key: &str, value: &str) {
        let ix = ix as usize;
        let tags = match kind {
            EltKind::Node => self.nodes[ix].tags_mut(),
            EltKind::Way => self.ways[ix].tags_mut(),
            EltKind::Relation => self.relations[ix].tags_mut(),
        };
        tags.insert(key, value, &mut self.interner);
    }
}
