//! In-memory loader for OpenStreetMap XML extracts.
//!
//! ```no_run
//! use std::path::Path;
//! use osm_text_loader::{OsmStore, Tagged};
//!
//! let mut store: OsmStore = OsmStore::default();
//! let stats = store.load(Path::new("grenoble.osm.bz2"))?;
//! println!("{} nodes, {} bad way refs", stats.nodes, stats.bad_way_node_refs);
//! for way in store.ways().iter().filter(|w| w.has_tags()) {
//!     println!("{:?} {}", way.tags().kind(), way.nodes_ix.len());
//! }
//! # Ok::<(), osm_text_loader::Error>(())
//! ```

pub mod census;
pub mod data;
pub mod errors;
pub mod files;
pub mod loader;
pub mod parse;

pub use crate::census::{Census, TaggedCount};
pub use crate::data::interner::Interner;
pub use crate::data::osm::{
    canonical_deg, degree, EltKind, LatLon, LatLonBox, LatLonT, Member, Node, OsmId, Relation,
    TagKind, TagPair, Tagged, Tags, Way,
};
pub use crate::data::OsmStore;
pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::files::prefetch::{Prefetcher, BLOCK_SIZE};
pub use crate::files::source::{open_source, ByteSource, Compression, StreamSource};
pub use crate::loader::{LoadOptions, LoadStats};
