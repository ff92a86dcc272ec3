use std::path::Path;
use std::time::Instant;

use log::{error, info};
use serde::Deserialize;

use crate::data::osm::{LatLonBox, OsmId};
use crate::data::OsmStore;
use crate::errors::{Error, Result};
use crate::files::prefetch::{Prefetcher, BLOCK_SIZE};
use crate::files::source::{open_source, ByteSource};
use crate::parse::osm_xml::OsmXmlParser;

/// How an [`OsmStore`] reads its input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Check element nesting, required attributes and number syntax, and
    /// abort on the first violation. Off by default: it costs throughput and
    /// OSM dumps are machine generated.
    pub check_syntax: bool,
    /// Read and decompress the next block on a worker thread.
    pub prefetch: bool,
    pub block_size: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            check_syntax: false,
            prefetch: true,
            block_size: BLOCK_SIZE,
        }
    }
}

/// Counters of the last load. Reset at the start of every load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
    /// `<nd>` naming a node not loaded yet.
    pub bad_way_node_refs: u64,
    /// `<member>` naming an element not loaded yet, or of unknown type.
    pub bad_relation_refs: u64,
    /// Elements skipped because their id was already loaded.
    pub duplicates: u64,
    /// Decompressed bytes read.
    pub bytes: u64,
    /// False when the input could not be opened, which an empty file
    /// otherwise looks like.
    pub source_live: bool,
}

impl LoadStats {
    /// Every reference resolved.
    pub fn is_clean(&self) -> bool {
        self.bad_way_node_refs == 0 && self.bad_relation_refs == 0
    }
}

impl<I: OsmId> OsmStore<I> {
    /// Append the content of an OSM XML file, plain or `.bz2`/`.xz`/`.gz`.
    ///
    /// An unreadable file is logged and loads nothing. With
    /// [`LoadOptions::check_syntax`], a malformed document aborts with a
    /// syntax error and leaves whatever was read before it in the tables.
    pub fn load(&mut self, path: &Path) -> Result<&LoadStats> {
        self.load_clipped(path, &LatLonBox::open())
    }

    /// Like [`load`](Self::load), restricted to `clip`.
    ///
    /// Only the open box is supported for now.
    pub fn load_clipped(&mut self, path: &Path, clip: &LatLonBox) -> Result<&LoadStats> {
        if !clip.is_open() {
            return Err(Error::unsupported("loading with a restrictive clip box"));
        }
        let label = path.display().to_string();
        self.load_source(open_source(path), &label)
    }

    /// Append a document read from any [`ByteSource`].
    pub fn load_source(&mut self, source: Box<dyn ByteSource>, label: &str) -> Result<&LoadStats> {
        self.stats = LoadStats::default();
        self.load_bound = LatLonBox::closed();

        info!(source = label, check_syntax = self.options.check_syntax, prefetch = self.options.prefetch; "Starting load");
        let started = Instant::now();
        self.stats.source_live = source.is_live();

        let mut input = Prefetcher::new(source, self.options.block_size, self.options.prefetch);
        let strict = self.options.check_syntax;
        let result = OsmXmlParser::new(self, strict).parse(&mut input);
        self.stats.bytes = input.total_bytes();
        drop(input);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(()) => {
                info!(
                    source = label,
                    elapsed_ms = elapsed_ms,
                    bytes = self.stats.bytes,
                    source_live = self.stats.source_live,
                    nodes = self.stats.nodes,
                    ways = self.stats.ways,
                    relations = self.stats.relations,
                    bad_way_node_refs = self.stats.bad_way_node_refs,
                    bad_relation_refs = self.stats.bad_relation_refs,
                    duplicates = self.stats.duplicates;
                    "Load finished"
                );
                Ok(&self.stats)
            }
            Err(err) => {
                error!(
                    source = label,
                    err = err.message.as_str(),
                    nodes = self.stats.nodes,
                    ways = self.stats.ways,
                    relations = self.stats.relations;
                    "Load aborted"
                );
                Err(err)
            }
        }
    }
}
