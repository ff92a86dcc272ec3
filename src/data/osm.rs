//! In-memory representation of OSM elements.
//!
//! Latitudes and longitudes are fixed point integers with a 1e-7 degree LSB,
//! the textual precision of OSM XML. The full [-180, 180] range fits in 32 bits.
//! Ways and relations refer to other elements by index into the owning
//! [`OsmStore`](crate::OsmStore) tables, never by identifier or address.

use std::{fmt, hash::Hash, sync::Arc};

use super::interner::Interner;

pub type LatLonT = i32;

/// Size of one fixed point unit, in degrees.
pub const LATLON_LSB: f64 = 1.0e-7;

/// Number of fixed point units per degree.
pub const LATLON_SCALE: i64 = 10_000_000;

/// Largest magnitude a [`LatLonBox`] edge takes (180 degrees).
pub const LATLON_MAX: LatLonT = 180 * 10_000_000;

/// Largest valid latitude magnitude (90 degrees).
pub const LAT_MAX: LatLonT = 90 * 10_000_000;

pub fn degree(g: LatLonT) -> f64 {
    g as f64 * LATLON_LSB
}

/// Fold any angle into [-180, 180).
pub fn canonical_deg(g: f64) -> f64 {
    let g = g % 360.0;
    if g >= 180.0 {
        g - 360.0
    } else if g < -180.0 {
        g + 360.0
    } else {
        g
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LatLon {
    pub lat: LatLonT,
    pub lon: LatLonT,
}

impl LatLon {
    pub fn new(lat: LatLonT, lon: LatLonT) -> Self {
        LatLon { lat, lon }
    }

    /// Rounds to the nearest fixed point unit after canonicalising both angles.
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        LatLon {
            lat: (canonical_deg(lat) / LATLON_LSB).round() as LatLonT,
            lon: (canonical_deg(lon) / LATLON_LSB).round() as LatLonT,
        }
    }

    pub fn deg_lat(&self) -> f64 {
        degree(self.lat)
    }

    pub fn deg_lon(&self) -> f64 {
        degree(self.lon)
    }
}

/// A lat/lon rectangle.
///
/// [`LatLonBox::closed`] is the starting point for [`LatLonBox::extend`];
/// [`LatLonBox::open`] means "no restriction".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatLonBox {
    pub min: LatLon,
    pub max: LatLon,
}

impl LatLonBox {
    /// The whole domain.
    pub const fn open() -> Self {
        LatLonBox {
            min: LatLon { lat: -LATLON_MAX, lon: -LATLON_MAX },
            max: LatLon { lat: LATLON_MAX, lon: LATLON_MAX },
        }
    }

    /// The empty box: identity element of `extend`.
    pub const fn closed() -> Self {
        LatLonBox {
            min: LatLon { lat: LATLON_MAX, lon: LATLON_MAX },
            max: LatLon { lat: -LATLON_MAX, lon: -LATLON_MAX },
        }
    }

    pub fn extend(&mut self, ll: LatLon) {
        self.min.lat = self.min.lat.min(ll.lat);
        self.max.lat = self.max.lat.max(ll.lat);
        self.min.lon = self.min.lon.min(ll.lon);
        self.max.lon = self.max.lon.max(ll.lon);
    }

    pub fn is_open(&self) -> bool {
        *self == LatLonBox::open()
    }

    /// True until the first `extend` after `closed()`.
    pub fn is_empty(&self) -> bool {
        self.min.lat > self.max.lat || self.min.lon > self.max.lon
    }

    pub fn contains(&self, ll: LatLon) -> bool {
        (self.min.lat..=self.max.lat).contains(&ll.lat)
            && (self.min.lon..=self.max.lon).contains(&ll.lon)
    }

    pub fn deg_min_lat(&self) -> f64 {
        degree(self.min.lat)
    }

    pub fn deg_max_lat(&self) -> f64 {
        degree(self.max.lat)
    }

    pub fn deg_min_lon(&self) -> f64 {
        degree(self.min.lon)
    }

    pub fn deg_max_lon(&self) -> f64 {
        degree(self.max.lon)
    }
}

/// Identifier of an OSM element, unique per element kind.
///
/// OSM XML declares ids as `unsignedLong`; `u32` is enough for many extracts
/// and halves the memory of every id map entry.
pub trait OsmId:
    Copy + Default + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const MAX: u64;

    /// Keeps the low bits of `value` when it does not fit.
    fn from_u64_truncating(value: u64) -> Self;

    fn to_u64(self) -> u64;
}

impl OsmId for u64 {
    const MAX: u64 = u64::MAX;

    fn from_u64_truncating(value: u64) -> Self {
        value
    }

    fn to_u64(self) -> u64 {
        self
    }
}

impl OsmId for u32 {
    const MAX: u64 = u32::MAX as u64;

    fn from_u64_truncating(value: u64) -> Self {
        value as u32
    }

    fn to_u64(self) -> u64 {
        self as u64
    }
}

/// The three OSM element kinds. Each has its own id namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EltKind {
    Node,
    Way,
    Relation,
}

impl EltKind {
    /// Decode a relation member `type` attribute.
    pub fn from_type_attr(value: &[u8]) -> Option<Self> {
        match value {
            b"node" => Some(EltKind::Node),
            b"way" => Some(EltKind::Way),
            b"relation" => Some(EltKind::Relation),
            _ => None,
        }
    }
}

/// Rendering class derived from well known tag keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagKind {
    #[default]
    Unknown,
    Building,
    Highway,
    Waterway,
    Railway,
}

impl TagKind {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "building" => Some(TagKind::Building),
            "highway" => Some(TagKind::Highway),
            "railway" => Some(TagKind::Railway),
            "waterway" => Some(TagKind::Waterway),
            _ => None,
        }
    }
}

/// A `key=value` pair whose strings are shared through the store's [`Interner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPair {
    pub key: Arc<str>,
    pub value: Arc<str>,
}

/// Set of tags attached to an element.
///
/// Most nodes carry none, so elements hold an `Option<Box<Tags>>` that stays
/// `None` until the first tag arrives; readers see [`NIL_TAGS`] meanwhile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tags {
    name: Option<Box<str>>,
    layer: i8,
    kind: TagKind,
    count: u32,
    pairs: Vec<TagPair>,
}

/// Shared, always empty tag set.
pub static NIL_TAGS: Tags = Tags::EMPTY;

impl Default for Tags {
    fn default() -> Self {
        Tags::EMPTY
    }
}

impl Tags {
    pub const EMPTY: Tags = Tags {
        name: None,
        layer: 0,
        kind: TagKind::Unknown,
        count: 0,
        pairs: Vec::new(),
    };

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 0 is ground level, -1 a tunnel and so on. Nominally in [-5, 5], not checked.
    pub fn layer(&self) -> i8 {
        self.layer
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    /// Number of tags seen, `name` and `layer` included.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Tags other than `name` and `layer`, in document order.
    pub fn pairs(&self) -> &[TagPair] {
        &self.pairs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|pair| &*pair.key == key)
            .map(|pair| &*pair.value)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.pairs.is_empty()
    }

    pub(crate) fn insert(&mut self, key: &str, value: &str, interner: &mut Interner) {
        self.count = self.count.saturating_add(1);
        match key {
            "name" => self.name = Some(value.into()),
            "layer" => self.layer = crate::parse::numbers::parse_layer(value),
            _ => {
                self.pairs.push(TagPair {
                    key: interner.intern(key),
                    value: interner.intern(value),
                });
                if let Some(kind) = TagKind::from_key(key) {
                    self.kind = kind;
                }
            }
        }
    }
}

/// Common access to the lazily allocated tag set of an element.
pub trait Tagged {
    #[doc(hidden)]
    fn tag_slot(&self) -> &Option<Box<Tags>>;

    #[doc(hidden)]
    fn tag_slot_mut(&mut self) -> &mut Option<Box<Tags>>;

    fn tags(&self) -> &Tags {
        self.tag_slot().as_deref().unwrap_or(&NIL_TAGS)
    }

    /// At least one name or `key=value` tag. A lone `layer` does not count.
    fn has_tags(&self) -> bool {
        !self.tags().is_empty()
    }

    fn tags_mut(&mut self) -> &mut Tags {
        self.tag_slot_mut().get_or_insert_with(Box::default)
    }
}

macro_rules! impl_tagged {
    ($($elt:ident),*) => {
        $(
            impl<I> Tagged for $elt<I> {
                fn tag_slot(&self) -> &Option<Box<Tags>> {
                    &self.tags
                }

                fn tag_slot_mut(&mut self) -> &mut Option<Box<Tags>> {
                    &mut self.tags
                }
            }
        )*
    };
}

impl_tagged!(Node, Way, Relation);

/// A point on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<I> {
    pub id: I,
    pub pos: LatLon,
    pub(crate) tags: Option<Box<Tags>>,
}

impl<I> Node<I> {
    pub fn new(id: I, pos: LatLon) -> Self {
        Node { id, pos, tags: None }
    }
}

/// Ordered list of nodes forming a line or outlining an area.
#[derive(Debug, Clone, PartialEq)]
pub struct Way<I> {
    pub id: I,
    /// Indices into the node table. Unresolved references are dropped, not stored.
    pub nodes_ix: Vec<u32>,
    pub(crate) tags: Option<Box<Tags>>,
}

impl<I> Way<I> {
    pub fn new(id: I) -> Self {
        Way { id, nodes_ix: Vec::new(), tags: None }
    }

    /// Same node first and last.
    pub fn is_loop(&self) -> bool {
        match (self.nodes_ix.first(), self.nodes_ix.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub kind: EltKind,
    /// Index into the table selected by `kind`.
    pub ix: u32,
    pub role: Arc<str>,
}

/// Group of nodes, ways and relations (recursively).
#[derive(Debug, Clone, PartialEq)]
pub struct Relation<I> {
    pub id: I,
    pub members: Vec<Member>,
    pub(crate) tags: Option<Box<Tags>>,
}

impl<I> Relation<I> {
    pub fn new(id: I) -> Self {
        Relation { id, members: Vec::new(), tags: None }
    }
}
