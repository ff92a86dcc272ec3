//! Single pass OSM XML reader building the tables of an [`OsmStore`].
//!
//! Only `osm`, `bounds`, `node`, `way`, `relation`, `nd`, `member` and `tag`
//! matter; anything else is skipped. References are resolved on the spot
//! against what has been read so far: OSM files list nodes, then ways, then
//! relations, so forward references are dropped and counted rather than
//! patched later.
//!
//! In relaxed mode the structural checks are skipped and a malformed
//! document gives partial tables without an error.

use std::borrow::Cow;
use std::io::BufRead;

use log::warn;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::numbers::{parse_id, parse_lat, parse_latlon};
use crate::data::osm::{EltKind, LatLon, OsmId};
use crate::data::OsmStore;
use crate::errors::{Error, Result};

enum Element {
    Osm,
    Bounds,
    Node,
    Way,
    Relation,
    Nd,
    Member,
    Tag,
    Other,
}

impl Element {
    fn classify(name: &[u8]) -> Self {
        match name {
            b"osm" => Element::Osm,
            b"bounds" => Element::Bounds,
            b"node" => Element::Node,
            b"way" => Element::Way,
            b"relation" => Element::Relation,
            b"nd" => Element::Nd,
            b"member" => Element::Member,
            b"tag" => Element::Tag,
            _ => Element::Other,
        }
    }
}

/// The element whose children are being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    None,
    Elt(EltKind, u32),
    /// Duplicate id: children are read and discarded.
    Ignored(EltKind),
}

impl Open {
    fn kind(self) -> Option<EltKind> {
        match self {
            Open::Elt(kind, _) | Open::Ignored(kind) => Some(kind),
            Open::None => None,
        }
    }
}

fn element_name(kind: EltKind) -> &'static str {
    match kind {
        EltKind::Node => "node",
        EltKind::Way => "way",
        EltKind::Relation => "relation",
    }
}

pub(crate) struct OsmXmlParser<'s, I: OsmId> {
    store: &'s mut OsmStore<I>,
    strict: bool,
    open: Open,
}

impl<'s, I: OsmId> OsmXmlParser<'s, I> {
    pub(crate) fn new(store: &'s mut OsmStore<I>, strict: bool) -> Self {
        OsmXmlParser {
            store,
            strict,
            open: Open::None,
        }
    }

    pub(crate) fn parse<R: BufRead>(mut self, input: R) -> Result<()> {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        reader.check_end_names(self.strict);

        let mut buf = Vec::with_capacity(4096);
        let mut depth = 0usize;
        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(err) => {
                    let offset = reader.buffer_position();
                    if self.strict {
                        return Err(Error::from(err).at(offset));
                    }
                    warn!(offset = offset, err = err.to_string().as_str(); "Malformed OSM document, keeping what was read");
                    return Ok(());
                }
            };
            let handled = match event {
                Event::Start(e) => {
                    depth += 1;
                    self.start_element(&e)
                }
                Event::Empty(e) => self
                    .start_element(&e)
                    .and_then(|()| self.end_element(e.name().as_ref())),
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    self.end_element(e.name().as_ref())
                }
                Event::Text(_) if self.strict => Err(Error::syntax("unexpected text content")),
                Event::Eof => {
                    if self.strict && depth > 0 {
                        return Err(Error::syntax_at(
                            reader.buffer_position(),
                            format!("document ends with {depth} open element(s)"),
                        ));
                    }
                    return Ok(());
                }
                _ => Ok(()),
            };
            handled.map_err(|err| err.at(reader.buffer_position()))?;
            buf.clear();
        }
    }

    fn start_element(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match Element::classify(e.name().as_ref()) {
            Element::Osm | Element::Other => Ok(()),
            Element::Bounds => self.bounds(e),
            Element::Node => self.open_node(e),
            Element::Way => self.open_way(e),
            Element::Relation => self.open_relation(e),
            Element::Nd => self.nd(e),
            Element::Member => self.member(e),
            Element::Tag => self.tag(e),
        }
    }

    fn end_element(&mut self, name: &[u8]) -> Result<()> {
        let kind = match Element::classify(name) {
            Element::Node => EltKind::Node,
            Element::Way => EltKind::Way,
            Element::Relation => EltKind::Relation,
            _ => return Ok(()),
        };
        if self.strict && self.open.kind() != Some(kind) {
            return Err(Error::syntax(format!("unexpected </{}>", element_name(kind))));
        }
        self.open = Open::None;
        Ok(())
    }

    /// Missing attributes are an error when checking, empty text otherwise.
    fn required<T: Default>(&self, value: Option<T>, elt: &str, attr: &str) -> Result<T> {
        match value {
            Some(value) => Ok(value),
            None if self.strict => Err(Error::syntax(format!("<{elt}> without {attr}"))),
            None => Ok(T::default()),
        }
    }

    fn expect_none_open(&self, kind: EltKind) -> Result<()> {
        if self.strict && self.open != Open::None {
            return Err(Error::syntax(format!(
                "<{}> nested in another element",
                element_name(kind)
            )));
        }
        Ok(())
    }

    fn bounds(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let strict = self.strict;
        let (mut minlat, mut maxlat, mut minlon, mut maxlon) = (None, None, None, None);
        for_each_attr(e, strict, |attr| {
            match attr.key.as_ref() {
                b"minlat" => minlat = Some(parse_lat(&attr.value, strict)?),
                b"maxlat" => maxlat = Some(parse_lat(&attr.value, strict)?),
                b"minlon" => minlon = Some(parse_latlon(&attr.value, strict)?),
                b"maxlon" => maxlon = Some(parse_latlon(&attr.value, strict)?),
                _ => {}
            }
            Ok(())
        })?;
        let bound = &mut self.store.file_bound;
        bound.min.lat = minlat.unwrap_or_default();
        bound.max.lat = maxlat.unwrap_or_default();
        bound.min.lon = minlon.unwrap_or_default();
        bound.max.lon = maxlon.unwrap_or_default();
        if strict && [minlat, maxlat, minlon, maxlon].iter().any(Option::is_none) {
            return Err(Error::syntax("<bounds> missing a limit"));
        }
        Ok(())
    }

    fn open_node(&mut self, e: &BytesStart<'_>) -> Result<()> {
        self.expect_none_open(EltKind::Node)?;
        let strict = self.strict;
        let (mut id, mut lat, mut lon) = (None, None, None);
        for_each_attr(e, strict, |attr| {
            match attr.key.as_ref() {
                b"id" => id = Some(parse_id::<I>(&attr.value, strict)?),
                b"lat" => lat = Some(parse_lat(&attr.value, strict)?),
                b"lon" => lon = Some(parse_latlon(&attr.value, strict)?),
                _ => {}
            }
            Ok(())
        })?;
        let id = self.required(id, "node", "id")?;
        let pos = LatLon::new(self.required(lat, "node", "lat")?, self.required(lon, "node", "lon")?);

        self.open = match self.store.push_node(id, pos)? {
            Some(ix) => {
                // Counted even if no way ever uses it.
                self.store.load_bound.extend(pos);
                self.store.stats.nodes += 1;
                Open::Elt(EltKind::Node, ix)
            }
            None => self.duplicate(EltKind::Node),
        };
        Ok(())
    }

    fn open_way(&mut self, e: &BytesStart<'_>) -> Result<()> {
        self.expect_none_open(EltKind::Way)?;
        let id = self.id_attr(e, "way")?;
        self.open = match self.store.push_way(id)? {
            Some(ix) => {
                self.store.stats.ways += 1;
                Open::Elt(EltKind::Way, ix)
            }
            None => self.duplicate(EltKind::Way),
        };
        Ok(())
    }

    fn open_relation(&mut self, e: &BytesStart<'_>) -> Result<()> {
        self.expect_none_open(EltKind::Relation)?;
        let id = self.id_attr(e, "relation")?;
        self.open = match self.store.push_relation(id)? {
            Some(ix) => {
                self.store.stats.relations += 1;
                Open::Elt(EltKind::Relation, ix)
            }
            None => self.duplicate(EltKind::Relation),
        };
        Ok(())
    }

    fn duplicate(&mut self, kind: EltKind) -> Open {
        self.store.stats.duplicates += 1;
        Open::Ignored(kind)
    }

    fn id_attr(&self, e: &BytesStart<'_>, elt: &str) -> Result<I> {
        let strict = self.strict;
        let mut id = None;
        for_each_attr(e, strict, |attr| {
            if attr.key.as_ref() == b"id" {
                id = Some(parse_id::<I>(&attr.value, strict)?);
            }
            Ok(())
        })?;
        self.required(id, elt, "id")
    }

    fn nd(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let way_ix = match self.open {
            Open::Elt(EltKind::Way, ix) => ix,
            Open::Ignored(EltKind::Way) => return Ok(()),
            _ if self.strict => return Err(Error::syntax("<nd> outside of a way")),
            _ => return Ok(()),
        };
        let strict = self.strict;
        let mut node_ref = None;
        for_each_attr(e, strict, |attr| {
            if attr.key.as_ref() == b"ref" {
                node_ref = Some(parse_id::<I>(&attr.value, strict)?);
            }
            Ok(())
        })?;
        let node_ref = self.required(node_ref, "nd", "ref")?;
        if !self.store.push_way_node(way_ix, node_ref) {
            self.store.stats.bad_way_node_refs += 1;
        }
        Ok(())
    }

    fn member(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let rel_ix = match self.open {
            Open::Elt(EltKind::Relation, ix) => ix,
            Open::Ignored(EltKind::Relation) => return Ok(()),
            _ if self.strict => return Err(Error::syntax("<member> outside of a relation")),
            _ => return Ok(()),
        };
        let strict = self.strict;
        let (mut kind, mut target, mut role) = (None, None, None);
        for_each_attr(e, strict, |attr| {
            match attr.key.as_ref() {
                b"type" => kind = Some(EltKind::from_type_attr(&attr.value)),
                b"ref" => target = Some(parse_id::<I>(&attr.value, strict)?),
                b"role" => role = Some(attr_text(&attr, strict)?),
                _ => {}
            }
            Ok(())
        })?;
        let target = self.required(target, "member", "ref")?;
        let kind = match kind.flatten() {
            Some(kind) => kind,
            None if strict => return Err(Error::syntax("<member> with a missing or unknown type")),
            None => {
                self.store.stats.bad_relation_refs += 1;
                return Ok(());
            }
        };
        if !self.store.push_member(rel_ix, kind, target, role.as_deref().unwrap_or("")) {
            self.store.stats.bad_relation_refs += 1;
        }
        Ok(())
    }

    fn tag(&mut self, e: &BytesStart<'_>) -> Result<()> {
        // Tags of changesets and the like have no element to land on.
        let Open::Elt(kind, ix) = self.open else {
            return Ok(());
        };
        let strict = self.strict;
        let (mut key, mut value) = (None, None);
        for_each_attr(e, strict, |attr| {
            match attr.key.as_ref() {
                b"k" => key = Some(attr_text(&attr, strict)?),
                b"v" => value = Some(attr_text(&attr, strict)?),
                _ => {}
            }
            Ok(())
        })?;
        let key = self.required(key, "tag", "k")?;
        let value = self.required(value, "tag", "v")?;
        self.store.add_tag(kind, ix, &key, &value);
        Ok(())
    }
}

fn for_each_attr<'a>(
    e: &'a BytesStart<'_>,
    strict: bool,
    mut f: impl FnMut(Attribute<'a>) -> Result<()>,
) -> Result<()> {
    let mut attributes = e.attributes();
    attributes.with_checks(strict);
    for attr in attributes {
        match attr {
            Ok(attr) => f(attr)?,
            Err(err) if strict => return Err(err.into()),
            Err(_) => break,
        }
    }
    Ok(())
}

fn attr_text<'a>(attr: &Attribute<'a>, strict: bool) -> Result<Cow<'a, str>> {
    match attr.unescape_value() {
        Ok(text) => Ok(text),
        Err(err) if strict => Err(err.into()),
        Err(_) => Ok(Cow::Owned(String::from_utf8_lossy(&attr.value).into_owned())),
    }
}
