use std::io::{Cursor, Write};
use std::path::Path;

use osm_text_loader::{
    ErrorKind, LatLon, LatLonBox, LoadOptions, OsmStore, Result, StreamSource, TagKind, Tagged,
};
use rstest::{fixture, rstest};
use tempfile::NamedTempFile;

const SMALL_CITY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="osmium/1.14.0">
  <bounds minlat="45.1500000" minlon="5.6800000" maxlat="45.2200000" maxlon="5.7800000"/>
  <node id="101" lat="45.1885" lon="5.7245"/>
  <node id="102" lat="45.1890" lon="5.7250">
    <tag k="name" v="Place Grenette"/>
    <tag k="highway" v="pedestrian"/>
  </node>
  <node id="103" lat="45.1895" lon="5.7240"/>
  <way id="201">
    <nd ref="101"/>
    <nd ref="102"/>
    <nd ref="103"/>
    <nd ref="101"/>
    <tag k="building" v="yes"/>
    <tag k="layer" v="2"/>
  </way>
  <way id="202">
    <nd ref="103"/>
    <nd ref="999"/>
  </way>
  <relation id="301">
    <member type="way" ref="201" role="outer"/>
    <member type="node" ref="102" role="label"/>
    <member type="relation" ref="302" role=""/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>
"#;

fn options(check_syntax: bool, prefetch: bool) -> LoadOptions {
    LoadOptions {
        check_syntax,
        prefetch,
        ..LoadOptions::default()
    }
}

fn write_temp(suffix: &str, bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("osm-load-")
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

fn compress_bz2(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(bytes).expect("bzip2");
    encoder.finish().expect("bzip2 finish")
}

fn compress_xz(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = xz::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(bytes).expect("xz");
    encoder.finish().expect("xz finish")
}

fn compress_gz(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).expect("gzip");
    encoder.finish().expect("gzip finish")
}

fn load_str<I: osm_text_loader::OsmId>(store: &mut OsmStore<I>, xml: &str) -> Result<()> {
    let source = StreamSource::new(Cursor::new(xml.as_bytes().to_vec()), "inline");
    store.load_source(Box::new(source), "inline").map(|_| ())
}

#[fixture]
fn city_file() -> NamedTempFile {
    write_temp(".osm", SMALL_CITY.as_bytes())
}

#[rstest]
fn single_point_is_stored_in_fixed_point() -> Result<()> {
    let file = write_temp(".osm", br#"<osm><node id="1" lat="45.0000000" lon="5.0000000"/></osm>"#);
    let mut store: OsmStore = OsmStore::new(options(true, true));
    store.load(file.path())?;
    assert_eq!(store.nodes().len(), 1);
    assert_eq!(store.nodes()[0].pos, LatLon::new(450_000_000, 50_000_000));
    Ok(())
}

#[rstest]
fn way_members_are_node_indices() -> Result<()> {
    let mut store: OsmStore = OsmStore::new(options(true, false));
    load_str(
        &mut store,
        r#"<osm>
             <node id="70" lat="1" lon="1"/>
             <node id="80" lat="2" lon="2"/>
             <way id="5"><nd ref="70"/><nd ref="80"/></way>
           </osm>"#,
    )?;
    assert_eq!(store.ways()[0].nodes_ix, vec![0, 1]);
    assert_eq!(store.stats().bad_way_node_refs, 0);
    Ok(())
}

#[rstest]
fn unknown_relation_members_are_counted() -> Result<()> {
    let mut store: OsmStore = OsmStore::new(options(true, true));
    load_str(
        &mut store,
        r#"<osm>
             <node id="1" lat="0" lon="0"/>
             <way id="2"><nd ref="1"/></way>
             <relation id="3">
               <member type="way" ref="2" role="outer"/>
               <member type="node" ref="404" role=""/>
             </relation>
           </osm>"#,
    )?;
    assert_eq!(store.relations()[0].members.len(), 1);
    assert_eq!(store.stats().bad_relation_refs, 1);
    Ok(())
}

#[rstest]
#[case::prefetched(true)]
#[case::synchronous(false)]
fn truncated_document_fails_only_when_checked(#[case] prefetch: bool) {
    let truncated = &SMALL_CITY[..SMALL_CITY.find("<nd ref=\"102\"").expect("marker") + 6];
    let file = write_temp(".osm", truncated.as_bytes());

    let mut strict: OsmStore = OsmStore::new(options(true, prefetch));
    let err = strict.load(file.path()).expect_err("truncated input");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert_eq!(strict.nodes().len(), 3);

    let mut relaxed: OsmStore = OsmStore::new(options(false, prefetch));
    assert!(relaxed.load(file.path()).is_ok());
}

#[rstest]
fn city_loads_with_tags_bounds_and_counters(city_file: NamedTempFile) -> Result<()> {
    let mut store: OsmStore = OsmStore::new(options(true, true));
    let stats = store.load(city_file.path())?.clone();

    assert_eq!((stats.nodes, stats.ways, stats.relations), (3, 2, 1));
    assert_eq!(stats.bad_way_node_refs, 1);
    assert_eq!(stats.bad_relation_refs, 1);
    assert_eq!(stats.bytes, SMALL_CITY.len() as u64);
    assert!(stats.source_live);

    let file_bound = store.file_bound();
    assert_eq!(file_bound.min, LatLon::new(451_500_000, 56_800_000));
    assert_eq!(file_bound.max, LatLon::new(452_200_000, 57_800_000));
    let load_bound = store.load_bound();
    assert_eq!(load_bound.min, LatLon::new(451_885_000, 57_240_000));
    assert_eq!(load_bound.max, LatLon::new(451_895_000, 57_250_000));

    let place = store.node(102).expect("node 102");
    assert_eq!(place.tags().name(), Some("Place Grenette"));
    assert_eq!(place.tags().kind(), TagKind::Highway);
    assert!(!store.node(101).expect("node 101").has_tags());

    let building = store.way(201).expect("way 201");
    assert!(building.is_loop());
    assert_eq!(building.tags().kind(), TagKind::Building);
    assert_eq!(building.tags().layer(), 2);
    assert_eq!(store.way(202).expect("way 202").nodes_ix, vec![2]);

    let relation = store.relation(301).expect("relation 301");
    let roles: Vec<&str> = relation.members.iter().map(|m| &*m.role).collect();
    assert_eq!(roles, ["outer", "label"]);
    assert_eq!(relation.tags().get("type"), Some("multipolygon"));
    Ok(())
}

#[rstest]
#[case::plain(".osm", None)]
#[case::bzip2(".osm.bz2", Some(compress_bz2 as fn(&[u8]) -> Vec<u8>))]
#[case::xz(".osm.xz", Some(compress_xz as fn(&[u8]) -> Vec<u8>))]
#[case::gzip(".osm.gz", Some(compress_gz as fn(&[u8]) -> Vec<u8>))]
fn compressed_inputs_load_like_plain_ones(
    #[case] suffix: &str,
    #[case] compress: Option<fn(&[u8]) -> Vec<u8>>,
) -> Result<()> {
    let bytes = match compress {
        Some(compress) => compress(SMALL_CITY.as_bytes()),
        None => SMALL_CITY.as_bytes().to_vec(),
    };
    let file = write_temp(suffix, &bytes);
    let mut store: OsmStore = OsmStore::new(LoadOptions {
        block_size: 97,
        ..options(true, true)
    });
    let stats = store.load(file.path())?;
    assert_eq!(stats.bytes, SMALL_CITY.len() as u64);
    assert_eq!(store.nodes().len(), 3);
    assert_eq!(store.way(201).map(|w| w.nodes_ix.len()), Some(4));
    Ok(())
}

#[rstest]
#[case::bzip2(".osm.bz2", compress_bz2 as fn(&[u8]) -> Vec<u8>)]
#[case::gzip(".osm.gz", compress_gz as fn(&[u8]) -> Vec<u8>)]
fn multistream_files_decode_every_stream(
    #[case] suffix: &str,
    #[case] compress: fn(&[u8]) -> Vec<u8>,
) -> Result<()> {
    let (head, tail) = SMALL_CITY.split_at(SMALL_CITY.find("<way").expect("marker"));
    let mut bytes = compress(head.as_bytes());
    bytes.extend(compress(tail.as_bytes()));
    let file = write_temp(suffix, &bytes);

    let mut store: OsmStore = OsmStore::new(options(true, true));
    store.load(file.path())?;
    assert_eq!(store.ways().len(), 2);
    assert_eq!(store.relations().len(), 1);
    Ok(())
}

#[rstest]
fn loading_twice_keeps_one_entry_per_id(city_file: NamedTempFile) -> Result<()> {
    let mut store: OsmStore = OsmStore::default();
    store.load(city_file.path())?;
    let stats = store.load(city_file.path())?.clone();

    assert_eq!(store.nodes().len(), 3);
    assert_eq!(store.ways().len(), 2);
    assert_eq!(store.relations().len(), 1);
    assert_eq!(stats.duplicates, 6);
    assert_eq!((stats.nodes, stats.ways, stats.relations), (0, 0, 0));
    assert_eq!(store.find_node_ix(103), Some(2));
    // No node was added, so this load saw no extent.
    assert!(store.load_bound().is_empty());
    Ok(())
}

#[rstest]
fn loads_append_to_the_same_tables() -> Result<()> {
    let mut store: OsmStore = OsmStore::new(options(true, true));
    load_str(&mut store, r#"<osm><node id="1" lat="0" lon="0"/></osm>"#)?;
    load_str(
        &mut store,
        r#"<osm><node id="2" lat="1" lon="1"/><way id="3"><nd ref="1"/><nd ref="2"/></way></osm>"#,
    )?;
    assert_eq!(store.nodes().len(), 2);
    assert_eq!(store.ways()[0].nodes_ix, vec![0, 1]);
    assert_eq!(store.stats().nodes, 1);
    assert_eq!(store.load_bound().min, LatLon::new(10_000_000, 10_000_000));
    Ok(())
}

#[rstest]
fn missing_file_loads_nothing() -> Result<()> {
    let mut store: OsmStore = OsmStore::new(options(true, true));
    let stats = store.load(Path::new("/nonexistent/osm-load/missing.osm.bz2"))?;
    assert_eq!(stats.bytes, 0);
    assert!(!stats.source_live);
    assert!(store.nodes().is_empty());
    Ok(())
}

#[rstest]
fn restrictive_clip_is_rejected_before_reading(city_file: NamedTempFile) {
    let mut store: OsmStore = OsmStore::default();
    let mut clip = LatLonBox::closed();
    clip.extend(LatLon::from_degrees(45.0, 5.0));
    clip.extend(LatLon::from_degrees(46.0, 6.0));
    let err = store
        .load_clipped(city_file.path(), &clip)
        .expect_err("clip box");
    assert_eq!(err.kind, ErrorKind::Unsupported);
    assert!(store.nodes().is_empty());

    assert!(store.load_clipped(city_file.path(), &LatLonBox::open()).is_ok());
    assert_eq!(store.nodes().len(), 3);
}

#[rstest]
fn narrow_ids_fail_in_strict_mode_only() {
    let xml = r#"<osm><node id="4294967296" lat="0" lon="0"/></osm>"#;

    let mut strict: OsmStore<u32> = OsmStore::new(options(true, true));
    let err = load_str(&mut strict, xml).expect_err("id too wide");
    assert_eq!(err.kind, ErrorKind::Syntax);

    let mut relaxed: OsmStore<u32> = OsmStore::new(options(false, true));
    load_str(&mut relaxed, xml).expect("relaxed load");
    assert_eq!(relaxed.nodes().len(), 1);

    let mut wide: OsmStore<u64> = OsmStore::new(options(true, true));
    load_str(&mut wide, xml).expect("fits in u64");
    assert_eq!(wide.nodes()[0].id, 4_294_967_296);
}

#[rstest]
fn census_after_loading_the_city(city_file: NamedTempFile) -> Result<()> {
    let mut store: OsmStore = OsmStore::default();
    store.load(city_file.path())?;
    let census = store.census();
    assert_eq!(census.nodes.tagged, 1);
    assert_eq!(census.unreferenced_nodes, 0);
    assert_eq!(census.referenced_tagged_nodes, 1);
    // Way 202 kept a single node, which closes on itself.
    assert_eq!(census.loops, 2);
    Ok(())
}
