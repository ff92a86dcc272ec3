pub mod numbers;
pub(crate) mod osm_xml;
