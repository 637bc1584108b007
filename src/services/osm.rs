//! Conversion of Overpass (OSM JSON) payloads into feature collections.

use crate::domain::{Feature, FeatureCollection, Geometry, Position};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Top-level Overpass response
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    pub elements: Vec<OsmElement>,
}

/// One OSM element as emitted by `out body` / `out skel`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OsmElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<OsmMember>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    #[serde(other)]
    Other,
}

/// Member reference of a relation
#[derive(Debug, Clone, Deserialize)]
pub struct OsmMember {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub reference: i64,
    #[serde(default)]
    pub role: String,
}

fn properties(kind: &str, id: i64, tags: &BTreeMap<String, String>) -> Map<String, Value> {
    let mut props: Map<String, Value> = tags
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    props.insert("id".to_string(), Value::String(format!("{kind}/{id}")));
    props
}

fn resolve(coords: &HashMap<i64, Position>, nodes: &[i64]) -> Option<Vec<Position>> {
    nodes.iter().map(|n| coords.get(n).cloned()).collect()
}

fn is_closed(nodes: &[i64]) -> bool {
    nodes.len() >= 4 && nodes.first() == nodes.last()
}

/// A closed ring of node ids and the ways it was stitched from
struct JoinedRing {
    nodes: Vec<i64>,
    ways: Vec<i64>,
}

/// Stitch way segments into closed rings by shared end nodes.
///
/// Segments may run in either direction. Chains that never close are
/// dropped.
fn join_rings(segments: Vec<(i64, Vec<i64>)>) -> Vec<JoinedRing> {
    let mut open: Vec<(i64, Vec<i64>)> = segments
        .into_iter()
        .filter(|(_, nodes)| nodes.len() >= 2)
        .collect();
    let mut rings = Vec::new();

    while !open.is_empty() {
        let (id, mut nodes) = open.remove(0);
        let mut ways = vec![id];
        loop {
            if is_closed(&nodes) {
                rings.push(JoinedRing { nodes, ways });
                break;
            }
            let Some(&tail) = nodes.last() else {
                break;
            };
            let next = open
                .iter()
                .position(|(_, s)| s.first() == Some(&tail) || s.last() == Some(&tail));
            let Some(index) = next else {
                tracing::debug!("Dropping unclosed ring built from ways {:?}", ways);
                break;
            };
            let (next_id, mut segment) = open.remove(index);
            if segment.first() != Some(&tail) {
                segment.reverse();
            }
            nodes.extend_from_slice(&segment[1..]);
            ways.push(next_id);
        }
    }

    rings
}

/// Assemble a multipolygon relation from its outer ways
fn relation_feature(
    id: i64,
    members: &[OsmMember],
    tags: &BTreeMap<String, String>,
    ways: &HashMap<i64, &[i64]>,
    coords: &HashMap<i64, Position>,
) -> Option<(Feature, Vec<i64>)> {
    let outers: Vec<(i64, Vec<i64>)> = members
        .iter()
        .filter(|m| m.kind == "way" && m.role == "outer")
        .filter_map(|m| ways.get(&m.reference).map(|nodes| (m.reference, nodes.to_vec())))
        .collect();

    let mut polygons = Vec::new();
    let mut used = Vec::new();
    for ring in join_rings(outers) {
        if let Some(resolved) = resolve(coords, &ring.nodes) {
            polygons.push(vec![resolved]);
            used.extend(ring.ways);
        }
    }
    if polygons.is_empty() {
        tracing::debug!("Skipping relation/{} without closed outer rings", id);
        return None;
    }

    let feature = Feature {
        geometry: Some(Geometry::MultiPolygon {
            coordinates: polygons,
        }),
        properties: Some(properties("relation", id, tags)),
    };
    Some((feature, used))
}

/// Convert Overpass elements into features.
///
/// Tagged nodes become points, tagged ways become polygons when closed and
/// line strings otherwise. Multipolygon relations become multi-polygons of
/// their outer rings, stitching split outer ways together by shared end
/// nodes. A way that forms part of a building relation's outline is not
/// emitted again on its own. Ways referencing nodes missing from the
/// payload are dropped.
pub fn to_feature_collection(response: &OverpassResponse) -> FeatureCollection {
    let mut coords: HashMap<i64, Position> = HashMap::new();
    let mut ways: HashMap<i64, &[i64]> = HashMap::new();
    for element in &response.elements {
        match element {
            OsmElement::Node { id, lat, lon, .. } => {
                coords.insert(*id, vec![*lon, *lat]);
            }
            OsmElement::Way { id, nodes, .. } => {
                ways.insert(*id, nodes);
            }
            _ => {}
        }
    }

    let mut relations: HashMap<i64, Feature> = HashMap::new();
    let mut absorbed: HashSet<i64> = HashSet::new();
    for element in &response.elements {
        if let OsmElement::Relation { id, members, tags } = element {
            if tags.get("type").map(String::as_str) != Some("multipolygon") {
                continue;
            }
            if let Some((feature, used)) = relation_feature(*id, members, tags, &ways, &coords) {
                if feature.is_building() {
                    absorbed.extend(used);
                }
                relations.insert(*id, feature);
            }
        }
    }

    let mut features = Vec::new();
    for element in &response.elements {
        match element {
            OsmElement::Node { id, lat, lon, tags } if !tags.is_empty() => {
                features.push(Feature {
                    geometry: Some(Geometry::Point {
                        coordinates: vec![*lon, *lat],
                    }),
                    properties: Some(properties("node", *id, tags)),
                });
            }
            OsmElement::Way { id, .. } if absorbed.contains(id) => {
                tracing::debug!("way/{} is covered by its building relation", id);
            }
            OsmElement::Way { id, nodes, tags } if !tags.is_empty() => {
                let Some(line) = resolve(&coords, nodes) else {
                    tracing::debug!("Skipping way/{} with unresolved nodes", id);
                    continue;
                };
                let geometry = if is_closed(nodes) {
                    Geometry::Polygon {
                        coordinates: vec![line],
                    }
                } else {
                    Geometry::LineString { coordinates: line }
                };
                features.push(Feature {
                    geometry: Some(geometry),
                    properties: Some(properties("way", *id, tags)),
                });
            }
            OsmElement::Relation { id, .. } => {
                if let Some(feature) = relations.remove(id) {
                    features.push(feature);
                }
            }
            _ => {}
        }
    }

    FeatureCollection { features }
}
