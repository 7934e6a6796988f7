//! The spatial index model: nodes, directional links and canonical arcs.
//!
//! Transmission expansion is decided per unordered node pair, so the
//! canonical form of the network is the bidirectional arc: for each
//! unordered pair exactly one direction is canonical (the first-seen
//! declared direction wins) and the reverse direction is derived from it.
//! Per-arc data (length, line type, efficiency) attaches to the canonical
//! arc; a declared link whose pair cannot be resolved to an arc with a
//! length is a configuration error, not a recoverable one.
use crate::id::{LineTypeID, NodeID};
use crate::input::{read_id_set, read_id_set_optional, read_tab_vec};
use anyhow::{ensure, Context, Result};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Subtype tags a node can carry.
///
/// Tags are assigned from explicit set-membership tables at ingestion time;
/// nothing in the model classifies nodes by name.
#[derive(Clone, Debug, Default)]
pub struct NodeTags {
    /// Offshore energy hub (no demand, hosts the offshore converter)
    pub offshore_hub: bool,
    /// Participates in the natural-gas network
    pub natural_gas: bool,
    /// Eligible for hydrogen production, storage and pipelines
    pub hydrogen_production: bool,
    /// Eligible for CO2 sequestration
    pub co2_sequestration: bool,
    /// Hosts steel plants
    pub steel_producer: bool,
    /// Hosts cement plants
    pub cement_producer: bool,
    /// Hosts ammonia plants
    pub ammonia_producer: bool,
    /// Hosts oil refineries
    pub oil_producer: bool,
}

/// A spatial vertex of the system
#[derive(Clone, Debug)]
pub struct Node {
    /// Node identifier
    pub id: NodeID,
    /// Subtype tags
    pub tags: NodeTags,
    /// Display-only coordinate
    pub latitude: f64,
    /// Display-only coordinate
    pub longitude: f64,
}

impl Node {
    /// Every node that is not an offshore hub is onshore
    pub fn is_onshore(&self) -> bool {
        !self.tags.offshore_hub
    }
}

/// A declared ordered node pair carrying a transmission type
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLink {
    /// Sending node
    pub from: NodeID,
    /// Receiving node
    pub to: NodeID,
    /// Transmission technology of the link
    pub line_type: LineTypeID,
}

/// The canonical form of an unordered node pair
#[derive(Clone, Debug)]
pub struct Arc {
    /// Canonical direction: the first-seen declared direction
    pub from: NodeID,
    /// Canonical direction: the first-seen declared direction
    pub to: NodeID,
    /// Transmission technology of the pair
    pub line_type: LineTypeID,
    /// Line length in km
    pub length: f64,
    /// Per-flow transfer efficiency
    pub efficiency: f64,
}

impl Arc {
    /// Whether `node` is one of the arc's endpoints
    pub fn touches(&self, node: &NodeID) -> bool {
        self.from == *node || self.to == *node
    }

    /// The endpoint opposite to `node`
    pub fn other_end(&self, node: &NodeID) -> &NodeID {
        if self.from == *node {
            &self.to
        } else {
            &self.from
        }
    }
}

/// Nodes, links and derived adjacency sets
#[derive(Clone, Debug, Default)]
pub struct Topology {
    /// All nodes, keyed by ID
    pub nodes: IndexMap<NodeID, Node>,
    /// All declared directional links
    pub links: Vec<DirectionalLink>,
    /// Canonical bidirectional arcs (unordered pairs, deduplicated)
    pub arcs: Vec<Arc>,
    /// Transmission line types
    pub line_types: IndexSet<LineTypeID>,
    /// Predecessors of each node over the declared directional links
    pub nodes_linked: HashMap<NodeID, Vec<NodeID>>,
}

#[derive(Deserialize)]
struct LinkRow {
    #[serde(rename = "FromNode")]
    from: NodeID,
    #[serde(rename = "ToNode")]
    to: NodeID,
    #[serde(rename = "LineType")]
    line_type: LineTypeID,
}

#[derive(Deserialize)]
struct ArcParamRow {
    #[serde(rename = "FromNode")]
    from: NodeID,
    #[serde(rename = "ToNode")]
    to: NodeID,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct CoordinateRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Value")]
    value: f64,
}

/// Read the spatial tables from `model_dir` and build the [`Topology`]
pub fn read_topology(model_dir: &Path) -> Result<Topology> {
    let node_ids: IndexSet<NodeID> = read_id_set(&model_dir.join("Sets_Nodes.tab"))?;
    let line_types: IndexSet<LineTypeID> = read_id_set(&model_dir.join("Sets_LineType.tab"))?;
    let links: Vec<LinkRow> = read_tab_vec(&model_dir.join("Sets_DirectionalLines.tab"))?;
    let lengths: Vec<ArcParamRow> = read_tab_vec(&model_dir.join("Transmission_Length.tab"))?;
    let efficiencies: Vec<ArcParamRow> =
        read_tab_vec(&model_dir.join("Transmission_lineEfficiency.tab"))?;
    let latitudes: Vec<CoordinateRow> = read_tab_vec(&model_dir.join("Node_Latitude.tab"))?;
    let longitudes: Vec<CoordinateRow> = read_tab_vec(&model_dir.join("Node_Longitude.tab"))?;

    let tag_sets = [
        ("Sets_OffshoreNodes.tab", 0),
        ("Sets_NaturalGasNodes.tab", 1),
        ("Sets_HydrogenProductionNodes.tab", 2),
        ("Sets_CO2SequestrationNodes.tab", 3),
        ("Sets_SteelProducers.tab", 4),
        ("Sets_CementProducers.tab", 5),
        ("Sets_AmmoniaProducers.tab", 6),
        ("Sets_OilProducers.tab", 7),
    ];
    let mut tags: HashMap<NodeID, NodeTags> = node_ids
        .iter()
        .map(|id| (id.clone(), NodeTags::default()))
        .collect();
    for (file_name, tag_idx) in tag_sets {
        for id in read_id_set_optional::<NodeID>(&model_dir.join(file_name))? {
            let entry = tags
                .get_mut(&id)
                .with_context(|| format!("{file_name} names unknown node {id}"))?;
            match tag_idx {
                0 => entry.offshore_hub = true,
                1 => entry.natural_gas = true,
                2 => entry.hydrogen_production = true,
                3 => entry.co2_sequestration = true,
                4 => entry.steel_producer = true,
                5 => entry.cement_producer = true,
                6 => entry.ammonia_producer = true,
                _ => entry.oil_producer = true,
            }
        }
    }

    let coord = |rows: &[CoordinateRow], id: &NodeID| {
        rows.iter()
            .find(|r| r.node == *id)
            .map_or(0.0, |r| r.value)
    };
    let nodes: IndexMap<NodeID, Node> = node_ids
        .iter()
        .map(|id| {
            let node = Node {
                id: id.clone(),
                tags: tags.remove(id).unwrap(),
                latitude: coord(&latitudes, id),
                longitude: coord(&longitudes, id),
            };
            (id.clone(), node)
        })
        .collect();

    let links: Vec<DirectionalLink> = links
        .into_iter()
        .map(|row| DirectionalLink {
            from: row.from,
            to: row.to,
            line_type: row.line_type,
        })
        .collect();

    let pair_value = |rows: &[ArcParamRow], from: &NodeID, to: &NodeID| {
        rows.iter()
            .find(|r| (r.from == *from && r.to == *to) || (r.from == *to && r.to == *from))
            .map(|r| r.value)
    };

    build_topology(nodes, line_types, links, |from, to| {
        let length = pair_value(&lengths, from, to)
            .with_context(|| format!("No line length resolvable for pair {from} - {to}"))?;
        let efficiency = pair_value(&efficiencies, from, to).unwrap_or(1.0);
        Ok((length, efficiency))
    })
}

/// Build a [`Topology`] from in-memory sets.
///
/// `arc_params` resolves (length, efficiency) for an unordered pair; it is
/// consulted once per canonical arc and its failure is fatal.
pub fn build_topology<F>(
    nodes: IndexMap<NodeID, Node>,
    line_types: IndexSet<LineTypeID>,
    links: Vec<DirectionalLink>,
    mut arc_params: F,
) -> Result<Topology>
where
    F: FnMut(&NodeID, &NodeID) -> Result<(f64, f64)>,
{
    for link in &links {
        ensure!(
            nodes.contains_key(&link.from) && nodes.contains_key(&link.to),
            "Link {} - {} references an undeclared node",
            link.from,
            link.to
        );
        ensure!(
            line_types.contains(&link.line_type),
            "Link {} - {} has unknown line type {}",
            link.from,
            link.to,
            link.line_type
        );
    }

    // Deduplicate unordered pairs; the first-seen direction is canonical
    let mut arcs: Vec<Arc> = Vec::new();
    let mut seen: IndexSet<(NodeID, NodeID)> = IndexSet::new();
    for link in &links {
        let key = if link.from < link.to {
            (link.from.clone(), link.to.clone())
        } else {
            (link.to.clone(), link.from.clone())
        };
        if !seen.insert(key) {
            continue;
        }
        let (length, efficiency) = arc_params(&link.from, &link.to)?;
        arcs.push(Arc {
            from: link.from.clone(),
            to: link.to.clone(),
            line_type: link.line_type.clone(),
            length,
            efficiency,
        });
    }

    let mut nodes_linked: HashMap<NodeID, Vec<NodeID>> = nodes
        .keys()
        .map(|id| (id.clone(), Vec::new()))
        .collect();
    for link in &links {
        nodes_linked
            .get_mut(&link.to)
            .unwrap()
            .push(link.from.clone());
    }

    Ok(Topology {
        nodes,
        links,
        arcs,
        line_types,
        nodes_linked,
    })
}

impl Topology {
    /// Iterate over both directions of every canonical arc
    pub fn directed_flows(&self) -> impl Iterator<Item = (&Arc, &NodeID, &NodeID)> {
        self.arcs
            .iter()
            .flat_map(|arc| [(arc, &arc.from, &arc.to), (arc, &arc.to, &arc.from)])
    }

    /// The canonical arc for an unordered pair, if one was declared
    pub fn arc_between(&self, a: &NodeID, b: &NodeID) -> Option<&Arc> {
        self.arcs
            .iter()
            .find(|arc| (arc.from == *a && arc.to == *b) || (arc.from == *b && arc.to == *a))
    }

    /// Arcs both of whose endpoints are hydrogen-production nodes; these are
    /// the pairs eligible for hydrogen pipelines
    pub fn hydrogen_arcs(&self) -> Vec<&Arc> {
        self.arcs
            .iter()
            .filter(|arc| {
                self.nodes[&arc.from].tags.hydrogen_production
                    && self.nodes[&arc.to].tags.hydrogen_production
            })
            .collect()
    }

    /// Arcs both of whose endpoints are onshore; these are the pairs
    /// eligible for CO2 pipelines
    pub fn co2_arcs(&self) -> Vec<&Arc> {
        self.arcs
            .iter()
            .filter(|arc| self.nodes[&arc.from].is_onshore() && self.nodes[&arc.to].is_onshore())
            .collect()
    }

    /// Arcs eligible for natural-gas pipelines (both endpoints in the
    /// natural-gas network)
    pub fn natural_gas_arcs(&self) -> Vec<&Arc> {
        self.arcs
            .iter()
            .filter(|arc| {
                self.nodes[&arc.from].tags.natural_gas && self.nodes[&arc.to].tags.natural_gas
            })
            .collect()
    }

    /// Nodes carrying a given tag
    pub fn nodes_with<F: Fn(&Node) -> bool>(&self, pred: F) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| pred(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, tags: NodeTags) -> (NodeID, Node) {
        let id: NodeID = id.into();
        (
            id.clone(),
            Node {
                id,
                tags,
                latitude: 0.0,
                longitude: 0.0,
            },
        )
    }

    fn three_nodes() -> IndexMap<NodeID, Node> {
        [
            node("A", NodeTags::default()),
            node(
                "B",
                NodeTags {
                    hydrogen_production: true,
                    ..NodeTags::default()
                },
            ),
            node(
                "C",
                NodeTags {
                    hydrogen_production: true,
                    offshore_hub: true,
                    ..NodeTags::default()
                },
            ),
        ]
        .into_iter()
        .collect()
    }

    fn link(from: &str, to: &str) -> DirectionalLink {
        DirectionalLink {
            from: from.into(),
            to: to.into(),
            line_type: "HVAC".into(),
        }
    }

    fn line_types() -> IndexSet<LineTypeID> {
        ["HVAC".into()].into_iter().collect()
    }

    #[test]
    fn test_first_seen_direction_is_canonical() {
        let links = vec![link("B", "A"), link("A", "B"), link("A", "C")];
        let topo =
            build_topology(three_nodes(), line_types(), links, |_, _| Ok((100.0, 0.97))).unwrap();
        assert_eq!(topo.arcs.len(), 2);
        assert_eq!(topo.arcs[0].from, "B".into());
        assert_eq!(topo.arcs[0].to, "A".into());
    }

    #[test]
    fn test_unresolvable_length_is_fatal() {
        let links = vec![link("A", "B")];
        let result = build_topology(three_nodes(), line_types(), links, |from, to| {
            anyhow::bail!("No line length resolvable for pair {from} - {to}")
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_nodes_linked_holds_predecessors() {
        let links = vec![link("A", "B"), link("C", "B")];
        let topo =
            build_topology(three_nodes(), line_types(), links, |_, _| Ok((1.0, 1.0))).unwrap();
        let preds = &topo.nodes_linked[&NodeID::from("B")];
        assert_eq!(preds.as_slice(), &["A".into(), "C".into()]);
        assert!(topo.nodes_linked[&NodeID::from("A")].is_empty());
    }

    #[test]
    fn test_carrier_restricted_arcs() {
        let links = vec![link("A", "B"), link("B", "C")];
        let topo =
            build_topology(three_nodes(), line_types(), links, |_, _| Ok((1.0, 1.0))).unwrap();
        // B-C joins the two hydrogen-production nodes
        assert_eq!(topo.hydrogen_arcs().len(), 1);
        // C is offshore, so only A-B qualifies for CO2 pipelines
        assert_eq!(topo.co2_arcs().len(), 1);
    }

    #[test]
    fn test_unknown_line_type_is_fatal() {
        let links = vec![DirectionalLink {
            from: "A".into(),
            to: "B".into(),
            line_type: "Maglev".into(),
        }];
        assert!(build_topology(three_nodes(), line_types(), links, |_, _| Ok((1.0, 1.0))).is_err());
    }
}
