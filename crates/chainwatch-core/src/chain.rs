//! Chain topology snapshots and relevance queries.
//!
//! The mapper API describes the currently scanned wormhole chain as two maps:
//! `signatures` (scanned systems, keyed by signature id) and `wormholes`
//! (connections referencing two signature keys). One successful build turns
//! that document into an immutable [`ChainSnapshot`]: a membership map of
//! scanned systems plus a symmetric adjacency map derived from the wormholes.
//!
//! A kill is "relevant" when its solar system is in the chain, or exactly one
//! hop away from a system that is. Both queries run against a single snapshot
//! so a concurrent refresh can never mix membership and adjacency from
//! different builds.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Identifier for a solar system in the topology graph.
pub type SystemId = u32;

/// Systems at or below this id are sentinel/test entries in the mapper data
/// and are never admitted to the chain.
pub const MIN_SYSTEM_ID: SystemId = 100;

/// Attribution label used when the mapper omits both the modifier and the
/// creator of a signature, or when no scanned neighbor can be attributed.
pub const UNKNOWN_SCOUT: &str = "Unknown Scout";

/// Raw topology document as served by the mapper API.
///
/// Both sections are optional at the serde level; [`ChainSnapshot::from_topology`]
/// decides what is fatal (no signatures) and what is not (no wormholes).
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyDocument {
    /// Scanned signatures, keyed by signature id.
    #[serde(default)]
    pub signatures: Option<HashMap<String, SignatureRecord>>,

    /// Wormhole connections referencing signature keys.
    #[serde(default)]
    pub wormholes: Option<HashMap<String, WormholeRecord>>,
}

/// One scanned signature from the mapper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureRecord {
    /// Solar system id. The mapper serves this as a number or a numeric
    /// string depending on version, so it is parsed leniently.
    #[serde(rename = "systemID", default)]
    pub system_id: Option<serde_json::Value>,

    /// Name of the last person to touch the signature.
    #[serde(rename = "modifiedByName", default)]
    pub modified_by_name: Option<String>,

    /// Name of the person who created the signature.
    #[serde(rename = "createdByName", default)]
    pub created_by_name: Option<String>,
}

impl SignatureRecord {
    /// System id as an integer, accepting both JSON numbers and numeric strings.
    fn parse_system_id(&self) -> Option<SystemId> {
        match self.system_id.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|v| SystemId::try_from(v).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Who gets credit for this signature: last modifier, then creator.
    fn scanned_by(&self) -> String {
        self.modified_by_name
            .clone()
            .or_else(|| self.created_by_name.clone())
            .unwrap_or_else(|| UNKNOWN_SCOUT.to_string())
    }
}

/// One wormhole connection between two signature keys.
#[derive(Debug, Clone, Deserialize)]
pub struct WormholeRecord {
    /// Signature key of one endpoint.
    #[serde(rename = "initialID", default)]
    pub initial_id: Option<String>,

    /// Signature key of the other endpoint.
    #[serde(rename = "secondaryID", default)]
    pub secondary_id: Option<String>,
}

/// Attribution metadata for a relevant system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainMetadata {
    /// Name of the scout whose signature put this system (or its neighbor)
    /// in range.
    pub scanned_by: String,

    /// True when the system is not itself in the chain but touches one
    /// that is.
    pub is_adjacent: bool,
}

/// One immutable, internally consistent version of the chain graph.
///
/// Produced whole by [`ChainSnapshot::from_topology`] and published through
/// [`crate::ChainStore`]; never mutated after construction.
#[derive(Debug, Default)]
pub struct ChainSnapshot {
    /// Scanned systems in the chain, with attribution.
    systems: HashMap<SystemId, String>,

    /// Symmetric adjacency derived from wormhole connections.
    adjacency: HashMap<SystemId, HashSet<SystemId>>,
}

impl ChainSnapshot {
    /// Build a snapshot from a mapper topology document.
    ///
    /// A document without a signatures section fails the whole build with
    /// [`Error::MissingSignatures`] so the caller keeps its previous
    /// snapshot. A wormhole with a dangling or unparseable endpoint skips
    /// only that wormhole.
    pub fn from_topology(doc: &TopologyDocument) -> Result<Self> {
        let sigs = doc.signatures.as_ref().ok_or(Error::MissingSignatures)?;

        let mut systems = HashMap::new();
        for (key, sig) in sigs {
            let Some(id) = sig.parse_system_id() else {
                tracing::debug!(signature = %key, "signature without a usable system id");
                continue;
            };
            if id <= MIN_SYSTEM_ID {
                continue;
            }
            systems.insert(id, sig.scanned_by());
        }

        let mut adjacency: HashMap<SystemId, HashSet<SystemId>> = HashMap::new();
        for (key, wh) in doc.wormholes.iter().flatten() {
            let resolve = |sig_key: &Option<String>| {
                sig_key
                    .as_deref()
                    .and_then(|k| sigs.get(k))
                    .and_then(SignatureRecord::parse_system_id)
            };

            let Some((a, b)) = resolve(&wh.initial_id).zip(resolve(&wh.secondary_id)) else {
                tracing::debug!(wormhole = %key, "skipping wormhole with dangling endpoint");
                continue;
            };

            // A wormhole looping back to its own system carries no
            // adjacency information.
            if a == b {
                tracing::debug!(wormhole = %key, system = a, "skipping self-looping wormhole");
                continue;
            }

            adjacency.entry(a).or_default().insert(b);
            adjacency.entry(b).or_default().insert(a);
        }

        Ok(Self { systems, adjacency })
    }

    /// Number of scanned systems in the chain.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Number of distinct wormhole connections.
    pub fn connection_count(&self) -> usize {
        self.adjacency.values().map(HashSet::len).sum::<usize>() / 2
    }

    /// Iterator over the scanned system ids.
    pub fn systems(&self) -> impl Iterator<Item = SystemId> + '_ {
        self.systems.keys().copied()
    }

    /// Whether the system itself is in the chain.
    pub fn is_in_chain(&self, system: SystemId) -> bool {
        self.systems.contains_key(&system)
    }

    /// Neighbors of a system in the adjacency graph, if any are known.
    pub fn neighbors(&self, system: SystemId) -> Option<&HashSet<SystemId>> {
        self.adjacency.get(&system)
    }

    /// Whether a kill in this system is in scope: the system is in the
    /// chain, or one of its neighbors is.
    pub fn is_relevant(&self, system: SystemId) -> bool {
        if self.is_in_chain(system) {
            return true;
        }
        self.adjacency
            .get(&system)
            .is_some_and(|neighbors| neighbors.iter().any(|n| self.systems.contains_key(n)))
    }

    /// Attribution for a system: its own scout if it is in the chain,
    /// otherwise the scout of a scanned neighbor.
    ///
    /// When several neighbors are in the chain the one with the lowest
    /// system id wins, so repeated queries against the same snapshot always
    /// agree on the attributing scout.
    pub fn metadata(&self, system: SystemId) -> ChainMetadata {
        if let Some(scanned_by) = self.systems.get(&system) {
            return ChainMetadata {
                scanned_by: scanned_by.clone(),
                is_adjacent: false,
            };
        }

        if let Some(neighbors) = self.adjacency.get(&system)
            && let Some(scanned_by) = neighbors
                .iter()
                .filter(|n| self.systems.contains_key(*n))
                .min()
                .and_then(|n| self.systems.get(n))
        {
            return ChainMetadata {
                scanned_by: scanned_by.clone(),
                is_adjacent: true,
            };
        }

        ChainMetadata {
            scanned_by: UNKNOWN_SCOUT.to_string(),
            is_adjacent: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: serde_json::Value) -> TopologyDocument {
        serde_json::from_value(json).unwrap()
    }

    fn chain_doc() -> TopologyDocument {
        // S1 -- S2 -- S3, plus a sentinel signature and a dangling wormhole.
        doc(serde_json::json!({
            "signatures": {
                "S1": { "systemID": 31000001, "modifiedByName": "Alice" },
                "S2": { "systemID": "31000002", "createdByName": "Bob" },
                "S3": { "systemID": 30000142 },
                "S4": { "systemID": 42, "modifiedByName": "Sentinel" }
            },
            "wormholes": {
                "W1": { "initialID": "S1", "secondaryID": "S2" },
                "W2": { "initialID": "S2", "secondaryID": "S3" },
                "W3": { "initialID": "S1", "secondaryID": "MISSING" }
            }
        }))
    }

    #[test]
    fn build_members_and_labels() {
        let snapshot = ChainSnapshot::from_topology(&chain_doc()).unwrap();
        assert_eq!(snapshot.system_count(), 3);
        assert!(snapshot.is_in_chain(31000001));
        assert!(snapshot.is_in_chain(31000002));
        assert!(snapshot.is_in_chain(30000142));

        assert_eq!(snapshot.metadata(31000001).scanned_by, "Alice");
        // Falls back to the creator when no modifier is recorded.
        assert_eq!(snapshot.metadata(31000002).scanned_by, "Bob");
        // Falls back to the unknown label when neither is recorded.
        assert_eq!(snapshot.metadata(30000142).scanned_by, UNKNOWN_SCOUT);
    }

    #[test]
    fn build_admission_filter() {
        let snapshot = ChainSnapshot::from_topology(&chain_doc()).unwrap();
        // Id 42 is at or below the admission threshold.
        assert!(!snapshot.is_in_chain(42));

        let boundary = doc(serde_json::json!({
            "signatures": {
                "A": { "systemID": 100 },
                "B": { "systemID": 101 }
            }
        }));
        let snapshot = ChainSnapshot::from_topology(&boundary).unwrap();
        assert!(!snapshot.is_in_chain(100));
        assert!(snapshot.is_in_chain(101));
    }

    #[test]
    fn build_adjacency_symmetric() {
        let snapshot = ChainSnapshot::from_topology(&chain_doc()).unwrap();
        for system in snapshot.adjacency.keys().copied() {
            for neighbor in &snapshot.adjacency[&system] {
                assert!(
                    snapshot.adjacency[neighbor].contains(&system),
                    "{neighbor} -> {system} missing"
                );
            }
        }
        assert_eq!(snapshot.connection_count(), 2);
    }

    #[test]
    fn build_skips_dangling_wormhole() {
        let snapshot = ChainSnapshot::from_topology(&chain_doc()).unwrap();
        // W3 references a missing signature key; only W1 and W2 survive.
        assert_eq!(snapshot.neighbors(31000001).unwrap().len(), 1);
    }

    #[test]
    fn build_skips_self_looping_wormhole() {
        // Two signatures for the same system, connected to each other.
        let topo = doc(serde_json::json!({
            "signatures": {
                "S1": { "systemID": 31000001 },
                "S2": { "systemID": 31000001 }
            },
            "wormholes": { "W1": { "initialID": "S1", "secondaryID": "S2" } }
        }));
        let snapshot = ChainSnapshot::from_topology(&topo).unwrap();
        assert!(snapshot.neighbors(31000001).is_none());
        assert_eq!(snapshot.connection_count(), 0);
    }

    #[test]
    fn build_skips_wormhole_to_unparseable_endpoint() {
        let topo = doc(serde_json::json!({
            "signatures": {
                "S1": { "systemID": 31000001 },
                "S2": { "modifiedByName": "Eve" }
            },
            "wormholes": {
                "W1": { "initialID": "S1", "secondaryID": "S2" },
                "W2": { "initialID": "S1" }
            }
        }));
        let snapshot = ChainSnapshot::from_topology(&topo).unwrap();
        assert!(snapshot.neighbors(31000001).is_none());
    }

    #[test]
    fn build_missing_signatures_is_fatal() {
        let topo = doc(serde_json::json!({
            "wormholes": { "W1": { "initialID": "S1", "secondaryID": "S2" } }
        }));
        let err = ChainSnapshot::from_topology(&topo).unwrap_err();
        assert!(matches!(err, Error::MissingSignatures));
    }

    #[test]
    fn build_without_wormholes_is_fine() {
        let topo = doc(serde_json::json!({
            "signatures": { "S1": { "systemID": 31000001 } }
        }));
        let snapshot = ChainSnapshot::from_topology(&topo).unwrap();
        assert_eq!(snapshot.system_count(), 1);
        assert_eq!(snapshot.connection_count(), 0);
    }

    #[test]
    fn lenient_system_id_parsing() {
        let topo = doc(serde_json::json!({
            "signatures": {
                "A": { "systemID": 31000001 },
                "B": { "systemID": "31000002" },
                "C": { "systemID": " 31000003 " },
                "D": { "systemID": true },
                "E": { "systemID": "not-a-number" },
                "F": {}
            }
        }));
        let snapshot = ChainSnapshot::from_topology(&topo).unwrap();
        assert_eq!(snapshot.system_count(), 3);
    }

    #[test]
    fn relevance_member_adjacent_isolated() {
        let snapshot = ChainSnapshot::from_topology(&chain_doc()).unwrap();

        // Member.
        assert!(snapshot.is_relevant(31000001));
        // Not relevant at all.
        assert!(!snapshot.is_relevant(30000001));

        // A system adjacent to the chain but not in it: add a signature that
        // is below the admission threshold yet connected through a wormhole.
        let topo = doc(serde_json::json!({
            "signatures": {
                "S1": { "systemID": 31000001, "modifiedByName": "Alice" },
                "S2": { "systemID": 90 }
            },
            "wormholes": { "W1": { "initialID": "S1", "secondaryID": "S2" } }
        }));
        let snapshot = ChainSnapshot::from_topology(&topo).unwrap();
        assert!(!snapshot.is_in_chain(90));
        assert!(snapshot.is_relevant(90));
    }

    #[test]
    fn metadata_adjacency_flags() {
        let topo = doc(serde_json::json!({
            "signatures": {
                "S1": { "systemID": 31000001, "modifiedByName": "Alice" },
                "S2": { "systemID": 90 }
            },
            "wormholes": { "W1": { "initialID": "S1", "secondaryID": "S2" } }
        }));
        let snapshot = ChainSnapshot::from_topology(&topo).unwrap();

        let meta = snapshot.metadata(31000001);
        assert_eq!(meta.scanned_by, "Alice");
        assert!(!meta.is_adjacent);

        let meta = snapshot.metadata(90);
        assert_eq!(meta.scanned_by, "Alice");
        assert!(meta.is_adjacent);

        let meta = snapshot.metadata(777777);
        assert_eq!(meta.scanned_by, UNKNOWN_SCOUT);
        assert!(!meta.is_adjacent);
    }

    #[test]
    fn metadata_tie_break_is_lowest_system_id() {
        // X touches two scanned systems; the lower id attributes the kill.
        let topo = doc(serde_json::json!({
            "signatures": {
                "LOW": { "systemID": 31000001, "modifiedByName": "Alice" },
                "HIGH": { "systemID": 31000009, "modifiedByName": "Bob" },
                "X": { "systemID": 90 }
            },
            "wormholes": {
                "W1": { "initialID": "HIGH", "secondaryID": "X" },
                "W2": { "initialID": "LOW", "secondaryID": "X" }
            }
        }));
        let snapshot = ChainSnapshot::from_topology(&topo).unwrap();

        let meta = snapshot.metadata(90);
        assert_eq!(meta.scanned_by, "Alice");
        assert!(meta.is_adjacent);
    }

    #[test]
    fn end_to_end_scenario() {
        // Two signatures above the threshold, one wormhole between them.
        let topo = doc(serde_json::json!({
            "signatures": {
                "S1": { "systemID": 31000001, "modifiedByName": "Alice" },
                "S2": { "systemID": 999999, "modifiedByName": "Bob" }
            },
            "wormholes": { "W1": { "initialID": "S1", "secondaryID": "S2" } }
        }));
        let snapshot = ChainSnapshot::from_topology(&topo).unwrap();

        assert_eq!(snapshot.system_count(), 2);
        assert!(snapshot.neighbors(31000001).unwrap().contains(&999999));
        assert!(snapshot.neighbors(999999).unwrap().contains(&31000001));

        let meta = snapshot.metadata(999999);
        assert_eq!(meta.scanned_by, "Bob");
        assert!(!meta.is_adjacent);

        assert!(!snapshot.is_relevant(42));
    }
}
