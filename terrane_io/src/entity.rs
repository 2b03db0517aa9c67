// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entity data model: nodes, ways, relations, and the container moved through every stream.

use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// Identifier of an entity. Ids are unique per [`EntityType`], not globally.
pub type EntityId = i64;

/// A `key=value` tag.
pub type Tag = (String, String);

/// Entity kind. The derived order is the default stream order: nodes, then ways, then relations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// A point.
    Node,
    /// An ordered list of node references.
    Way,
    /// An ordered list of typed members.
    Relation,
}

impl EntityType {
    /// All types in default order.
    pub const ALL: [Self; 3] = [Self::Node, Self::Way, Self::Relation];

    /// Position in default order (0, 1, 2).
    pub const fn ordinal(self) -> usize {
        match self {
            Self::Node => 0,
            Self::Way => 1,
            Self::Relation => 2,
        }
    }

    /// The single-flag set for this type.
    pub const fn kind(self) -> EntityKinds {
        match self {
            Self::Node => EntityKinds::NODES,
            Self::Way => EntityKinds::WAYS,
            Self::Relation => EntityKinds::RELATIONS,
        }
    }
}

bitflags::bitflags! {
    /// A set of entity types, used to select which types a pass handles.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EntityKinds: u8 {
        /// Nodes.
        const NODES     = 0b0000_0001;
        /// Ways.
        const WAYS      = 0b0000_0010;
        /// Relations.
        const RELATIONS = 0b0000_0100;
    }
}

impl EntityKinds {
    /// Whether the set includes `ty`.
    pub fn includes(self, ty: EntityType) -> bool {
        self.contains(ty.kind())
    }
}

impl Default for EntityKinds {
    fn default() -> Self {
        Self::all()
    }
}

/// A located point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node id.
    pub id: EntityId,
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
    /// Tags.
    pub tags: Vec<Tag>,
}

/// An ordered polyline of node references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Way {
    /// Way id.
    pub id: EntityId,
    /// Referenced node ids, in order.
    pub nodes: Vec<EntityId>,
    /// Tags.
    pub tags: Vec<Tag>,
}

/// One member of a relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Type of the referenced entity.
    pub kind: EntityType,
    /// Id of the referenced entity.
    pub id: EntityId,
    /// Role of the member within the relation.
    pub role: String,
}

/// An ordered group of typed members.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation id.
    pub id: EntityId,
    /// Members, in order.
    pub members: Vec<Member>,
    /// Tags.
    pub tags: Vec<Tag>,
}

/// The unit moved through every stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EntityContainer {
    /// A node.
    Node(Node),
    /// A way.
    Way(Way),
    /// A relation.
    Relation(Relation),
}

impl EntityContainer {
    /// The entity's type.
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Node(_) => EntityType::Node,
            Self::Way(_) => EntityType::Way,
            Self::Relation(_) => EntityType::Relation,
        }
    }

    /// The entity's id.
    pub fn id(&self) -> EntityId {
        match self {
            Self::Node(n) => n.id,
            Self::Way(w) => w.id,
            Self::Relation(r) => r.id,
        }
    }

    /// Sort key in default order.
    pub fn order_key(&self) -> (EntityType, EntityId) {
        (self.entity_type(), self.id())
    }

    /// Tags of the entity.
    pub fn tags(&self) -> &[Tag] {
        match self {
            Self::Node(n) => &n.tags,
            Self::Way(w) => &w.tags,
            Self::Relation(r) => &r.tags,
        }
    }
}

impl From<Node> for EntityContainer {
    fn from(n: Node) -> Self {
        Self::Node(n)
    }
}

impl From<Way> for EntityContainer {
    fn from(w: Way) -> Self {
        Self::Way(w)
    }
}

impl From<Relation> for EntityContainer {
    fn from(r: Relation) -> Self {
        Self::Relation(r)
    }
}

/// Spatial metadata record that may precede a stream's entities.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Western edge.
    pub min_lon: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl Bounds {
    /// Create bounds from edges.
    pub const fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Smallest bounds containing both.
    pub fn union(&self, other: &Self) -> Self {
        Self::from(terrane_tree::envelope::union(
            &Rect::from(*self),
            &Rect::from(*other),
        ))
    }
}

impl From<Rect> for Bounds {
    fn from(r: Rect) -> Self {
        Self::new(r.x0, r.x1, r.y0, r.y1)
    }
}

impl From<Bounds> for Rect {
    fn from(b: Bounds) -> Self {
        Self::new(b.min_lon, b.min_lat, b.max_lon, b.max_lat)
    }
}

/// Shorthand constructors used by tests, benches and demos.
pub mod build {
    use super::{EntityContainer, EntityId, EntityType, Member, Node, Relation, Way};

    /// An untagged node.
    pub fn node(id: EntityId, lon: f64, lat: f64) -> EntityContainer {
        EntityContainer::Node(Node {
            id,
            lon,
            lat,
            tags: Vec::new(),
        })
    }

    /// An untagged way.
    pub fn way(id: EntityId, nodes: &[EntityId]) -> EntityContainer {
        EntityContainer::Way(Way {
            id,
            nodes: nodes.to_vec(),
            tags: Vec::new(),
        })
    }

    /// An untagged relation with empty roles.
    pub fn relation(id: EntityId, members: &[(EntityType, EntityId)]) -> EntityContainer {
        EntityContainer::Relation(Relation {
            id,
            members: members
                .iter()
                .map(|&(kind, id)| Member {
                    kind,
                    id,
                    role: String::new(),
                })
                .collect(),
            tags: Vec::new(),
        })
    }
}
