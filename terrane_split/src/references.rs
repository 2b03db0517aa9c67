// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ids referenced by a leaf but not present in it.
//!
//! Ways replicated into a leaf by their bounding box refer to nodes that may live in a
//! neighbouring leaf. The collector records both sides per entity type so the gap can be filled
//! in a later pass from CompactIdList files of the missing ids.

use std::collections::BTreeSet;
use std::path::Path;

use terrane_io::{
    Bounds, EntityContainer, EntityId, EntitySink, EntitySource, EntityType, write_id_list,
};

use crate::error::Result;

/// Present and referenced ids of one stream, per entity type.
#[derive(Clone, Debug, Default)]
pub struct ReferenceCollector {
    present: [BTreeSet<EntityId>; 3],
    referenced: [BTreeSet<EntityId>; 3],
}

impl ReferenceCollector {
    /// An empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entity` and everything it refers to.
    ///
    /// Way node refs count as node references. Relation members count against their own member
    /// type.
    pub fn observe(&mut self, entity: &EntityContainer) {
        self.present[entity.entity_type().ordinal()].insert(entity.id());
        match entity {
            EntityContainer::Node(_) => {}
            EntityContainer::Way(w) => {
                self.referenced[EntityType::Node.ordinal()].extend(w.nodes.iter().copied());
            }
            EntityContainer::Relation(r) => {
                for m in &r.members {
                    self.referenced[m.kind.ordinal()].insert(m.id);
                }
            }
        }
    }

    /// Whether an entity of type `kind` with id `id` was seen.
    pub fn is_present(&self, kind: EntityType, id: EntityId) -> bool {
        self.present[kind.ordinal()].contains(&id)
    }

    /// Referenced ids of type `kind` not present, ascending.
    pub fn missing(&self, kind: EntityType) -> Vec<EntityId> {
        let i = kind.ordinal();
        self.referenced[i]
            .difference(&self.present[i])
            .copied()
            .collect()
    }

    /// Write [`ReferenceCollector::missing`] for `kind` as a CompactIdList file.
    ///
    /// Returns the number of ids written.
    pub fn write_missing(&self, kind: EntityType, path: &Path) -> Result<u64> {
        Ok(write_id_list(path, self.missing(kind))?)
    }
}

impl EntitySink for ReferenceCollector {
    fn write_bounds(&mut self, _bounds: Bounds) -> terrane_io::Result<()> {
        Ok(())
    }

    fn write(&mut self, entity: &EntityContainer) -> terrane_io::Result<()> {
        self.observe(entity);
        Ok(())
    }

    fn complete(&mut self) -> terrane_io::Result<()> {
        Ok(())
    }
}

/// Collect the references of every entity of `source`.
pub fn collect_references<S: EntitySource>(source: S) -> Result<ReferenceCollector> {
    let mut collector = ReferenceCollector::new();
    terrane_io::copy_stream(source, &mut collector)?;
    Ok(collector)
}
