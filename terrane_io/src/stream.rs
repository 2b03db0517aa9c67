// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pull-based entity sources and append-only entity sinks.
//!
//! Codecs plug into the rest of the system through these two traits. A source yields
//! [`EntityContainer`] values (usually in default order), optionally preceded by a [`Bounds`]
//! record; a sink accepts an optional bounds record, then entities, then a terminal
//! [`EntitySink::complete`] call.

use crate::entity::{Bounds, EntityContainer};
use crate::error::Result;

/// A forward-only stream of entities.
pub trait EntitySource {
    /// Bounds record that preceded the entities, if any.
    fn bounds(&self) -> Option<Bounds>;

    /// Next entity, or `Ok(None)` at the end of the stream.
    fn next_entity(&mut self) -> Result<Option<EntityContainer>>;
}

impl<S: EntitySource + ?Sized> EntitySource for Box<S> {
    fn bounds(&self) -> Option<Bounds> {
        (**self).bounds()
    }

    fn next_entity(&mut self) -> Result<Option<EntityContainer>> {
        (**self).next_entity()
    }
}

impl<S: EntitySource + ?Sized> EntitySource for &mut S {
    fn bounds(&self) -> Option<Bounds> {
        (**self).bounds()
    }

    fn next_entity(&mut self) -> Result<Option<EntityContainer>> {
        (**self).next_entity()
    }
}

/// An append-only entity writer.
pub trait EntitySink {
    /// Write the bounds record. Must come before any entity.
    fn write_bounds(&mut self, bounds: Bounds) -> Result<()>;

    /// Append one entity.
    fn write(&mut self, entity: &EntityContainer) -> Result<()>;

    /// Write any trailer and flush. No further writes are accepted.
    fn complete(&mut self) -> Result<()>;
}

impl<S: EntitySink + ?Sized> EntitySink for Box<S> {
    fn write_bounds(&mut self, bounds: Bounds) -> Result<()> {
        (**self).write_bounds(bounds)
    }

    fn write(&mut self, entity: &EntityContainer) -> Result<()> {
        (**self).write(entity)
    }

    fn complete(&mut self) -> Result<()> {
        (**self).complete()
    }
}

impl<S: EntitySink + ?Sized> EntitySink for &mut S {
    fn write_bounds(&mut self, bounds: Bounds) -> Result<()> {
        (**self).write_bounds(bounds)
    }

    fn write(&mut self, entity: &EntityContainer) -> Result<()> {
        (**self).write(entity)
    }

    fn complete(&mut self) -> Result<()> {
        (**self).complete()
    }
}

/// In-memory source over a vector.
#[derive(Clone, Debug, Default)]
pub struct VecSource {
    bounds: Option<Bounds>,
    entities: std::vec::IntoIter<EntityContainer>,
}

impl VecSource {
    /// Source yielding `entities` in the given order.
    pub fn new(entities: Vec<EntityContainer>) -> Self {
        Self {
            bounds: None,
            entities: entities.into_iter(),
        }
    }

    /// Attach a bounds record.
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

impl EntitySource for VecSource {
    fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    fn next_entity(&mut self) -> Result<Option<EntityContainer>> {
        Ok(self.entities.next())
    }
}

/// In-memory sink collecting everything written to it.
#[derive(Clone, Debug, Default)]
pub struct VecSink {
    /// Bounds record, if one was written.
    pub bounds: Option<Bounds>,
    /// Entities in write order.
    pub entities: Vec<EntityContainer>,
    /// Whether [`EntitySink::complete`] was called.
    pub completed: bool,
}

impl VecSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the written entities, in write order.
    pub fn ids(&self) -> Vec<i64> {
        self.entities.iter().map(EntityContainer::id).collect()
    }
}

impl EntitySink for VecSink {
    fn write_bounds(&mut self, bounds: Bounds) -> Result<()> {
        self.bounds = Some(bounds);
        Ok(())
    }

    fn write(&mut self, entity: &EntityContainer) -> Result<()> {
        self.entities.push(entity.clone());
        Ok(())
    }

    fn complete(&mut self) -> Result<()> {
        self.completed = true;
        Ok(())
    }
}

/// A source with one entity of lookahead.
///
/// Gives merges "has more" / "peek" / "advance" semantics on top of any [`EntitySource`].
#[derive(Debug)]
pub struct PeekableSource<S> {
    inner: S,
    head: Option<EntityContainer>,
}

impl<S: EntitySource> PeekableSource<S> {
    /// Wrap `inner`, reading its first entity.
    pub fn new(mut inner: S) -> Result<Self> {
        let head = inner.next_entity()?;
        Ok(Self { inner, head })
    }

    /// Whether an entity is pending.
    pub fn has_more(&self) -> bool {
        self.head.is_some()
    }

    /// The pending entity.
    pub fn peek(&self) -> Option<&EntityContainer> {
        self.head.as_ref()
    }

    /// Discard the pending entity and read the next one.
    pub fn advance(&mut self) -> Result<()> {
        self.head = self.inner.next_entity()?;
        Ok(())
    }

    /// Return the pending entity and read the next one.
    pub fn take(&mut self) -> Result<Option<EntityContainer>> {
        let next = self.inner.next_entity()?;
        Ok(std::mem::replace(&mut self.head, next))
    }

    /// Bounds of the wrapped source.
    pub fn bounds(&self) -> Option<Bounds> {
        self.inner.bounds()
    }

    /// Unwrap, dropping any pending entity.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// Iterator over the entities of a source, see [`entities`].
#[derive(Debug)]
pub struct Entities<S> {
    source: S,
    failed: bool,
}

/// Iterate over `source`. Iteration ends after the first error.
pub fn entities<S: EntitySource>(source: S) -> Entities<S> {
    Entities {
        source,
        failed: false,
    }
}

impl<S: EntitySource> Iterator for Entities<S> {
    type Item = Result<EntityContainer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.source.next_entity().transpose();
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        next
    }
}

/// Copy every entity of `source` into `sink` (bounds first, if any) and complete the sink.
///
/// Returns the number of entities copied.
pub fn copy_stream<S: EntitySource, K: EntitySink>(mut source: S, sink: &mut K) -> Result<u64> {
    if let Some(b) = source.bounds() {
        sink.write_bounds(b)?;
    }
    let mut n = 0;
    while let Some(e) = source.next_entity()? {
        sink.write(&e)?;
        n += 1;
    }
    sink.complete()?;
    Ok(n)
}

/// Whether `entities` is in default order: types non-decreasing, ids strictly increasing per type.
pub fn is_default_order(entities: &[EntityContainer]) -> bool {
    entities
        .windows(2)
        .all(|w| w[0].order_key() < w[1].order_key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::build::*;

    #[test]
    fn peekable_reports_has_more() {
        let source = VecSource::new(vec![node(1, 0.0, 0.0), way(2, &[1])]);
        let mut p = PeekableSource::new(source).unwrap();
        assert!(p.has_more());
        assert_eq!(p.peek().map(EntityContainer::id), Some(1));
        p.advance().unwrap();
        assert_eq!(p.take().unwrap().map(|e| e.id()), Some(2));
        assert!(!p.has_more());
        assert!(p.take().unwrap().is_none());
    }

    #[test]
    fn copy_stream_forwards_bounds_and_completes() {
        let b = Bounds::new(0.0, 1.0, 0.0, 1.0);
        let src = VecSource::new(vec![node(1, 0.5, 0.5)]).with_bounds(b);
        let mut sink = VecSink::new();
        assert_eq!(copy_stream(src, &mut sink).unwrap(), 1);
        assert_eq!(sink.bounds, Some(b));
        assert!(sink.completed);
    }

    #[test]
    fn default_order_detects_duplicates_and_type_regressions() {
        assert!(is_default_order(&[node(1, 0.0, 0.0), node(2, 0.0, 0.0), way(1, &[])]));
        assert!(!is_default_order(&[node(1, 0.0, 0.0), node(1, 0.0, 0.0)]));
        assert!(!is_default_order(&[way(1, &[]), node(2, 0.0, 0.0)]));
    }
}
