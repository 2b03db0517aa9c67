// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Terrane IO: entity model, stream boundaries and on-disk formats.
//!
//! - [`EntityContainer`] and friends: the node/way/relation records moved through every stage.
//! - [`EntitySource`] / [`EntitySink`]: the pull-based boundary to codecs.
//! - [`EntityFileWriter`] / [`EntityFileReader`]: framed leaf files with a verified trailer.
//! - [`IdListWriter`] / [`IdListReader`] / [`merge_id_lists`]: delta-varint id lists.
//! - [`BboxWriter`] / [`BboxReader`] / [`BboxIndex`]: fixed-width id/extent tables.
//! - [`LeafDirs`] and [`ClosingFile`]: leaf file placement and handle-frugal output.
//! - [`write_tree`] / [`read_tree`]: persisting a shaped [`terrane_tree::SpatialTree`].
//!
//! Every reader reports the end of its input as `Ok(None)`; input that ends inside a record is
//! [`IoError::CorruptStream`].
//!
//! ```
//! use terrane_io::{EntityFileReader, EntityFileWriter, EntitySink, EntitySource};
//! use terrane_io::build::{node, way};
//!
//! let mut w = EntityFileWriter::new(Vec::new());
//! w.write(&node(1, 13.4, 52.5)).unwrap();
//! w.write(&way(7, &[1])).unwrap();
//! w.complete().unwrap();
//!
//! let bytes = w.into_inner();
//! let mut r = EntityFileReader::new(bytes.as_slice()).unwrap();
//! assert_eq!(r.next_entity().unwrap().map(|e| e.id()), Some(1));
//! assert_eq!(r.next_entity().unwrap().map(|e| e.id()), Some(7));
//! assert!(r.next_entity().unwrap().is_none());
//! ```

mod bbox;
mod closing_file;
mod entity;
mod entity_file;
mod error;
mod idlist;
mod leaf_dirs;
mod stream;
mod tree_file;
pub mod varint;

pub use bbox::{
    BboxIndex, BboxReader, BboxWriter, IdBboxEntry, RECORD_LEN, read_bbox_index, write_bbox_file,
};
pub use closing_file::{ClosingFile, DEFAULT_FLUSH_THRESHOLD};
pub use entity::{
    Bounds, EntityContainer, EntityId, EntityKinds, EntityType, Member, Node, Relation, Tag, Way,
    build,
};
pub use entity_file::{
    EntityFileReader, EntityFileWriter, create_entity_file, open_entity_file, read_entity_file,
};
pub use error::{IoError, Result};
pub use idlist::{
    IdListReader, IdListWriter, MergedIds, merge_id_lists, open_id_list, read_id_list,
    write_id_list,
};
pub use leaf_dirs::{LeafDirs, ensure_empty_dir};
pub use stream::{
    Entities, EntitySink, EntitySource, PeekableSource, VecSink, VecSource, copy_stream, entities,
    is_default_order,
};
pub use tree_file::{read_tree, read_tree_from, write_tree, write_tree_to};
