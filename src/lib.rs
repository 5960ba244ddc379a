// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Read path of a columnar attribute store.
//!
//! The crate decodes immutable segment files (per-column blocks with
//! CONST/TABLE/DELTA_PFOR/GENERIC_PFOR packings), runs predicate-aware scans
//! that emit sorted row-id batches, and consults a learned secondary index
//! that maps values back to row-id posting lists.

pub mod common;
pub mod secondary;
pub mod store;

pub use common::{install_collations, AttrType, Collation, LIB_VERSION, STORAGE_VERSION};
pub use secondary::iterator::{RowIdIterator, RowIdRange};
pub use secondary::pgm::{ApproxPos, PgmIndex};
pub use secondary::{open_index, SecondaryIndex};
pub use store::analyzer::filter::{Filter, FilterKind};
pub use store::analyzer::{create_int_analyzer, Analyzer};
pub use store::iterator::{
    create_int_iterator, create_mva_iterator, create_string_iterator, IteratorHints, ValueIterator,
};
pub use store::reader::FileReader;
pub use store::{open_segment, ColumnHeader, Segment};
