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
//! Per-column filter description shared by analyzers and the secondary
//! index.

/// Predicate shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    /// Membership in a literal set.
    Values,
    /// Integer interval.
    Range,
    /// IEEE-754 single interval.
    FloatRange,
}

/// A value or range predicate against one column.
///
/// `exclude` is only meaningful for `Values`. The interval flags follow the
/// closed/open/unbounded convention: an unbounded side ignores its endpoint,
/// and a fully unbounded range matches every row.
#[derive(Clone, Debug)]
pub struct Filter {
    pub attr: String,
    pub kind: FilterKind,
    pub exclude: bool,
    pub values: Vec<i64>,
    /// String literals; the secondary index hashes these with the column's
    /// collation before matching.
    pub string_values: Vec<Vec<u8>>,
    pub min_value: i64,
    pub max_value: i64,
    pub min_value_f: f32,
    pub max_value_f: f32,
    pub left_closed: bool,
    pub right_closed: bool,
    pub left_unbounded: bool,
    pub right_unbounded: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            attr: String::new(),
            kind: FilterKind::Values,
            exclude: false,
            values: Vec::new(),
            string_values: Vec::new(),
            min_value: i64::MIN,
            max_value: i64::MAX,
            min_value_f: f32::MIN,
            max_value_f: f32::MAX,
            left_closed: true,
            right_closed: true,
            left_unbounded: false,
            right_unbounded: false,
        }
    }
}

impl Filter {
    pub fn values(attr: &str, values: Vec<i64>) -> Self {
        Filter {
            attr: attr.to_string(),
            kind: FilterKind::Values,
            values,
            ..Filter::default()
        }
    }

    pub fn exclude_values(attr: &str, values: Vec<i64>) -> Self {
        Filter {
            exclude: true,
            ..Filter::values(attr, values)
        }
    }

    pub fn string_values(attr: &str, values: Vec<Vec<u8>>) -> Self {
        Filter {
            attr: attr.to_string(),
            kind: FilterKind::Values,
            string_values: values,
            ..Filter::default()
        }
    }

    pub fn range(attr: &str, min: i64, max: i64, left_closed: bool, right_closed: bool) -> Self {
        Filter {
            attr: attr.to_string(),
            kind: FilterKind::Range,
            min_value: min,
            max_value: max,
            left_closed,
            right_closed,
            ..Filter::default()
        }
    }

    /// `attr > min` (or `>=` when closed); no right bound.
    pub fn greater(attr: &str, min: i64, closed: bool) -> Self {
        Filter {
            attr: attr.to_string(),
            kind: FilterKind::Range,
            min_value: min,
            left_closed: closed,
            right_unbounded: true,
            ..Filter::default()
        }
    }

    /// `attr < max` (or `<=` when closed); no left bound.
    pub fn less(attr: &str, max: i64, closed: bool) -> Self {
        Filter {
            attr: attr.to_string(),
            kind: FilterKind::Range,
            max_value: max,
            right_closed: closed,
            left_unbounded: true,
            ..Filter::default()
        }
    }

    pub fn float_range(
        attr: &str,
        min: f32,
        max: f32,
        left_closed: bool,
        right_closed: bool,
    ) -> Self {
        Filter {
            attr: attr.to_string(),
            kind: FilterKind::FloatRange,
            min_value_f: min,
            max_value_f: max,
            left_closed,
            right_closed,
            ..Filter::default()
        }
    }
}
