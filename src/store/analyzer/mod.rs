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
//! Predicate-aware column scanner.
//!
//! The analyzer drives the integer block accessor one candidate subblock at
//! a time and emits matching row ids in ascending order. The inner routine
//! is picked once per filter (packing x predicate shape x polarity x
//! interval closedness) through a function-pointer table, so the per-value
//! loop carries a concrete predicate. CONST blocks that fail the predicate
//! and TABLE blocks whose table has no match are skipped without touching
//! their subblocks.
//!
//! Current limitations:
//! - Exclude polarity is accepted for value-set filters only.
//! - Float columns route multi-value sets through the linear scan; the
//!   literal-to-bits table order does not support binary search.

use std::sync::Arc;

use crate::common::AttrType;

use super::block::{IntPacking, INT_PACKING_TOTAL};
use super::codec::IntValue;
use super::constants::{LINEAR_SEARCH_THRESH, SUBBLOCK_SIZE};
use super::iterator::IntAccessor;
use super::reader::FileReader;
use super::ColumnHeader;

pub mod filter;
pub(crate) mod interval;

use filter::{Filter, FilterKind};
use interval::{RangeEval, ValueInInterval};

/// Filter-driven scan over one column, emitting sorted row-id batches.
pub trait Analyzer: Send {
    /// Fill `out` with the next batch of matching row ids (ascending).
    /// Returns false once the scan is exhausted.
    fn next_block(&mut self, out: &mut Vec<u32>) -> Result<bool, String>;

    /// Values examined so far.
    fn num_processed(&self) -> i64;

    /// Restrict the scan to a set of global subblock ids.
    fn restrict_to_subblocks(&mut self, subblocks: Vec<u32>) -> Result<(), String>;
}

/// How stored bits of a column compare against filter literals and bounds.
pub(crate) trait AnalyzerDomain: Send + Sync + 'static {
    type Stored: IntValue;

    /// Whether sorted-literal binary search is usable for this domain.
    const BINARY_SEARCH_OK: bool;

    /// Literal converted to stored form; None when unrepresentable (such a
    /// literal matches nothing).
    fn stored_from_literal(literal: i64) -> Option<Self::Stored>;

    fn to_domain(v: Self::Stored) -> i64;

    fn eval_range<R: RangeEval>(v: Self::Stored, f: &Filter) -> bool;
}

pub(crate) struct Uint32Domain;

impl AnalyzerDomain for Uint32Domain {
    type Stored = u32;
    const BINARY_SEARCH_OK: bool = true;

    fn stored_from_literal(literal: i64) -> Option<u32> {
        u32::try_from(literal).ok()
    }

    fn to_domain(v: u32) -> i64 {
        v as i64
    }

    fn eval_range<R: RangeEval>(v: u32, f: &Filter) -> bool {
        R::eval(v as i64, f.min_value, f.max_value)
    }
}

pub(crate) struct Int64Domain;

impl AnalyzerDomain for Int64Domain {
    type Stored = u64;
    const BINARY_SEARCH_OK: bool = true;

    fn stored_from_literal(literal: i64) -> Option<u64> {
        Some(literal as u64)
    }

    fn to_domain(v: u64) -> i64 {
        v as i64
    }

    fn eval_range<R: RangeEval>(v: u64, f: &Filter) -> bool {
        R::eval(v as i64, f.min_value, f.max_value)
    }
}

pub(crate) struct FloatDomain;

impl AnalyzerDomain for FloatDomain {
    type Stored = u32;
    const BINARY_SEARCH_OK: bool = false;

    fn stored_from_literal(literal: i64) -> Option<u32> {
        u32::try_from(literal).ok()
    }

    fn to_domain(v: u32) -> i64 {
        v as i64
    }

    fn eval_range<R: RangeEval>(v: u32, f: &Filter) -> bool {
        R::eval(f32::from_bits(v), f.min_value_f, f.max_value_f)
    }
}

fn scan_single<D: AnalyzerDomain, const EQ: bool>(
    values: &[D::Stored],
    target: Option<D::Stored>,
    start_row: u32,
    out: &mut Vec<u32>,
) -> usize {
    let mut row = start_row;
    for &v in values {
        let matched = target.map_or(false, |t| v == t);
        if matched ^ !EQ {
            out.push(row);
        }
        row += 1;
    }
    values.len()
}

fn scan_values_linear<D: AnalyzerDomain, const EQ: bool>(
    values: &[D::Stored],
    targets: &[D::Stored],
    start_row: u32,
    out: &mut Vec<u32>,
) -> usize {
    let mut row = start_row;
    for &v in values {
        let matched = targets.iter().any(|&t| t == v);
        if matched ^ !EQ {
            out.push(row);
        }
        row += 1;
    }
    values.len()
}

fn scan_values_binary<D: AnalyzerDomain, const EQ: bool>(
    values: &[D::Stored],
    sorted_literals: &[i64],
    start_row: u32,
    out: &mut Vec<u32>,
) -> usize {
    let mut row = start_row;
    for &v in values {
        let matched = sorted_literals.binary_search(&D::to_domain(v)).is_ok();
        if matched ^ !EQ {
            out.push(row);
        }
        row += 1;
    }
    values.len()
}

fn scan_range<D: AnalyzerDomain, R: RangeEval>(
    values: &[D::Stored],
    filter: &Filter,
    start_row: u32,
    out: &mut Vec<u32>,
) -> usize {
    let mut row = start_row;
    for &v in values {
        if D::eval_range::<R>(v, filter) {
            out.push(row);
        }
        row += 1;
    }
    values.len()
}

fn scan_table_single<const EQ: bool>(
    indexes: &[u32],
    table_value_id: i32,
    start_row: u32,
    out: &mut Vec<u32>,
) -> usize {
    let mut row = start_row;
    if !EQ && table_value_id == -1 {
        // excluded value absent from the table: every row matches
        for _ in indexes {
            out.push(row);
            row += 1;
        }
        return indexes.len();
    }
    for &i in indexes {
        if (i as i32 == table_value_id) ^ !EQ {
            out.push(row);
        }
        row += 1;
    }
    indexes.len()
}

fn scan_table_values<const EQ: bool, const LINEAR: bool>(
    indexes: &[u32],
    table_value_ids: &[u8],
    start_row: u32,
    out: &mut Vec<u32>,
) -> usize {
    let mut row = start_row;
    if !EQ && table_value_ids.is_empty() {
        for _ in indexes {
            out.push(row);
            row += 1;
        }
        return indexes.len();
    }
    for &i in indexes {
        let matched = if LINEAR {
            table_value_ids.iter().any(|&j| j as u32 == i)
        } else {
            table_value_ids.binary_search(&(i as u8)).is_ok()
        };
        if matched ^ !EQ {
            out.push(row);
        }
        row += 1;
    }
    indexes.len()
}

fn scan_table_range(
    indexes: &[u32],
    range_map: &[bool; 256],
    start_row: u32,
    out: &mut Vec<u32>,
) -> usize {
    let mut row = start_row;
    for &i in indexes {
        if range_map[i as usize] {
            out.push(row);
        }
        row += 1;
    }
    indexes.len()
}

type ProcessFn<D, R> = fn(&mut IntAnalyzer<D, R>, usize) -> Result<usize, String>;

/// Integer analyzer, monomorphized over value domain and interval shape.
pub(crate) struct IntAnalyzer<D: AnalyzerDomain, R: RangeEval> {
    acc: IntAccessor<D::Stored>,
    filter: Filter,
    single_target: Option<D::Stored>,
    targets: Vec<D::Stored>,
    sorted_literals: Vec<i64>,

    table_value_id: i32,
    table_value_ids: Vec<u8>,
    range_map: [bool; 256],

    candidates: Option<Vec<u32>>,
    cur_candidate: usize,
    total_subblocks: usize,
    subblocks_per_block: usize,

    cur_row: u32,
    collected: Vec<u32>,
    num_processed: i64,
    stopped: bool,

    process_fns: [Option<ProcessFn<D, R>>; INT_PACKING_TOTAL],
    process_fn: Option<ProcessFn<D, R>>,
}

fn fixup_filter(filter: &mut Filter, attr_type: AttrType) {
    if attr_type != AttrType::Float {
        return;
    }
    if filter.kind == FilterKind::Values && filter.values.len() == 1 {
        filter.kind = FilterKind::FloatRange;
        filter.min_value_f = filter.values[0] as f32;
        filter.max_value_f = filter.min_value_f;
        filter.left_closed = true;
        filter.right_closed = true;
        filter.left_unbounded = false;
        filter.right_unbounded = false;
    } else if filter.kind == FilterKind::Range {
        filter.kind = FilterKind::FloatRange;
        filter.min_value_f = filter.min_value as f32;
        filter.max_value_f = filter.max_value as f32;
    }
}

impl<D: AnalyzerDomain, R: RangeEval> IntAnalyzer<D, R> {
    pub(crate) fn new(
        header: Arc<ColumnHeader>,
        reader: FileReader,
        filter: &Filter,
    ) -> Result<Self, String> {
        let mut filter = filter.clone();
        if filter.exclude && filter.kind != FilterKind::Values {
            return Err(format!(
                "exclude polarity requires a value-set filter: column={}",
                header.name()
            ));
        }
        fixup_filter(&mut filter, header.attr_type());
        if filter.kind == FilterKind::FloatRange
            && (filter.min_value_f.is_nan() || filter.max_value_f.is_nan())
        {
            return Err(format!(
                "NaN endpoint in float range filter: column={}",
                header.name()
            ));
        }

        let mut sorted_literals = filter.values.clone();
        sorted_literals.sort_unstable();
        let targets: Vec<D::Stored> = filter
            .values
            .iter()
            .filter_map(|&l| D::stored_from_literal(l))
            .collect();
        let single_target = if filter.values.len() == 1 {
            D::stored_from_literal(filter.values[0])
        } else {
            None
        };

        let acc = IntAccessor::new(header, reader)?;
        let subblocks_per_block = acc.header.subblocks_per_block();
        let total_subblocks = acc.header.total_subblocks();

        let mut analyzer = IntAnalyzer {
            acc,
            filter,
            single_target,
            targets,
            sorted_literals,
            table_value_id: -1,
            table_value_ids: Vec::new(),
            range_map: [false; 256],
            candidates: None,
            cur_candidate: 0,
            total_subblocks,
            subblocks_per_block,
            cur_row: 0,
            collected: Vec::with_capacity(2 * SUBBLOCK_SIZE),
            num_processed: 0,
            stopped: false,
            process_fns: [None; INT_PACKING_TOTAL],
            process_fn: None,
        };
        analyzer.setup_packing_funcs();
        Ok(analyzer)
    }

    fn setup_packing_funcs(&mut self) {
        self.process_fns = [None; INT_PACKING_TOTAL];
        self.process_fns[IntPacking::Const as usize] = Some(Self::process_const);

        match self.filter.kind {
            FilterKind::Values => {
                if self.filter.values.len() == 1 {
                    self.setup_packing_funcs_single_value();
                } else if self.filter.values.len() <= LINEAR_SEARCH_THRESH
                    || !D::BINARY_SEARCH_OK
                {
                    self.setup_packing_funcs_values_linear();
                } else {
                    self.setup_packing_funcs_values_binary();
                }
            }
            FilterKind::Range | FilterKind::FloatRange => self.setup_packing_funcs_range(),
        }
    }

    fn setup_packing_funcs_single_value(&mut self) {
        let funcs = &mut self.process_fns;
        if self.filter.exclude {
            funcs[IntPacking::Table as usize] = Some(Self::process_table_single::<false>);
            funcs[IntPacking::DeltaPfor as usize] = Some(Self::process_pfor_single::<false, true>);
            funcs[IntPacking::GenericPfor as usize] =
                Some(Self::process_pfor_single::<false, false>);
        } else {
            funcs[IntPacking::Table as usize] = Some(Self::process_table_single::<true>);
            funcs[IntPacking::DeltaPfor as usize] = Some(Self::process_pfor_single::<true, true>);
            funcs[IntPacking::GenericPfor as usize] =
                Some(Self::process_pfor_single::<true, false>);
        }
    }

    fn setup_packing_funcs_values_linear(&mut self) {
        let funcs = &mut self.process_fns;
        if self.filter.exclude {
            funcs[IntPacking::Table as usize] = Some(Self::process_table_values::<false, true>);
            funcs[IntPacking::DeltaPfor as usize] =
                Some(Self::process_pfor_values::<false, true, true>);
            funcs[IntPacking::GenericPfor as usize] =
                Some(Self::process_pfor_values::<false, true, false>);
        } else {
            funcs[IntPacking::Table as usize] = Some(Self::process_table_values::<true, true>);
            funcs[IntPacking::DeltaPfor as usize] =
                Some(Self::process_pfor_values::<true, true, true>);
            funcs[IntPacking::GenericPfor as usize] =
                Some(Self::process_pfor_values::<true, true, false>);
        }
    }

    fn setup_packing_funcs_values_binary(&mut self) {
        let funcs = &mut self.process_fns;
        if self.filter.exclude {
            funcs[IntPacking::Table as usize] = Some(Self::process_table_values::<false, false>);
            funcs[IntPacking::DeltaPfor as usize] =
                Some(Self::process_pfor_values::<false, false, true>);
            funcs[IntPacking::GenericPfor as usize] =
                Some(Self::process_pfor_values::<false, false, false>);
        } else {
            funcs[IntPacking::Table as usize] = Some(Self::process_table_values::<true, false>);
            funcs[IntPacking::DeltaPfor as usize] =
                Some(Self::process_pfor_values::<true, false, true>);
            funcs[IntPacking::GenericPfor as usize] =
                Some(Self::process_pfor_values::<true, false, false>);
        }
    }

    fn setup_packing_funcs_range(&mut self) {
        let funcs = &mut self.process_fns;
        funcs[IntPacking::Table as usize] = Some(Self::process_table_range);
        funcs[IntPacking::DeltaPfor as usize] = Some(Self::process_pfor_range::<true>);
        funcs[IntPacking::GenericPfor as usize] = Some(Self::process_pfor_range::<false>);
    }

    fn candidate(&self, index: usize) -> Option<u32> {
        match &self.candidates {
            Some(list) => list.get(index).copied(),
            None => (index < self.total_subblocks).then_some(index as u32),
        }
    }

    fn block_of_subblock(&self, global_subblock: u32) -> u32 {
        global_subblock / self.subblocks_per_block as u32
    }

    /// Predicate check for a CONST block; false skips the whole block.
    fn setup_const_block(&self) -> bool {
        let value = self.acc.block_const.value();
        match self.filter.kind {
            FilterKind::Values => {
                let any = self.targets.iter().any(|&t| t == value);
                any ^ self.filter.exclude
            }
            FilterKind::Range | FilterKind::FloatRange => {
                D::eval_range::<R>(value, &self.filter)
            }
        }
    }

    /// Map filter literals onto the block's table; false skips the block.
    fn setup_table_block(&mut self) -> bool {
        match self.filter.kind {
            FilterKind::Values => {
                if self.filter.values.len() == 1 {
                    self.table_value_id = self
                        .single_target
                        .map_or(-1, |t| self.acc.block_table.index_of(t));
                    if !self.filter.exclude && self.table_value_id == -1 {
                        return false;
                    }
                } else {
                    self.table_value_ids.clear();
                    for &t in &self.targets {
                        let id = self.acc.block_table.index_of(t);
                        if id != -1 {
                            self.table_value_ids.push(id as u8);
                        }
                    }
                    if !self.filter.exclude && self.table_value_ids.is_empty() {
                        return false;
                    }
                    self.table_value_ids.sort_unstable();
                }
                true
            }
            FilterKind::Range | FilterKind::FloatRange => {
                let mut any_in_range = false;
                for i in 0..self.acc.block_table.table_size() {
                    let matched =
                        D::eval_range::<R>(self.acc.block_table.table_value(i), &self.filter);
                    self.range_map[i] = matched;
                    any_in_range |= matched;
                }
                any_in_range
            }
        }
    }

    /// Load a block and pick its subblock routine. CONST and TABLE blocks
    /// whose predicate cannot match skip straight to the next candidate
    /// block; returns false when no candidates remain.
    fn enter_block(&mut self, block_id: u32) -> Result<bool, String> {
        let mut block_id = block_id;
        loop {
            self.acc.set_cur_block(block_id)?;
            let scannable = match self.acc.packing {
                IntPacking::DeltaPfor | IntPacking::GenericPfor => true,
                IntPacking::Const => self.setup_const_block(),
                IntPacking::Table => self.setup_table_block(),
            };
            if scannable {
                self.process_fn = self.process_fns[self.acc.packing as usize];
                if self.process_fn.is_none() {
                    return Err(format!(
                        "no subblock routine for packing: column={}, packing={:?}",
                        self.acc.header.name(),
                        self.acc.packing
                    ));
                }
                return Ok(true);
            }

            let mut next_block = None;
            while let Some(global_sub) = self.candidate(self.cur_candidate) {
                let b = self.block_of_subblock(global_sub);
                if b != block_id {
                    next_block = Some(b);
                    break;
                }
                self.cur_candidate += 1;
            }
            match next_block {
                Some(b) => block_id = b,
                None => return Ok(false),
            }
        }
    }

    fn read_table_subblock(&mut self, sub_in_block: usize) -> Result<(), String> {
        let n_values = self.acc.cursor.num_subblock_values(sub_in_block);
        self.acc
            .block_table
            .read_subblock(sub_in_block, n_values, &mut self.acc.reader)
    }

    fn process_const(&mut self, sub_in_block: usize) -> Result<usize, String> {
        let n_values = self.acc.cursor.num_subblock_values(sub_in_block);
        let row = self.cur_row;
        for i in 0..n_values {
            self.collected.push(row + i as u32);
        }
        Ok(n_values)
    }

    fn process_table_single<const EQ: bool>(&mut self, sub_in_block: usize) -> Result<usize, String> {
        self.read_table_subblock(sub_in_block)?;
        Ok(scan_table_single::<EQ>(
            self.acc.block_table.value_indexes(),
            self.table_value_id,
            self.cur_row,
            &mut self.collected,
        ))
    }

    fn process_table_values<const EQ: bool, const LINEAR: bool>(
        &mut self,
        sub_in_block: usize,
    ) -> Result<usize, String> {
        self.read_table_subblock(sub_in_block)?;
        Ok(scan_table_values::<EQ, LINEAR>(
            self.acc.block_table.value_indexes(),
            &self.table_value_ids,
            self.cur_row,
            &mut self.collected,
        ))
    }

    fn process_table_range(&mut self, sub_in_block: usize) -> Result<usize, String> {
        self.read_table_subblock(sub_in_block)?;
        Ok(scan_table_range(
            self.acc.block_table.value_indexes(),
            &self.range_map,
            self.cur_row,
            &mut self.collected,
        ))
    }

    fn process_pfor_single<const EQ: bool, const DELTA: bool>(
        &mut self,
        sub_in_block: usize,
    ) -> Result<usize, String> {
        self.acc
            .block_pfor
            .read_subblock(sub_in_block, &mut self.acc.reader, DELTA)?;
        Ok(scan_single::<D, EQ>(
            self.acc.block_pfor.values(),
            self.single_target,
            self.cur_row,
            &mut self.collected,
        ))
    }

    fn process_pfor_values<const EQ: bool, const LINEAR: bool, const DELTA: bool>(
        &mut self,
        sub_in_block: usize,
    ) -> Result<usize, String> {
        self.acc
            .block_pfor
            .read_subblock(sub_in_block, &mut self.acc.reader, DELTA)?;
        if LINEAR {
            Ok(scan_values_linear::<D, EQ>(
                self.acc.block_pfor.values(),
                &self.targets,
                self.cur_row,
                &mut self.collected,
            ))
        } else {
            Ok(scan_values_binary::<D, EQ>(
                self.acc.block_pfor.values(),
                &self.sorted_literals,
                self.cur_row,
                &mut self.collected,
            ))
        }
    }

    fn process_pfor_range<const DELTA: bool>(&mut self, sub_in_block: usize) -> Result<usize, String> {
        self.acc
            .block_pfor
            .read_subblock(sub_in_block, &mut self.acc.reader, DELTA)?;
        Ok(scan_range::<D, R>(
            self.acc.block_pfor.values(),
            &self.filter,
            self.cur_row,
            &mut self.collected,
        ))
    }
}

impl<D: AnalyzerDomain, R: RangeEval> Analyzer for IntAnalyzer<D, R> {
    fn next_block(&mut self, out: &mut Vec<u32>) -> Result<bool, String> {
        let result = self.next_batch(out);
        if result.is_err() {
            // read or decode failures are terminal for this scan
            self.stopped = true;
        }
        result
    }

    fn num_processed(&self) -> i64 {
        self.num_processed
    }

    fn restrict_to_subblocks(&mut self, mut subblocks: Vec<u32>) -> Result<(), String> {
        for &s in &subblocks {
            if s as usize >= self.total_subblocks {
                return Err(format!(
                    "candidate subblock out of range: column={}, subblock={}, total_subblocks={}",
                    self.acc.header.name(),
                    s,
                    self.total_subblocks
                ));
            }
        }
        subblocks.sort_unstable();
        subblocks.dedup();
        self.candidates = Some(subblocks);
        self.cur_candidate = 0;
        self.stopped = false;
        Ok(())
    }
}

impl<D: AnalyzerDomain, R: RangeEval> IntAnalyzer<D, R> {
    fn next_batch(&mut self, out: &mut Vec<u32>) -> Result<bool, String> {
        out.clear();
        if self.stopped {
            return Ok(false);
        }
        self.collected.clear();

        // Scan until at least one subblock's worth of matches accumulates;
        // a sparse filter may walk many subblocks per batch.
        while self.collected.len() < SUBBLOCK_SIZE {
            let Some(global_sub) = self.candidate(self.cur_candidate) else {
                self.stopped = true;
                break;
            };
            let block_id = self.block_of_subblock(global_sub);
            if self.acc.cursor.block_id != block_id {
                if !self.enter_block(block_id)? {
                    self.stopped = true;
                    break;
                }
                continue;
            }

            let sub_in_block = global_sub as usize - block_id as usize * self.subblocks_per_block;
            self.cur_row = self.acc.header.block_start_row(block_id)
                + (sub_in_block * SUBBLOCK_SIZE) as u32;
            let process = match self.process_fn {
                Some(f) => f,
                None => {
                    return Err(format!(
                        "subblock routine not selected: column={}",
                        self.acc.header.name()
                    ))
                }
            };
            let processed = process(self, sub_in_block)?;
            self.num_processed += processed as i64;
            self.cur_candidate += 1;
        }

        if self.collected.is_empty() {
            return Ok(false);
        }
        std::mem::swap(out, &mut self.collected);
        Ok(true)
    }
}

fn create_for_interval<R: RangeEval>(
    header: Arc<ColumnHeader>,
    reader: FileReader,
    filter: &Filter,
) -> Result<Box<dyn Analyzer>, String> {
    match header.attr_type() {
        AttrType::Uint32 | AttrType::Timestamp => Ok(Box::new(
            IntAnalyzer::<Uint32Domain, R>::new(header, reader, filter)?,
        )),
        AttrType::Int64 => Ok(Box::new(IntAnalyzer::<Int64Domain, R>::new(
            header, reader, filter,
        )?)),
        AttrType::Float => Ok(Box::new(IntAnalyzer::<FloatDomain, R>::new(
            header, reader, filter,
        )?)),
        other => Err(format!(
            "cannot create integer analyzer: column={}, type={}",
            header.name(),
            other.name()
        )),
    }
}

/// Build an analyzer monomorphized over the filter's interval shape and the
/// column's value domain.
pub fn create_int_analyzer(
    header: Arc<ColumnHeader>,
    reader: FileReader,
    filter: &Filter,
) -> Result<Box<dyn Analyzer>, String> {
    let index = (filter.left_closed as u32) * 8
        + (filter.right_closed as u32) * 4
        + (filter.left_unbounded as u32) * 2
        + (filter.right_unbounded as u32);
    match index {
        0 => create_for_interval::<ValueInInterval<false, false, false, false>>(header, reader, filter),
        1 => create_for_interval::<ValueInInterval<false, false, false, true>>(header, reader, filter),
        2 => create_for_interval::<ValueInInterval<false, false, true, false>>(header, reader, filter),
        3 => create_for_interval::<ValueInInterval<false, false, true, true>>(header, reader, filter),
        4 => create_for_interval::<ValueInInterval<false, true, false, false>>(header, reader, filter),
        5 => create_for_interval::<ValueInInterval<false, true, false, true>>(header, reader, filter),
        6 => create_for_interval::<ValueInInterval<false, true, true, false>>(header, reader, filter),
        7 => create_for_interval::<ValueInInterval<false, true, true, true>>(header, reader, filter),
        8 => create_for_interval::<ValueInInterval<true, false, false, false>>(header, reader, filter),
        9 => create_for_interval::<ValueInInterval<true, false, false, true>>(header, reader, filter),
        10 => create_for_interval::<ValueInInterval<true, false, true, false>>(header, reader, filter),
        11 => create_for_interval::<ValueInInterval<true, false, true, true>>(header, reader, filter),
        12 => create_for_interval::<ValueInInterval<true, true, false, false>>(header, reader, filter),
        13 => create_for_interval::<ValueInInterval<true, true, false, true>>(header, reader, filter),
        14 => create_for_interval::<ValueInInterval<true, true, true, false>>(header, reader, filter),
        _ => create_for_interval::<ValueInInterval<true, true, true, true>>(header, reader, filter),
    }
}
