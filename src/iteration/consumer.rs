//! Splitting the indices of one partition across the worker threads of a PE.
//!
//! All ranges here are offsets into the partition, `0..num_elems`.

use crate::error::ConfigError;
use crate::iteration::Schedule;

use parking_lot::Mutex;
use rand::prelude::SliceRandom;
use rand::thread_rng;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub(crate) struct IterWorkStealer {
    pub(crate) range: Arc<Mutex<(usize, usize)>>, //start, end
}

impl IterWorkStealer {
    fn new(start: usize, end: usize) -> Self {
        IterWorkStealer {
            range: Arc::new(Mutex::new((start, end))),
        }
    }

    fn set_range(&self, start: usize, end: usize) {
        let mut range = self.range.lock();
        range.0 = start;
        range.1 = end;
    }

    fn next(&self) -> Option<usize> {
        let mut range = self.range.lock();
        let index = range.0;
        range.0 += 1;
        if range.0 <= range.1 {
            Some(index)
        } else {
            None
        }
    }

    /// Take the upper half of the remaining range.
    fn steal(&self) -> Option<(usize, usize)> {
        let mut range = self.range.lock();
        let start = range.0;
        let end = range.1;
        if end > start && end - start > 2 {
            let new_end = (start + end) / 2;
            range.1 = new_end;
            Some((new_end, end))
        } else {
            None
        }
    }
}

/// The share of a partition handed to one worker task.
#[derive(Clone, Debug)]
pub(crate) enum IterSchedule {
    Static(usize, usize),
    Dynamic(Arc<AtomicUsize>, usize),
    Chunk(Arc<Vec<(usize, usize)>>, Arc<AtomicUsize>),
    WorkStealing(IterWorkStealer, Vec<IterWorkStealer>),
}

impl IterSchedule {
    pub(crate) fn into_indices(self) -> IterScheduleIter {
        match self {
            IterSchedule::Static(start, end) => IterScheduleIter::Static(start..end),
            IterSchedule::Dynamic(cur_i, max_i) => IterScheduleIter::Dynamic(cur_i, max_i),
            IterSchedule::Chunk(ranges, range_i) => {
                IterScheduleIter::Chunk(0..0, ranges, range_i)
            }
            IterSchedule::WorkStealing(range, siblings) => {
                IterScheduleIter::WorkStealing(range, siblings)
            }
        }
    }
}

pub(crate) enum IterScheduleIter {
    Static(Range<usize>),
    Dynamic(Arc<AtomicUsize>, usize),
    Chunk(Range<usize>, Arc<Vec<(usize, usize)>>, Arc<AtomicUsize>),
    WorkStealing(IterWorkStealer, Vec<IterWorkStealer>),
}

impl Iterator for IterScheduleIter {
    type Item = usize;
    fn next(&mut self) -> Option<usize> {
        match self {
            IterScheduleIter::Static(range) => range.next(),
            IterScheduleIter::Dynamic(cur_i, max_i) => {
                let ci = cur_i.fetch_add(1, Ordering::Relaxed);
                if ci < *max_i {
                    Some(ci)
                } else {
                    None
                }
            }
            IterScheduleIter::Chunk(iter, ranges, range_i) => loop {
                if let Some(i) = iter.next() {
                    return Some(i);
                }
                let ri = range_i.fetch_add(1, Ordering::Relaxed);
                if ri < ranges.len() {
                    *iter = ranges[ri].0..ranges[ri].1;
                } else {
                    return None;
                }
            },
            IterScheduleIter::WorkStealing(range, siblings) => {
                if let Some(i) = range.next() {
                    return Some(i);
                }
                let mut workers = (0..siblings.len()).collect::<Vec<usize>>();
                workers.shuffle(&mut thread_rng());
                for worker in workers {
                    if let Some((start, end)) = siblings[worker].steal() {
                        range.set_range(start, end);
                        return range.next();
                    }
                }
                None
            }
        }
    }
}

/// Even split of `num_elems` into at most `num_workers` contiguous ranges.
fn even_ranges(num_elems: usize, num_workers: usize) -> Vec<(usize, usize)> {
    let elems_per_thread = 1.0f64.max(num_elems as f64 / num_workers as f64);
    let mut ranges = Vec::new();
    let mut worker = 0;
    while ((worker as f64 * elems_per_thread).round() as usize) < num_elems {
        let start_i = (worker as f64 * elems_per_thread).round() as usize;
        let end_i = ((worker + 1) as f64 * elems_per_thread).round() as usize;
        ranges.push((start_i, end_i.min(num_elems)));
        worker += 1;
    }
    ranges
}

fn guided_ranges(num_elems_orig: usize, num_workers: usize) -> Vec<(usize, usize)> {
    let mut num_elems = num_elems_orig as f64;
    let mut elems_per_thread = num_elems / num_workers as f64;
    let mut ranges = Vec::new();
    let mut cur_i = 0;
    let mut i;
    while elems_per_thread > 100.0 && cur_i < num_elems_orig {
        num_elems /= 1.61; //golden ratio
        let start_i = cur_i;
        let end_i = std::cmp::min(cur_i + num_elems.round() as usize, num_elems_orig);
        i = 0;
        while cur_i < end_i {
            ranges.push((
                start_i + (i as f64 * elems_per_thread).round() as usize,
                (start_i + ((i + 1) as f64 * elems_per_thread).round() as usize)
                    .min(num_elems_orig),
            ));
            i += 1;
            cur_i = start_i + (i as f64 * elems_per_thread).round() as usize;
        }
        elems_per_thread = num_elems / num_workers as f64;
    }
    if elems_per_thread < 1.0 {
        elems_per_thread = 1.0;
    }
    i = 0;
    let start_i = cur_i;
    while cur_i < num_elems_orig {
        ranges.push((
            start_i + (i as f64 * elems_per_thread).round() as usize,
            (start_i + ((i + 1) as f64 * elems_per_thread).round() as usize).min(num_elems_orig),
        ));
        i += 1;
        cur_i = start_i + (i as f64 * elems_per_thread).round() as usize;
    }
    ranges
}

/// Build one [IterSchedule] per worker task for a partition of `num_elems` indices.
pub(crate) fn plan(
    schedule: Schedule,
    num_elems: usize,
    num_workers: usize,
) -> Result<Vec<IterSchedule>, ConfigError> {
    if let Schedule::Chunk(0) = schedule {
        return Err(ConfigError::InvalidChunkSize(0));
    }
    let num_workers = num_workers.max(1);
    if num_elems == 0 {
        return Ok(Vec::new());
    }
    let scheds = match schedule {
        Schedule::Static => even_ranges(num_elems, num_workers)
            .into_iter()
            .map(|(start, end)| IterSchedule::Static(start, end))
            .collect(),
        Schedule::Dynamic => {
            let cur_i = Arc::new(AtomicUsize::new(0));
            (0..std::cmp::min(num_workers, num_elems))
                .map(|_| IterSchedule::Dynamic(cur_i.clone(), num_elems))
                .collect()
        }
        Schedule::Chunk(chunk_size) => {
            let ranges: Vec<(usize, usize)> = (0..num_elems)
                .step_by(chunk_size)
                .map(|start| (start, (start + chunk_size).min(num_elems)))
                .collect();
            shared_chunks(ranges, num_workers)
        }
        Schedule::Guided => shared_chunks(guided_ranges(num_elems, num_workers), num_workers),
        Schedule::WorkStealing => {
            let siblings: Vec<IterWorkStealer> = even_ranges(num_elems, num_workers)
                .into_iter()
                .map(|(start, end)| IterWorkStealer::new(start, end))
                .collect();
            siblings
                .iter()
                .map(|sibling| IterSchedule::WorkStealing(sibling.clone(), siblings.clone()))
                .collect()
        }
    };
    Ok(scheds)
}

fn shared_chunks(ranges: Vec<(usize, usize)>, num_workers: usize) -> Vec<IterSchedule> {
    let num_tasks = std::cmp::min(num_workers, ranges.len());
    let ranges = Arc::new(ranges);
    let range_i = Arc::new(AtomicUsize::new(0));
    (0..num_tasks)
        .map(|_| IterSchedule::Chunk(ranges.clone(), range_i.clone()))
        .collect()
}
