//! Picking the file that gets restored.
//!
//! The two phases (draw a bounded sample, then drop ineligible entries) are kept
//! separate so each can be measured on its own. Drawing first is fast on
//! huge listings but can leave nothing to pick in directory-heavy trees.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::SamplePolicy;

pub const DEFAULT_SAMPLE_SIZE: usize = 20;

/// Paths from `restic ls` output; header and blank lines are skipped.
/// Only the line terminator is removed, spaces belong to the name.
pub fn parse_listing(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .filter(|line| line.starts_with('/'))
        .map(PathBuf::from)
        .collect()
}

/// Up to `size` distinct entries, chosen uniformly.
pub fn draw_sample<R: Rng + ?Sized>(entries: &[PathBuf], size: usize, rng: &mut R) -> Vec<PathBuf> {
    entries
        .choose_multiple(rng, size.min(entries.len()))
        .cloned()
        .collect()
}

/// Drops every entry for which `skip` holds.
pub fn filter_files<F>(entries: Vec<PathBuf>, skip: F) -> Vec<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    entries.into_iter().filter(|path| !skip(path)).collect()
}

pub fn pick<R: Rng + ?Sized>(candidates: &[PathBuf], rng: &mut R) -> Option<PathBuf> {
    candidates.choose(rng).cloned()
}

pub fn choose_file<R, F>(
    entries: &[PathBuf],
    policy: SamplePolicy,
    size: usize,
    rng: &mut R,
    skip: F,
) -> Option<PathBuf>
where
    R: Rng + ?Sized,
    F: Fn(&Path) -> bool,
{
    let candidates = match policy {
        SamplePolicy::SampleThenFilter => filter_files(draw_sample(entries, size, rng), skip),
        SamplePolicy::FilterThenSample => {
            let files = filter_files(entries.to_vec(), skip);
            draw_sample(&files, size, rng)
        }
    };
    pick(&candidates, rng)
}
