// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Walkers over recursive size columns. A size column interleaves its
//! counts depth-first (outer count, then each inner count); these
//! walkers consume that encoding to count leaves, to build the outer
//! product of several jagged shapes, and to repeat lower-rank data
//! into a higher-rank shape.
//!
//! The replay rule is what makes the outer product work: per level,
//! one cursor per *distinct* column. Iterating a level restores the
//! cursors of deeper, different columns to their position at the start
//! of the iteration (the replay), while a column met again deeper down
//! keeps its cursor and simply continues its own depth-first walk.

use femtocode_type::{Result, internal_error};

/// Reads one entry at a time from a recursive size column of known
/// depth, yielding the entry's total leaf count.
pub struct EntryWalker<'a> {
	sizes: &'a [i64],
	depth: usize,
	pos: usize,
}

impl<'a> EntryWalker<'a> {
	pub fn new(sizes: &'a [i64], depth: usize) -> Self {
		Self {
			sizes,
			depth,
			pos: 0,
		}
	}

	pub fn exhausted(&self) -> bool {
		self.pos >= self.sizes.len()
	}

	/// Consume one entry; `None` when the column is exhausted.
	pub fn next_entry(&mut self) -> Result<Option<u64>> {
		if self.exhausted() {
			return Ok(None);
		}
		let leaves = self.level(1)?;
		Ok(Some(leaves))
	}

	fn level(&mut self, level: usize) -> Result<u64> {
		let n = *self
			.sizes
			.get(self.pos)
			.ok_or_else(|| internal_error!("size column exhausted mid-entry"))?;
		self.pos += 1;
		if n < 0 {
			return Err(internal_error!("negative count {} in size column", n));
		}
		if level == self.depth {
			return Ok(n as u64);
		}
		let mut total = 0u64;
		for _ in 0..n {
			total += self.level(level + 1)?;
		}
		Ok(total)
	}
}

/// Total leaves across every entry of a recursive size column.
pub fn total_leaves(sizes: &[i64], depth: usize) -> Result<usize> {
	let mut walker = EntryWalker::new(sizes, depth);
	let mut total = 0usize;
	while let Some(leaves) = walker.next_entry()? {
		total += leaves as usize;
	}
	Ok(total)
}

/// The outer product of several jagged levels: each level draws its
/// counts from one column (columns may appear at several levels; those
/// occurrences share one cursor and walk the recursive encoding in
/// order).
pub struct SizeProduct<'a> {
	/// Distinct size columns.
	pub arrays: Vec<&'a [i64]>,
	/// level → index into `arrays`.
	pub levels: Vec<usize>,
}

impl SizeProduct<'_> {
	/// The combined recursive size column over all entries.
	pub fn combine(&self) -> Result<Vec<i64>> {
		let mut out = Vec::new();
		let mut pos = vec![0usize; self.arrays.len()];
		while pos[self.levels[0]] < self.arrays[self.levels[0]].len() {
			self.descend(0, &mut pos, &mut |n, _| out.push(n))?;
		}
		for (index, array) in self.arrays.iter().enumerate() {
			if pos[index] != array.len() {
				return Err(internal_error!(
					"size column {} not fully consumed ({} of {})",
					index,
					pos[index],
					array.len()
				));
			}
		}
		Ok(out)
	}

	/// Walk one entry, reporting every `(count, level)` read.
	fn descend(&self, level: usize, pos: &mut [usize], emit: &mut impl FnMut(i64, usize)) -> Result<()> {
		let column = self.levels[level];
		let n = *self.arrays[column]
			.get(pos[column])
			.ok_or_else(|| internal_error!("size column exhausted in outer product"))?;
		pos[column] += 1;
		emit(n, level);
		if level + 1 == self.levels.len() {
			return Ok(());
		}

		// deeper columns other than this level's replay per iteration
		let mut deeper: Vec<usize> = self.levels[level + 1..]
			.iter()
			.copied()
			.filter(|&c| c != column)
			.collect();
		deeper.sort_unstable();
		deeper.dedup();
		let snapshot: Vec<(usize, usize)> = deeper.iter().map(|&c| (c, pos[c])).collect();

		for k in 0..n {
			if k > 0 {
				for &(c, p) in &snapshot {
					pos[c] = p;
				}
			}
			self.descend(level + 1, pos, emit)?;
		}
		Ok(())
	}
}

/// Repeat a jagged column into a higher-rank shape. The source's size
/// column occupies one or more of the target levels; one source value
/// is consumed per iteration of its deepest level, held across any
/// deeper (foreign) levels, and replayed whenever the source's size
/// cursor replays.
pub struct DataExplode<'a> {
	pub arrays: Vec<&'a [i64]>,
	pub levels: Vec<usize>,
	/// Index into `arrays` of the source's size column.
	pub source: usize,
}

impl DataExplode<'_> {
	fn deepest_source_level(&self) -> Result<usize> {
		self.levels
			.iter()
			.rposition(|&c| c == self.source)
			.ok_or_else(|| internal_error!("source size column is not a target level"))
	}

	pub fn combine<T: Copy>(&self, data: &[T], out: &mut Vec<T>) -> Result<()> {
		let deepest = self.deepest_source_level()?;
		let mut pos = vec![0usize; self.arrays.len()];
		let mut vpos = 0usize;
		let mut held: Option<T> = None;
		while pos[self.levels[0]] < self.arrays[self.levels[0]].len() {
			self.descend(0, deepest, data, &mut pos, &mut vpos, &mut held, out)?;
		}
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	fn descend<T: Copy>(
		&self,
		level: usize,
		deepest: usize,
		data: &[T],
		pos: &mut [usize],
		vpos: &mut usize,
		held: &mut Option<T>,
		out: &mut Vec<T>,
	) -> Result<()> {
		let column = self.levels[level];
		let n = *self.arrays[column]
			.get(pos[column])
			.ok_or_else(|| internal_error!("size column exhausted while exploding data"))?;
		pos[column] += 1;

		let last = level + 1 == self.levels.len();
		if last {
			for _ in 0..n {
				let value = if level == deepest {
					let value = *data
						.get(*vpos)
						.ok_or_else(|| internal_error!("data column exhausted while exploding"))?;
					*vpos += 1;
					value
				} else {
					held.ok_or_else(|| internal_error!("no held value while exploding"))?
				};
				out.push(value);
			}
			return Ok(());
		}

		let mut deeper: Vec<usize> = self.levels[level + 1..]
			.iter()
			.copied()
			.filter(|&c| c != column)
			.collect();
		deeper.sort_unstable();
		deeper.dedup();
		// replaying the source's sizes replays its data with it
		let snapshot: Vec<(usize, usize, Option<usize>)> = deeper
			.iter()
			.map(|&c| (c, pos[c], (c == self.source).then_some(*vpos)))
			.collect();

		for k in 0..n {
			if k > 0 {
				for &(c, p, v) in &snapshot {
					pos[c] = p;
					if let Some(v) = v {
						*vpos = v;
					}
				}
			}
			if level == deepest {
				// one source value per iteration of its deepest level
				let value = *data
					.get(*vpos)
					.ok_or_else(|| internal_error!("data column exhausted while exploding"))?;
				*vpos += 1;
				*held = Some(value);
			}
			self.descend(level + 1, deepest, data, pos, vpos, held, out)?;
		}
		Ok(())
	}
}
