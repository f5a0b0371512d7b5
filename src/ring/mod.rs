/*!
The ring itself: owned storage, the cursor pair, the precious pin,
and the defragmenter.

Storage is `capacity` bytes; the last byte is the terminator slot and
the payload area is `[0, capacity - 1)`. A zero byte always follows the
written region (diagnostic convenience, never a data boundary), so the
ring holds at most `capacity - 1` bytes of payload.

Cursor arithmetic is delegated to [`region`]; this module only applies
the plans it returns.
*/

// https://github.com/rust-lang/rust/issues/54236
use copy_in_place::copy_in_place;

pub(crate) mod region;
pub use region::Occupancy;

/// Capacity handed out when the caller asks for 0 ("whatever's reasonable").
pub const DEFAULT_CAPACITY: usize = 3 * 1024;
/// Smallest capacity ever allocated; smaller requests are raised to this.
pub const MIN_CAPACITY: usize = 128;

pub(crate) struct RingBuf {
	buf: Vec<u8>,
	r: usize,
	w: usize,
	precious: bool,
	overruns: u32,
}

impl RingBuf {
	pub(crate) fn new(requested: usize) -> RingBuf {
		let cap = if requested == 0 {
			DEFAULT_CAPACITY
		} else if requested < MIN_CAPACITY {
			MIN_CAPACITY
		} else {
			requested
		};
		RingBuf {
			buf: vec![0; cap],
			r: 0,
			w: 0,
			precious: false,
			overruns: 0,
		}
	}

	/// Index of the terminator slot, one past the last payload byte.
	fn end(&self) -> usize {
		self.buf.len() - 1
	}

	pub(crate) fn capacity(&self) -> usize {
		self.buf.len()
	}

	pub(crate) fn precious(&self) -> bool {
		self.precious
	}

	pub(crate) fn set_precious(&mut self, on: bool) {
		self.precious = on;
	}

	pub(crate) fn overruns(&self) -> u32 {
		self.overruns
	}

	pub(crate) fn read_offset(&self) -> usize {
		self.r
	}

	pub(crate) fn write_offset(&self) -> usize {
		self.w
	}

	pub(crate) fn used_total(&self) -> usize {
		region::used_total(self.r, self.w, self.end())
	}

	pub(crate) fn occupancy(&self) -> Occupancy {
		region::occupancy(self.r, self.w, self.end(), self.precious)
	}

	/// Zero the storage and rewind both cursors.
	pub(crate) fn reset(&mut self) {
		for b in self.buf.iter_mut() {
			*b = 0;
		}
		self.r = 0;
		self.w = 0;
	}

	/// Park the read cursor back at the start without touching the data.
	/// Only meaningful while the written region is contiguous from 0,
	/// which is the invariant a precious ring maintains.
	pub(crate) fn rewind_read(&mut self) {
		self.r = 0;
	}

	/// Reposition the read cursor, clamped to the written region.
	pub(crate) fn set_read_offset(&mut self, at: usize) {
		self.r = at.min(self.w);
	}

	pub(crate) fn slice(&self, at: usize, len: usize) -> &[u8] {
		&self.buf[at..at + len]
	}

	pub(crate) fn slice_mut(&mut self, at: usize, len: usize) -> &mut [u8] {
		&mut self.buf[at..at + len]
	}

	/// Contiguous writable run, normalizing cursors as a side effect
	/// (rewind when drained, wrap when the tail is exhausted).
	pub(crate) fn free_run(&mut self) -> Option<(usize, usize)> {
		debug_assert_eq!(self.buf[self.end()], 0);
		match region::plan_free(self.r, self.w, self.end(), self.precious) {
			region::FreePlan::Reset => {
				self.r = 0;
				self.w = 0;
				self.buf[0] = 0;
				Some((0, self.end()))
			}
			region::FreePlan::Wrap { len } => {
				// the region below `r` was consumed long ago; safe to reuse
				self.w = 0;
				self.buf[0] = 0;
				if len == 0 { None } else { Some((0, len)) }
			}
			region::FreePlan::Run { at, len } => {
				if len == 0 { None } else { Some((at, len)) }
			}
			region::FreePlan::Full | region::FreePlan::Pinned => None,
		}
	}

	/// Contiguous readable run, normalizing cursors as a side effect.
	pub(crate) fn used_run(&mut self) -> Option<(usize, usize)> {
		match region::plan_used(self.r, self.w, self.end(), self.precious) {
			region::UsedPlan::Empty { rewind } => {
				if rewind {
					self.r = 0;
					self.w = 0;
					self.buf[0] = 0;
				}
				None
			}
			region::UsedPlan::Wrap { len } => {
				self.r = 0;
				if len == 0 { None } else { Some((0, len)) }
			}
			region::UsedPlan::Run { at, len } => Some((at, len)),
		}
	}

	pub(crate) fn used_run_len(&mut self) -> usize {
		self.used_run().map_or(0, |(_, len)| len)
	}

	/// The readable run as a mutable slice (the matcher may rewrite NULs
	/// in place).
	pub(crate) fn used_run_mut(&mut self) -> &mut [u8] {
		match self.used_run() {
			Some((at, len)) => &mut self.buf[at..at + len],
			None => &mut [],
		}
	}

	/// Advance the write cursor over `n` just-written bytes and re-arm the
	/// terminator. Asking for more than the current run holds is a caller
	/// bug: fatal in debug builds, clamped (and counted) otherwise.
	pub(crate) fn mark_appended(&mut self, n: usize) -> usize {
		debug_assert_eq!(self.buf[self.end()], 0);
		let max = region::max_append(self.r, self.w, self.end());
		let n = if n > max {
			debug_assert!(false, "mark_appended past the writable run: {} > {}", n, max);
			self.overruns += 1;
			max
		} else {
			n
		};
		self.w += n;
		self.buf[self.w] = 0;
		n
	}

	/// Advance the read cursor over `n` consumed bytes; when that drains a
	/// non-precious ring, park both cursors back at the start.
	pub(crate) fn mark_consumed(&mut self, n: usize) -> usize {
		debug_assert_eq!(self.buf[self.end()], 0);
		let max = region::max_consume(self.r, self.w, self.end());
		let n = if n > max {
			debug_assert!(false, "mark_consumed past the readable run: {} > {}", n, max);
			self.overruns += 1;
			max
		} else {
			n
		};
		self.r += n;
		if !self.precious && self.r == self.w {
			self.r = 0;
			self.w = 0;
			self.buf[0] = 0;
		}
		n
	}

	/// Merge a wrapped ring into one contiguous run from the start.
	/// Returns true only when fragments were actually combined, i.e. a
	/// rescan of the readable run could now see more. A non-wrapped ring
	/// whose tail is exhausted is shifted down instead (same effect as
	/// [`increase_free`](#method.increase_free)).
	pub(crate) fn defrag(&mut self) -> bool {
		if self.precious {
			// pinned layout must survive until release
			return false;
		}
		if self.w < self.r {
			return self.merge_wrapped();
		}
		if self.r != 0 && self.w == self.end() {
			self.shift_down();
		}
		false
	}

	/// Shift a non-wrapped run down to the start so the tail regains free
	/// space. Returns true if the ring changed.
	pub(crate) fn increase_free(&mut self) -> bool {
		if self.precious || self.w < self.r || self.r == 0 {
			return false;
		}
		self.shift_down();
		true
	}

	fn shift_down(&mut self) {
		let (r, w) = (self.r, self.w);
		if w > r {
			copy_in_place(&mut self.buf, r..w, 0);
		}
		self.r = 0;
		self.w = w - r;
		self.buf[self.w] = 0;
	}

	fn merge_wrapped(&mut self) -> bool {
		let head = self.w; // wrapped bytes sitting at the start
		let mut scratch = Vec::new();
		if scratch.try_reserve_exact(head).is_err() {
			// callers tolerate a still-fragmented ring
			return false;
		}
		scratch.extend_from_slice(&self.buf[..head]);
		let tail = self.end() - self.r;
		let r = self.r;
		let end = self.end();
		copy_in_place(&mut self.buf, r..end, 0);
		self.buf[tail..tail + head].copy_from_slice(&scratch);
		self.r = 0;
		self.w = tail + head;
		self.buf[self.w] = 0;
		true
	}
}
