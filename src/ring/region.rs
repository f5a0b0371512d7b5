/*!
Pure accounting over the ring's cursor pair.

`r == w` alone cannot tell an empty ring from a full one; the plans
returned here resolve that at the type level, so the rest of the crate
never compares cursors directly. All functions take `(r, w, end)` with
`0 <= r, w <= end`, where `end` is the index of the terminator slot
(one past the last payload byte).
*/

/// What the writer side can do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FreePlan {
	/// Ring fully drained: rewind both cursors, whole payload area is writable.
	Reset,
	/// Contiguous writable run at `at`.
	Run { at: usize, len: usize },
	/// Write cursor wraps to the start; `len` excludes the byte reserved
	/// before `r` (so `r == w` never means "full").
	Wrap { len: usize },
	/// No writable byte left.
	Full,
	/// Precious data blocks the writer until it is released.
	Pinned,
}

/// What the reader side can do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UsedPlan {
	/// Nothing buffered; `rewind` directs the caller to park both cursors
	/// back at the start (never done while precious).
	Empty { rewind: bool },
	/// Contiguous readable run at `at`.
	Run { at: usize, len: usize },
	/// Read cursor wraps to the start where `len` bytes sit (possibly zero).
	Wrap { len: usize },
}

/// Coarse state of the ring, with the empty/full ambiguity resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
	Empty,
	Partial { len: usize },
	Full,
	/// Write cursor hit the end while the precious pin is set;
	/// `len` bytes are still unconsumed.
	Pinned { len: usize },
}

pub(crate) fn plan_free(r: usize, w: usize, end: usize, precious: bool) -> FreePlan {
	if w == end {
		if precious {
			FreePlan::Pinned
		} else if r == end {
			FreePlan::Reset
		} else if r > 0 {
			FreePlan::Wrap { len: r - 1 }
		} else {
			FreePlan::Full
		}
	} else if w < r {
		FreePlan::Run { at: w, len: r - w - 1 }
	} else if w == r && !precious {
		FreePlan::Reset
	} else {
		FreePlan::Run { at: w, len: end - w }
	}
}

pub(crate) fn plan_used(r: usize, w: usize, end: usize, precious: bool) -> UsedPlan {
	if r == w {
		UsedPlan::Empty { rewind: !precious }
	} else if r == end {
		if precious {
			UsedPlan::Empty { rewind: false }
		} else {
			UsedPlan::Wrap { len: w }
		}
	} else if r < w {
		UsedPlan::Run { at: r, len: w - r }
	} else {
		UsedPlan::Run { at: r, len: end - r }
	}
}

// Clamp maxima for the mark calls; same formulas the run plans use,
// minus any cursor normalization.

pub(crate) fn max_append(r: usize, w: usize, end: usize) -> usize {
	if w < r {
		r - w - 1
	} else {
		end - w
	}
}

pub(crate) fn max_consume(r: usize, w: usize, end: usize) -> usize {
	if r <= w {
		w - r
	} else {
		end - r
	}
}

pub(crate) fn used_total(r: usize, w: usize, end: usize) -> usize {
	if w >= r {
		w - r
	} else {
		(end - r) + w
	}
}

pub(crate) fn occupancy(r: usize, w: usize, end: usize, precious: bool) -> Occupancy {
	let used = used_total(r, w, end);
	if precious && w == end {
		Occupancy::Pinned { len: used }
	} else if used == 0 {
		Occupancy::Empty
	} else if (w == end && r == 0) || (w < r && r - w == 1) {
		Occupancy::Full
	} else {
		Occupancy::Partial { len: used }
	}
}
