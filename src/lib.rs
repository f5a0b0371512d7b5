/*!
Fixed-capacity circular byte buffer that decouples a producer from a
consumer through pull/push endpoints, with an optional file-backed
variant that spills to disk when the in-memory window is not enough.

The engine does bounded work and returns: "no more data" and "no more
room" are short counts, never errors, so callers driving a polling
transport simply re-invoke the operation later.

```
use spillbuf::IoBufferBuilder;

let mut buf = IoBufferBuilder::new().capacity(256).create();
let n = buf.write(b"hello").unwrap();
assert_eq!(n, 5);

let mut out = [0u8; 5];
buf.read(&mut out).unwrap();
assert_eq!(&out, b"hello");
```
*/

use quick_error::quick_error;

use std::io;
use std::io::{Read, Write};

mod ring;
mod search;
mod file;

pub use ring::{Occupancy, DEFAULT_CAPACITY, MIN_CAPACITY};
pub use search::{scan, SearchFlags, SearchOutcome};
pub use file::{FileBuf, Mode};

use ring::RingBuf;

quick_error! {
	#[derive(Debug)]
	pub enum Error {
		Io(err: io::Error) {
			from()
			display("i/o: {}", err)
			cause(err)
		}
		/// A drain finished with bytes the sink would not take.
		Stalled(pending: usize) {
			display("sink refused {} buffered bytes", pending)
		}
		/// Write against a file buffer that already switched to reading.
		ReadOnly {
			display("file buffer is in read mode")
		}
		/// Resize target too small for the bytes currently buffered.
		WontFit(used: usize, capacity: usize) {
			display("{} buffered bytes will not fit a capacity of {}", used, capacity)
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/**
Producer half of an endpoint: the engine pulls bytes in through this
when a consumer wants more than is currently buffered.

Filling less than the slice holds means "no more right now" and stops
the current fill pass; it is not an error and the engine will ask again
on a later operation.
*/
pub trait Source {
	fn pull(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/**
Consumer half of an endpoint: the engine pushes buffered bytes out
through this when a producer wants more room than is currently free.

Accepting fewer bytes than offered is backpressure, not an error; the
engine keeps the rest buffered.
*/
pub trait Sink {
	fn push(&mut self, data: &[u8]) -> io::Result<usize>;

	/// True once pushed bytes can be pulled back out of the endpoint
	/// (e.g. they reached a file). The engine drops the buffer's
	/// precious pin at that point: the data has a safety net now.
	fn is_durable(&self) -> bool {
		false
	}
}

/// Inert endpoint: pulls nothing, accepts nothing. The default for
/// memory-only buffers.
pub struct NoIo;

impl Source for NoIo {
	fn pull(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
		Ok(0)
	}
}

impl Sink for NoIo {
	fn push(&mut self, _data: &[u8]) -> io::Result<usize> {
		Ok(0)
	}
}

/// Pull-only endpoint over any [`Read`](std::io::Read).
pub struct ReadSource<R>(pub R);

impl<R: Read> Source for ReadSource<R> {
	fn pull(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.0.read(buf)
	}
}

/// Push-only endpoint over any [`Write`](std::io::Write).
pub struct WriteSink<W>(pub W);

impl<W: Write> Sink for WriteSink<W> {
	fn push(&mut self, data: &[u8]) -> io::Result<usize> {
		self.0.write(data)
	}
}

/// Both halves at once, for [`IoBuffer::run`].
pub struct Duplex<R, W> {
	pub source: R,
	pub sink: W,
}

impl<R: Source, W> Source for Duplex<R, W> {
	fn pull(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.source.pull(buf)
	}
}

impl<R, W: Sink> Sink for Duplex<R, W> {
	fn push(&mut self, data: &[u8]) -> io::Result<usize> {
		self.sink.push(data)
	}

	fn is_durable(&self) -> bool {
		self.sink.is_durable()
	}
}

pub struct IoBufferBuilder<E = NoIo> {
	endpoint: E,
	capacity: usize,
	precious: bool,
}

impl IoBufferBuilder<NoIo> {
	pub fn new() -> Self {
		IoBufferBuilder {
			endpoint: NoIo,
			capacity: 0,
			precious: false,
		}
	}
}

impl Default for IoBufferBuilder<NoIo> {
	fn default() -> Self {
		IoBufferBuilder::new()
	}
}

impl<E> IoBufferBuilder<E> {
	/// Requested capacity; 0 picks [`DEFAULT_CAPACITY`], anything below
	/// [`MIN_CAPACITY`] is raised to it. One byte of the capacity is the
	/// terminator slot.
	pub fn capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity;
		self
	}

	/// Start with the precious pin set: buffered data survives until
	/// explicitly released, at the cost of refusing writes once full.
	pub fn precious(mut self) -> Self {
		self.precious = true;
		self
	}

	/// Attach an endpoint for the buffer to pull from / push to.
	pub fn endpoint<F>(self, endpoint: F) -> IoBufferBuilder<F> {
		IoBufferBuilder {
			endpoint,
			capacity: self.capacity,
			precious: self.precious,
		}
	}

	pub fn create(self) -> IoBuffer<E> {
		let mut ring = RingBuf::new(self.capacity);
		ring.set_precious(self.precious);
		IoBuffer {
			ring,
			endpoint: self.endpoint,
		}
	}
}

/**
The buffering engine: a circular byte window over an endpoint.

Writes land in the window; when it runs out of room the endpoint's
[`Sink`] is asked to take some bytes off. Reads come from the window;
when it runs dry the endpoint's [`Source`] is asked for more. Either
side answering short simply ends the pass.
*/
pub struct IoBuffer<E = NoIo> {
	ring: RingBuf,
	endpoint: E,
}

impl IoBuffer<NoIo> {
	/// Memory-only buffer with no endpoint.
	pub fn new(capacity: usize) -> IoBuffer<NoIo> {
		IoBufferBuilder::new().capacity(capacity).create()
	}
}

impl<E> IoBuffer<E> {
	/// Total storage, terminator slot included; the payload limit is one
	/// byte less.
	pub fn capacity(&self) -> usize {
		self.ring.capacity()
	}

	/// Bytes buffered and not yet consumed, both runs of a wrapped
	/// window included.
	pub fn len(&self) -> usize {
		self.ring.used_total()
	}

	pub fn is_empty(&self) -> bool {
		self.ring.used_total() == 0
	}

	pub fn occupancy(&self) -> Occupancy {
		self.ring.occupancy()
	}

	pub fn precious(&self) -> bool {
		self.ring.precious()
	}

	/// Pin or release the buffered data. While pinned, nothing is
	/// overwritten or rewound implicitly; writes are refused instead.
	pub fn set_precious(&mut self, on: bool) {
		self.ring.set_precious(on);
	}

	/// How many times a mark call asked for more than its run held and
	/// got clamped. Always 0 unless something drives the engine outside
	/// its contract.
	pub fn overruns(&self) -> u32 {
		self.ring.overruns()
	}

	/// Logically empty the buffer: zero storage, rewind cursors.
	pub fn reset(&mut self) {
		self.ring.reset();
	}

	/// Account for `n` bytes written into [`writable`](#method.writable),
	/// clamped to the run. Returns the accepted count.
	pub fn mark_appended(&mut self, n: usize) -> usize {
		self.ring.mark_appended(n)
	}

	/// Discard `n` consumed bytes from the front of the readable run,
	/// clamped to it. Returns the accepted count.
	pub fn mark_consumed(&mut self, n: usize) -> usize {
		self.ring.mark_consumed(n)
	}

	/// Merge a wrapped window into one contiguous run; true if fragments
	/// were combined. No-op while precious.
	pub fn defrag(&mut self) -> bool {
		self.ring.defrag()
	}

	/// Shift a non-wrapped run down to the start to regain tail space;
	/// true if anything moved. No-op while precious.
	pub fn increase_free(&mut self) -> bool {
		self.ring.increase_free()
	}

	/// Move the buffered bytes into a fresh window of `capacity`,
	/// keeping the precious flag. Bytes already consumed are not carried
	/// over even when pinned.
	pub fn resize(&mut self, capacity: usize) -> Result<()> {
		let mut fresh = RingBuf::new(capacity);
		let pending = self.ring.used_total();
		if pending > fresh.capacity() - 1 {
			return Err(Error::WontFit(pending, fresh.capacity()));
		}
		while let Some((at, len)) = self.ring.used_run() {
			let w = fresh.write_offset();
			fresh.slice_mut(w, len).copy_from_slice(self.ring.slice(at, len));
			fresh.mark_appended(len);
			self.ring.mark_consumed(len);
		}
		fresh.set_precious(self.ring.precious());
		self.ring = fresh;
		Ok(())
	}

	pub fn endpoint(&self) -> &E {
		&self.endpoint
	}

	pub fn endpoint_mut(&mut self) -> &mut E {
		&mut self.endpoint
	}

	pub fn into_endpoint(self) -> E {
		self.endpoint
	}

	pub(crate) fn ring(&self) -> &RingBuf {
		&self.ring
	}

	pub(crate) fn ring_mut(&mut self) -> &mut RingBuf {
		&mut self.ring
	}
}

impl<E: Source> IoBuffer<E> {
	/// Pull from the endpoint until the window is full or the endpoint
	/// answers short. Returns the total number of bytes now buffered,
	/// both runs of a wrapped window included; that can exceed the
	/// contiguous run [`readable`](#method.readable) hands out.
	pub fn fill(&mut self) -> Result<usize> {
		while let Some((at, len)) = self.ring.free_run() {
			let n = self.endpoint.pull(self.ring.slice_mut(at, len))?;
			self.ring.mark_appended(n);
			if n < len {
				break;
			}
		}
		Ok(self.ring.used_total())
	}

	/// The contiguous readable run, pulling from the endpoint first if
	/// nothing is buffered. Empty slice means "nothing right now".
	pub fn readable(&mut self) -> Result<&[u8]> {
		if self.ring.used_run().is_none() {
			self.fill()?;
		}
		Ok(match self.ring.used_run() {
			Some((at, len)) => self.ring.slice(at, len),
			None => &[],
		})
	}

	/// Copy up to `out.len()` buffered bytes out, pulling from the
	/// endpoint as needed. Short count means no more data was available.
	pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
		let mut done = 0;
		while done < out.len() {
			let run = match self.ring.used_run() {
				Some(run) => Some(run),
				None => {
					self.fill()?;
					self.ring.used_run()
				}
			};
			let (at, len) = match run {
				Some(run) => run,
				None => break,
			};
			let n = (out.len() - done).min(len);
			out[done..done + n].copy_from_slice(self.ring.slice(at, n));
			self.ring.mark_consumed(n);
			done += n;
		}
		Ok(done)
	}

	/**
	Search the buffered data for `pattern` under `flags`, working to get
	a decidable window: scan the readable run; on a miss, defragment a
	wrapped window and rescan; still nothing, pull more data in and
	rescan (defragmenting once more if the pull wrapped the window).

	Offsets in the outcome are relative to the read cursor. A
	[`Partial`](SearchOutcome::Partial) means the data ended inside a
	candidate; callers wanting certainty re-invoke once the endpoint has
	more to pull.
	*/
	pub fn search(&mut self, pattern: &[u8], flags: SearchFlags) -> Result<SearchOutcome> {
		if self.ring.used_run().is_none() {
			self.fill()?;
		}
		let before = self.ring.used_run_len();
		let mut out = search::scan(self.ring.used_run_mut(), pattern, flags);
		if out.is_match() {
			return Ok(out);
		}
		if self.ring.defrag() {
			out = search::scan(self.ring.used_run_mut(), pattern, flags);
			if out.is_match() {
				return Ok(out);
			}
		}
		self.fill()?;
		if self.ring.used_run_len() > before {
			out = search::scan(self.ring.used_run_mut(), pattern, flags);
			if out.is_match() {
				return Ok(out);
			}
			if self.ring.defrag() {
				out = search::scan(self.ring.used_run_mut(), pattern, flags);
			}
		}
		Ok(out)
	}
}

impl<E: Sink> IoBuffer<E> {
	/// Push buffered bytes at the endpoint until it answers short,
	/// defragmenting once per pass to offer the largest possible run.
	/// Returns the bytes still pending (backpressure, not an error).
	pub fn flush(&mut self) -> Result<usize> {
		while let Some((at, len)) = self.ring.used_run() {
			let mut accepted = self.push_run(at, len)?;
			let mut offered = len;
			if accepted < len {
				self.ring.mark_consumed(accepted);
				self.ring.defrag();
				match self.ring.used_run() {
					Some((at, len)) => {
						offered = len;
						accepted = self.push_run(at, len)?;
					}
					None => break,
				}
			}
			self.ring.mark_consumed(accepted);
			if accepted < offered {
				break;
			}
		}
		Ok(self.ring.used_total())
	}

	fn push_run(&mut self, at: usize, len: usize) -> Result<usize> {
		let n = self.endpoint.push(self.ring.slice(at, len))?;
		if self.endpoint.is_durable() {
			// the data has a safety net now, the pin can go
			self.ring.set_precious(false);
		}
		Ok(n)
	}

	/// The contiguous writable run, pushing at the endpoint first if the
	/// window is out of room. Empty slice means the endpoint would not
	/// make room either.
	pub fn writable(&mut self) -> Result<&mut [u8]> {
		if self.ring.free_run().is_none() {
			self.flush()?;
		}
		Ok(match self.ring.free_run() {
			Some((at, len)) => self.ring.slice_mut(at, len),
			None => &mut [],
		})
	}

	/// Copy `data` into the window, pushing at the endpoint whenever the
	/// window is out of room. Short count means the endpoint could not
	/// take more off.
	pub fn write(&mut self, data: &[u8]) -> Result<usize> {
		let mut done = 0;
		while done < data.len() {
			let run = match self.ring.free_run() {
				Some(run) => Some(run),
				None => {
					self.flush()?;
					self.ring.free_run()
				}
			};
			let (at, len) = match run {
				Some(run) => run,
				None => break,
			};
			let n = (data.len() - done).min(len);
			self.ring.slice_mut(at, n).copy_from_slice(&data[done..done + n]);
			self.ring.mark_appended(n);
			done += n;
		}
		Ok(done)
	}
}

impl<E: Source + Sink> IoBuffer<E> {
	/// Drain source-to-sink through the window until the source runs dry,
	/// then flush what is left. A sink that stops taking bytes ends the
	/// copy with [`Error::Stalled`].
	pub fn run(&mut self) -> Result<u64> {
		let mut total = 0u64;
		loop {
			self.fill()?;
			let used = self.ring.used_total();
			if used == 0 {
				break;
			}
			let left = self.flush()?;
			total += (used - left) as u64;
			if left == used {
				// no progress: the sink is wedged
				break;
			}
		}
		let pending = self.flush()?;
		if pending != 0 {
			return Err(Error::Stalled(pending));
		}
		Ok(total)
	}
}
