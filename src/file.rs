/*!
File-backed buffer: an [`IoBuffer`] whose endpoint is a file on disk,
turning the in-memory window into a cache over content of any size.

The buffer starts pinned ([precious](crate::IoBuffer::set_precious)),
so as long as everything fits in memory the file is never touched and a
[`rewind`](FileBuf::rewind) is free. The first flush — forced by
running out of room, by the write→read transition, or by
[`close`](FileBuf::close) — creates the file lazily and drops the pin:
from then on the window recycles itself and reads page data back in
from disk.

A `FileBuf` is written first and read second. Any read-side call flips
it to [`Mode::Read`] for good, flushing pending bytes first so the
backing store agrees with what was written; writing after that is
refused with [`Error::ReadOnly`].
*/

use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::{Error, IoBuffer, IoBufferBuilder, Result, SearchFlags, SearchOutcome, Sink, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	Write,
	Read,
}

/// The file endpoint: lazily opened handle plus the logical read/write
/// offsets into the file, tracked independently of the in-memory window.
pub struct FileStore {
	path: PathBuf,
	file: Option<File>,
	read_p: u64,
	write_p: u64,
}

impl FileStore {
	fn new(path: PathBuf) -> FileStore {
		FileStore {
			path,
			file: None,
			read_p: 0,
			write_p: 0,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl Sink for FileStore {
	fn push(&mut self, data: &[u8]) -> io::Result<usize> {
		match self.file.as_mut() {
			Some(file) => {
				file.seek(SeekFrom::Start(self.write_p))?;
			}
			None => {
				let file = OpenOptions::new()
					.read(true)
					.write(true)
					.create(true)
					.truncate(true)
					.open(&self.path)?;
				self.file = Some(file);
			}
		}
		let file = match self.file.as_mut() {
			Some(file) => file,
			None => return Ok(0),
		};
		let n = file.write(data)?;
		self.write_p = file.seek(SeekFrom::Current(0))?;
		Ok(n)
	}

	fn is_durable(&self) -> bool {
		self.file.is_some()
	}
}

impl Source for FileStore {
	fn pull(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		match self.file.as_mut() {
			Some(file) => {
				file.seek(SeekFrom::Start(self.read_p))?;
			}
			None => {
				// never flushed and never opened: nothing on disk yet
				// is simply the end of the data, not an error
				match OpenOptions::new().read(true).write(true).open(&self.path) {
					Ok(mut file) => {
						self.write_p = file.seek(SeekFrom::End(0))?;
						file.seek(SeekFrom::Start(0))?;
						self.read_p = 0;
						self.file = Some(file);
					}
					Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
					Err(e) => return Err(e),
				}
			}
		}
		let file = match self.file.as_mut() {
			Some(file) => file,
			None => return Ok(0),
		};
		let n = file.read(buf)?;
		self.read_p += n as u64;
		Ok(n)
	}
}

/**
A buffered, rewindable byte stream staged in memory and spilled to a
backing file only when (and if) it outgrows the window.

```no_run
use spillbuf::FileBuf;

let mut staged = FileBuf::create("/tmp/payload.tmp", 4096).unwrap();
staged.write(b"possibly much more than 4k of this").unwrap();

// read side: implies a flush of anything still pending
let mut head = [0u8; 8];
staged.read(&mut head).unwrap();
staged.rewind().unwrap();

// discard the spill file along with the buffer
staged.close(false).unwrap();
```
*/
pub struct FileBuf {
	io: IoBuffer<FileStore>,
	mode: Mode,
}

impl FileBuf {
	/// Buffer backed by a fresh file at `path`; anything already there
	/// is discarded. The file itself is not created until first flush.
	pub fn create<P: Into<PathBuf>>(path: P, capacity: usize) -> Result<FileBuf> {
		let path = path.into();
		match std::fs::remove_file(&path) {
			Ok(()) => {}
			Err(ref e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => return Err(e.into()),
		}
		Ok(FileBuf::assemble(FileStore::new(path), capacity))
	}

	/// Buffer over whatever `path` already holds (nothing, if the file
	/// does not exist yet); writes will append after the existing
	/// content.
	pub fn open<P: Into<PathBuf>>(path: P, capacity: usize) -> Result<FileBuf> {
		let path = path.into();
		let mut store = FileStore::new(path);
		match OpenOptions::new().read(true).write(true).open(&store.path) {
			Ok(mut file) => {
				store.write_p = file.seek(SeekFrom::End(0)).map_err(Error::Io)?;
				store.file = Some(file);
			}
			Err(ref e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => return Err(e.into()),
		}
		let mut fb = FileBuf::assemble(store, capacity);
		// content already on disk can be paged back in at will, so the
		// window need not hold on to it; a pinned window would wedge a
		// pure-read path once it filled
		if fb.io.endpoint().is_durable() {
			fb.io.set_precious(false);
		}
		Ok(fb)
	}

	fn assemble(store: FileStore, capacity: usize) -> FileBuf {
		FileBuf {
			// pinned until the first flush proves the file has the data
			io: IoBufferBuilder::new()
				.capacity(capacity)
				.precious()
				.endpoint(store)
				.create(),
			mode: Mode::Write,
		}
	}

	pub fn mode(&self) -> Mode {
		self.mode
	}

	pub fn path(&self) -> &Path {
		self.io.endpoint().path()
	}

	/// Write-to-read transition: once a file handle exists, everything
	/// still buffered is flushed first so read-side queries see it.
	fn to_read(&mut self) -> Result<()> {
		if self.mode == Mode::Write && self.io.endpoint().file.is_some() {
			self.io.flush()?;
		}
		self.mode = Mode::Read;
		Ok(())
	}

	/// Append `data`. Only legal before the first read-side call;
	/// a buffer that switched to reading answers [`Error::ReadOnly`]
	/// (the write-after-read transition is deliberately not provided).
	pub fn write(&mut self, data: &[u8]) -> Result<usize> {
		if self.mode != Mode::Write {
			return Err(Error::ReadOnly);
		}
		self.io.write(data)
	}

	pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
		self.to_read()?;
		self.io.read(out)
	}

	/// The contiguous unconsumed run, paging more in from the file if
	/// the window is empty. Follow up with [`mark_seen`](#method.mark_seen).
	pub fn peek(&mut self) -> Result<&[u8]> {
		self.to_read()?;
		self.io.readable()
	}

	/// Discard `n` peeked bytes.
	pub fn mark_seen(&mut self, n: usize) -> Result<usize> {
		self.to_read()?;
		Ok(self.io.mark_consumed(n))
	}

	pub fn search(&mut self, pattern: &[u8], flags: SearchFlags) -> Result<SearchOutcome> {
		self.to_read()?;
		self.io.search(pattern, flags)
	}

	/// Back to the beginning of the stream. Purely a cursor move while
	/// the content never left memory; otherwise the window is re-paged
	/// from the start of the file.
	pub fn rewind(&mut self) -> Result<()> {
		self.to_read()?;
		if self.io.endpoint().file.is_some() {
			{
				let store = self.io.endpoint_mut();
				let file = match store.file.as_mut() {
					Some(file) => file,
					None => return Ok(()),
				};
				file.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
				store.read_p = 0;
			}
			self.io.ring_mut().reset();
			self.io.fill()?;
		} else {
			self.io.ring_mut().rewind_read();
		}
		Ok(())
	}

	/// Total bytes ever written to the stream: the file length once one
	/// exists, the in-memory extent before that.
	pub fn size(&mut self) -> Result<u64> {
		self.to_read()?;
		if self.io.endpoint().file.is_some() {
			Ok(self.io.endpoint().write_p)
		} else {
			Ok(self.io.ring().write_offset() as u64)
		}
	}

	/// Logical read position within the stream (bytes consumed so far),
	/// regardless of how far ahead the window has paged.
	pub fn position(&mut self) -> Result<u64> {
		self.to_read()?;
		if self.io.endpoint().file.is_some() {
			Ok(self.io.endpoint().read_p - self.io.len() as u64)
		} else {
			Ok(self.io.ring().read_offset() as u64)
		}
	}

	/// Jump the read position; the window is re-paged from there when
	/// file-backed, clamped to the written extent otherwise.
	pub fn set_position(&mut self, position: u64) -> Result<()> {
		self.to_read()?;
		if self.io.endpoint().file.is_some() {
			self.io.endpoint_mut().read_p = position;
			self.io.ring_mut().reset();
			self.io.fill()?;
		} else {
			self.io.ring_mut().set_read_offset(position as usize);
		}
		Ok(())
	}

	/// Tear down. With `keep`, pending bytes are flushed first and the
	/// backing file survives; without it the file is deleted (whether or
	/// not anything ever spilled).
	pub fn close(mut self, keep: bool) -> Result<()> {
		if keep {
			self.io.flush()?;
		}
		let store = self.io.into_endpoint();
		drop(store.file);
		if !keep {
			match std::fs::remove_file(&store.path) {
				Ok(()) => {}
				Err(ref e) if e.kind() == io::ErrorKind::NotFound => {}
				Err(e) => return Err(e.into()),
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::MIN_CAPACITY;

	fn tmp(name: &str) -> PathBuf {
		let mut path = std::env::temp_dir();
		path.push(format!("spillbuf-{}-{}", std::process::id(), name));
		path
	}

	fn pattern_bytes(n: usize) -> Vec<u8> {
		(0..n).map(|v| (v % 251) as u8).collect()
	}

	#[test]
	fn spill_round_trip() {
		let data = pattern_bytes(1000);
		let mut fb = FileBuf::create(tmp("spill"), MIN_CAPACITY).unwrap();
		// way past the window: most of this has to hit the disk
		assert_eq!(fb.write(&data).unwrap(), data.len());
		fb.rewind().unwrap();
		let mut out = vec![0; data.len()];
		assert_eq!(fb.read(&mut out).unwrap(), data.len());
		assert_eq!(out, data);
		// nothing further
		assert_eq!(fb.read(&mut [0u8; 8]).unwrap(), 0);
		fb.close(false).unwrap();
	}

	#[test]
	fn memory_only_round_trip() {
		let data = pattern_bytes(100);
		let path = tmp("memonly");
		let mut fb = FileBuf::create(&path, MIN_CAPACITY).unwrap();
		assert_eq!(fb.write(&data).unwrap(), data.len());

		let mut out = vec![0; data.len()];
		assert_eq!(fb.read(&mut out).unwrap(), data.len());
		assert_eq!(out, data);

		// the pin kept the bytes: rewinding re-reads them with no file
		fb.rewind().unwrap();
		assert!(!path.exists());
		let mut again = vec![0; data.len()];
		assert_eq!(fb.read(&mut again).unwrap(), data.len());
		assert_eq!(again, data);
		fb.close(false).unwrap();
	}

	#[test]
	fn read_side_calls_force_the_flush() {
		let path = tmp("transition");
		let mut fb = FileBuf::create(&path, MIN_CAPACITY).unwrap();
		let data = pattern_bytes(500); // forces a spill mid-write
		fb.write(&data).unwrap();
		// no explicit flush: the size query transitions and flushes
		assert_eq!(fb.size().unwrap(), 500);
		assert_eq!(std::fs::metadata(&path).unwrap().len(), 500);
		fb.close(false).unwrap();
		assert!(!path.exists());
	}

	#[test]
	fn write_after_read_is_refused() {
		let mut fb = FileBuf::create(tmp("readonly"), MIN_CAPACITY).unwrap();
		fb.write(b"first").unwrap();
		fb.peek().unwrap();
		match fb.write(b"second") {
			Err(Error::ReadOnly) => {}
			other => panic!("expected ReadOnly, got {:?}", other),
		}
		fb.close(false).unwrap();
	}

	#[test]
	fn position_tracks_consumption() {
		let data = pattern_bytes(700);
		let mut fb = FileBuf::create(tmp("position"), MIN_CAPACITY).unwrap();
		fb.write(&data).unwrap();
		assert_eq!(fb.position().unwrap(), 0);

		let mut out = vec![0; 300];
		fb.read(&mut out).unwrap();
		assert_eq!(&out[..], &data[..300]);
		assert_eq!(fb.position().unwrap(), 300);

		fb.set_position(100).unwrap();
		assert_eq!(fb.position().unwrap(), 100);
		let mut out = vec![0; 200];
		fb.read(&mut out).unwrap();
		assert_eq!(&out[..], &data[100..300]);
		fb.close(false).unwrap();
	}

	#[test]
	fn in_memory_position() {
		let mut fb = FileBuf::create(tmp("mem-position"), MIN_CAPACITY).unwrap();
		fb.write(b"0123456789").unwrap();
		assert_eq!(fb.size().unwrap(), 10);
		assert_eq!(fb.position().unwrap(), 0);
		fb.set_position(4).unwrap();
		let mut out = [0u8; 6];
		assert_eq!(fb.read(&mut out).unwrap(), 6);
		assert_eq!(&out, b"456789");
		assert_eq!(fb.position().unwrap(), 10);
		// clamped to the written extent
		fb.set_position(99).unwrap();
		assert_eq!(fb.read(&mut [0u8; 4]).unwrap(), 0);
		fb.close(false).unwrap();
	}

	#[test]
	fn search_spans_the_spill() {
		let mut fb = FileBuf::create(tmp("search"), MIN_CAPACITY).unwrap();
		// delimiter sits past the first window-full of data
		let mut data = vec![b'x'; 300];
		data.extend_from_slice(b"\r\ntail");
		fb.write(&data).unwrap();
		fb.rewind().unwrap();

		// a single pass only decides within the window; the caller
		// discards scanned bytes and retries until the match pages in
		loop {
			match fb.search(b"", SearchFlags::ANY_TERMINATOR).unwrap() {
				SearchOutcome::Match { at, len } => {
					assert_eq!(fb.position().unwrap() as usize + at, 300);
					assert_eq!(len, 2);
					break;
				}
				SearchOutcome::NoMatch { scanned } => {
					assert!(scanned > 0);
					fb.mark_seen(scanned).unwrap();
				}
				SearchOutcome::Partial { at } => {
					fb.mark_seen(at).unwrap();
				}
			}
		}
		fb.close(false).unwrap();
	}

	#[test]
	fn close_keep_persists_unflushed_bytes() {
		let path = tmp("keep");
		let data = pattern_bytes(90);
		{
			let mut fb = FileBuf::create(&path, MIN_CAPACITY).unwrap();
			fb.write(&data).unwrap();
			// in memory only so far; close(keep) must create the file
			fb.close(true).unwrap();
		}
		assert_eq!(std::fs::read(&path).unwrap(), data);

		// a fresh buffer over the kept file picks the content up
		let mut fb = FileBuf::open(&path, MIN_CAPACITY).unwrap();
		assert_eq!(fb.size().unwrap(), 90);
		let mut out = vec![0; 90];
		assert_eq!(fb.read(&mut out).unwrap(), 90);
		assert_eq!(out, data);
		fb.close(false).unwrap();
		assert!(!path.exists());
	}

	#[test]
	fn open_reads_past_the_first_window() {
		let path = tmp("reopen-large");
		let data = pattern_bytes(300);
		std::fs::write(&path, &data).unwrap();
		// several window-fulls on disk, nothing written through us:
		// the window must recycle itself as the reader advances
		let mut fb = FileBuf::open(&path, MIN_CAPACITY).unwrap();
		let mut out = vec![0; data.len()];
		assert_eq!(fb.read(&mut out).unwrap(), data.len());
		assert_eq!(out, data);
		fb.rewind().unwrap();
		let mut again = vec![0; data.len()];
		assert_eq!(fb.read(&mut again).unwrap(), data.len());
		assert_eq!(again, data);
		fb.close(false).unwrap();
	}

	#[test]
	fn open_appends_after_existing_content() {
		let path = tmp("append");
		std::fs::write(&path, b"prefix-").unwrap();
		let mut fb = FileBuf::open(&path, MIN_CAPACITY).unwrap();
		fb.write(b"suffix").unwrap();
		assert_eq!(fb.size().unwrap(), 13);
		fb.rewind().unwrap();
		let mut out = vec![0; 13];
		assert_eq!(fb.read(&mut out).unwrap(), 13);
		assert_eq!(&out[..], b"prefix-suffix");
		fb.close(false).unwrap();
	}

	#[test]
	fn missing_file_reads_as_empty() {
		let path = tmp("missing");
		let mut fb = FileBuf::open(&path, MIN_CAPACITY).unwrap();
		assert_eq!(fb.size().unwrap(), 0);
		assert_eq!(fb.read(&mut [0u8; 16]).unwrap(), 0);
		fb.close(false).unwrap();
	}
}
