use bencher::{Bencher, benchmark_group, benchmark_main, black_box};

use spillbuf::*;
use std::io::{BufRead, BufReader};

// deterministic stand-in for a words file: short lowercase lines
fn words(len: usize) -> Vec<u8> {
	let mut out = Vec::with_capacity(len);
	let mut state = 0x2545f4914f6cdd1du64;
	while out.len() < len {
		state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
		let wlen = 3 + (state >> 59) as usize % 10;
		for i in 0..wlen {
			out.push(b'a' + ((state >> (i * 5)) & 0x1f) as u8 % 26);
		}
		out.push(b'\n');
	}
	out.truncate(len);
	out
}

// walk the stream delimiter to delimiter, discarding as we go
fn drain_by_search(buf: &mut IoBuffer<ReadSource<&[u8]>>, pattern: &[u8], flags: SearchFlags) {
	loop {
		match buf.search(pattern, flags).unwrap() {
			SearchOutcome::Match { at, len } => {
				black_box(buf.readable().unwrap());
				buf.mark_consumed(at + len);
			}
			SearchOutcome::Partial { at } => {
				// candidate cut short by end of data; step over it
				buf.mark_consumed(at.max(1));
			}
			SearchOutcome::NoMatch { scanned } => {
				if scanned == 0 {
					break;
				}
				buf.mark_consumed(scanned);
			}
		}
	}
}

fn engine_lines(b: &mut Bencher, cap: usize) {
	let words = words(256 * 1024);
	b.iter(|| {
		let mut buf = IoBufferBuilder::new()
			.capacity(cap)
			.endpoint(ReadSource(&words[..]))
			.create();
		drain_by_search(&mut buf, b"", SearchFlags::ANY_TERMINATOR);
	})
}
fn engine_lines_256(b: &mut Bencher) { engine_lines(b, 256) }
fn engine_lines_4k(b: &mut Bencher)  { engine_lines(b, 4096) }
fn engine_lines_64k(b: &mut Bencher) { engine_lines(b, 64*1024) }

// a pattern rare enough that most windows scan clean through
fn engine_pattern_4k(b: &mut Bencher) {
	let mut words = words(256 * 1024);
	let at = words.len() / 2;
	words[at..at + 4].copy_from_slice(b"qqzz");
	b.iter(|| {
		let mut buf = IoBufferBuilder::new()
			.capacity(4096)
			.endpoint(ReadSource(&words[..]))
			.create();
		drain_by_search(&mut buf, b"qqzz", SearchFlags::NONE);
	})
}

fn std_read_until(b: &mut Bencher, cap: usize) {
	let words = words(256 * 1024);
	b.iter(|| {
		let mut r = BufReader::with_capacity(cap, &words[..]);
		let mut line = vec![];
		while r.read_until(b'\n', &mut line).unwrap() != 0 {
			black_box(line.as_slice());
			line.clear();
		}
	})
}
fn std_read_until_256(b: &mut Bencher) { std_read_until(b, 256) }
fn std_read_until_4k(b: &mut Bencher)  { std_read_until(b, 4096) }
fn std_read_until_64k(b: &mut Bencher) { std_read_until(b, 64*1024) }

benchmark_group!(benches,
	engine_lines_256,
	engine_lines_4k,
	engine_lines_64k,
	engine_pattern_4k,
	std_read_until_256,
	std_read_until_4k,
	std_read_until_64k,
);
benchmark_main!(benches);
