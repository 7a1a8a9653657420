//! Chunked word-granularity memory extraction.
//!
//! Bytes are rebuilt from individually peeked native words in little-endian
//! order. A failed peek ends the read early with whatever was collected;
//! the hard per-read ceiling protects against pathological region sizes.

use crate::trace::{PeekError, TraceApi, TraceSession};

/// Hard ceiling on a single region read. Oversized requests are truncated.
pub const MAX_REGION_BYTES: usize = 10 * 1024 * 1024;
/// Window size the orchestrator splits large regions into.
pub const CHUNK_BYTES: usize = 1024 * 1024;
/// Native word size, the granularity of the tracing primitive.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Reads region bytes through an attached [`TraceSession`].
///
/// Stateless beyond the session it borrows; the session must be attached or
/// every read returns `None`.
pub struct RegionReader<'a, A: TraceApi> {
	session: &'a mut TraceSession<A>
}
impl<'a, A: TraceApi> RegionReader<'a, A> {
	pub fn new(session: &'a mut TraceSession<A>) -> Self {
		RegionReader { session }
	}

	/// Reads the bytes of `[start, end)`, truncated to
	/// [`MAX_REGION_BYTES`].
	///
	/// Returns `None` for empty ranges, an unattached session, or a read
	/// that collected zero bytes.
	pub fn read_region(&mut self, start: usize, end: usize) -> Option<Vec<u8>> {
		if end <= start {
			return None;
		}

		let mut size = end - start;
		if size > MAX_REGION_BYTES {
			log::warn!(
				"large memory region requested ({} bytes), limiting to {} bytes",
				size,
				MAX_REGION_BYTES
			);
			size = MAX_REGION_BYTES;
		}

		self.read_bytes(start, size)
	}

	/// Reads `size` bytes starting at `addr` word by word.
	///
	/// A failed word read terminates collection early; partially collected
	/// bytes are still returned. The final word is truncated to the exact
	/// requested length.
	pub fn read_bytes(&mut self, addr: usize, size: usize) -> Option<Vec<u8>> {
		if !self.session.is_attached() {
			log::debug!("read of {:#x} requested without an attached process", addr);
			return None;
		}

		let words_to_read = (size + WORD_SIZE - 1) / WORD_SIZE;
		let mut data = Vec::with_capacity(words_to_read * WORD_SIZE);

		for i in 0..words_to_read {
			let curr_addr = addr + i * WORD_SIZE;

			let word = match self.session.peek_word(curr_addr) {
				Ok(word) => word,
				Err(PeekError::NotAttached) => return None,
				Err(err) => {
					log::debug!("{}, stopping read early", err);
					break;
				}
			};

			data.extend_from_slice(&word.to_le_bytes());
		}

		if data.is_empty() {
			return None;
		}

		data.truncate(size);
		Some(data)
	}
}
