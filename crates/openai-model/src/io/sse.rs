use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is surfaced. Comment lines (which some providers
/// send as keep-alives) and the other fields are skipped.
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain complete events already in the buffer first.
            while let Some(block) = self.take_block() {
                if let Some(data) = parse_block(&block)? {
                    return Ok(Some(data));
                }
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                // Incomplete trailing data is dropped.
                return Ok(None);
            };
            // Multi-byte characters may be split across chunks, so the
            // buffer holds raw bytes until a whole block is available.
            self.buf.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
        }
    }

    fn take_block(&mut self) -> Option<Vec<u8>> {
        let eol_idx = self.buf.windows(2).position(|w| w == b"\n\n")?;
        let block = self.buf[..eol_idx].to_vec();
        self.buf.drain(..eol_idx + 2);
        Some(block)
    }
}

// event         = *( comment / field ) end-of-line
// comment       = colon *any-char end-of-line
// field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
fn parse_block(block: &[u8]) -> Result<Option<String>, Error> {
    let Ok(block) = str::from_utf8(block) else {
        return Err(Error::InvalidPayload);
    };

    let mut data: Option<String> = None;
    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        // A field without a colon has an empty value.
        let (name, value) = line.split_once(':').unwrap_or((line, ""));
        if name != "data" {
            continue;
        }
        let value = value.strip_prefix(' ').unwrap_or(value);
        match &mut data {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }
    Ok(data)
}
