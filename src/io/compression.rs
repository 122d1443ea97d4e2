//! Transparent gzip decoding.
//!
//! Sources are sniffed for the gzip magic bytes rather than trusting the file
//! extension: the trip archives are served as `.csv.gz`, but mirrors sometimes
//! hand out plain CSV under the same name (and the other way around).

use std::io::{self, BufReader, Cursor, Read};

use flate2::read::MultiGzDecoder;

use crate::config::READ_BUFFER_SIZE;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether `data` starts with the gzip magic bytes
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Wrap `reader` in a gzip decoder if its first bytes are the gzip magic
///
/// The sniffed bytes are chained back in front of the stream, so nothing is
/// lost whichever way the check goes. Must be called from a blocking context
/// when `reader` bridges into the async runtime.
pub fn maybe_decompress<R>(mut reader: R) -> io::Result<Box<dyn Read + Send>>
where
    R: Read + Send + 'static,
{
    let mut magic = [0u8; 2];
    let mut filled = 0;
    while filled < magic.len() {
        match reader.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    let prefix = Cursor::new(magic[..filled].to_vec());
    let stream = BufReader::with_capacity(READ_BUFFER_SIZE, prefix.chain(reader));

    if is_gzip(&magic[..filled]) {
        tracing::debug!("gzip magic detected, decompressing source");
        // Multi-member aware: concatenated gzip archives decode as one stream
        Ok(Box::new(BufReader::with_capacity(
            READ_BUFFER_SIZE,
            MultiGzDecoder::new(stream),
        )))
    } else {
        Ok(Box::new(stream))
    }
}
