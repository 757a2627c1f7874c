//! Compress and pack file content into the wire record.
//!
//! Record: msgpack map with two keys, written in this order:
//! `path` = base64 of the relative index bytes, `content` = zlib (level 6) of the raw bytes,
//! carried as a msgpack str-family value holding the raw compressed bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use rmp::Marker;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{CollectError, CollectResult};
use crate::utils::config::COMPRESSION_LEVEL;

const PATH_KEY: &str = "path";
const CONTENT_KEY: &str = "content";

fn encode_err(e: impl std::fmt::Debug) -> CollectError {
    CollectError::Encode(format!("{e:?}"))
}

/// zlib-compress `raw` at the fixed level.
pub fn compress(raw: &[u8]) -> CollectResult<Vec<u8>> {
    let mut z = ZlibEncoder::new(
        Vec::with_capacity(raw.len() / 2 + 16),
        Compression::new(COMPRESSION_LEVEL),
    );
    z.write_all(raw).map_err(encode_err)?;
    z.finish().map_err(encode_err)
}

/// Build the packed record for `relative_index` and `raw` file bytes. Nothing is returned on error.
pub fn encode(relative_index: &Path, raw: &[u8]) -> CollectResult<Vec<u8>> {
    let compressed = compress(raw)?;
    let b64path = STANDARD.encode(relative_index.as_os_str().as_encoded_bytes());
    let content_len = u32::try_from(compressed.len())
        .map_err(|_| CollectError::Encode("compressed content exceeds 4 GiB".to_string()))?;

    let mut buf = Vec::with_capacity(compressed.len() + b64path.len() + 24);
    rmp::encode::write_map_len(&mut buf, 2).map_err(encode_err)?;
    rmp::encode::write_str(&mut buf, PATH_KEY).map_err(encode_err)?;
    rmp::encode::write_str(&mut buf, &b64path).map_err(encode_err)?;
    rmp::encode::write_str(&mut buf, CONTENT_KEY).map_err(encode_err)?;
    rmp::encode::write_str_len(&mut buf, content_len).map_err(encode_err)?;
    buf.extend_from_slice(&compressed);
    Ok(buf)
}

/// A record unpacked by [`decode_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Relative index bytes (base64-decoded).
    pub path: Vec<u8>,
    /// Raw file bytes (inflated).
    pub content: Vec<u8>,
}

impl DecodedRecord {
    pub fn path_lossy(&self) -> String {
        String::from_utf8_lossy(&self.path).into_owned()
    }
}

fn take<'a>(rd: &mut &'a [u8], n: usize) -> CollectResult<&'a [u8]> {
    if rd.len() < n {
        return Err(CollectError::Encode(format!(
            "truncated record: need {} bytes, have {}",
            n,
            rd.len()
        )));
    }
    let (head, tail) = rd.split_at(n);
    *rd = tail;
    Ok(head)
}

fn read_len(rd: &mut &[u8], width: usize) -> CollectResult<usize> {
    let b = take(rd, width)?;
    Ok(b.iter().fold(0usize, |acc, &x| (acc << 8) | x as usize))
}

/// Read one str or bin value as raw bytes.
fn read_raw<'a>(rd: &mut &'a [u8]) -> CollectResult<&'a [u8]> {
    let marker = rmp::decode::read_marker(rd).map_err(encode_err)?;
    let len = match marker {
        Marker::FixStr(n) => n as usize,
        Marker::Str8 | Marker::Bin8 => read_len(rd, 1)?,
        Marker::Str16 | Marker::Bin16 => read_len(rd, 2)?,
        Marker::Str32 | Marker::Bin32 => read_len(rd, 4)?,
        other => {
            return Err(CollectError::Encode(format!(
                "expected str or bin, found {other:?}"
            )));
        }
    };
    take(rd, len)
}

/// Consumer side of the wire format: unpack, base64-decode `path`, inflate `content`.
pub fn decode_record(record: &[u8]) -> CollectResult<DecodedRecord> {
    let mut rd = record;
    let n = rmp::decode::read_map_len(&mut rd).map_err(encode_err)?;
    let mut path = None;
    let mut content = None;
    for _ in 0..n {
        let key = read_raw(&mut rd)?;
        let value = read_raw(&mut rd)?;
        match key {
            b"path" => path = Some(value),
            b"content" => content = Some(value),
            _ => {}
        }
    }
    let path = path.ok_or_else(|| CollectError::Encode("record has no path".to_string()))?;
    let content =
        content.ok_or_else(|| CollectError::Encode("record has no content".to_string()))?;

    let path = STANDARD.decode(path).map_err(encode_err)?;
    let mut raw = Vec::new();
    ZlibDecoder::new(content)
        .read_to_end(&mut raw)
        .map_err(encode_err)?;
    Ok(DecodedRecord { path, content: raw })
}
