//! Human-readable size parsing (`200M`, `10K`, `1G`, `512B`).

use anyhow::{Context, Result, bail};

/// Parse a human size into bytes. A bare number is bytes; suffixes are binary (K = 1024).
pub fn parse_human_size(size: &str) -> Result<u64> {
    let size = size.trim();
    let Some(last) = size.chars().last() else {
        bail!("empty size");
    };
    let (digits, weight): (&str, u64) = match last.to_ascii_uppercase() {
        'B' => (&size[..size.len() - 1], 1),
        'K' => (&size[..size.len() - 1], 1 << 10),
        'M' => (&size[..size.len() - 1], 1 << 20),
        'G' => (&size[..size.len() - 1], 1 << 30),
        c if c.is_ascii_digit() => (size, 1),
        c => bail!("unknown size unit '{}' in {:?}", c, size),
    };
    let n: u64 = digits
        .trim()
        .parse()
        .with_context(|| format!("parse size {:?}", size))?;
    n.checked_mul(weight)
        .with_context(|| format!("size {:?} overflows", size))
}
