//! ASCII hex payload codec used inside `AT@SOCKWRITE` / `AT@SOCKREAD`.
//!
//! Encoding always emits two uppercase digits per byte. Decoding is
//! deliberately forgiving because the modem occasionally hands back odd-length
//! or overlong strings: it converts whole digit pairs until the output is full,
//! the input runs out, or a pair is not valid hex, and reports how many bytes
//! it produced. It never panics.

use heapless::String;

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Append the hex encoding of `bytes` to `out`.
///
/// Fails with `BufferOverflow` without touching `out` if it cannot hold the
/// whole encoding.
pub fn encode_into<const N: usize>(bytes: &[u8], out: &mut String<N>) -> Result<(), super::Error> {
    if out.len() + bytes.len() * 2 > N {
        return Err(super::Error::BufferOverflow);
    }
    for &b in bytes {
        // capacity checked above
        let _ = out.push(DIGITS[(b >> 4) as usize] as char);
        let _ = out.push(DIGITS[(b & 0x0F) as usize] as char);
    }
    Ok(())
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode `hex` into `out`, returning the number of bytes written.
///
/// A trailing odd digit is dropped; decoding stops at the first pair that is
/// not hex and at the end of `out`.
pub fn decode(hex: &str, out: &mut [u8]) -> usize {
    let mut n = 0;
    for (pair, slot) in hex.as_bytes().chunks_exact(2).zip(out.iter_mut()) {
        match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => {
                *slot = (hi << 4) | lo;
                n += 1;
            }
            _ => break,
        }
    }
    n
}
