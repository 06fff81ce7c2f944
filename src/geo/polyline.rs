//! Google encoded-polyline codec.
//!
//! Format: each coordinate is stored as a delta from the previous vertex,
//! scaled by 1e5, zig-zag folded and split into 5-bit chunks. Every chunk is
//! offset by 63 so the result is printable ASCII; bit `0x20` marks that more
//! chunks follow. Coordinates alternate latitude, longitude.

use super::LatLng;

/// Coordinate scale of the format (five decimal places).
const FACTOR: f64 = 1e5;

/// ASCII offset added to every chunk.
const CHUNK_OFFSET: u8 = 63;

/// Continuation bit of a chunk.
const CONTINUATION: i64 = 0x20;

/// Payload bits of a chunk.
const CHUNK_MASK: i64 = 0x1f;

/// Seven chunks carry 35 bits; anything needing an eighth is rejected early.
const MAX_SHIFT: u32 = 35;

/// Widest folded value a coordinate delta may use.
const MAX_PAYLOAD: i64 = u32::MAX as i64;

/// Errors raised for malformed polyline input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("polyline truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("invalid polyline byte 0x{byte:02x} at {offset}")]
    InvalidByte { offset: usize, byte: u8 },

    #[error("polyline value starting before byte {offset} overflows")]
    Overflow { offset: usize },
}

/// Decode an encoded polyline into its vertices.
///
/// An empty string decodes to an empty path. A stream that ends inside a
/// value, or after a latitude without its longitude, is rejected.
pub fn decode(encoded: &str) -> Result<Vec<LatLng>, DecodeError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut offset = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while offset < bytes.len() {
        lat += next_value(bytes, &mut offset)?;
        lng += next_value(bytes, &mut offset)?;

        points.push(LatLng::new(lat as f64 / FACTOR, lng as f64 / FACTOR));
    }

    Ok(points)
}

/// Encode vertices as a polyline, rounding each coordinate to 1e-5 degrees.
pub fn encode(points: &[LatLng]) -> String {
    let mut out = String::with_capacity(points.len() * 8);
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for point in points {
        let lat = (point.latitude * FACTOR).round() as i64;
        let lng = (point.longitude * FACTOR).round() as i64;

        push_value(lat - prev_lat, &mut out);
        push_value(lng - prev_lng, &mut out);

        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn next_value(bytes: &[u8], offset: &mut usize) -> Result<i64, DecodeError> {
    let start = *offset;
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some(&byte) = bytes.get(*offset) else {
            return Err(DecodeError::Truncated { offset: *offset });
        };
        if !(CHUNK_OFFSET..=126).contains(&byte) {
            return Err(DecodeError::InvalidByte {
                offset: *offset,
                byte,
            });
        }
        if shift >= MAX_SHIFT {
            return Err(DecodeError::Overflow { offset: start });
        }

        let chunk = i64::from(byte - CHUNK_OFFSET);
        *offset += 1;
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;

        if chunk < CONTINUATION {
            break;
        }
    }

    if result > MAX_PAYLOAD {
        return Err(DecodeError::Overflow { offset: start });
    }

    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

fn push_value(value: i64, out: &mut String) {
    let mut folded = if value < 0 { !(value << 1) } else { value << 1 };

    while folded >= CONTINUATION {
        let chunk = ((folded & CHUNK_MASK) | CONTINUATION) as u8;
        out.push(char::from(chunk + CHUNK_OFFSET));
        folded >>= 5;
    }
    out.push(char::from(folded as u8 + CHUNK_OFFSET));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// The worked example from the format documentation.
    const SAMPLE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    fn sample_points() -> Vec<LatLng> {
        vec![
            LatLng::new(38.5, -120.2),
            LatLng::new(40.7, -120.95),
            LatLng::new(43.252, -126.453),
        ]
    }

    fn assert_close(a: &[LatLng], b: &[LatLng], tolerance: f64) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!(
                (x.latitude - y.latitude).abs() <= tolerance,
                "{x:?} vs {y:?}"
            );
            assert!(
                (x.longitude - y.longitude).abs() <= tolerance,
                "{x:?} vs {y:?}"
            );
        }
    }

    #[test]
    fn test_decode_reference_sample() {
        let decoded = decode(SAMPLE).unwrap();
        assert_close(&decoded, &sample_points(), 1e-9);
    }

    #[test]
    fn test_encode_reference_sample() {
        assert_eq!(encode(&sample_points()), SAMPLE);
    }

    #[test]
    fn test_empty() {
        assert!(decode("").unwrap().is_empty());
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn test_truncated_inside_value() {
        // drop the final byte of the last longitude
        let cut = &SAMPLE[..SAMPLE.len() - 1];
        assert!(matches!(decode(cut), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_truncated_missing_longitude() {
        // "_p~iF" is a complete latitude with nothing after it
        assert_eq!(
            decode("_p~iF"),
            Err(DecodeError::Truncated { offset: 5 })
        );
    }

    #[test]
    fn test_invalid_byte() {
        assert_eq!(
            decode("_p~iF ps|U"),
            Err(DecodeError::InvalidByte {
                offset: 5,
                byte: b' '
            })
        );
    }

    #[test]
    fn test_overflow() {
        // eight continuation chunks never terminate within 35 bits
        let endless = "~".repeat(8);
        assert!(matches!(decode(&endless), Err(DecodeError::Overflow { .. })));
    }

    #[test]
    fn test_value_wider_than_32_bits() {
        // seven chunks, all payload bits set: 35 bits
        let wide = format!("{}^", "~".repeat(6));
        assert_eq!(
            decode(&format!("{wide}{wide}")),
            Err(DecodeError::Overflow { offset: 0 })
        );

        // 0xFFFF_FFFF folded still fits: six chunks of 31 and a final 3
        let widest = format!("{}B", "~".repeat(6));
        assert!(decode(&format!("{widest}?")).is_ok());
    }

    #[test]
    fn test_round_trip_random_paths() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..50 {
            let len = rng.random_range(1..40);
            let path: Vec<LatLng> = (0..len)
                .map(|_| {
                    LatLng::new(
                        rng.random_range(-90.0..=90.0),
                        rng.random_range(-180.0..=180.0),
                    )
                })
                .collect();

            let decoded = decode(&encode(&path)).unwrap();
            assert_close(&decoded, &path, 1e-5);
        }
    }

    #[test]
    fn test_re_encode_is_stable() {
        let once = decode(SAMPLE).unwrap();
        let twice = decode(&encode(&once)).unwrap();
        assert_close(&once, &twice, 1e-9);
    }
}
