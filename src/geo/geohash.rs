//! Geohash encoding, decoding, and cell adjacency.
//!
//! A geohash interleaves longitude and latitude bisection bits (longitude
//! first) and packs every 5 bits into one character of a base-32 alphabet.
//! Nearby points share prefixes, which is what makes the spatial index's
//! cell-based proximity search work. Precision 6 gives ~1.2 km cells, the
//! sweet spot for dispatch radii of a few kilometers.

pub const DEFAULT_PRECISION: usize = 6;
pub const MAX_PRECISION: usize = 12;

/// The geohash alphabet. `a`, `i`, `l`, and `o` are excluded.
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

/// Adjacency tables for the last character of a hash, keyed by direction and
/// by whether the hash length is even (last character starts on a longitude
/// bit) or odd. The character at position `i` of a row is replaced by
/// `BASE32[i]`'s neighbor row entry.
fn neighbor_row(direction: Direction, even: bool) -> &'static str {
    match (direction, even) {
        (Direction::North, true) => "p0r21436x8zb9dcf5h7kjnmqesgutwvy",
        (Direction::North, false) => "bc01fg45238967deuvhjyznpkmstqrwx",
        (Direction::South, true) => "14365h7k9dcfesgujnmqp0r2twvyx8zb",
        (Direction::South, false) => "238967debc01fg45kmstqrwxuvhjyznp",
        (Direction::East, true) => "bc01fg45238967deuvhjyznpkmstqrwx",
        (Direction::East, false) => "p0r21436x8zb9dcf5h7kjnmqesgutwvy",
        (Direction::West, true) => "238967debc01fg45kmstqrwxuvhjyznp",
        (Direction::West, false) => "14365h7k9dcfesgujnmqp0r2twvyx8zb",
    }
}

/// Characters on the cell's edge in a given direction, where the neighbor
/// lookup must first step the parent hash.
fn border_row(direction: Direction, even: bool) -> &'static str {
    match (direction, even) {
        (Direction::North, true) => "prxz",
        (Direction::North, false) => "bcfguvyz",
        (Direction::South, true) => "028b",
        (Direction::South, false) => "0145hjnp",
        (Direction::East, true) => "bcfguvyz",
        (Direction::East, false) => "prxz",
        (Direction::West, true) => "0145hjnp",
        (Direction::West, false) => "028b",
    }
}

fn base32_index(c: u8) -> Option<usize> {
    BASE32.iter().position(|&b| b == c)
}

/// Encodes a coordinate pair as a geohash of `precision` characters.
/// Precision 0 falls back to [`DEFAULT_PRECISION`]; anything above
/// [`MAX_PRECISION`] is clamped.
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    let precision = if precision == 0 {
        DEFAULT_PRECISION
    } else {
        precision.min(MAX_PRECISION)
    };

    let (mut min_lat, mut max_lat) = (-90.0_f64, 90.0_f64);
    let (mut min_lon, mut max_lon) = (-180.0_f64, 180.0_f64);

    let mut hash = String::with_capacity(precision);
    let mut even_bit = true;
    let mut bit = 0;
    let mut ch = 0usize;

    while hash.len() < precision {
        if even_bit {
            let mid = (min_lon + max_lon) / 2.0;
            if lon >= mid {
                ch |= 1 << (4 - bit);
                min_lon = mid;
            } else {
                max_lon = mid;
            }
        } else {
            let mid = (min_lat + max_lat) / 2.0;
            if lat >= mid {
                ch |= 1 << (4 - bit);
                min_lat = mid;
            } else {
                max_lat = mid;
            }
        }
        even_bit = !even_bit;
        bit += 1;
        if bit == 5 {
            hash.push(BASE32[ch] as char);
            bit = 0;
            ch = 0;
        }
    }

    hash
}

/// Decodes a geohash to the center point of its bounding box, replaying the
/// bisection bit stream. Characters outside the base-32 alphabet contribute
/// nothing and are skipped.
pub fn decode(hash: &str) -> (f64, f64) {
    let (mut min_lat, mut max_lat) = (-90.0_f64, 90.0_f64);
    let (mut min_lon, mut max_lon) = (-180.0_f64, 180.0_f64);
    let mut even_bit = true;

    for c in hash.bytes() {
        let Some(cd) = base32_index(c.to_ascii_lowercase()) else {
            continue;
        };
        for j in (0..5).rev() {
            let bit = (cd >> j) & 1;
            if even_bit {
                let mid = (min_lon + max_lon) / 2.0;
                if bit == 1 {
                    min_lon = mid;
                } else {
                    max_lon = mid;
                }
            } else {
                let mid = (min_lat + max_lat) / 2.0;
                if bit == 1 {
                    min_lat = mid;
                } else {
                    max_lat = mid;
                }
            }
            even_bit = !even_bit;
        }
    }

    ((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0)
}

/// Returns the equal-length cell adjacent to `hash` in `direction`.
///
/// When the last character sits on the cell's edge, the lookup recurses into
/// the parent hash. At the poles there is no parent row to step into: the
/// recursion stops and the lookup wraps within the top-level row, so a
/// northern neighbor of a polar cell stays at the pole. Crossing the
/// antimeridian wraps east-west as the top-level row does. The empty string
/// has no neighbors and maps to itself.
pub fn neighbor(hash: &str, direction: Direction) -> String {
    if hash.is_empty() {
        return String::new();
    }

    let hash = hash.to_ascii_lowercase();
    let last = hash.as_bytes()[hash.len() - 1] as char;
    let mut parent = hash[..hash.len() - 1].to_string();
    let even = hash.len() % 2 == 0;

    if border_row(direction, even).contains(last) && !parent.is_empty() {
        parent = neighbor(&parent, direction);
    }

    match neighbor_row(direction, even).find(last) {
        Some(idx) => {
            parent.push(BASE32[idx] as char);
            parent
        }
        None => hash,
    }
}

/// The 3x3 block of cells around `hash`, in the order
/// `[center, N, S, E, W, NE, NW, SE, SW]`. Callers should treat the order as
/// unspecified; it is fixed here only so results are deterministic.
pub fn all_neighbors(hash: &str) -> [String; 9] {
    let north = neighbor(hash, Direction::North);
    let south = neighbor(hash, Direction::South);
    [
        hash.to_string(),
        north.clone(),
        south.clone(),
        neighbor(hash, Direction::East),
        neighbor(hash, Direction::West),
        neighbor(&north, Direction::East),
        neighbor(&north, Direction::West),
        neighbor(&south, Direction::East),
        neighbor(&south, Direction::West),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_known_cities() {
        assert_eq!(encode(37.7749, -122.4194, 6), "9q8yyk");
        assert_eq!(encode(40.7128, -74.0060, 6), "dr5reg");
        assert_eq!(encode(51.5074, -0.1278, 6), "gcpvj0");
    }

    #[test]
    fn zero_precision_falls_back_to_default() {
        assert_eq!(encode(37.7749, -122.4194, 0), "9q8yyk");
    }

    #[test]
    fn oversized_precision_clamps_to_twelve() {
        let hash = encode(37.7749, -122.4194, 40);
        assert_eq!(hash.len(), 12);
        assert!(hash.starts_with("9q8yyk"));
    }

    #[test]
    fn decode_recovers_the_cell_center() {
        let (lat, lon) = decode("9q8yyk");
        assert!((lat - 37.7749).abs() < 0.01);
        assert!((lon - -122.4194).abs() < 0.01);

        let (lat, lon) = decode("dr5reg");
        assert!((lat - 40.7128).abs() < 0.01);
        assert!((lon - -74.0060).abs() < 0.01);
    }

    #[test]
    fn decode_skips_characters_outside_the_alphabet() {
        let (lat, lon) = decode("9q8yyk");
        let (lat2, lon2) = decode("9qa8yiylk");
        assert_eq!(lat, lat2);
        assert_eq!(lon, lon2);
    }

    #[test]
    fn round_trip_error_shrinks_with_precision() {
        let points = [
            (37.7749, -122.4194),
            (40.7128, -74.0060),
            (-33.8688, 151.2093),
            (35.6762, 139.6503),
        ];

        for (lat, lon) in points {
            let mut last_error = f64::INFINITY;
            for precision in 1..=12 {
                let (decoded_lat, decoded_lon) = decode(&encode(lat, lon, precision));
                let error = (decoded_lat - lat).abs().max((decoded_lon - lon).abs());
                assert!(
                    error <= last_error,
                    "error grew at precision {precision} for ({lat}, {lon})"
                );
                last_error = error;
            }

            let (decoded_lat, decoded_lon) = decode(&encode(lat, lon, 8));
            assert!((decoded_lat - lat).abs() < 0.001);
            assert!((decoded_lon - lon).abs() < 0.001);
        }
    }

    #[test]
    fn neighbors_invert_away_from_the_edges() {
        for hash in ["9q8yyk", "dr5reg", "gcpvj0", "9q8yy", "u4pruyd"] {
            assert_eq!(neighbor(&neighbor(hash, Direction::North), Direction::South), hash);
            assert_eq!(neighbor(&neighbor(hash, Direction::South), Direction::North), hash);
            assert_eq!(neighbor(&neighbor(hash, Direction::East), Direction::West), hash);
            assert_eq!(neighbor(&neighbor(hash, Direction::West), Direction::East), hash);
        }
    }

    #[test]
    fn north_neighbor_is_one_cell_row_up() {
        // At precision 6 a cell spans 15 latitude bits.
        let lat_step = 180.0 / (1u32 << 15) as f64;
        let hash = encode(37.7749, -122.4194, 6);
        let (lat, lon) = decode(&hash);
        assert_eq!(neighbor(&hash, Direction::North), encode(lat + lat_step, lon, 6));
        assert_eq!(neighbor(&hash, Direction::South), encode(lat - lat_step, lon, 6));
    }

    #[test]
    fn all_neighbors_forms_a_distinct_block_of_nine() {
        let cells = all_neighbors("9q8yyk");
        assert_eq!(cells.len(), 9);
        assert_eq!(cells[0], "9q8yyk");

        for cell in &cells {
            assert_eq!(cell.len(), 6);
        }

        let mut sorted: Vec<_> = cells.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 9, "interior cells have nine distinct neighbors");
    }

    #[test]
    fn empty_hash_has_no_neighbors() {
        assert_eq!(neighbor("", Direction::North), "");
    }
}
