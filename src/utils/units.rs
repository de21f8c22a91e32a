//! Size and offset unit handling
//!
//! Two flavours of size strings show up: the partition table reports
//! offsets the way parted prints them (`1049kB`, `538MB`, `2048s`), and the
//! desired layout declares sizes in whole binary units (`512MiB`, `128GiB`).

use once_cell::sync::Lazy;
use regex::Regex;

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;
pub const TIB: u64 = GIB * 1024;

/// Sector size assumed for `s`-suffixed offsets
pub const DEFAULT_SECTOR_SIZE: u64 = 512;

static FEED_SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z]*)\s*$").expect("valid regex")
});

static DESIRED_SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9]+)\s*([A-Za-z]*)\s*$").expect("valid regex"));

/// Parse a feed offset/size string into bytes.
///
/// Decimal suffixes (`kB`, `MB`, `GB`, `TB`) are powers of 1000, binary ones
/// (`KiB`, `MiB`, `GiB`, `TiB`) powers of 1024, `s` counts sectors and a bare
/// number or `B` is already bytes.
pub fn parse_feed_bytes(value: &str, sector_size: u64) -> Option<u64> {
    let caps = FEED_SIZE_RE.captures(value)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier: f64 = match caps.get(2).map(|m| m.as_str()).unwrap_or("") {
        "" | "B" | "b" => 1.0,
        "s" => sector_size as f64,
        "kB" | "KB" | "k" | "K" => 1e3,
        "MB" | "M" => 1e6,
        "GB" | "G" => 1e9,
        "TB" | "T" => 1e12,
        "KiB" => KIB as f64,
        "MiB" => MIB as f64,
        "GiB" => GIB as f64,
        "TiB" => TIB as f64,
        _ => return None,
    };
    Some((number * multiplier).round() as u64)
}

/// Parse a declared partition size into whole MiB.
///
/// Accepts `MiB`/`M`, `GiB`/`G` and `TiB`/`T` (case-insensitive); a bare
/// number is taken as MiB.
pub fn parse_size_mib(value: &str) -> Option<u64> {
    let caps = DESIRED_SIZE_RE.captures(value)?;
    let number: u64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    let factor = match unit.as_str() {
        "" | "m" | "mib" => 1,
        "g" | "gib" => 1024,
        "t" | "tib" => 1024 * 1024,
        _ => return None,
    };
    number.checked_mul(factor)
}

/// Round a byte count up to whole MiB
pub fn bytes_to_mib_ceil(bytes: u64) -> u64 {
    bytes.div_ceil(MIB)
}

/// Human-readable size
pub fn size_human(bytes: u64) -> String {
    if bytes >= TIB {
        format!("{:.1}T", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1}G", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1}M", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1}K", bytes as f64 / KIB as f64)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_bytes_decimal_and_sectors() {
        assert_eq!(parse_feed_bytes("1049kB", 512), Some(1_049_000));
        assert_eq!(parse_feed_bytes("256GB", 512), Some(256_000_000_000));
        assert_eq!(parse_feed_bytes("1.5MB", 512), Some(1_500_000));
        assert_eq!(parse_feed_bytes("2048s", 512), Some(1_048_576));
        assert_eq!(parse_feed_bytes("4096", 512), Some(4096));
        assert_eq!(parse_feed_bytes("1MiB", 512), Some(MIB));
        assert_eq!(parse_feed_bytes("garbage", 512), None);
        assert_eq!(parse_feed_bytes("12XB", 512), None);
    }

    #[test]
    fn desired_sizes_in_mib() {
        assert_eq!(parse_size_mib("512MiB"), Some(512));
        assert_eq!(parse_size_mib("128GiB"), Some(131072));
        assert_eq!(parse_size_mib("64g"), Some(65536));
        assert_eq!(parse_size_mib("1TiB"), Some(1_048_576));
        assert_eq!(parse_size_mib("300"), Some(300));
    }

    #[test]
    fn malformed_desired_sizes_are_rejected() {
        assert_eq!(parse_size_mib("abcMiB"), None);
        assert_eq!(parse_size_mib("12XB"), None);
        assert_eq!(parse_size_mib("1.5GiB"), None);
        assert_eq!(parse_size_mib(""), None);
    }

    #[test]
    fn ceil_to_mib() {
        assert_eq!(bytes_to_mib_ceil(0), 0);
        assert_eq!(bytes_to_mib_ceil(1), 1);
        assert_eq!(bytes_to_mib_ceil(MIB), 1);
        assert_eq!(bytes_to_mib_ceil(538_000_000), 514);
    }

    #[test]
    fn human_sizes() {
        assert_eq!(size_human(512), "512B");
        assert_eq!(size_human(2 * MIB), "2.0M");
        assert_eq!(size_human(3 * GIB / 2), "1.5G");
    }
}
