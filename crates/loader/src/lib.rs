// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Motorola S-record loader.

use anyhow::{anyhow, bail, Context, Result};
use sim68k_core::memory::ProgramImage;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub fn load_srecord(path: &Path) -> Result<ProgramImage> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read S-record file: {:?}", path))?;
    let image = parse_srecord(&text).with_context(|| format!("In {:?}", path))?;
    info!(
        "Loaded {} bytes in {} segment(s) from {:?}",
        image.byte_count(),
        image.segments.len(),
        path
    );
    Ok(image)
}

/// One decoded record: type digit, address, payload.
struct Record {
    kind: u8,
    address: u32,
    data: Vec<u8>,
}

fn hex_bytes(digits: &str) -> Result<Vec<u8>> {
    if !digits.is_ascii() {
        bail!("non-hex characters in record");
    }
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| anyhow!("invalid hex digits {:?}", &digits[i..i + 2]))
        })
        .collect()
}

fn address_bytes(kind: u8) -> Option<usize> {
    match kind {
        0 | 1 | 5 | 9 => Some(2),
        2 | 6 | 8 => Some(3),
        3 | 7 => Some(4),
        _ => None,
    }
}

fn parse_record(line: &str) -> Result<Record> {
    let rest = line
        .strip_prefix('S')
        .ok_or_else(|| anyhow!("record does not start with 'S'"))?;
    let kind = rest
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or_else(|| anyhow!("missing record type"))? as u8;
    let width = address_bytes(kind).ok_or_else(|| anyhow!("unknown record type S{}", kind))?;

    let bytes = hex_bytes(&rest[1..])?;
    let (&count, body) = bytes
        .split_first()
        .ok_or_else(|| anyhow!("missing byte count"))?;
    if body.len() != count as usize {
        bail!("byte count {} does not match {} bytes present", count, body.len());
    }
    if body.len() < width + 1 {
        bail!("record too short for S{}", kind);
    }

    let sum = bytes[..bytes.len() - 1]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    let checksum = bytes[bytes.len() - 1];
    if !sum != checksum {
        bail!("checksum {:02X}, expected {:02X}", checksum, !sum);
    }

    let address = body[..width]
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | *b as u32);
    let data = body[width..body.len() - 1].to_vec();
    Ok(Record {
        kind,
        address,
        data,
    })
}

/// Parse S-record text into a program image. Blank lines are skipped and
/// nothing after a termination record is read.
pub fn parse_srecord(text: &str) -> Result<ProgramImage> {
    let mut image = ProgramImage::new();
    let mut terminated = false;

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = parse_record(line).with_context(|| format!("line {}", number + 1))?;
        match record.kind {
            0 => debug!("S-record header: {}", String::from_utf8_lossy(&record.data)),
            1..=3 => image.add_segment(record.address, record.data),
            5 | 6 => {}
            _ => {
                image.entry_point = Some(record.address);
                terminated = true;
                break;
            }
        }
    }

    if !terminated {
        warn!("S-record data has no termination record");
    }
    if image.segments.is_empty() {
        warn!("No data records found");
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_and_termination() {
        let text = "S00600004844521B\nS107040070055285A8\nS9030400F8\n";
        let image = parse_srecord(text).unwrap();
        assert_eq!(image.entry_point, Some(0x400));
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].start_addr, 0x400);
        assert_eq!(image.segments[0].data, vec![0x70, 0x05, 0x52, 0x85]);
    }

    #[test]
    fn test_wide_addresses() {
        let text = "S2060100004E7139\nS30800020000ABCDEF8E\n";
        let image = parse_srecord(text).unwrap();
        assert_eq!(image.entry_point, None);
        assert_eq!(image.segments[0].start_addr, 0x01_0000);
        assert_eq!(image.segments[0].data, vec![0x4e, 0x71]);
        assert_eq!(image.segments[1].start_addr, 0x0002_0000);
        assert_eq!(image.segments[1].data, vec![0xab, 0xcd, 0xef]);
    }

    #[test]
    fn test_contiguous_records_merge() {
        let text = "S1050000AAAAA6\nS1050002BBBB82\n";
        let image = parse_srecord(text).unwrap();
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].data, vec![0xaa, 0xaa, 0xbb, 0xbb]);
    }

    #[test]
    fn test_bad_checksum_names_line() {
        let text = "S107040070055285A8\nS107040070055285A9\n";
        let err = parse_srecord(text).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("line 2"), "{}", message);
        assert!(message.contains("checksum"), "{}", message);
    }

    #[test]
    fn test_malformed_records() {
        assert!(parse_srecord("X1070400700552854A").is_err());
        assert!(parse_srecord("S4030000FC").is_err());
        assert!(parse_srecord("S10704007005").is_err());
        assert!(parse_srecord("S107040070055285A").is_err());
    }
}
