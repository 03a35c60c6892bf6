// CABI - cabi-engine
// Module: String transcoding
//
// Copyright (c) 2025 The CABI Project Developers
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! String encoding support for the canonical ABI.
//!
//! The host representation is always UTF-8; these routines convert between
//! it and the wire encodings a component may declare. Transcoding is
//! two-pass: the first pass validates and counts the exact output size, the
//! second encodes into a buffer of that size.

use crate::prelude::*;

/// Wire string encodings selectable through canonical options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// UTF-8 encoding (default)
    #[default]
    Utf8,
    /// UTF-16 little endian encoding; lengths are code units
    Utf16Le,
    /// Latin-1 or UTF-16, discriminated by the top bit of the length.
    /// Declared but not supported by this engine.
    Latin1Utf16,
}

/// Convert UTF-16LE code units to UTF-8 bytes.
///
/// Unpaired surrogates are replaced with U+FFFD rather than rejected, so
/// any code unit sequence converts; the `Result` is part of the uniform
/// transcoder contract. The returned buffer is exact-sized, valid even for
/// empty input.
pub fn utf16le_to_utf8(src: &[u16]) -> Result<Vec<u8>> {
    // Pass 1: exact output size
    let size: usize = char::decode_utf16(src.iter().copied())
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER).len_utf8())
        .sum();

    // Pass 2: encode
    let mut bytes = Vec::with_capacity(size);
    let mut buf = [0u8; 4];
    for unit in char::decode_utf16(src.iter().copied()) {
        let ch = unit.unwrap_or(char::REPLACEMENT_CHARACTER);
        bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }
    debug_assert_eq!(bytes.len(), size);
    Ok(bytes)
}

/// Convert UTF-8 bytes to UTF-16LE code units.
///
/// Validation is strict: overlong forms, surrogate code points, values
/// above U+10FFFF and truncated sequences are all rejected in the first
/// pass.
pub fn utf8_to_utf16le(src: &[u8]) -> Result<Vec<u16>> {
    // Pass 1: validate and count
    let s = core::str::from_utf8(src).map_err(|e| {
        Error::invalid_utf8(format!("invalid UTF-8 at byte {}", e.valid_up_to()))
    })?;
    let count = s.encode_utf16().count();

    // Pass 2: encode
    let mut units = Vec::with_capacity(count);
    units.extend(s.encode_utf16());
    Ok(units)
}

/// Decode wire bytes into a host string
pub fn decode_string(bytes: &[u8], encoding: StringEncoding) -> Result<String> {
    match encoding {
        StringEncoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
            Error::invalid_utf8(format!(
                "invalid UTF-8 at byte {}",
                e.utf8_error().valid_up_to()
            ))
        }),
        StringEncoding::Utf16Le => {
            if bytes.len() % 2 != 0 {
                return Err(Error::invalid_utf16(
                    "UTF-16 byte sequence must have even length",
                ));
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                .collect();
            let utf8 = utf16le_to_utf8(&units)?;
            // utf16le_to_utf8 always produces valid UTF-8
            String::from_utf8(utf8)
                .map_err(|_| Error::invalid_utf16("transcoded UTF-16 was not valid UTF-8"))
        },
        StringEncoding::Latin1Utf16 => Err(Error::unsupported(
            "latin1+utf16 string encoding is not supported",
        )),
    }
}

/// Encode a host string into wire bytes
pub fn encode_string(s: &str, encoding: StringEncoding) -> Result<Vec<u8>> {
    match encoding {
        StringEncoding::Utf8 => Ok(s.as_bytes().to_vec()),
        StringEncoding::Utf16Le => {
            let mut bytes = Vec::with_capacity(s.encode_utf16().count() * 2);
            for unit in s.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            Ok(bytes)
        },
        StringEncoding::Latin1Utf16 => Err(Error::unsupported(
            "latin1+utf16 string encoding is not supported",
        )),
    }
}

/// Length of a host string on the wire, in code units.
///
/// For UTF-8 the unit is a byte; for UTF-16 a 16-bit code unit.
pub fn wire_code_units(s: &str, encoding: StringEncoding) -> Result<u32> {
    let units = match encoding {
        StringEncoding::Utf8 => s.len(),
        StringEncoding::Utf16Le => s.encode_utf16().count(),
        StringEncoding::Latin1Utf16 => {
            return Err(Error::unsupported(
                "latin1+utf16 string encoding is not supported",
            ));
        },
    };
    u32::try_from(units).map_err(|_| Error::alloc_failed("string exceeds 32-bit length"))
}

/// Bytes per code unit of an encoding, which is also the alignment of the
/// string's wire buffer
pub fn code_unit_size(encoding: StringEncoding) -> u32 {
    match encoding {
        StringEncoding::Utf8 => 1,
        StringEncoding::Utf16Le | StringEncoding::Latin1Utf16 => 2,
    }
}

/// Encode a host string to Latin-1 bytes.
///
/// Fails for characters above U+00FF. Not reachable from canonical
/// options; provided for embedders that transcode out-of-band.
pub fn encode_latin1(s: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(s.len());
    for ch in s.chars() {
        let code_point = ch as u32;
        if code_point > 0xFF {
            return Err(Error::unsupported(format!(
                "U+{code_point:04X} is not representable in latin1"
            )));
        }
        bytes.push(code_point as u8);
    }
    Ok(bytes)
}

/// Decode Latin-1 bytes into a host string; a direct mapping from bytes to
/// code points 0x00-0xFF, so this never fails
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
