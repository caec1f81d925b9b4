// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content stream codec. lopdf handles ordinary operators; inline images
// (`BI … ID … EI`) are cut out before parsing and written back as the exact
// bytes they were read from.

use std::borrow::Cow;

use falzwerk_core::error::{FalzwerkError, Result};
use lopdf::content::{Content, Operation};

/// Stand-in operator for an inline image. Its one operand is the image's
/// index into [`PageContent::inline_images`].
pub(crate) const INLINE_IMAGE: &str = "FzInlineImage";

#[derive(Debug, Default)]
pub(crate) struct PageContent {
    pub operations: Vec<Operation>,
    /// Each inline image from `BI` through `EI`, verbatim.
    pub inline_images: Vec<Vec<u8>>,
}

impl PageContent {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (stripped, inline_images) = cut_inline_images(bytes)?;
        let operations = Content::decode(&stripped)
            .map_err(|err| FalzwerkError::ProcessingFailed(format!("failed to parse content stream: {}", err)))?
            .operations;
        Ok(Self {
            operations,
            inline_images,
        })
    }
}

/// Serialize `operations`, putting each inline image placeholder back as the
/// bytes it stands for.
pub(crate) fn encode(operations: &[Operation], inline_images: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut run_start = 0;
    for (index, op) in operations.iter().enumerate() {
        if op.operator != INLINE_IMAGE {
            continue;
        }
        append_operations(&mut output, &operations[run_start..index])?;
        let image = op
            .operands
            .first()
            .and_then(|operand| operand.as_i64().ok())
            .and_then(|index| usize::try_from(index).ok())
            .and_then(|index| inline_images.get(index))
            .ok_or_else(|| FalzwerkError::ProcessingFailed("inline image placeholder without data".to_string()))?;
        separate(&mut output);
        output.extend_from_slice(image);
        run_start = index + 1;
    }
    append_operations(&mut output, &operations[run_start..])?;
    Ok(output)
}

fn append_operations(output: &mut Vec<u8>, operations: &[Operation]) -> Result<()> {
    if operations.is_empty() {
        return Ok(());
    }
    let encoded = Content { operations }
        .encode()
        .map_err(|err| FalzwerkError::ProcessingFailed(format!("failed to encode content: {}", err)))?;
    separate(output);
    output.extend(encoded);
    Ok(())
}

fn separate(output: &mut Vec<u8>) {
    if output.last().is_some_and(|&byte| !is_whitespace(byte)) {
        output.push(b'\n');
    }
}

/// Replace every inline image with a placeholder operation, returning the
/// rewritten stream and the images in order.
fn cut_inline_images(bytes: &[u8]) -> Result<(Cow<'_, [u8]>, Vec<Vec<u8>>)> {
    let mut scanner = Scanner { bytes, pos: 0 };
    let mut stripped = Vec::new();
    let mut images = Vec::new();
    let mut copied = 0;

    while let Some((start, end)) = scanner.next_token() {
        if &bytes[start..end] != b"BI" {
            continue;
        }
        let image_end = scanner.inline_image_end()?;
        stripped.extend_from_slice(&bytes[copied..start]);
        stripped.extend_from_slice(format!(" {} {} ", images.len(), INLINE_IMAGE).as_bytes());
        images.push(bytes[start..image_end].to_vec());
        copied = image_end;
        scanner.pos = image_end;
    }

    if images.is_empty() {
        return Ok((Cow::Borrowed(bytes), images));
    }
    stripped.extend_from_slice(&bytes[copied..]);
    Ok((Cow::Owned(stripped), images))
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Token-level walk over content stream syntax, just precise enough to find
/// operators and skip strings, names and comments.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Scanner<'_> {
    /// Span of the next token, or `None` at the end of the stream.
    fn next_token(&mut self) -> Option<(usize, usize)> {
        let bytes = self.bytes;
        loop {
            while self.pos < bytes.len() && is_whitespace(bytes[self.pos]) {
                self.pos += 1;
            }
            if self.pos < bytes.len() && bytes[self.pos] == b'%' {
                while self.pos < bytes.len() && !matches!(bytes[self.pos], b'\r' | b'\n') {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
        let start = self.pos;
        let first = *bytes.get(start)?;

        self.pos = match first {
            b'(' => self.literal_string_end(start),
            b'<' if bytes.get(start + 1) == Some(&b'<') => start + 2,
            b'>' if bytes.get(start + 1) == Some(&b'>') => start + 2,
            b'<' => bytes[start..]
                .iter()
                .position(|&byte| byte == b'>')
                .map_or(bytes.len(), |offset| start + offset + 1),
            b'/' => self.regular_end(start + 1),
            _ if is_delimiter(first) => start + 1,
            _ => self.regular_end(start),
        };
        Some((start, self.pos))
    }

    fn regular_end(&self, from: usize) -> usize {
        self.bytes[from..]
            .iter()
            .position(|&byte| is_whitespace(byte) || is_delimiter(byte))
            .map_or(self.bytes.len(), |offset| from + offset)
    }

    fn literal_string_end(&self, start: usize) -> usize {
        let mut depth = 0usize;
        let mut pos = start;
        while pos < self.bytes.len() {
            match self.bytes[pos] {
                b'\\' => pos += 1,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return pos + 1;
                    }
                }
                _ => {}
            }
            pos += 1;
        }
        self.bytes.len()
    }

    /// With the scanner just past `BI`, find the byte after the closing `EI`.
    fn inline_image_end(&mut self) -> Result<usize> {
        let bytes = self.bytes;
        let mut entries: Vec<(&[u8], &[u8])> = Vec::new();
        let mut key: Option<&[u8]> = None;
        loop {
            let Some((start, end)) = self.next_token() else {
                return Err(unterminated());
            };
            let token = &bytes[start..end];
            if token == b"ID" {
                break;
            }
            match key.take() {
                Some(entry) => {
                    if matches!(token, b"[" | b"<<") {
                        self.skip_compound()?;
                    }
                    entries.push((entry, token));
                }
                None if token.starts_with(b"/") => key = Some(&token[1..]),
                None => {}
            }
        }

        // A single white-space byte separates `ID` from the data.
        let data_start = (self.pos + 1).min(bytes.len());
        let measured = unfiltered_length(&entries).and_then(|length| ei_at(bytes, data_start.saturating_add(length)));
        if let Some(end) = measured {
            return Ok(end);
        }
        find_ei(bytes, data_start).ok_or_else(unterminated)
    }

    /// Skip to the bracket closing an array or dictionary just opened.
    fn skip_compound(&mut self) -> Result<()> {
        let mut depth = 1usize;
        while depth > 0 {
            let Some((start, end)) = self.next_token() else {
                return Err(unterminated());
            };
            match &self.bytes[start..end] {
                b"[" | b"<<" => depth += 1,
                b"]" | b">>" => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }
}

fn unterminated() -> FalzwerkError {
    FalzwerkError::ProcessingFailed("inline image is not terminated by EI".to_string())
}

/// Byte length of an inline image's data when it carries no filter and its
/// dictionary gives the full geometry.
fn unfiltered_length(entries: &[(&[u8], &[u8])]) -> Option<usize> {
    let value = |short: &[u8], long: &[u8]| {
        entries
            .iter()
            .find(|(key, _)| *key == short || *key == long)
            .map(|(_, value)| *value)
    };
    let number = |short: &[u8], long: &[u8]| {
        value(short, long)
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .and_then(|raw| raw.parse::<usize>().ok())
    };

    if value(b"F", b"Filter").is_some() {
        return None;
    }
    let width = number(b"W", b"Width")?;
    let height = number(b"H", b"Height")?;
    let (components, bits) = if value(b"IM", b"ImageMask") == Some(b"true".as_slice()) {
        (1, 1)
    } else {
        let components = match value(b"CS", b"ColorSpace")? {
            b"/G" | b"/DeviceGray" => 1,
            b"/RGB" | b"/DeviceRGB" => 3,
            b"/CMYK" | b"/DeviceCMYK" => 4,
            _ => return None,
        };
        (components, number(b"BPC", b"BitsPerComponent")?)
    };
    let row = width.checked_mul(components)?.checked_mul(bits)?.div_ceil(8);
    row.checked_mul(height)
}

/// End of an `EI` operator starting at `pos`, allowing white space first.
fn ei_at(bytes: &[u8], mut pos: usize) -> Option<usize> {
    while pos < bytes.len() && is_whitespace(bytes[pos]) {
        pos += 1;
    }
    (bytes.get(pos..)?.starts_with(b"EI") && ends_token(bytes, pos + 2)).then_some(pos + 2)
}

/// First `EI` at or after `from` that stands alone as a token.
fn find_ei(bytes: &[u8], from: usize) -> Option<usize> {
    (from.max(1)..bytes.len().saturating_sub(1))
        .find(|&pos| {
            &bytes[pos..pos + 2] == b"EI" && is_whitespace(bytes[pos - 1]) && ends_token(bytes, pos + 2)
        })
        .map(|pos| pos + 2)
}

fn ends_token(bytes: &[u8], pos: usize) -> bool {
    bytes.get(pos).is_none_or(|&byte| is_whitespace(byte) || is_delimiter(byte))
}
