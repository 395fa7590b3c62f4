// illustrator-relay/src/color/mod.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Color resolution for fill, stroke and text colors.
//!
//! A color arrives either as a hex string (`"#RRGGBB"` or `"RRGGBB"`) or as an
//! object `{r, g, b}`. Parsing is permissive: a malformed hex pair resolves
//! to a `NaN` channel instead of an error, and the host decides what to do
//! with it. Use [`RgbColor::is_valid`] to detect that case.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized RGB color. Channels are nominally 0..=255.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RgbColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor { r: 0.0, g: 0.0, b: 0.0 };

    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// `false` when any channel failed to parse.
    pub fn is_valid(&self) -> bool {
        !(self.r.is_nan() || self.g.is_nan() || self.b.is_nan())
    }

    /// `#rrggbb`, or `None` when a channel is not a number.
    pub fn to_hex(&self) -> Option<String> {
        if !self.is_valid() {
            return None;
        }
        let clamp = |c: f64| c.round().clamp(0.0, 255.0) as u8;
        Some(format!("#{:02x}{:02x}{:02x}", clamp(self.r), clamp(self.g), clamp(self.b)))
    }
}

/// Resolves a color specification taken straight from command parameters.
///
/// Strings are read as hex, anything else as an `{r, g, b}` object whose
/// missing or non-numeric channels default to 0.
pub fn resolve(spec: &Value) -> RgbColor {
    match spec {
        Value::String(hex) => resolve_hex(hex),
        other => {
            let channel = |name: &str| other.get(name).and_then(Value::as_f64).unwrap_or(0.0);
            RgbColor::new(channel("r"), channel("g"), channel("b"))
        }
    }
}

fn resolve_hex(spec: &str) -> RgbColor {
    let hex: Vec<char> = spec.strip_prefix('#').unwrap_or(spec).chars().collect();
    let pair = |offset: usize| -> f64 {
        let end = (offset + 2).min(hex.len());
        if offset >= end {
            return f64::NAN;
        }
        let slice: String = hex[offset..end].iter().collect();
        parse_hex_prefix(&slice)
    };
    RgbColor::new(pair(0), pair(2), pair(4))
}

/// Parses the leading hex digits of `s`, ignoring anything after them.
/// Leading whitespace, a sign and a `0x` prefix are accepted. No digits means `NaN`.
fn parse_hex_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    let digits: String = s.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
    if digits.is_empty() {
        return f64::NAN;
    }

    // At most two digits, cannot overflow.
    let value = u32::from_str_radix(&digits, 16).map(f64::from).unwrap_or(f64::NAN);
    if negative { -value } else { value }
}
