//! # P1 Telegram Decoder
//!
//! A P1 telegram is a block of text lines sent by a DSMR smart meter about once
//! a second:
//!
//! ```text
//! /ISk5\2MT382-1000
//!
//! 1-3:0.2.8(40)
//! 0-0:1.0.0(101209113020W)
//! 1-0:1.8.1(123456.789*kWh)
//! 1-0:1.7.0(01.193*kW)
//! 0-1:24.3.0(121209110000)(00)(60)(1)(0-1:24.2.1)(m3)
//! (00124.477)
//! !
//! ```
//!
//! Each relevant line carries an OBIS-style identifier followed by a
//! parenthesised `value*unit` payload. Lines that do not look like that are
//! metadata and are ignored. The gas register is the exception: its
//! identifier line carries a timestamp and the value follows on the next
//! physical line, so the decoder defers to that line when it sees the
//! configured gas identifier.
//!
//! Decoding never fails as a whole. A malformed line is logged and skipped.
//!
//! ```rust
//! use meterd::p1::telegram::{parse_telegram, Telegram};
//!
//! let telegram = Telegram::from_lines(["/XMX5", "1-0:1.8.1(000123.456*kWh)"]);
//! let readings = parse_telegram(&telegram, None);
//! assert_eq!(readings[0].id, "1.8.1");
//! assert_eq!(readings[0].unit, "kWh");
//! ```

use crate::constants::{P1_MAX_FIELD_LEN, UNIT_M3};
use log::warn;
use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{char, satisfy},
    combinator::recognize,
    sequence::tuple,
    IResult,
};

/// One framed telegram: the header line and every data line up to, but not
/// including, the `!` trailer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Telegram {
    lines: Vec<String>,
}

impl Telegram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Telegram {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The `/` identification line, if the telegram has one.
    pub fn header(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A single counter reading extracted from a telegram.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: String,
    pub value: f64,
    pub unit: String,
}

impl Reading {
    pub fn new(id: &str, value: f64, unit: &str) -> Self {
        Reading {
            id: id.to_string(),
            value,
            unit: unit.to_string(),
        }
    }
}

/// Decodes telegrams for one meter.
#[derive(Debug, Clone, Default)]
pub struct TelegramParser {
    gas_id: Option<String>,
}

impl TelegramParser {
    pub fn new(gas_id: Option<&str>) -> Self {
        TelegramParser {
            gas_id: gas_id.map(str::to_string),
        }
    }

    pub fn parse(&self, telegram: &Telegram) -> Vec<Reading> {
        parse_telegram(telegram, self.gas_id.as_deref())
    }
}

/// Extracts every counter reading from `telegram`.
///
/// `gas_id` names the register whose value is reported on the line following
/// its identifier line.
pub fn parse_telegram(telegram: &Telegram, gas_id: Option<&str>) -> Vec<Reading> {
    let mut readings = Vec::new();
    let mut next_is_gas = false;

    for line in telegram.lines() {
        if next_is_gas {
            next_is_gas = false;

            if let Some(content) = parenthesized(line) {
                // Only reachable with a configured gas id
                let id = gas_id.unwrap_or_default();
                let value = content.split_once('*').map_or(content, |(value, _)| value);
                if let Some(reading) = build_reading(id, value, UNIT_M3) {
                    readings.push(reading);
                }
            }
            continue;
        }

        let Some((id, payload)) = obis_line(line) else {
            continue;
        };

        if gas_id == Some(id) {
            next_is_gas = true;
            continue;
        }

        if let Some((value, unit)) = split_value_unit(payload) {
            if let Some(reading) = build_reading(id, value, unit) {
                readings.push(reading);
            }
        }
    }

    readings
}

fn build_reading(id: &str, value: &str, unit: &str) -> Option<Reading> {
    if value.len() >= P1_MAX_FIELD_LEN || unit.len() >= P1_MAX_FIELD_LEN {
        warn!(
            "Invalid counter value ({} bytes) or unit ({} bytes) length for {id}",
            value.len(),
            unit.len()
        );
        return None;
    }

    match value.trim().parse::<f64>() {
        Ok(parsed) => Some(Reading::new(id, parsed, unit)),
        Err(_) => {
            warn!("Unparseable value '{value}' for counter {id}");
            None
        }
    }
}

fn digit(input: &str) -> IResult<&str, char> {
    satisfy(|c: char| c.is_ascii_digit())(input)
}

fn digits(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit())(input)
}

/// `D-D:N.N.N(`, yielding the `N.N.N` identifier.
fn obis_prefix(input: &str) -> IResult<&str, &str> {
    let (input, _) = tuple((digit, char('-'), digit, char(':')))(input)?;
    let (input, id) = recognize(tuple((digits, char('.'), digits, char('.'), digits)))(input)?;
    let (input, _) = char('(')(input)?;
    Ok((input, id))
}

/// Finds the leftmost `D-D:ID(payload)` in `line`.
///
/// The payload runs up to the last `)` on the line, so multi-group lines such
/// as `0-1:24.3.0(...)(...)(m3)` yield everything between the first `(` and
/// the final `)`.
pub fn obis_line(line: &str) -> Option<(&str, &str)> {
    line.char_indices()
        .filter(|(_, c)| c.is_ascii_digit())
        .find_map(|(start, _)| {
            let (rest, id) = obis_prefix(&line[start..]).ok()?;
            let close = rest.rfind(')')?;
            Some((id, &rest[..close]))
        })
}

/// Content between the first `(` and the last `)` following it.
pub fn parenthesized(line: &str) -> Option<&str> {
    let open = line.find('(')?;
    let inner = &line[open + 1..];
    let close = inner.rfind(')')?;
    Some(&inner[..close])
}

fn is_value_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// Splits a `value*unit` payload.
///
/// The value is the run of digits and dots directly before the first `*`, the
/// unit the run of ASCII alphanumerics directly after it.
pub fn split_value_unit(payload: &str) -> Option<(&str, &str)> {
    let star = payload.find('*')?;
    let before = &payload[..star];
    let value = &before[before.trim_end_matches(is_value_char).len()..];

    let unit_result: IResult<&str, &str> =
        take_while(|c: char| c.is_ascii_alphanumeric())(&payload[star + 1..]);
    let (_, unit) = unit_result.ok()?;

    Some((value, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obis_line_simple() {
        assert_eq!(
            obis_line("1-0:1.8.1(123456.789*kWh)"),
            Some(("1.8.1", "123456.789*kWh"))
        );
    }

    #[test]
    fn test_obis_line_uses_last_parenthesis() {
        assert_eq!(
            obis_line("0-1:24.3.0(121209110000)(00)(60)(1)(0-1:24.2.1)(m3)"),
            Some(("24.3.0", "121209110000)(00)(60)(1)(0-1:24.2.1)(m3"))
        );
    }

    #[test]
    fn test_obis_line_leftmost_match() {
        // Only single digits are allowed before '-', so the match starts one
        // character in
        assert_eq!(obis_line("10-0:1.8.1(1*kWh)"), Some(("1.8.1", "1*kWh")));
        assert_eq!(obis_line("junk 1-0:2.7.0(00.000*kW)"), Some(("2.7.0", "00.000*kW")));
    }

    #[test]
    fn test_obis_line_rejects() {
        assert_eq!(obis_line("/ISk5\\2MT382-1000"), None);
        assert_eq!(obis_line("1-0:1.8(1*kWh)"), None);
        assert_eq!(obis_line("1-0:1.8.1(1*kWh"), None);
        assert_eq!(obis_line("1-0:1.8.1.2(1*kWh)"), None);
        assert_eq!(obis_line(""), None);
    }

    #[test]
    fn test_split_value_unit() {
        assert_eq!(split_value_unit("001234.567*kWh"), Some(("001234.567", "kWh")));
        assert_eq!(split_value_unit("01.193*kW"), Some(("01.193", "kW")));
        assert_eq!(split_value_unit("0001"), None);
        // First '*' wins; the value run stops at the non-value character
        assert_eq!(
            split_value_unit("1)(0-0:96.7.19)(000101000001W)(2147483647*s"),
            Some(("2147483647", "s"))
        );
        assert_eq!(split_value_unit("*kWh"), Some(("", "kWh")));
    }

    #[test]
    fn test_parenthesized() {
        assert_eq!(parenthesized("(00124.477)"), Some("00124.477"));
        assert_eq!(parenthesized("  (1)(2)"), Some("1)(2"));
        assert_eq!(parenthesized("no parens"), None);
        assert_eq!(parenthesized("(open"), None);
    }

    #[test]
    fn test_telegram_accessors() {
        let mut telegram = Telegram::new();
        assert!(telegram.is_empty());
        assert_eq!(telegram.header(), None);

        telegram.push_line("/KFM5KAIFA-METER");
        telegram.push_line("1-3:0.2.8(42)");
        assert_eq!(telegram.len(), 2);
        assert_eq!(telegram.header(), Some("/KFM5KAIFA-METER"));
    }

    #[test]
    fn test_deferred_gas_value() {
        let telegram = Telegram::from_lines([
            "0-1:24.3.0(121209110000)(00)(60)(1)(0-1:24.2.1)(m3)",
            "(00124.477)",
        ]);
        let readings = parse_telegram(&telegram, Some("24.3.0"));
        assert_eq!(readings, vec![Reading::new("24.3.0", 124.477, "m3")]);

        // A unit suffix on the value line is tolerated
        let telegram = Telegram::from_lines(["0-1:24.3.0(121209110000)(m3)", "(00016.713*m3)"]);
        let readings = parse_telegram(&telegram, Some("24.3.0"));
        assert_eq!(readings, vec![Reading::new("24.3.0", 16.713, "m3")]);
    }

    #[test]
    fn test_gas_flag_clears_on_unmatched_line() {
        let telegram = Telegram::from_lines([
            "0-1:24.3.0(121209110000)(m3)",
            "no value here",
            "1-0:1.8.2(000002.000*kWh)",
            "(00001.000)",
        ]);
        let readings = parse_telegram(&telegram, Some("24.3.0"));
        assert_eq!(readings, vec![Reading::new("1.8.2", 2.0, "kWh")]);
    }

    #[test]
    fn test_empty_value_is_skipped() {
        let telegram = Telegram::from_lines(["1-0:1.8.1(*kWh)", "1-0:1.8.2(2*kWh)"]);
        let readings = parse_telegram(&telegram, None);
        assert_eq!(readings, vec![Reading::new("1.8.2", 2.0, "kWh")]);
    }
}
