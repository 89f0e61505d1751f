//! Readout-block decoding.
//!
//! A readout block is CRLF-separated lines of the form
//! `code(value*unit)(value)...`. Decoding is forgiving: a malformed line is
//! reported as a warning and skipped, never an error, because real meters
//! ship firmware quirks and one odd line must not void an otherwise good
//! readout.

use nom::{
    bytes::complete::{take_till, take_till1},
    character::complete::char,
    multi::many1,
    sequence::delimited,
    IResult,
};

use super::code::ObisCode;

/// One parenthesized value with its optional `*unit` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObisValue {
    pub value: String,
    pub unit: Option<String>,
}

impl ObisValue {
    fn from_raw(raw: &str) -> ObisValue {
        match raw.find('*') {
            Some(pos) => ObisValue {
                value: raw[..pos].to_string(),
                unit: Some(raw[pos + 1..].to_string()),
            },
            None => ObisValue {
                value: raw.to_string(),
                unit: None,
            },
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.trim().parse().ok()
    }
}

/// One decoded readout line: a register address and its value list.
///
/// Most registers carry a single value; demand registers carry a value
/// followed by its timestamp, profile rows a timestamp followed by samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ObisRecord {
    pub code: ObisCode,
    pub values: Vec<ObisValue>,
}

impl ObisRecord {
    /// First value, the common single-value case.
    pub fn value(&self) -> &str {
        self.values.first().map(|v| v.value.as_str()).unwrap_or("")
    }

    pub fn value_at(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).map(|v| v.value.as_str())
    }
}

/// Result of decoding one block.
#[derive(Debug, Clone, Default)]
pub struct DecodedBlock {
    pub records: Vec<ObisRecord>,
    /// Human-readable notes about lines that could not be decoded.
    pub warnings: Vec<String>,
}

fn paren_value(input: &str) -> IResult<&str, &str> {
    delimited(char('('), take_till(|c| c == ')'), char(')'))(input)
}

fn record_line(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    let (input, code) = take_till1(|c| c == '(')(input)?;
    let (input, values) = many1(paren_value)(input)?;
    Ok((input, (code, values)))
}

/// Decodes a readout payload into records plus warnings for anything that
/// did not parse. Control characters are stripped per line first since some
/// meters leave STX/ETX fragments inside multi-block payloads.
/// List registers (event/outage logs, profile rows) repeat their code by
/// design; everything else should appear once per block.
fn repeats_by_design(code: &ObisCode) -> bool {
    matches!(code.groups().first().map(String::as_str), Some("99") | Some("P"))
}

pub fn decode_block(text: &str) -> DecodedBlock {
    let mut block = DecodedBlock::default();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for raw_line in text.lines() {
        let clean: String = raw_line.chars().filter(|c| !c.is_ascii_control()).collect();
        let line = clean.trim();

        if line.is_empty() || line == "!" {
            continue;
        }

        match record_line(line) {
            Ok((rest, (code_str, values))) if rest.trim().is_empty() => {
                match ObisCode::parse(code_str) {
                    Ok(code) => {
                        if !repeats_by_design(&code) && !seen.insert(code.to_string()) {
                            block
                                .warnings
                                .push(format!("duplicate register in block: {code}"));
                        }
                        block.records.push(ObisRecord {
                            code,
                            values: values.into_iter().map(ObisValue::from_raw).collect(),
                        });
                    }
                    Err(_) => block
                        .warnings
                        .push(format!("unrecognized register address: {line}")),
                }
            }
            _ => block.warnings.push(format!("unparsed line: {line}")),
        }
    }

    block
}

/// Lookup view over a decoded block, keyed by base OBIS code.
pub struct RegisterMap<'a> {
    records: &'a [ObisRecord],
}

impl<'a> RegisterMap<'a> {
    pub fn new(block: &'a DecodedBlock) -> RegisterMap<'a> {
        RegisterMap {
            records: &block.records,
        }
    }

    /// First record whose base matches, billing-suffixed or not.
    pub fn find(&self, base: &str) -> Option<&'a ObisRecord> {
        self.records.iter().find(|r| r.code.matches_base(base))
    }

    /// Record addressed by `base*period`.
    pub fn find_billing(&self, base: &str, period: u8) -> Option<&'a ObisRecord> {
        self.records
            .iter()
            .find(|r| r.code.matches_base(base) && r.code.billing_period() == Some(period))
    }

    /// All records sharing a base code, in block order.
    pub fn find_all(&self, base: &str) -> impl Iterator<Item = &'a ObisRecord> + '_ {
        let base = base.to_string();
        self.records
            .iter()
            .filter(move |r| r.code.matches_base(&base))
    }

    pub fn str_value(&self, base: &str) -> Option<&'a str> {
        self.find(base).map(|r| r.value())
    }

    pub fn f64_value(&self, base: &str) -> Option<f64> {
        self.find(base).and_then(|r| r.values.first()?.as_f64())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_energy_register_with_unit() {
        let block = decode_block("1.8.0(123456.789*kWh)\r\n");
        assert_eq!(block.warnings.len(), 0);
        assert_eq!(block.records.len(), 1);
        let rec = &block.records[0];
        assert_eq!(rec.code.base(), "1.8.0");
        assert_eq!(rec.value(), "123456.789");
        assert_eq!(rec.values[0].unit.as_deref(), Some("kWh"));
        assert_eq!(rec.values[0].as_f64(), Some(123456.789));
    }

    #[test]
    fn decodes_compound_demand_register() {
        let block = decode_block("1.6.0(004.122*kW)(25-03-01,10:15)\r\n");
        let rec = &block.records[0];
        assert_eq!(rec.values.len(), 2);
        assert_eq!(rec.value_at(1), Some("25-03-01,10:15"));
    }

    #[test]
    fn malformed_line_becomes_warning_not_error() {
        let text = "1.8.0(123.4*kWh)\r\nGARBAGE WITHOUT PARens\r\n0.9.1(21:30:15)\r\n";
        let block = decode_block(text);
        assert_eq!(block.records.len(), 2);
        assert_eq!(block.warnings.len(), 1);
        assert!(block.warnings[0].contains("GARBAGE"));
    }

    #[test]
    fn skips_terminator_and_control_chars() {
        let text = "\u{2}0.0.0(12345678)\r\n!\r\n\u{3}";
        let block = decode_block(text);
        assert_eq!(block.records.len(), 1);
        assert!(block.warnings.is_empty());
    }

    #[test]
    fn duplicate_register_is_kept_but_warned() {
        let block = decode_block("1.8.0(100.0*kWh)\r\n1.8.0(100.1*kWh)\r\n");
        assert_eq!(block.records.len(), 2);
        assert_eq!(block.warnings.len(), 1);
        assert!(block.warnings[0].contains("duplicate"));
    }

    #[test]
    fn list_registers_may_repeat_without_warning() {
        let block = decode_block(
            "99.98.3(25-02-10,14:00)()()(magnetic)\r\n99.98.3(25-03-01,08:00)()()(magnetic)\r\n",
        );
        assert_eq!(block.records.len(), 2);
        assert!(block.warnings.is_empty());
    }

    #[test]
    fn register_map_matches_billing_suffix() {
        let block = decode_block("1.8.0*01(100.0*kWh)\r\n1.8.0*02(90.0*kWh)\r\n");
        let map = RegisterMap::new(&block);
        assert_eq!(map.f64_value("1.8.0"), Some(100.0));
        let feb = map.find_billing("1.8.0", 2).unwrap();
        assert_eq!(feb.values[0].as_f64(), Some(90.0));
        assert_eq!(map.find_billing("1.8.0", 3), None);
    }
}
