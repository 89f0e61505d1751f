//! OBIS register identifiers.
//!
//! Codes are dot-separated alphanumeric groups with an optional `*nn`
//! billing-period suffix, e.g. `1.8.0`, `F.F.0`, `1.6.0*03`. Validation
//! happens before a code is placed inside a command frame so a typo fails
//! locally instead of as a device NAK.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt},
    multi::separated_list1,
    sequence::preceded,
    IResult,
};
use std::fmt;
use std::str::FromStr;

use crate::error::MeterError;

/// A validated OBIS register identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObisCode {
    groups: Vec<String>,
    billing_period: Option<u8>,
}

fn group(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric())(input)
}

fn billing_suffix(input: &str) -> IResult<&str, u8> {
    preceded(char('*'), map_res(digit1, str::parse))(input)
}

fn obis_code(input: &str) -> IResult<&str, ObisCode> {
    let (input, groups) = separated_list1(char('.'), group)(input)?;
    let (input, billing_period) = opt(billing_suffix)(input)?;
    Ok((
        input,
        ObisCode {
            groups: groups.into_iter().map(str::to_string).collect(),
            billing_period,
        },
    ))
}

impl ObisCode {
    /// Parses and validates a code. At least two groups are required; a
    /// single bare token is never a register address.
    pub fn parse(raw: &str) -> Result<ObisCode, MeterError> {
        let trimmed = raw.trim();
        let (_, code) = all_consuming(obis_code)(trimmed)
            .map_err(|_| MeterError::InvalidObisCode(raw.to_string()))?;
        if code.groups.len() < 2 {
            return Err(MeterError::InvalidObisCode(raw.to_string()));
        }
        Ok(code)
    }

    /// The code without any billing-period suffix, e.g. `1.8.0` for
    /// `1.8.0*03`.
    pub fn base(&self) -> String {
        self.groups.join(".")
    }

    pub fn billing_period(&self) -> Option<u8> {
        self.billing_period
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// True when this code addresses `base` either directly or through a
    /// billing-period suffix.
    pub fn matches_base(&self, base: &str) -> bool {
        self.base() == base
    }
}

impl FromStr for ObisCode {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObisCode::parse(s)
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base())?;
        if let Some(n) = self.billing_period {
            write!(f, "*{n:02}")?;
        }
        Ok(())
    }
}
