//! Selecting a mib or variable by number or by name.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A mib chosen by id or by name.
///
/// Parsing treats a string that is entirely a number (decimal or `0x` hex)
/// as an id and anything else as a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MibSelector {
    Id(u32),
    Name(String),
}

/// A variable chosen by index or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarSelector {
    Index(u8),
    Name(String),
}

fn parse_number(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None if s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        None => None,
    }
}

impl FromStr for MibSelector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match parse_number(s).and_then(|n| u32::try_from(n).ok()) {
            Some(id) => MibSelector::Id(id),
            None => MibSelector::Name(s.to_owned()),
        })
    }
}

impl FromStr for VarSelector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match parse_number(s).and_then(|n| u8::try_from(n).ok()) {
            Some(index) => VarSelector::Index(index),
            None => VarSelector::Name(s.to_owned()),
        })
    }
}

impl fmt::Display for MibSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MibSelector::Id(id) => write!(f, "0x{:08x}", id),
            MibSelector::Name(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for VarSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarSelector::Index(index) => write!(f, "{}", index),
            VarSelector::Name(name) => f.write_str(name),
        }
    }
}

impl From<u32> for MibSelector {
    fn from(id: u32) -> Self {
        MibSelector::Id(id)
    }
}

impl From<&str> for MibSelector {
    fn from(name: &str) -> Self {
        MibSelector::Name(name.to_owned())
    }
}

impl From<u8> for VarSelector {
    fn from(index: u8) -> Self {
        VarSelector::Index(index)
    }
}

impl From<&str> for VarSelector {
    fn from(name: &str) -> Self {
        VarSelector::Name(name.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mib_selector_parse() {
        assert_eq!("0xfffffe02".parse(), Ok(MibSelector::Id(0xffff_fe02)));
        assert_eq!("12".parse(), Ok(MibSelector::Id(12)));
        assert_eq!(
            "BulbControl".parse(),
            Ok(MibSelector::Name("BulbControl".into()))
        );
        // Too large for an id, so it is a name.
        assert_eq!(
            "0x1ffffffff".parse(),
            Ok(MibSelector::Name("0x1ffffffff".into()))
        );
    }

    #[test]
    fn test_var_selector_parse() {
        assert_eq!("3".parse(), Ok(VarSelector::Index(3)));
        assert_eq!("300".parse(), Ok(VarSelector::Name("300".into())));
        assert_eq!("Mode".parse(), Ok(VarSelector::Name("Mode".into())));
        assert_eq!("".parse(), Ok(VarSelector::Name(String::new())));
    }
}
