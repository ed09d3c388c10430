// Domain type definitions for the quote pipeline
// Codes, formats and rounding selectors shared across every stage

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pricing::error::PricingError;

/// ISO 4217 currency code, stored inline so `Money` stays `Copy`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

/// Currencies whose smallest unit is the major unit
const ZERO_DECIMAL_CURRENCIES: [&str; 5] = ["JPY", "KRW", "ISK", "CLP", "VND"];

impl CurrencyCode {
    /// Parse a three-letter code, case-insensitively
    pub fn parse(code: &str) -> Result<Self, PricingError> {
        let code = code.trim();
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(PricingError::InvalidCurrency(code.to_string()));
        }
        let mut upper = [0u8; 3];
        for (slot, byte) in upper.iter_mut().zip(bytes) {
            *slot = byte.to_ascii_uppercase();
        }
        Ok(CurrencyCode(upper))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Number of decimal digits in the minor unit (2 for EUR, 0 for JPY)
    pub fn minor_exponent(&self) -> u32 {
        if ZERO_DECIMAL_CURRENCIES.contains(&self.as_str()) {
            0
        } else {
            2
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurrencyCode::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = PricingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CurrencyCode::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

/// ISO 3166-1 alpha-2 destination country
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    /// Parse a two-letter code, case-insensitively
    ///
    /// Well-formed but unknown countries are accepted here; the tax and
    /// shipping stages fall back to their defaults for them.
    pub fn parse(code: &str) -> Result<Self, PricingError> {
        let code = code.trim();
        let bytes = code.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(PricingError::Validation(format!(
                "Invalid country code '{}': expected two letters",
                code
            )));
        }
        Ok(CountryCode([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
        ]))
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountryCode {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CountryCode::parse(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = PricingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CountryCode::parse(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.as_str().to_string()
    }
}

/// Print production kinds with a cost-table model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintKind {
    Canvas,
    Metal,
    Photo,
}

impl PrintKind {
    pub const ALL: [PrintKind; 3] = [PrintKind::Canvas, PrintKind::Metal, PrintKind::Photo];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrintKind::Canvas => "canvas",
            PrintKind::Metal => "metal",
            PrintKind::Photo => "photo",
        }
    }
}

impl fmt::Display for PrintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrintKind {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "canvas" => Ok(PrintKind::Canvas),
            "metal" => Ok(PrintKind::Metal),
            "photo" => Ok(PrintKind::Photo),
            other => Err(PricingError::InvalidFormat(other.to_string())),
        }
    }
}

/// Requested sellable format: the original itself or a print kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Format {
    Original,
    Print(PrintKind),
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Original => f.write_str("original"),
            Format::Print(kind) => write!(f, "{}", kind),
        }
    }
}

impl FromStr for Format {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("original") {
            return Ok(Format::Original);
        }
        s.parse::<PrintKind>()
            .map(Format::Print)
            .map_err(|_| PricingError::InvalidFormat(s.trim().to_string()))
    }
}

impl TryFrom<String> for Format {
    type Error = PricingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.to_string()
    }
}

/// Rounding strategy applied to converted amounts
///
/// `Nearest` rounds half away from zero. `Psycho` rounds to an attractive
/// ending (…99 for two-decimal currencies, …9 for zero-decimal ones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    Nearest,
    Floor,
    Ceil,
    Psycho,
}

impl Default for RoundingMode {
    fn default() -> Self {
        RoundingMode::Nearest
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingMode::Nearest => write!(f, "nearest"),
            RoundingMode::Floor => write!(f, "floor"),
            RoundingMode::Ceil => write!(f, "ceil"),
            RoundingMode::Psycho => write!(f, "psycho"),
        }
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(RoundingMode::Nearest),
            "floor" => Ok(RoundingMode::Floor),
            "ceil" => Ok(RoundingMode::Ceil),
            "psycho" => Ok(RoundingMode::Psycho),
            other => Err(format!("Invalid rounding mode: {}", other)),
        }
    }
}

/// Artist-selected price ending for print prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundingRule {
    None,
    #[serde(rename = "END_00")]
    End00,
    #[serde(rename = "END_90")]
    End90,
    #[serde(rename = "END_99")]
    End99,
}

impl Default for RoundingRule {
    fn default() -> Self {
        RoundingRule::None
    }
}

impl fmt::Display for RoundingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingRule::None => write!(f, "NONE"),
            RoundingRule::End00 => write!(f, "END_00"),
            RoundingRule::End90 => write!(f, "END_90"),
            RoundingRule::End99 => write!(f, "END_99"),
        }
    }
}

impl FromStr for RoundingRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" | "" => Ok(RoundingRule::None),
            "END_00" => Ok(RoundingRule::End00),
            "END_90" => Ok(RoundingRule::End90),
            "END_99" => Ok(RoundingRule::End99),
            other => Err(format!("Invalid rounding rule: {}", other)),
        }
    }
}
