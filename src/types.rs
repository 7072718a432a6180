// Built-in XBRL and XML Schema types, classification and literal checks
use crate::namespaces::{QualifiedName, XBRLI_NS, XS_NS};
use serde::Serialize;

/// Classification that drives item validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeClass {
    Monetary,
    Shares,
    Pure,
    /// Any other numeric type: decimal, float, double and the integer family.
    Decimal,
    Other,
}

/// A type recognised without loading a schema: the XBRL 2.1 item types, the
/// XBRL simple types behind them, and the XML Schema built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltinType {
    // xbrli item and simple types
    MonetaryItem,
    SharesItem,
    PureItem,
    FractionItem,
    Monetary,
    Shares,
    Pure,
    /// xbrli:precisionType, `INF` or a non-negative integer.
    Precision,
    /// xbrli:decimalsType, `INF` or an integer.
    Decimals,

    // Numeric
    Decimal,
    Float,
    Double,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,

    // Everything else
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NcName,
    Id,
    IdRef,
    QName,
    AnyUri,
    Boolean,
    Date,
    DateTime,
    Time,
    Duration,
    GYear,
    GYearMonth,
    GMonthDay,
    GDay,
    GMonth,
    Base64Binary,
    HexBinary,
    AnyType,
}

impl BuiltinType {
    pub fn from_qname(name: &QualifiedName) -> Option<Self> {
        if name.namespace_uri == XBRLI_NS {
            Self::from_xbrli(&name.local_name)
        } else if name.namespace_uri == XS_NS {
            Self::from_xs(&name.local_name)
        } else {
            None
        }
    }

    fn from_xbrli(local: &str) -> Option<Self> {
        use BuiltinType::*;
        Some(match local {
            "monetaryItemType" => MonetaryItem,
            "sharesItemType" => SharesItem,
            "pureItemType" => PureItem,
            "fractionItemType" => FractionItem,
            "monetary" => Monetary,
            "shares" => Shares,
            "pure" => Pure,
            "precisionType" => Precision,
            "decimalsType" => Decimals,
            "decimalItemType" => Decimal,
            "floatItemType" => Float,
            "doubleItemType" => Double,
            "integerItemType" => Integer,
            "nonNegativeIntegerItemType" => NonNegativeInteger,
            "positiveIntegerItemType" => PositiveInteger,
            "nonPositiveIntegerItemType" => NonPositiveInteger,
            "negativeIntegerItemType" => NegativeInteger,
            "longItemType" => Long,
            "intItemType" => Int,
            "shortItemType" => Short,
            "byteItemType" => Byte,
            "unsignedLongItemType" => UnsignedLong,
            "unsignedIntItemType" => UnsignedInt,
            "unsignedShortItemType" => UnsignedShort,
            "unsignedByteItemType" => UnsignedByte,
            "stringItemType" => String,
            "normalizedStringItemType" => NormalizedString,
            "tokenItemType" => Token,
            "languageItemType" => Language,
            "NameItemType" => Name,
            "NCNameItemType" => NcName,
            "QNameItemType" => QName,
            "anyURIItemType" => AnyUri,
            "booleanItemType" => Boolean,
            "dateItemType" => Date,
            "dateTimeItemType" => DateTime,
            "timeItemType" => Time,
            "durationItemType" => Duration,
            "gYearItemType" => GYear,
            "gYearMonthItemType" => GYearMonth,
            "gMonthDayItemType" => GMonthDay,
            "gDayItemType" => GDay,
            "gMonthItemType" => GMonth,
            "base64BinaryItemType" => Base64Binary,
            "hexBinaryItemType" => HexBinary,
            // xbrli:dateUnion
            "dateUnion" => DateTime,
            _ => return None,
        })
    }

    fn from_xs(local: &str) -> Option<Self> {
        use BuiltinType::*;
        Some(match local {
            "decimal" => Decimal,
            "float" => Float,
            "double" => Double,
            "integer" => Integer,
            "nonNegativeInteger" => NonNegativeInteger,
            "positiveInteger" => PositiveInteger,
            "nonPositiveInteger" => NonPositiveInteger,
            "negativeInteger" => NegativeInteger,
            "long" => Long,
            "int" => Int,
            "short" => Short,
            "byte" => Byte,
            "unsignedLong" => UnsignedLong,
            "unsignedInt" => UnsignedInt,
            "unsignedShort" => UnsignedShort,
            "unsignedByte" => UnsignedByte,
            "string" => String,
            "normalizedString" => NormalizedString,
            "token" => Token,
            "language" => Language,
            "Name" => Name,
            "NCName" => NcName,
            "ID" => Id,
            "IDREF" => IdRef,
            "QName" => QName,
            "anyURI" => AnyUri,
            "boolean" => Boolean,
            "date" => Date,
            "dateTime" => DateTime,
            "time" => Time,
            "duration" => Duration,
            "gYear" => GYear,
            "gYearMonth" => GYearMonth,
            "gMonthDay" => GMonthDay,
            "gDay" => GDay,
            "gMonth" => GMonth,
            "base64Binary" => Base64Binary,
            "hexBinary" => HexBinary,
            "anyType" | "anySimpleType" => AnyType,
            _ => return None,
        })
    }

    pub fn class(self) -> TypeClass {
        use BuiltinType::*;
        match self {
            MonetaryItem | Monetary => TypeClass::Monetary,
            SharesItem | Shares => TypeClass::Shares,
            PureItem | Pure => TypeClass::Pure,
            Decimal | Float | Double | Integer | NonNegativeInteger | PositiveInteger
            | NonPositiveInteger | NegativeInteger | Long | Int | Short | Byte | UnsignedLong
            | UnsignedInt | UnsignedShort | UnsignedByte => TypeClass::Decimal,
            _ => TypeClass::Other,
        }
    }

    /// Whether `literal` is in the lexical space of this type.
    pub fn can_convert(self, literal: &str) -> bool {
        use BuiltinType::*;
        let value = literal.trim();
        match self {
            MonetaryItem | SharesItem | PureItem | Monetary | Shares | Pure | Decimal => {
                is_decimal(value)
            }
            Float | Double => is_float(value),
            Integer | Long | Int | Short | Byte => integer_in(value, None, None),
            NonNegativeInteger | UnsignedLong | UnsignedInt | UnsignedShort | UnsignedByte => {
                integer_in(value, Some(0), None)
            }
            PositiveInteger => integer_in(value, Some(1), None),
            NonPositiveInteger => integer_in(value, None, Some(0)),
            NegativeInteger => integer_in(value, None, Some(-1)),
            Precision => value == "INF" || integer_in(value, Some(0), None),
            Decimals => value == "INF" || integer_in(value, None, None),
            Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Date => parse_date(value).is_some(),
            DateTime => parse_date_time(value).is_some() || parse_date(value).is_some(),
            Name => is_name(value, true),
            NcName | Id | IdRef => is_name(value, false),
            QName => match value.split_once(':') {
                Some((prefix, local)) => is_name(prefix, false) && is_name(local, false),
                None => is_name(value, false),
            },
            AnyUri => !value.chars().any(char::is_whitespace),
            Token | Language => !literal.contains(['\n', '\r', '\t']) && !literal.contains("  "),
            _ => true,
        }
    }
}

fn is_decimal(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    (!int.is_empty() || !frac.is_empty())
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

fn is_float(value: &str) -> bool {
    matches!(value, "INF" | "-INF" | "NaN")
        || (!value.is_empty()
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
            && value.parse::<f64>().is_ok())
}

fn integer_in(value: &str, min: Option<i128>, max: Option<i128>) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match value.parse::<i128>() {
        Ok(n) => min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m),
        // Out of range for i128 but lexically an integer
        Err(_) if value.starts_with('-') => min.is_none(),
        Err(_) => max.is_none(),
    }
}

fn is_name(value: &str, allow_colon: bool) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || (allow_colon && first == ':'))
        && chars.all(|c| {
            c.is_alphanumeric() || matches!(c, '_' | '-' | '.') || (allow_colon && c == ':')
        })
}

/// Strips an XML Schema timezone suffix (`Z` or `±hh:mm`).
fn strip_timezone(value: &str) -> &str {
    if let Some(v) = value.strip_suffix('Z') {
        return v;
    }
    if value.len() > 6 && value.is_char_boundary(value.len() - 6) {
        let (head, tail) = value.split_at(value.len() - 6);
        let tz = tail.as_bytes();
        if (tz[0] == b'+' || tz[0] == b'-') && tz[3] == b':' {
            return head;
        }
    }
    value
}

pub fn parse_date(value: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(strip_timezone(value.trim()), "%Y-%m-%d").ok()
}

pub fn parse_date_time(value: &str) -> Option<chrono::NaiveDateTime> {
    let value = strip_timezone(value.trim());
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Active ISO 4217 alphabetic currency codes, sorted for binary search.
const ISO4217_CODES: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN", "BAM", "BBD", "BDT",
    "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BOV", "BRL", "BSD", "BTN", "BWP", "BYN", "BYR",
    "BZD", "CAD", "CDF", "CHE", "CHF", "CHW", "CLF", "CLP", "CNY", "COP", "COU", "CRC", "CUC",
    "CUP", "CVE", "CZK", "DJF", "DKK", "DOP", "DZD", "EEK", "EGP", "ERN", "ETB", "EUR", "FJD",
    "FKP", "GBP", "GEL", "GHS", "GIP", "GMD", "GNF", "GTQ", "GYD", "HKD", "HNL", "HRK", "HTG",
    "HUF", "IDR", "ILS", "INR", "IQD", "IRR", "ISK", "JMD", "JOD", "JPY", "KES", "KGS", "KHR",
    "KMF", "KPW", "KRW", "KWD", "KYD", "KZT", "LAK", "LBP", "LKR", "LRD", "LSL", "LTL", "LVL",
    "LYD", "MAD", "MDL", "MGA", "MKD", "MMK", "MNT", "MOP", "MRO", "MRU", "MUR", "MVR", "MWK",
    "MXN", "MXV", "MYR", "MZN", "NAD", "NGN", "NIO", "NOK", "NPR", "NZD", "OMR", "PAB", "PEN",
    "PGK", "PHP", "PKR", "PLN", "PYG", "QAR", "RON", "RSD", "RUB", "RWF", "SAR", "SBD", "SCR",
    "SDG", "SEK", "SGD", "SHP", "SLE", "SLL", "SOS", "SRD", "SSP", "STD", "STN", "SVC", "SYP",
    "SZL", "THB", "TJS", "TMT", "TND", "TOP", "TRY", "TTD", "TWD", "TZS", "UAH", "UGX", "USD",
    "USN", "UYI", "UYU", "UYW", "UZS", "VED", "VEF", "VES", "VND", "VUV", "WST", "XAF", "XAG",
    "XAU", "XBA", "XBB", "XBC", "XBD", "XCD", "XDR", "XOF", "XPD", "XPF", "XPT", "XSU", "XTS",
    "XUA", "XXX", "YER", "ZAR", "ZMK", "ZMW", "ZWL",
];

pub fn is_iso4217_code(code: &str) -> bool {
    ISO4217_CODES.binary_search(&code).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_xbrl_item_types() {
        let monetary = QualifiedName::new(XBRLI_NS, "monetaryItemType");
        let pure = QualifiedName::new(XBRLI_NS, "pureItemType");
        let fraction = QualifiedName::new(XBRLI_NS, "fractionItemType");
        let int = QualifiedName::new(XS_NS, "int");

        assert_eq!(BuiltinType::from_qname(&monetary).map(BuiltinType::class), Some(TypeClass::Monetary));
        assert_eq!(BuiltinType::from_qname(&pure).map(BuiltinType::class), Some(TypeClass::Pure));
        assert_eq!(BuiltinType::from_qname(&fraction).map(BuiltinType::class), Some(TypeClass::Other));
        assert_eq!(BuiltinType::from_qname(&int).map(BuiltinType::class), Some(TypeClass::Decimal));
        assert!(BuiltinType::from_qname(&QualifiedName::new("http://example.com", "int")).is_none());
    }

    #[test]
    fn checks_numeric_literals() {
        assert!(BuiltinType::Decimal.can_convert("-12.50"));
        assert!(BuiltinType::Decimal.can_convert(".5"));
        assert!(!BuiltinType::Decimal.can_convert("1e3"));
        assert!(!BuiltinType::Decimal.can_convert("-"));
        assert!(BuiltinType::Double.can_convert("1e3"));
        assert!(BuiltinType::Double.can_convert("-INF"));
        assert!(!BuiltinType::Double.can_convert("infinity"));
        assert!(BuiltinType::NonNegativeInteger.can_convert("0"));
        assert!(!BuiltinType::NonNegativeInteger.can_convert("-1"));
        assert!(!BuiltinType::Integer.can_convert("1.0"));
    }

    #[test]
    fn checks_precision_and_decimals_literals() {
        assert!(BuiltinType::Precision.can_convert("INF"));
        assert!(BuiltinType::Precision.can_convert("4"));
        assert!(!BuiltinType::Precision.can_convert("-2"));
        assert!(BuiltinType::Decimals.can_convert("-3"));
        assert!(!BuiltinType::Decimals.can_convert("two"));
    }

    #[test]
    fn checks_dates_and_names() {
        assert!(BuiltinType::Date.can_convert("2023-12-31"));
        assert!(BuiltinType::Date.can_convert("2023-12-31Z"));
        assert!(!BuiltinType::Date.can_convert("2023-13-01"));
        assert!(BuiltinType::DateTime.can_convert("2023-12-31T23:59:59+02:00"));
        assert!(BuiltinType::NcName.can_convert("ctx_1"));
        assert!(!BuiltinType::NcName.can_convert("1ctx"));
        assert!(!BuiltinType::IdRef.can_convert("a:b"));
        assert!(BuiltinType::Boolean.can_convert("1"));
        assert!(!BuiltinType::Boolean.can_convert("yes"));
    }

    #[test]
    fn iso4217_table_is_sorted_and_case_sensitive() {
        assert!(ISO4217_CODES.windows(2).all(|w| w[0] < w[1]));
        assert!(is_iso4217_code("USD"));
        assert!(is_iso4217_code("EUR"));
        assert!(!is_iso4217_code("usd"));
        assert!(!is_iso4217_code("XYZ"));
    }
}
