//! Orchestrator resource quantities (`100m`, `512Mi`, `1.5`, `1e3`) held as exact
//! milli-units, plus elementwise arithmetic over resource lists.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as WireQuantity;

pub type ResourceList = BTreeMap<String, WireQuantity>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantities must match the regular expression '^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$': {0:?}")]
    Format(String),
    #[error("quantity {0:?} is out of range")]
    Overflow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    DecimalSI,
    BinarySI,
    DecimalExponent,
}

/// A parsed quantity. Equality compares the amount only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantity {
    millis: i128,
    format: Format,
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool { self.millis == other.millis }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.millis.cmp(&other.millis) }
}

const BINARY: [(&str, u32); 6] = [("Ki", 10), ("Mi", 20), ("Gi", 30), ("Ti", 40), ("Pi", 50), ("Ei", 60)];
const DECIMAL: [(&str, i32); 8] = [("n", -9), ("u", -6), ("m", -3), ("k", 3), ("M", 6), ("G", 9), ("T", 12), ("P", 15)];

impl Quantity {
    pub fn from_millis(millis: i128, format: Format) -> Self { Self { millis, format } }

    pub fn from_units(units: i64) -> Self { Self { millis: units as i128 * 1000, format: Format::DecimalSI } }

    pub fn millis(&self) -> i128 { self.millis }

    pub fn format(&self) -> Format { self.format }

    pub fn is_zero(&self) -> bool { self.millis == 0 }

    pub fn checked_add(&self, other: &Quantity) -> Option<Quantity> {
        Some(Quantity { millis: self.millis.checked_add(other.millis)?, format: self.format })
    }

    pub fn checked_scale(&self, factor: i64) -> Option<Quantity> {
        Some(Quantity { millis: self.millis.checked_mul(factor as i128)?, format: self.format })
    }

    pub fn to_wire(&self) -> WireQuantity { WireQuantity(self.to_string()) }

    pub fn from_wire(q: &WireQuantity) -> Result<Self, QuantityError> { q.0.parse() }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(QuantityError::Format(raw.to_string()));
        }
        let num_end = s.find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-')).unwrap_or(s.len());
        let (num, suffix) = s.split_at(num_end);
        let (negative, digits) = match num.as_bytes().first() {
            Some(b'-') => (true, &num[1..]),
            Some(b'+') => (false, &num[1..]),
            _ => (false, num),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if (int_part.is_empty() && frac_part.is_empty())
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(QuantityError::Format(raw.to_string()));
        }

        let overflow = || QuantityError::Overflow(raw.to_string());
        let mut mantissa: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa.checked_mul(10).and_then(|m| m.checked_add((b - b'0') as i128)).ok_or_else(overflow)?;
        }
        // value = mantissa * base^exp * 10^-frac_len, held as millis
        let (format, mult_pow2, exp) = parse_suffix(suffix).ok_or_else(|| QuantityError::Format(raw.to_string()))?;
        let frac_len = i32::try_from(frac_part.len()).map_err(|_| overflow())?;
        let pow10 = exp.checked_add(3).and_then(|p| p.checked_sub(frac_len)).ok_or_else(overflow)?;

        let mut millis = mantissa.checked_mul(1i128 << mult_pow2).ok_or_else(overflow)?;
        if pow10 >= 0 {
            let scale = 10i128.checked_pow(pow10 as u32).ok_or_else(overflow)?;
            millis = millis.checked_mul(scale).ok_or_else(overflow)?;
        } else {
            // sub-milli precision rounds up, as the orchestrator does
            millis = match 10i128.checked_pow(pow10.unsigned_abs()) {
                Some(div) => millis / div + i128::from(millis % div != 0),
                None => i128::from(millis != 0),
            };
        }
        if negative {
            millis = -millis;
        }
        Ok(Quantity { millis, format })
    }
}

/// Returns (format, binary shift, decimal exponent).
fn parse_suffix(suffix: &str) -> Option<(Format, u32, i32)> {
    if suffix.is_empty() {
        return Some((Format::DecimalSI, 0, 0));
    }
    if let Some((_, shift)) = BINARY.iter().find(|(s, _)| *s == suffix) {
        return Some((Format::BinarySI, *shift, 0));
    }
    if let Some((_, exp)) = DECIMAL.iter().find(|(s, _)| *s == suffix) {
        return Some((Format::DecimalSI, 0, *exp));
    }
    if suffix == "E" {
        return Some((Format::DecimalSI, 0, 18));
    }
    let rest = suffix.strip_prefix('e').or_else(|| suffix.strip_prefix('E'))?;
    let exp: i32 = rest.parse().ok()?;
    Some((Format::DecimalExponent, 0, exp))
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis == 0 {
            return f.write_str("0");
        }
        if self.millis % 1000 != 0 {
            return write!(f, "{}m", self.millis);
        }
        let units = self.millis / 1000;
        match self.format {
            Format::BinarySI => {
                for (suffix, shift) in BINARY.iter().rev() {
                    let base = 1i128 << shift;
                    if units % base == 0 {
                        return write!(f, "{}{}", units / base, suffix);
                    }
                }
                write!(f, "{}", units)
            }
            Format::DecimalSI | Format::DecimalExponent => {
                let mut exp = 0u32;
                let mut n = units;
                while n % 1000 == 0 && exp < 18 {
                    n /= 1000;
                    exp += 3;
                }
                match (self.format, exp) {
                    (_, 0) => write!(f, "{}", n),
                    (Format::DecimalExponent, e) => write!(f, "{}e{}", n, e),
                    (_, 18) => write!(f, "{}E", n),
                    (_, e) => {
                        let suffix = DECIMAL.iter().find(|(_, x)| *x == e as i32).map(|(s, _)| *s).unwrap_or("");
                        write!(f, "{}{}", n, suffix)
                    }
                }
            }
        }
    }
}

fn merge(a: &ResourceList, b: &ResourceList, pick: impl Fn(Quantity, Quantity) -> Option<Quantity>) -> Result<ResourceList, QuantityError> {
    let mut out = a.clone();
    for (name, qb) in b.iter() {
        let rhs = Quantity::from_wire(qb)?;
        let merged = match a.get(name) {
            Some(qa) => pick(Quantity::from_wire(qa)?, rhs).ok_or_else(|| QuantityError::Overflow(name.clone()))?,
            None => rhs,
        };
        out.insert(name.clone(), merged.to_wire());
    }
    Ok(out)
}

/// Elementwise sum; names present on one side only are carried over.
pub fn add_resource_lists(a: &ResourceList, b: &ResourceList) -> Result<ResourceList, QuantityError> {
    merge(a, b, |x, y| x.checked_add(&y))
}

/// Elementwise maximum.
pub fn max_resource_lists(a: &ResourceList, b: &ResourceList) -> Result<ResourceList, QuantityError> {
    merge(a, b, |x, y| Some(if y > x { y } else { x }))
}

pub fn scale_resource_list(list: &ResourceList, factor: i64) -> Result<ResourceList, QuantityError> {
    let mut out = ResourceList::new();
    for (name, q) in list.iter() {
        let scaled = Quantity::from_wire(q)?.checked_scale(factor).ok_or_else(|| QuantityError::Overflow(name.clone()))?;
        out.insert(name.clone(), scaled.to_wire());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity { s.parse().unwrap() }

    fn list(pairs: &[(&str, &str)]) -> ResourceList {
        pairs.iter().map(|(k, v)| (k.to_string(), WireQuantity(v.to_string()))).collect()
    }

    #[test]
    fn parses_suffix_families() {
        assert_eq!(q("100m").millis(), 100);
        assert_eq!(q("2").millis(), 2000);
        assert_eq!(q("1.5").millis(), 1500);
        assert_eq!(q("512Mi").millis(), 512 * 1024 * 1024 * 1000);
        assert_eq!(q("1G").millis(), 1_000_000_000_000);
        assert_eq!(q("1e3").millis(), 1_000_000);
        assert_eq!(q("1E").millis(), 1_000_000_000_000_000_000_000);
        assert_eq!(q("-250m").millis(), -250);
        assert_eq!(q("1n").millis(), 1);
    }

    #[test]
    fn rejects_garbage() {
        for s in ["", "abc", "1.2.3", "5Qi", "m"] {
            assert!(s.parse::<Quantity>().is_err(), "{s}");
        }
    }

    #[test]
    fn extreme_exponents_are_out_of_range() {
        assert_eq!("1.5e2147483647".parse::<Quantity>(), Err(QuantityError::Overflow("1.5e2147483647".into())));
        assert_eq!("1.5555e-2147483648".parse::<Quantity>(), Err(QuantityError::Overflow("1.5555e-2147483648".into())));
        assert!("1e2147483644".parse::<Quantity>().is_err());
        // tiny but nonzero rounds up to one milli
        assert_eq!(q("1e-2147483645").millis(), 1);
    }

    #[test]
    fn renders_in_input_family() {
        assert_eq!(q("7").to_string(), "7");
        assert_eq!(q("1500m").to_string(), "1500m");
        assert_eq!(q("2048Mi").to_string(), "2Gi");
        assert_eq!(q("1000").to_string(), "1k");
        assert_eq!(q("0.5Gi").to_string(), "512Mi");
    }

    #[test]
    fn resource_lists_add_elementwise() {
        let mut total = ResourceList::new();
        for cpu in ["1", "2", "4"] {
            total = add_resource_lists(&total, &list(&[("cpu", cpu), ("memory", "1Gi")])).unwrap();
        }
        assert_eq!(total["cpu"].0, "7");
        assert_eq!(total["memory"].0, "3Gi");
    }

    #[test]
    fn max_and_scale() {
        let m = max_resource_lists(&list(&[("cpu", "500m")]), &list(&[("cpu", "1"), ("memory", "64Mi")])).unwrap();
        assert_eq!(m["cpu"].0, "1");
        assert_eq!(m["memory"].0, "64Mi");
        let s = scale_resource_list(&list(&[("cpu", "250m")]), 4).unwrap();
        assert_eq!(s["cpu"].0, "1");
    }
}
