//! Label selectors: the string grammar used by `labelSelector` query parameters
//! and the structured `matchLabels`/`matchExpressions` form.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?)$").expect("valid regex"));
static PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("invalid label key {0:?}")]
    InvalidKey(String),
    #[error("invalid label value {0:?}")]
    InvalidValue(String),
    #[error("unable to parse requirement {0:?}")]
    Syntax(String),
    #[error("unknown operator {0:?} in label selector")]
    UnknownOperator(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    op: Operator,
    values: SmallVec<[String; 2]>,
}

impl Requirement {
    pub fn new<I, S>(key: &str, op: Operator, values: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_key(key)?;
        let values: SmallVec<[String; 2]> = values.into_iter().map(Into::into).collect();
        for v in values.iter() {
            validate_value(v)?;
        }
        let arity_ok = match op {
            Operator::Equals | Operator::NotEquals => values.len() == 1,
            Operator::In | Operator::NotIn => !values.is_empty(),
            Operator::Exists | Operator::DoesNotExist => values.is_empty(),
        };
        if !arity_ok {
            return Err(SelectorError::Syntax(key.to_string()));
        }
        Ok(Self { key: key.to_string(), op, values })
    }

    pub fn key(&self) -> &str { &self.key }
    pub fn operator(&self) -> Operator { self.op }
    pub fn values(&self) -> &[String] { &self.values }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let have = labels.get(&self.key);
        match self.op {
            Operator::Equals | Operator::In => have.map_or(false, |v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => have.map_or(true, |v| !self.values.contains(v)),
            Operator::Exists => have.is_some(),
            Operator::DoesNotExist => have.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operator::Equals => write!(f, "{}={}", self.key, self.values[0]),
            Operator::NotEquals => write!(f, "{}!={}", self.key, self.values[0]),
            Operator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// Conjunction of requirements. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn everything() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.requirements.is_empty() }

    pub fn requirements(&self) -> &[Requirement] { &self.requirements }

    pub fn push(&mut self, req: Requirement) { self.requirements.push(req); }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Convenience for optional label maps as found on object metadata.
    pub fn matches_opt(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        match labels {
            Some(l) => self.matches(l),
            None => self.matches(&BTreeMap::new()),
        }
    }

    /// Convert a structured selector. `None` selects everything.
    pub fn from_label_selector(sel: &LabelSelector) -> Result<Self, SelectorError> {
        let mut out = Selector::default();
        if let Some(ml) = sel.match_labels.as_ref() {
            for (k, v) in ml.iter() {
                out.push(Requirement::new(k, Operator::Equals, [v.as_str()])?);
            }
        }
        for expr in sel.match_expressions.iter().flatten() {
            let op = match expr.operator.as_str() {
                "In" => Operator::In,
                "NotIn" => Operator::NotIn,
                "Exists" => Operator::Exists,
                "DoesNotExist" => Operator::DoesNotExist,
                other => return Err(SelectorError::UnknownOperator(other.to_string())),
            };
            let values = expr.values.clone().unwrap_or_default();
            out.push(Requirement::new(&expr.key, op, values)?);
        }
        Ok(out)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = Selector::default();
        for term in split_terms(s) {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            out.push(parse_term(term)?);
        }
        Ok(out)
    }
}

/// Split on commas that are not inside a parenthesised value set.
fn split_terms(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

fn parse_term(term: &str) -> Result<Requirement, SelectorError> {
    if let Some(key) = term.strip_prefix('!') {
        return Requirement::new(key.trim(), Operator::DoesNotExist, Vec::<String>::new());
    }
    if let Some(open) = term.find('(') {
        let close = term.rfind(')').filter(|c| *c == term.len() - 1).ok_or_else(|| SelectorError::Syntax(term.to_string()))?;
        let head: Vec<&str> = term[..open].split_whitespace().collect();
        let (key, op) = match head.as_slice() {
            [key, "in"] => (*key, Operator::In),
            [key, "notin"] => (*key, Operator::NotIn),
            [_, other] => return Err(SelectorError::UnknownOperator((*other).to_string())),
            _ => return Err(SelectorError::Syntax(term.to_string())),
        };
        let values: Vec<String> = term[open + 1..close].split(',').map(|v| v.trim().to_string()).collect();
        return Requirement::new(key, op, values);
    }
    if let Some((k, v)) = term.split_once("!=") {
        return Requirement::new(k.trim(), Operator::NotEquals, [v.trim()]);
    }
    if let Some((k, v)) = term.split_once("==") {
        return Requirement::new(k.trim(), Operator::Equals, [v.trim()]);
    }
    if let Some((k, v)) = term.split_once('=') {
        return Requirement::new(k.trim(), Operator::Equals, [v.trim()]);
    }
    if term.contains(char::is_whitespace) {
        return Err(SelectorError::Syntax(term.to_string()));
    }
    Requirement::new(term, Operator::Exists, Vec::<String>::new())
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let (prefix, name) = match key.split_once('/') {
        Some((p, n)) => (Some(p), n),
        None => (None, key),
    };
    if let Some(p) = prefix {
        if p.is_empty() || p.len() > 253 || !PREFIX_RE.is_match(p) {
            return Err(SelectorError::InvalidKey(key.to_string()));
        }
    }
    if name.is_empty() || name.len() > 63 || !NAME_RE.is_match(name) {
        return Err(SelectorError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn validate_value(v: &str) -> Result<(), SelectorError> {
    if v.is_empty() {
        return Ok(());
    }
    if v.len() > 63 || !NAME_RE.is_match(v) {
        return Err(SelectorError::InvalidValue(v.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_equality_and_set_terms() {
        let sel: Selector = "k8s.io/group=apps, tier in (web, api),!legacy,env!=prod".parse().expect("parse");
        assert_eq!(sel.requirements().len(), 4);
        assert_eq!(sel.requirements()[1].operator(), Operator::In);
        assert_eq!(sel.requirements()[1].values(), &["web".to_string(), "api".to_string()]);
        assert_eq!(sel.to_string(), "k8s.io/group=apps,tier in (web,api),!legacy,env!=prod");
    }

    #[test]
    fn matching_follows_orchestrator_semantics() {
        let sel: Selector = "app=web,env!=prod".parse().unwrap();
        assert!(sel.matches(&labels(&[("app", "web")])));
        assert!(sel.matches(&labels(&[("app", "web"), ("env", "dev")])));
        assert!(!sel.matches(&labels(&[("app", "web"), ("env", "prod")])));
        assert!(!sel.matches(&labels(&[("env", "dev")])));

        let sel: Selector = "tier notin (db),owner".parse().unwrap();
        assert!(sel.matches(&labels(&[("owner", "x")])));
        assert!(!sel.matches(&labels(&[("owner", "x"), ("tier", "db")])));
        assert!(!sel.matches(&labels(&[])));
    }

    #[test]
    fn empty_selector_matches_everything() {
        let sel: Selector = "".parse().unwrap();
        assert!(sel.is_empty());
        assert!(sel.matches_opt(None));
    }

    #[test]
    fn rejects_malformed_terms() {
        assert!("a b".parse::<Selector>().is_err());
        assert!("k in (a".parse::<Selector>().is_err());
        assert!("k within (a)".parse::<Selector>().is_err());
        assert!("-bad=1".parse::<Selector>().is_err());
        assert!("k=bad value".parse::<Selector>().is_err());
    }

    #[test]
    fn converts_structured_selector() {
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;
        let ls = LabelSelector {
            match_labels: Some(labels(&[("app", "web")])),
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".into(),
                operator: "Exists".into(),
                values: None,
            }]),
        };
        let sel = Selector::from_label_selector(&ls).unwrap();
        assert_eq!(sel.to_string(), "app=web,tier");
        assert!(sel.matches(&labels(&[("app", "web"), ("tier", "x")])));
    }
}
