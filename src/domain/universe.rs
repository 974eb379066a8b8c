//! Universe selection.
//!
//! Resolves which securities a run covers: an explicit code list from
//! configuration, or everything the series source offers, narrowed by an
//! optional list of code prefixes. When a name list is available, special
//! treatment (`ST`) and delisting (`退`) names are excluded.

use crate::domain::error::RevscanError;
use crate::ports::series_source::SeriesSource;
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub codes: Vec<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Drop securities whose name marks them as special treatment or
    /// delisting. Codes without a known name are kept.
    pub fn exclude_flagged(self, names: &SecurityNames) -> Result<Universe, RevscanError> {
        let total = self.codes.len();
        let codes: Vec<String> = self
            .codes
            .into_iter()
            .filter(|code| !names.is_flagged(code))
            .collect();

        if codes.is_empty() {
            return Err(RevscanError::EmptyUniverse {
                reason: format!("all {} securities carry ST or delisting names", total),
            });
        }
        if codes.len() < total {
            info!(excluded = total - codes.len(), "excluded ST and delisting names");
        }
        Ok(Universe { codes })
    }
}

/// True for names of special-treatment (`ST`, `*ST`) or delisting securities.
pub fn is_flagged_name(name: &str) -> bool {
    name.contains("ST") || name.contains('退')
}

/// Display names by security code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityNames {
    names: HashMap<String, String>,
}

impl SecurityNames {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        SecurityNames {
            names: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    pub fn is_flagged(&self, code: &str) -> bool {
        self.get(code).is_some_and(is_flagged_name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

/// Parse a comma-separated code list, rejecting blanks and duplicates.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Parse a comma-separated prefix list. Blank input means no filter.
pub fn parse_prefixes(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_uppercase)
        .collect()
}

pub fn matches_prefix(code: &str, prefixes: &[String]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|p| code.starts_with(p.as_str()))
}

/// Resolve the universe for a run.
///
/// Codes are sorted so the same configuration always yields the same order.
pub fn resolve(
    source: &dyn SeriesSource,
    explicit: Option<&[String]>,
    prefixes: &[String],
) -> Result<Universe, RevscanError> {
    let candidates = match explicit {
        Some(codes) => codes.to_vec(),
        None => source.list_codes()?,
    };
    let total = candidates.len();

    let mut codes: Vec<String> = candidates
        .into_iter()
        .filter(|c| matches_prefix(c, prefixes))
        .collect();
    codes.sort();
    codes.dedup();

    if codes.is_empty() {
        return Err(RevscanError::EmptyUniverse {
            reason: if total == 0 {
                "no securities available".to_string()
            } else {
                format!("none of {} securities match prefixes {:?}", total, prefixes)
            },
        });
    }

    if codes.len() < total {
        info!(selected = codes.len(), total, "filtered universe by prefix");
    }

    Ok(Universe { codes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PriceSeries;

    struct ListSource(Vec<&'static str>);

    impl SeriesSource for ListSource {
        fn list_codes(&self) -> Result<Vec<String>, RevscanError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }

        fn load(&self, code: &str) -> Result<PriceSeries, RevscanError> {
            Err(RevscanError::DataSource {
                reason: format!("{code} not loaded in this test"),
            })
        }
    }

    #[test]
    fn parse_codes_basic() {
        let codes = parse_codes("600000, 000001,300750").unwrap();
        assert_eq!(codes, vec!["600000", "000001", "300750"]);
    }

    #[test]
    fn parse_codes_uppercases() {
        assert_eq!(parse_codes("sh600000").unwrap(), vec!["SH600000"]);
    }

    #[test]
    fn parse_codes_empty_token() {
        assert_eq!(parse_codes("600000,,000001"), Err(UniverseError::EmptyToken));
        assert_eq!(parse_codes(""), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn parse_codes_duplicate() {
        assert_eq!(
            parse_codes("600000,600000"),
            Err(UniverseError::DuplicateCode("600000".into()))
        );
    }

    #[test]
    fn parse_prefixes_skips_blanks() {
        assert_eq!(parse_prefixes("60, 00,"), vec!["60", "00"]);
        assert!(parse_prefixes("  ").is_empty());
    }

    #[test]
    fn matches_prefix_rules() {
        let prefixes = vec!["60".to_string(), "00".to_string()];
        assert!(matches_prefix("600000", &prefixes));
        assert!(matches_prefix("000001", &prefixes));
        assert!(!matches_prefix("300750", &prefixes));
        assert!(matches_prefix("300750", &[]));
    }

    #[test]
    fn resolve_lists_source_sorted() {
        let source = ListSource(vec!["600010", "000001", "300750"]);
        let u = resolve(&source, None, &[]).unwrap();
        assert_eq!(u.codes, vec!["000001", "300750", "600010"]);
        assert_eq!(u.count(), 3);
    }

    #[test]
    fn resolve_applies_prefixes() {
        let source = ListSource(vec!["600010", "000001", "300750"]);
        let u = resolve(&source, None, &["60".to_string()]).unwrap();
        assert_eq!(u.codes, vec!["600010"]);
    }

    #[test]
    fn resolve_prefers_explicit_codes() {
        let source = ListSource(vec!["600010"]);
        let explicit = vec!["000002".to_string()];
        let u = resolve(&source, Some(&explicit), &[]).unwrap();
        assert_eq!(u.codes, vec!["000002"]);
    }

    #[test]
    fn resolve_empty_source_is_error() {
        let source = ListSource(vec![]);
        assert!(matches!(
            resolve(&source, None, &[]),
            Err(RevscanError::EmptyUniverse { .. })
        ));
    }

    fn names() -> SecurityNames {
        SecurityNames::new([
            ("600000".to_string(), "浦发银行".to_string()),
            ("600001".to_string(), "*ST 海钢".to_string()),
            ("000002".to_string(), "退市 万科".to_string()),
            ("000003".to_string(), "华侨城A".to_string()),
        ])
    }

    #[test]
    fn flagged_names() {
        assert!(is_flagged_name("*ST 海钢"));
        assert!(is_flagged_name("ST康美"));
        assert!(is_flagged_name("退市 万科"));
        assert!(!is_flagged_name("浦发银行"));
    }

    #[test]
    fn exclude_flagged_keeps_clean_and_unknown_codes() {
        let u = Universe {
            codes: vec![
                "000002".into(),
                "000003".into(),
                "300750".into(),
                "600000".into(),
                "600001".into(),
            ],
        };
        let u = u.exclude_flagged(&names()).unwrap();
        assert_eq!(u.codes, vec!["000003", "300750", "600000"]);
    }

    #[test]
    fn exclude_flagged_all_is_empty_universe() {
        let u = Universe {
            codes: vec!["600001".into(), "000002".into()],
        };
        assert!(matches!(
            u.exclude_flagged(&names()),
            Err(RevscanError::EmptyUniverse { .. })
        ));
    }

    #[test]
    fn names_lookup() {
        let n = names();
        assert_eq!(n.get("600000"), Some("浦发银行"));
        assert_eq!(n.get("999999"), None);
        assert_eq!(n.len(), 4);
        assert!(!n.is_flagged("999999"));
    }

    #[test]
    fn resolve_no_prefix_match_is_error() {
        let source = ListSource(vec!["300750"]);
        let err = resolve(&source, None, &["60".to_string()]).unwrap_err();
        assert!(err.to_string().contains("none of 1 securities"));
    }
}
