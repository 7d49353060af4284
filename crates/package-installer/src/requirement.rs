//! Requirement specifiers
//!
//! Splits a declared dependency such as `torch>=2.0,<3` into its
//! distribution name and version clauses so an installed version can be
//! checked against it. Environment markers are not evaluated.

use std::fmt;
use version_compare::{compare_to, Cmp};

use common::utils::requirement_name;

/// Comparison operator of one version clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Compatible,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
    Arbitrary,
}

impl Operator {
    // longest signs first so `<=` is not read as `<`
    const SIGNS: [(&'static str, Operator); 8] = [
        ("===", Operator::Arbitrary),
        ("~=", Operator::Compatible),
        ("==", Operator::Equal),
        ("!=", Operator::NotEqual),
        ("<=", Operator::LessEqual),
        (">=", Operator::GreaterEqual),
        ("<", Operator::Less),
        (">", Operator::Greater),
    ];

    fn split(clause: &str) -> Option<(Operator, &str)> {
        Self::SIGNS
            .iter()
            .find_map(|(sign, op)| clause.strip_prefix(sign).map(|rest| (*op, rest.trim())))
    }

    fn sign(&self) -> &'static str {
        Self::SIGNS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(sign, _)| *sign)
            .unwrap_or("")
    }
}

/// One `<op><version>` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub operator: Operator,
    pub version: String,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.sign(), self.version)
    }
}

/// A parsed dependency declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Distribution name passed to `show`
    pub name: String,
    /// Extras were requested, e.g. `uvicorn[standard]`
    pub extras: bool,
    /// Installed from a direct URL reference (`name @ url`)
    pub direct: bool,
    /// Version clauses, all of which must hold
    pub clauses: Vec<Clause>,
}

impl Requirement {
    /// Parses a declared dependency
    pub fn parse(dep: &str) -> Result<Self, String> {
        let without_marker = dep.split(';').next().unwrap_or(dep).trim();
        let name = requirement_name(without_marker);
        if name.is_empty() {
            return Err(format!("no distribution name in '{}'", dep));
        }

        let mut rest = without_marker[name.len()..].trim_start();
        let mut extras = false;
        if let Some(tail) = rest.strip_prefix('[') {
            let close = tail
                .find(']')
                .ok_or_else(|| format!("unclosed extras in '{}'", dep))?;
            extras = true;
            rest = tail[close + 1..].trim_start();
        }

        if rest.starts_with('@') {
            return Ok(Self {
                name: name.to_string(),
                extras,
                direct: true,
                clauses: Vec::new(),
            });
        }

        let rest = rest.trim_start_matches('(').trim_end_matches(')').trim();
        let mut clauses = Vec::new();
        for clause in rest.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (operator, version) =
                Operator::split(clause).ok_or_else(|| format!("invalid version clause '{}'", clause))?;
            if version.is_empty() {
                return Err(format!("missing version in clause '{}'", clause));
            }
            clauses.push(Clause {
                operator,
                version: version.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            extras,
            direct: false,
            clauses,
        })
    }

    /// Returns true when an installed copy alone cannot prove the
    /// requirement is met
    pub fn needs_install_check(&self) -> bool {
        self.extras || self.direct
    }

    /// Checks an installed version against every clause
    pub fn satisfied_by(&self, installed: &str) -> Result<bool, String> {
        for clause in &self.clauses {
            if !clause_holds(clause, installed)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Clauses joined back into a specifier
    pub fn specifier(&self) -> String {
        self.clauses
            .iter()
            .map(Clause::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn clause_holds(clause: &Clause, installed: &str) -> Result<bool, String> {
    let wanted = clause.version.as_str();
    match clause.operator {
        Operator::Arbitrary => Ok(installed == wanted),
        Operator::Equal if wanted.ends_with(".*") => Ok(release_prefix_matches(installed, &wanted[..wanted.len() - 2])),
        Operator::NotEqual if wanted.ends_with(".*") => {
            Ok(!release_prefix_matches(installed, &wanted[..wanted.len() - 2]))
        }
        Operator::Compatible => {
            // ~=2.2 means >=2.2 and ==2.*
            let (prefix, _) = wanted
                .rsplit_once('.')
                .ok_or_else(|| format!("'~={}' needs at least two release segments", wanted))?;
            Ok(compare(installed, wanted, Cmp::Ge)? && release_prefix_matches(installed, prefix))
        }
        Operator::Equal => compare(installed, wanted, Cmp::Eq),
        Operator::NotEqual => compare(installed, wanted, Cmp::Ne),
        Operator::LessEqual => compare(installed, wanted, Cmp::Le),
        Operator::GreaterEqual => compare(installed, wanted, Cmp::Ge),
        Operator::Less => compare(installed, wanted, Cmp::Lt),
        Operator::Greater => compare(installed, wanted, Cmp::Gt),
    }
}

fn compare(installed: &str, wanted: &str, cmp: Cmp) -> Result<bool, String> {
    compare_to(installed, wanted, cmp).map_err(|_| format!("cannot compare version '{}' with '{}'", installed, wanted))
}

fn release_prefix_matches(installed: &str, prefix: &str) -> bool {
    installed == prefix || installed.starts_with(&format!("{}.", prefix))
}

/// Extracts the `Version:` field from `show` output
pub fn shown_version(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Version:"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
