//! Slurm compressed-hostlist handling.
//!
//! Slurm reports node sets in a compressed form such as
//! `gpu[01-03,07],login1,rack[1-2]n[1-4]`. Commas both separate expressions
//! and appear inside bracket groups, so splitting and expansion are
//! bracket-aware. Zero padding in range bounds is preserved.

use thiserror::Error;

/// A hostlist expression that cannot be expanded.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed hostlist expression '{0}'")]
pub struct HostlistError(String);

/// Expand a full compressed hostlist into individual node names.
pub fn expand(list: &str) -> Result<Vec<String>, HostlistError> {
    let mut nodes = Vec::new();
    for expression in split_expressions(list) {
        nodes.extend(expand_expression(expression)?);
    }
    Ok(nodes)
}

/// Split on commas that sit outside bracket groups.
pub fn split_expressions(list: &str) -> Vec<&str> {
    let mut expressions = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (index, c) in list.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                if index > start {
                    expressions.push(&list[start..index]);
                }
                start = index + 1;
            }
            _ => {}
        }
    }
    if start < list.len() {
        expressions.push(&list[start..]);
    }
    expressions
}

/// Expand one expression, e.g. `gpu[01-03,07]` or a plain name.
///
/// Multiple bracket groups multiply out left to right.
fn expand_expression(expression: &str) -> Result<Vec<String>, HostlistError> {
    let malformed = || HostlistError(expression.to_string());

    let Some(open) = expression.find('[') else {
        if expression.contains(']') {
            return Err(malformed());
        }
        return Ok(vec![expression.to_string()]);
    };

    let close = expression[open..]
        .find(']')
        .map(|offset| open + offset)
        .ok_or_else(malformed)?;

    let prefix = &expression[..open];
    let group = &expression[open + 1..close];
    let rest = &expression[close + 1..];
    if group.is_empty() {
        return Err(malformed());
    }

    let tails = expand_expression(rest).map_err(|_| malformed())?;

    let mut names = Vec::new();
    for part in group.split(',') {
        let (low, high) = match part.split_once('-') {
            Some((low, high)) => (low, high),
            None => (part, part),
        };
        if low.is_empty() || high.is_empty() {
            return Err(malformed());
        }

        let width = low.len();
        let low: u64 = low.parse().map_err(|_| malformed())?;
        let high: u64 = high.parse().map_err(|_| malformed())?;
        if high < low {
            return Err(malformed());
        }

        for number in low..=high {
            for tail in &tails {
                names.push(format!("{prefix}{number:0width$}{tail}"));
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn splits_commas_outside_brackets_only() {
        assert_eq!(
            split_expressions("gpu[01-03,07],login1,n[1,3]"),
            vec!["gpu[01-03,07]", "login1", "n[1,3]"]
        );
    }

    #[test]
    fn split_ignores_empty_segments() {
        assert_eq!(split_expressions(""), Vec::<&str>::new());
        assert_eq!(split_expressions("a,,b"), vec!["a", "b"]);
    }

    #[rstest]
    #[case("login1", vec!["login1"])]
    #[case("n[1-3]", vec!["n1", "n2", "n3"])]
    #[case("gpu[01-03]", vec!["gpu01", "gpu02", "gpu03"])]
    #[case("n[1,3,5]", vec!["n1", "n3", "n5"])]
    #[case("gpu[09-11]", vec!["gpu09", "gpu10", "gpu11"])]
    fn expands_single_expressions(#[case] input: &str, #[case] expected: Vec<&str>) {
        assert_eq!(expand(input).unwrap(), expected);
    }

    #[test]
    fn expands_mixed_lists() {
        assert_eq!(
            expand("gpu[01-02],login1").unwrap(),
            vec!["gpu01", "gpu02", "login1"]
        );
    }

    #[test]
    fn expands_cartesian_groups() {
        assert_eq!(
            expand("rack[1-2]n[1-2]").unwrap(),
            vec!["rack1n1", "rack1n2", "rack2n1", "rack2n2"]
        );
    }

    #[rstest]
    #[case("n[")]
    #[case("n]")]
    #[case("n[]")]
    #[case("n[3-1]")]
    #[case("n[a-b]")]
    #[case("n[-2]")]
    fn rejects_malformed_expressions(#[case] input: &str) {
        assert!(expand(input).is_err());
    }
}
