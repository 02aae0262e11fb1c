//! Placeholder substitution for the starting config path.
//!
//! `{N}` takes the Nth spec segment, `{name}` takes a caller-supplied
//! variable, `{{` and `}}` are literal braces. Segments consumed by position
//! are removed from what remains for traversal.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ResolveError;

/// Result of filling a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub path: String,
    /// Spec segments not referenced by position, in their original order.
    pub remaining: Vec<String>,
}

pub fn substitute(
    template: &str,
    segments: &[String],
    vars: &BTreeMap<String, String>,
) -> Result<Substituted, ResolveError> {
    let mut path = String::with_capacity(template.len());
    let mut used = BTreeSet::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                path.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                path.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => key.push(k),
                        None => {
                            return Err(ResolveError::unresolved(
                                template,
                                "unterminated placeholder in config path",
                            ));
                        }
                    }
                }
                path.push_str(lookup(template, &key, segments, vars, &mut used)?);
            }
            other => path.push(other),
        }
    }

    let remaining = segments
        .iter()
        .enumerate()
        .filter(|(i, _)| !used.contains(i))
        .map(|(_, s)| s.clone())
        .collect();
    Ok(Substituted { path, remaining })
}

fn lookup<'a>(
    template: &str,
    key: &str,
    segments: &'a [String],
    vars: &'a BTreeMap<String, String>,
    used: &mut BTreeSet<usize>,
) -> Result<&'a str, ResolveError> {
    if let Ok(index) = key.parse::<usize>() {
        let segment = segments.get(index).ok_or_else(|| {
            ResolveError::unresolved(
                template,
                format!("spec has no segment {index} (only {})", segments.len()),
            )
        })?;
        used.insert(index);
        return Ok(segment);
    }
    vars.get(key)
        .map(String::as_str)
        .ok_or_else(|| ResolveError::unresolved(template, format!("no value for {{{key}}}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn consumes_positional_segments() {
        let out = substitute("/cfg/{0}/repo.yaml", &segs(&["alice", "repo"]), &BTreeMap::new())
            .unwrap();
        assert_eq!(out.path, "/cfg/alice/repo.yaml");
        assert_eq!(out.remaining, segs(&["repo"]));
    }

    #[test]
    fn out_of_order_positions_keep_remaining_order() {
        let out = substitute("/cfg/{2}/{0}", &segs(&["a", "b", "c", "d"]), &BTreeMap::new())
            .unwrap();
        assert_eq!(out.path, "/cfg/c/a");
        assert_eq!(out.remaining, segs(&["b", "d"]));
    }

    #[test]
    fn repeated_position_consumed_once() {
        let out = substitute("/{0}/{0}", &segs(&["a", "b"]), &BTreeMap::new()).unwrap();
        assert_eq!(out.path, "/a/a");
        assert_eq!(out.remaining, segs(&["b"]));
    }

    #[test]
    fn named_variables_do_not_consume_segments() {
        let vars = BTreeMap::from([("user".to_string(), "bob".to_string())]);
        let out = substitute("/cfg/{user}", &segs(&["x"]), &vars).unwrap();
        assert_eq!(out.path, "/cfg/bob");
        assert_eq!(out.remaining, segs(&["x"]));
    }

    #[test]
    fn literal_braces() {
        let out = substitute("/cfg/{{0}}", &segs(&["x"]), &BTreeMap::new()).unwrap();
        assert_eq!(out.path, "/cfg/{0}");
        assert_eq!(out.remaining, segs(&["x"]));
    }

    #[test]
    fn missing_segment_fails() {
        let err = substitute("/cfg/{1}", &segs(&["x"]), &BTreeMap::new()).unwrap_err();
        assert_eq!(err.kind(), "path_resolution_failure");
    }

    #[test]
    fn unknown_variable_fails() {
        assert!(substitute("/cfg/{user}", &[], &BTreeMap::new()).is_err());
    }

    #[test]
    fn unterminated_placeholder_fails() {
        assert!(substitute("/cfg/{0", &segs(&["x"]), &BTreeMap::new()).is_err());
    }
}
