use crate::{Error, Result};
use autoprobe_ir::TestCase;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

/// What to do when no remaining test has its dependencies met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Run the stuck tests anyway, in their original order.
    #[default]
    Append,
    /// Refuse to run.
    Fail,
}

impl FromStr for CyclePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown cycle policy '{}' (append, fail)", other)),
        }
    }
}

/// A dependency is met by a test whose id contains it or that carries it as
/// a tag, on the test itself or on its flow.
fn satisfies(dependency: &str, test: &TestCase) -> bool {
    test.id.contains(dependency)
        || test.tags.iter().any(|t| t == dependency)
        || test.flow.tags.iter().any(|t| t == dependency)
}

/// Keep tests carrying any of `tags`. No tags keeps everything.
pub fn filter_by_tags(tests: Vec<TestCase>, tags: &[String]) -> Vec<TestCase> {
    if tags.is_empty() {
        return tests;
    }
    tests
        .into_iter()
        .filter(|t| t.tags.iter().any(|tag| tags.contains(tag)))
        .collect()
}

/// Order tests so each runs after the tests it depends on.
///
/// Dependencies no other test can satisfy are dropped first. Ties keep the
/// original order.
pub fn order(tests: Vec<TestCase>, policy: CyclePolicy) -> Result<Vec<TestCase>> {
    let mut pending: Vec<TestCase> = tests.clone();
    for (i, test) in pending.iter_mut().enumerate() {
        test.dependencies.retain(|dep| {
            let met = tests
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && satisfies(dep, other));
            if !met {
                warn!(
                    "Dropping dependency '{}' of '{}': no test satisfies it",
                    dep, test.id
                );
            }
            met
        });
    }

    let mut scheduled: Vec<TestCase> = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending.iter().position(|t| {
            t.dependencies
                .iter()
                .all(|dep| scheduled.iter().any(|s| satisfies(dep, s)))
        });
        match ready {
            Some(i) => {
                let test = pending.remove(i);
                debug!("scheduled {}", test.id);
                scheduled.push(test);
            }
            None => match policy {
                CyclePolicy::Append => {
                    warn!(
                        "Unresolvable dependencies; appending {} tests in original order",
                        pending.len()
                    );
                    scheduled.append(&mut pending);
                }
                CyclePolicy::Fail => {
                    return Err(Error::DependencyCycle(
                        pending.into_iter().map(|t| t.id).collect(),
                    ));
                }
            },
        }
    }
    Ok(scheduled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoprobe_ir::UserFlow;

    fn case(id: &str, deps: &[&str], tags: &[&str]) -> TestCase {
        TestCase {
            id: id.into(),
            name: id.into(),
            flow: UserFlow::new(id),
            file_path: None,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ids(tests: &[TestCase]) -> Vec<&str> {
        tests.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn dependencies_run_first() {
        let tests = vec![
            case("update-profile", &["auth"], &[]),
            case("browse", &[], &[]),
            case("sign-in", &[], &["auth", "smoke"]),
        ];
        let ordered = order(tests, CyclePolicy::Fail).unwrap();
        assert_eq!(ids(&ordered), vec!["browse", "sign-in", "update-profile"]);
    }

    #[test]
    fn flow_tags_satisfy() {
        let mut login = case("login", &[], &[]);
        login.flow.tags = vec!["auth".into()];
        let tests = vec![case("profile", &["auth"], &[]), login];

        let ordered = order(tests, CyclePolicy::Fail).unwrap();
        assert_eq!(ids(&ordered), vec!["login", "profile"]);
        assert_eq!(ordered[1].dependencies, vec!["auth"]);
    }

    #[test]
    fn id_substring_satisfies() {
        let tests = vec![
            case("checkout", &["cart"], &[]),
            case("add-to-cart", &[], &[]),
        ];
        let ordered = order(tests, CyclePolicy::Fail).unwrap();
        assert_eq!(ids(&ordered), vec!["add-to-cart", "checkout"]);
    }

    #[test]
    fn unsatisfiable_dependencies_are_dropped() {
        let tests = vec![case("a", &["missing"], &[]), case("b", &[], &[])];
        let ordered = order(tests, CyclePolicy::Fail).unwrap();
        assert_eq!(ids(&ordered), vec!["a", "b"]);
        assert!(ordered[0].dependencies.is_empty());
    }

    #[test]
    fn self_dependency_is_dropped() {
        let ordered = order(vec![case("auth-flow", &["auth"], &["auth"])], CyclePolicy::Fail).unwrap();
        assert_eq!(ids(&ordered), vec!["auth-flow"]);
    }

    #[test]
    fn cycles_follow_policy() {
        let tests = || vec![case("a", &["b"], &[]), case("b", &["a"], &[]), case("c", &[], &[])];

        let ordered = order(tests(), CyclePolicy::Append).unwrap();
        assert_eq!(ids(&ordered), vec!["c", "a", "b"]);

        match order(tests(), CyclePolicy::Fail) {
            Err(Error::DependencyCycle(stuck)) => assert_eq!(stuck, vec!["a", "b"]),
            other => panic!("expected cycle error, got {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn cycles_append_by_default() {
        let tests = vec![case("a", &["b"], &[]), case("b", &["a"], &[])];
        let ordered = order(tests, CyclePolicy::default()).unwrap();
        assert_eq!(ids(&ordered), vec!["a", "b"]);
    }

    #[test]
    fn tag_filter() {
        let tests = vec![case("a", &[], &["smoke"]), case("b", &[], &["form"])];
        assert_eq!(ids(&filter_by_tags(tests.clone(), &[])), vec!["a", "b"]);
        assert_eq!(ids(&filter_by_tags(tests, &["form".into()])), vec!["b"]);
    }

    #[test]
    fn policy_parses() {
        assert_eq!("FAIL".parse::<CyclePolicy>().unwrap(), CyclePolicy::Fail);
        assert!("later".parse::<CyclePolicy>().is_err());
    }
}
