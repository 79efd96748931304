use crate::error::{RepositoryError, SkilletError};
use crate::types::{Repository, SkilletMetadata, SyncWarning};
use std::collections::HashSet;

/// Repository names become directory names under the repositories root, so
/// they are restricted to letters, digits, `-`, `_`, `.` and spaces, and must
/// end in a letter or digit.
pub fn validate_repository_name(name: &str) -> Result<(), RepositoryError> {
    match path_segment_problem(name) {
        Some(reason) => Err(RepositoryError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// A new skillet gets a directory named after it inside its repository, so
/// the name follows the repository name rules.
pub fn validate_skillet_name(name: &str) -> Result<(), SkilletError> {
    match path_segment_problem(name) {
        Some(reason) => Err(SkilletError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn path_segment_problem(name: &str) -> Option<String> {
    let Some(last) = name.chars().last() else {
        return Some("name is empty".to_string());
    };
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' ' | '.')))
    {
        return Some(format!("character {bad:?} is not allowed"));
    }
    if !last.is_ascii_alphanumeric() {
        return Some("name must end with a letter or digit".to_string());
    }
    if name.starts_with('.') {
        return Some("name must not start with a dot".to_string());
    }
    None
}

fn normalize_url(url: &str) -> &str {
    let url = url.trim().trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url)
}

/// Dependencies of `skillets` that no imported repository satisfies. A
/// dependency is satisfied by a repository with the same remote url on the
/// same branch.
pub fn unmet_dependencies(
    skillets: &[SkilletMetadata],
    repositories: &[Repository],
) -> Vec<SyncWarning> {
    let available: HashSet<(&str, &str)> = repositories
        .iter()
        .flat_map(|repo| {
            [
                (normalize_url(&repo.remote_url), repo.details.branch.as_str()),
                (normalize_url(&repo.details.url), repo.details.branch.as_str()),
            ]
        })
        .collect();

    let mut seen = HashSet::new();
    let mut warnings = Vec::new();
    for skillet in skillets {
        for dependency in &skillet.depends {
            let key = (normalize_url(&dependency.url), dependency.branch.as_str());
            if available.contains(&key) {
                continue;
            }
            if seen.insert((skillet.name.as_str(), key)) {
                warnings.push(SyncWarning::UnmetDependency {
                    skillet: skillet.name.clone(),
                    url: dependency.url.clone(),
                    branch: dependency.branch.clone(),
                });
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dependency, Labels, RepositoryDetails, SkilletType};
    use chrono::Utc;
    use std::path::PathBuf;

    #[test]
    fn accepts_ordinary_names() {
        assert!(validate_repository_name("skilletlib").is_ok());
        assert!(validate_repository_name("My Skillets-2.0").is_ok());
        assert!(validate_repository_name("a").is_ok());
    }

    #[test]
    fn rejects_path_like_names() {
        for name in ["", "..", "../etc", "a/b", "repo.", "repo-", ".hidden", "x\\y"] {
            assert!(
                matches!(
                    validate_repository_name(name),
                    Err(RepositoryError::InvalidName { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn skillet_names_follow_the_same_rules() {
        assert!(validate_skillet_name("panos-base_config").is_ok());
        assert!(matches!(
            validate_skillet_name("../escape"),
            Err(SkilletError::InvalidName { .. })
        ));
    }

    fn repository(url: &str, branch: &str) -> Repository {
        let now = Utc::now();
        Repository {
            name: "dep".to_string(),
            remote_url: url.to_string(),
            deploy_key_reference: None,
            details: RepositoryDetails {
                url: url.to_string(),
                branch: branch.to_string(),
                branches: vec![branch.to_string()],
                commit: None,
                status: String::new(),
                updated_at: now,
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn skillet(depends: Vec<Dependency>) -> SkilletMetadata {
        SkilletMetadata {
            name: "needs-dep".to_string(),
            label: "Needs dep".to_string(),
            description: String::new(),
            kind: SkilletType::Workflow,
            variables: Vec::new(),
            snippets: Vec::new(),
            labels: Labels::new(),
            depends,
            source_path: PathBuf::from("/tmp/r/needs-dep"),
            metadata_file: ".meta-cnc.yaml".to_string(),
        }
    }

    #[test]
    fn dependency_matches_url_and_branch() {
        let dep = Dependency {
            url: "https://github.com/org/lib.git".to_string(),
            branch: "master".to_string(),
            name: None,
        };
        let skillets = [skillet(vec![dep])];

        let met = unmet_dependencies(
            &skillets,
            &[repository("https://github.com/org/lib", "master")],
        );
        assert!(met.is_empty());

        let wrong_branch = unmet_dependencies(
            &skillets,
            &[repository("https://github.com/org/lib.git", "develop")],
        );
        assert_eq!(wrong_branch.len(), 1);
    }
}
