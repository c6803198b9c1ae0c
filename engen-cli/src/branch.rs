//! Branch check helper.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::process::Command;
use tracing::{debug, warn};

const GIT_HINTS: &[&str] = &[
    "Useful git commands:",
    "  git status                  show changed files",
    "  git pull                    update the current branch",
    "  git checkout -b <branch>    start a new branch",
    "  git push -u origin <branch> publish a branch",
];

/// The git operations the helper needs.
pub trait Git {
    /// Returns the checked-out branch name.
    fn current_branch(&self) -> Result<String>;

    /// Checks out an existing branch.
    fn checkout(&self, branch: &str) -> Result<()>;
}

/// Runs the `git` binary in the working directory.
#[derive(Debug, Default)]
pub struct SystemGit;

impl SystemGit {
    fn run(args: &[&str]) -> Result<String> {
        debug!(?args, "Running git");
        let output = Command::new("git")
            .args(args)
            .output()
            .context("failed to launch git")?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Git for SystemGit {
    fn current_branch(&self) -> Result<String> {
        Self::run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        Self::run(&["checkout", branch]).map(|_| ())
    }
}

/// Prints the branch, switches to `target` if needed and prints hints.
///
/// Git failures are logged and never turn into an error.
pub fn check_branch(git: &dyn Git, target: &str, out: &mut dyn Write) -> std::io::Result<()> {
    match git.current_branch() {
        Ok(current) => {
            writeln!(out, "Current branch: {current}")?;
            if current == target {
                writeln!(out, "Already on {target}")?;
            } else {
                writeln!(out, "Switching to {target}...")?;
                if let Err(e) = git.checkout(target) {
                    warn!(error = %e, target, "Branch switch failed");
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Could not determine current branch");
            writeln!(out, "Current branch: unknown")?;
        }
    }
    writeln!(out)?;
    for line in GIT_HINTS {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeGit {
        branch: Option<&'static str>,
        checkouts: RefCell<Vec<String>>,
        fail_checkout: bool,
    }

    impl FakeGit {
        fn on(branch: Option<&'static str>) -> Self {
            Self {
                branch,
                checkouts: RefCell::new(Vec::new()),
                fail_checkout: false,
            }
        }
    }

    impl Git for FakeGit {
        fn current_branch(&self) -> Result<String> {
            match self.branch {
                Some(b) => Ok(b.to_string()),
                None => bail!("not a git repository"),
            }
        }

        fn checkout(&self, branch: &str) -> Result<()> {
            self.checkouts.borrow_mut().push(branch.to_string());
            if self.fail_checkout {
                bail!("pathspec '{branch}' did not match");
            }
            Ok(())
        }
    }

    fn run(git: &FakeGit, target: &str) -> String {
        let mut out = Vec::new();
        check_branch(git, target, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_already_on_target() {
        let git = FakeGit::on(Some("main"));
        let out = run(&git, "main");
        assert!(out.starts_with("Current branch: main\nAlready on main\n"));
        assert!(git.checkouts.borrow().is_empty());
        assert!(out.contains("git status"));
    }

    #[test]
    fn test_switches_when_mismatched() {
        let git = FakeGit::on(Some("feature/x"));
        let out = run(&git, "main");
        assert!(out.contains("Switching to main..."));
        assert_eq!(*git.checkouts.borrow(), vec!["main".to_string()]);
    }

    #[test]
    fn test_git_failures_are_not_errors() {
        let mut git = FakeGit::on(Some("dev"));
        git.fail_checkout = true;
        assert!(run(&git, "main").contains("git pull"));

        let out = run(&FakeGit::on(None), "main");
        assert!(out.starts_with("Current branch: unknown"));
    }
}
