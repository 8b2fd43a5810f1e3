// Runtime introspection
//
// Everything here is computed once at startup and never changes afterwards.

use std::env;
use std::fmt;
use std::str::FromStr;

/// Environment variables that mark a CI run when set to a truthy value
const CI_ENV_VARS: &[&str] = &[
    "CI",
    "CONTINUOUS_INTEGRATION",
    "BUILD_NUMBER",
    "RUN_ID",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "TRAVIS",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
    "TEAMCITY_VERSION",
    "BITBUCKET_BUILD_NUMBER",
    "CODEBUILD_BUILD_ID",
    "DRONE",
];

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsKind {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl OsKind {
    /// The OS this binary was built for
    pub fn current() -> Self {
        Self::from_os(env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value to an OS family
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => OsKind::Linux,
            "macos" => OsKind::MacOs,
            "windows" => OsKind::Windows,
            _ => OsKind::Other,
        }
    }

    /// Short OS name reported as a tag
    pub fn as_str(&self) -> &'static str {
        match self {
            OsKind::Linux => "Linux",
            OsKind::MacOs => "Darwin",
            OsKind::Windows => "Windows_NT",
            OsKind::Other => "Unknown",
        }
    }

    /// Platform token in the form analytics user-agent parsers expect.
    ///
    /// Only the family is meaningful; the version numbers are fixed.
    pub fn user_agent_platform(&self) -> &'static str {
        match self {
            OsKind::Windows => "(Windows NT 6.1; Win64; x64)",
            OsKind::MacOs => "(Macintosh; Intel Mac OS X 10_13_6)",
            OsKind::Linux => "(X11; Linux x86_64)",
            OsKind::Other => "(Unknown)",
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How Smelter itself is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Installed as a regular dependency
    #[default]
    Installed,
    /// Linked from a local checkout (someone is working on Smelter)
    Linked,
    /// Smelter's own test suite
    SelfTest,
}

impl ExecutionMode {
    /// Runs that exercise Smelter itself are never reported
    pub fn is_local_dev(&self) -> bool {
        matches!(self, ExecutionMode::Linked | ExecutionMode::SelfTest)
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "installed" | "" => Ok(ExecutionMode::Installed),
            "linked" => Ok(ExecutionMode::Linked),
            "self-test" | "self_test" | "test" => Ok(ExecutionMode::SelfTest),
            other => Err(format!("unknown execution mode: {}", other)),
        }
    }
}

/// Check CI markers through an arbitrary variable lookup
pub fn is_ci_with(lookup: impl Fn(&str) -> Option<String>) -> bool {
    CI_ENV_VARS.iter().copied().any(|var| match lookup(var) {
        Some(value) => {
            let value = value.trim();
            !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
        }
        None => false,
    })
}

/// Immutable snapshot of the runtime Smelter is executing in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub os: OsKind,
    pub arch: &'static str,
    pub user_agent: String,
    pub is_ci: bool,
    pub tool_version: String,
}

impl Environment {
    /// Detect the environment of the current process
    pub fn detect(tool_version: impl Into<String>) -> Self {
        Self::detect_with(tool_version, |var| env::var(var).ok())
    }

    /// Detect the environment through an arbitrary variable lookup
    pub fn detect_with(
        tool_version: impl Into<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let os = OsKind::current();
        Self {
            os,
            arch: env::consts::ARCH,
            user_agent: user_agent(os),
            is_ci: is_ci_with(lookup),
            tool_version: tool_version.into(),
        }
    }
}

/// User agent reported to analytics services
pub fn user_agent(os: OsKind) -> String {
    format!(
        "smelter-analytics/{} {}",
        env!("CARGO_PKG_VERSION"),
        os.user_agent_platform()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_ci_detection() {
        assert!(is_ci_with(lookup(&[("CI", "true")])));
        assert!(is_ci_with(lookup(&[("GITHUB_ACTIONS", "true")])));
        assert!(is_ci_with(lookup(&[("BUILD_NUMBER", "42")])));
        assert!(!is_ci_with(lookup(&[])));
        assert!(!is_ci_with(lookup(&[("CI", "false")])));
        assert!(!is_ci_with(lookup(&[("CI", "")])));
    }

    #[test]
    fn test_os_mapping() {
        assert_eq!(OsKind::from_os("linux"), OsKind::Linux);
        assert_eq!(OsKind::from_os("macos"), OsKind::MacOs);
        assert_eq!(OsKind::from_os("windows"), OsKind::Windows);
        assert_eq!(OsKind::from_os("freebsd"), OsKind::Other);
        assert_eq!(OsKind::Linux.user_agent_platform(), "(X11; Linux x86_64)");
    }

    #[test]
    fn test_execution_mode_parsing() {
        assert_eq!("linked".parse::<ExecutionMode>(), Ok(ExecutionMode::Linked));
        assert_eq!("SELF-TEST".parse::<ExecutionMode>(), Ok(ExecutionMode::SelfTest));
        assert_eq!("".parse::<ExecutionMode>(), Ok(ExecutionMode::Installed));
        assert!("sideways".parse::<ExecutionMode>().is_err());

        assert!(ExecutionMode::Linked.is_local_dev());
        assert!(ExecutionMode::SelfTest.is_local_dev());
        assert!(!ExecutionMode::Installed.is_local_dev());
    }

    #[test]
    fn test_detect_with() {
        let env = Environment::detect_with("Smelter 1.0.0", lookup(&[("CI", "1")]));
        assert!(env.is_ci);
        assert_eq!(env.tool_version, "Smelter 1.0.0");
        assert!(env.user_agent.starts_with("smelter-analytics/"));
        assert!(env.user_agent.ends_with(env.os.user_agent_platform()));
    }
}
