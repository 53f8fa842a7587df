use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named, independently invocable unit of pipeline work.
///
/// The set is closed: every operation the router can execute, the registry
/// can sequence, or a recovery table can target is a variant here. Names
/// arriving from the transport are parsed once at the boundary with
/// [`FromStr`], so everything past that point works with a checked value.
///
/// # Examples
///
/// ```
/// use pipewright::Operation;
///
/// let op: Operation = "generate-dockerfile".parse().unwrap();
/// assert_eq!(op, Operation::GenerateDockerfile);
/// assert_eq!(op.as_str(), "generate-dockerfile");
///
/// assert!("not-a-real-op".parse::<Operation>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Analyze,
    ResolveBaseImages,
    GenerateDockerfile,
    FixDockerfile,
    Build,
    Scan,
    Tag,
    Push,
    GenerateManifests,
    PrepareCluster,
    Deploy,
    Verify,
}

impl Operation {
    /// Every operation, in canonical pipeline order with recovery-only
    /// operations placed next to the step they repair.
    pub const ALL: [Operation; 12] = [
        Operation::Analyze,
        Operation::ResolveBaseImages,
        Operation::GenerateDockerfile,
        Operation::FixDockerfile,
        Operation::Build,
        Operation::Scan,
        Operation::Tag,
        Operation::Push,
        Operation::GenerateManifests,
        Operation::PrepareCluster,
        Operation::Deploy,
        Operation::Verify,
    ];

    /// Returns the stable wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Analyze => "analyze",
            Operation::ResolveBaseImages => "resolve-base-images",
            Operation::GenerateDockerfile => "generate-dockerfile",
            Operation::FixDockerfile => "fix-dockerfile",
            Operation::Build => "build",
            Operation::Scan => "scan",
            Operation::Tag => "tag",
            Operation::Push => "push",
            Operation::GenerateManifests => "generate-manifests",
            Operation::PrepareCluster => "prepare-cluster",
            Operation::Deploy => "deploy",
            Operation::Verify => "verify",
        }
    }

    /// Human description shown next to a suggested operation.
    pub fn description(&self) -> &'static str {
        match self {
            Operation::Analyze => "Analyze the repository to detect language, framework and ports",
            Operation::ResolveBaseImages => {
                "Resolve recommended base images for the detected stack"
            }
            Operation::GenerateDockerfile => "Generate a Dockerfile from the repository analysis",
            Operation::FixDockerfile => "Repair the existing Dockerfile using the last error",
            Operation::Build => "Build the container image from the Dockerfile",
            Operation::Scan => "Scan the built image for vulnerabilities",
            Operation::Tag => "Tag the built image for the target registry",
            Operation::Push => "Push the tagged image to the registry",
            Operation::GenerateManifests => "Generate Kubernetes manifests for the application",
            Operation::PrepareCluster => "Prepare the target cluster and namespace",
            Operation::Deploy => "Deploy the application to the cluster",
            Operation::Verify => "Verify the deployment is healthy and reachable",
        }
    }

    /// Parses a wire name, returning `None` for unknown identifiers.
    pub fn parse(name: &str) -> Option<Self> {
        Operation::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for Operation {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Error returned when a name does not identify a known [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl fmt::Display for UnknownOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown operation `{}`", self.0)
    }
}

impl std::error::Error for UnknownOperation {}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::parse(s).ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// Which canonical sequence a session follows.
///
/// `Custom` carries identifiers supplied by callers that this crate does
/// not know about; the registry resolves those to the default sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    /// Containerize, publish, deploy and verify.
    #[default]
    Full,
    /// Stop after the image is pushed.
    Containerize,
    Custom(String),
}

impl WorkflowKind {
    pub fn as_str(&self) -> &str {
        match self {
            WorkflowKind::Full => "full",
            WorkflowKind::Containerize => "containerize",
            WorkflowKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for WorkflowKind {
    fn from(s: &str) -> Self {
        match s {
            "full" => WorkflowKind::Full,
            "containerize" => WorkflowKind::Containerize,
            other => WorkflowKind::Custom(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_parse() {
        for op in Operation::ALL {
            assert_eq!(Operation::parse(op.as_str()), Some(op));
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = "deploy-everything".parse::<Operation>().unwrap_err();
        assert_eq!(err.to_string(), "unknown operation `deploy-everything`");
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Operation::PrepareCluster).unwrap();
        assert_eq!(json, "\"prepare-cluster\"");
        let op: Operation = serde_json::from_str("\"resolve-base-images\"").unwrap();
        assert_eq!(op, Operation::ResolveBaseImages);
    }

    #[test]
    fn test_workflow_kind_from_str() {
        assert_eq!(WorkflowKind::from("full"), WorkflowKind::Full);
        assert_eq!(WorkflowKind::from("containerize"), WorkflowKind::Containerize);
        assert_eq!(
            WorkflowKind::from("blue-green"),
            WorkflowKind::Custom("blue-green".to_string())
        );
        assert_eq!(WorkflowKind::default(), WorkflowKind::Full);
    }
}
