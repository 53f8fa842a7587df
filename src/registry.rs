//! Static description of the pipeline: which operations run in what order,
//! what each one depends on, and where to go when one fails.

use std::fmt;

use crate::operation::{Operation, WorkflowKind};
use crate::session::Session;

/// Predicate over session history deciding whether a recovery candidate
/// applies.
///
/// Guards are plain function pointers: they cannot capture state, and they
/// must not perform I/O or fail.
pub type Guard = fn(&Session) -> bool;

/// One conditional fallback for a failed operation.
#[derive(Clone, Copy)]
pub struct RecoveryCandidate {
    pub target: Operation,
    /// `None` means the candidate always applies.
    pub guard: Option<Guard>,
    /// Why this target is offered, shown to the caller.
    pub reason: &'static str,
}

impl RecoveryCandidate {
    pub const fn always(target: Operation, reason: &'static str) -> Self {
        Self {
            target,
            guard: None,
            reason,
        }
    }

    pub const fn when(target: Operation, guard: Guard, reason: &'static str) -> Self {
        Self {
            target,
            guard: Some(guard),
            reason,
        }
    }

    pub fn applies_to(&self, session: &Session) -> bool {
        self.guard.map_or(true, |guard| guard(session))
    }
}

impl fmt::Debug for RecoveryCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryCandidate")
            .field("target", &self.target)
            .field("guarded", &self.guard.is_some())
            .field("reason", &self.reason)
            .finish()
    }
}

/// Lookup tables consulted by the progression engine and the router.
///
/// [`StandardRegistry`] is the production table. The trait exists so tests
/// and embedders can substitute their own sequences and recovery rules.
pub trait StepRegistry: Send + Sync {
    /// The canonical sequence for a workflow kind. Never fails: unknown
    /// kinds get the default sequence.
    fn sequence_for(&self, kind: &WorkflowKind) -> &[Operation];

    /// Ordered recovery candidates for a failed operation, or `None` when
    /// the operation has no table of its own.
    fn recovery_for(&self, op: Operation) -> Option<&[RecoveryCandidate]>;

    /// Direct prerequisites of an operation, in declaration order.
    fn prerequisites_of(&self, op: Operation) -> &[Operation];

    /// The first step of the default sequence, used as the fallback
    /// recovery target.
    fn first_step(&self) -> Operation {
        self.sequence_for(&WorkflowKind::default())
            .first()
            .copied()
            .unwrap_or(Operation::Analyze)
    }

    /// Transitive prerequisites of `op`, dependencies first.
    ///
    /// Computed as a depth-first post-order walk over
    /// [`prerequisites_of`](Self::prerequisites_of), so the result is
    /// deterministic and every operation appears after everything it
    /// depends on. `op` itself is not included.
    fn closure_of(&self, op: Operation) -> Vec<Operation> {
        let mut ordered = Vec::new();
        let mut visiting = Vec::new();
        for prerequisite in self.prerequisites_of(op) {
            visit(self, *prerequisite, &mut visiting, &mut ordered);
        }
        ordered.retain(|candidate| *candidate != op);
        ordered
    }
}

fn visit<R: StepRegistry + ?Sized>(
    registry: &R,
    op: Operation,
    visiting: &mut Vec<Operation>,
    ordered: &mut Vec<Operation>,
) {
    // `visiting` guards against cycles in hand-written registries.
    if ordered.contains(&op) || visiting.contains(&op) {
        return;
    }
    visiting.push(op);
    for prerequisite in registry.prerequisites_of(op) {
        visit(registry, *prerequisite, visiting, ordered);
    }
    visiting.pop();
    ordered.push(op);
}

/// Default sequence: containerize, publish, deploy and verify.
pub const FULL_SEQUENCE: &[Operation] = &[
    Operation::Analyze,
    Operation::ResolveBaseImages,
    Operation::GenerateDockerfile,
    Operation::Build,
    Operation::Scan,
    Operation::Tag,
    Operation::Push,
    Operation::GenerateManifests,
    Operation::PrepareCluster,
    Operation::Deploy,
    Operation::Verify,
];

/// Stops once the image is pushed.
pub const CONTAINERIZE_SEQUENCE: &[Operation] = &[
    Operation::Analyze,
    Operation::ResolveBaseImages,
    Operation::GenerateDockerfile,
    Operation::Build,
    Operation::Scan,
    Operation::Tag,
    Operation::Push,
];

fn dockerfile_fix_not_tried(session: &Session) -> bool {
    !session.attempted(Operation::FixDockerfile)
}

fn base_images_unresolved(session: &Session) -> bool {
    !session.has_result(Operation::ResolveBaseImages)
}

/// Regenerating manifests twice in a row did not help deploy; every third
/// consecutive deploy failure switches to the Dockerfile instead.
fn manifests_exhausted(session: &Session) -> bool {
    let failures = session.failure_count(Operation::Deploy);
    failures > 0 && failures % 3 == 0
}

const BUILD_RECOVERY: &[RecoveryCandidate] = &[
    RecoveryCandidate::when(
        Operation::FixDockerfile,
        dockerfile_fix_not_tried,
        "Build failures usually point at the Dockerfile; repair it in place",
    ),
    RecoveryCandidate::always(
        Operation::GenerateDockerfile,
        "The Dockerfile fix did not stick; regenerate it from the analysis",
    ),
];

const SCAN_RECOVERY: &[RecoveryCandidate] = &[
    RecoveryCandidate::when(
        Operation::FixDockerfile,
        dockerfile_fix_not_tried,
        "Vulnerabilities usually come from the base image or packages; repair the Dockerfile",
    ),
    RecoveryCandidate::always(
        Operation::GenerateDockerfile,
        "Regenerate the Dockerfile with a different base image",
    ),
];

const FIX_DOCKERFILE_RECOVERY: &[RecoveryCandidate] = &[RecoveryCandidate::always(
    Operation::GenerateDockerfile,
    "The Dockerfile could not be repaired; regenerate it",
)];

const GENERATE_DOCKERFILE_RECOVERY: &[RecoveryCandidate] = &[RecoveryCandidate::when(
    Operation::ResolveBaseImages,
    base_images_unresolved,
    "Resolve base images before generating the Dockerfile again",
)];

const RESOLVE_BASE_IMAGES_RECOVERY: &[RecoveryCandidate] = &[RecoveryCandidate::always(
    Operation::Analyze,
    "Base image resolution depends on the repository analysis; re-analyze",
)];

const TAG_RECOVERY: &[RecoveryCandidate] = &[RecoveryCandidate::always(
    Operation::Build,
    "Tagging needs a valid local image; rebuild it",
)];

const PUSH_RECOVERY: &[RecoveryCandidate] = &[RecoveryCandidate::always(
    Operation::Build,
    "Push failures may indicate image issues; rebuild the image",
)];

const DEPLOY_RECOVERY: &[RecoveryCandidate] = &[
    RecoveryCandidate::when(
        Operation::GenerateDockerfile,
        manifests_exhausted,
        "Regenerated manifests keep failing to deploy; the container itself may be at fault",
    ),
    RecoveryCandidate::always(
        Operation::GenerateManifests,
        "Deployment failures often indicate manifest issues; regenerate them",
    ),
];

const VERIFY_RECOVERY: &[RecoveryCandidate] = &[RecoveryCandidate::always(
    Operation::Deploy,
    "Verification failures may indicate deployment issues; redeploy",
)];

const NO_RECOVERY: &[RecoveryCandidate] = &[];

/// The production registry for the containerization pipeline.
///
/// Every table is an exhaustive `match` over [`Operation`], so a new
/// operation does not compile until its sequence position, prerequisites
/// and recovery policy have been decided.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRegistry;

impl StepRegistry for StandardRegistry {
    fn sequence_for(&self, kind: &WorkflowKind) -> &[Operation] {
        match kind {
            WorkflowKind::Full | WorkflowKind::Custom(_) => FULL_SEQUENCE,
            WorkflowKind::Containerize => CONTAINERIZE_SEQUENCE,
        }
    }

    fn recovery_for(&self, op: Operation) -> Option<&[RecoveryCandidate]> {
        match op {
            Operation::Analyze | Operation::GenerateManifests => None,
            Operation::ResolveBaseImages => Some(RESOLVE_BASE_IMAGES_RECOVERY),
            Operation::GenerateDockerfile => Some(GENERATE_DOCKERFILE_RECOVERY),
            Operation::FixDockerfile => Some(FIX_DOCKERFILE_RECOVERY),
            Operation::Build => Some(BUILD_RECOVERY),
            Operation::Scan => Some(SCAN_RECOVERY),
            Operation::Tag => Some(TAG_RECOVERY),
            Operation::Push => Some(PUSH_RECOVERY),
            Operation::PrepareCluster => Some(NO_RECOVERY),
            Operation::Deploy => Some(DEPLOY_RECOVERY),
            Operation::Verify => Some(VERIFY_RECOVERY),
        }
    }

    fn prerequisites_of(&self, op: Operation) -> &[Operation] {
        match op {
            Operation::Analyze | Operation::PrepareCluster => &[],
            Operation::ResolveBaseImages
            | Operation::GenerateDockerfile
            | Operation::GenerateManifests => &[Operation::Analyze],
            Operation::FixDockerfile | Operation::Build => &[Operation::GenerateDockerfile],
            Operation::Scan | Operation::Tag => &[Operation::Build],
            Operation::Push => &[Operation::Tag],
            Operation::Deploy => &[
                Operation::Push,
                Operation::GenerateManifests,
                Operation::PrepareCluster,
            ],
            Operation::Verify => &[Operation::Deploy],
        }
    }
}
