use bt_core::types::{BotPreferences, BotPriority, Specialization};

// ---------------------------------------------------------------------------
// SpecializationProfile
// ---------------------------------------------------------------------------

/// Static template for one specialization: display name, remote skill,
/// persona, and default preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecializationProfile {
    pub specialization: Specialization,
    pub display_name: &'static str,
    pub skill: &'static str,
    pub role: &'static str,
    pub capabilities: &'static [&'static str],
    pub schedule_minutes: u32,
    pub priority: BotPriority,
    pub max_tasks_per_cycle: u32,
}

const DEFAULT_EXCLUDES: &[&str] = &["node_modules/**", "target/**", "dist/**", ".git/**"];

impl SpecializationProfile {
    /// Preferences a freshly created bot of this specialization starts with.
    pub fn default_preferences(&self) -> BotPreferences {
        BotPreferences {
            target_paths: vec!["src/**".to_string()],
            exclude_paths: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            schedule_minutes: self.schedule_minutes,
            auto_approve: false,
            max_tasks_per_cycle: self.max_tasks_per_cycle,
            priority: self.priority,
            custom_instructions: None,
        }
    }

    pub fn capability_list(&self) -> Vec<String> {
        self.capabilities.iter().map(|s| s.to_string()).collect()
    }
}

/// Look up the template for `spec`.
pub fn profile(spec: Specialization) -> SpecializationProfile {
    use Specialization::*;

    let (display_name, skill, role, capabilities, schedule_minutes, priority): (
        &'static str,
        &'static str,
        &'static str,
        &'static [&'static str],
        u32,
        BotPriority,
    ) = match spec {
        CodeReviewer => (
            "Code Reviewer",
            "code-review",
            "Reviews changes for correctness, readability and adherence to project conventions.",
            &["code quality", "best practices", "readability"],
            30,
            BotPriority::High,
        ),
        Debugger => (
            "Debugger",
            "debug",
            "Hunts down bugs, traces root causes and proposes minimal fixes.",
            &["root cause analysis", "error tracing", "regression hunting"],
            45,
            BotPriority::High,
        ),
        Architect => (
            "Architect",
            "architecture-review",
            "Evaluates module boundaries, dependencies and long-term maintainability.",
            &["system design", "dependency analysis", "module boundaries"],
            120,
            BotPriority::Medium,
        ),
        SecurityAuditor => (
            "Security Auditor",
            "security-audit",
            "Audits code for vulnerabilities, unsafe input handling and leaked secrets.",
            &["vulnerability scanning", "input validation", "secret detection"],
            60,
            BotPriority::Critical,
        ),
        TestWriter => (
            "Test Writer",
            "test-generation",
            "Finds untested behaviour and writes focused tests for it.",
            &["unit tests", "integration tests", "coverage analysis"],
            60,
            BotPriority::Medium,
        ),
        Documenter => (
            "Documenter",
            "documentation",
            "Keeps API docs, READMEs and inline comments accurate.",
            &["api docs", "readme maintenance", "usage examples"],
            120,
            BotPriority::Low,
        ),
        PerformanceOptimizer => (
            "Performance Optimizer",
            "performance-analysis",
            "Spots hot paths, needless allocations and slow queries.",
            &["profiling", "allocation analysis", "algorithmic complexity"],
            90,
            BotPriority::Medium,
        ),
        Refactorer => (
            "Refactorer",
            "refactor",
            "Simplifies tangled code without changing behaviour.",
            &["code simplification", "duplication removal", "naming"],
            90,
            BotPriority::Low,
        ),
        Ceo => (
            "CEO",
            "task-delegation",
            "Breaks a goal into subtasks, assigns them to the team and synthesizes the results.",
            &["planning", "task decomposition", "synthesis"],
            240,
            BotPriority::High,
        ),
    };

    SpecializationProfile {
        specialization: spec,
        display_name,
        skill,
        role,
        capabilities,
        schedule_minutes,
        priority,
        max_tasks_per_cycle: 5,
    }
}

// ---------------------------------------------------------------------------
// Affinity
// ---------------------------------------------------------------------------

/// Specializations that preferentially respond to a report from `spec`,
/// most preferred first.
pub fn affinity(spec: Specialization) -> &'static [Specialization] {
    use Specialization::*;

    match spec {
        CodeReviewer => &[Debugger, Architect, SecurityAuditor],
        Debugger => &[CodeReviewer, TestWriter],
        Architect => &[CodeReviewer, PerformanceOptimizer, Refactorer],
        SecurityAuditor => &[CodeReviewer, Architect],
        TestWriter => &[Debugger, CodeReviewer],
        Documenter => &[Architect, CodeReviewer],
        PerformanceOptimizer => &[Architect, Debugger],
        Refactorer => &[CodeReviewer, Architect, TestWriter],
        Ceo => &[Architect, CodeReviewer],
    }
}
