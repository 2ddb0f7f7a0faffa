//! Declarative evaluation rules
//!
//! A `Rule` both declares the probes a check needs and maps the resulting
//! evidence to a verdict. Evidence is consumed positionally: `evaluate`
//! receives exactly one item per spec returned by `probes`, in order.

use posture_core::{Evidence, ProbeSpec, Verdict, VerdictStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Evidence excerpts are cut to this many lines
const MAX_EVIDENCE_LINES: usize = 10;

/// Whether a pattern is required or forbidden
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expect {
    #[default]
    Present,
    Absent,
}

/// Verdict to give when none of a rule's probes produced evidence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhenMissing {
    #[default]
    Indeterminate,
    Pass,
    Fail,
}

/// Unix permission bits, written in octal (`"600"`, `"0644"` or `600`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ModeRepr", into = "String")]
pub struct Mode(pub u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<ModeRepr> for Mode {
    type Error = String;

    fn try_from(repr: ModeRepr) -> Result<Self, Self::Error> {
        let digits = match repr {
            ModeRepr::Number(n) => n.to_string(),
            ModeRepr::Text(s) => s,
        };
        Mode::parse(&digits).ok_or_else(|| format!("invalid octal mode '{}'", digits))
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> String {
        format!("{:o}", mode.0)
    }
}

impl Mode {
    pub fn parse(s: &str) -> Option<Mode> {
        let s = s.trim();
        let s = s.strip_prefix("0o").unwrap_or(s);
        if s.is_empty() {
            return None;
        }
        u32::from_str_radix(s, 8)
            .ok()
            .filter(|m| *m <= 0o7777)
            .map(Mode)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

/// One of several interchangeable tools (e.g. ufw or firewalld)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub name: String,
    pub source: ProbeSpec,
    /// Regex that indicates the tool reports itself enabled
    pub enabled: String,
}

impl Alternative {
    pub fn new(name: impl Into<String>, source: ProbeSpec, enabled: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source,
            enabled: enabled.into(),
        }
    }

    /// An alternative backed by a systemd unit being active
    pub fn service(unit: &str) -> Self {
        Self::new(unit, ProbeSpec::service(unit), r"(?m)^ActiveState=active$")
    }
}

/// Evaluation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Rule {
    /// Regex over the concatenated text of every available probe
    Pattern {
        probes: Vec<ProbeSpec>,
        pattern: String,
        #[serde(default)]
        expect: Expect,
        #[serde(default)]
        when_missing: WhenMissing,
    },

    /// Trimmed probe text must equal a value (sysctl style)
    Equals {
        probe: ProbeSpec,
        expected: String,
        #[serde(default)]
        when_missing: WhenMissing,
    },

    /// A systemd unit must be active, and optionally enabled
    ServiceActive {
        unit: String,
        #[serde(default)]
        require_enabled: bool,
    },

    /// Permission bits must not exceed `max_mode`; owner and group are numeric ids
    FileMode {
        path: String,
        max_mode: Mode,
        #[serde(default)]
        owner: Option<u32>,
        #[serde(default)]
        group: Option<u32>,
        #[serde(default)]
        when_missing: WhenMissing,
    },

    /// Pass if any present alternative is enabled
    AnyOf { alternatives: Vec<Alternative> },

    /// Kernel modules must be configured not to load and must not be loaded
    KernelModulesDisabled { modules: Vec<String> },

    /// Every sub-rule must pass
    AllOf { rules: Vec<Rule> },
}

impl Rule {
    pub fn pattern(probe: ProbeSpec, pattern: impl Into<String>) -> Self {
        Rule::Pattern {
            probes: vec![probe],
            pattern: pattern.into(),
            expect: Expect::Present,
            when_missing: WhenMissing::Indeterminate,
        }
    }

    pub fn forbid(probes: Vec<ProbeSpec>, pattern: impl Into<String>) -> Self {
        Rule::Pattern {
            probes,
            pattern: pattern.into(),
            expect: Expect::Absent,
            when_missing: WhenMissing::Indeterminate,
        }
    }

    /// Change the verdict for missing evidence on rules that support it
    pub fn when_missing(mut self, policy: WhenMissing) -> Self {
        match &mut self {
            Rule::Pattern { when_missing, .. }
            | Rule::Equals { when_missing, .. }
            | Rule::FileMode { when_missing, .. } => *when_missing = policy,
            _ => {}
        }
        self
    }

    /// Probes this rule needs, in evaluation order
    pub fn probes(&self) -> Vec<ProbeSpec> {
        match self {
            Rule::Pattern { probes, .. } => probes.clone(),
            Rule::Equals { probe, .. } => vec![probe.clone()],
            Rule::ServiceActive { unit, .. } => vec![ProbeSpec::service(unit.as_str())],
            Rule::FileMode { path, .. } => vec![ProbeSpec::file_mode(path.as_str())],
            Rule::AnyOf { alternatives } => alternatives.iter().map(|a| a.source.clone()).collect(),
            Rule::KernelModulesDisabled { modules } => {
                let mut probes: Vec<ProbeSpec> = modules
                    .iter()
                    .map(|m| ProbeSpec::command("modprobe", ["-n", "-v", m.as_str()]).with_stderr())
                    .collect();
                probes.push(ProbeSpec::read_file("/proc/modules"));
                probes
            }
            Rule::AllOf { rules } => rules.iter().flat_map(|r| r.probes()).collect(),
        }
    }

    fn probe_count(&self) -> usize {
        match self {
            Rule::Pattern { probes, .. } => probes.len(),
            Rule::Equals { .. } | Rule::ServiceActive { .. } | Rule::FileMode { .. } => 1,
            Rule::AnyOf { alternatives } => alternatives.len(),
            Rule::KernelModulesDisabled { modules } => modules.len() + 1,
            Rule::AllOf { rules } => rules.iter().map(|r| r.probe_count()).sum(),
        }
    }

    /// Check the rule is well formed (regexes compile, lists non-empty)
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Rule::Pattern { probes, pattern, .. } => {
                if probes.is_empty() {
                    return Err("pattern rule needs at least one probe".into());
                }
                compile(pattern).map(|_| ())
            }
            Rule::Equals { .. } | Rule::FileMode { .. } => Ok(()),
            Rule::ServiceActive { unit, .. } => {
                if unit.trim().is_empty() {
                    Err("service-active rule needs a unit".into())
                } else {
                    Ok(())
                }
            }
            Rule::AnyOf { alternatives } => {
                if alternatives.is_empty() {
                    return Err("any-of rule needs at least one alternative".into());
                }
                alternatives
                    .iter()
                    .try_for_each(|a| compile(&a.enabled).map(|_| ()))
            }
            Rule::KernelModulesDisabled { modules } => {
                if modules.is_empty() {
                    Err("kernel-modules-disabled rule needs at least one module".into())
                } else {
                    Ok(())
                }
            }
            Rule::AllOf { rules } => {
                if rules.is_empty() {
                    return Err("all-of rule needs at least one rule".into());
                }
                rules.iter().try_for_each(|r| r.validate())
            }
        }
    }

    /// Map evidence to a verdict
    pub fn evaluate(&self, evidence: &[Evidence]) -> Verdict {
        let expected = self.probe_count();
        if evidence.len() != expected {
            return Verdict::indeterminate(format!(
                "expected {} evidence items, got {}",
                expected,
                evidence.len()
            ));
        }

        match self {
            Rule::Pattern {
                pattern,
                expect,
                when_missing,
                ..
            } => eval_pattern(evidence, pattern, *expect, *when_missing),
            Rule::Equals {
                expected,
                when_missing,
                ..
            } => eval_equals(&evidence[0], expected, *when_missing),
            Rule::ServiceActive {
                unit,
                require_enabled,
            } => eval_service(&evidence[0], unit, *require_enabled),
            Rule::FileMode {
                path,
                max_mode,
                owner,
                group,
                when_missing,
            } => eval_file_mode(&evidence[0], path, *max_mode, *owner, *group, *when_missing),
            Rule::AnyOf { alternatives } => eval_any_of(evidence, alternatives),
            Rule::KernelModulesDisabled { modules } => eval_kernel_modules(evidence, modules),
            Rule::AllOf { rules } => eval_all_of(evidence, rules),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid pattern '{}': {}", pattern, e))
}

fn sources(evidence: &[Evidence]) -> String {
    evidence
        .iter()
        .map(|e| e.source())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Non-blank, non-comment lines, capped
fn excerpt(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .take(MAX_EVIDENCE_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

fn missing(policy: WhenMissing, what: &str) -> Verdict {
    match policy {
        WhenMissing::Indeterminate => Verdict::indeterminate(format!("{} unavailable", what)),
        WhenMissing::Pass => Verdict::pass("", format!("{} not present", what)),
        WhenMissing::Fail => Verdict::fail("", format!("{} not present", what)),
    }
}

fn eval_pattern(evidence: &[Evidence], pattern: &str, expect: Expect, policy: WhenMissing) -> Verdict {
    let what = sources(evidence);
    let texts: Vec<&str> = evidence.iter().filter_map(|e| e.result.text()).collect();
    if texts.is_empty() {
        return missing(policy, &what);
    }

    let re = match compile(pattern) {
        Ok(re) => re,
        Err(e) => return Verdict::indeterminate(e),
    };

    let joined = texts.join("\n");
    let hits: Vec<&str> = re
        .find_iter(&joined)
        .map(|m| m.as_str().trim())
        .filter(|m| !m.is_empty())
        .take(MAX_EVIDENCE_LINES)
        .collect();
    let found = re.is_match(&joined);

    match (expect, found) {
        (Expect::Present, true) => Verdict::pass(hits.join("\n"), format!("required setting found in {}", what)),
        (Expect::Present, false) => {
            Verdict::fail(excerpt(&joined), format!("required setting not found in {}", what))
        }
        (Expect::Absent, true) => {
            Verdict::fail(hits.join("\n"), format!("forbidden setting found in {}", what))
        }
        (Expect::Absent, false) => {
            Verdict::pass(excerpt(&joined), format!("no forbidden setting in {}", what))
        }
    }
}

fn eval_equals(evidence: &Evidence, expected: &str, policy: WhenMissing) -> Verdict {
    let what = evidence.source();
    match evidence.result.text() {
        None => missing(policy, &what),
        Some(text) => {
            let actual = text.trim();
            if actual == expected.trim() {
                Verdict::pass(actual, format!("{} is {}", what, expected))
            } else {
                Verdict::fail(actual, format!("{} is '{}', expected '{}'", what, actual, expected))
            }
        }
    }
}

/// Parse `Key=Value` lines from `systemctl show`
fn service_property<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim())
    })
}

fn eval_service(evidence: &Evidence, unit: &str, require_enabled: bool) -> Verdict {
    let Some(text) = evidence.result.text() else {
        return Verdict::indeterminate(format!("{} not installed or service manager unavailable", unit));
    };

    let active = service_property(text, "ActiveState").unwrap_or("unknown");
    let file_state = service_property(text, "UnitFileState").unwrap_or("unknown");
    let raw = text.trim();

    if active != "active" {
        return Verdict::fail(raw, format!("{} is {}", unit, active));
    }
    if require_enabled && file_state != "enabled" {
        return Verdict::fail(raw, format!("{} is active but {}", unit, file_state));
    }
    if require_enabled {
        Verdict::pass(raw, format!("{} is active and enabled", unit))
    } else {
        Verdict::pass(raw, format!("{} is active", unit))
    }
}

fn eval_file_mode(
    evidence: &Evidence,
    path: &str,
    max_mode: Mode,
    owner: Option<u32>,
    group: Option<u32>,
    policy: WhenMissing,
) -> Verdict {
    let Some(text) = evidence.result.text() else {
        return missing(policy, path);
    };

    let mut fields = text.split_whitespace();
    let parsed = (
        fields.next().and_then(Mode::parse),
        fields.next().and_then(|f| f.parse::<u32>().ok()),
        fields.next().and_then(|f| f.parse::<u32>().ok()),
    );
    let (Some(mode), Some(uid), Some(gid)) = parsed else {
        return Verdict::indeterminate(format!("unrecognised mode output for {}: '{}'", path, text.trim()));
    };

    let mut problems = Vec::new();
    if mode.0 & !max_mode.0 != 0 {
        problems.push(format!("mode {} is more permissive than {}", mode, max_mode));
    }
    if let Some(want) = owner {
        if uid != want {
            problems.push(format!("owner uid {} (expected {})", uid, want));
        }
    }
    if let Some(want) = group {
        if gid != want {
            problems.push(format!("group gid {} (expected {})", gid, want));
        }
    }

    let raw = format!("{} {} {} {}", path, mode, uid, gid);
    if problems.is_empty() {
        Verdict::pass(raw, format!("{} permissions are {} or stricter", path, max_mode))
    } else {
        Verdict::fail(raw, format!("{}: {}", path, problems.join("; ")))
    }
}

fn eval_any_of(evidence: &[Evidence], alternatives: &[Alternative]) -> Verdict {
    let mut present = Vec::new();

    for (alt, ev) in alternatives.iter().zip(evidence) {
        let Some(text) = ev.result.text() else {
            continue;
        };
        let re = match compile(&alt.enabled) {
            Ok(re) => re,
            Err(e) => return Verdict::indeterminate(e),
        };
        if re.is_match(text) {
            let hit = re.find(text).map(|m| m.as_str().trim()).unwrap_or_default();
            return Verdict::pass(
                format!("{}: {}", alt.name, hit),
                format!("{} reports enabled", alt.name),
            );
        }
        present.push((alt.name.as_str(), excerpt(text)));
    }

    if present.is_empty() {
        let names: Vec<&str> = alternatives.iter().map(|a| a.name.as_str()).collect();
        return Verdict::indeterminate(format!("none of {} is present", names.join(", ")));
    }

    let names: Vec<&str> = present.iter().map(|(n, _)| *n).collect();
    let evidence = present
        .iter()
        .map(|(n, text)| format!("{}: {}", n, text.replace('\n', " ")))
        .collect::<Vec<_>>()
        .join("\n");
    Verdict::fail(evidence, format!("{} present but not enabled", names.join(", ")))
}

fn eval_kernel_modules(evidence: &[Evidence], modules: &[String]) -> Verdict {
    let (per_module, loaded_ev) = evidence.split_at(modules.len());
    let loaded_text = loaded_ev.first().and_then(|e| e.result.text()).unwrap_or("");
    let install_stub = Regex::new(r"install\s+\S*/(true|false)\b").ok();

    let mut lines = Vec::new();
    let mut failures = Vec::new();
    let mut unknown = Vec::new();

    for (module, ev) in modules.iter().zip(per_module) {
        let Some(text) = ev.result.text() else {
            unknown.push(module.as_str());
            lines.push(format!("{}: modprobe unavailable", module));
            continue;
        };

        let blocked = install_stub.as_ref().is_some_and(|re| re.is_match(text))
            || text.contains("not found");
        let loaded = loaded_text
            .lines()
            .any(|l| l.split_whitespace().next() == Some(module.as_str()));

        lines.push(format!(
            "{}: {}{}",
            module,
            text.trim().lines().next().unwrap_or("no output"),
            if loaded { " (loaded)" } else { "" }
        ));
        if !blocked || loaded {
            failures.push(module.as_str());
        }
    }

    let evidence = lines.join("\n");
    if !failures.is_empty() {
        Verdict::fail(evidence, format!("modules not disabled: {}", failures.join(", ")))
    } else if !unknown.is_empty() {
        Verdict::new(
            VerdictStatus::Indeterminate,
            evidence,
            format!("could not inspect: {}", unknown.join(", ")),
        )
    } else {
        Verdict::pass(evidence, format!("{} disabled", modules.join(", ")))
    }
}

fn eval_all_of(evidence: &[Evidence], rules: &[Rule]) -> Verdict {
    let mut offset = 0;
    let mut verdicts = Vec::with_capacity(rules.len());
    for rule in rules {
        let n = rule.probe_count();
        verdicts.push(rule.evaluate(&evidence[offset..offset + n]));
        offset += n;
    }

    let collect = |status: VerdictStatus| -> Option<Verdict> {
        let matching: Vec<&Verdict> = verdicts.iter().filter(|v| v.status == status).collect();
        if matching.is_empty() {
            return None;
        }
        Some(Verdict::new(
            status,
            matching
                .iter()
                .map(|v| v.evidence.as_str())
                .filter(|e| !e.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            matching
                .iter()
                .map(|v| v.detail.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        ))
    };

    collect(VerdictStatus::Fail)
        .or_else(|| collect(VerdictStatus::Indeterminate))
        .or_else(|| collect(VerdictStatus::Pass))
        .unwrap_or_else(|| Verdict::indeterminate("no rules"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use posture_core::ProbeResult;

    fn ev(rule: &Rule, results: Vec<ProbeResult>) -> Vec<Evidence> {
        rule.probes()
            .into_iter()
            .zip(results)
            .map(|(spec, result)| Evidence::new(spec, result))
            .collect()
    }

    fn firewall() -> Rule {
        Rule::AnyOf {
            alternatives: vec![
                Alternative::new(
                    "ufw",
                    ProbeSpec::command("ufw", ["status"]).require_success(),
                    r"(?m)^Status:\s*active",
                ),
                Alternative::service("firewalld"),
            ],
        }
    }

    #[test]
    fn test_forbidden_pattern() {
        let rule = Rule::forbid(
            vec![ProbeSpec::read_file("/etc/ssh/sshd_config")],
            r"(?im)^\s*PermitRootLogin\s+yes\b.*$",
        );

        let bad = rule.evaluate(&ev(&rule, vec![ProbeResult::found("Port 22\nPermitRootLogin yes\n")]));
        assert_eq!(bad.status, VerdictStatus::Fail);
        assert_eq!(bad.evidence, "PermitRootLogin yes");

        let good = rule.evaluate(&ev(
            &rule,
            vec![ProbeResult::found("# PermitRootLogin yes\nPermitRootLogin prohibit-password\n")],
        ));
        assert_eq!(good.status, VerdictStatus::Pass);
        assert_eq!(good.evidence, "PermitRootLogin prohibit-password");

        let gone = rule.evaluate(&ev(&rule, vec![ProbeResult::unavailable()]));
        assert_eq!(gone.status, VerdictStatus::Indeterminate);
    }

    #[test]
    fn test_missing_policy_pass() {
        let rule = Rule::forbid(
            vec![ProbeSpec::read_file("/etc/gdm3/custom.conf")],
            r"(?im)^\s*AutomaticLoginEnable\s*=\s*true\b",
        )
        .when_missing(WhenMissing::Pass);

        let verdict = rule.evaluate(&ev(&rule, vec![ProbeResult::unavailable()]));
        assert_eq!(verdict.status, VerdictStatus::Pass);
    }

    #[test]
    fn test_pattern_over_several_probes() {
        let rule = Rule::forbid(
            vec![
                ProbeSpec::read_file("/etc/sudoers"),
                ProbeSpec::read_dir("/etc/sudoers.d"),
            ],
            r"(?m)^[^#\n]*NOPASSWD.*$",
        );

        let verdict = rule.evaluate(&ev(
            &rule,
            vec![
                ProbeResult::unavailable(),
                ProbeResult::found("deploy ALL=(ALL) NOPASSWD: ALL\n"),
            ],
        ));
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert!(verdict.evidence.contains("deploy"));
    }

    #[test]
    fn test_any_of_first_enabled_passes() {
        let rule = firewall();
        let verdict = rule.evaluate(&ev(
            &rule,
            vec![
                ProbeResult::found("Status: active\n"),
                ProbeResult::unavailable(),
            ],
        ));
        assert_eq!(verdict.status, VerdictStatus::Pass);
        assert_eq!(verdict.evidence, "ufw: Status: active");
    }

    #[test]
    fn test_any_of_none_present_is_indeterminate() {
        let rule = firewall();
        let verdict = rule.evaluate(&ev(
            &rule,
            vec![ProbeResult::unavailable(), ProbeResult::unavailable()],
        ));
        assert_eq!(verdict.status, VerdictStatus::Indeterminate);
    }

    #[test]
    fn test_any_of_present_but_disabled_fails() {
        let rule = firewall();
        let verdict = rule.evaluate(&ev(
            &rule,
            vec![
                ProbeResult::unavailable(),
                ProbeResult::found("LoadState=loaded\nActiveState=inactive\nUnitFileState=disabled"),
            ],
        ));
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert!(verdict.detail.contains("firewalld"));
    }

    #[test]
    fn test_service_requires_enabled() {
        let rule = Rule::ServiceActive {
            unit: "auditd".into(),
            require_enabled: true,
        };

        let ok = rule.evaluate(&ev(
            &rule,
            vec![ProbeResult::found("LoadState=loaded\nActiveState=active\nUnitFileState=enabled")],
        ));
        assert_eq!(ok.status, VerdictStatus::Pass);

        let not_enabled = rule.evaluate(&ev(
            &rule,
            vec![ProbeResult::found("LoadState=loaded\nActiveState=active\nUnitFileState=disabled")],
        ));
        assert_eq!(not_enabled.status, VerdictStatus::Fail);

        let absent = rule.evaluate(&ev(&rule, vec![ProbeResult::unavailable()]));
        assert_eq!(absent.status, VerdictStatus::Indeterminate);
    }

    #[test]
    fn test_file_mode() {
        let rule = Rule::FileMode {
            path: "/etc/ssh/sshd_config".into(),
            max_mode: Mode(0o600),
            owner: Some(0),
            group: Some(0),
            when_missing: WhenMissing::Indeterminate,
        };

        let strict = rule.evaluate(&ev(&rule, vec![ProbeResult::found("400 0 0")]));
        assert_eq!(strict.status, VerdictStatus::Pass);

        let loose = rule.evaluate(&ev(&rule, vec![ProbeResult::found("644 0 0")]));
        assert_eq!(loose.status, VerdictStatus::Fail);
        assert!(loose.detail.contains("0644"));

        let wrong_owner = rule.evaluate(&ev(&rule, vec![ProbeResult::found("600 1000 0")]));
        assert_eq!(wrong_owner.status, VerdictStatus::Fail);

        let garbage = rule.evaluate(&ev(&rule, vec![ProbeResult::found("rw-------")]));
        assert_eq!(garbage.status, VerdictStatus::Indeterminate);
    }

    #[test]
    fn test_kernel_modules() {
        let rule = Rule::KernelModulesDisabled {
            modules: vec!["cramfs".into(), "udf".into()],
        };

        let disabled = rule.evaluate(&ev(
            &rule,
            vec![
                ProbeResult::found("install /bin/true \n"),
                ProbeResult::found("modprobe: FATAL: Module udf not found in directory /lib/modules/6.1.0\n"),
                ProbeResult::found("ext4 1000 1 - Live 0x0\n"),
            ],
        ));
        assert_eq!(disabled.status, VerdictStatus::Pass);

        let loaded = rule.evaluate(&ev(
            &rule,
            vec![
                ProbeResult::found("install /bin/true \n"),
                ProbeResult::found("insmod /lib/modules/udf.ko\n"),
                ProbeResult::found("udf 118784 0 - Live 0x0\n"),
            ],
        ));
        assert_eq!(loaded.status, VerdictStatus::Fail);
        assert!(loaded.detail.contains("udf"));
        assert!(!loaded.detail.contains("cramfs"));

        let no_modprobe = rule.evaluate(&ev(
            &rule,
            vec![
                ProbeResult::unavailable(),
                ProbeResult::unavailable(),
                ProbeResult::unavailable(),
            ],
        ));
        assert_eq!(no_modprobe.status, VerdictStatus::Indeterminate);
    }

    #[test]
    fn test_all_of_fail_dominates() {
        let rule = Rule::AllOf {
            rules: vec![
                Rule::pattern(ProbeSpec::read_file("/etc/pam.d/common-password"), r"retry=3"),
                Rule::pattern(ProbeSpec::read_file("/etc/pam.d/common-password"), r"minlen=14"),
            ],
        };
        assert_eq!(rule.probes().len(), 2);

        let text = "password requisite pam_pwquality.so retry=3";
        let verdict = rule.evaluate(&ev(
            &rule,
            vec![ProbeResult::found(text), ProbeResult::found(text)],
        ));
        assert_eq!(verdict.status, VerdictStatus::Fail);
    }

    #[test]
    fn test_evidence_count_mismatch() {
        let rule = firewall();
        let verdict = rule.evaluate(&[]);
        assert_eq!(verdict.status, VerdictStatus::Indeterminate);
    }

    #[test]
    fn test_validate_rejects_bad_regex() {
        let rule = Rule::pattern(ProbeSpec::read_file("/etc/motd"), "(unclosed");
        assert!(rule.validate().is_err());
        assert!(Rule::AnyOf { alternatives: vec![] }.validate().is_err());
        assert!(firewall().validate().is_ok());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(Mode::parse("600"), Some(Mode(0o600)));
        assert_eq!(Mode::parse("0644"), Some(Mode(0o644)));
        assert_eq!(Mode::parse("0o755"), Some(Mode(0o755)));
        assert_eq!(Mode::parse("9"), None);
        assert_eq!(Mode(0o600).to_string(), "0600");

        let yaml: Mode = serde_yaml::from_str("600").unwrap();
        assert_eq!(yaml, Mode(0o600));
        let quoted: Mode = serde_yaml::from_str("'0640'").unwrap();
        assert_eq!(quoted, Mode(0o640));
    }
}
