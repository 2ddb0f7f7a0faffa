//! Rule-backed checks and their YAML definitions

use crate::rule::Rule;
use posture_core::{Check, CheckMetadata, Evidence, ProbeSpec, Verdict};
use serde::{Deserialize, Serialize};

/// A check defined in YAML format
///
/// ```yaml
/// id: ssh-max-auth-tries
/// title: Ensure SSH MaxAuthTries is set to 4 or less
/// reference: CIS 5.2.7
/// rule:
///   type: pattern
///   probes:
///     - kind: read-file
///       path: /etc/ssh/sshd_config
///   pattern: '(?im)^\s*MaxAuthTries\s+[1-4]\s*$'
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlCheckDefinition {
    #[serde(flatten)]
    pub metadata: CheckMetadata,
    pub rule: Rule,
}

/// A check whose behavior is entirely described by a `Rule`
#[derive(Debug, Clone)]
pub struct RuleCheck {
    metadata: CheckMetadata,
    rule: Rule,
}

impl RuleCheck {
    pub fn new(metadata: CheckMetadata, rule: Rule) -> Self {
        Self { metadata, rule }
    }

    /// Parse and validate a YAML check definition
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let definition: YamlCheckDefinition =
            serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
        Self::from_definition(definition)
    }

    pub fn from_definition(definition: YamlCheckDefinition) -> Result<Self, String> {
        if definition.metadata.id.trim().is_empty() {
            return Err("check id must not be empty".into());
        }
        definition.rule.validate()?;
        Ok(Self::new(definition.metadata, definition.rule))
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }
}

impl Check for RuleCheck {
    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    fn probes(&self) -> Vec<ProbeSpec> {
        self.rule.probes()
    }

    fn evaluate(&self, evidence: &[Evidence]) -> Verdict {
        self.rule.evaluate(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posture_core::{ProbeResult, VerdictStatus};

    const MAX_AUTH_TRIES: &str = r#"
id: ssh-max-auth-tries
title: "Ensure SSH MaxAuthTries is set to 4 or less"
reference: "CIS 5.2.7"
tags: [ssh]
rule:
  type: pattern
  probes:
    - kind: read-file
      path: /etc/ssh/sshd_config
  pattern: '(?im)^\s*MaxAuthTries\s+[1-4]\s*$'
"#;

    #[test]
    fn test_parse_yaml_check() {
        let check = RuleCheck::from_yaml(MAX_AUTH_TRIES).unwrap();
        assert_eq!(check.id(), "ssh-max-auth-tries");
        assert_eq!(check.metadata().reference, "CIS 5.2.7");
        assert_eq!(check.metadata().tags, vec!["ssh"]);
        assert!(check.metadata().enabled_by_default);
        assert_eq!(
            check.probes(),
            vec![ProbeSpec::read_file("/etc/ssh/sshd_config")]
        );

        let spec = check.probes().remove(0);
        let verdict = check.evaluate(&[Evidence::new(spec, ProbeResult::found("MaxAuthTries 6\n"))]);
        assert_eq!(verdict.status, VerdictStatus::Fail);
    }

    #[test]
    fn test_any_of_yaml() {
        let yaml = r#"
id: firewall-enabled
title: Ensure a host firewall is active
rule:
  type: any-of
  alternatives:
    - name: nftables
      source: { kind: service, unit: nftables }
      enabled: '(?m)^ActiveState=active$'
    - name: ufw
      source: { kind: command, program: ufw, args: [status], require_success: true }
      enabled: 'Status: active'
"#;
        let check = RuleCheck::from_yaml(yaml).unwrap();
        assert_eq!(check.probes().len(), 2);
        assert_eq!(check.metadata().reference, "");
    }

    #[test]
    fn test_file_mode_yaml_octal() {
        let yaml = r#"
id: shadow-perms
title: Ensure permissions on /etc/shadow are configured
rule:
  type: file-mode
  path: /etc/shadow
  max_mode: 640
  owner: 0
"#;
        let check = RuleCheck::from_yaml(yaml).unwrap();
        match check.rule() {
            Rule::FileMode { max_mode, owner, group, .. } => {
                assert_eq!(max_mode.0, 0o640);
                assert_eq!(*owner, Some(0));
                assert_eq!(*group, None);
            }
            other => panic!("unexpected rule {:?}", other),
        }
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let bad_regex = MAX_AUTH_TRIES.replace("[1-4]", "[1-4");
        assert!(RuleCheck::from_yaml(&bad_regex).is_err());

        let unknown_rule = "id: x\ntitle: y\nrule:\n  type: telepathy\n";
        assert!(RuleCheck::from_yaml(unknown_rule).is_err());

        let empty_id = MAX_AUTH_TRIES.replace("id: ssh-max-auth-tries", "id: ''");
        assert!(RuleCheck::from_yaml(&empty_id).is_err());
    }
}
