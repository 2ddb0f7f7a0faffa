//! Built-in Linux check catalogue (CIS-derived)

use crate::rule::{Alternative, Mode, Rule, WhenMissing};
use crate::yaml_check::RuleCheck;
use posture_core::{CheckMetadata, ProbeSpec};

const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
const COMMON_PASSWORD: &str = "/etc/pam.d/common-password";

/// Built-in checks for Linux hosts, in report order
pub fn linux_checks() -> Vec<RuleCheck> {
    vec![
        RuleCheck::new(
            CheckMetadata::new("ssh-root-login", "Ensure SSH root login is disabled")
                .with_reference("CIS 5.2.10")
                .with_description("PermitRootLogin must not be set to yes in sshd_config")
                .with_tag("ssh"),
            Rule::forbid(
                vec![ProbeSpec::read_file(SSHD_CONFIG)],
                r"(?im)^[ \t]*PermitRootLogin[ \t]+yes\b.*$",
            ),
        ),
        RuleCheck::new(
            CheckMetadata::new(
                "ssh-config-permissions",
                "Ensure permissions on /etc/ssh/sshd_config are configured",
            )
            .with_reference("CIS 5.2.1")
            .with_tag("ssh"),
            Rule::FileMode {
                path: SSHD_CONFIG.into(),
                max_mode: Mode(0o600),
                owner: Some(0),
                group: Some(0),
                when_missing: WhenMissing::Indeterminate,
            },
        ),
        RuleCheck::new(
            CheckMetadata::new("firewall-enabled", "Ensure a host firewall is active")
                .with_reference("CIS 3.5.1.1")
                .with_description("Either ufw or firewalld must be running")
                .with_tag("network"),
            Rule::AnyOf {
                alternatives: vec![
                    Alternative::new(
                        "ufw",
                        ProbeSpec::command("ufw", ["status"]).require_success(),
                        r"(?m)^Status:\s*active",
                    ),
                    Alternative::service("firewalld"),
                ],
            },
        ),
        RuleCheck::new(
            CheckMetadata::new("auditd-enabled", "Ensure auditd service is enabled and running")
                .with_reference("CIS 4.1.1.2")
                .with_tag("logging"),
            Rule::ServiceActive {
                unit: "auditd".into(),
                require_enabled: true,
            },
        ),
        RuleCheck::new(
            CheckMetadata::new("mac-enforced", "Ensure AppArmor or SELinux is enforcing")
                .with_reference("CIS 1.6.1")
                .with_tag("mac"),
            Rule::AnyOf {
                alternatives: vec![
                    Alternative::service("apparmor"),
                    Alternative::new(
                        "selinux",
                        ProbeSpec::command("sestatus", Vec::<String>::new()).require_success(),
                        r"(?s)SELinux status:\s+enabled.*Current mode:\s+enforcing",
                    ),
                ],
            },
        ),
        RuleCheck::new(
            CheckMetadata::new("world-writable-files", "Ensure no world writable files exist")
                .with_reference("CIS 6.1.4")
                .with_description("Scans local filesystems for regular files writable by others")
                .with_tag("filesystem"),
            Rule::forbid(
                vec![ProbeSpec::command(
                    "find",
                    ["/", "-xdev", "-type", "f", "-perm", "-0002"],
                )
                .with_timeout(120)],
                r"(?m)^/.*$",
            ),
        ),
        RuleCheck::new(
            CheckMetadata::new(
                "unused-filesystems",
                "Ensure mounting of cramfs, squashfs and udf is disabled",
            )
            .with_reference("CIS 1.1.1")
            .with_tag("filesystem"),
            Rule::KernelModulesDisabled {
                modules: vec!["cramfs".into(), "squashfs".into(), "udf".into()],
            },
        ),
        RuleCheck::new(
            CheckMetadata::new("time-sync", "Ensure time synchronization is in use")
                .with_reference("CIS 2.2.1.1")
                .with_tag("services"),
            Rule::AnyOf {
                alternatives: ["chrony", "chronyd", "ntpd", "ntp", "systemd-timesyncd"]
                    .into_iter()
                    .map(Alternative::service)
                    .collect(),
            },
        ),
        RuleCheck::new(
            CheckMetadata::new(
                "password-policy",
                "Ensure password creation requirements are configured",
            )
            .with_reference("CIS 5.3.1")
            .with_tag("auth"),
            Rule::AllOf {
                rules: vec![
                    Rule::pattern(
                        ProbeSpec::read_file(COMMON_PASSWORD),
                        r"(?m)^[^#\n]*pam_(pwquality|cracklib)\.so[^\n]*\bretry=3\b.*$",
                    ),
                    Rule::pattern(
                        ProbeSpec::read_file(COMMON_PASSWORD),
                        r"(?m)^[^#\n]*pam_(pwquality|cracklib)\.so[^\n]*(minlen=(1[4-9]|[2-9][0-9])\b|dcredit=-1\b|ucredit=-1\b).*$",
                    ),
                ],
            },
        ),
        RuleCheck::new(
            CheckMetadata::new(
                "password-expiry",
                "Ensure password expiration is 365 days or less",
            )
            .with_reference("CIS 5.4.1.1")
            .with_tag("auth"),
            Rule::pattern(
                ProbeSpec::read_file("/etc/login.defs"),
                r"(?m)^[ \t]*PASS_MAX_DAYS[ \t]+([1-9]|[1-9][0-9]|[12][0-9]{2}|3[0-5][0-9]|36[0-5])[ \t]*$",
            ),
        ),
        RuleCheck::new(
            CheckMetadata::new("gdm-autologin", "Ensure GDM automatic login is disabled")
                .with_reference("CIS 6.2.1")
                .with_description("Hosts without GDM pass")
                .with_tag("desktop"),
            Rule::forbid(
                vec![ProbeSpec::read_file("/etc/gdm3/custom.conf")],
                r"(?im)^[ \t]*AutomaticLoginEnable[ \t]*=[ \t]*true\b.*$",
            )
            .when_missing(WhenMissing::Pass),
        ),
        RuleCheck::new(
            CheckMetadata::new("sudo-nopasswd", "Ensure sudo requires a password")
                .with_reference("CIS 5.3.4")
                .with_tag("auth"),
            Rule::forbid(
                vec![
                    ProbeSpec::read_file("/etc/sudoers"),
                    ProbeSpec::read_dir("/etc/sudoers.d"),
                ],
                r"(?m)^[^#\n]*NOPASSWD.*$",
            ),
        ),
        RuleCheck::new(
            CheckMetadata::new("ip-forwarding", "Ensure IP forwarding is disabled")
                .with_reference("CIS 3.1.1")
                .with_tag("network"),
            Rule::Equals {
                probe: ProbeSpec::read_file("/proc/sys/net/ipv4/ip_forward"),
                expected: "0".into(),
                when_missing: WhenMissing::Indeterminate,
            },
        ),
    ]
}
