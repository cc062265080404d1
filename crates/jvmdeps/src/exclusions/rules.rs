//! Artifacts known to cause trouble when pulled in transitively.

use super::Severity;
use std::collections::HashSet;

/// A transitive artifact worth excluding when its trigger holds.
#[derive(Debug, Clone, Copy)]
pub struct KnownRule {
    /// `group:artifact` of the transitive dependency.
    pub artifact: &'static str,
    pub severity: Severity,
    pub reason: &'static str,
    /// Fires only when one of these (other than the artifact itself) is on the
    /// classpath. Empty means always.
    pub requires_any: &'static [&'static str],
    /// Never fires when one of these is on the classpath.
    pub unless_any: &'static [&'static str],
}

impl KnownRule {
    const fn new(artifact: &'static str, severity: Severity, reason: &'static str) -> Self {
        Self {
            artifact,
            severity,
            reason,
            requires_any: &[],
            unless_any: &[],
        }
    }

    const fn requires(mut self, any: &'static [&'static str]) -> Self {
        self.requires_any = any;
        self
    }

    const fn unless(mut self, any: &'static [&'static str]) -> Self {
        self.unless_any = any;
        self
    }

    /// Whether the rule fires given every `group:artifact` on the classpath.
    pub fn applies(&self, present: &HashSet<String>) -> bool {
        let requirement = self.requires_any.is_empty()
            || self
                .requires_any
                .iter()
                .any(|id| *id != self.artifact && present.contains(*id));
        requirement && !self.unless_any.iter().any(|id| present.contains(*id))
    }
}

const SLF4J_BINDINGS: &[&str] = &[
    "ch.qos.logback:logback-classic",
    "org.apache.logging.log4j:log4j-slf4j-impl",
    "org.apache.logging.log4j:log4j-slf4j2-impl",
    "org.slf4j:slf4j-jdk14",
    "org.slf4j:slf4j-log4j12",
    "org.slf4j:slf4j-nop",
    "org.slf4j:slf4j-reload4j",
    "org.slf4j:slf4j-simple",
];

const DUPLICATE_BINDING: &str = "Multiple SLF4J bindings end up on the classpath";

const JCL_BRIDGES: &[&str] = &["org.slf4j:jcl-over-slf4j", "org.springframework:spring-jcl"];

const JUNIT5: &[&str] = &["org.junit.jupiter:junit-jupiter", "org.junit.jupiter:junit-jupiter-api"];

const SERVLET_CONTAINERS: &[&str] = &[
    "org.springframework.boot:spring-boot-starter-jetty",
    "org.springframework.boot:spring-boot-starter-undertow",
];

pub const KNOWN_RULES: &[KnownRule] = &[
    KnownRule::new(
        "log4j:log4j",
        Severity::Critical,
        "Log4j 1.x is end-of-life and has unpatched vulnerabilities",
    ),
    KnownRule::new(
        "commons-logging:commons-logging",
        Severity::Warning,
        "Commons Logging is already bridged to SLF4J",
    )
    .requires(JCL_BRIDGES),
    KnownRule::new("ch.qos.logback:logback-classic", Severity::Warning, DUPLICATE_BINDING)
        .requires(SLF4J_BINDINGS),
    KnownRule::new(
        "org.apache.logging.log4j:log4j-slf4j-impl",
        Severity::Warning,
        DUPLICATE_BINDING,
    )
    .requires(SLF4J_BINDINGS),
    KnownRule::new(
        "org.apache.logging.log4j:log4j-slf4j2-impl",
        Severity::Warning,
        DUPLICATE_BINDING,
    )
    .requires(SLF4J_BINDINGS),
    KnownRule::new("org.slf4j:slf4j-jdk14", Severity::Warning, DUPLICATE_BINDING)
        .requires(SLF4J_BINDINGS),
    KnownRule::new("org.slf4j:slf4j-log4j12", Severity::Warning, DUPLICATE_BINDING)
        .requires(SLF4J_BINDINGS),
    KnownRule::new("org.slf4j:slf4j-nop", Severity::Warning, DUPLICATE_BINDING)
        .requires(SLF4J_BINDINGS),
    KnownRule::new("org.slf4j:slf4j-reload4j", Severity::Warning, DUPLICATE_BINDING)
        .requires(SLF4J_BINDINGS),
    KnownRule::new("org.slf4j:slf4j-simple", Severity::Warning, DUPLICATE_BINDING)
        .requires(SLF4J_BINDINGS),
    KnownRule::new(
        "junit:junit",
        Severity::Warning,
        "JUnit 4 next to JUnit 5 without the vintage engine",
    )
    .requires(JUNIT5)
    .unless(&["org.junit.vintage:junit-vintage-engine"]),
    KnownRule::new(
        "org.springframework.boot:spring-boot-starter-tomcat",
        Severity::Warning,
        "Competes with the embedded servlet container already declared",
    )
    .requires(SERVLET_CONTAINERS),
    KnownRule::new(
        "xml-apis:xml-apis",
        Severity::Warning,
        "Duplicates classes shipped with the JDK",
    ),
    KnownRule::new("stax:stax-api", Severity::Warning, "StAX is part of the JDK"),
    KnownRule::new("javax.xml.stream:stax-api", Severity::Warning, "StAX is part of the JDK"),
    KnownRule::new(
        "com.google.code.findbugs:jsr305",
        Severity::Info,
        "Splits the javax.annotation package with the annotation API",
    )
    .requires(&[
        "javax.annotation:javax.annotation-api",
        "jakarta.annotation:jakarta.annotation-api",
    ]),
    KnownRule::new(
        "javax.annotation:javax.annotation-api",
        Severity::Info,
        "Superseded by jakarta.annotation-api",
    )
    .requires(&["jakarta.annotation:jakarta.annotation-api"]),
    KnownRule::new(
        "org.hamcrest:hamcrest-core",
        Severity::Info,
        "Merged into org.hamcrest:hamcrest",
    )
    .requires(&["org.hamcrest:hamcrest"]),
];

/// Rules for the transitive artifact `id`.
pub fn rules_for(id: &str) -> impl Iterator<Item = &'static KnownRule> + '_ {
    KNOWN_RULES.iter().filter(move |rule| rule.artifact == id)
}
