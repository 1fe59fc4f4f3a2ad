//! One-shot transformation intent handed to the schema builder.

use super::Environment;

/// What to do when rebuilding `target` from `source`.
///
/// Built and consumed inside a single resolution call. `upgrade` implies
/// `take_ownership`; callers can still clear ownership afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpec {
    source: Environment,
    target: Environment,
    upgrade: bool,
    make_external: bool,
    make_non_transactional: bool,
    strip_location: bool,
    replace_location: bool,
    take_ownership: bool,
    table_name_prefix: Option<String>,
    location: Option<String>,
}

impl CopySpec {
    pub fn new(source: Environment, target: Environment) -> Self {
        Self {
            source,
            target,
            upgrade: false,
            make_external: false,
            make_non_transactional: false,
            strip_location: false,
            replace_location: false,
            take_ownership: false,
            table_name_prefix: None,
            location: None,
        }
    }

    pub fn source(&self) -> Environment {
        self.source
    }

    pub fn target(&self) -> Environment {
        self.target
    }

    pub fn upgrade(&self) -> bool {
        self.upgrade
    }

    /// Legacy-managed to external conversion. Turning it on claims ownership.
    pub fn set_upgrade(&mut self, upgrade: bool) -> &mut Self {
        self.upgrade = upgrade;
        if upgrade {
            self.take_ownership = true;
        }
        self
    }

    pub fn make_external(&self) -> bool {
        self.make_external
    }

    pub fn set_make_external(&mut self, value: bool) -> &mut Self {
        self.make_external = value;
        self
    }

    pub fn make_non_transactional(&self) -> bool {
        self.make_non_transactional
    }

    pub fn set_make_non_transactional(&mut self, value: bool) -> &mut Self {
        self.make_non_transactional = value;
        self
    }

    pub fn strip_location(&self) -> bool {
        self.strip_location
    }

    pub fn set_strip_location(&mut self, value: bool) -> &mut Self {
        self.strip_location = value;
        self
    }

    pub fn replace_location(&self) -> bool {
        self.replace_location
    }

    pub fn set_replace_location(&mut self, value: bool) -> &mut Self {
        self.replace_location = value;
        self
    }

    pub fn take_ownership(&self) -> bool {
        self.take_ownership
    }

    pub fn set_take_ownership(&mut self, value: bool) -> &mut Self {
        self.take_ownership = value;
        self
    }

    pub fn table_name_prefix(&self) -> Option<&str> {
        self.table_name_prefix.as_deref()
    }

    pub fn set_table_name_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.table_name_prefix = Some(prefix.into());
        self
    }

    /// Explicit location override.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn set_location(&mut self, location: impl Into<String>) -> &mut Self {
        self.location = Some(location.into());
        self
    }

    pub fn rename_table(&self) -> bool {
        self.table_name_prefix
            .as_deref()
            .map(|p| !p.is_empty())
            .unwrap_or(false)
    }
}
