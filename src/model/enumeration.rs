//! Enumeration types, including flag enumerations whose values combine members bitwise.

use super::errors::ModelError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationType {
    name: String,
    members: Vec<EnumMember>,
    is_flags: bool,
}

impl EnumerationType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            is_flags: false,
        }
    }

    pub fn with_member(mut self, name: impl Into<String>, value: i64) -> Self {
        self.members.push(EnumMember {
            name: name.into(),
            value,
        });
        self
    }

    pub fn flags(mut self, is_flags: bool) -> Self {
        self.is_flags = is_flags;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[EnumMember] {
        &self.members
    }

    pub fn is_flags(&self) -> bool {
        self.is_flags
    }

    pub fn member(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Parses a member list such as `high` or `low,high` into its numeric value.
    ///
    /// A plain integer is accepted as the raw value. Multiple members are only
    /// accepted for flag enumerations.
    pub fn parse_members(&self, text: &str) -> Result<i64, ModelError> {
        let text = text.trim();
        if let Ok(raw) = text.parse::<i64>() {
            return Ok(raw);
        }

        let names: Vec<&str> = text.split(',').map(str::trim).collect();
        if names.len() > 1 && !self.is_flags {
            return Err(self.invalid_member(text));
        }

        let mut value = 0;
        for name in names {
            let member = self.member(name).ok_or_else(|| self.invalid_member(name))?;
            value |= member.value;
        }
        Ok(value)
    }

    /// Members whose bits are set in `value`. Zero-valued members never match.
    pub fn members_of(&self, value: i64) -> Vec<&EnumMember> {
        if !self.is_flags {
            return self.members.iter().filter(|m| m.value == value).collect();
        }
        self.members
            .iter()
            .filter(|m| m.value != 0 && value & m.value == m.value)
            .collect()
    }

    /// Comma-separated member names, or `None` when no member matches.
    pub fn format(&self, value: i64) -> Option<String> {
        let members = self.members_of(value);
        if members.is_empty() {
            return None;
        }
        Some(
            members
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    fn invalid_member(&self, member: &str) -> ModelError {
        ModelError::InvalidEnumMember {
            enumeration: self.name.clone(),
            member: member.to_string(),
        }
    }
}
