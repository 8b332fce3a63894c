use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Binding type tag written by the engine. Every other tag is passed through.
pub const PLAIN_TEXT: &str = "plain_text";

const TARGETS_PREFIX: &str = "workers_";
const DEFAULT_ALIAS: &str = "unnamed";

/// A remote account holding worker targets.
///
/// Stored in the shared record layout, where each template's target list
/// lives under its own `workers_<template>` key:
///
/// ```json
/// { "alias": "main", "accountId": "…", "apiToken": "…", "workers_cmliu": ["edge-1"] }
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AccountRecord", into = "AccountRecord")]
pub struct Account {
    pub alias: String,
    pub account_id: String,
    pub api_token: String,
    pub targets_by_template: BTreeMap<String, Vec<String>>,
}

impl Account {
    pub fn new(
        alias: impl Into<String>,
        account_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, AccountError> {
        let account_id = account_id.into().trim().to_string();
        let api_token = api_token.into().trim().to_string();
        if account_id.is_empty() {
            return Err(AccountError::MissingAccountId);
        }
        if api_token.is_empty() {
            return Err(AccountError::MissingApiToken);
        }

        let alias = alias.into().trim().to_string();
        Ok(Self {
            alias: if alias.is_empty() {
                DEFAULT_ALIAS.to_string()
            } else {
                alias
            },
            account_id,
            api_token,
            targets_by_template: BTreeMap::new(),
        })
    }

    pub fn with_targets(mut self, template_id: &str, targets: Vec<String>) -> Self {
        self.set_targets(template_id, targets);
        self
    }

    pub fn set_targets(&mut self, template_id: &str, targets: Vec<String>) {
        self.targets_by_template
            .insert(template_id.to_string(), targets);
    }

    /// Targets configured for a template, in stored order. Duplicates are kept.
    pub fn targets_for(&self, template_id: &str) -> &[String] {
        self.targets_by_template
            .get(template_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("alias", &self.alias)
            .field("account_id", &self.account_id)
            .field("api_token", &"<redacted>")
            .field("targets_by_template", &self.targets_by_template)
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("account id is required")]
    MissingAccountId,
    #[error("api token is required")]
    MissingApiToken,
}

#[derive(Serialize, Deserialize)]
struct AccountRecord {
    #[serde(default)]
    alias: String,
    #[serde(rename = "accountId", default)]
    account_id: String,
    #[serde(rename = "apiToken", default)]
    api_token: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        let targets_by_template = record
            .rest
            .into_iter()
            .filter_map(|(key, value)| {
                let template = key.strip_prefix(TARGETS_PREFIX)?.to_string();
                let Value::Array(items) = value else {
                    return None;
                };
                let targets = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(name) => Some(name),
                        _ => None,
                    })
                    .collect();
                Some((template, targets))
            })
            .collect();

        Self {
            alias: record.alias,
            account_id: record.account_id,
            api_token: record.api_token,
            targets_by_template,
        }
    }
}

impl From<Account> for AccountRecord {
    fn from(account: Account) -> Self {
        let rest = account
            .targets_by_template
            .into_iter()
            .map(|(template, targets)| {
                (
                    format!("{TARGETS_PREFIX}{template}"),
                    Value::Array(targets.into_iter().map(Value::String).collect()),
                )
            })
            .collect();

        Self {
            alias: account.alias,
            account_id: account.account_id,
            api_token: account.api_token,
            rest,
        }
    }
}

/// Splits a user-entered target list on ASCII or full-width commas.
pub fn parse_target_list(input: &str) -> Vec<String> {
    input
        .split([',', '，'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// A declared key/value pair destined to become a `plain_text` binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    /// `null` reads as empty, which the merge skips.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Variable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn has_value(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// A configuration entry attached to a remote target.
///
/// Fields the engine does not understand (namespace ids, secrets metadata and
/// so on) are kept in `extra` so that foreign bindings survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Binding {
    pub fn plain_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PLAIN_TEXT.to_string(),
            text: Some(text.into()),
            extra: Map::new(),
        }
    }

    pub fn is_plain_text(&self) -> bool {
        self.kind == PLAIN_TEXT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deployed,
    NoAccounts,
    NoTargets,
    UnknownTemplate,
    SourceUnavailable,
    InvalidIdentity,
    InvalidCredential,
    RemoteRejected,
    Unclassified,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deployed => "deployed",
            EntryKind::NoAccounts => "no_accounts",
            EntryKind::NoTargets => "no_targets",
            EntryKind::UnknownTemplate => "unknown_template",
            EntryKind::SourceUnavailable => "source_unavailable",
            EntryKind::InvalidIdentity => "invalid_identity",
            EntryKind::InvalidCredential => "invalid_credential",
            EntryKind::RemoteRejected => "remote_rejected",
            EntryKind::Unclassified => "unclassified",
        }
    }

    pub fn is_informational(&self) -> bool {
        matches!(self, EntryKind::NoAccounts | EntryKind::NoTargets)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the batch audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployLogEntry {
    pub label: String,
    pub success: bool,
    pub message: String,
    pub kind: EntryKind,
}

impl DeployLogEntry {
    pub fn pair_label(alias: &str, target: &str) -> String {
        format!("{alias} -> [{target}]")
    }

    pub fn deployed(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            success: true,
            message: "updated".to_string(),
            kind: EntryKind::Deployed,
        }
    }

    pub fn notice(label: impl Into<String>, kind: EntryKind, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            success: true,
            message: message.into(),
            kind,
        }
    }

    pub fn failed(label: impl Into<String>, kind: EntryKind, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            success: false,
            message: message.into(),
            kind,
        }
    }
}
