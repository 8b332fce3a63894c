//! Whole-list edits on the stored account collection.

use crate::types::Account;

/// How an account is picked out of the stored list for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSelector {
    Index(usize),
    Alias(String),
}

impl AccountSelector {
    /// A bare number selects by position, anything else by alias.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input.parse::<usize>() {
            Ok(index) => AccountSelector::Index(index),
            Err(_) => AccountSelector::Alias(input.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Appended,
    Replaced,
}

/// Appends `account`, or replaces the entry with the same account id in place.
pub fn add_account(accounts: &mut Vec<Account>, account: Account) -> AddOutcome {
    match accounts
        .iter_mut()
        .find(|existing| existing.account_id == account.account_id)
    {
        Some(existing) => {
            *existing = account;
            AddOutcome::Replaced
        }
        None => {
            accounts.push(account);
            AddOutcome::Appended
        }
    }
}

/// Removes the first matching account and returns it.
pub fn remove_account(accounts: &mut Vec<Account>, selector: &AccountSelector) -> Option<Account> {
    let index = match selector {
        AccountSelector::Index(index) => (*index < accounts.len()).then_some(*index)?,
        AccountSelector::Alias(alias) => accounts.iter().position(|account| &account.alias == alias)?,
    };
    Some(accounts.remove(index))
}
