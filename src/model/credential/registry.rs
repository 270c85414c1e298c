use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{
    batch::BatchCoordinator,
    common::{Amount, Identity, Timestamp},
    errors::{LedgerError, LedgerResult},
    pagination,
};

use super::Credential;

/// Read access to credential status, as needed by anything that gates on it.
pub trait CredentialLookup {
    fn is_active_credential(&self, wallet: &Identity) -> bool;
}

/// One wallet's share of a funding operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsCredit {
    pub wallet: Identity,
    pub amount: Amount,
    /// Balance after the credit.
    pub balance: Amount,
}

/// Owner of all credentials, keyed by wallet. Credentials are never removed.
#[derive(Debug, Default)]
pub struct CredentialRegistry {
    credentials: HashMap<Identity, Credential>,
    /// Registration order, for stable pagination.
    order: Vec<Identity>,
}

impl CredentialLookup for CredentialRegistry {
    fn is_active_credential(&self, wallet: &Identity) -> bool {
        self.credentials
            .get(wallet)
            .map(|credential| credential.is_active)
            .unwrap_or(false)
    }
}

impl CredentialRegistry {
    pub fn create_credential(&mut self, wallet: Identity, now: Timestamp) -> LedgerResult<()> {
        if self.credentials.contains_key(&wallet) {
            return Err(LedgerError::AlreadyExists(wallet));
        }
        self.insert(Credential::new(wallet, now));
        Ok(())
    }

    /// Register every wallet, or none of them. A wallet appearing twice in
    /// the batch counts as already existing.
    pub fn create_credentials_batch(
        &mut self,
        wallets: Vec<Identity>,
        now: Timestamp,
    ) -> LedgerResult<Vec<Identity>> {
        let mut seen = HashSet::new();
        let batch = BatchCoordinator::validate(wallets, |wallet| {
            if self.credentials.contains_key(wallet) || !seen.insert(wallet.clone()) {
                Err(LedgerError::AlreadyExists(wallet.clone()))
            } else {
                Ok(())
            }
        })?;

        let created = batch.items().to_vec();
        batch.apply(|wallet| self.insert(Credential::new(wallet, now)));
        Ok(created)
    }

    /// Setting the status a credential already has is not an error.
    pub fn update_credential_status(
        &mut self,
        wallet: &Identity,
        is_active: bool,
    ) -> LedgerResult<()> {
        self.require_mut(wallet)?.is_active = is_active;
        Ok(())
    }

    pub fn update_credentials_status_batch(
        &mut self,
        wallets: Vec<Identity>,
        is_active: bool,
    ) -> LedgerResult<Vec<Identity>> {
        let batch = BatchCoordinator::validate(wallets, |wallet| self.require(wallet).map(|_| ()))?;

        let updated = batch.items().to_vec();
        batch.apply(|wallet| {
            if let Some(credential) = self.credentials.get_mut(&wallet) {
                credential.is_active = is_active;
            }
        });
        Ok(updated)
    }

    /// Credit `amount` to `wallet`, returning the new balance.
    pub fn add_funds(&mut self, wallet: &Identity, amount: Amount) -> LedgerResult<Amount> {
        let credential = self.require_mut(wallet)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount("amount must be positive"));
        }
        credential.balance = credential
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount("balance would overflow"))?;
        Ok(credential.balance)
    }

    /// Split `total_amount` evenly across `wallets` and credit each share.
    /// The last wallet also receives the remainder, so the credits always
    /// sum to exactly `total_amount`.
    pub fn add_funds_batch(
        &mut self,
        wallets: Vec<Identity>,
        total_amount: Amount,
    ) -> LedgerResult<Vec<FundsCredit>> {
        let shares = split_evenly(total_amount, wallets.len())?;
        let credits: Vec<(Identity, Amount)> = wallets.into_iter().zip(shares).collect();

        // A wallet may appear more than once, so track the balance it would
        // reach rather than checking each credit in isolation.
        let mut projected: HashMap<Identity, Amount> = HashMap::new();
        let batch = BatchCoordinator::validate(credits, |(wallet, amount)| {
            let current = match projected.get(wallet) {
                Some(balance) => *balance,
                None => self.require(wallet)?.balance,
            };
            let next = current
                .checked_add(*amount)
                .ok_or(LedgerError::InvalidAmount("balance would overflow"))?;
            projected.insert(wallet.clone(), next);
            Ok(())
        })?;

        let mut applied = Vec::with_capacity(batch.len());
        batch.apply(|(wallet, amount)| {
            if let Some(credential) = self.credentials.get_mut(&wallet) {
                credential.balance += amount;
                applied.push(FundsCredit {
                    balance: credential.balance,
                    wallet,
                    amount,
                });
            }
        });
        Ok(applied)
    }

    pub fn credential(&self, wallet: &Identity) -> Option<&Credential> {
        self.credentials.get(wallet)
    }

    /// A page of credentials in registration order. Paging past the end
    /// yields an empty page.
    pub fn credentials(&self, start: u64, count: u64) -> Vec<Credential> {
        pagination::page(&self.order, start, count)
            .iter()
            .filter_map(|wallet| self.credentials.get(wallet).cloned())
            .collect()
    }

    pub fn count(&self) -> u64 {
        self.order.len() as u64
    }

    fn insert(&mut self, credential: Credential) {
        self.order.push(credential.wallet.clone());
        self.credentials.insert(credential.wallet.clone(), credential);
    }

    fn require(&self, wallet: &Identity) -> LedgerResult<&Credential> {
        self.credentials
            .get(wallet)
            .ok_or_else(|| LedgerError::CredentialNotFound(wallet.clone()))
    }

    fn require_mut(&mut self, wallet: &Identity) -> LedgerResult<&mut Credential> {
        self.credentials
            .get_mut(wallet)
            .ok_or_else(|| LedgerError::CredentialNotFound(wallet.clone()))
    }
}

/// Split `total` into `parts` equal shares, adding the remainder to the last.
fn split_evenly(total: Amount, parts: usize) -> LedgerResult<Vec<Amount>> {
    if parts == 0 {
        return Err(LedgerError::EmptyBatch);
    }
    if total == 0 {
        return Err(LedgerError::InvalidAmount("total must be positive"));
    }

    let divisor = parts as Amount;
    let mut shares = vec![total / divisor; parts];
    if let Some(last) = shares.last_mut() {
        *last += total % divisor;
    }
    Ok(shares)
}
