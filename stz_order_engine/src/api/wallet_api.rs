use crate::{
    db_types::{Actor, LedgerEntry, Role},
    order_objects::EarningsSummary,
    traits::{MarketplaceDatabase, OrderFlowError},
};

/// Read-only views over the wallet ledger. Balances are always derived by summation; nothing in
/// here ever writes.
#[derive(Clone)]
pub struct WalletApi<B: MarketplaceDatabase> {
    db: B,
}

impl<B: MarketplaceDatabase> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// A user's own ledger entries, newest first. Admins may read anyone's.
    pub async fn ledger_entries(&self, actor: &Actor, user_id: i64) -> Result<Vec<LedgerEntry>, OrderFlowError> {
        if actor.id != user_id && !actor.is_admin() {
            return Err(OrderFlowError::forbidden(format!(
                "{} may not read the ledger of user {user_id}",
                actor.label()
            )));
        }
        self.db.fetch_ledger_entries(user_id).await
    }

    /// The earnings rollup for a designer's wallet screen.
    pub async fn earnings_summary(&self, actor: &Actor, designer_id: i64) -> Result<EarningsSummary, OrderFlowError> {
        let own = actor.role == Role::Designer && actor.id == designer_id;
        if !own && !actor.is_admin() {
            return Err(OrderFlowError::forbidden(format!(
                "{} may not read the earnings of designer {designer_id}",
                actor.label()
            )));
        }
        self.db.earnings_summary(designer_id).await
    }
}
