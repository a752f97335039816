use crate::{
    db_types::Actor,
    traits::{
        MarketplaceDatabase,
        OrderFlowError,
        AUTO_CONFIRM_DAYS,
        COMMISSION_PERCENTAGE,
        RETURN_COURIER_FEE,
    },
};

const KNOWN_KEYS: [&str; 3] = [COMMISSION_PERCENTAGE, RETURN_COURIER_FEE, AUTO_CONFIRM_DAYS];

/// Admin access to the platform settings. Values are read at the point of use by the other APIs,
/// so a change here takes effect on the next operation without a restart.
#[derive(Clone)]
pub struct SettingsApi<B: MarketplaceDatabase> {
    db: B,
}

impl<B: MarketplaceDatabase> SettingsApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn get(&self, actor: &Actor, key: &str) -> Result<String, OrderFlowError> {
        if !actor.is_admin() {
            return Err(OrderFlowError::forbidden(format!("{} may not read platform settings", actor.label())));
        }
        self.db
            .fetch_setting(key)
            .await?
            .ok_or_else(|| OrderFlowError::not_found(format!("Platform setting {key}")))
    }

    pub async fn set(&self, actor: &Actor, key: &str, value: &str) -> Result<(), OrderFlowError> {
        if !KNOWN_KEYS.contains(&key) {
            return Err(OrderFlowError::precondition(format!("unknown platform setting {key}")));
        }
        validate(key, value)?;
        self.db.update_setting(key, value, actor).await
    }
}

fn validate(key: &str, value: &str) -> Result<(), OrderFlowError> {
    let bad = |why: &str| OrderFlowError::precondition(format!("invalid value '{value}' for {key}: {why}"));
    match key {
        COMMISSION_PERCENTAGE => {
            let pct: f64 = value.parse().map_err(|_| bad("not a number"))?;
            if !(0.0..=100.0).contains(&pct) {
                return Err(bad("must be between 0 and 100"));
            }
        },
        RETURN_COURIER_FEE => {
            let fee: i64 = value.parse().map_err(|_| bad("not an amount in minor units"))?;
            if fee < 0 {
                return Err(bad("must not be negative"));
            }
        },
        AUTO_CONFIRM_DAYS => {
            let days: i64 = value.parse().map_err(|_| bad("not a number of days"))?;
            if days < 1 {
                return Err(bad("must be at least one day"));
            }
        },
        _ => {},
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::validate;

    #[test]
    fn setting_values_are_validated() {
        assert!(validate("commission_percentage", "12.5").is_ok());
        assert!(validate("commission_percentage", "101").is_err());
        assert!(validate("commission_percentage", "ten").is_err());
        assert!(validate("return_courier_fee", "250000").is_ok());
        assert!(validate("return_courier_fee", "-1").is_err());
        assert!(validate("auto_confirm_days", "2").is_ok());
        assert!(validate("auto_confirm_days", "0").is_err());
    }
}
