use std::{
    fmt,
    fmt::{Debug, Display},
};

/// A wrapper for values that must never appear in logs or error output, such as the Paystack
/// secret key, the webhook signing secret and the JWT signing key.
///
/// Both `Debug` and `Display` render as `****`; the only way to the inner value is an explicit
/// [`Secret::reveal`] call, which keeps accidental leaks greppable.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::Secret;

    #[test]
    fn secrets_are_masked_in_all_formatting() {
        let key = Secret::new("sk_live_0123456789abcdef".to_string());
        assert_eq!(format!("{key}"), "****");
        assert_eq!(format!("{key:?}"), "****");
        assert_eq!(format!("{:?}", Secret::new(42i64)), "****");
        assert_eq!(key.reveal(), "sk_live_0123456789abcdef");
    }
}
