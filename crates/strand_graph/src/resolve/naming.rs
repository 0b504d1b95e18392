use alloc::string::String;

/// Maps member names and dictionary keys to the names written out.
///
/// Every method defaults to the identity mapping. Names given explicitly
/// through [`PropertyOptions::name`](crate::attrs::PropertyOptions) are
/// passed to [`Self::property_name`] with `explicit` set.
pub trait NamingStrategy: Send + Sync {
    #[inline]
    fn property_name(&self, name: &str, explicit: bool) -> String {
        let _ = explicit;
        name.into()
    }

    #[inline]
    fn dictionary_key(&self, key: &str) -> String {
        key.into()
    }

    #[inline]
    fn extension_data_name(&self, name: &str) -> String {
        name.into()
    }
}

/// Writes names exactly as declared.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNaming;

impl NamingStrategy for IdentityNaming {}
