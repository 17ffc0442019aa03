//! The authoritative side members pull from.

use std::sync::Arc;

use shapewise_store::ConfigurationStore;
use shapewise_types::ConfigurationDocument;

/// Something that can hand out the authoritative document on demand.
pub trait ConfigurationSource: Send + Sync {
    fn fetch(&self) -> Arc<ConfigurationDocument>;
}

impl ConfigurationSource for ConfigurationStore {
    fn fetch(&self) -> Arc<ConfigurationDocument> {
        self.read()
    }
}

impl<S: ConfigurationSource + ?Sized> ConfigurationSource for Arc<S> {
    fn fetch(&self) -> Arc<ConfigurationDocument> {
        (**self).fetch()
    }
}
