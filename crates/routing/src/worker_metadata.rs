use std::collections::BTreeMap;

use serde::Serialize;

use crate::{StageId, VirtualServerAddress};

/// Routing facts for one worker of a stage.
///
/// Besides the worker's own address it records, for every stage this worker
/// exchanges data with, the ordered peer addresses it must connect to or accept
/// from. Order matters: exchange operators address peers by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerMetadata {
    server: VirtualServerAddress,
    mailboxes: BTreeMap<StageId, Vec<VirtualServerAddress>>,
    custom_properties: BTreeMap<String, String>,
}

impl WorkerMetadata {
    /// Metadata for a worker with no exchange relations.
    pub fn new(server: VirtualServerAddress) -> Self {
        Self::builder(server).build()
    }

    pub fn builder(server: VirtualServerAddress) -> WorkerMetadataBuilder {
        WorkerMetadataBuilder {
            server,
            mailboxes: BTreeMap::new(),
            custom_properties: BTreeMap::new(),
        }
    }

    pub fn server(&self) -> &VirtualServerAddress {
        &self.server
    }

    /// Peers for `related_stage`, in exchange order.
    ///
    /// Empty when this worker does not exchange data with that stage.
    pub fn peers(&self, related_stage: StageId) -> &[VirtualServerAddress] {
        self.mailboxes
            .get(&related_stage)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_relation(&self, related_stage: StageId) -> bool {
        self.mailboxes.contains_key(&related_stage)
    }

    pub fn related_stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.mailboxes.keys().copied()
    }

    pub fn mailboxes(&self) -> &BTreeMap<StageId, Vec<VirtualServerAddress>> {
        &self.mailboxes
    }

    pub fn custom_property(&self, key: &str) -> Option<&str> {
        self.custom_properties.get(key).map(String::as_str)
    }

    pub fn custom_properties(&self) -> &BTreeMap<String, String> {
        &self.custom_properties
    }
}

#[derive(Debug, Clone)]
pub struct WorkerMetadataBuilder {
    server: VirtualServerAddress,
    mailboxes: BTreeMap<StageId, Vec<VirtualServerAddress>>,
    custom_properties: BTreeMap<String, String>,
}

impl WorkerMetadataBuilder {
    /// Appends `peers` to the relation with `related_stage`.
    pub fn peers<I>(mut self, related_stage: StageId, peers: I) -> Self
    where
        I: IntoIterator<Item = VirtualServerAddress>,
    {
        self.mailboxes.entry(related_stage).or_default().extend(peers);
        self
    }

    pub fn custom_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> WorkerMetadata {
        WorkerMetadata {
            server: self.server,
            mailboxes: self.mailboxes,
            custom_properties: self.custom_properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(host: &str, port: u16, worker_id: usize) -> VirtualServerAddress {
        VirtualServerAddress::new(host, port, worker_id)
    }

    #[test]
    fn test_peers_keep_declaration_order() {
        let metadata = WorkerMetadata::builder(addr("self", 1, 1))
            .peers(7, [addr("B", 101, 2)])
            .peers(7, [addr("A", 100, 0)])
            .build();
        assert_eq!(metadata.peers(7), &[addr("B", 101, 2), addr("A", 100, 0)]);
    }

    #[test]
    fn test_unrelated_stage_is_empty_not_error() {
        let metadata = WorkerMetadata::builder(addr("self", 1, 0))
            .peers(2, [addr("A", 100, 0)])
            .build();
        assert!(metadata.peers(3).is_empty());
        assert!(!metadata.has_relation(3));
        assert_eq!(metadata.related_stages().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_custom_properties() {
        let metadata = WorkerMetadata::builder(addr("self", 1, 0))
            .custom_property("segments", "orders_0,orders_3")
            .build();
        assert_eq!(metadata.custom_property("segments"), Some("orders_0,orders_3"));
        assert_eq!(metadata.custom_property("missing"), None);
    }
}
