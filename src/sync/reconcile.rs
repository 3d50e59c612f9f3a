// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Steps run over each freshly synced message before its folder commits.

use async_trait::async_trait;
use log::debug;

use crate::store::{contact_reference, AnchorKind, MailStore, StoredMessage};
use crate::sync::SyncError;

#[async_trait]
pub trait MessageReconciler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn reconcile(&self, store: &dyn MailStore, message: &StoredMessage) -> Result<(), SyncError>;
}

/// Address of the other party, if the message has one worth linking.
fn counterpart(message: &StoredMessage) -> Option<&str> {
    if message.outgoing {
        return None;
    }
    message
        .from_address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
}

/// Links a message to the contact anchor of its sender, when one exists.
#[derive(Debug, Default)]
pub struct ContactLinker;

#[async_trait]
impl MessageReconciler for ContactLinker {
    fn name(&self) -> &'static str {
        "contact-linker"
    }

    async fn reconcile(&self, store: &dyn MailStore, message: &StoredMessage) -> Result<(), SyncError> {
        let Some(address) = counterpart(message) else {
            return Ok(());
        };
        if let Some(contact) = store.find_anchors(&contact_reference(address)).await?.first() {
            store.link_message(message.id, contact.id).await?;
            debug!("Linked {} to contact {}", message.reference, contact.id);
        }
        Ok(())
    }
}

/// Creates a contact anchor for senders nobody has seen before.
#[derive(Debug, Default)]
pub struct PseudoContactCreator;

#[async_trait]
impl MessageReconciler for PseudoContactCreator {
    fn name(&self) -> &'static str {
        "pseudo-contact-creator"
    }

    async fn reconcile(&self, store: &dyn MailStore, message: &StoredMessage) -> Result<(), SyncError> {
        let Some(address) = counterpart(message) else {
            return Ok(());
        };
        let reference = contact_reference(address);
        if !store.find_anchors(&reference).await?.is_empty() {
            return Ok(());
        }
        let contact = store.create_anchor(address, AnchorKind::Contact, &reference).await?;
        store.link_message(message.id, contact.id).await?;
        debug!("Created pseudo contact {} for {}", contact.id, address);
        Ok(())
    }
}

/// The default pipeline: link to known contacts, then create the missing ones.
pub fn default_reconcilers() -> Vec<Box<dyn MessageReconciler>> {
    vec![Box::new(ContactLinker), Box::new(PseudoContactCreator)]
}
