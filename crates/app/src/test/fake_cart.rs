//! In-memory storefront cart.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use cartwatch::cart::{CartSnapshot, LineItem};

use crate::adapter::{AdapterError, CartAdapter, CartMutation};

/// A [`CartAdapter`] that applies mutations to an in-memory cart the way a
/// storefront does: adding an identical line bumps its quantity, attributes
/// are merged, a blank attribute is removed and clearing keeps attributes.
#[derive(Debug, Default)]
pub(crate) struct FakeCart {
    cart: Mutex<CartSnapshot>,
}

impl FakeCart {
    pub(crate) fn with_snapshot(snapshot: CartSnapshot) -> Self {
        Self {
            cart: Mutex::new(snapshot),
        }
    }

    fn with_cart<R>(&self, f: impl FnOnce(&mut CartSnapshot) -> R) -> R {
        let mut cart = self.cart.lock().unwrap_or_else(PoisonError::into_inner);

        f(&mut cart)
    }
}

#[async_trait]
impl CartAdapter for FakeCart {
    async fn fetch_cart(&self) -> Result<CartSnapshot, AdapterError> {
        Ok(self.with_cart(|cart| {
            let mut snapshot = CartSnapshot::with_items(cart.items.clone(), "GBP");

            snapshot.note.clone_from(&cart.note);
            snapshot.attributes.clone_from(&cart.attributes);

            snapshot
        }))
    }

    async fn clear_cart(&self) -> Result<(), AdapterError> {
        self.with_cart(|cart| cart.items.clear());

        Ok(())
    }

    async fn mutate(&self, mutation: CartMutation) -> Result<(), AdapterError> {
        self.with_cart(|cart| {
            for item in &mutation.items {
                let existing = cart.items.iter_mut().find(|line| {
                    line.variant_id == item.id
                        && line.properties == item.properties
                        && line.selling_plan_id == item.selling_plan
                });

                if let Some(line) = existing {
                    line.quantity += item.quantity;
                    continue;
                }

                let key = format!("{}:{}", item.id, cart.items.len());
                let mut line = LineItem::new(key, item.id, item.quantity);

                line.properties.clone_from(&item.properties);
                line.selling_plan_id.clone_from(&item.selling_plan);

                cart.items.push(line);
            }

            if let Some(note) = &mutation.note {
                cart.note = Some(note.clone());
            }

            cart.attributes.extend(mutation.attributes.clone());
            cart.attributes.retain(|_, value| !value.is_empty());
        });

        Ok(())
    }
}
