//! Test support.

mod fake_cart;

pub(crate) use fake_cart::FakeCart;
