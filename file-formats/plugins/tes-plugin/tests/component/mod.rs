//! Component tests

mod codec;
mod load_order;
