//! End-to-end scenarios over the public API

mod cache_typing;
mod cycle_rejection;
mod diamond;
mod linear_chain;
mod worker_pool;
