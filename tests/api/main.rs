//! HTTP-level tests against the in-memory store and queue.

mod test_helpers;

mod test_health;
mod test_images;
