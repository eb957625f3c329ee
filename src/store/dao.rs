mod dao_impl;
mod dao_trait;
#[cfg(test)]
mod mock;

pub use dao_impl::PgContentStore;
pub use dao_trait::ContentStore;
#[cfg(test)]
pub use mock::MockContentStore;
