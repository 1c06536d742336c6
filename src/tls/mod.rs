pub mod acceptor;
pub mod builder;

#[cfg(test)]
pub(crate) mod testing;
