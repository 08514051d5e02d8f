pub mod annotations;
pub mod config;
pub mod device;
pub mod error;
pub mod repository;

#[cfg(test)]
pub mod test_utils;
