//! Workspace tests.

#[cfg(test)]
mod backend;
#[cfg(test)]
mod core;
#[cfg(test)]
mod exec;
