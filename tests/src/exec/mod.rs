mod determinism;
mod dispatch;
mod exceptions;
mod guard;
mod hle;
mod timing;
