pub mod archive;
pub mod clock;
pub mod naming;
