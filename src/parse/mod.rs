// Source parsers: raw text in, typed counter snapshot out. Pure functions.

pub mod darwin;
pub mod netstat;
pub mod procfs;
