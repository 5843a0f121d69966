//! Command line front-end over [`unpak_format`].

pub mod commands;
