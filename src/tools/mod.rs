// Pure HTML tools, one directory each
pub mod clean;
pub mod extract;
pub mod fingerprint;
pub mod mine;
pub mod post;
pub mod select;
