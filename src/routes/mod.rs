pub mod epg;
pub mod health;
pub mod playlist;
pub mod proxy;
pub mod rewrite;
