//! Configuration emitters.
//!
//! Every function in this module family maps an [`AppConfig`] (plus, for
//! lnd.conf, a few host facts gathered by the caller) to file contents. None
//! of them touch the filesystem, the clock or the network; the plans own all
//! I/O and write the returned strings where [`crate::layout`] says.
//!
//! [`AppConfig`]: crate::state::AppConfig

pub mod bitcoin;
pub mod lit;
pub mod lnd;
pub mod syncthing;
pub mod system;
pub mod systemd;
pub mod tor;
