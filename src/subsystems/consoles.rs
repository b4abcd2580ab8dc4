//! Websocket endpoints for consoles, KVM and virtual media.
//!
//! The proxies behind these endpoints run as separate services; this module
//! only claims their paths on the shared router.

use crate::http::{websocket, RouteKind};
use crate::lifecycle::startup::{Registrar, StartupError};

fn socket(r: &mut Registrar, name: &'static str, path: &str) -> Result<(), StartupError> {
    r.route(name, path, RouteKind::WebSocket, websocket::unattached(name))
}

pub fn register_kvm(r: &mut Registrar) -> Result<(), StartupError> {
    socket(r, "kvm", "/kvm/0")
}

pub fn register_host_console(r: &mut Registrar) -> Result<(), StartupError> {
    socket(r, "host_console", "/console0")
}

pub fn register_bmc_shell(r: &mut Registrar) -> Result<(), StartupError> {
    socket(r, "bmc_shell", "/bmc-console")
}

pub fn register_hypervisor_console(r: &mut Registrar) -> Result<(), StartupError> {
    socket(r, "hypervisor_console", "/console1")
}

pub fn register_virtual_media(r: &mut Registrar) -> Result<(), StartupError> {
    socket(r, "virtual_media", "/vm/0/0")
}

pub fn register_nbd_proxy(r: &mut Registrar) -> Result<(), StartupError> {
    socket(r, "nbd_proxy", "/nbd/{id}")
}
