//! Default cache-coherency attribute handling.
//!
//! The `cca=` boot parameter can force the cacheability attribute used at
//! reset; anything outside the 3-bit field falls back to whatever the
//! hardware reports in Config.K0. The attribute is re-applied after a
//! power transition, which is the only power-management concern this
//! subsystem has.

use core::sync::atomic::{AtomicI32, Ordering};

use xbhal::CacheIsa;
use xbhal::regs::CONF_CM_CMASK;

static CCA: AtomicI32 = AtomicI32::new(-1);

/// Record the `cca=` boot parameter value.
pub fn set_cca_param(arg: &str) {
    match arg.trim().parse::<i32>() {
        Ok(val) => CCA.store(val, Ordering::Relaxed),
        Err(_) => warn!("ignoring malformed cca parameter {arg:?}"),
    }
}

pub(crate) fn coherency_setup(hw: &dyn CacheIsa) {
    let mut cca = CCA.load(Ordering::Relaxed);
    if !(0..=7).contains(&cca) {
        cca = (hw.read_config() & CONF_CM_CMASK) as i32;
    }

    debug!("Using cache attribute {cca}");
    let config = (hw.read_config() & !CONF_CM_CMASK) | cca as u32;
    hw.write_config(config);
}

#[cfg(test)]
pub(crate) fn reset_cca_param() {
    CCA.store(-1, Ordering::Relaxed);
}
