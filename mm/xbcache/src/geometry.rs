//! Cache geometry probing from the Config1/Config2 capability registers.

use xbhal::regs::{ERRCTL_WST_DIS, MIPS_CONF_M};
use xbhal::{CacheIsa, MachineType};

/// Geometry of one cache level, populated once at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDesc {
    pub linesz: usize,
    pub sets: usize,
    pub ways: usize,
    /// Total capacity in bytes.
    pub size: usize,
    /// Bytes covered by a single way.
    pub waysize: usize,
    /// Shift selecting the way in an index-type operation address.
    pub waybit: u32,
    /// Physically indexed (PIPT) rather than virtually indexed.
    pub phys_indexed: bool,
}

impl CacheDesc {
    fn new(linesz: usize, sets: usize, ways: usize, phys_indexed: bool) -> Self {
        let size = sets * ways * linesz;
        let waysize = size / ways;
        Self {
            linesz,
            sets,
            ways,
            size,
            waysize,
            waybit: waysize.trailing_zeros(),
            phys_indexed,
        }
    }
}

/// The probed cache levels. The unified secondary cache is optional;
/// absence is a valid configuration, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHierarchy {
    pub icache: CacheDesc,
    pub dcache: CacheDesc,
    pub scache: Option<CacheDesc>,
}

fn line_size(field: u32) -> usize {
    // A zero line-size field means the cache is not implemented.
    if field == 0 { 0 } else { 2usize << field }
}

pub(crate) fn probe_pcache(hw: &dyn CacheIsa, machine: MachineType) -> (CacheDesc, CacheDesc) {
    let config1 = hw.read_config1();

    // These parts index their primary caches physically.
    let phys_indexed = matches!(
        machine,
        MachineType::Jz4725b | MachineType::Jz4760 | MachineType::X2000 | MachineType::X2000e
    );

    let ilinesz = line_size((config1 >> 19) & 7);
    let isets = 32usize << (((config1 >> 22) + 1) & 7);
    let iways = (1 + ((config1 >> 16) & 7)) as usize;
    if isets * iways * ilinesz == 0 {
        panic!("Invalid primary instruction cache size.");
    }
    let icache = CacheDesc::new(ilinesz, isets, iways, phys_indexed);

    let dlinesz = line_size((config1 >> 10) & 7);
    let dsets = 32usize << (((config1 >> 13) + 1) & 7);
    let dways = (1 + ((config1 >> 7) & 7)) as usize;
    if dsets * dways * dlinesz == 0 {
        panic!("Invalid primary data cache size.");
    }
    let dcache = CacheDesc::new(dlinesz, dsets, dways, phys_indexed);

    info!(
        "Primary instruction cache {}kiB, {}, {}-way, {} sets, linesize {} bytes.",
        icache.size >> 10,
        if icache.phys_indexed { "PIPT" } else { "VIPT" },
        icache.ways,
        icache.sets,
        icache.linesz
    );
    info!(
        "Primary data cache {}kiB, {}, {}-way, {} sets, linesize {} bytes.",
        dcache.size >> 10,
        if dcache.phys_indexed { "PIPT" } else { "VIPT" },
        dcache.ways,
        dcache.sets,
        dcache.linesz
    );

    (icache, dcache)
}

pub(crate) fn probe_scache(hw: &dyn CacheIsa, machine: MachineType) -> Option<CacheDesc> {
    // No Config2, no secondary cache.
    if hw.read_config1() & MIPS_CONF_M == 0 {
        return None;
    }

    let config2 = hw.read_config2();

    let linesz = 2usize << ((config2 >> 4) & 0xf);
    let mut sets = 64usize << ((config2 >> 8) & 0xf);
    let mut ways = (1 + (config2 & 0xf)) as usize;

    // Several parts report geometry contradicted by all documentation;
    // trust the datasheets over Config2.
    match machine {
        MachineType::Jz4770 | MachineType::Jz4775 => {
            ways = 4;
        }
        MachineType::Jz4780 => {
            sets = 1024;
            ways = 4;
        }
        MachineType::X1000 | MachineType::X1000e => {
            sets = 256;
            ways = 4;
        }
        _ => {}
    }

    if sets * ways * linesz == 0 {
        return None;
    }

    let scache = CacheDesc::new(linesz, sets, ways, machine >= MachineType::X2000);

    if machine < MachineType::X2000 {
        hw.write_errctl(ERRCTL_WST_DIS);
    }

    info!(
        "Unified secondary cache {}kiB, {}, {}-way, {} sets, linesize {} bytes.",
        scache.size >> 10,
        if scache.phys_indexed { "PIPT" } else { "VIPT" },
        scache.ways,
        scache.sets,
        scache.linesz
    );

    Some(scache)
}
