//! Host interface lookups through sysfs.

use std::path::{Path, PathBuf};

use crate::cache::{HardwareAddr, SystemInterface};
use crate::error::{Error, Result};

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

const SYS_CLASS_NET: &str = "/sys/class/net";

/// Validate an interface name.
pub fn validate(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.len() >= IFNAMSIZ
        || name.contains('/')
        || name.contains('\0')
        || name.chars().any(|c| c.is_whitespace());
    if invalid {
        return Err(Error::InterfaceNotFound {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Sysfs reader rooted at `/sys/class/net` or, in tests, a scratch tree.
#[derive(Debug, Clone)]
pub struct SysClassNet {
    root: PathBuf,
}

impl Default for SysClassNet {
    fn default() -> Self {
        Self::new(SYS_CLASS_NET)
    }
}

impl SysClassNet {
    /// Read interfaces from `root` instead of `/sys/class/net`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn attr(&self, name: &str, attr: &str) -> Result<String> {
        validate(name)?;
        std::fs::read_to_string(self.root.join(name).join(attr))
            .map(|s| s.trim().to_string())
            .map_err(|_| Error::InterfaceNotFound {
                name: name.to_string(),
            })
    }

    /// Convert an interface name to index.
    pub fn name_to_index(&self, name: &str) -> Result<i32> {
        self.attr(name, "ifindex")?
            .parse()
            .map_err(|_| Error::InterfaceNotFound {
                name: name.to_string(),
            })
    }

    /// Convert an interface index to name.
    pub fn index_to_name(&self, index: i32) -> Result<String> {
        if index > 0 {
            for entry in std::fs::read_dir(&self.root)?.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if self.name_to_index(&name).ok() == Some(index) {
                    return Ok(name);
                }
            }
        }
        Err(Error::InterfaceNotFound {
            name: format!("index {}", index),
        })
    }

    /// Hardware address, zero when unreadable.
    pub fn hardware_addr(&self, name: &str) -> HardwareAddr {
        self.attr(name, "address")
            .ok()
            .and_then(|s| parse_mac(&s))
            .unwrap_or_default()
    }

    /// Kernel `IFF_*` flags, zero when unreadable.
    pub fn flags(&self, name: &str) -> u32 {
        self.attr(name, "flags")
            .ok()
            .and_then(|s| u32::from_str_radix(s.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0)
    }

    /// Snapshot of the interface with `index`.
    pub fn interface(&self, index: i32) -> Result<SystemInterface> {
        let name = self.index_to_name(index)?;
        Ok(SystemInterface {
            ifindex: index,
            addr: self.hardware_addr(&name),
            flags: self.flags(&name),
            name,
        })
    }
}

fn parse_mac(s: &str) -> Option<HardwareAddr> {
    let mut addr = [0u8; 6];
    let mut parts = s.split(':');
    for b in addr.iter_mut() {
        *b = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    parts.next().is_none().then_some(addr)
}
