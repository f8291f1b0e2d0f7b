// Disk space summed over mounted volumes

use std::path::Path;

use sysinfo::Disks;

use crate::models::DiskSpace;

const PSEUDO_MOUNT_PREFIXES: [&str; 5] = ["/proc", "/sys", "/dev", "/run", "/snap"];

const NETWORK_FILE_SYSTEMS: [&str; 12] = [
    "nfs", "nfs4", "cifs", "smbfs", "smb3", "afpfs", "sshfs", "fuse.sshfs", "9p", "ceph",
    "glusterfs", "webdav",
];

const MEMORY_FILE_SYSTEMS: [&str; 4] = ["tmpfs", "ramfs", "devtmpfs", "devfs"];

/// A mounted volume as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub mount_point: String,
    pub file_system: String,
    pub is_removable: bool,
    pub available_bytes: u64,
    pub total_bytes: u64,
}

impl Volume {
    pub fn is_network(&self) -> bool {
        let fs = self.file_system.to_ascii_lowercase();
        NETWORK_FILE_SYSTEMS.contains(&fs.as_str())
    }

    pub fn is_fixed(&self) -> bool {
        let fs = self.file_system.to_ascii_lowercase();
        !self.is_removable && !self.is_network() && !MEMORY_FILE_SYSTEMS.contains(&fs.as_str())
    }

    fn is_pseudo_mount(&self) -> bool {
        let mount = self.mount_point.to_ascii_lowercase();
        PSEUDO_MOUNT_PREFIXES.iter().any(|p| mount.starts_with(p))
    }
}

/// Which volumes count toward the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumePolicy {
    /// Fixed and network volumes, minus pseudo-filesystem mounts (Linux).
    FixedOrNetwork,
    /// Fixed volumes only (macOS).
    FixedOnly,
}

impl VolumePolicy {
    pub fn includes(self, volume: &Volume) -> bool {
        match self {
            VolumePolicy::FixedOrNetwork => {
                (volume.is_fixed() || volume.is_network()) && !volume.is_pseudo_mount()
            }
            VolumePolicy::FixedOnly => volume.is_fixed(),
        }
    }

    pub fn sum(self, volumes: &[Volume]) -> DiskSpace {
        volumes
            .iter()
            .filter(|v| self.includes(v))
            .fold(DiskSpace::default(), |acc, v| DiskSpace {
                free_bytes: acc.free_bytes.saturating_add(v.available_bytes),
                total_bytes: acc.total_bytes.saturating_add(v.total_bytes),
            })
    }
}

pub trait VolumeSource: Send + Sync {
    fn volumes(&self) -> Vec<Volume>;
}

/// Volumes listed by `sysinfo`, refreshed on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoVolumes;

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl VolumeSource for SysinfoVolumes {
    fn volumes(&self) -> Vec<Volume> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .map(|d| Volume {
                mount_point: lossy(d.mount_point()),
                file_system: d.file_system().to_string_lossy().into_owned(),
                is_removable: d.is_removable(),
                available_bytes: d.available_space(),
                total_bytes: d.total_space(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vol(mount: &str, fs: &str, removable: bool, avail: u64, total: u64) -> Volume {
        Volume {
            mount_point: mount.into(),
            file_system: fs.into(),
            is_removable: removable,
            available_bytes: avail,
            total_bytes: total,
        }
    }

    fn sample_volumes() -> Vec<Volume> {
        vec![
            vol("/", "ext4", false, 40, 100),
            vol("/home", "xfs", false, 10, 50),
            vol("/mnt/share", "nfs4", false, 5, 20),
            vol("/media/usb", "vfat", true, 1, 8),
            vol("/dev/shm", "tmpfs", false, 3, 3),
            vol("/snap/core/1", "squashfs", false, 0, 7),
            vol("/run/user/1000", "ext4", false, 2, 2),
        ]
    }

    #[test]
    fn linux_policy_counts_fixed_and_network_outside_pseudo_mounts() {
        let space = VolumePolicy::FixedOrNetwork.sum(&sample_volumes());
        assert_eq!(
            space,
            DiskSpace {
                free_bytes: 55,
                total_bytes: 170
            }
        );
    }

    #[test]
    fn mac_policy_counts_fixed_only() {
        let volumes = vec![
            vol("/", "apfs", false, 100, 500),
            vol("/Volumes/NAS", "smbfs", false, 50, 1000),
            vol("/Volumes/Stick", "msdos", true, 1, 16),
        ];
        let space = VolumePolicy::FixedOnly.sum(&volumes);
        assert_eq!(space.free_bytes, 100);
        assert_eq!(space.total_bytes, 500);
    }

    #[test]
    fn prefixes_are_case_insensitive() {
        let v = vol("/SYS/fs", "ext4", false, 1, 1);
        assert!(!VolumePolicy::FixedOrNetwork.includes(&v));
    }

    #[test]
    fn empty_volume_list_has_no_free_percent() {
        let space = VolumePolicy::FixedOrNetwork.sum(&[]);
        assert_eq!(space.free_percent(), None);
        assert_eq!(space.size_megabytes(), 0.0);
    }
}
