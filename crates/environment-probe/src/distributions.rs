//! Distribution to package-manager mapping

use common::types::{Distribution, NativePackageManager};

/// Selects the native package manager for a distribution, trying `ID`
/// first and then each `ID_LIKE` entry
pub fn package_manager_for(dist: &Distribution) -> Option<NativePackageManager> {
    lookup(&dist.id).or_else(|| dist.id_like.iter().find_map(|id| lookup(id)))
}

fn lookup(id: &str) -> Option<NativePackageManager> {
    let manager = match id {
        "debian" | "ubuntu" | "linuxmint" | "pop" | "elementary" | "zorin" | "kali" | "raspbian" | "neon" => {
            NativePackageManager::Apt
        }
        "fedora" | "rhel" | "centos" | "rocky" | "almalinux" | "ol" | "amzn" => NativePackageManager::Dnf,
        "arch" | "manjaro" | "endeavouros" | "garuda" | "artix" => NativePackageManager::Pacman,
        "sles" | "suse" => NativePackageManager::Zypper,
        id if id.starts_with("opensuse") => NativePackageManager::Zypper,
        "alpine" => NativePackageManager::Apk,
        "macos" => NativePackageManager::Brew,
        _ => return None,
    };
    Some(manager)
}
