// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Helpers for the links in /proc/<pid>/fd

use std::fs::{read_dir, read_link};
use std::path::Path;

use super::net::Ino;

/// Inodes of every socket the process holds open.
pub fn socket_inodes(proc_root: &Path, pid: i32) -> Result<Vec<Ino>, std::io::Error> {
    let fd_path = proc_root.join(pid.to_string()).join("fd");

    Ok(read_dir(fd_path)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| read_link(entry.path()).ok())
        .filter_map(|link| is_socket(&link))
        .collect())
}

fn is_socket(link: &Path) -> Option<Ino> {
    link.to_str()?
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_is_socket() {
        assert_eq!(is_socket(Path::new("socket:[41234]")), Some(41234));
        assert_eq!(is_socket(Path::new("socket:[]")), None);
        assert_eq!(is_socket(Path::new("pipe:[41234]")), None);
        assert_eq!(is_socket(Path::new("/var/log/nginx/error.log")), None);
    }

    #[test]
    fn test_socket_inodes() {
        let root = tempfile::tempdir().unwrap();
        let fd = root.path().join("55").join("fd");
        std::fs::create_dir_all(&fd).unwrap();
        symlink("socket:[111]", fd.join("3")).unwrap();
        symlink("/dev/null", fd.join("0")).unwrap();
        symlink("socket:[222]", fd.join("7")).unwrap();

        let mut inodes = socket_inodes(root.path(), 55).unwrap();
        inodes.sort_unstable();
        assert_eq!(inodes, vec![111, 222]);

        assert!(socket_inodes(root.path(), 56).is_err());
    }
}
